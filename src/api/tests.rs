use super::auth::is_valid_key_format;
use super::darkroom::{
    CaptionRequest, ComfyAction, DarkroomClient, TrainRequest, TrainState, auto_steps,
};
use super::images::CreateImage;
use super::videos::CreateVideo;
use super::*;
use crate::completion::JobState;
use anyhow::Result;
use mockito::Matcher;
use serde_json::json;
use tempfile::TempDir;

const KEY: &str = "gf_test_0123456789";

async fn client(server: &mockito::ServerGuard) -> ApiClient {
    ApiClient::new(format!("{}/v1/", server.url()), KEY)
}

#[tokio::test]
async fn test_whoami_sends_bearer_and_unwraps_data() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/auth/whoami")
        .match_header("authorization", format!("Bearer {KEY}").as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "data": {
                    "organization": {"id": "org-1", "name": "Test Org"},
                    "scopes": ["admin", "read", "write"],
                    "user": {"email": "test@example.com", "id": "user-1", "name": "Test User"},
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let info = client(&server).await.whoami().await?;

    mock.assert_async().await;
    assert_eq!(info.user.email, "test@example.com");
    assert_eq!(info.organization.name, "Test Org");
    assert_eq!(info.scopes.len(), 3);
    assert!(info.scopes.contains(&"admin".to_owned()));
    Ok(())
}

#[tokio::test]
async fn test_create_image_omits_unset_fields() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/images")
        .match_body(Matcher::Json(json!({
            "brand": "brand-1",
            "text": "A cat",
            "width": 1024,
            "height": 768,
        })))
        .with_status(201)
        .with_body(
            json!({
                "data": {
                    "brandId": "brand-1",
                    "createdAt": "2024-01-01T00:00:00Z",
                    "height": 768,
                    "id": "img-2",
                    "model": "flux",
                    "prompt": "A cat",
                    "status": "pending",
                    "updatedAt": "2024-01-01T00:00:00Z",
                    "width": 1024,
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let image = client(&server)
        .await
        .create_image(&CreateImage {
            text: "A cat".to_owned(),
            brand: "brand-1".to_owned(),
            model: None,
            width: Some(1024),
            height: Some(768),
        })
        .await?;

    mock.assert_async().await;
    assert_eq!(image.id, "img-2");
    assert_eq!(image.status, GenerationStatus::Pending);
    assert_eq!((image.width, image.height), (Some(1024), Some(768)));
    assert!(!image.is_complete());
    Ok(())
}

#[tokio::test]
async fn test_get_image_states() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/images/img-1")
        .with_body(
            json!({
                "data": {
                    "completedAt": "2024-01-01T00:01:00Z",
                    "id": "img-1",
                    "model": "flux",
                    "status": "completed",
                    "url": "https://cdn.genfeed.ai/images/img-1.png",
                }
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/v1/images/img-9")
        .with_body(
            json!({
                "data": {
                    "error": "Content policy violation",
                    "id": "img-9",
                    "model": "flux",
                    "status": "failed",
                }
            })
            .to_string(),
        )
        .create_async()
        .await;
    let api = client(&server).await;

    let done = api.get_image("img-1").await?;
    assert!(done.is_complete());
    assert_eq!(
        done.url.as_deref(),
        Some("https://cdn.genfeed.ai/images/img-1.png")
    );
    assert!(done.completed_at.is_some());

    let failed = api.get_image("img-9").await?;
    assert!(failed.is_failed());
    assert_eq!(
        failed.failure_reason().as_deref(),
        Some("Content policy violation")
    );
    Ok(())
}

#[tokio::test]
async fn test_create_video_with_duration() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/videos")
        .match_body(Matcher::Json(json!({
            "brand": "brand-1",
            "duration": 10,
            "text": "Ocean waves",
        })))
        .with_body(
            json!({
                "data": {"id": "vid-2", "duration": 10, "model": "runway", "status": "pending"}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let video = client(&server)
        .await
        .create_video(&CreateVideo {
            text: "Ocean waves".to_owned(),
            brand: "brand-1".to_owned(),
            model: None,
            duration: Some(10),
            resolution: None,
        })
        .await?;

    mock.assert_async().await;
    assert_eq!(video.duration, Some(10));
    assert_eq!(video.status.to_string(), "pending");
    Ok(())
}

#[tokio::test]
async fn test_brands() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/brands")
        .with_body(
            json!({
                "data": [
                    {"id": "brand-1", "name": "Brand One", "description": "First brand"},
                    {"id": "brand-2", "name": "Brand Two"},
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/v1/brands/brand-1")
        .with_body(json!({"data": {"id": "brand-1", "name": "Brand One"}}).to_string())
        .create_async()
        .await;
    let api = client(&server).await;

    let brands = api.list_brands().await?;
    assert_eq!(brands.len(), 2);
    assert_eq!(brands[0].description.as_deref(), Some("First brand"));
    assert_eq!(brands[1].description, None);
    assert_eq!(api.get_brand("brand-1").await?.name, "Brand One");
    Ok(())
}

#[tokio::test]
async fn test_error_responses_map_to_api_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/images/missing")
        .with_status(404)
        .with_body(json!({"message": "Image not found", "statusCode": 404}).to_string())
        .create_async()
        .await;
    server
        .mock("POST", "/v1/videos")
        .with_status(400)
        .with_body(json!({"message": ["text must be a string", "brand is required"]}).to_string())
        .create_async()
        .await;
    server
        .mock("GET", "/v1/brands")
        .with_status(500)
        .create_async()
        .await;
    let api = client(&server).await;

    let err = api.get_image("missing").await.unwrap_err();
    let api_err = err.downcast_ref::<Error>().unwrap();
    assert_eq!(api_err.status(), Some(404));
    assert_eq!(api_err.to_string(), "Image not found");

    let request = CreateVideo {
        text: String::new(),
        brand: String::new(),
        model: None,
        duration: None,
        resolution: None,
    };
    let err = api.create_video(&request).await.unwrap_err();
    assert_eq!(err.to_string(), "text must be a string, brand is required");

    let err = api.list_brands().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "API request failed: 500 Internal Server Error"
    );
}

#[test]
fn test_for_profile_requires_key() {
    let profile = Profile::default();
    assert!(matches!(
        ApiClient::for_profile(&profile),
        Err(Error::NotAuthenticated)
    ));

    let profile = Profile {
        api_key: Some(KEY.to_owned()),
        api_url: "http://localhost:3001/v1/".to_owned(),
        ..Profile::default()
    };
    let api = ApiClient::for_profile(&profile).unwrap();
    assert_eq!(api.base_url(), "http://localhost:3001/v1");
    assert_eq!(api.api_key(), KEY);
}

#[test]
fn test_debug_withholds_key() {
    let api = ApiClient::new("http://localhost:3001/v1", KEY);
    let printed = format!("{api:?}");
    assert!(printed.contains("http://localhost:3001/v1"));
    assert!(!printed.contains(KEY));
    assert!(format!("{:?}", DarkroomClient::new("http://10.0.0.5:8000")).contains("10.0.0.5"));
}

#[test]
fn test_key_format() {
    assert!(is_valid_key_format("gf_live_abc"));
    assert!(is_valid_key_format("gf_test_abc"));
    assert!(!is_valid_key_format("gf_abc"));
    assert!(!is_valid_key_format("sk_live_abc"));
}

#[test]
fn test_auto_steps() {
    assert_eq!(auto_steps(0), 1000);
    assert_eq!(auto_steps(9), 1000);
    assert_eq!(auto_steps(10), 1500);
    assert_eq!(auto_steps(14), 1500);
    assert_eq!(auto_steps(15), 2000);
    assert_eq!(auto_steps(24), 2000);
    assert_eq!(auto_steps(25), 3000);
    assert_eq!(auto_steps(200), 3000);
}

#[tokio::test]
async fn test_darkroom_training_flow() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/datasets/quincy")
        .with_body(
            json!({
                "persona": "quincy", "path": "/data/quincy",
                "image_count": 12, "caption_count": 12, "images": []
            })
            .to_string(),
        )
        .create_async()
        .await;
    let train = server
        .mock("POST", "/train")
        .match_body(Matcher::Json(json!({
            "persona_slug": "quincy",
            "trigger_word": "quincy",
            "lora_name": "quincy_zimage",
            "steps": 1500,
            "lora_rank": 16,
            "learning_rate": 0.0004,
        })))
        .with_body(json!({"job_id": "job-7", "image_count": 12}).to_string())
        .create_async()
        .await;
    server
        .mock("GET", "/train/job-7")
        .with_body(
            json!({
                "job_id": "job-7", "status": "failed", "stage": "training", "progress": 42.0,
                "started_at": "2025-01-01T10:00:00", "persona_slug": "quincy",
                "lora_name": "quincy_zimage", "image_count": 12, "error": "CUDA out of memory"
            })
            .to_string(),
        )
        .create_async()
        .await;
    let darkroom = DarkroomClient::new(server.url());

    let dataset = darkroom.dataset("quincy").await?;
    assert_eq!(dataset.image_count, 12);

    let started = darkroom
        .start_training(&TrainRequest {
            persona_slug: "quincy".to_owned(),
            trigger_word: "quincy".to_owned(),
            lora_name: "quincy_zimage".to_owned(),
            steps: auto_steps(dataset.image_count),
            lora_rank: 16,
            learning_rate: 4e-4,
        })
        .await?;
    train.assert_async().await;
    assert_eq!(started.job_id, "job-7");

    let status = darkroom.training_status("job-7").await?;
    assert_eq!(status.status, TrainState::Failed);
    assert!(status.is_failed());
    assert_eq!(
        status.failure_reason().as_deref(),
        Some("Training failed: CUDA out of memory")
    );
    Ok(())
}

#[tokio::test]
async fn test_darkroom_errors() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/caption")
        .with_status(500)
        .with_body("florence crashed")
        .create_async()
        .await;
    let darkroom = DarkroomClient::new(server.url());

    let err = darkroom
        .caption(&CaptionRequest {
            persona_slug: "quincy".to_owned(),
            trigger_word: "qx".to_owned(),
        })
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Darkroom API POST /caption failed: 500 florence crashed"
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let offline = DarkroomClient::new(format!("http://127.0.0.1:{port}"));
    let err = offline.health().await.unwrap_err();
    let darkroom_err = err.downcast_ref::<Error>().unwrap();
    assert!(
        darkroom_err
            .to_string()
            .starts_with(&format!("Cannot reach Darkroom API at http://127.0.0.1:{port}")),
        "{darkroom_err}"
    );
    assert_eq!(
        darkroom_err.suggestion().as_deref(),
        Some("Ensure the darkroom instance is running and darkroom-api service is active")
    );
}

#[tokio::test]
async fn test_darkroom_dataset_management() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let upload = server
        .mock("POST", "/datasets/quincy/upload")
        .match_header(
            "content-type",
            Matcher::Regex("^multipart/form-data; boundary=".to_owned()),
        )
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#"name="files"; filename="001.png""#.to_owned()),
            Matcher::Regex(r#"name="files"; filename="001.txt""#.to_owned()),
            Matcher::Regex("quincy, portrait".to_owned()),
        ]))
        .with_body(
            json!({
                "persona": "quincy", "path": "/data/quincy",
                "uploaded_count": 2, "files": ["001.png", "001.txt"]
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/datasets/quincy/download")
        .with_header("content-type", "application/gzip")
        .with_body([0x1f, 0x8b, 0x08, 0x00])
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/datasets/quincy")
        .with_body(json!({"persona": "quincy", "deleted": true}).to_string())
        .create_async()
        .await;
    let darkroom = DarkroomClient::new(server.url());

    let dir = TempDir::new()?;
    let image = dir.path().join("001.png");
    let caption = dir.path().join("001.txt");
    std::fs::write(&image, b"png")?;
    std::fs::write(&caption, "quincy, portrait")?;

    let uploaded = darkroom.upload_dataset("quincy", &[image, caption]).await?;
    upload.assert_async().await;
    assert_eq!(uploaded.uploaded_count, 2);
    assert_eq!(uploaded.files, vec!["001.png", "001.txt"]);

    let archive = darkroom.download_dataset("quincy").await?;
    assert_eq!(archive, vec![0x1f, 0x8b, 0x08, 0x00]);

    let deleted = darkroom.delete_dataset("quincy").await?;
    delete.assert_async().await;
    assert!(deleted.deleted);
    Ok(())
}

#[tokio::test]
async fn test_darkroom_download_failure_keeps_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/datasets/ghost/download")
        .with_status(404)
        .with_body("dataset not found")
        .create_async()
        .await;
    let darkroom = DarkroomClient::new(server.url());

    let err = darkroom.download_dataset("ghost").await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Darkroom API GET /datasets/ghost/download failed: 404 dataset not found"
    );
}

#[tokio::test]
async fn test_darkroom_comfy_action() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let restart = server
        .mock("POST", "/comfyui/restart")
        .with_body(
            json!({"action": "restart", "returncode": 0, "stdout": "restarted", "stderr": ""})
                .to_string(),
        )
        .create_async()
        .await;
    let darkroom = DarkroomClient::new(server.url());

    let result = darkroom.comfy(ComfyAction::Restart).await?;
    restart.assert_async().await;
    assert_eq!(result.returncode, 0);
    assert_eq!(result.stdout, "restarted");
    Ok(())
}

#[tokio::test]
async fn test_personas() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/personas")
        .match_header("authorization", format!("Bearer {KEY}").as_str())
        .with_body(
            json!({
                "data": [
                    {"id": "p-1", "handle": "quincy", "name": "Quincy", "status": "active",
                     "triggerWord": "qx", "createdAt": "2025-01-01T00:00:00Z"},
                    {"id": "p-2", "handle": "mara", "name": "Mara"},
                ],
                "meta": {"total": 2}
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/v1/personas/quincy")
        .with_body(
            json!({"data": {"id": "p-1", "handle": "quincy", "name": "Quincy",
                            "platform": "instagram", "createdAt": "2025-01-01T00:00:00Z"}})
            .to_string(),
        )
        .create_async()
        .await;
    let api = client(&server).await;

    let personas = api.list_personas().await?;
    assert_eq!(personas.len(), 2);
    assert!(personas[0].is_active());
    assert_eq!(personas[0].trigger_word.as_deref(), Some("qx"));
    assert!(!personas[1].is_active());
    assert_eq!(personas[1].created_at, None);

    let quincy = api.get_persona("quincy").await?;
    assert_eq!(quincy.platform.as_deref(), Some("instagram"));
    assert!(quincy.created_at.is_some());
    Ok(())
}

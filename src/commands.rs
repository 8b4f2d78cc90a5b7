pub mod auth;
pub mod brands;
pub mod caption;
pub mod darkroom;
pub mod dataset;
pub mod generate;
pub mod personas;
pub mod profile;
pub mod status;
pub mod train;


use crate::api::ApiClient;
use crate::api::darkroom::DarkroomClient;
use crate::completion::WaitError;
use crate::config::{ConfigStore, Profile};
use crate::errors::Error;
use crate::logging::*;
use anyhow::Result;
use tokio_util::sync::CancellationToken;

/// Config file and the profile in effect for one invocation.
pub struct Session {
    pub store: ConfigStore,
    pub name: String,
    pub profile: Profile,
}

impl Session {
    pub fn load() -> Result<Self> {
        Self::with_store(ConfigStore::open()?)
    }

    pub fn with_store(store: ConfigStore) -> Result<Self> {
        let active = store.active_profile()?;
        Ok(Self {
            store,
            name: active.name,
            profile: active.profile,
        })
    }

    pub fn api(&self) -> Result<ApiClient> {
        Ok(ApiClient::for_profile(&self.profile)?)
    }

    pub fn require_admin(&self) -> Result<()> {
        if !self.profile.is_admin() {
            return Err(Error::AdminRequired.into());
        }
        Ok(())
    }

    /// Darkroom endpoints are admin only.
    pub fn darkroom(&self) -> Result<DarkroomClient> {
        self.require_admin()?;
        Ok(DarkroomClient::for_profile(&self.profile))
    }

    /// The `--brand` flag, else the profile's active brand.
    pub fn brand(&self, flag: Option<&str>) -> Result<String> {
        flag.map(str::to_owned)
            .or_else(|| self.profile.active_brand.clone())
            .filter(|brand| !brand.is_empty())
            .ok_or_else(|| Error::NoBrand.into())
    }
}

/// Cancelled on Ctrl-C.
pub fn interrupt() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let log = DEFAULT.new(o!("function" => "commands::interrupt"));
            debug!(log, "interrupted");
            trigger.cancel();
        }
    });
    token
}

/// Fetch errors surface as themselves so CLI errors keep their hints.
pub fn wait_error(err: WaitError) -> anyhow::Error {
    match err {
        WaitError::Fetch(err) => err,
        other => other.into(),
    }
}

use thiserror::Error;

const DARKROOM_HINT: &str = "Check darkroom connectivity with `gf darkroom health`";

/// User-facing failures. Each may carry a suggestion printed under the
/// message.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("This command requires admin access.")]
    AdminRequired,
    #[error("No brand selected")]
    NoBrand,
    #[error("Invalid API key format")]
    InvalidApiKey,
    #[error("{message}")]
    Api { message: String, status: Option<u16> },
    #[error("{message}")]
    Darkroom {
        message: String,
        suggestion: Option<String>,
    },
    #[error("Profile \"{0}\" does not exist")]
    UnknownProfile(String),
    #[error("Profile \"{0}\" already exists")]
    ProfileExists(String),
    #[error("Unknown field: {0}")]
    UnknownField(String),
    #[error("Invalid {field}: {value}")]
    InvalidValue { field: String, value: String },
    #[error("{message}")]
    Other {
        message: String,
        suggestion: Option<String>,
    },
}

impl Error {
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::NotAuthenticated => Some("Run `gf login` to authenticate".to_owned()),
            Error::AdminRequired => Some("Contact your organization admin for access.".to_owned()),
            Error::NoBrand => Some("Run `gf brands select` to choose a brand".to_owned()),
            Error::InvalidApiKey => {
                Some("API keys should start with gf_live_ or gf_test_".to_owned())
            }
            Error::Api { status: Some(401), .. } => {
                Some("Run `gf login` to authenticate".to_owned())
            }
            Error::Api { .. } => None,
            Error::Darkroom { suggestion, .. } => {
                Some(suggestion.clone().unwrap_or_else(|| DARKROOM_HINT.to_owned()))
            }
            Error::UnknownProfile(_) => Some("Run `gf profile list` to see profiles".to_owned()),
            Error::ProfileExists(name) => Some(format!("Switch to it with: gf profile use {name}")),
            Error::UnknownField(_) => Some(format!("Valid fields: {}", FIELD_NAMES.join(", "))),
            Error::InvalidValue { .. } => None,
            Error::Other { suggestion, .. } => suggestion.clone(),
        }
    }

    pub fn api(message: impl Into<String>, status: Option<u16>) -> Self {
        Error::Api {
            message: message.into(),
            status,
        }
    }

    pub fn darkroom(message: impl Into<String>) -> Self {
        Error::Darkroom {
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn other(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Error::Other {
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => *status,
            _ => None,
        }
    }
}

/// Profile fields settable by name from the command line.
pub const FIELD_NAMES: &[&str] = &[
    "active-brand",
    "api-key",
    "api-url",
    "darkroom-host",
    "darkroom-port",
    "role",
];

/// `✖ message` and, when present, the indented suggestion.
pub fn format_error(err: &anyhow::Error) -> String {
    let mut output = format!("✖ {err}");
    if let Some(suggestion) = err.downcast_ref::<Error>().and_then(Error::suggestion) {
        output.push_str("\n  ");
        output.push_str(&suggestion);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_and_suggestions() {
        assert_eq!(Error::NotAuthenticated.to_string(), "Not authenticated");
        assert_eq!(
            Error::NotAuthenticated.suggestion().as_deref(),
            Some("Run `gf login` to authenticate")
        );
        assert_eq!(
            Error::NoBrand.suggestion().as_deref(),
            Some("Run `gf brands select` to choose a brand")
        );
        assert_eq!(
            Error::AdminRequired.to_string(),
            "This command requires admin access."
        );
    }

    #[test]
    fn test_api_error_keeps_status() {
        let err = Error::api("Not Found", Some(404));
        assert_eq!(err.to_string(), "Not Found");
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.suggestion(), None);
        assert!(Error::api("Unauthorized", Some(401)).suggestion().is_some());
    }

    #[test]
    fn test_darkroom_default_suggestion() {
        let err = Error::darkroom("Darkroom API GET /health failed: 500");
        assert_eq!(err.suggestion().as_deref(), Some(DARKROOM_HINT));
    }

    #[test]
    fn test_format_error() {
        let err = anyhow::Error::new(Error::NoBrand);
        assert_eq!(
            format_error(&err),
            "✖ No brand selected\n  Run `gf brands select` to choose a brand"
        );

        let plain = anyhow::anyhow!("Operation timed out");
        assert_eq!(format_error(&plain), "✖ Operation timed out");
    }
}

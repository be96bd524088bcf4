use reqwest::StatusCode;
use thiserror::Error;

/// Selection level a write depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Organization,
    Project,
    Board,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Organization => "organization",
            Self::Project => "project",
            Self::Board => "board",
        })
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("not authenticated (401)")]
    Unauthorized,
    #[error("no access token configured")]
    NotSignedIn,
    #[error("request rejected ({status}): {message}")]
    Validation { status: u16, message: String },
    #[error("server failure ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("select a {0} first")]
    MissingSelection(Level),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

impl ClientError {
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == StatusCode::UNAUTHORIZED {
            Self::Unauthorized
        } else if status.is_client_error() {
            Self::Validation {
                status: status.as_u16(),
                message,
            }
        } else {
            Self::Server {
                status: status.as_u16(),
                message,
            }
        }
    }

    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::NotSignedIn)
    }

    /// One-line text for the transient error notification.
    pub fn user_message(&self, action: &str) -> String {
        match self {
            Self::Transport(_) => format!("{action} failed: server unreachable"),
            Self::Unauthorized | Self::NotSignedIn => {
                format!("{action} failed: session expired, sign in again")
            }
            Self::Validation { message, .. } if !message.is_empty() => {
                format!("{action} failed: {message}")
            }
            Self::MissingSelection(level) => format!("{action} failed: select a {level} first"),
            Self::Validation { .. } | Self::Server { .. } => format!("{action} failed"),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::from_status(status, err.to_string()),
            None => Self::Transport(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_status_codes_into_taxonomy() {
        assert!(matches!(
            ClientError::from_status(StatusCode::UNAUTHORIZED, "nope"),
            ClientError::Unauthorized
        ));
        assert!(matches!(
            ClientError::from_status(StatusCode::UNPROCESSABLE_ENTITY, "bad name"),
            ClientError::Validation { status: 422, .. }
        ));
        assert!(matches!(
            ClientError::from_status(StatusCode::BAD_GATEWAY, "down"),
            ClientError::Server { status: 502, .. }
        ));
    }

    #[test]
    fn user_message_surfaces_validation_text_only() {
        let validation = ClientError::Validation {
            status: 400,
            message: "name must not be blank".to_string(),
        };
        assert_eq!(
            validation.user_message("Create project"),
            "Create project failed: name must not be blank"
        );

        let server = ClientError::Server {
            status: 500,
            message: "NullPointerException at ...".to_string(),
        };
        assert_eq!(server.user_message("Delete board"), "Delete board failed");
        assert!(ClientError::Unauthorized.requires_reauth());
    }
}

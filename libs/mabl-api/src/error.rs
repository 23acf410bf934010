//! Client error types.

use thiserror::Error;

/// Failures reported by an [`ExecutionClient`](crate::ExecutionClient).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error: HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Not authorized (HTTP {status}). Check that the API key is valid and has deployment access.")]
    Unauthorized { status: u16 },

    #[error("Failed to parse response: {0}")]
    Decode(String),

    #[error("Client has been closed")]
    Closed,
}

impl ClientError {
    /// Build an error for a non-success HTTP status.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        match status {
            401 | 403 => Self::Unauthorized { status },
            _ => Self::Api {
                status,
                body: body.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_statuses_map_to_unauthorized() {
        assert!(matches!(
            ClientError::from_status(401, ""),
            ClientError::Unauthorized { status: 401 }
        ));
        assert!(matches!(
            ClientError::from_status(403, "nope"),
            ClientError::Unauthorized { status: 403 }
        ));
    }

    #[test]
    fn other_statuses_keep_body() {
        let err = ClientError::from_status(502, "bad gateway");
        assert_eq!(err.to_string(), "API error: HTTP 502: bad gateway");
    }
}

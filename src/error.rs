use thiserror::Error;

use crate::formats::DocumentKind;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or unusable local setup (auth code, relay). Never retried.
    #[error("{message}")]
    Configuration { message: String },

    /// The relay rejected our credentials (401/403). Never retried.
    #[error("relay authentication failed ({status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("request to {url} failed: {message}")]
    Network {
        url: String,
        status: Option<u16>,
        message: String,
    },

    #[error("request failed after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<Error>,
    },

    /// The origin answered with an HTML page (or refused the direct
    /// connection), which is how overseas blocking shows up.
    #[error(
        "origin blocked the request for {url}: {reason}\n\
         This usually means access from outside Korea is blocked.\n\
         Configure a relay: export BEOPSUNY_GATEWAY_URL='https://your-gateway.example.com'"
    )]
    Blocked { url: String, reason: String },

    #[error("no {kind} found for '{key}': {message}")]
    NotFound {
        kind: DocumentKind,
        key: String,
        message: String,
    },

    #[error("failed to parse {location}: {message}")]
    Parse { location: String, message: String },
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn parse(location: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Parse {
            location: location.into(),
            message: message.to_string(),
        }
    }

    /// Transient failures worth another attempt through the relay.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { status, .. } => match status {
                Some(code) => *code >= 500,
                None => true,
            },
            _ => false,
        }
    }
}

use crate::models::ApiMethod;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("API {method} request failed, API may be offline")]
    RequestFailed {
        method: ApiMethod,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid XML in {method} response: {detail}")]
    InvalidResponse { method: ApiMethod, detail: String },

    #[error("API {method} request rejected: {detail}")]
    Rejected { method: ApiMethod, detail: String },

    #[error("No recipient given and no default recipient configured")]
    NoRecipient,

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

impl ClientError {
    /// The API method the failed call was made for, if any.
    pub fn method(&self) -> Option<ApiMethod> {
        match self {
            Self::RequestFailed { method, .. }
            | Self::InvalidResponse { method, .. }
            | Self::Rejected { method, .. } => Some(*method),
            Self::NoRecipient | Self::HttpClient(_) => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

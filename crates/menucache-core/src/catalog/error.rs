use thiserror::Error;

use crate::gateway::NetworkError;

/// Maximum length for response bodies quoted in error messages
const MAX_ERROR_BODY_LENGTH: usize = 200;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to load menu: status {status}")]
    Load { status: u16, body: String },

    #[error("Menu unavailable - offline and nothing cached")]
    Unavailable,

    #[error("Malformed menu data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
}

impl CatalogError {
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);
        let body = if text.len() <= MAX_ERROR_BODY_LENGTH {
            text.into_owned()
        } else {
            let truncated: String = text.chars().take(MAX_ERROR_BODY_LENGTH).collect();
            format!("{}... (truncated, {} total bytes)", truncated, body.len())
        };
        CatalogError::Load { status, body }
    }
}

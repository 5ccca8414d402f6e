//! Codec failure taxonomy (spec §4.1 "Failures").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    /// Invalid payload structure: wrong JSON shape, required field absent.
    #[error("malformed payload at {path}: {detail}")]
    Malformed { path: String, detail: String },
    /// Valid shape but an unknown role, finish-reason, or other value this
    /// codec doesn't understand.
    #[error("unsupported: {detail}")]
    Unsupported { detail: String },
}

impl DecodeError {
    pub fn malformed(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            detail: detail.into(),
        }
    }

    pub fn unsupported(detail: impl Into<String>) -> Self {
        Self::Unsupported { detail: detail.into() }
    }

    pub fn from_serde_json(err: serde_json::Error) -> Self {
        Self::Malformed {
            path: format!("line {} column {}", err.line(), err.column()),
            detail: err.to_string(),
        }
    }
}

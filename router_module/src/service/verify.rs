use axum::http::HeaderMap;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::adapters::line::{verify_line_signature, LINE_SIGNATURE_HEADER};
use crate::error::RouterError;

pub const PUSH_TOKEN_HEADER: &str = "x-push-token";

pub(super) fn verify_line_webhook(
    channel_secret: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), RouterError> {
    let signature = headers
        .get(LINE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    verify_line_signature(channel_secret, signature, body)
}

#[derive(Debug, PartialEq, Eq)]
pub(super) enum PushAuthError {
    NotConfigured,
    MissingToken,
    InvalidToken,
}

impl PushAuthError {
    pub(super) fn reason(&self) -> &'static str {
        match self {
            PushAuthError::NotConfigured => "push_token_not_configured",
            PushAuthError::MissingToken => "missing_token",
            PushAuthError::InvalidToken => "invalid_token",
        }
    }
}

/// The push endpoint stays closed until a token is configured.
pub(super) fn verify_push_token(
    expected: Option<&str>,
    headers: &HeaderMap,
) -> Result<(), PushAuthError> {
    let Some(expected) = expected.filter(|value| !value.trim().is_empty()) else {
        return Err(PushAuthError::NotConfigured);
    };
    let provided = headers
        .get(PUSH_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(PushAuthError::MissingToken)?;
    if !constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
        return Err(PushAuthError::InvalidToken);
    }
    Ok(())
}

/// Compares SHA-256 digests so neither content nor length leaks through timing.
fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    let left = Sha256::digest(left);
    let right = Sha256::digest(right);
    left.as_slice().ct_eq(right.as_slice()).into()
}

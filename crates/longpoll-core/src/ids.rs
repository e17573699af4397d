use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::HubError;

/// Caller-supplied client identifier. Opaque; the only rule is that it is
/// not empty. Whitespace is kept as-is, so `" "` is a valid id.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Validate and wrap a raw identifier taken from a request path.
    pub fn parse(raw: impl Into<String>) -> Result<Self, HubError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(HubError::MissingClientId);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

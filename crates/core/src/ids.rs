#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Stable, client-visible identifier used to match entities across merge calls.
///
/// Assigned once (either by the client or by [`ExternalId::generate`]) and never
/// changed afterwards.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(String);

impl ExternalId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn try_new(value: impl Into<String>) -> Result<Self, ExternalIdError> {
        let value = value.into();
        validate_external_id(&value)?;
        Ok(Self(value))
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for ExternalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExternalIdError {
    Empty,
    TooLong,
    ContainsPipe,
    ContainsControl,
}

impl ExternalIdError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "external id must not be empty",
            Self::TooLong => "external id is too long",
            Self::ContainsPipe => "external id must not contain '|'",
            Self::ContainsControl => "external id contains control characters",
        }
    }
}

impl std::fmt::Display for ExternalIdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ExternalIdError {}

fn validate_external_id(value: &str) -> Result<(), ExternalIdError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ExternalIdError::Empty);
    }
    if trimmed.len() > 128 {
        return Err(ExternalIdError::TooLong);
    }
    if trimmed.contains('|') {
        return Err(ExternalIdError::ContainsPipe);
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ExternalIdError::ContainsControl);
    }
    Ok(())
}

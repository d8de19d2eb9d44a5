use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failures for mutex names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("mutex name cannot be empty")]
    BlankName,
    #[error("mutex kind cannot be empty")]
    BlankKind,
}

/// Identifies one exclusion domain: an implementation kind plus an instance id.
///
/// The textual form is `"<kind>::<instance_id>"`. Without a separator the whole
/// (trimmed) text is the instance id and [`MutexName::DEFAULT_KIND`] is implied.
/// Equality and hashing use both parts, so two equal names always resolve to the
/// same mutex within one manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MutexName {
    kind: String,
    instance_id: String,
}

impl MutexName {
    pub const SEPARATOR: &'static str = "::";
    pub const DEFAULT_KIND: &'static str = "lease";

    /// Build a name from its parts. Both parts are trimmed and must be non-blank.
    pub fn new(kind: impl AsRef<str>, instance_id: impl AsRef<str>) -> Result<Self, NameError> {
        let kind = kind.as_ref().trim();
        let instance_id = instance_id.as_ref().trim();
        if kind.is_empty() {
            return Err(NameError::BlankKind);
        }
        if instance_id.is_empty() {
            return Err(NameError::BlankName);
        }
        Ok(MutexName {
            kind: kind.to_string(),
            instance_id: instance_id.to_string(),
        })
    }

    /// Parse `"[kind::]instance_id"`, splitting on the first separator only.
    pub fn parse(text: &str) -> Result<Self, NameError> {
        match text.split_once(Self::SEPARATOR) {
            Some((kind, instance_id)) => Self::new(kind, instance_id),
            None => Self::new(Self::DEFAULT_KIND, text),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }
}

impl fmt::Display for MutexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.kind, Self::SEPARATOR, self.instance_id)
    }
}

impl FromStr for MutexName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MutexName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MutexName> for String {
    fn from(name: MutexName) -> Self {
        name.to_string()
    }
}

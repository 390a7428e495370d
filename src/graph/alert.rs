//! User-facing alerts attached to mutation results

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Success,
    Warn,
    Error,
}

/// A message a caller should show next to a mutation's result
///
/// Recoverable problems inside a batch mutation (a parent that would form a
/// cycle, a name that is already taken) are reported this way instead of
/// failing the whole mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub kind: AlertKind,
    pub text: String,
}

impl Alert {
    pub fn new(kind: AlertKind, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(AlertKind::Success, text)
    }

    pub fn warn(text: impl Into<String>) -> Self {
        Self::new(AlertKind::Warn, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(AlertKind::Error, text)
    }

    pub fn is_warning(&self) -> bool {
        self.kind == AlertKind::Warn
    }
}

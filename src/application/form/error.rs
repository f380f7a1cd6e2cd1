use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::cache::CacheError;

/// Rule failures of one validation pass, keyed by widget uid.
///
/// Messages for a widget keep the order in which its rules failed. The map is
/// built in one go and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn single(uid: impl Into<String>, message: impl Into<String>) -> Self {
        [(uid.into(), message.into())].into_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, uid: &str) -> Option<&[String]> {
        self.0.get(uid).map(Vec::as_slice)
    }

    pub fn uids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(uid, msgs)| (uid.as_str(), msgs.as_slice()))
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }
}

impl FromIterator<(String, String)> for ValidationErrors {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (uid, message) in iter {
            map.entry(uid).or_default().push(message);
        }
        Self(map)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (uid, messages) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "{uid}: {}", messages.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("widget `{uid}` does not exist")]
    WidgetNotFound { uid: String },
    #[error("form validation failed: {0}")]
    Validation(ValidationErrors),
    /// A programming error in a form definition; not caused by user input.
    #[error("form configuration error: {message}")]
    Configuration { message: String },
    #[error("invalid value for attribute `{key}`: {reason}")]
    Attribute { key: String, reason: String },
    #[error("form was rejected: {message}")]
    Rejected { message: String },
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl FormError {
    pub fn widget_not_found(uid: impl Into<String>) -> Self {
        Self::WidgetNotFound { uid: uid.into() }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn attribute(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Attribute {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    pub fn is_widget_not_found(&self) -> bool {
        matches!(self, FormError::WidgetNotFound { .. })
    }

    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            FormError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

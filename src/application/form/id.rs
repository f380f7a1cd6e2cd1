use std::fmt;

use uuid::Uuid;

pub const STATELESS_PREFIX: &str = "cid:";

/// Identity of a form instance as carried by requests.
///
/// A stateless id is derived from the form's class identifier and needs no
/// cache lookup. A stateful id is an opaque random token whose records live in
/// the form cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FormId {
    Stateless(String),
    Stateful(String),
}

impl FormId {
    pub fn stateless(class_id: impl Into<String>) -> Self {
        Self::Stateless(class_id.into())
    }

    /// A fresh random token. Callers check it against the cache before use.
    pub fn generate() -> Self {
        Self::Stateful(Uuid::new_v4().simple().to_string())
    }

    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(STATELESS_PREFIX) {
            Some(class_id) => Self::Stateless(class_id.to_string()),
            None => Self::Stateful(raw.to_string()),
        }
    }

    pub fn is_stateful(&self) -> bool {
        matches!(self, FormId::Stateful(_))
    }

    /// Class identifier embedded in a stateless id.
    pub fn class_id(&self) -> Option<&str> {
        match self {
            FormId::Stateless(class_id) => Some(class_id),
            FormId::Stateful(_) => None,
        }
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormId::Stateless(class_id) => write!(f, "{STATELESS_PREFIX}{class_id}"),
            FormId::Stateful(token) => f.write_str(token),
        }
    }
}

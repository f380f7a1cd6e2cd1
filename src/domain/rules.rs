//! Per-widget validation rules.
//!
//! A rule inspects a single widget value and either accepts it or returns a
//! human-readable failure message. Every rule except [`Required`] treats an
//! empty value as acceptable, so optional fields only get checked once the
//! user actually types something.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use url::Url;

use super::value::Value;

/// A single rule failure, rendered as the message shown next to the field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RuleError {
    message: String,
}

impl RuleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub trait Rule: Send + Sync + fmt::Debug {
    fn check(&self, value: &Value) -> Result<(), RuleError>;
}

/// The value must be non-empty.
#[derive(Debug, Clone, Default)]
pub struct Required;

impl Rule for Required {
    fn check(&self, value: &Value) -> Result<(), RuleError> {
        if value.is_empty() {
            return Err(RuleError::new("This field is required."));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MinLength(pub usize);

impl Rule for MinLength {
    fn check(&self, value: &Value) -> Result<(), RuleError> {
        if value.is_empty() {
            return Ok(());
        }
        if text_len(value) < self.0 {
            return Err(RuleError::new(format!(
                "Must be at least {} characters long.",
                self.0
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MaxLength(pub usize);

impl Rule for MaxLength {
    fn check(&self, value: &Value) -> Result<(), RuleError> {
        if text_len(value) > self.0 {
            return Err(RuleError::new(format!(
                "Must be at most {} characters long.",
                self.0
            )));
        }
        Ok(())
    }
}

fn text_len(value: &Value) -> usize {
    match value {
        Value::List(items) => items.len(),
        other => other.to_text().chars().count(),
    }
}

/// Loose structural e-mail check: one `@`, non-empty local part, dotted domain.
#[derive(Debug, Clone, Default)]
pub struct Email;

impl Rule for Email {
    fn check(&self, value: &Value) -> Result<(), RuleError> {
        if value.is_empty() {
            return Ok(());
        }
        let text = value.to_text();
        let text = text.trim();
        let valid = match text.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && !text.chars().any(char::is_whitespace)
                    && domain
                        .split('.')
                        .filter(|label| !label.is_empty())
                        .count()
                        >= 2
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
            }
            None => false,
        };
        if !valid {
            return Err(RuleError::new("Must be a valid e-mail address."));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Integer;

impl Rule for Integer {
    fn check(&self, value: &Value) -> Result<(), RuleError> {
        if value.is_empty() || value.as_int().is_some() {
            return Ok(());
        }
        Err(RuleError::new("Must be an integer."))
    }
}

/// Absolute URL with an `http` or `https` scheme.
#[derive(Debug, Clone, Default)]
pub struct HttpUrl;

impl Rule for HttpUrl {
    fn check(&self, value: &Value) -> Result<(), RuleError> {
        if value.is_empty() {
            return Ok(());
        }
        match Url::parse(value.to_text().trim()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
            _ => Err(RuleError::new("Must be a valid http(s) URL.")),
        }
    }
}

type PredicateFn = dyn Fn(&Value) -> bool + Send + Sync;

/// Application-supplied check with a fixed failure message.
#[derive(Clone)]
pub struct Predicate {
    message: String,
    check: Arc<PredicateFn>,
}

impl Predicate {
    pub fn new(
        message: impl Into<String>,
        check: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            check: Arc::new(check),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl Rule for Predicate {
    fn check(&self, value: &Value) -> Result<(), RuleError> {
        if value.is_empty() || (self.check)(value) {
            return Ok(());
        }
        Err(RuleError::new(self.message.clone()))
    }
}

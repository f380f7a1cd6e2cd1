use serde_json::Value as JsonValue;

use super::Form;
use super::error::FormError;

/// Extension points of a concrete form type.
///
/// `on_setup_widgets` is mandatory; the other hooks default to no-ops. Hooks
/// receive the form mutably so they can declare attributes, add widgets and
/// inspect values.
pub trait FormHandler: Send + Sync {
    /// Runs once per construction, after cached attributes are restored.
    fn on_setup_form(&self, _form: &mut Form) -> Result<(), FormError> {
        Ok(())
    }

    /// Adds the domain widgets for `form.current_step()`.
    fn on_setup_widgets(&self, form: &mut Form) -> Result<(), FormError>;

    /// Cross-field checks after every widget rule passed.
    fn on_validate(&self, _form: &mut Form) -> Result<(), FormError> {
        Ok(())
    }

    fn on_submit(&self, _form: &mut Form) -> Result<Option<SubmitOutcome>, FormError> {
        Ok(None)
    }
}

/// What a submitted form hands back to the HTTP layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Redirect(String),
    Json(JsonValue),
}

/// The parts of the incoming request a form is allowed to see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormRequest {
    pub path: String,
    pub referrer: Option<String>,
    pub redirect: Option<String>,
}

impl FormRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    pub fn with_redirect(mut self, redirect: impl Into<String>) -> Self {
        self.redirect = Some(redirect.into());
        self
    }
}

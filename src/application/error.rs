use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{dispenser::DispenseError, form::FormError},
    config::LoadError,
    infra::error::InfraError,
};

/// Diagnostic chain attached to error responses for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// An error response whose body is a fixed public message.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn public_message(&self) -> &'static str {
        self.public_message
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<DispenseError> for HttpError {
    fn from(error: DispenseError) -> Self {
        HttpError::from_error(
            "application::error::dispense_error_to_http_error",
            StatusCode::NOT_FOUND,
            "Form not found",
            &error,
        )
    }
}

impl From<FormError> for HttpError {
    fn from(error: FormError) -> Self {
        const SOURCE: &str = "application::error::form_error_to_http_error";
        let (status, message) = match &error {
            FormError::WidgetNotFound { .. } => (StatusCode::BAD_REQUEST, "Unknown form field"),
            FormError::Validation(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "Form validation failed")
            }
            FormError::Attribute { .. } => (StatusCode::BAD_REQUEST, "Invalid form attribute"),
            FormError::Rejected { .. } => (StatusCode::CONFLICT, "Form was rejected"),
            FormError::Configuration { .. } | FormError::Cache(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };
        HttpError::from_error(SOURCE, status, message, &error)
    }
}

/// Top-level error of the binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error(transparent)]
    Form(#[from] FormError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_collects_the_source_chain() {
        let error = FormError::from(crate::cache::CacheError::KeyNotExist {
            pool: "form.form_cid".to_string(),
            key: "abc".to_string(),
        });
        let report = ErrorReport::from_error("test", StatusCode::INTERNAL_SERVER_ERROR, &error);
        assert!(!report.messages.is_empty());
        assert!(report.messages[0].contains("abc"));
    }

    #[test]
    fn form_errors_map_to_statuses() {
        let cases = [
            (FormError::widget_not_found("x"), StatusCode::BAD_REQUEST),
            (FormError::configuration("dup"), StatusCode::INTERNAL_SERVER_ERROR),
            (FormError::rejected("closed"), StatusCode::CONFLICT),
            (FormError::attribute("steps", "zero"), StatusCode::BAD_REQUEST),
        ];
        for (error, status) in cases {
            assert_eq!(HttpError::from(error).status(), status);
        }
        assert_eq!(
            HttpError::from(DispenseError::InvalidId).status(),
            StatusCode::NOT_FOUND
        );
    }
}

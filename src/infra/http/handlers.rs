use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Form as UrlEncoded, OriginalUri, Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{
    application::{
        error::{ErrorReport, HttpError},
        form::{Form, FormError, FormRequest, SubmitOutcome, ValidationErrors},
    },
    domain::{Value, WidgetView},
};

use super::HttpState;

/// Query/body key carrying the post-submit redirect target.
pub const REDIRECT_FIELD: &str = "__redirect";

#[derive(Debug, Deserialize)]
pub struct WidgetsRequest {
    pub step: u32,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub step: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

pub async fn form_widgets(
    State(state): State<HttpState>,
    Path(form_id): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Json(body): Json<WidgetsRequest>,
) -> Result<Json<Vec<WidgetView>>, HttpError> {
    const SOURCE: &str = "infra::http::form_widgets";

    let step = checked_step(SOURCE, body.step)?;
    let mut form = state
        .dispenser
        .dispense(&form_id, form_request(uri.path(), &headers, None))?;
    prepare_step(&mut form, step, body.name)?;

    Ok(Json(form.widget_views(Some(step))))
}

pub async fn form_validate(
    State(state): State<HttpState>,
    Path(form_id): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Json(body): Json<ValidateRequest>,
) -> Result<Response, HttpError> {
    const SOURCE: &str = "infra::http::form_validate";

    let step = checked_step(SOURCE, body.step)?;
    let mut form = state
        .dispenser
        .dispense(&form_id, form_request(uri.path(), &headers, None))?;
    prepare_step(&mut form, step, body.name)?;

    let fields = body
        .fields
        .into_iter()
        .map(|(key, value)| (key, Value::from(value)));
    form.fill(fields)?;

    match form.validate() {
        Ok(_) => Ok(Json(json!({ "status": true })).into_response()),
        Err(FormError::Validation(errors)) => {
            debug!(form_id = %form_id, step, failed = errors.len(), "Step validation failed");
            Ok(Json(validation_body(&errors)).into_response())
        }
        Err(other) => Err(other.into()),
    }
}

pub async fn form_submit(
    State(state): State<HttpState>,
    Path(form_id): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    UrlEncoded(pairs): UrlEncoded<Vec<(String, String)>>,
) -> Result<Response, HttpError> {
    const SOURCE: &str = "infra::http::form_submit";

    let (values, body_redirect) = collect_fields(pairs);
    let redirect = uri.query().and_then(query_redirect).or(body_redirect);

    let mut form = state
        .dispenser
        .dispense(&form_id, form_request(uri.path(), &headers, redirect))?;

    form.remove_widgets();
    for step in 1..=form.steps() {
        form.setup_widgets(step)?;
    }
    form.fill(values)?;

    match form.validate() {
        Ok(_) => {}
        Err(FormError::Validation(errors)) => {
            let error = FormError::Validation(errors.clone());
            let mut response = (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(validation_body(&errors)),
            )
                .into_response();
            ErrorReport::from_error(SOURCE, StatusCode::UNPROCESSABLE_ENTITY, &error)
                .attach(&mut response);
            return Ok(response);
        }
        Err(other) => return Err(other.into()),
    }

    let response = match form.submit()? {
        Some(SubmitOutcome::Redirect(location)) => Redirect::to(&location).into_response(),
        Some(SubmitOutcome::Json(payload)) => Json(payload).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    };
    Ok(response)
}

fn checked_step(source: &'static str, step: u32) -> Result<u32, HttpError> {
    if step == 0 {
        return Err(HttpError::new(
            source,
            StatusCode::BAD_REQUEST,
            "Invalid form step",
            "steps are numbered from 1",
        ));
    }
    Ok(step)
}

fn prepare_step(form: &mut Form, step: u32, name: Option<String>) -> Result<(), FormError> {
    if let Some(name) = name.filter(|name| !name.is_empty()) {
        form.set_name(name)?;
    }
    form.remove_widgets();
    form.setup_widgets(step)?;
    Ok(())
}

fn form_request(path: &str, headers: &HeaderMap, redirect: Option<String>) -> FormRequest {
    let mut request = FormRequest::new(path);
    if let Some(referrer) = headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
    {
        request = request.with_referrer(referrer);
    }
    if let Some(redirect) = redirect.filter(|target| !target.is_empty()) {
        request = request.with_redirect(redirect);
    }
    request
}

/// Group repeated keys into list values, keeping first-seen order.
fn collect_fields(pairs: Vec<(String, String)>) -> (Vec<(String, Value)>, Option<String>) {
    let mut redirect = None;
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();

    for (key, value) in pairs {
        if key == REDIRECT_FIELD {
            redirect = Some(value);
            continue;
        }
        match grouped.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, values)) => values.push(value),
            None => grouped.push((key, vec![value])),
        }
    }

    let values = grouped
        .into_iter()
        .map(|(key, mut values)| {
            let value = if values.len() == 1 {
                Value::from(values.remove(0))
            } else {
                Value::from(values)
            };
            (key, value)
        })
        .collect();
    (values, redirect)
}

fn query_redirect(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == REDIRECT_FIELD)
        .map(|(_, value)| value.into_owned())
}

fn validation_body(errors: &ValidationErrors) -> serde_json::Value {
    json!({ "status": false, "messages": errors })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_keys_become_lists() {
        let (values, redirect) = collect_fields(vec![
            ("tags".to_string(), "a".to_string()),
            ("email".to_string(), "x@example.com".to_string()),
            ("tags".to_string(), "b".to_string()),
            (REDIRECT_FIELD.to_string(), "/thanks".to_string()),
        ]);

        assert_eq!(redirect.as_deref(), Some("/thanks"));
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].0, "tags");
        assert_eq!(
            values[0].1,
            Value::from(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(values[1].1, Value::from("x@example.com"));
    }

    #[test]
    fn form_request_reads_the_referrer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::REFERER, "/contact".parse().expect("header value"));

        let request = form_request("/form/submit/abc", &headers, Some(String::new()));
        assert_eq!(request.path, "/form/submit/abc");
        assert_eq!(request.referrer.as_deref(), Some("/contact"));
        assert_eq!(request.redirect, None);
    }

    #[test]
    fn redirect_is_read_from_the_query() {
        assert_eq!(
            query_redirect("a=1&__redirect=%2Fthanks%3Fok%3D1").as_deref(),
            Some("/thanks?ok=1")
        );
        assert_eq!(query_redirect("a=1"), None);
    }

    #[test]
    fn step_zero_is_rejected() {
        let err = checked_step("test", 0).expect_err("step zero");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(checked_step("test", 2).expect("valid step"), 2);
    }
}

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use metrics_util::debugging::DebuggingRecorder;
use stepform::application::form::FormRequest;
use stepform::catalog::SignupForm;
use stepform::config::CacheSettings;
use stepform::infra::{bootstrap, http, telemetry};
use tower::ServiceExt;

#[tokio::test]
async fn form_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    // A single-entry pool forces evictions once a second form goes stateful.
    let settings = CacheSettings {
        ttl: Duration::from_secs(60),
        pool_capacity: NonZeroUsize::new(1).expect("non-zero capacity"),
    };
    let app = bootstrap::build_application_context(&settings).expect("catalog registers");
    let router = http::build_router(app.http_state());

    let first = app
        .dispenser
        .create(SignupForm::CLASS_ID, FormRequest::new("/signup"), Vec::new())
        .expect("first signup form");
    let second = app
        .dispenser
        .create(SignupForm::CLASS_ID, FormRequest::new("/signup"), Vec::new())
        .expect("second signup form");

    // The first id was evicted: a miss. The second one is a hit.
    assert!(
        app.dispenser
            .dispense(&first.id().to_string(), FormRequest::default())
            .is_err()
    );
    let second_id = second.id().to_string();

    let requests = [
        (
            format!("/form/submit/{second_id}"),
            "email=ada%40example.com",
            StatusCode::UNPROCESSABLE_ENTITY,
        ),
        (
            format!("/form/submit/{second_id}"),
            "email=ada%40example.com&phone=%2B1+555+010+9999",
            StatusCode::OK,
        ),
    ];
    for (uri, body, expected) in requests {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("request should build");
        let response = router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        assert_eq!(response.status(), expected);
    }

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "stepform_cache_hit_total",
        "stepform_cache_miss_total",
        "stepform_cache_evict_total",
        "stepform_forms_created_total",
        "stepform_validation_failed_total",
        "stepform_forms_submitted_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}

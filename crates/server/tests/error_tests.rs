use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::DbErr;
use tithe_declare::error::ApiError;
use tithe_declare::response::Output;

async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, serde_json::from_slice(&bytes).expect("json"))
}

#[tokio::test]
async fn test_error_envelope_shape() {
    let (status, body) = render(ApiError::missing("ClientId")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["data"].is_null());
    assert!(body["meta"].is_null());
    assert_eq!(body["error"]["Id"], "missing_param");
    assert_eq!(body["error"]["Title"], "Missing Parameter");
    assert_eq!(body["error"]["Detail"], "missing parameter: ClientId");
    assert_eq!(body["error"]["Status"], 400);
}

#[tokio::test]
async fn test_storage_errors_do_not_leak() {
    let (status, body) = render(ApiError::from(DbErr::Custom(
        "constraint login.email_addr violated".into(),
    )))
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["Id"], "general");
    assert!(!body["error"]["Detail"].as_str().unwrap().contains("email_addr"));
}

#[tokio::test]
async fn test_status_per_kind() {
    let cases = [
        (ApiError::ResetTokenInvalid, StatusCode::BAD_REQUEST),
        (ApiError::LoginInactive, StatusCode::FORBIDDEN),
        (ApiError::NotFound("role".into()), StatusCode::NOT_FOUND),
        (ApiError::Conflict("role".into()), StatusCode::CONFLICT),
        (ApiError::MissingAcceptHeader, StatusCode::NOT_ACCEPTABLE),
        (ApiError::MissingRoute("GET/x".into()), StatusCode::NOT_FOUND),
        (ApiError::InvalidMethod("plain".into()), StatusCode::BAD_REQUEST),
    ];
    for (err, expected) in cases {
        let (status, body) = render(err).await;
        assert_eq!(status, expected);
        assert_eq!(body["error"]["Status"], expected.as_u16());
    }
}

#[test]
fn test_success_envelope_has_no_error() {
    let json = serde_json::to_value(Output::list(vec!["a", "b"], 2)).unwrap();
    assert!(json["error"].is_null());
    assert_eq!(json["meta"]["total_count"], 2);
}

//! Integration tests for the HTTP API surface: authentication, admin tenant
//! management, tenant-scoped queries, and the OAuth endpoints.

use axum::body::Body;
use axum::http::{header::LOCATION, Request, StatusCode};
use broker::models::sync_job::KIND_ON_DEMAND;
use broker::repositories::SyncJobRepository;
use broker::server::create_app;
use serde_json::{json, Value};
use tower::ServiceExt;
use url::Url;
use uuid::Uuid;

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::{build_state, register_tenant, test_config, ADMIN_TOKEN};

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn root_reports_service_info() {
    let state = build_state(test_config()).await.unwrap();
    let app = create_app(state);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["name"], "broker");
}

#[tokio::test]
async fn healthz_reports_database_ok() {
    let state = build_state(test_config()).await.unwrap();
    let app = create_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["database"], "ok");
}

#[tokio::test]
async fn tenant_routes_require_bearer_token() {
    let state = build_state(test_config()).await.unwrap();
    let app = create_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/credentials")
                .header("X-Tenant-Id", Uuid::new_v4().to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
    assert!(json["trace_id"].is_string());
}

#[tokio::test]
async fn tenant_routes_reject_malformed_tenant_header() {
    let state = build_state(test_config()).await.unwrap();
    let app = create_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/jobs/sync")
                .header("Authorization", format!("Bearer {}", ADMIN_TOKEN))
                .header("X-Tenant-Id", "not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn admin_upsert_registers_tenant_without_echoing_secret() {
    let state = build_state(test_config()).await.unwrap();
    let app = create_app(state.clone());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/tenants")
                .header("Authorization", format!("Bearer {}", ADMIN_TOKEN))
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({
                        "name": "Acme",
                        "endpoint_url": "https://acme.test/hooks/credentials",
                        "shared_secret": "very-secret"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["name"], "Acme");
    assert_eq!(json["endpoint_url"], "https://acme.test/hooks/credentials");
    assert!(json.get("shared_secret").is_none());

    let id: Uuid = json["id"].as_str().unwrap().parse().unwrap();

    // Updating the same id answers 200 instead of 201.
    let response = create_app(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/tenants")
                .header("Authorization", format!("Bearer {}", ADMIN_TOKEN))
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({
                        "id": id,
                        "name": "Acme Renamed",
                        "endpoint_url": "https://acme.test/hooks/v2",
                        "shared_secret": "rotated-secret"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["name"], "Acme Renamed");
    assert_eq!(json["endpoint_url"], "https://acme.test/hooks/v2");
}

#[tokio::test]
async fn admin_upsert_rejects_relative_endpoint_url() {
    let state = build_state(test_config()).await.unwrap();
    let app = create_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/tenants")
                .header("Authorization", format!("Bearer {}", ADMIN_TOKEN))
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({
                        "endpoint_url": "/hooks/credentials",
                        "shared_secret": "secret"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_FAILED");
    assert!(json["details"]["endpoint_url"].is_string());
}

#[tokio::test]
async fn credentials_listing_is_empty_for_fresh_tenant() {
    let state = build_state(test_config()).await.unwrap();
    let tenant_id = register_tenant(&state.db, "https://acme.test/hooks", "secret")
        .await
        .unwrap();
    let app = create_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/credentials")
                .header("Authorization", format!("Bearer {}", ADMIN_TOKEN))
                .header("X-Tenant-Id", tenant_id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json, json!([]));
}

#[tokio::test]
async fn token_endpoint_answers_404_without_credential() {
    let state = build_state(test_config()).await.unwrap();
    let tenant_id = register_tenant(&state.db, "https://acme.test/hooks", "secret")
        .await
        .unwrap();
    let app = create_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/credentials/token?platform=example")
                .header("Authorization", format!("Bearer {}", ADMIN_TOKEN))
                .header("X-Tenant-Id", tenant_id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn sync_job_listing_filters_by_status() {
    let state = build_state(test_config()).await.unwrap();
    let tenant_id = register_tenant(&state.db, "https://acme.test/hooks", "secret")
        .await
        .unwrap();

    let jobs = SyncJobRepository::new(state.db.clone());
    jobs.enqueue(tenant_id, "example", KIND_ON_DEMAND)
        .await
        .unwrap();

    let app = create_app(state);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/jobs/sync?status=pending")
                .header("Authorization", format!("Bearer {}", ADMIN_TOKEN))
                .header("X-Tenant-Id", tenant_id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let listing = json.as_array().unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0]["platform"], "example");
    assert_eq!(listing[0]["kind"], "on_demand");
    assert_eq!(listing[0]["status"], "pending");
    assert_eq!(listing[0]["priority"], 75);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/jobs/sync?status=failed")
                .header("Authorization", format!("Bearer {}", ADMIN_TOKEN))
                .header("X-Tenant-Id", tenant_id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn authorize_redirects_to_provider_with_state() {
    let state = build_state(test_config()).await.unwrap();
    let tenant_id = register_tenant(&state.db, "https://acme.test/hooks", "secret")
        .await
        .unwrap();
    let app = create_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/auth/example?tenant={}", tenant_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response.headers()[LOCATION].to_str().unwrap();
    let url = Url::parse(location).unwrap();
    assert_eq!(url.host_str(), Some("example.com"));

    let state_param = url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.to_string())
        .expect("state parameter present");
    assert!(!state_param.is_empty());

    let redirect = url
        .query_pairs()
        .find(|(k, _)| k == "redirect_uri")
        .map(|(_, v)| v.to_string())
        .expect("redirect_uri present");
    assert!(redirect.ends_with("/callback"));
}

#[tokio::test]
async fn authorize_unknown_platform_is_404() {
    let state = build_state(test_config()).await.unwrap();
    let tenant_id = register_tenant(&state.db, "https://acme.test/hooks", "secret")
        .await
        .unwrap();
    let app = create_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/auth/myspace?tenant={}", tenant_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn authorize_unregistered_tenant_is_404() {
    let state = build_state(test_config()).await.unwrap();
    let app = create_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/auth/example?tenant={}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn callback_provider_denial_bounces_to_landing() {
    let state = build_state(test_config()).await.unwrap();
    let app = create_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/callback?error=access_denied")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response.headers()[LOCATION].to_str().unwrap();
    assert!(location.starts_with("http://landing.test/connected"));
    assert!(location.contains("error=provider_denied"));
}

#[tokio::test]
async fn callback_without_code_bounces_to_landing() {
    let state = build_state(test_config()).await.unwrap();
    let app = create_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/callback?state=whatever")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response.headers()[LOCATION].to_str().unwrap();
    assert!(location.contains("error=invalid_callback"));
}

#[tokio::test]
async fn callback_with_garbage_state_bounces_to_landing() {
    let state = build_state(test_config()).await.unwrap();
    let app = create_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/callback?code=abc&state=garbage")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response.headers()[LOCATION].to_str().unwrap();
    assert!(location.contains("error=invalid_state"));
}

//! HTTP surface tests driving the routers with in-memory fakes.

mod support;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::Value;
use time::OffsetDateTime;
use tower::ServiceExt;

use folio::infra::http::{AdminState, PublicState, build_admin_router, build_public_router};

use support::Harness;

const TOKEN: &str = "test-admin-token";

fn routers(harness: &Harness) -> (Router, Router) {
    let public = build_public_router(PublicState {
        posts: harness.service.clone(),
    });
    let admin = build_admin_router(AdminState {
        posts: harness.service.clone(),
        token: Arc::from(TOKEN),
    });
    (public, admin)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn public_listing_returns_page_json() {
    let harness = Harness::new();
    harness.seed_published(
        "hello-world",
        "Hello World",
        OffsetDateTime::now_utc() - Duration::from_secs(600),
    );
    let (public, _) = routers(&harness);

    let response = public
        .oneshot(
            Request::builder()
                .uri("/posts?limit=10")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["items"].as_array().expect("items").len(), 1);
    assert_eq!(json["items"][0]["slug"], "hello-world");
    assert!(json["next_cursor"].is_null());
}

#[tokio::test]
async fn missing_post_detail_is_404() {
    let harness = Harness::new();
    let (public, _) = routers(&harness);

    let response = public
        .oneshot(
            Request::builder()
                .uri("/posts/no-such-slug")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_cursor_is_400() {
    let harness = Harness::new();
    let (public, _) = routers(&harness);

    let response = public
        .oneshot(
            Request::builder()
                .uri("/posts?cursor=%21%21%21")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_routes_require_the_bearer_token() {
    let harness = Harness::new();
    let (_, admin) = routers(&harness);

    let response = admin
        .clone()
        .oneshot(
            Request::builder()
                .uri("/admin/posts")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = admin
        .oneshot(
            Request::builder()
                .uri("/admin/posts")
                .header(header::AUTHORIZATION, "Bearer wrong-token")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_can_create_and_list_posts() {
    let harness = Harness::new();
    let (_, admin) = routers(&harness);

    let response = admin
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/posts")
                .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"title": "From The API"}"#))
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["slug"], "from-the-api");
    assert_eq!(created["status"], "draft");

    let response = admin
        .oneshot(
            Request::builder()
                .uri("/admin/posts")
                .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["items"][0]["is_synced"], true);
}

#[tokio::test]
async fn admin_delete_returns_no_content() {
    let harness = Harness::new();
    let id = harness.seed_draft("obsolete", "Obsolete");
    let (_, admin) = routers(&harness);

    let response = admin
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/admin/posts/{id}"))
                .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(harness.repo.post(id).is_none());
}

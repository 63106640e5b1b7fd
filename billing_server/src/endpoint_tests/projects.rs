use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use serde_json::{json, Value};

use super::{
    helpers::{project, register_apis, send_request},
    mocks::MockBillingBackend,
};
use crate::routes::UpdateProjectRoute;

fn configure(backend: MockBillingBackend) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        register_apis(cfg, MockBillingBackend::new(), backend);
        cfg.service(web::scope("/api").service(UpdateProjectRoute::<MockBillingBackend>::new()));
    }
}

fn known_project() -> MockBillingBackend {
    let mut backend = MockBillingBackend::new();
    backend.expect_fetch_project().returning(|id| Ok((id == "p1").then(project)));
    backend
}

#[actix_web::test]
async fn rename_project() {
    let mut backend = known_project();
    backend
        .expect_update_project()
        .withf(|p| p.name == "New shop" && p.description.is_none() && p.secret_key.reveal() == "s3cret")
        .times(1)
        .returning(|p| Ok(p.clone()));
    let req = TestRequest::patch().uri("/api/projects/p1").set_json(json!({"name": "New shop", "description": null}));
    let (status, body) = send_request(req, configure(backend)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let project: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(project["name"], "New shop");
    assert_eq!(project["min_payment_amount"], 10.0);
    assert!(project.get("secret_key").is_none());
}

#[actix_web::test]
async fn name_cannot_be_cleared() {
    let mut backend = known_project();
    backend.expect_update_project().never();
    let req = TestRequest::patch().uri("/api/projects/p1").set_json(json!({"name": null}));
    let (status, body) = send_request(req, configure(backend)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Invalid project update: name cannot be null"}"#);
}

#[actix_web::test]
async fn limits_must_stay_ordered() {
    let mut backend = known_project();
    backend.expect_update_project().never();
    let req = TestRequest::patch().uri("/api/projects/p1").set_json(json!({"min_payment_amount": 5000}));
    let (status, body) = send_request(req, configure(backend)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("greater than max_payment_amount"), "{body}");
}

#[actix_web::test]
async fn unknown_currency() {
    let mut backend = known_project();
    backend.expect_fetch_currency().returning(|_| Ok(None));
    backend.expect_update_project().never();
    let req = TestRequest::patch().uri("/api/projects/p1").set_json(json!({"limits_currency": "EUR"}));
    let (status, body) = send_request(req, configure(backend)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Currency EUR does not exist"}"#);
}

#[actix_web::test]
async fn unknown_project() {
    let req = TestRequest::patch().uri("/api/projects/p9").set_json(json!({"name": "Other"}));
    let (status, body) = send_request(req, configure(known_project())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"project with specified identifier not found"}"#);
}

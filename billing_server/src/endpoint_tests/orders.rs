use actix_web::{http::StatusCode, test::TestRequest, web::ServiceConfig};
use billing_engine::traits::PaymentGatewayError;
use serde_json::{json, Value};

use super::{
    helpers::{order, project, register_apis, send_request, usd, ORDER_ID},
    mocks::MockBillingBackend,
};
use crate::routes::{CreateOrderFormRoute, CreateOrderRoute, OrderByIdRoute};

fn catalog() -> MockBillingBackend {
    let mut backend = MockBillingBackend::new();
    backend.expect_fetch_project().returning(|id| Ok((id == "p1").then(project)));
    backend.expect_fetch_currency().returning(|code| Ok((code == "USD").then(usd)));
    backend
}

fn configure(backend: MockBillingBackend) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        register_apis(cfg, backend, MockBillingBackend::new());
        cfg.service(CreateOrderFormRoute::<MockBillingBackend>::new())
            .service(CreateOrderRoute::<MockBillingBackend>::new())
            .service(OrderByIdRoute::<MockBillingBackend>::new());
    }
}

#[actix_web::test]
async fn create_order() {
    let mut backend = catalog();
    backend.expect_fetch_order_by_project_order_id().times(1).returning(|_, _| Ok(None));
    backend.expect_insert_order().times(1).returning(|_| Ok(()));
    let req = TestRequest::post().uri("/order").set_json(json!({
        "project": "p1",
        "amount": 150,
        "currency": "usd",
        "order_id": "shop-9",
        "gift": true,
        "items": [{"sku": "A1"}],
    }));
    let (status, body) = send_request(req, configure(backend)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(order["project_income_amount"], 150.0);
    assert_eq!(order["project_income_currency"], "USD");
    assert_eq!(order["project_order_id"], "shop-9");
    assert_eq!(order["status"], 0);
    assert_eq!(order["is_json_request"], true);
    assert_eq!(order["project_params"], json!({"gift": "true"}));
}

#[actix_web::test]
async fn create_order_for_unknown_project() {
    let req = TestRequest::post().uri("/order").set_json(json!({"project": "p9", "amount": "150"}));
    let (status, body) = send_request(req, configure(catalog())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"project with specified identifier not found"}"#);
}

#[actix_web::test]
async fn create_order_without_amount() {
    let req = TestRequest::post().uri("/order").set_json(json!({"project": "p1"}));
    let (status, body) = send_request(req, configure(MockBillingBackend::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("amount"), "{body}");
}

#[actix_web::test]
async fn create_order_form_below_limits() {
    let req = TestRequest::post().uri("/order/form").set_form([("project", "p1"), ("amount", "5.00")]);
    let (status, body) = send_request(req, configure(catalog())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"order amount is lower than min allowed payment amount for project"}"#);
}

#[actix_web::test]
async fn storage_failures_are_masked() {
    let mut backend = catalog();
    backend.expect_insert_order().returning(|_| Err(PaymentGatewayError::DatabaseError("disk I/O error".into())));
    let req = TestRequest::post().uri("/order/form").set_form([("project", "p1"), ("amount", "50")]);
    let (status, body) = send_request(req, configure(backend)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, r#"{"error":"order can't create. try request later"}"#);
}

#[actix_web::test]
async fn fetch_order() {
    let mut backend = catalog();
    backend.expect_fetch_order_by_id().times(1).returning(|_| Ok(Some(order())));
    backend.expect_fetch_project_payment_methods().times(1).returning(|_| Ok(vec![]));
    let req = TestRequest::get().uri(&format!("/order/{ORDER_ID}"));
    let (status, body) = send_request(req, configure(backend)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(result["order"]["id"], ORDER_ID);
    assert_eq!(result["payment_methods"], json!({}));
}

#[actix_web::test]
async fn fetch_order_with_malformed_id() {
    let req = TestRequest::get().uri("/order/not-an-order");
    let (status, body) = send_request(req, configure(MockBillingBackend::new())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"order with specified identifier not found"}"#);
}

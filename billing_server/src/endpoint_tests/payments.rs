use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use billing_common::{Amount, Secret};
use billing_engine::{
    db_types::{Order, OrderPaymentMethod, OrderStatus},
    events::EventProducers,
    payment_system::{sign_notification, HandlerSettings, PaymentNotification, PaymentSystemRegistry, SIGNED_CALLBACK},
    OrderManagerApi,
};
use serde_json::{json, Value};

use super::{
    helpers::{order, register_apis, send_request, usd, ORDER_ID},
    mocks::MockBillingBackend,
};
use crate::routes::{CreatePaymentRoute, NotifyPaymentRoute};

const PS_SECRET: &str = "ps-secret";

fn configure(backend: MockBillingBackend) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        register_apis(cfg, backend, MockBillingBackend::new());
        cfg.service(CreatePaymentRoute::<MockBillingBackend>::new())
            .service(NotifyPaymentRoute::<MockBillingBackend>::new());
    }
}

// An order manager that can talk to the signed callback payment system
fn configure_with_payment_system(backend: MockBillingBackend) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let mut registry = PaymentSystemRegistry::default();
        registry.configure(SIGNED_CALLBACK, HandlerSettings {
            secret: Secret::new(PS_SECRET.to_string()),
            payment_url: "https://pay.example.com/checkout".to_string(),
            ..Default::default()
        });
        let api = OrderManagerApi::new(backend, EventProducers::default())
            .with_payment_systems(registry)
            .with_psp_accounting_currency(Some("USD".to_string()));
        cfg.app_data(web::Data::new(api)).service(NotifyPaymentRoute::<MockBillingBackend>::new());
    }
}

fn awaiting_payment() -> Order {
    let mut order = order();
    order.status = OrderStatus::PaymentSystemCreate;
    order.payment_method = Some(OrderPaymentMethod {
        id: "card".into(),
        name: "Bank card".into(),
        group_alias: "cards".into(),
        handler: SIGNED_CALLBACK.into(),
        payment_system_id: "ps1".into(),
        payment_system_accounting_currency: "USD".into(),
    });
    order
}

fn notification(amount: f64) -> PaymentNotification {
    let mut notification = PaymentNotification {
        order_id: ORDER_ID.parse().unwrap(),
        payment_method_order_id: Some("tx-77".into()),
        amount: Amount::from_f64(amount),
        currency: "USD".into(),
        account: Some("4111********1111".into()),
        closed_at: None,
        signature: String::new(),
    };
    notification.signature = sign_notification(PS_SECRET, &notification).unwrap();
    notification
}

#[actix_web::test]
async fn payment_form_requires_email() {
    let req = TestRequest::post().uri("/payment").set_form([("order_id", ORDER_ID), ("payment_method_id", "card")]);
    let (status, body) = send_request(req, configure(MockBillingBackend::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let response: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response["status"], "error_validation");
    assert_eq!(response["message"], "required field \"email\" not found");
    assert_eq!(response["redirect_url"], "");
}

#[actix_web::test]
async fn payment_form_for_paid_order() {
    let mut backend = MockBillingBackend::new();
    backend.expect_fetch_order_by_id().returning(|_| {
        let mut order = order();
        order.status = OrderStatus::PaymentSystemComplete;
        Ok(Some(order))
    });
    backend.expect_update_order().never();
    let req = TestRequest::post().uri("/payment").set_form([
        ("order_id", ORDER_ID),
        ("payment_method_id", "card"),
        ("email", "payer@example.com"),
    ]);
    let (status, body) = send_request(req, configure(backend)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let response: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response["message"], "order with specified identifier payed early");
}

#[actix_web::test]
async fn notify_unknown_order() {
    let mut backend = MockBillingBackend::new();
    backend.expect_fetch_order_by_id().returning(|_| Ok(None));
    let req = TestRequest::post().uri("/payment/notify").set_json(notification(100.0));
    let (status, body) = send_request(req, configure(backend)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"order with specified identifier not found"}"#);
}

#[actix_web::test]
async fn notify_order_that_is_not_awaiting_payment() {
    let mut backend = MockBillingBackend::new();
    backend.expect_fetch_order_by_id().returning(|_| Ok(Some(order())));
    backend.expect_update_order().never();
    let req = TestRequest::post().uri("/payment/notify").set_json(notification(100.0));
    let (status, body) = send_request(req, configure(backend)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"order with specified identifier already ended (status is 0)"}"#);
}

#[actix_web::test]
async fn notify_completes_payment() {
    let mut backend = MockBillingBackend::new();
    backend.expect_fetch_order_by_id().times(1).returning(|_| Ok(Some(awaiting_payment())));
    backend.expect_fetch_currency().returning(|_| Ok(Some(usd())));
    backend
        .expect_update_order()
        .withf(|order| {
            order.status == OrderStatus::PaymentSystemComplete &&
                order.amount_in_psp_accounting_currency == Amount::from_f64(100.0) &&
                order.payment_method_order_id.as_deref() == Some("tx-77")
        })
        .times(1)
        .returning(|_| Ok(()));
    let req = TestRequest::post().uri("/payment/notify").set_json(notification(100.0));
    let (status, body) = send_request(req, configure_with_payment_system(backend)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let response: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response, json!({"order_id": ORDER_ID, "status": 4, "accepted": true}));
}

#[actix_web::test]
async fn notify_with_bad_signature_is_recorded_as_rejected() {
    let mut backend = MockBillingBackend::new();
    backend.expect_fetch_order_by_id().times(1).returning(|_| Ok(Some(awaiting_payment())));
    backend.expect_fetch_currency().returning(|_| Ok(Some(usd())));
    backend
        .expect_update_order()
        .withf(|order| order.status == OrderStatus::PaymentSystemReject)
        .times(1)
        .returning(|_| Ok(()));
    let mut notification = notification(100.0);
    notification.amount = Amount::from_f64(1000.0);
    let req = TestRequest::post().uri("/payment/notify").set_json(notification);
    let (status, body) = send_request(req, configure_with_payment_system(backend)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let response: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response["accepted"], false);
    assert_eq!(response["status"], 3);
    assert_eq!(response["reason"], "Payment notification signature is invalid");
}

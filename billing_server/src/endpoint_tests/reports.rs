use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use billing_common::Amount;
use billing_engine::{
    db_types::OrderStatus,
    revenue_objects::{FacetPoint, FacetSummary, RevenueDynamicFacets, RevenuePeriod, RevenuePointKey},
};
use serde_json::{json, Value};

use super::{
    helpers::{order, register_apis, send_request, usd, ORDER_ID},
    mocks::MockBillingBackend,
};
use crate::routes::{OrdersRoute, RevenueDynamicRoute};

fn configure(backend: MockBillingBackend) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        register_apis(cfg, backend, MockBillingBackend::new());
        cfg.service(
            web::scope("/api")
                .service(OrdersRoute::<MockBillingBackend>::new())
                .service(RevenueDynamicRoute::<MockBillingBackend>::new()),
        );
    }
}

#[actix_web::test]
async fn orders_without_projects() {
    let mut backend = MockBillingBackend::new();
    backend.expect_count_orders().never();
    backend.expect_search_orders().never();
    let req = TestRequest::get().uri("/api/orders?status=4");
    let (status, body) = send_request(req, configure(backend)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"count": 0, "items": []}));
}

#[actix_web::test]
async fn orders_page() {
    let mut backend = MockBillingBackend::new();
    backend
        .expect_count_orders()
        .withf(|filter| {
            filter.projects == ["p1", "p2"] &&
                filter.statuses == [OrderStatus::PaymentSystemComplete] &&
                filter.countries == ["GB"]
        })
        .times(1)
        .returning(|_| Ok(11));
    backend
        .expect_search_orders()
        .withf(|_, limit, offset| *limit == 5 && *offset == 10)
        .times(1)
        .returning(|_, _, _| Ok(vec![order()]));
    backend.expect_fetch_currency().returning(|_| Ok(Some(usd())));
    let req = TestRequest::get()
        .uri("/api/orders?project[]=p1&project[]=p2&status[]=4&country=gb&limit=5&offset=10");
    let (status, body) = send_request(req, configure(backend)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let page: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(page["count"], 11);
    assert_eq!(page["items"][0]["id"], ORDER_ID);
    assert_eq!(page["items"][0]["project_technical_income"]["amount"], 100.0);
    assert_eq!(page["items"][0]["project_technical_income"]["currency"]["code_int"], 840);
}

#[actix_web::test]
async fn orders_with_bad_paging() {
    let req = TestRequest::get().uri("/api/orders?project=p1&limit=many");
    let (status, body) = send_request(req, configure(MockBillingBackend::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("limit=many"), "{body}");
}

#[actix_web::test]
async fn revenue_requires_a_period() {
    let req = TestRequest::get().uri("/api/revenue_dynamic?project=p1&from=1704067200&to=1706745600");
    let (status, body) = send_request(req, configure(MockBillingBackend::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Invalid query parameter. period is required"}"#);

    let req = TestRequest::get().uri("/api/revenue_dynamic?project=p1&period=decade&from=1704067200&to=1706745600");
    let (status, _) = send_request(req, configure(MockBillingBackend::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn revenue_less_refunds() {
    let day = |d| RevenuePointKey { year: 2024, month: Some(1), day: Some(d), ..Default::default() };
    let mut backend = MockBillingBackend::new();
    backend
        .expect_revenue_dynamic()
        .withf(|request| request.projects == ["p1"] && request.period == RevenuePeriod::Day)
        .times(1)
        .returning(move |_| {
            Ok(RevenueDynamicFacets {
                points_revenue: vec![
                    FacetPoint { key: day(10), total: Amount::from_f64(100.0) },
                    FacetPoint { key: day(11), total: Amount::from_f64(20.0) },
                ],
                points_refund: vec![FacetPoint { key: day(10), total: Amount::from_f64(30.0) }],
                revenue: FacetSummary::new(3, Amount::from_f64(120.0)),
                refund: FacetSummary::new(1, Amount::from_f64(30.0)),
            })
        });
    let req = TestRequest::get().uri("/api/revenue_dynamic?project=p1&period=day&from=1704067200&to=1706745600");
    let (status, body) = send_request(req, configure(backend)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(result["points"][0], json!({"date": {"year": 2024, "month": 1, "day": 10}, "amount": 70.0}));
    assert_eq!(result["points"][1]["amount"], 20.0);
    assert_eq!(result["revenue"]["count"], 3);
    assert_eq!(result["refund"]["total"], 30.0);
}

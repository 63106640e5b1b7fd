use std::collections::HashMap;

use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use billing_common::{Amount, Secret};
use billing_engine::{
    db_types::{Currency, Merchant, Order, OrderFees, OrderId, OrderProject, OrderStatus, PayerData, Project},
    events::EventProducers,
    OrderManagerApi,
    ProjectApi,
};
use chrono::{TimeZone, Utc};
use log::debug;

use super::mocks::MockBillingBackend;
use crate::config::ServerOptions;

pub async fn send_request(req: TestRequest, configure: impl FnOnce(&mut ServiceConfig)) -> (StatusCode, String) {
    let _ = env_logger::try_init();
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}

/// Registers the order manager and project APIs, backed by the given mocks.
pub fn register_apis(cfg: &mut ServiceConfig, orders_backend: MockBillingBackend, projects_backend: MockBillingBackend) {
    cfg.app_data(web::Data::new(OrderManagerApi::new(orders_backend, EventProducers::default())))
        .app_data(web::Data::new(ProjectApi::new(projects_backend)))
        .app_data(web::Data::new(ServerOptions::default()));
}

pub fn usd() -> Currency {
    Currency { code_int: 840, code_a3: "USD".into(), name: "US Dollar".into() }
}

pub fn project() -> Project {
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    Project {
        id: "p1".into(),
        merchant: Merchant {
            id: "m1".into(),
            name: "Merchant".into(),
            currency: "USD".into(),
            is_vat_enabled: false,
            is_commission_to_user_enabled: false,
        },
        name: "Shop".into(),
        description: None,
        is_active: true,
        secret_key: Secret::new("s3cret".to_string()),
        callback_currency: "USD".into(),
        limits_currency: "USD".into(),
        min_payment_amount: Amount::from_f64(10.0),
        max_payment_amount: Amount::from_f64(1000.0),
        only_fixed_amounts: false,
        allow_dynamic_notify_urls: false,
        allow_dynamic_redirect_urls: false,
        payment_methods: vec![],
        fixed_packages: HashMap::new(),
        created_at: at,
        updated_at: at,
    }
}

pub const ORDER_ID: &str = "0123456789abcdef01234567";

pub fn order() -> Order {
    let at = Utc.with_ymd_and_hms(2024, 3, 15, 18, 30, 0).unwrap();
    Order {
        id: ORDER_ID.parse::<OrderId>().unwrap(),
        project: OrderProject {
            id: "p1".into(),
            name: "Shop".into(),
            merchant_id: "m1".into(),
            merchant_currency: "USD".into(),
        },
        description: "Gold membership".into(),
        project_order_id: Some("shop-1".into()),
        project_account: Some("alice".into()),
        project_income_amount: Amount::from_f64(100.0),
        project_income_currency: "USD".into(),
        project_outcome_amount: Amount::from_f64(100.0),
        project_outcome_currency: "USD".into(),
        project_params: HashMap::new(),
        payer: PayerData::default(),
        payment_method: None,
        payment_method_outcome_amount: Amount::ZERO,
        payment_method_outcome_currency: None,
        payment_method_income_amount: Amount::ZERO,
        payment_method_income_currency: None,
        payment_method_order_id: None,
        payment_method_account: None,
        payment_method_order_closed_at: None,
        fees: OrderFees::default(),
        amount_in_merchant_accounting_currency: Amount::from_f64(100.0),
        amount_out_merchant_accounting_currency: Amount::ZERO,
        amount_in_psp_accounting_currency: Amount::ZERO,
        amount_in_payment_system_accounting_currency: Amount::ZERO,
        status: OrderStatus::New,
        fixed_package: None,
        payment_requisites: HashMap::new(),
        is_json_request: true,
        created_at: at,
        updated_at: at,
    }
}

use std::collections::BTreeMap;

use billing_common::Amount;
use billing_engine::{
    db_types::{ExchangeRate, Order, OrderStatus},
    order_objects::{ListOrdersRequest, OrderCreateRequest},
    revenue_objects::{RevenueDynamicRequest, RevenuePeriod},
    ExchangeRates,
    OrderManagement,
    OrderManagerApi,
    SqliteDatabase,
};
use chrono::{DateTime, TimeZone, Utc};

mod support;

use support::{setup, tear_down, BRITISH_IP};

async fn new_order(api: &OrderManagerApi<SqliteDatabase>, params: &[(&str, &str)], ip: Option<&str>) -> Order {
    let params: BTreeMap<String, String> = params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    let request = OrderCreateRequest::from_params(params, true).unwrap().with_ip(ip.map(|s| s.parse().unwrap()));
    api.process_new_order(request).await.unwrap()
}

fn list(projects: &[&str], values: &[(&str, &str)]) -> ListOrdersRequest {
    ListOrdersRequest {
        projects: projects.iter().map(|p| p.to_string()).collect(),
        values: values.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        limit: 0,
        offset: 0,
    }
}

/// Three p1 orders and one p2 order
async fn seed_orders(api: &OrderManagerApi<SqliteDatabase>) -> Vec<Order> {
    vec![
        new_order(api, &[("project", "p1"), ("amount", "20"), ("account", "Alice")], None).await,
        new_order(api, &[("project", "p1"), ("amount", "30"), ("account", "bob"), ("payment_method", "card")], None).await,
        new_order(api, &[("project", "p1"), ("amount", "40"), ("payer_email", "carol@alice.example")], Some(BRITISH_IP))
            .await,
        new_order(api, &[("project", "p2"), ("amount", "50"), ("account", "alice")], None).await,
    ]
}

#[tokio::test]
async fn orders_are_scoped_to_projects() {
    let api = setup().await;
    let orders = seed_orders(&api).await;

    let page = api.find_orders(&list(&["p1"], &[])).await.unwrap();
    assert_eq!(page.count, 3);
    assert_eq!(page.items.len(), 3);
    assert!(page.items.iter().all(|o| o.project.id == "p1"));
    // Newest first
    assert_eq!(page.items[0].id, orders[2].id);

    let page = api.find_orders(&list(&["p1", "p2"], &[])).await.unwrap();
    assert_eq!(page.count, 4);

    let page = api.find_orders(&list(&[], &[])).await.unwrap();
    assert_eq!(page.count, 0);
    assert!(page.items.is_empty());
    tear_down(api.db()).await;
}

#[tokio::test]
async fn filters() {
    let api = setup().await;
    let orders = seed_orders(&api).await;

    // Account search is a case-insensitive substring match over accounts, phone and email
    let page = api.find_orders(&list(&["p1"], &[("account", "ALI")])).await.unwrap();
    assert_eq!(page.count, 2);

    let page = api.find_orders(&list(&["p1"], &[("payment_method[]", "pm_card")])).await.unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.items[0].id, orders[1].id);
    assert_eq!(page.items[0].payment_method.as_ref().unwrap().id, "pm_card");

    let page = api.find_orders(&list(&["p1"], &[("country", "gb")])).await.unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.items[0].payer.country_code.as_deref(), Some("GB"));

    let id = orders[0].id.to_string();
    let page = api.find_orders(&list(&["p1"], &[("id", &id)])).await.unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.items[0].account.as_deref(), Some("Alice"));
    // The order exists, but not in the caller's projects
    let id = orders[3].id.to_string();
    assert_eq!(api.find_orders(&list(&["p1"], &[("id", &id)])).await.unwrap().count, 0);
    assert_eq!(api.find_orders(&list(&["p1"], &[("id", "not-an-order")])).await.unwrap().count, 0);

    let page = api.find_orders(&list(&["p1"], &[("status[]", "0"), ("status[]", "4")])).await.unwrap();
    assert_eq!(page.count, 3);
    let page = api.find_orders(&list(&["p1"], &[("status", "4")])).await.unwrap();
    assert_eq!(page.count, 0);

    let tomorrow = (Utc::now().timestamp() + 86_400).to_string();
    let page = api.find_orders(&list(&["p1"], &[("project_date_from", &tomorrow)])).await.unwrap();
    assert_eq!(page.count, 0);
    let page = api.find_orders(&list(&["p1"], &[("project_date_to", &tomorrow)])).await.unwrap();
    assert_eq!(page.count, 3);
    tear_down(api.db()).await;
}

#[tokio::test]
async fn pages_and_summaries() {
    let api = setup().await;
    seed_orders(&api).await;

    let mut request = list(&["p1"], &[]);
    request.limit = 2;
    let first = api.find_orders(&request).await.unwrap();
    assert_eq!(first.count, 3);
    assert_eq!(first.items.len(), 2);
    request.offset = 2;
    let second = api.find_orders(&request).await.unwrap();
    assert_eq!(second.count, 3);
    assert_eq!(second.items.len(), 1);
    assert!(first.items.iter().all(|o| o.id != second.items[0].id));

    let item = &second.items[0];
    assert_eq!(item.project_technical_income.amount, Amount::from_f64(20.0));
    assert_eq!(item.project_technical_income.currency.code_int, 840);
    assert_eq!(item.status.status, 0);
    assert!(item.payment_system_technical_income.is_none());
    assert!(item.confirmed_at.is_none());
    tear_down(api.db()).await;
}

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
}

async fn settle(api: &OrderManagerApi<SqliteDatabase>, mut order: Order, status: OrderStatus, created_at: DateTime<Utc>) {
    order.status = status;
    order.amount_out_merchant_accounting_currency = order.amount_in_merchant_accounting_currency;
    order.created_at = created_at;
    api.db().update_order(&order).await.unwrap();
}

#[tokio::test]
async fn revenue_less_refunds() {
    let api = setup().await;
    let sale = new_order(&api, &[("project", "p1"), ("amount", "100")], None).await;
    let refund = new_order(&api, &[("project", "p1"), ("amount", "30")], None).await;
    let late_refund = new_order(&api, &[("project", "p1"), ("amount", "15")], None).await;
    let pending = new_order(&api, &[("project", "p1"), ("amount", "500")], None).await;
    let other = new_order(&api, &[("project", "p2"), ("amount", "900")], None).await;
    settle(&api, sale, OrderStatus::PaymentSystemComplete, at(10, 9)).await;
    settle(&api, refund, OrderStatus::Refund, at(10, 17)).await;
    settle(&api, late_refund, OrderStatus::Refund, at(12, 8)).await;
    settle(&api, pending, OrderStatus::PaymentSystemCreate, at(10, 12)).await;
    settle(&api, other, OrderStatus::ProjectComplete, at(10, 12)).await;

    let request = RevenueDynamicRequest {
        projects: vec!["p1".into()],
        period: RevenuePeriod::Day,
        from: at(1, 0),
        to: at(31, 0),
    };
    let result = api.revenue_dynamic(&request).await.unwrap();
    assert_eq!(result.points.len(), 1);
    assert_eq!(result.points[0].date.to_string(), "2024-01-10");
    assert_eq!(result.points[0].amount, Amount::from_f64(70.0));
    assert_eq!(result.revenue.count, 1);
    assert_eq!(result.revenue.total, Amount::from_f64(100.0));
    assert_eq!(result.refund.count, 2);
    assert_eq!(result.refund.total, Amount::from_f64(45.0));

    let request = RevenueDynamicRequest { period: RevenuePeriod::Month, ..request };
    let result = api.revenue_dynamic(&request).await.unwrap();
    assert_eq!(result.points.len(), 1);
    assert_eq!(result.points[0].date.to_string(), "2024-01");
    assert_eq!(result.points[0].amount, Amount::from_f64(55.0));

    let request = RevenueDynamicRequest { projects: vec![], ..request };
    let result = api.revenue_dynamic(&request).await.unwrap();
    assert!(result.points.is_empty());
    assert_eq!(result.revenue.count, 0);
    tear_down(api.db()).await;
}

#[tokio::test]
async fn exchange_rates() {
    let api = setup().await;
    let db = api.db();
    let rate = db.fetch_rate("USD", "EUR").await.unwrap();
    assert_eq!(rate.rate, 0.9);
    let inverse = db.fetch_rate("EUR", "USD").await.unwrap();
    assert!((inverse.rate - 1.0 / 0.9).abs() < 1e-9);
    assert_eq!(db.convert("USD", "USD", Amount::from_f64(12.34)).await.unwrap(), Amount::from_f64(12.34));
    assert_eq!(db.convert("USD", "RUB", Amount::from_f64(2.5)).await.unwrap(), Amount::from_f64(250.0));
    assert!(db.fetch_rate("EUR", "RUB").await.is_err());
    let eur = db.convert("USD", "EUR", Amount::from_f64(12.34)).await.unwrap();
    assert_eq!(eur, Amount::from_f64(11.11));
    assert_eq!(db.convert("EUR", "USD", eur).await.unwrap(), Amount::from_f64(12.34));

    // Rates are append-only; the latest one is used
    db.set_exchange_rate(&ExchangeRate::new("USD", "EUR", 0.8)).await.unwrap();
    assert_eq!(db.fetch_rate("USD", "EUR").await.unwrap().rate, 0.8);
    assert_eq!(db.convert("USD", "EUR", Amount::from_f64(10.0)).await.unwrap(), Amount::from_f64(8.0));
    tear_down(api.db()).await;
}

use billing_engine::{
    db_types::{OrderId, OrderStatus},
    order_objects::{ListOrdersRequest, NotificationOutcome},
    revenue_objects::{RevenueDynamicRequest, RevenuePeriod},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// What the payment system is told after its notification has been applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&NotificationOutcome> for NotificationResponse {
    fn from(outcome: &NotificationOutcome) -> Self {
        Self {
            order_id: outcome.order.id.clone(),
            status: outcome.order.status,
            accepted: !outcome.is_rejected(),
            reason: outcome.rejection.as_ref().map(|e| e.to_string()),
        }
    }
}

fn is_key(key: &str, name: &str) -> bool {
    key.strip_suffix("[]").unwrap_or(key) == name
}

fn parse_i64(key: &str, value: &str) -> Result<i64, ServerError> {
    value.trim().parse::<i64>().map_err(|e| ServerError::InvalidQuery(format!("{key}={value}. {e}")))
}

fn parse_timestamp(key: &str, value: &str) -> Result<DateTime<Utc>, ServerError> {
    let secs = parse_i64(key, value)?;
    DateTime::from_timestamp(secs, 0).ok_or_else(|| ServerError::InvalidQuery(format!("{key}={value} is out of range")))
}

/// Splits an order listing query into the caller's projects, paging and the remaining filter values.
pub fn list_orders_request(query: Vec<(String, String)>) -> Result<ListOrdersRequest, ServerError> {
    let mut request = ListOrdersRequest { limit: DEFAULT_PAGE_SIZE, ..Default::default() };
    for (key, value) in query {
        match key.as_str() {
            k if is_key(k, "project") => request.projects.push(value),
            "limit" => request.limit = parse_i64(&key, &value)?,
            "offset" => request.offset = parse_i64(&key, &value)?,
            _ => request.values.push((key, value)),
        }
    }
    Ok(request)
}

/// `project` (repeatable), `period`, and `from` / `to` as unix timestamps are all required.
pub fn revenue_request(query: Vec<(String, String)>) -> Result<RevenueDynamicRequest, ServerError> {
    let mut projects = Vec::new();
    let (mut period, mut from, mut to) = (None, None, None);
    for (key, value) in query {
        match key.as_str() {
            k if is_key(k, "project") => projects.push(value),
            "period" => {
                period = Some(value.parse::<RevenuePeriod>().map_err(|e| ServerError::InvalidQuery(e.to_string()))?)
            },
            "from" => from = Some(parse_timestamp(&key, &value)?),
            "to" => to = Some(parse_timestamp(&key, &value)?),
            _ => {},
        }
    }
    let missing = |name: &str| ServerError::InvalidQuery(format!("{name} is required"));
    Ok(RevenueDynamicRequest {
        projects,
        period: period.ok_or_else(|| missing("period"))?,
        from: from.ok_or_else(|| missing("from"))?,
        to: to.ok_or_else(|| missing("to"))?,
    })
}

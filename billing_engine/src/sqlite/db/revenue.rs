use std::collections::BTreeMap;

use billing_common::Amount;
use chrono::{DateTime, Utc};
use log::*;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use crate::{
    billing_api::revenue_objects::{FacetPoint, FacetSummary, RevenueDynamicFacets, RevenueDynamicRequest, RevenuePointKey},
    db_types::OrderStatus,
    traits::PaymentGatewayError,
};

#[derive(Default)]
struct Facet {
    points: BTreeMap<RevenuePointKey, Amount>,
    count: i64,
    total: Amount,
}

impl Facet {
    fn add(&mut self, key: RevenuePointKey, amount: Amount) {
        *self.points.entry(key).or_default() += amount;
        self.count += 1;
        self.total += amount;
    }

    fn points(&self) -> Vec<FacetPoint> {
        self.points.iter().map(|(key, total)| FacetPoint { key: *key, total: *total }).collect()
    }

    fn summary(&self) -> FacetSummary {
        FacetSummary::new(self.count, self.total)
    }
}

/// Revenue (completed orders) and refunds in the merchant accounting currency, bucketed by order creation time.
pub async fn revenue_dynamic(
    request: &RevenueDynamicRequest,
    conn: &mut SqliteConnection,
) -> Result<RevenueDynamicFacets, PaymentGatewayError> {
    if request.projects.is_empty() {
        return Ok(RevenueDynamicFacets::default());
    }
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT status, created_at, amount_out_merchant_accounting_currency AS amount FROM orders WHERE project_id IN (",
    );
    let mut projects = builder.separated(", ");
    for project in &request.projects {
        projects.push_bind(project.as_str());
    }
    let statuses = OrderStatus::REVENUE
        .iter()
        .chain(std::iter::once(&OrderStatus::Refund))
        .map(|s| s.code().to_string())
        .collect::<Vec<_>>();
    builder.push(format!(") AND status IN ({}) AND created_at >= ", statuses.join(", ")));
    builder.push_bind(request.from);
    builder.push(" AND created_at <= ");
    builder.push_bind(request.to);
    trace!("📝️ Executing query: {}", builder.sql());
    let rows = builder.build().fetch_all(conn).await?;

    let mut revenue = Facet::default();
    let mut refund = Facet::default();
    for row in rows {
        let status: i64 = row.try_get("status")?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let amount: Amount = row.try_get("amount")?;
        let key = RevenuePointKey::for_timestamp(request.period, created_at);
        if status == i64::from(OrderStatus::Refund.code()) {
            refund.add(key, amount);
        } else {
            revenue.add(key, amount);
        }
    }
    Ok(RevenueDynamicFacets {
        points_revenue: revenue.points(),
        points_refund: refund.points(),
        revenue: revenue.summary(),
        refund: refund.summary(),
    })
}

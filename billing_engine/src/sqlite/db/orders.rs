use std::{collections::HashMap, str::FromStr, sync::OnceLock};

use log::*;
use sqlx::{
    query::Query,
    sqlite::{SqliteArguments, SqliteRow},
    types::Json,
    FromRow,
    QueryBuilder,
    Row,
    Sqlite,
    SqliteConnection,
};

use crate::{
    billing_api::order_objects::OrderFilter,
    db_types::{
        Order,
        OrderFees,
        OrderFixedPackage,
        OrderId,
        OrderPaymentMethod,
        OrderProject,
        OrderStatus,
        PayerData,
    },
    traits::PaymentGatewayError,
};

/// Column order used by [`bind_order`]. `id` must come first.
const ORDER_COLUMNS: [&str; 48] = [
    "id",
    "project_id",
    "project_name",
    "merchant_id",
    "merchant_currency",
    "description",
    "project_order_id",
    "project_account",
    "project_income_amount",
    "project_income_currency",
    "project_outcome_amount",
    "project_outcome_currency",
    "project_params",
    "payer_ip",
    "payer_country",
    "payer_subdivision",
    "payer_city",
    "payer_timezone",
    "payer_phone",
    "payer_email",
    "payment_method_id",
    "payment_method_name",
    "payment_method_group_alias",
    "payment_method_handler",
    "payment_system_id",
    "payment_system_accounting_currency",
    "payment_method_outcome_amount",
    "payment_method_outcome_currency",
    "payment_method_income_amount",
    "payment_method_income_currency",
    "payment_method_order_id",
    "payment_method_account",
    "payment_method_order_closed_at",
    "project_fee",
    "payment_method_fee",
    "psp_fee",
    "to_payer_fee",
    "vat",
    "amount_in_merchant_accounting_currency",
    "amount_out_merchant_accounting_currency",
    "amount_in_psp_accounting_currency",
    "amount_in_payment_system_accounting_currency",
    "status",
    "fixed_package",
    "payment_requisites",
    "is_json_request",
    "created_at",
    "updated_at",
];

fn insert_sql() -> &'static str {
    static SQL: OnceLock<String> = OnceLock::new();
    SQL.get_or_init(|| {
        let params = (1..=ORDER_COLUMNS.len()).map(|i| format!("${i}")).collect::<Vec<_>>();
        format!("INSERT INTO orders ({}) VALUES ({})", ORDER_COLUMNS.join(", "), params.join(", "))
    })
}

fn update_sql() -> &'static str {
    static SQL: OnceLock<String> = OnceLock::new();
    SQL.get_or_init(|| {
        let assignments = ORDER_COLUMNS
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, col)| format!("{col} = ${}", i + 1))
            .collect::<Vec<_>>();
        format!("UPDATE orders SET {} WHERE id = $1", assignments.join(", "))
    })
}

fn bind_order<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    order: &'q Order,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    let pm = order.payment_method.as_ref();
    query
        .bind(order.id.as_str())
        .bind(&order.project.id)
        .bind(&order.project.name)
        .bind(&order.project.merchant_id)
        .bind(&order.project.merchant_currency)
        .bind(&order.description)
        .bind(&order.project_order_id)
        .bind(&order.project_account)
        .bind(order.project_income_amount)
        .bind(&order.project_income_currency)
        .bind(order.project_outcome_amount)
        .bind(&order.project_outcome_currency)
        .bind(Json(&order.project_params))
        .bind(&order.payer.ip)
        .bind(&order.payer.country_code)
        .bind(&order.payer.subdivision)
        .bind(&order.payer.city)
        .bind(&order.payer.timezone)
        .bind(&order.payer.phone)
        .bind(&order.payer.email)
        .bind(pm.map(|p| p.id.as_str()))
        .bind(pm.map(|p| p.name.as_str()))
        .bind(pm.map(|p| p.group_alias.as_str()))
        .bind(pm.map(|p| p.handler.as_str()))
        .bind(pm.map(|p| p.payment_system_id.as_str()))
        .bind(pm.map(|p| p.payment_system_accounting_currency.as_str()))
        .bind(order.payment_method_outcome_amount)
        .bind(&order.payment_method_outcome_currency)
        .bind(order.payment_method_income_amount)
        .bind(&order.payment_method_income_currency)
        .bind(&order.payment_method_order_id)
        .bind(&order.payment_method_account)
        .bind(order.payment_method_order_closed_at)
        .bind(order.fees.project_fee)
        .bind(order.fees.payment_method_fee)
        .bind(order.fees.psp_fee)
        .bind(order.fees.to_payer_fee)
        .bind(order.fees.vat)
        .bind(order.amount_in_merchant_accounting_currency)
        .bind(order.amount_out_merchant_accounting_currency)
        .bind(order.amount_in_psp_accounting_currency)
        .bind(order.amount_in_payment_system_accounting_currency)
        .bind(order.status.code())
        .bind(order.fixed_package.as_ref().map(Json))
        .bind(Json(&order.payment_requisites))
        .bind(order.is_json_request)
        .bind(order.created_at)
        .bind(order.updated_at)
}

fn decode_error<E: std::error::Error + Send + Sync + 'static>(e: E) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(e))
}

impl FromRow<'_, SqliteRow> for Order {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let status: i64 = row.try_get("status")?;
        let pm_id: Option<String> = row.try_get("payment_method_id")?;
        let payment_method = match pm_id {
            Some(id) => Some(OrderPaymentMethod {
                id,
                name: row.try_get::<Option<String>, _>("payment_method_name")?.unwrap_or_default(),
                group_alias: row.try_get::<Option<String>, _>("payment_method_group_alias")?.unwrap_or_default(),
                handler: row.try_get::<Option<String>, _>("payment_method_handler")?.unwrap_or_default(),
                payment_system_id: row.try_get::<Option<String>, _>("payment_system_id")?.unwrap_or_default(),
                payment_system_accounting_currency: row
                    .try_get::<Option<String>, _>("payment_system_accounting_currency")?
                    .unwrap_or_default(),
            }),
            None => None,
        };
        let project_params: Json<HashMap<String, String>> = row.try_get("project_params")?;
        let payment_requisites: Json<HashMap<String, String>> = row.try_get("payment_requisites")?;
        let fixed_package: Option<Json<OrderFixedPackage>> = row.try_get("fixed_package")?;
        Ok(Order {
            id: OrderId::from_str(&id).map_err(decode_error)?,
            project: OrderProject {
                id: row.try_get("project_id")?,
                name: row.try_get("project_name")?,
                merchant_id: row.try_get("merchant_id")?,
                merchant_currency: row.try_get("merchant_currency")?,
            },
            description: row.try_get("description")?,
            project_order_id: row.try_get("project_order_id")?,
            project_account: row.try_get("project_account")?,
            project_income_amount: row.try_get("project_income_amount")?,
            project_income_currency: row.try_get("project_income_currency")?,
            project_outcome_amount: row.try_get("project_outcome_amount")?,
            project_outcome_currency: row.try_get("project_outcome_currency")?,
            project_params: project_params.0,
            payer: PayerData {
                ip: row.try_get("payer_ip")?,
                country_code: row.try_get("payer_country")?,
                subdivision: row.try_get("payer_subdivision")?,
                city: row.try_get("payer_city")?,
                timezone: row.try_get("payer_timezone")?,
                phone: row.try_get("payer_phone")?,
                email: row.try_get("payer_email")?,
            },
            payment_method,
            payment_method_outcome_amount: row.try_get("payment_method_outcome_amount")?,
            payment_method_outcome_currency: row.try_get("payment_method_outcome_currency")?,
            payment_method_income_amount: row.try_get("payment_method_income_amount")?,
            payment_method_income_currency: row.try_get("payment_method_income_currency")?,
            payment_method_order_id: row.try_get("payment_method_order_id")?,
            payment_method_account: row.try_get("payment_method_account")?,
            payment_method_order_closed_at: row.try_get("payment_method_order_closed_at")?,
            fees: OrderFees {
                project_fee: row.try_get("project_fee")?,
                payment_method_fee: row.try_get("payment_method_fee")?,
                psp_fee: row.try_get("psp_fee")?,
                to_payer_fee: row.try_get("to_payer_fee")?,
                vat: row.try_get("vat")?,
            },
            amount_in_merchant_accounting_currency: row.try_get("amount_in_merchant_accounting_currency")?,
            amount_out_merchant_accounting_currency: row.try_get("amount_out_merchant_accounting_currency")?,
            amount_in_psp_accounting_currency: row.try_get("amount_in_psp_accounting_currency")?,
            amount_in_payment_system_accounting_currency: row
                .try_get("amount_in_payment_system_accounting_currency")?,
            status: OrderStatus::try_from(status).map_err(decode_error)?,
            fixed_package: fixed_package.map(|p| p.0),
            payment_requisites: payment_requisites.0,
            is_json_request: row.try_get("is_json_request")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn corrupt(e: sqlx::Error) -> PaymentGatewayError {
    match e {
        sqlx::Error::Decode(e) => PaymentGatewayError::CorruptOrder(e.to_string()),
        e => PaymentGatewayError::from(e),
    }
}

/// Inserts a new order. A second order with the same project order id for the same project is rejected by the
/// database, so concurrent duplicates cannot both succeed.
pub async fn insert_order(order: &Order, conn: &mut SqliteConnection) -> Result<(), PaymentGatewayError> {
    let result = bind_order(sqlx::query(insert_sql()), order).execute(conn).await;
    match result {
        Ok(_) => {
            debug!("📝️ Order {} inserted for project {}", order.id, order.project.id);
            Ok(())
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            if e.message().contains("project_order_id") {
                let project_order_id = order.project_order_id.clone().unwrap_or_default();
                Err(PaymentGatewayError::DuplicateProjectOrderId(order.project.id.clone(), project_order_id))
            } else {
                Err(PaymentGatewayError::OrderAlreadyExists(order.id.clone()))
            }
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn update_order(order: &Order, conn: &mut SqliteConnection) -> Result<(), PaymentGatewayError> {
    let result = bind_order(sqlx::query(update_sql()), order).execute(conn).await?;
    if result.rows_affected() == 0 {
        return Err(PaymentGatewayError::OrderNotFound(order.id.clone()));
    }
    trace!("📝️ Order {} updated. Status is {}", order.id, order.status);
    Ok(())
}

pub async fn fetch_order_by_id(id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, PaymentGatewayError> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(id.as_str())
        .fetch_optional(conn)
        .await
        .map_err(corrupt)?;
    Ok(order)
}

pub async fn fetch_order_by_project_order_id(
    project_id: &str,
    project_order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE project_id = $1 AND project_order_id = $2")
        .bind(project_id)
        .bind(project_order_id)
        .fetch_optional(conn)
        .await
        .map_err(corrupt)?;
    Ok(order)
}

/// Escapes `%`, `_` and `\` for use in a `LIKE ... ESCAPE '\'` pattern.
fn like_pattern(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len() + 2);
    escaped.push('%');
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Appends the `WHERE` clause for `filter`. Orders outside the filter's projects never match.
pub(crate) fn push_filter<'a>(builder: &mut QueryBuilder<'a, Sqlite>, filter: &'a OrderFilter) {
    builder.push(" WHERE ");
    if filter.projects.is_empty() {
        builder.push("1 = 0");
        return;
    }
    builder.push("project_id IN (");
    let mut projects = builder.separated(", ");
    for project in &filter.projects {
        projects.push_bind(project.as_str());
    }
    builder.push(")");

    let mut where_clause = builder.separated(" AND ");
    where_clause.push_unseparated(" AND ");
    let mut any = false;
    if let Some(id) = &filter.id {
        where_clause.push("id = ");
        where_clause.push_bind_unseparated(id.as_str());
        any = true;
    }
    if !filter.payment_methods.is_empty() {
        where_clause.push("payment_method_id IN (");
        for (i, pm) in filter.payment_methods.iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(pm.as_str());
        }
        where_clause.push_unseparated(")");
        any = true;
    }
    if !filter.countries.is_empty() {
        where_clause.push("payer_country IN (");
        for (i, country) in filter.countries.iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(country.as_str());
        }
        where_clause.push_unseparated(")");
        any = true;
    }
    if !filter.statuses.is_empty() {
        let codes = filter.statuses.iter().map(|s| s.code().to_string()).collect::<Vec<_>>();
        where_clause.push(format!("status IN ({})", codes.join(", ")));
        any = true;
    }
    if let Some(account) = &filter.account {
        let pattern = like_pattern(account);
        where_clause.push("(");
        for (i, col) in ["project_account", "payment_method_account", "payer_phone", "payer_email"].iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(" OR ");
            }
            where_clause.push_unseparated(format!("{col} LIKE "));
            where_clause.push_bind_unseparated(pattern.clone());
            where_clause.push_unseparated(" ESCAPE '\\'");
        }
        where_clause.push_unseparated(")");
        any = true;
    }
    if let Some(from) = filter.pm_date_from {
        where_clause.push("payment_method_order_closed_at >= ");
        where_clause.push_bind_unseparated(from);
        any = true;
    }
    if let Some(to) = filter.pm_date_to {
        where_clause.push("payment_method_order_closed_at <= ");
        where_clause.push_bind_unseparated(to);
        any = true;
    }
    if let Some(from) = filter.project_date_from {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(from);
        any = true;
    }
    if let Some(to) = filter.project_date_to {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(to);
        any = true;
    }
    if !any {
        where_clause.push_unseparated("1 = 1");
    }
}

pub async fn count_orders(filter: &OrderFilter, conn: &mut SqliteConnection) -> Result<i64, PaymentGatewayError> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) AS count FROM orders");
    push_filter(&mut builder, filter);
    trace!("📝️ Executing query: {}", builder.sql());
    let row = builder.build().fetch_one(conn).await?;
    let count: i64 = row.try_get("count")?;
    Ok(count)
}

/// A page of matching orders, newest first. A non-positive `limit` returns every order from `offset` on.
pub async fn search_orders(
    filter: &OrderFilter,
    limit: i64,
    offset: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, PaymentGatewayError> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders");
    push_filter(&mut builder, filter);
    builder.push(" ORDER BY created_at DESC, id ASC LIMIT ");
    builder.push_bind(if limit > 0 { limit } else { -1 });
    builder.push(" OFFSET ");
    builder.push_bind(offset.max(0));
    trace!("📝️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await.map_err(corrupt)?;
    trace!("📝️ Result of search_orders: {}", orders.len());
    Ok(orders)
}

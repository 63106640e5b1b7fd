use std::collections::HashMap;

use billing_common::{Amount, Secret};
use chrono::{DateTime, Utc};
use log::*;
use sqlx::{sqlite::SqliteRow, types::Json, Row, SqliteConnection};

use crate::{
    db_types::{
        Currency,
        FixedPackage,
        Merchant,
        PaymentMethod,
        PaymentSystem,
        Project,
        ProjectPaymentMethod,
    },
    traits::CatalogError,
};

//--------------------------------------      Currencies       ---------------------------------------------------------
pub async fn fetch_currency(code_a3: &str, conn: &mut SqliteConnection) -> Result<Option<Currency>, CatalogError> {
    let currency = sqlx::query("SELECT code_int, code_a3, name FROM currencies WHERE code_a3 = $1")
        .bind(code_a3)
        .fetch_optional(conn)
        .await?
        .map(|row: SqliteRow| -> Result<Currency, sqlx::Error> {
            Ok(Currency { code_int: row.try_get("code_int")?, code_a3: row.try_get("code_a3")?, name: row.try_get("name")? })
        })
        .transpose()?;
    Ok(currency)
}

pub async fn insert_currency(currency: &Currency, conn: &mut SqliteConnection) -> Result<(), CatalogError> {
    sqlx::query("INSERT OR REPLACE INTO currencies (code_a3, code_int, name) VALUES ($1, $2, $3)")
        .bind(&currency.code_a3)
        .bind(currency.code_int)
        .bind(&currency.name)
        .execute(conn)
        .await?;
    Ok(())
}

//--------------------------------------       Merchants       ---------------------------------------------------------
pub async fn insert_merchant(merchant: &Merchant, conn: &mut SqliteConnection) -> Result<(), CatalogError> {
    sqlx::query(
        r#"INSERT OR REPLACE INTO merchants (id, name, currency, is_vat_enabled, is_commission_to_user_enabled)
        VALUES ($1, $2, $3, $4, $5)"#,
    )
    .bind(&merchant.id)
    .bind(&merchant.name)
    .bind(&merchant.currency)
    .bind(merchant.is_vat_enabled)
    .bind(merchant.is_commission_to_user_enabled)
    .execute(conn)
    .await?;
    Ok(())
}

//--------------------------------------    Payment methods    ---------------------------------------------------------
pub async fn insert_payment_system(ps: &PaymentSystem, conn: &mut SqliteConnection) -> Result<(), CatalogError> {
    sqlx::query(
        r#"INSERT OR REPLACE INTO payment_systems (id, name, is_active, accounting_currency, handler)
        VALUES ($1, $2, $3, $4, $5)"#,
    )
    .bind(&ps.id)
    .bind(&ps.name)
    .bind(ps.is_active)
    .bind(&ps.accounting_currency)
    .bind(&ps.handler)
    .execute(conn)
    .await?;
    Ok(())
}

/// Stores the payment method. `payment_system_id` need not exist.
pub async fn insert_payment_method(
    pm: &PaymentMethod,
    payment_system_id: &str,
    conn: &mut SqliteConnection,
) -> Result<(), CatalogError> {
    sqlx::query(
        r#"INSERT OR REPLACE INTO payment_methods
        (id, name, group_alias, payment_system_id, currency, min_payment_amount, max_payment_amount, is_active, params)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
    )
    .bind(&pm.id)
    .bind(&pm.name)
    .bind(&pm.group_alias)
    .bind(payment_system_id)
    .bind(&pm.currency)
    .bind(pm.min_payment_amount)
    .bind(pm.max_payment_amount)
    .bind(pm.is_active)
    .bind(Json(&pm.params))
    .execute(conn)
    .await?;
    Ok(())
}

fn payment_method_from_row(row: &SqliteRow) -> Result<PaymentMethod, sqlx::Error> {
    let ps_id: Option<String> = row.try_get("ps_id")?;
    let payment_system = match ps_id {
        Some(id) => Some(PaymentSystem {
            id,
            name: row.try_get("ps_name")?,
            is_active: row.try_get("ps_is_active")?,
            accounting_currency: row.try_get("ps_accounting_currency")?,
            handler: row.try_get("ps_handler")?,
        }),
        None => None,
    };
    let params: Json<HashMap<String, String>> = row.try_get("params")?;
    Ok(PaymentMethod {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        group_alias: row.try_get("group_alias")?,
        currency: row.try_get("currency")?,
        min_payment_amount: row.try_get("min_payment_amount")?,
        max_payment_amount: row.try_get("max_payment_amount")?,
        is_active: row.try_get("is_active")?,
        params: params.0,
        payment_system,
    })
}

pub async fn fetch_payment_method(id: &str, conn: &mut SqliteConnection) -> Result<Option<PaymentMethod>, CatalogError> {
    let pm = sqlx::query(
        r#"SELECT
            pm.*,
            ps.id AS ps_id,
            ps.name AS ps_name,
            ps.is_active AS ps_is_active,
            ps.accounting_currency AS ps_accounting_currency,
            ps.handler AS ps_handler
        FROM payment_methods pm LEFT JOIN payment_systems ps ON pm.payment_system_id = ps.id
        WHERE pm.id = $1"#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .map(|row| payment_method_from_row(&row))
    .transpose()?;
    Ok(pm)
}

pub async fn add_project_payment_method(
    project_id: &str,
    ppm: &ProjectPaymentMethod,
    conn: &mut SqliteConnection,
) -> Result<(), CatalogError> {
    sqlx::query(
        r#"INSERT INTO project_payment_methods (project_id, group_alias, payment_method_id, added_at)
        VALUES ($1, $2, $3, $4)"#,
    )
    .bind(project_id)
    .bind(&ppm.group_alias)
    .bind(&ppm.payment_method_id)
    .bind(ppm.added_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn fetch_project_payment_method_configs(
    project_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<ProjectPaymentMethod>, CatalogError> {
    let rows = sqlx::query(
        r#"SELECT group_alias, payment_method_id, added_at FROM project_payment_methods
        WHERE project_id = $1 ORDER BY id ASC"#,
    )
    .bind(project_id)
    .fetch_all(conn)
    .await?;
    let configs = rows
        .iter()
        .map(|row| -> Result<ProjectPaymentMethod, sqlx::Error> {
            Ok(ProjectPaymentMethod {
                group_alias: row.try_get("group_alias")?,
                payment_method_id: row.try_get("payment_method_id")?,
                added_at: row.try_get("added_at")?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(configs)
}

/// The latest payment method configured for each of the project's group aliases. Configurations pointing at a
/// payment method that does not exist are skipped.
pub async fn fetch_project_payment_methods(
    project_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentMethod>, CatalogError> {
    let configs = fetch_project_payment_method_configs(project_id, conn).await?;
    let mut latest: Vec<&ProjectPaymentMethod> = Vec::new();
    for config in &configs {
        match latest.iter_mut().find(|c| c.group_alias == config.group_alias) {
            Some(current) if current.added_at < config.added_at => *current = config,
            Some(_) => {},
            None => latest.push(config),
        }
    }
    let mut result = Vec::with_capacity(latest.len());
    for config in latest {
        match fetch_payment_method(&config.payment_method_id, conn).await? {
            Some(pm) => result.push(pm),
            None => warn!(
                "🗃️ Project {project_id} refers to payment method {} which does not exist",
                config.payment_method_id
            ),
        }
    }
    Ok(result)
}

//--------------------------------------     Fixed packages    ---------------------------------------------------------
/// Appends a package to the end of the region's list.
pub async fn add_fixed_package(
    project_id: &str,
    region: &str,
    package: &FixedPackage,
    conn: &mut SqliteConnection,
) -> Result<(), CatalogError> {
    sqlx::query(
        r#"INSERT INTO fixed_packages (project_id, region, position, name, price, currency)
        VALUES ($1, $2,
            (SELECT COALESCE(MAX(position) + 1, 0) FROM fixed_packages WHERE project_id = $1 AND region = $2),
            $3, $4, $5)"#,
    )
    .bind(project_id)
    .bind(region)
    .bind(&package.name)
    .bind(package.price)
    .bind(&package.currency)
    .execute(conn)
    .await?;
    Ok(())
}

async fn fetch_fixed_packages(
    project_id: &str,
    conn: &mut SqliteConnection,
) -> Result<HashMap<String, Vec<FixedPackage>>, CatalogError> {
    let rows = sqlx::query(
        "SELECT region, name, price, currency FROM fixed_packages WHERE project_id = $1 ORDER BY region, position",
    )
    .bind(project_id)
    .fetch_all(conn)
    .await?;
    let mut packages: HashMap<String, Vec<FixedPackage>> = HashMap::new();
    for row in rows {
        let region: String = row.try_get("region")?;
        let package = FixedPackage { name: row.try_get("name")?, price: row.try_get("price")?, currency: row.try_get("currency")? };
        packages.entry(region).or_default().push(package);
    }
    Ok(packages)
}

//--------------------------------------        Projects       ---------------------------------------------------------
pub async fn insert_project(project: &Project, conn: &mut SqliteConnection) -> Result<(), CatalogError> {
    sqlx::query(
        r#"INSERT INTO projects (
            id, merchant_id, name, description, is_active, secret_key, callback_currency, limits_currency,
            min_payment_amount, max_payment_amount, only_fixed_amounts, allow_dynamic_notify_urls,
            allow_dynamic_redirect_urls, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"#,
    )
    .bind(&project.id)
    .bind(&project.merchant.id)
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.is_active)
    .bind(project.secret_key.reveal())
    .bind(&project.callback_currency)
    .bind(&project.limits_currency)
    .bind(project.min_payment_amount)
    .bind(project.max_payment_amount)
    .bind(project.only_fixed_amounts)
    .bind(project.allow_dynamic_notify_urls)
    .bind(project.allow_dynamic_redirect_urls)
    .bind(project.created_at)
    .bind(project.updated_at)
    .execute(&mut *conn)
    .await?;
    for ppm in &project.payment_methods {
        add_project_payment_method(&project.id, ppm, conn).await?;
    }
    for (region, packages) in &project.fixed_packages {
        for package in packages {
            add_fixed_package(&project.id, region, package, conn).await?;
        }
    }
    debug!("🗃️ Project {} saved for merchant {}", project.id, project.merchant.id);
    Ok(())
}

pub async fn fetch_project(project_id: &str, conn: &mut SqliteConnection) -> Result<Option<Project>, CatalogError> {
    let row = sqlx::query(
        r#"SELECT
            p.*,
            m.name AS merchant_name,
            m.currency AS merchant_currency,
            m.is_vat_enabled,
            m.is_commission_to_user_enabled
        FROM projects p LEFT JOIN merchants m ON p.merchant_id = m.id
        WHERE p.id = $1"#,
    )
    .bind(project_id)
    .fetch_optional(&mut *conn)
    .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let merchant_id: String = row.try_get("merchant_id")?;
    let merchant_name: Option<String> = row.try_get("merchant_name")?;
    let Some(merchant_name) = merchant_name else {
        return Err(CatalogError::InconsistentData(format!(
            "Project {project_id} belongs to merchant {merchant_id}, which does not exist"
        )));
    };
    let merchant = Merchant {
        id: merchant_id,
        name: merchant_name,
        currency: row.try_get("merchant_currency")?,
        is_vat_enabled: row.try_get("is_vat_enabled")?,
        is_commission_to_user_enabled: row.try_get("is_commission_to_user_enabled")?,
    };
    let secret_key: String = row.try_get("secret_key")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let min_payment_amount: Amount = row.try_get("min_payment_amount")?;
    let mut project = Project {
        id: row.try_get("id")?,
        merchant,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        is_active: row.try_get("is_active")?,
        secret_key: Secret::new(secret_key),
        callback_currency: row.try_get("callback_currency")?,
        limits_currency: row.try_get("limits_currency")?,
        min_payment_amount,
        max_payment_amount: row.try_get("max_payment_amount")?,
        only_fixed_amounts: row.try_get("only_fixed_amounts")?,
        allow_dynamic_notify_urls: row.try_get("allow_dynamic_notify_urls")?,
        allow_dynamic_redirect_urls: row.try_get("allow_dynamic_redirect_urls")?,
        payment_methods: vec![],
        fixed_packages: HashMap::new(),
        created_at,
        updated_at: row.try_get("updated_at")?,
    };
    project.payment_methods = fetch_project_payment_method_configs(project_id, conn).await?;
    project.fixed_packages = fetch_fixed_packages(project_id, conn).await?;
    trace!("🗃️ Fetched project {project_id}");
    Ok(Some(project))
}

/// Overwrites the project's own settings. Merchant, payment methods and fixed packages are not touched.
pub async fn update_project(project: &Project, conn: &mut SqliteConnection) -> Result<Project, CatalogError> {
    let result = sqlx::query(
        r#"UPDATE projects SET
            name = $1,
            description = $2,
            is_active = $3,
            secret_key = $4,
            callback_currency = $5,
            limits_currency = $6,
            min_payment_amount = $7,
            max_payment_amount = $8,
            only_fixed_amounts = $9,
            allow_dynamic_notify_urls = $10,
            allow_dynamic_redirect_urls = $11,
            updated_at = $12
        WHERE id = $13"#,
    )
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.is_active)
    .bind(project.secret_key.reveal())
    .bind(&project.callback_currency)
    .bind(&project.limits_currency)
    .bind(project.min_payment_amount)
    .bind(project.max_payment_amount)
    .bind(project.only_fixed_amounts)
    .bind(project.allow_dynamic_notify_urls)
    .bind(project.allow_dynamic_redirect_urls)
    .bind(project.updated_at)
    .bind(&project.id)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(CatalogError::ProjectNotFound(project.id.clone()));
    }
    fetch_project(&project.id, conn).await?.ok_or_else(|| CatalogError::ProjectNotFound(project.id.clone()))
}

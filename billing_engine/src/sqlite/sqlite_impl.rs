//! `SqliteDatabase` is a concrete implementation of a billing engine backend.
//!
//! It uses SQLite for storage and implements all the traits defined in the [`crate::traits`] module. It also exposes
//! catalog seeding methods, which the order manager itself never needs.
use std::fmt::Debug;

use billing_common::Amount;
use log::*;
use sqlx::SqlitePool;

use super::db::{catalog, commissions, db_url, exchange_rates, new_pool, orders, revenue, vat};
use crate::{
    billing_api::{
        order_objects::OrderFilter,
        revenue_objects::{RevenueDynamicFacets, RevenueDynamicRequest},
    },
    db_types::{
        Commission,
        CommissionOrder,
        Currency,
        ExchangeRate,
        FixedPackage,
        Merchant,
        Order,
        OrderId,
        PaymentMethod,
        PaymentSystem,
        Project,
        ProjectPaymentMethod,
        VatRate,
    },
    traits::{
        CatalogError,
        CatalogManagement,
        CommissionCalculator,
        CommissionError,
        ExchangeRateError,
        ExchangeRates,
        OrderManagement,
        PaymentGatewayError,
        VatCalculator,
        VatError,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDatabase ({})", self.url)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using the URL in `BILLING_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        debug!("🗃️ Connection pool for {url} created with {max_connections} max connections");
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date with the embedded migrations.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete for {}", self.url);
        Ok(())
    }

    pub async fn insert_currency(&self, currency: &Currency) -> Result<(), CatalogError> {
        let mut conn = self.pool.acquire().await?;
        catalog::insert_currency(currency, &mut conn).await
    }

    pub async fn insert_merchant(&self, merchant: &Merchant) -> Result<(), CatalogError> {
        let mut conn = self.pool.acquire().await?;
        catalog::insert_merchant(merchant, &mut conn).await
    }

    /// Stores a project with its payment method configurations and fixed packages. The merchant must already exist.
    pub async fn insert_project(&self, project: &Project) -> Result<(), CatalogError> {
        let mut tx = self.pool.begin().await?;
        catalog::insert_project(project, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn insert_payment_system(&self, ps: &PaymentSystem) -> Result<(), CatalogError> {
        let mut conn = self.pool.acquire().await?;
        catalog::insert_payment_system(ps, &mut conn).await
    }

    /// Stores a payment method. If it carries a payment system, that is stored too.
    pub async fn insert_payment_method(&self, pm: &PaymentMethod, payment_system_id: &str) -> Result<(), CatalogError> {
        let mut tx = self.pool.begin().await?;
        if let Some(ps) = &pm.payment_system {
            catalog::insert_payment_system(ps, &mut tx).await?;
        }
        catalog::insert_payment_method(pm, payment_system_id, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn add_project_payment_method(
        &self,
        project_id: &str,
        ppm: &ProjectPaymentMethod,
    ) -> Result<(), CatalogError> {
        let mut conn = self.pool.acquire().await?;
        catalog::add_project_payment_method(project_id, ppm, &mut conn).await
    }

    pub async fn add_fixed_package(&self, project_id: &str, region: &str, package: &FixedPackage) -> Result<(), CatalogError> {
        let mut conn = self.pool.acquire().await?;
        catalog::add_fixed_package(project_id, region, package, &mut conn).await
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn fetch_project(&self, project_id: &str) -> Result<Option<Project>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_project(project_id, &mut conn).await
    }

    async fn fetch_currency(&self, code_a3: &str) -> Result<Option<Currency>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_currency(code_a3, &mut conn).await
    }

    async fn fetch_payment_method(&self, payment_method_id: &str) -> Result<Option<PaymentMethod>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_payment_method(payment_method_id, &mut conn).await
    }

    async fn fetch_project_payment_methods(&self, project_id: &str) -> Result<Vec<PaymentMethod>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_project_payment_methods(project_id, &mut conn).await
    }

    async fn update_project(&self, project: &Project) -> Result<Project, CatalogError> {
        let mut tx = self.pool.begin().await?;
        let updated = catalog::update_project(project, &mut tx).await?;
        tx.commit().await?;
        Ok(updated)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: &Order) -> Result<(), PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::insert_order(order, &mut conn).await
    }

    async fn update_order(&self, order: &Order) -> Result<(), PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_order(order, &mut conn).await
    }

    async fn fetch_order_by_id(&self, id: &OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_id(id, &mut conn).await
    }

    async fn fetch_order_by_project_order_id(
        &self,
        project_id: &str,
        project_order_id: &str,
    ) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_project_order_id(project_id, project_order_id, &mut conn).await
    }

    async fn count_orders(&self, filter: &OrderFilter) -> Result<i64, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::count_orders(filter, &mut conn).await
    }

    async fn search_orders(
        &self,
        filter: &OrderFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::search_orders(filter, limit, offset, &mut conn).await
    }

    async fn revenue_dynamic(
        &self,
        request: &RevenueDynamicRequest,
    ) -> Result<RevenueDynamicFacets, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        revenue::revenue_dynamic(request, &mut conn).await
    }
}

impl ExchangeRates for SqliteDatabase {
    async fn fetch_rate(&self, from: &str, to: &str) -> Result<ExchangeRate, ExchangeRateError> {
        let mut conn = self.pool.acquire().await?;
        exchange_rates::fetch_rate(from, to, &mut conn).await
    }

    async fn set_exchange_rate(&self, rate: &ExchangeRate) -> Result<(), ExchangeRateError> {
        let mut conn = self.pool.acquire().await?;
        exchange_rates::set_exchange_rate(rate, &mut conn).await?;
        debug!("🗃️ Exchange rate {} -> {} set to {}", rate.from_currency, rate.to_currency, rate.rate);
        Ok(())
    }
}

impl CommissionCalculator for SqliteDatabase {
    async fn calculate_commission(
        &self,
        project_id: &str,
        payment_method_id: &str,
        amount: Amount,
    ) -> Result<CommissionOrder, CommissionError> {
        let mut conn = self.pool.acquire().await?;
        let rule = commissions::fetch_commission(project_id, payment_method_id, &mut conn).await?.ok_or_else(|| {
            CommissionError::CommissionNotFound(project_id.to_string(), payment_method_id.to_string())
        })?;
        Ok(rule.apply(amount))
    }

    async fn set_commission(&self, commission: &Commission) -> Result<(), CommissionError> {
        let mut conn = self.pool.acquire().await?;
        commissions::upsert_commission(commission, &mut conn).await
    }
}

impl VatCalculator for SqliteDatabase {
    async fn calculate_vat(&self, country: &str, subdivision: Option<&str>, amount: Amount) -> Result<Amount, VatError> {
        let mut conn = self.pool.acquire().await?;
        let rate = vat::fetch_vat_rate(country, subdivision, &mut conn).await?.ok_or_else(|| {
            let region = match subdivision {
                Some(s) => format!("{country}-{s}"),
                None => country.to_string(),
            };
            VatError::RateNotFound(region)
        })?;
        Ok(rate.apply(amount))
    }

    async fn set_vat_rate(&self, rate: &VatRate) -> Result<(), VatError> {
        let mut conn = self.pool.acquire().await?;
        vat::upsert_vat_rate(rate, &mut conn).await
    }
}

use thiserror::Error;

use crate::db_types::{Currency, PaymentMethod, Project};

#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Project {0} does not exist")]
    ProjectNotFound(String),
    #[error("Catalog data is inconsistent: {0}")]
    InconsistentData(String),
}

impl From<sqlx::Error> for CatalogError {
    fn from(e: sqlx::Error) -> Self {
        CatalogError::DatabaseError(e.to_string())
    }
}

/// Read access to the reference data the order manager prices against, plus project updates.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    /// Fetches a project with its merchant, payment method configurations and fixed package catalog.
    async fn fetch_project(&self, project_id: &str) -> Result<Option<Project>, CatalogError>;

    /// Fetches a currency by its ISO alpha-3 code.
    async fn fetch_currency(&self, code_a3: &str) -> Result<Option<Currency>, CatalogError>;

    /// Fetches a payment method and its payment system. `payment_system` is `None` if the payment system does not
    /// exist.
    async fn fetch_payment_method(&self, payment_method_id: &str) -> Result<Option<PaymentMethod>, CatalogError>;

    /// All payment methods enabled for the project, one per group alias (the most recently added configuration).
    async fn fetch_project_payment_methods(&self, project_id: &str) -> Result<Vec<PaymentMethod>, CatalogError>;

    /// Overwrites the mutable settings of an existing project and returns the stored result.
    async fn update_project(&self, project: &Project) -> Result<Project, CatalogError>;
}

use billing_common::Amount;
use thiserror::Error;

use crate::db_types::{Commission, CommissionOrder};

#[derive(Debug, Clone, Error)]
pub enum CommissionError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("No commission is configured for project {0} and payment method {1}")]
    CommissionNotFound(String, String),
}

impl From<sqlx::Error> for CommissionError {
    fn from(e: sqlx::Error) -> Self {
        CommissionError::DatabaseError(e.to_string())
    }
}

#[allow(async_fn_in_trait)]
pub trait CommissionCalculator {
    /// Computes the commission split for `amount` (in the payment method currency) paid to `project_id` via
    /// `payment_method_id`.
    async fn calculate_commission(
        &self,
        project_id: &str,
        payment_method_id: &str,
        amount: Amount,
    ) -> Result<CommissionOrder, CommissionError>;

    /// Stores (or replaces) the commission rule for the rule's project and payment method.
    async fn set_commission(&self, commission: &Commission) -> Result<(), CommissionError>;
}

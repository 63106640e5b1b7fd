use billing_common::Amount;
use thiserror::Error;

use crate::db_types::VatRate;

#[derive(Debug, Clone, Error)]
pub enum VatError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("No VAT rate is configured for {0}")]
    RateNotFound(String),
}

impl From<sqlx::Error> for VatError {
    fn from(e: sqlx::Error) -> Self {
        VatError::DatabaseError(e.to_string())
    }
}

#[allow(async_fn_in_trait)]
pub trait VatCalculator {
    /// VAT due on `amount` for a payer in `country`. A subdivision-specific rate takes precedence over the
    /// country-wide one.
    async fn calculate_vat(&self, country: &str, subdivision: Option<&str>, amount: Amount) -> Result<Amount, VatError>;

    async fn set_vat_rate(&self, rate: &VatRate) -> Result<(), VatError>;
}

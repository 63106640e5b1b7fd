use billing_common::Amount;
use thiserror::Error;

use crate::db_types::ExchangeRate;

#[derive(Debug, Clone, Error)]
pub enum ExchangeRateError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The requested exchange rate does not exist: {0} -> {1}")]
    RateDoesNotExist(String, String),
}

impl From<sqlx::Error> for ExchangeRateError {
    fn from(e: sqlx::Error) -> Self {
        ExchangeRateError::DatabaseError(e.to_string())
    }
}

#[allow(async_fn_in_trait)]
pub trait ExchangeRates {
    /// Fetch the latest rate for converting `from` into `to`. If neither the rate nor its inverse exists, the error
    /// [`ExchangeRateError::RateDoesNotExist`] is returned.
    async fn fetch_rate(&self, from: &str, to: &str) -> Result<ExchangeRate, ExchangeRateError>;

    /// Save the exchange rate to the backend storage
    async fn set_exchange_rate(&self, rate: &ExchangeRate) -> Result<(), ExchangeRateError>;

    /// Convert `amount` from one currency into another. Converting into the same currency is the identity.
    async fn convert(&self, from: &str, to: &str, amount: Amount) -> Result<Amount, ExchangeRateError> {
        if from == to {
            return Ok(amount);
        }
        let rate = self.fetch_rate(from, to).await?;
        Ok(rate.convert(amount))
    }
}

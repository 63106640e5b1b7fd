//! # Backend contracts
//!
//! The order manager never talks to storage or rate sources directly. Everything it needs from the outside world is
//! described by the traits in this module, and a backend (e.g. [`crate::SqliteDatabase`]) implements them.
//!
//! * [`CatalogManagement`] resolves projects, merchants, currencies and payment methods, and stores project updates.
//! * [`OrderManagement`] persists orders, and runs the listing and revenue queries.
//! * [`ExchangeRates`] converts amounts between currencies.
//! * [`CommissionCalculator`] splits an amount into PSP, payment method and payer-facing commissions.
//! * [`VatCalculator`] computes VAT for a payer's country and subdivision.
//!
//! GeoIP lookups and payment system handlers are not storage concerns and live in [`crate::geoip`] and
//! [`crate::payment_system`].
mod catalog_management;
mod commissions;
mod exchange_rates;
mod order_management;
mod vat;

pub use catalog_management::{CatalogError, CatalogManagement};
pub use commissions::{CommissionCalculator, CommissionError};
pub use exchange_rates::{ExchangeRateError, ExchangeRates};
pub use order_management::{OrderManagement, PaymentGatewayError};
pub use vat::{VatCalculator, VatError};

/// A backend that can serve every collaborator the order manager needs.
pub trait BillingBackend:
    CatalogManagement + OrderManagement + ExchangeRates + CommissionCalculator + VatCalculator
{
}

impl<T> BillingBackend for T where T: CatalogManagement + OrderManagement + ExchangeRates + CommissionCalculator + VatCalculator
{}

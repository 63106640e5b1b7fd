//! Billing Engine
//!
//! The billing engine prices merchant orders, takes payers through payment method selection and finalizes payments
//! when a payment system reports the outcome. It is storage-agnostic.
//!
//! The library is divided into these main sections:
//! 1. The public API ([`mod@billing_api`]). [`OrderManagerApi`] drives the order life cycle and serves the order
//!    listing and revenue reports; [`ProjectApi`] manages project settings.
//! 2. Backend contracts ([`mod@traits`]). A backend supplies the catalog, order storage, exchange rates, commissions
//!    and VAT by implementing these traits. [`SqliteDatabase`] is the bundled implementation.
//! 3. Pluggable collaborators: payer geo-location ([`mod@geoip`]) and payment system protocol handlers
//!    ([`mod@payment_system`]).
//!
//! The engine emits events when orders are created and when payment notifications are applied. Hooks can be
//! attached to these with [`events::EventHooks`].
pub mod billing_api;
pub mod db_types;
pub mod events;
pub mod geoip;
pub mod helpers;
pub mod payment_system;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

pub use billing_api::{
    order_objects,
    project_objects,
    revenue_objects,
    OrderManagerApi,
    OrderManagerError,
    ProjectApi,
    ProjectApiError,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    BillingBackend,
    CatalogManagement,
    CommissionCalculator,
    ExchangeRates,
    OrderManagement,
    VatCalculator,
};

//! The public API of the billing engine.
//!
//! [`OrderManagerApi`] drives the order life cycle: pricing and creating orders, the payer's payment form, and
//! payment system notifications. It also serves the order listing and the revenue report. [`ProjectApi`] manages
//! project settings.
pub mod errors;
pub mod order_objects;
pub mod pricing;
pub mod project_objects;
pub mod revenue_objects;

mod order_manager_api;
mod project_api;

pub use errors::{OrderManagerError, ProjectApiError};
pub use order_manager_api::OrderManagerApi;
pub use project_api::ProjectApi;

//! # Billing server
//! This crate hosts the HTTP front end of the billing engine. It is responsible for:
//! Accepting merchant order requests, as JSON or form posts, and pricing them with the engine.
//! Serving the payer's payment form submissions and forwarding them to the payment system.
//! Applying payment system notifications.
//! Serving order listings, revenue reports and project updates to the merchant back office.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/order`, `/order/form`, `/order/{id}`: order creation and lookup.
//! * `/payment`, `/payment/notify`: the payment form and payment system callbacks.
//! * `/api/orders`, `/api/revenue_dynamic`, `/api/projects/{id}`: back office.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod helpers;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;

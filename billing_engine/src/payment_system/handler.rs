use billing_common::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Order, OrderId};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PaymentSystemError {
    #[error("The order has no payment method, so no payment system can handle it")]
    PaymentMethodNotSet,
    #[error("No payment system handler is registered under the name {0}")]
    UnknownHandler(String),
    #[error("No settings are configured for payment system handler {0}")]
    SettingsNotFound(String),
    #[error("Payment system settings are invalid: {0}")]
    InvalidSettings(String),
    #[error("Payment notification signature is invalid")]
    InvalidSignature,
    #[error("Payment notification is invalid: {0}")]
    InvalidNotification(String),
    #[error("The payment system rejected the payment: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreatePaymentStatus {
    Ok,
    ErrorValidation,
    ErrorSystem,
}

/// The answer to a payment form submission. Failures are reported through `status` and `message`, never as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePaymentResponse {
    pub status: CreatePaymentStatus,
    pub message: String,
    /// Where to send the payer next. Empty unless `status` is `Ok`.
    pub redirect_url: String,
}

impl CreatePaymentResponse {
    pub fn ok<S: Into<String>>(redirect_url: S) -> Self {
        Self { status: CreatePaymentStatus::Ok, message: String::new(), redirect_url: redirect_url.into() }
    }

    pub fn validation_error<S: Into<String>>(message: S) -> Self {
        Self { status: CreatePaymentStatus::ErrorValidation, message: message.into(), redirect_url: String::new() }
    }

    pub fn system_error<S: Into<String>>(message: S) -> Self {
        Self { status: CreatePaymentStatus::ErrorSystem, message: message.into(), redirect_url: String::new() }
    }

    pub fn is_ok(&self) -> bool {
        self.status == CreatePaymentStatus::Ok
    }
}

/// A payment system's callback about the outcome of a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentNotification {
    pub order_id: OrderId,
    /// The payment system's own id for the payment
    pub payment_method_order_id: Option<String>,
    /// The amount the payment system received
    pub amount: Amount,
    /// Alpha-3 code of the received currency
    pub currency: String,
    /// The payer's account at the payment system
    pub account: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
    pub signature: String,
}

pub trait PaymentSystemHandler: Send + Sync {
    /// Asks the payment system to create the payment for the order.
    fn create_payment(&self, order: &Order) -> CreatePaymentResponse;

    /// Validates a notification and records the reported payment details on the order.
    ///
    /// An `Err` means the payment is rejected. The handler may still have recorded the reported details on the order,
    /// and the order manager stores them either way.
    fn process_payment(&self, order: &mut Order, notification: &PaymentNotification) -> Result<(), PaymentSystemError>;
}

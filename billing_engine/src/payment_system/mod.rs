//! Payment system protocol handlers.
//!
//! Every payment system speaks its own protocol. The order manager does not care which: it asks the
//! [`PaymentSystemRegistry`] for the [`PaymentSystemHandler`] named by the order's payment system, and calls
//! `create_payment` when the payer submits the payment form and `process_payment` when the payment system calls back.
//!
//! [`SignedCallbackHandler`] is the built-in handler. It redirects the payer to a configured payment page and accepts
//! notifications signed with HMAC-SHA256.
mod handler;
mod registry;
mod signed_callback;

pub use handler::{
    CreatePaymentResponse,
    CreatePaymentStatus,
    PaymentNotification,
    PaymentSystemError,
    PaymentSystemHandler,
};
pub use registry::{HandlerFactory, HandlerSettings, PaymentSystemRegistry};
pub use signed_callback::{sign_notification, SignedCallbackHandler, SIGNED_CALLBACK};

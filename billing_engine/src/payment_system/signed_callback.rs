use chrono::Utc;
use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha256;

use crate::{
    db_types::Order,
    payment_system::{
        CreatePaymentResponse,
        HandlerSettings,
        PaymentNotification,
        PaymentSystemError,
        PaymentSystemHandler,
    },
};

pub const SIGNED_CALLBACK: &str = "signed_callback";

type HmacSha256 = Hmac<Sha256>;

/// Redirects the payer to the configured payment page and accepts HMAC-SHA256 signed notifications.
///
/// The notification signature is the hex HMAC, keyed with the handler secret, of
///
/// ```text
///    {order_id}|{payment_method_order_id}|{amount}|{currency}|{account}
/// ```
///
/// where missing optional fields are empty strings and `amount` has exactly two decimals.
#[derive(Debug, Clone)]
pub struct SignedCallbackHandler {
    secret: String,
    payment_url: String,
}

impl SignedCallbackHandler {
    pub fn new(settings: &HandlerSettings) -> Result<Self, PaymentSystemError> {
        if settings.secret.reveal().is_empty() {
            return Err(PaymentSystemError::InvalidSettings(format!("{SIGNED_CALLBACK} requires a secret")));
        }
        Ok(Self { secret: settings.secret.reveal().clone(), payment_url: settings.payment_url.clone() })
    }
}

fn notification_message(n: &PaymentNotification) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        n.order_id,
        n.payment_method_order_id.as_deref().unwrap_or_default(),
        n.amount,
        n.currency,
        n.account.as_deref().unwrap_or_default()
    )
}

fn mac(secret: &str) -> Result<HmacSha256, PaymentSystemError> {
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| PaymentSystemError::InvalidSettings(e.to_string()))
}

/// Computes the signature a payment system using the `signed_callback` protocol attaches to a notification.
pub fn sign_notification(secret: &str, notification: &PaymentNotification) -> Result<String, PaymentSystemError> {
    let mut mac = mac(secret)?;
    mac.update(notification_message(notification).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

impl PaymentSystemHandler for SignedCallbackHandler {
    fn create_payment(&self, order: &Order) -> CreatePaymentResponse {
        if self.payment_url.is_empty() {
            return CreatePaymentResponse::system_error(format!("{SIGNED_CALLBACK} has no payment url configured"));
        }
        let (amount, currency) = match &order.payment_method_outcome_currency {
            Some(currency) => (order.payment_method_outcome_amount, currency.as_str()),
            None => (order.project_income_amount, order.project_income_currency.as_str()),
        };
        let glue = if self.payment_url.contains('?') { '&' } else { '?' };
        let url = format!("{}{glue}order_id={}&amount={amount}&currency={currency}", self.payment_url, order.id);
        debug!("💳️ Payment for order {} created. Redirecting payer to {url}", order.id);
        CreatePaymentResponse::ok(url)
    }

    fn process_payment(&self, order: &mut Order, notification: &PaymentNotification) -> Result<(), PaymentSystemError> {
        if notification.order_id != order.id {
            return Err(PaymentSystemError::InvalidNotification(format!(
                "notification for order {} was delivered for order {}",
                notification.order_id, order.id
            )));
        }
        // The reported details are recorded even when the notification is rejected below
        order.payment_method_income_amount = notification.amount;
        order.payment_method_income_currency = Some(notification.currency.clone());
        order.payment_method_order_id = notification.payment_method_order_id.clone();
        order.payment_method_account = notification.account.clone();
        order.payment_method_order_closed_at = Some(notification.closed_at.unwrap_or_else(Utc::now));

        let signature = hex::decode(notification.signature.trim()).map_err(|_| PaymentSystemError::InvalidSignature)?;
        let mut mac = mac(&self.secret)?;
        mac.update(notification_message(notification).as_bytes());
        mac.verify_slice(&signature).map_err(|_| PaymentSystemError::InvalidSignature)?;

        if !notification.amount.is_positive() {
            return Err(PaymentSystemError::Rejected(format!("amount {} is not positive", notification.amount)));
        }
        Ok(())
    }
}

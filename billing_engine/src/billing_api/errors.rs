use thiserror::Error;

use crate::{
    db_types::OrderStatus,
    payment_system::PaymentSystemError,
    traits::{CatalogError, CommissionError, ExchangeRateError, PaymentGatewayError, VatError},
};

/// Everything that can go wrong while pricing, paying for or finalizing an order.
///
/// The messages of the named variants are part of the public API: merchants match on them.
#[derive(Debug, Clone, Error)]
pub enum OrderManagerError {
    #[error("project with specified identifier not found")]
    ProjectNotFound,
    #[error("project with specified identifier is inactive")]
    ProjectInactive,
    #[error("payment method not specified for project")]
    PaymentMethodNotAllowed,
    #[error("payment method with specified not found")]
    PaymentMethodNotFound,
    #[error("payment method with specified is inactive")]
    PaymentMethodInactive,
    #[error("payment system for specified payment method not found")]
    PaymentSystemNotFound,
    #[error("payment system for specified payment method is inactive")]
    PaymentSystemInactive,
    #[error("payer region can't be found")]
    PayerRegionUnknown,
    #[error("project not have fixed packages for payer region")]
    FixedPackageForRegionNotFound,
    #[error("project not have fixed package with specified amount or currency")]
    FixedPackageNotFound,
    #[error("request with specified project order identifier processed early")]
    ProjectOrderIdIsDuplicate,
    #[error("dynamic verify url or notify url not allowed for project")]
    DynamicNotifyUrlsNotAllowed,
    #[error("dynamic payer redirect urls not allowed for project")]
    DynamicRedirectUrlsNotAllowed,
    #[error("currency received from request not found")]
    CurrencyNotFound,
    #[error("order amount is lower than min allowed payment amount for project")]
    AmountLowerThanMinAllowed,
    #[error("order amount is greater than max allowed payment amount for project")]
    AmountGreaterThanMaxAllowed,
    #[error("order amount is lower than min allowed payment amount for payment method")]
    AmountLowerThanMinAllowedPaymentMethod,
    #[error("order amount is greater than max allowed payment amount for payment method")]
    AmountGreaterThanMaxAllowedPaymentMethod,
    #[error("order can't create. try request later")]
    CanNotCreate,
    #[error("order request signature is invalid")]
    SignatureInvalid,
    #[error("order with specified identifier not found")]
    OrderNotFound,
    #[error("order with specified identifier payed early")]
    OrderAlreadyComplete,
    #[error("order with specified identifier already ended (status is {})", .0.code())]
    OrderAlreadyHasEndedStatus(OrderStatus),
    #[error("unknown currency received from payment system")]
    UnknownIncomeCurrency,
    #[error("unknown PSP accounting currency")]
    UnconfiguredPspCurrency,
    #[error("required field with order identifier not found")]
    OrderIdFieldRequired,
    #[error("required field with payment method identifier not found")]
    PaymentMethodFieldRequired,
    #[error("required field \"email\" not found")]
    EmailFieldRequired,
    #[error("{0}")]
    ExchangeRateError(#[from] ExchangeRateError),
    #[error("{0}")]
    CommissionError(#[from] CommissionError),
    #[error("{0}")]
    VatError(#[from] VatError),
    #[error("{0}")]
    CatalogError(#[from] CatalogError),
    #[error("{0}")]
    DatabaseError(#[from] PaymentGatewayError),
    #[error("{0}")]
    PaymentSystemError(#[from] PaymentSystemError),
}

impl OrderManagerError {
    /// True for failures caused by the request itself, as opposed to missing configuration or infrastructure.
    pub fn is_validation_error(&self) -> bool {
        !matches!(
            self,
            OrderManagerError::CanNotCreate |
                OrderManagerError::UnconfiguredPspCurrency |
                OrderManagerError::ExchangeRateError(_) |
                OrderManagerError::CommissionError(_) |
                OrderManagerError::VatError(_) |
                OrderManagerError::CatalogError(_) |
                OrderManagerError::DatabaseError(_) |
                OrderManagerError::PaymentSystemError(_)
        )
    }
}

#[derive(Debug, Clone, Error)]
pub enum ProjectApiError {
    #[error("project with specified identifier not found")]
    ProjectNotFound,
    #[error("Invalid project update: {0}")]
    InvalidUpdate(String),
    #[error("Currency {0} does not exist")]
    CurrencyNotFound(String),
    #[error("{0}")]
    CatalogError(#[from] CatalogError),
}

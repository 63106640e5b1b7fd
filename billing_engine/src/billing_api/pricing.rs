//! Pure pricing checks. Nothing in here touches a backend, so every rule can be tested in isolation.
use billing_common::Amount;

use crate::{
    billing_api::{errors::OrderManagerError, order_objects::OrderCreateRequest},
    db_types::{CommissionOrder, Merchant, OrderFixedPackage, PaymentMethod, Project, ProjectPaymentMethod},
};

/// The project's configuration for a payment method group. When several configurations share the alias, the most
/// recently added one wins (the first of equals on a tie).
pub fn select_project_payment_method<'a>(
    project: &'a Project,
    group_alias: &str,
) -> Result<&'a ProjectPaymentMethod, OrderManagerError> {
    project
        .payment_methods
        .iter()
        .filter(|ppm| ppm.group_alias == group_alias)
        .reduce(|best, candidate| if best.added_at < candidate.added_at { candidate } else { best })
        .ok_or(OrderManagerError::PaymentMethodNotAllowed)
}

/// The payment method must exist and be active, and so must its payment system.
pub fn check_payment_method(pm: Option<PaymentMethod>) -> Result<PaymentMethod, OrderManagerError> {
    let pm = pm.ok_or(OrderManagerError::PaymentMethodNotFound)?;
    if !pm.is_active {
        return Err(OrderManagerError::PaymentMethodInactive);
    }
    match &pm.payment_system {
        None => Err(OrderManagerError::PaymentSystemNotFound),
        Some(ps) if !ps.is_active => Err(OrderManagerError::PaymentSystemInactive),
        Some(_) => Ok(pm),
    }
}

/// Finds the region's package with exactly this price and currency. If several match, the last one wins.
pub fn match_fixed_package(
    project: &Project,
    region: &str,
    amount: Amount,
    currency: &str,
) -> Result<OrderFixedPackage, OrderManagerError> {
    let packages = project.fixed_packages.get(region).ok_or(OrderManagerError::FixedPackageForRegionNotFound)?;
    packages
        .iter()
        .enumerate()
        .filter(|(_, p)| p.price == amount && p.currency == currency)
        .last()
        .map(|(index, p)| OrderFixedPackage {
            index: index as i64,
            region: region.to_string(),
            name: p.name.clone(),
            price: p.price,
            currency: p.currency.clone(),
        })
        .ok_or(OrderManagerError::FixedPackageNotFound)
}

/// Checks `min <= amount <= max`.
pub fn check_limits(
    amount: Amount,
    min: Amount,
    max: Amount,
    too_low: OrderManagerError,
    too_high: OrderManagerError,
) -> Result<(), OrderManagerError> {
    if amount < min {
        return Err(too_low);
    }
    if amount > max {
        return Err(too_high);
    }
    Ok(())
}

pub fn check_project_limits(project: &Project, amount: Amount) -> Result<(), OrderManagerError> {
    check_limits(
        amount,
        project.min_payment_amount,
        project.max_payment_amount,
        OrderManagerError::AmountLowerThanMinAllowed,
        OrderManagerError::AmountGreaterThanMaxAllowed,
    )
}

pub fn check_payment_method_limits(pm: &PaymentMethod, amount: Amount) -> Result<(), OrderManagerError> {
    check_limits(
        amount,
        pm.min_payment_amount,
        pm.max_payment_amount,
        OrderManagerError::AmountLowerThanMinAllowedPaymentMethod,
        OrderManagerError::AmountGreaterThanMaxAllowedPaymentMethod,
    )
}

pub fn check_dynamic_urls(request: &OrderCreateRequest, project: &Project) -> Result<(), OrderManagerError> {
    if request.has_dynamic_notify_urls() && !project.allow_dynamic_notify_urls {
        return Err(OrderManagerError::DynamicNotifyUrlsNotAllowed);
    }
    if request.has_dynamic_redirect_urls() && !project.allow_dynamic_redirect_urls {
        return Err(OrderManagerError::DynamicRedirectUrlsNotAllowed);
    }
    Ok(())
}

/// What the payer pays through a payment method, in the payment method's currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaymentMethodPricing {
    /// The order amount converted into the payment method currency
    pub amount: Amount,
    pub commissions: CommissionOrder,
    /// The commission share passed on to the payer; zero unless the merchant enables it
    pub to_user_commission: Amount,
    /// Zero unless the merchant is VAT-enabled
    pub vat: Amount,
}

impl PaymentMethodPricing {
    pub fn new(merchant: &Merchant, amount: Amount, commissions: CommissionOrder, vat: Amount) -> Self {
        let to_user_commission =
            if merchant.is_commission_to_user_enabled { commissions.to_user_commission } else { Amount::ZERO };
        let vat = if merchant.is_vat_enabled { vat } else { Amount::ZERO };
        Self { amount, commissions, to_user_commission, vat }
    }

    /// The total the payer pays.
    pub fn outcome_amount(&self) -> Amount {
        self.amount + self.to_user_commission + self.vat
    }

    /// The commission the merchant bears, in the payment method currency. Never negative.
    pub fn project_fee(&self) -> Amount {
        (self.commissions.psp_commission + self.commissions.pm_commission - self.to_user_commission).non_negative()
    }
}

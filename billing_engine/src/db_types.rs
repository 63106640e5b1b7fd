use std::{
    collections::HashMap,
    fmt::Display,
    str::FromStr,
    sync::OnceLock,
};

pub use billing_common::{Amount, Secret};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------     OrderStatus     ---------------------------------------------------------
/// The life-cycle state of an order. The integer codes are part of the public filter API and are stored as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OrderStatus {
    /// The order has been priced and saved, but the payer has not submitted the payment form yet.
    #[default]
    New,
    /// The payment system has been asked to create the payment.
    PaymentSystemCreate,
    /// The payment system refused to create the payment.
    PaymentSystemRejectOnCreate,
    /// The payment system notified us that the payment failed.
    PaymentSystemReject,
    /// The payment system notified us that the payment succeeded.
    PaymentSystemComplete,
    ProjectInProgress,
    ProjectComplete,
    ProjectPending,
    ProjectReject,
    Refund,
    Chargeback,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 11] = [
        OrderStatus::New,
        OrderStatus::PaymentSystemCreate,
        OrderStatus::PaymentSystemRejectOnCreate,
        OrderStatus::PaymentSystemReject,
        OrderStatus::PaymentSystemComplete,
        OrderStatus::ProjectInProgress,
        OrderStatus::ProjectComplete,
        OrderStatus::ProjectPending,
        OrderStatus::ProjectReject,
        OrderStatus::Refund,
        OrderStatus::Chargeback,
    ];

    /// Statuses that count as revenue in reports.
    pub const REVENUE: [OrderStatus; 4] = [
        OrderStatus::PaymentSystemComplete,
        OrderStatus::ProjectInProgress,
        OrderStatus::ProjectComplete,
        OrderStatus::ProjectPending,
    ];

    pub fn code(&self) -> i32 {
        match self {
            OrderStatus::New => 0,
            OrderStatus::PaymentSystemCreate => 1,
            OrderStatus::PaymentSystemRejectOnCreate => 2,
            OrderStatus::PaymentSystemReject => 3,
            OrderStatus::PaymentSystemComplete => 4,
            OrderStatus::ProjectInProgress => 5,
            OrderStatus::ProjectComplete => 6,
            OrderStatus::ProjectPending => 7,
            OrderStatus::ProjectReject => 8,
            OrderStatus::Refund => 9,
            OrderStatus::Chargeback => 10,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            OrderStatus::New => "Payment created",
            OrderStatus::PaymentSystemCreate => "Payment sent to payment system",
            OrderStatus::PaymentSystemRejectOnCreate => "Payment rejected by payment system on create",
            OrderStatus::PaymentSystemReject => "Payment rejected by payment system",
            OrderStatus::PaymentSystemComplete => "Payment confirmed by payment system",
            OrderStatus::ProjectInProgress => "Project is processing the payment",
            OrderStatus::ProjectComplete => "Payment completed",
            OrderStatus::ProjectPending => "Project is waiting for the payment",
            OrderStatus::ProjectReject => "Payment rejected by project",
            OrderStatus::Refund => "Refund",
            OrderStatus::Chargeback => "Chargeback",
        }
    }

    /// The payment has gone through; the payer may not submit the payment form again.
    pub fn is_complete(&self) -> bool {
        OrderStatus::REVENUE.contains(self)
    }
}

impl TryFrom<i64> for OrderStatus {
    type Error = ConversionError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        OrderStatus::ALL
            .iter()
            .find(|s| i64::from(s.code()) == code)
            .copied()
            .ok_or_else(|| ConversionError(format!("Invalid order status code: {code}")))
    }
}

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().parse::<i64>().map_err(|e| ConversionError(format!("Invalid order status: {s}. {e}")))?;
        Self::try_from(code)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

impl Serialize for OrderStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i64::deserialize(deserializer)?;
        OrderStatus::try_from(code).map_err(serde::de::Error::custom)
    }
}

//--------------------------------------        OrderId        ---------------------------------------------------------
/// Order identifiers are 24 lower-case hex characters (12 random bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

fn order_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("^[0-9a-f]{24}$").expect("order id pattern is valid"))
}

impl OrderId {
    pub fn random() -> Self {
        let bytes: [u8; 12] = rand::random();
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if order_id_pattern().is_match(&s) {
            Ok(Self(s))
        } else {
            Err(ConversionError(format!("Invalid order id: {s}")))
        }
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------        Catalog        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    /// ISO 4217 numeric code
    pub code_int: i32,
    /// ISO 4217 alphabetic code
    pub code_a3: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merchant {
    pub id: String,
    pub name: String,
    /// Alpha-3 code of the merchant's accounting currency
    pub currency: String,
    pub is_vat_enabled: bool,
    pub is_commission_to_user_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSystem {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub accounting_currency: String,
    /// Name of the protocol handler in the payment system registry
    pub handler: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    pub name: String,
    pub group_alias: String,
    /// Settlement currency of the payment method
    pub currency: String,
    pub min_payment_amount: Amount,
    pub max_payment_amount: Amount,
    pub is_active: bool,
    pub params: HashMap<String, String>,
    /// `None` when the referenced payment system does not exist
    pub payment_system: Option<PaymentSystem>,
}

/// A payment method enabled for a project, under a group alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPaymentMethod {
    pub group_alias: String,
    pub payment_method_id: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedPackage {
    pub name: String,
    pub price: Amount,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub id: String,
    pub merchant: Merchant,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub secret_key: Secret<String>,
    pub callback_currency: String,
    pub limits_currency: String,
    pub min_payment_amount: Amount,
    pub max_payment_amount: Amount,
    pub only_fixed_amounts: bool,
    pub allow_dynamic_notify_urls: bool,
    pub allow_dynamic_redirect_urls: bool,
    pub payment_methods: Vec<ProjectPaymentMethod>,
    /// Fixed packages keyed by region (country code). The order within a region is significant.
    pub fixed_packages: HashMap<String, Vec<FixedPackage>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------         Order         ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderProject {
    pub id: String,
    pub name: String,
    pub merchant_id: String,
    pub merchant_currency: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayerData {
    pub ip: Option<String>,
    pub country_code: Option<String>,
    pub subdivision: Option<String>,
    pub city: Option<String>,
    pub timezone: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaymentMethod {
    pub id: String,
    pub name: String,
    pub group_alias: String,
    pub handler: String,
    pub payment_system_id: String,
    pub payment_system_accounting_currency: String,
}

impl OrderPaymentMethod {
    /// Builds the order's copy of a payment method. Returns `None` if the method has no payment system.
    pub fn from_payment_method(pm: &PaymentMethod) -> Option<Self> {
        let ps = pm.payment_system.as_ref()?;
        Some(Self {
            id: pm.id.clone(),
            name: pm.name.clone(),
            group_alias: pm.group_alias.clone(),
            handler: ps.handler.clone(),
            payment_system_id: ps.id.clone(),
            payment_system_accounting_currency: ps.accounting_currency.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFixedPackage {
    /// Position of the package in the region's package list
    pub index: i64,
    pub region: String,
    pub name: String,
    pub price: Amount,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFees {
    pub project_fee: Amount,
    pub payment_method_fee: Amount,
    pub psp_fee: Amount,
    pub to_payer_fee: Amount,
    pub vat: Amount,
}

impl OrderFees {
    pub fn is_empty(&self) -> bool {
        *self == OrderFees::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub project: OrderProject,
    pub description: String,
    pub project_order_id: Option<String>,
    pub project_account: Option<String>,
    pub project_income_amount: Amount,
    pub project_income_currency: String,
    pub project_outcome_amount: Amount,
    pub project_outcome_currency: String,
    pub project_params: HashMap<String, String>,
    pub payer: PayerData,
    pub payment_method: Option<OrderPaymentMethod>,
    pub payment_method_outcome_amount: Amount,
    pub payment_method_outcome_currency: Option<String>,
    pub payment_method_income_amount: Amount,
    pub payment_method_income_currency: Option<String>,
    pub payment_method_order_id: Option<String>,
    pub payment_method_account: Option<String>,
    pub payment_method_order_closed_at: Option<DateTime<Utc>>,
    pub fees: OrderFees,
    pub amount_in_merchant_accounting_currency: Amount,
    pub amount_out_merchant_accounting_currency: Amount,
    pub amount_in_psp_accounting_currency: Amount,
    pub amount_in_payment_system_accounting_currency: Amount,
    pub status: OrderStatus,
    pub fixed_package: Option<OrderFixedPackage>,
    pub payment_requisites: HashMap<String, String>,
    pub is_json_request: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Order #{} for project {} [{} {}] {}",
            self.id, self.project.id, self.project_income_amount, self.project_income_currency, self.status
        )
    }
}

//--------------------------------------    Exchange rates     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub from_currency: String,
    pub to_currency: String,
    /// Units of `to_currency` per unit of `from_currency`
    pub rate: f64,
    pub updated_at: DateTime<Utc>,
}

impl ExchangeRate {
    pub fn new(from_currency: &str, to_currency: &str, rate: f64) -> Self {
        Self {
            from_currency: from_currency.to_string(),
            to_currency: to_currency.to_string(),
            rate,
            updated_at: Utc::now(),
        }
    }

    /// The rate in the opposite direction.
    pub fn inverse(&self) -> Self {
        Self {
            from_currency: self.to_currency.clone(),
            to_currency: self.from_currency.clone(),
            rate: 1.0 / self.rate,
            updated_at: self.updated_at,
        }
    }

    pub fn convert(&self, amount: Amount) -> Amount {
        amount.convert(self.rate)
    }
}

//--------------------------------------      Commissions      ---------------------------------------------------------
/// Commission rule for a (project, payment method) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commission {
    pub project_id: String,
    pub payment_method_id: String,
    /// Percentage of the amount taken by the PSP
    pub psp_percent: f64,
    /// Percentage of the amount taken by the payment method
    pub pm_percent: f64,
    /// Flat fee charged by the payment method, in the payment method currency
    pub pm_fixed_fee: Amount,
    /// Percentage of the total commission passed on to the payer
    pub to_user_percent: f64,
}

/// The commission split for a single amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionOrder {
    pub psp_commission: Amount,
    pub pm_commission: Amount,
    pub to_user_commission: Amount,
}

impl Commission {
    pub fn apply(&self, amount: Amount) -> CommissionOrder {
        let psp_commission = amount.percent(self.psp_percent);
        let pm_commission = amount.percent(self.pm_percent) + self.pm_fixed_fee;
        let to_user_commission = (psp_commission + pm_commission).percent(self.to_user_percent);
        CommissionOrder { psp_commission, pm_commission, to_user_commission }
    }
}

//--------------------------------------          VAT          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatRate {
    pub country: String,
    /// `None` for the country-wide rate
    pub subdivision: Option<String>,
    /// VAT rate, in percent
    pub rate: f64,
}

impl VatRate {
    pub fn apply(&self, amount: Amount) -> Amount {
        amount.percent(self.rate)
    }
}

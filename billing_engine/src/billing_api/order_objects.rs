use std::{
    collections::{BTreeMap, HashMap},
    fmt::Display,
    net::IpAddr,
    str::FromStr,
};

use billing_common::Amount;
use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{ConversionError, Currency, Order, OrderFixedPackage, OrderId, OrderStatus, PayerData},
    payment_system::PaymentSystemError,
};

//--------------------------------------  OrderCreateRequest   ---------------------------------------------------------
/// Request parameters with a meaning of their own. Everything else a merchant sends is kept as project params.
pub const RESERVED_ORDER_FIELDS: [&str; 15] = [
    "project",
    "amount",
    "currency",
    "region",
    "payment_method",
    "signature",
    "order_id",
    "account",
    "description",
    "url_verify",
    "url_notify",
    "url_success",
    "url_fail",
    "payer_email",
    "payer_phone",
];

/// A merchant's request to create an order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrderCreateRequest {
    pub project: String,
    pub amount: Amount,
    /// Alpha-3 code. The project's limits currency is used when absent.
    pub currency: Option<String>,
    /// Overrides the country resolved from the payer's IP address
    pub region: Option<String>,
    /// Payment method group alias
    pub payment_method: Option<String>,
    pub signature: Option<String>,
    /// The merchant's own order id
    pub order_id: Option<String>,
    pub account: Option<String>,
    pub description: Option<String>,
    pub url_verify: Option<String>,
    pub url_notify: Option<String>,
    pub url_success: Option<String>,
    pub url_fail: Option<String>,
    pub payer_email: Option<String>,
    pub payer_phone: Option<String>,
    /// The payer's address, as seen by the server
    pub ip: Option<IpAddr>,
    /// Every submitted parameter, verbatim. The signature is computed over these.
    pub raw_params: BTreeMap<String, String>,
    /// Submitted parameters that are not reserved fields
    pub other: HashMap<String, String>,
    pub is_json_request: bool,
}

impl OrderCreateRequest {
    /// Builds a request from flat key/value parameters. Empty values count as absent.
    pub fn from_params(params: BTreeMap<String, String>, is_json_request: bool) -> Result<Self, ConversionError> {
        let get = |key: &str| params.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let project = get("project").ok_or_else(|| ConversionError("project is required".to_string()))?;
        let amount = get("amount")
            .ok_or_else(|| ConversionError("amount is required".to_string()))
            .and_then(|a| Amount::from_str(&a).map_err(|e| ConversionError(e.to_string())))?;
        let other = params
            .iter()
            .filter(|(k, _)| !RESERVED_ORDER_FIELDS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Self {
            project,
            amount,
            currency: get("currency").map(|c| c.to_ascii_uppercase()),
            region: get("region").map(|r| r.to_ascii_uppercase()),
            payment_method: get("payment_method"),
            signature: get("signature"),
            order_id: get("order_id"),
            account: get("account"),
            description: get("description"),
            url_verify: get("url_verify"),
            url_notify: get("url_notify"),
            url_success: get("url_success"),
            url_fail: get("url_fail"),
            payer_email: get("payer_email"),
            payer_phone: get("payer_phone"),
            ip: None,
            raw_params: params,
            other,
            is_json_request,
        })
    }

    pub fn with_ip(mut self, ip: Option<IpAddr>) -> Self {
        self.ip = ip;
        self
    }

    pub fn has_dynamic_notify_urls(&self) -> bool {
        self.url_verify.is_some() || self.url_notify.is_some()
    }

    pub fn has_dynamic_redirect_urls(&self) -> bool {
        self.url_success.is_some() || self.url_fail.is_some()
    }
}

//--------------------------------------    Payment form       ---------------------------------------------------------
pub const PAYMENT_FIELD_ORDER_ID: &str = "order_id";
pub const PAYMENT_FIELD_PAYMENT_METHOD_ID: &str = "payment_method_id";
pub const PAYMENT_FIELD_EMAIL: &str = "email";

/// Amount and fees the payer would see for one of the project's payment methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodPreparedData {
    pub payment_method_id: String,
    pub name: String,
    /// Total the payer pays with this method, commission and VAT included
    pub amount: Amount,
    pub currency: String,
    pub to_user_commission: Amount,
    pub vat: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWithPaymentMethods {
    pub order: Order,
    /// Keyed by payment method group alias
    pub payment_methods: HashMap<String, PaymentMethodPreparedData>,
}

/// The result of applying a payment system notification.
#[derive(Debug, Clone)]
pub struct NotificationOutcome {
    /// The order as stored after the notification
    pub order: Order,
    /// Why the payment system handler rejected the payment, if it did
    pub rejection: Option<PaymentSystemError>,
}

impl NotificationOutcome {
    pub fn is_rejected(&self) -> bool {
        self.rejection.is_some()
    }
}

//--------------------------------------      OrderFilter      ---------------------------------------------------------
pub const FILTER_FIELD_ID: &str = "id";
pub const FILTER_FIELD_PAYMENT_METHOD: &str = "payment_method";
pub const FILTER_FIELD_COUNTRY: &str = "country";
pub const FILTER_FIELD_STATUS: &str = "status";
pub const FILTER_FIELD_ACCOUNT: &str = "account";
pub const FILTER_FIELD_PM_DATE_FROM: &str = "pm_date_from";
pub const FILTER_FIELD_PM_DATE_TO: &str = "pm_date_to";
pub const FILTER_FIELD_PROJECT_DATE_FROM: &str = "project_date_from";
pub const FILTER_FIELD_PROJECT_DATE_TO: &str = "project_date_to";

/// Typed order search criteria. Orders outside `projects` never match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFilter {
    pub projects: Vec<String>,
    /// Exact order id. An id that is not a valid order id matches nothing.
    pub id: Option<String>,
    pub payment_methods: Vec<String>,
    pub countries: Vec<String>,
    pub statuses: Vec<OrderStatus>,
    /// Case-insensitive substring of the project account, payment method account, payer phone or payer e-mail
    pub account: Option<String>,
    /// Range on the payment system's close time
    pub pm_date_from: Option<DateTime<Utc>>,
    pub pm_date_to: Option<DateTime<Utc>>,
    /// Range on the order creation time
    pub project_date_from: Option<DateTime<Utc>>,
    pub project_date_to: Option<DateTime<Utc>>,
}

fn parse_unix_seconds(key: &str, value: &str) -> Option<DateTime<Utc>> {
    let result = value.trim().parse::<i64>().ok().and_then(|ts| DateTime::from_timestamp(ts, 0));
    if result.is_none() {
        debug!("📝️ Ignoring unparseable {key} filter value: {value}");
    }
    result
}

impl OrderFilter {
    pub fn for_projects(projects: Vec<String>) -> Self {
        Self { projects, ..Default::default() }
    }

    /// Parses free-form query values. Repeated keys (with or without a `[]` suffix) accumulate for the set filters;
    /// the first value wins for the scalar ones. Unparseable statuses and timestamps are ignored.
    pub fn from_values(projects: Vec<String>, values: &[(String, String)]) -> Self {
        let mut filter = Self::for_projects(projects);
        for (key, value) in values {
            let key = key.trim_end_matches("[]");
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key {
                FILTER_FIELD_ID if filter.id.is_none() => filter.id = Some(value.to_ascii_lowercase()),
                FILTER_FIELD_PAYMENT_METHOD => filter.payment_methods.push(value.to_string()),
                FILTER_FIELD_COUNTRY => filter.countries.push(value.to_ascii_uppercase()),
                FILTER_FIELD_STATUS => match OrderStatus::from_str(value) {
                    Ok(status) => filter.statuses.push(status),
                    Err(e) => debug!("📝️ Ignoring status filter value. {e}"),
                },
                FILTER_FIELD_ACCOUNT if filter.account.is_none() => filter.account = Some(value.to_string()),
                FILTER_FIELD_PM_DATE_FROM if filter.pm_date_from.is_none() => {
                    filter.pm_date_from = parse_unix_seconds(key, value)
                },
                FILTER_FIELD_PM_DATE_TO if filter.pm_date_to.is_none() => {
                    filter.pm_date_to = parse_unix_seconds(key, value)
                },
                FILTER_FIELD_PROJECT_DATE_FROM if filter.project_date_from.is_none() => {
                    filter.project_date_from = parse_unix_seconds(key, value)
                },
                FILTER_FIELD_PROJECT_DATE_TO if filter.project_date_to.is_none() => {
                    filter.project_date_to = parse_unix_seconds(key, value)
                },
                _ => {},
            }
        }
        filter
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn with_account<S: Into<String>>(mut self, account: S) -> Self {
        self.account = Some(account.into());
        self
    }
}

impl Display for OrderFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "projects: {:?}", self.projects)?;
        if let Some(id) = &self.id {
            write!(f, ", id: {id}")?;
        }
        if !self.payment_methods.is_empty() {
            write!(f, ", payment methods: {:?}", self.payment_methods)?;
        }
        if !self.countries.is_empty() {
            write!(f, ", countries: {:?}", self.countries)?;
        }
        if !self.statuses.is_empty() {
            let codes = self.statuses.iter().map(|s| s.code()).collect::<Vec<_>>();
            write!(f, ", statuses: {codes:?}")?;
        }
        if let Some(account) = &self.account {
            write!(f, ", account: {account}")?;
        }
        if self.pm_date_from.is_some() || self.pm_date_to.is_some() {
            write!(f, ", closed between {:?} and {:?}", self.pm_date_from, self.pm_date_to)?;
        }
        if self.project_date_from.is_some() || self.project_date_to.is_some() {
            write!(f, ", created between {:?} and {:?}", self.project_date_from, self.project_date_to)?;
        }
        Ok(())
    }
}

/// A page request for [`crate::OrderManagerApi::find_orders`].
#[derive(Debug, Clone, Default)]
pub struct ListOrdersRequest {
    /// The projects the caller may see
    pub projects: Vec<String>,
    pub values: Vec<(String, String)>,
    pub limit: i64,
    pub offset: i64,
}

//--------------------------------------      OrderSimple      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleItem {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleCurrency {
    pub code_int: i32,
    pub code_a3: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSimpleAmount {
    pub amount: Amount,
    pub currency: SimpleCurrency,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSimpleStatus {
    pub status: i32,
    pub description: String,
}

/// The caller-facing projection of an order in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSimple {
    pub id: OrderId,
    pub project: SimpleItem,
    pub account: Option<String>,
    pub project_order_id: Option<String>,
    pub payer: PayerData,
    pub project_technical_income: OrderSimpleAmount,
    pub project_accounting_income: OrderSimpleAmount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_system_technical_income: Option<OrderSimpleAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_accounting_outcome: Option<OrderSimpleAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_technical_outcome: Option<OrderSimpleAmount>,
    pub payment_method: Option<SimpleItem>,
    pub fixed_package: Option<OrderFixedPackage>,
    pub status: OrderSimpleStatus,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

fn simple_currency(code: &str, currencies: &HashMap<String, Currency>) -> SimpleCurrency {
    match currencies.get(code) {
        Some(c) => SimpleCurrency { code_int: c.code_int, code_a3: c.code_a3.clone(), name: c.name.clone() },
        None => {
            warn!("📝️ Currency {code} is referenced by an order but is not in the catalog");
            SimpleCurrency { code_int: 0, code_a3: code.to_string(), name: String::new() }
        },
    }
}

fn simple_amount(amount: Amount, code: &str, currencies: &HashMap<String, Currency>) -> OrderSimpleAmount {
    OrderSimpleAmount { amount, currency: simple_currency(code, currencies) }
}

fn nonzero_amount(amount: Amount, code: &str, currencies: &HashMap<String, Currency>) -> Option<OrderSimpleAmount> {
    amount.is_positive().then(|| simple_amount(amount, code, currencies))
}

impl OrderSimple {
    /// Projects an order, looking up currency details in `currencies` (keyed by alpha-3 code).
    pub fn from_order(order: &Order, currencies: &HashMap<String, Currency>) -> Self {
        let merchant_currency = order.project.merchant_currency.as_str();
        let ps_currency = order.payment_method.as_ref().map(|pm| pm.payment_system_accounting_currency.as_str());
        Self {
            id: order.id.clone(),
            project: SimpleItem { id: order.project.id.clone(), name: order.project.name.clone() },
            account: order.project_account.clone(),
            project_order_id: order.project_order_id.clone(),
            payer: order.payer.clone(),
            project_technical_income: simple_amount(
                order.project_income_amount,
                &order.project_income_currency,
                currencies,
            ),
            project_accounting_income: simple_amount(
                order.amount_in_merchant_accounting_currency,
                merchant_currency,
                currencies,
            ),
            payment_system_technical_income: ps_currency.and_then(|code| {
                nonzero_amount(order.amount_in_payment_system_accounting_currency, code, currencies)
            }),
            project_accounting_outcome: nonzero_amount(
                order.amount_out_merchant_accounting_currency,
                merchant_currency,
                currencies,
            ),
            project_technical_outcome: nonzero_amount(
                order.project_outcome_amount,
                &order.project_outcome_currency,
                currencies,
            ),
            payment_method: order
                .payment_method
                .as_ref()
                .map(|pm| SimpleItem { id: pm.id.clone(), name: pm.name.clone() }),
            fixed_package: order.fixed_package.clone(),
            status: OrderSimpleStatus {
                status: order.status.code(),
                description: order.status.description().to_string(),
            },
            created_at: order.created_at,
            confirmed_at: order.payment_method_order_closed_at,
        }
    }

    /// Alpha-3 codes of every currency the projection of `order` refers to.
    pub fn currency_codes(order: &Order) -> Vec<&str> {
        let mut codes = vec![
            order.project_income_currency.as_str(),
            order.project_outcome_currency.as_str(),
            order.project.merchant_currency.as_str(),
        ];
        if let Some(pm) = &order.payment_method {
            codes.push(pm.payment_system_accounting_currency.as_str());
        }
        codes
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPage {
    /// Total number of matching orders, regardless of paging
    pub count: i64,
    pub items: Vec<OrderSimple>,
}

use std::{
    collections::{HashMap, HashSet},
    fmt::Debug,
    str::FromStr,
    sync::Arc,
};

use billing_common::Amount;
use chrono::Utc;
use log::*;

use crate::{
    billing_api::{
        errors::OrderManagerError,
        order_objects::{
            ListOrdersRequest,
            NotificationOutcome,
            OrderCreateRequest,
            OrderFilter,
            OrderPage,
            OrderSimple,
            OrderWithPaymentMethods,
            PaymentMethodPreparedData,
            PAYMENT_FIELD_EMAIL,
            PAYMENT_FIELD_ORDER_ID,
            PAYMENT_FIELD_PAYMENT_METHOD_ID,
        },
        pricing::{
            check_dynamic_urls,
            check_payment_method,
            check_payment_method_limits,
            check_project_limits,
            match_fixed_package,
            select_project_payment_method,
            PaymentMethodPricing,
        },
        revenue_objects::{RevenueDynamicRequest, RevenueDynamicResult},
    },
    db_types::{
        Order,
        OrderFees,
        OrderId,
        OrderPaymentMethod,
        OrderProject,
        OrderStatus,
        PayerData,
        PaymentMethod,
        Project,
    },
    events::{EventProducers, OrderCreatedEvent, OrderNotifiedEvent},
    geoip::{GeoIpResolver, GeoIpTable, GeoRecord},
    helpers::verify_order_signature,
    payment_system::{CreatePaymentResponse, PaymentNotification, PaymentSystemRegistry},
    traits::{BillingBackend, CatalogManagement, OrderManagement, PaymentGatewayError},
};

/// `OrderManagerApi` prices and stores merchant orders, takes payers through the payment form, and applies payment
/// system notifications.
///
/// The backend `B` supplies the catalog, order storage, exchange rates, commissions and VAT. Payer geo-location and
/// payment system handlers are plugged in separately.
pub struct OrderManagerApi<B> {
    db: B,
    geoip: Arc<dyn GeoIpResolver>,
    payment_systems: PaymentSystemRegistry,
    psp_accounting_currency: Option<String>,
    producers: EventProducers,
}

impl<B> Debug for OrderManagerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderManagerApi ({:?}, PSP currency: {:?})", self.payment_systems, self.psp_accounting_currency)
    }
}

impl<B> OrderManagerApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self {
            db,
            geoip: Arc::new(GeoIpTable::default()),
            payment_systems: PaymentSystemRegistry::default(),
            psp_accounting_currency: None,
            producers,
        }
    }

    pub fn with_geoip(mut self, geoip: Arc<dyn GeoIpResolver>) -> Self {
        self.geoip = geoip;
        self
    }

    pub fn with_payment_systems(mut self, payment_systems: PaymentSystemRegistry) -> Self {
        self.payment_systems = payment_systems;
        self
    }

    pub fn with_psp_accounting_currency(mut self, currency: Option<String>) -> Self {
        self.psp_accounting_currency = currency;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    fn locate_payer(&self, request: &OrderCreateRequest) -> Option<GeoRecord> {
        let ip = request.ip?;
        match self.geoip.resolve(ip) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("🌍️ Could not locate payer. {e}");
                None
            },
        }
    }
}

impl<B> OrderManagerApi<B>
where B: OrderManagement
{
    /// Revenue less refunds per period bucket, in the merchant's accounting currency.
    pub async fn revenue_dynamic(
        &self,
        request: &RevenueDynamicRequest,
    ) -> Result<RevenueDynamicResult, OrderManagerError> {
        if request.projects.is_empty() {
            return Ok(RevenueDynamicResult::default());
        }
        let facets = self.db.revenue_dynamic(request).await?;
        trace!(
            "📝️ Revenue report for {} project(s): {} revenue point(s), {} refund point(s)",
            request.projects.len(),
            facets.points_revenue.len(),
            facets.points_refund.len()
        );
        Ok(RevenueDynamicResult::from(facets))
    }
}

impl<B> OrderManagerApi<B>
where B: OrderManagement + CatalogManagement
{
    /// A page of orders from the caller's projects, filtered by free-form query values.
    pub async fn find_orders(&self, request: &ListOrdersRequest) -> Result<OrderPage, OrderManagerError> {
        if request.projects.is_empty() {
            return Ok(OrderPage::default());
        }
        let filter = OrderFilter::from_values(request.projects.clone(), &request.values);
        debug!("📝️ Searching orders with filter: {filter}");
        let count = self.db.count_orders(&filter).await?;
        let orders = self.db.search_orders(&filter, request.limit, request.offset).await?;
        let codes = orders.iter().flat_map(OrderSimple::currency_codes).collect::<HashSet<_>>();
        let mut currencies = HashMap::with_capacity(codes.len());
        for code in codes {
            if let Some(currency) = self.db.fetch_currency(code).await? {
                currencies.insert(code.to_string(), currency);
            }
        }
        let items = orders.iter().map(|o| OrderSimple::from_order(o, &currencies)).collect();
        Ok(OrderPage { count, items })
    }
}

impl<B> OrderManagerApi<B>
where B: BillingBackend
{
    /// Validates and prices a merchant's order request and stores the new order.
    ///
    /// The checks run in a fixed order and the first failure is returned: project, currency, signature, payment
    /// method, fixed package, project limits, payment method limits, duplicate project order id and dynamic urls.
    /// Nothing is stored unless every check passes.
    pub async fn process_new_order(&self, request: OrderCreateRequest) -> Result<Order, OrderManagerError> {
        let project = self.db.fetch_project(&request.project).await?.ok_or(OrderManagerError::ProjectNotFound)?;
        if !project.is_active {
            return Err(OrderManagerError::ProjectInactive);
        }
        let currency_code = request.currency.clone().unwrap_or_else(|| project.limits_currency.clone());
        let currency = self.db.fetch_currency(&currency_code).await?.ok_or(OrderManagerError::CurrencyNotFound)?;

        if let Some(signature) = &request.signature {
            if !verify_order_signature(&request.raw_params, project.secret_key.reveal(), signature) {
                debug!("📝️ Order request for project {} has an invalid signature", project.id);
                return Err(OrderManagerError::SignatureInvalid);
            }
        }

        let payment_method = match &request.payment_method {
            Some(alias) => {
                let ppm = select_project_payment_method(&project, alias)?;
                let pm = self.db.fetch_payment_method(&ppm.payment_method_id).await?;
                Some(check_payment_method(pm)?)
            },
            None => None,
        };

        let geo = self.locate_payer(&request);
        let region = request.region.clone().or_else(|| geo.as_ref().map(|g| g.country_code.clone()));

        let fixed_package = if project.only_fixed_amounts {
            let region = region.as_deref().ok_or(OrderManagerError::PayerRegionUnknown)?;
            Some(match_fixed_package(&project, region, request.amount, &currency.code_a3)?)
        } else {
            None
        };

        let limits_amount = self.db.convert(&currency.code_a3, &project.limits_currency, request.amount).await?;
        check_project_limits(&project, limits_amount)?;

        let payer = PayerData {
            ip: request.ip.map(|ip| ip.to_string()),
            country_code: region.clone(),
            // The located subdivision only applies to the located country
            subdivision: geo
                .as_ref()
                .filter(|g| region.as_deref() == Some(g.country_code.as_str()))
                .and_then(|g| g.subdivision.clone()),
            city: geo.as_ref().and_then(|g| g.city.clone()),
            timezone: geo.as_ref().and_then(|g| g.timezone.clone()),
            phone: request.payer_phone.clone(),
            email: request.payer_email.clone(),
        };

        let pricing = match &payment_method {
            Some(pm) => Some(self.price_payment_method(&project, pm, &currency.code_a3, request.amount, &payer).await?),
            None => None,
        };

        if let Some(project_order_id) = &request.order_id {
            if self.db.fetch_order_by_project_order_id(&project.id, project_order_id).await?.is_some() {
                return Err(OrderManagerError::ProjectOrderIdIsDuplicate);
            }
        }
        check_dynamic_urls(&request, &project)?;

        let merchant_currency = project.merchant.currency.as_str();
        let amount_in_merchant = self.db.convert(&currency.code_a3, merchant_currency, request.amount).await?;
        let project_outcome_amount =
            self.db.convert(&currency.code_a3, &project.callback_currency, request.amount).await?;

        let fees = match (&payment_method, &pricing) {
            (Some(pm), Some(pricing)) => self.fees(&project, pm, pricing).await?,
            _ => OrderFees::default(),
        };
        let now = Utc::now();
        let order = Order {
            id: OrderId::random(),
            project: OrderProject {
                id: project.id.clone(),
                name: project.name.clone(),
                merchant_id: project.merchant.id.clone(),
                merchant_currency: merchant_currency.to_string(),
            },
            description: request.description.clone().unwrap_or_default(),
            project_order_id: request.order_id.clone(),
            project_account: request.account.clone(),
            project_income_amount: request.amount,
            project_income_currency: currency.code_a3.clone(),
            project_outcome_amount,
            project_outcome_currency: project.callback_currency.clone(),
            project_params: request.other.clone(),
            payer,
            payment_method: payment_method.as_ref().and_then(OrderPaymentMethod::from_payment_method),
            payment_method_outcome_amount: pricing.map(|p| p.outcome_amount()).unwrap_or_default(),
            payment_method_outcome_currency: payment_method.as_ref().map(|pm| pm.currency.clone()),
            payment_method_income_amount: Amount::ZERO,
            payment_method_income_currency: None,
            payment_method_order_id: None,
            payment_method_account: None,
            payment_method_order_closed_at: None,
            fees,
            amount_in_merchant_accounting_currency: amount_in_merchant,
            amount_out_merchant_accounting_currency: Amount::ZERO,
            amount_in_psp_accounting_currency: Amount::ZERO,
            amount_in_payment_system_accounting_currency: Amount::ZERO,
            status: OrderStatus::New,
            fixed_package,
            payment_requisites: HashMap::new(),
            is_json_request: request.is_json_request,
            created_at: now,
            updated_at: now,
        };

        match self.db.insert_order(&order).await {
            Ok(()) => {},
            Err(PaymentGatewayError::DuplicateProjectOrderId(project_id, project_order_id)) => {
                debug!("📝️ Project {project_id} submitted order {project_order_id} twice");
                return Err(OrderManagerError::ProjectOrderIdIsDuplicate);
            },
            Err(e) => {
                error!("📝️ Could not save order {} for project {}. {e}", order.id, project.id);
                return Err(OrderManagerError::CanNotCreate);
            },
        }
        info!("📝️ New order created. {order}");
        self.producers.publish_order_created(OrderCreatedEvent::new(order.clone())).await;
        Ok(order)
    }

    /// The order together with what the payer would pay with each of the project's payment methods.
    pub async fn order_with_payment_methods(&self, id: &OrderId) -> Result<OrderWithPaymentMethods, OrderManagerError> {
        let order = self.db.fetch_order_by_id(id).await?.ok_or(OrderManagerError::OrderNotFound)?;
        let project = self.db.fetch_project(&order.project.id).await?.ok_or(OrderManagerError::ProjectNotFound)?;
        let methods = self.db.fetch_project_payment_methods(&project.id).await?;
        let mut payment_methods = HashMap::with_capacity(methods.len());
        for pm in methods {
            let prepared = self.prepare_payment_method(&project, &pm, &order).await?;
            payment_methods.insert(pm.group_alias.clone(), prepared);
        }
        Ok(OrderWithPaymentMethods { order, payment_methods })
    }

    /// Handles the payer's payment form submission. Failures are reported in the response, never as errors.
    ///
    /// `order_id`, `payment_method_id` and `email` are required. Any other fields are stored on the order as payment
    /// requisites.
    pub async fn process_create_payment(&self, mut fields: HashMap<String, String>) -> CreatePaymentResponse {
        let order_id = fields.remove(PAYMENT_FIELD_ORDER_ID).filter(|v| !v.trim().is_empty());
        let pm_id = fields.remove(PAYMENT_FIELD_PAYMENT_METHOD_ID).filter(|v| !v.trim().is_empty());
        let email = fields.remove(PAYMENT_FIELD_EMAIL).filter(|v| !v.trim().is_empty());
        let (order_id, pm_id, email) = match (order_id, pm_id, email) {
            (None, _, _) => return validation_error(OrderManagerError::OrderIdFieldRequired),
            (_, None, _) => return validation_error(OrderManagerError::PaymentMethodFieldRequired),
            (_, _, None) => return validation_error(OrderManagerError::EmailFieldRequired),
            (Some(o), Some(p), Some(e)) => (o, p, e),
        };
        let Ok(order_id) = OrderId::from_str(&order_id) else {
            return validation_error(OrderManagerError::OrderNotFound);
        };
        match self.create_payment(&order_id, &pm_id, email, fields).await {
            Ok(response) => response,
            Err(e) if e.is_validation_error() => validation_error(e),
            Err(e) => {
                error!("💳️ Could not create the payment for order {order_id}. {e}");
                CreatePaymentResponse::system_error(e.to_string())
            },
        }
    }

    async fn create_payment(
        &self,
        order_id: &OrderId,
        pm_id: &str,
        email: String,
        requisites: HashMap<String, String>,
    ) -> Result<CreatePaymentResponse, OrderManagerError> {
        let mut order = self.db.fetch_order_by_id(order_id).await?.ok_or(OrderManagerError::OrderNotFound)?;
        if order.status.is_complete() {
            return Err(OrderManagerError::OrderAlreadyComplete);
        }
        let pm = check_payment_method(self.db.fetch_payment_method(pm_id).await?)?;

        let current = order.payment_method.as_ref().map(|p| p.id.as_str());
        if current != Some(pm.id.as_str()) {
            debug!("💳️ Order {order_id} switches payment method from {current:?} to {}", pm.id);
            let project = self.db.fetch_project(&order.project.id).await?.ok_or(OrderManagerError::ProjectNotFound)?;
            let pricing = self
                .price_payment_method(&project, &pm, &order.project_income_currency, order.project_income_amount, &order.payer)
                .await?;
            order.fees = self.fees(&project, &pm, &pricing).await?;
            order.payment_method = OrderPaymentMethod::from_payment_method(&pm);
            order.payment_method_outcome_amount = pricing.outcome_amount();
            order.payment_method_outcome_currency = Some(pm.currency.clone());
        }
        order.payer.email = Some(email);
        order.payment_requisites = requisites;
        order.updated_at = Utc::now();
        self.db.update_order(&order).await?;

        let handler = self.payment_systems.handler_for(&order)?;
        let response = handler.create_payment(&order);
        if response.is_ok() {
            order.status = OrderStatus::PaymentSystemCreate;
            order.updated_at = Utc::now();
            self.db.update_order(&order).await?;
            info!("💳️ Payment created for order {order_id}");
        } else {
            warn!("💳️ Payment system did not create the payment for order {order_id}: {}", response.message);
        }
        Ok(response)
    }

    /// Applies a payment system notification to its order.
    ///
    /// Only orders waiting on the payment system accept notifications. A payment the handler rejects is still
    /// recorded: the order moves to `PaymentSystemReject` and the reason is returned in the outcome.
    pub async fn process_notify_payment(
        &self,
        notification: &PaymentNotification,
    ) -> Result<NotificationOutcome, OrderManagerError> {
        let mut order =
            self.db.fetch_order_by_id(&notification.order_id).await?.ok_or(OrderManagerError::OrderNotFound)?;
        if order.status != OrderStatus::PaymentSystemCreate {
            return Err(OrderManagerError::OrderAlreadyHasEndedStatus(order.status));
        }
        let handler = self.payment_systems.handler_for(&order)?;
        let rejection = handler.process_payment(&mut order, notification).err();
        order.status = match &rejection {
            Some(e) => {
                warn!("💳️ Payment for order {} was rejected. {e}", order.id);
                OrderStatus::PaymentSystemReject
            },
            None => OrderStatus::PaymentSystemComplete,
        };

        let income_currency = match &order.payment_method_income_currency {
            Some(code) => self.db.fetch_currency(code).await?,
            None => None,
        }
        .ok_or(OrderManagerError::UnknownIncomeCurrency)?;
        let psp_currency = match &self.psp_accounting_currency {
            Some(code) => self.db.fetch_currency(code).await?,
            None => None,
        }
        .ok_or(OrderManagerError::UnconfiguredPspCurrency)?;
        let ps_currency = order
            .payment_method
            .as_ref()
            .map(|pm| pm.payment_system_accounting_currency.clone())
            .unwrap_or_else(|| income_currency.code_a3.clone());

        let from = income_currency.code_a3.as_str();
        let income = order.payment_method_income_amount;
        order.project_outcome_amount = self.db.convert(from, &order.project_outcome_currency, income).await?;
        order.amount_in_psp_accounting_currency = self.db.convert(from, &psp_currency.code_a3, income).await?;
        order.amount_out_merchant_accounting_currency =
            self.db.convert(from, &order.project.merchant_currency, income).await?;
        order.amount_in_payment_system_accounting_currency = self.db.convert(from, &ps_currency, income).await?;
        order.updated_at = Utc::now();
        self.db.update_order(&order).await?;
        info!("💳️ Payment notification applied. {order}");

        let event = OrderNotifiedEvent::new(order.clone(), rejection.as_ref().map(|e| e.to_string()));
        self.producers.publish_order_notified(event).await;
        Ok(NotificationOutcome { order, rejection })
    }

    /// Prices `amount` (in `currency`) through a payment method: payment method limits, commissions and VAT.
    async fn price_payment_method(
        &self,
        project: &Project,
        pm: &PaymentMethod,
        currency: &str,
        amount: Amount,
        payer: &PayerData,
    ) -> Result<PaymentMethodPricing, OrderManagerError> {
        let pm_amount = self.db.convert(currency, &pm.currency, amount).await?;
        check_payment_method_limits(pm, pm_amount)?;
        let commissions = self.db.calculate_commission(&project.id, &pm.id, pm_amount).await?;
        let vat = if project.merchant.is_vat_enabled {
            let country = payer.country_code.as_deref().ok_or(OrderManagerError::PayerRegionUnknown)?;
            self.db.calculate_vat(country, payer.subdivision.as_deref(), pm_amount).await?
        } else {
            Amount::ZERO
        };
        Ok(PaymentMethodPricing::new(&project.merchant, pm_amount, commissions, vat))
    }

    /// What the payer would pay for `order` through `pm`. Unlike [`Self::price_payment_method`] no limits are checked
    /// and commissions are only looked up when the merchant passes them on to the payer.
    async fn prepare_payment_method(
        &self,
        project: &Project,
        pm: &PaymentMethod,
        order: &Order,
    ) -> Result<PaymentMethodPreparedData, OrderManagerError> {
        let amount = self.db.convert(&order.project_income_currency, &pm.currency, order.project_income_amount).await?;
        let to_user_commission = if project.merchant.is_commission_to_user_enabled {
            self.db.calculate_commission(&project.id, &pm.id, amount).await?.to_user_commission
        } else {
            Amount::ZERO
        };
        let vat = if project.merchant.is_vat_enabled {
            let country = order.payer.country_code.as_deref().ok_or(OrderManagerError::PayerRegionUnknown)?;
            self.db.calculate_vat(country, order.payer.subdivision.as_deref(), amount).await?
        } else {
            Amount::ZERO
        };
        Ok(PaymentMethodPreparedData {
            payment_method_id: pm.id.clone(),
            name: pm.name.clone(),
            amount: amount + to_user_commission + vat,
            currency: pm.currency.clone(),
            to_user_commission,
            vat,
        })
    }

    /// The fee breakdown for an order priced through `pm`. Project and PSP fees are in the merchant's currency; the
    /// payment method fee, payer fee and VAT are in the payment method currency.
    async fn fees(
        &self,
        project: &Project,
        pm: &PaymentMethod,
        pricing: &PaymentMethodPricing,
    ) -> Result<OrderFees, OrderManagerError> {
        let merchant_currency = project.merchant.currency.as_str();
        Ok(OrderFees {
            project_fee: self.db.convert(&pm.currency, merchant_currency, pricing.project_fee()).await?,
            payment_method_fee: pricing.commissions.pm_commission,
            psp_fee: self.db.convert(&pm.currency, merchant_currency, pricing.commissions.psp_commission).await?,
            to_payer_fee: pricing.to_user_commission,
            vat: pricing.vat,
        })
    }
}

fn validation_error(e: OrderManagerError) -> CreatePaymentResponse {
    debug!("💳️ Payment form rejected: {e}");
    CreatePaymentResponse::validation_error(e.to_string())
}

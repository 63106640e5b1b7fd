use billing_common::Amount;
use billing_engine::{
    db_types::{Commission, CommissionOrder, Currency, ExchangeRate, Order, OrderId, PaymentMethod, Project, VatRate},
    order_objects::OrderFilter,
    revenue_objects::{RevenueDynamicFacets, RevenueDynamicRequest},
    traits::{
        CatalogError,
        CatalogManagement,
        CommissionCalculator,
        CommissionError,
        ExchangeRateError,
        ExchangeRates,
        OrderManagement,
        PaymentGatewayError,
        VatCalculator,
        VatError,
    },
};
use mockall::mock;

mock! {
    pub BillingBackend {}
    impl CatalogManagement for BillingBackend {
        async fn fetch_project(&self, project_id: &str) -> Result<Option<Project>, CatalogError>;
        async fn fetch_currency(&self, code_a3: &str) -> Result<Option<Currency>, CatalogError>;
        async fn fetch_payment_method(&self, payment_method_id: &str) -> Result<Option<PaymentMethod>, CatalogError>;
        async fn fetch_project_payment_methods(&self, project_id: &str) -> Result<Vec<PaymentMethod>, CatalogError>;
        async fn update_project(&self, project: &Project) -> Result<Project, CatalogError>;
    }
    impl OrderManagement for BillingBackend {
        async fn insert_order(&self, order: &Order) -> Result<(), PaymentGatewayError>;
        async fn update_order(&self, order: &Order) -> Result<(), PaymentGatewayError>;
        async fn fetch_order_by_id(&self, id: &OrderId) -> Result<Option<Order>, PaymentGatewayError>;
        async fn fetch_order_by_project_order_id(&self, project_id: &str, project_order_id: &str) -> Result<Option<Order>, PaymentGatewayError>;
        async fn count_orders(&self, filter: &OrderFilter) -> Result<i64, PaymentGatewayError>;
        async fn search_orders(&self, filter: &OrderFilter, limit: i64, offset: i64) -> Result<Vec<Order>, PaymentGatewayError>;
        async fn revenue_dynamic(&self, request: &RevenueDynamicRequest) -> Result<RevenueDynamicFacets, PaymentGatewayError>;
    }
    impl ExchangeRates for BillingBackend {
        async fn fetch_rate(&self, from: &str, to: &str) -> Result<ExchangeRate, ExchangeRateError>;
        async fn set_exchange_rate(&self, rate: &ExchangeRate) -> Result<(), ExchangeRateError>;
    }
    impl CommissionCalculator for BillingBackend {
        async fn calculate_commission(&self, project_id: &str, payment_method_id: &str, amount: Amount) -> Result<CommissionOrder, CommissionError>;
        async fn set_commission(&self, commission: &Commission) -> Result<(), CommissionError>;
    }
}

// None of the endpoint tests price VAT
impl VatCalculator for MockBillingBackend {
    async fn calculate_vat(&self, country: &str, subdivision: Option<&str>, _amount: Amount) -> Result<Amount, VatError> {
        let region = subdivision.map(|s| format!("{country}-{s}")).unwrap_or_else(|| country.to_string());
        Err(VatError::RateNotFound(region))
    }

    async fn set_vat_rate(&self, _rate: &VatRate) -> Result<(), VatError> {
        Ok(())
    }
}

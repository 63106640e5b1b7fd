use thiserror::Error;

use crate::{
    billing_api::{
        order_objects::OrderFilter,
        revenue_objects::{RevenueDynamicFacets, RevenueDynamicRequest},
    },
    db_types::{Order, OrderId},
};

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Cannot insert order, since it already exists with id {0}")]
    OrderAlreadyExists(OrderId),
    #[error("Project {0} already has an order with project order id {1}")]
    DuplicateProjectOrderId(String, String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Stored order data could not be read: {0}")]
    CorruptOrder(String),
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}

/// Order persistence and the read models built on top of it.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Stores a brand-new order.
    ///
    /// Fails with [`PaymentGatewayError::DuplicateProjectOrderId`] if the project already has an order with the same
    /// project order id, even if that order was inserted concurrently.
    async fn insert_order(&self, order: &Order) -> Result<(), PaymentGatewayError>;

    /// Overwrites a stored order with the given record.
    async fn update_order(&self, order: &Order) -> Result<(), PaymentGatewayError>;

    async fn fetch_order_by_id(&self, id: &OrderId) -> Result<Option<Order>, PaymentGatewayError>;

    /// Fetches the order a project submitted with its own order id.
    async fn fetch_order_by_project_order_id(
        &self,
        project_id: &str,
        project_order_id: &str,
    ) -> Result<Option<Order>, PaymentGatewayError>;

    /// The number of orders matching the filter.
    async fn count_orders(&self, filter: &OrderFilter) -> Result<i64, PaymentGatewayError>;

    /// A page of orders matching the filter, newest first.
    async fn search_orders(
        &self,
        filter: &OrderFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, PaymentGatewayError>;

    /// Revenue and refund totals bucketed by the requested period.
    async fn revenue_dynamic(
        &self,
        request: &RevenueDynamicRequest,
    ) -> Result<RevenueDynamicFacets, PaymentGatewayError>;
}

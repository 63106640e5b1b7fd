use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatus};

/// A new order has been priced and stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

impl OrderCreatedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// A payment system notification has been applied to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNotifiedEvent {
    pub order: Order,
    pub status: OrderStatus,
    /// The handler's reason for rejecting the payment, if it did
    pub rejection: Option<String>,
}

impl OrderNotifiedEvent {
    pub fn new(order: Order, rejection: Option<String>) -> Self {
        let status = order.status;
        Self { order, status, rejection }
    }

    pub fn is_rejected(&self) -> bool {
        self.rejection.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderCreated(OrderCreatedEvent),
    OrderNotified(OrderNotifiedEvent),
}

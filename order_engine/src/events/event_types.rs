use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, OrderState},
    state_machine::OrderTrigger,
};

/// Published after every committed state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTransitionEvent {
    pub old_order: Order,
    pub new_order: Order,
    pub trigger: OrderTrigger,
}

impl OrderTransitionEvent {
    pub fn new(old_order: Order, new_order: Order, trigger: OrderTrigger) -> Self {
        Self { old_order, new_order, trigger }
    }

    pub fn old_state(&self) -> OrderState {
        self.old_order.state()
    }

    pub fn new_state(&self) -> OrderState {
        self.new_order.state()
    }
}

/// Published once, when an order's payment status becomes `paid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
}

impl OrderPaidEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Published once, when an order is cancelled for any reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub trigger: OrderTrigger,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order, trigger: OrderTrigger) -> Self {
        Self { order, trigger }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderPaid(OrderPaidEvent),
    OrderAnnulled(OrderAnnulledEvent),
    OrderTransition(OrderTransitionEvent),
}

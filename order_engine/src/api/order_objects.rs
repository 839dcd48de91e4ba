use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, PaymentStatusType},
    state_machine::TransitionConflict,
};

/// What happened when a trigger was applied to an order.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// The transition was committed
    Applied { old_order: Order, new_order: Order },
    /// The order already was in the state the trigger leads to. Nothing was written.
    Unchanged(Order),
    /// The trigger does not apply to the order in its current state. Nothing was written. Duplicate and out-of-order
    /// deliveries end up here, so this is not an error.
    Conflict { order: Order, conflict: TransitionConflict },
}

impl TransitionOutcome {
    /// The order as it is stored after the call.
    pub fn order(&self) -> &Order {
        match self {
            Self::Applied { new_order, .. } => new_order,
            Self::Unchanged(order) => order,
            Self::Conflict { order, .. } => order,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// True only for the single transition that moved the order into `paid`.
    pub fn newly_paid(&self) -> bool {
        match self {
            Self::Applied { old_order, new_order } => {
                old_order.payment_status != PaymentStatusType::Paid && new_order.payment_status == PaymentStatusType::Paid
            },
            _ => false,
        }
    }
}

/// The result of a run of the payment expiry sweeper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepResult {
    pub expired_count: usize,
    pub expired_order_numbers: Vec<String>,
    /// Orders that were picked up but changed state before they could be expired (e.g. paid in the meantime)
    pub skipped_count: usize,
    /// Orders that could not be processed because of a backend error
    pub failed_count: usize,
}

impl SweepResult {
    pub fn record_expired(&mut self, order: &Order) {
        self.expired_count += 1;
        self.expired_order_numbers.push(order.order_number.clone());
    }
}

//! The order state machine
//!
//! Every write to an order's lifecycle fields goes through [`transition`]. It is a pure function: given the order as it
//! was read from the database and a trigger, it either returns the complete set of new field values ([`OrderUpdate`]),
//! reports that the order already is in the requested state ([`Transition::Unchanged`]), or returns a
//! [`TransitionConflict`] describing why the trigger does not apply.
//!
//! The database layer persists an [`OrderUpdate`] with a compare-and-swap on the state the update was computed from
//! (see [`OrderUpdate::expected`]), so the side effects (`paid_at`, `cancelled_at` and friends) land in the same
//! atomic write as the status change.
use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Order, OrderState, OrderStatusType, PaymentStatusType};

pub const EXPIRED_PAYMENT_REASON: &str = "Batas waktu pembayaran telah habis";

//--------------------------------------       OrderTrigger      -------------------------------------------------------
/// Everything that is allowed to move an order from one state to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum OrderTrigger {
    /// The gateway reported `capture` or `settlement`
    GatewaySettled { payment_method: Option<String> },
    /// The gateway reported `pending`
    GatewayPending { payment_method: Option<String> },
    /// The gateway reported `deny` or `cancel`
    GatewayFailed,
    /// The gateway reported `expire`
    GatewayExpired,
    /// The expiry sweeper found the order past its payment deadline
    DeadlinePassed,
    RequestCancellation { reason: String },
    DenyCancellation,
    ApproveCancellation { reason: Option<String> },
    MarkShipped,
    MarkCompleted,
}

impl OrderTrigger {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GatewaySettled { .. } => "gateway_settled",
            Self::GatewayPending { .. } => "gateway_pending",
            Self::GatewayFailed => "gateway_failed",
            Self::GatewayExpired => "gateway_expired",
            Self::DeadlinePassed => "deadline_passed",
            Self::RequestCancellation { .. } => "request_cancellation",
            Self::DenyCancellation => "deny_cancellation",
            Self::ApproveCancellation { .. } => "approve_cancellation",
            Self::MarkShipped => "mark_shipped",
            Self::MarkCompleted => "mark_completed",
        }
    }
}

impl Display for OrderTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

//--------------------------------------       OrderUpdate       -------------------------------------------------------
/// The full set of mutable order fields after a transition, plus the state that the transition was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderUpdate {
    pub expected: OrderState,
    pub expected_cancellation_requested: bool,
    pub status: OrderStatusType,
    pub payment_status: PaymentStatusType,
    pub payment_method: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub cancellation_requested: bool,
    pub cancellation_request_reason: Option<String>,
    pub cancellation_requested_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl OrderUpdate {
    fn from_order(order: &Order, now: DateTime<Utc>) -> Self {
        Self {
            expected: order.state(),
            expected_cancellation_requested: order.cancellation_requested,
            status: order.status,
            payment_status: order.payment_status,
            payment_method: order.payment_method.clone(),
            paid_at: order.paid_at,
            shipped_at: order.shipped_at,
            completed_at: order.completed_at,
            cancelled_at: order.cancelled_at,
            cancellation_reason: order.cancellation_reason.clone(),
            cancellation_requested: order.cancellation_requested,
            cancellation_request_reason: order.cancellation_request_reason.clone(),
            cancellation_requested_at: order.cancellation_requested_at,
            updated_at: now,
        }
    }

    pub fn new_state(&self) -> OrderState {
        OrderState::new(self.status, self.payment_status)
    }

    fn cancel(mut self, payment_status: PaymentStatusType, reason: Option<String>, now: DateTime<Utc>) -> Self {
        self.status = OrderStatusType::Cancelled;
        self.payment_status = payment_status;
        self.cancelled_at = Some(now);
        self.cancellation_reason = reason;
        self.cancellation_requested = false;
        self
    }
}

//--------------------------------------        Transition       -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Apply(OrderUpdate),
    /// The trigger is legal but the order is already in the resulting state
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot apply {trigger} to order in state {state}: {reason}")]
pub struct TransitionConflict {
    pub state: OrderState,
    pub trigger: &'static str,
    pub reason: ConflictReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// The order is completed or cancelled
    TerminalState,
    /// The order's status does not satisfy the trigger's precondition
    InvalidStatus,
    /// The payment status does not satisfy the trigger's precondition
    InvalidPaymentStatus,
    NoCancellationRequested,
    CancellationAlreadyRequested,
    /// Other writers kept changing the order while this trigger was being applied
    ConcurrentModification,
}

impl Display for ConflictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::TerminalState => "the order is in a terminal state",
            Self::InvalidStatus => "the order status does not permit this transition",
            Self::InvalidPaymentStatus => "the payment status does not permit this transition",
            Self::NoCancellationRequested => "no cancellation has been requested",
            Self::CancellationAlreadyRequested => "a cancellation has already been requested",
            Self::ConcurrentModification => "the order was modified concurrently",
        };
        f.write_str(s)
    }
}

/// Evaluates `trigger` against the current state of `order`.
pub fn transition(order: &Order, trigger: &OrderTrigger, now: DateTime<Utc>) -> Result<Transition, TransitionConflict> {
    use OrderStatusType::*;
    use PaymentStatusType as Pay;

    let conflict = |reason| TransitionConflict { state: order.state(), trigger: trigger.name(), reason };
    if order.status.is_terminal() {
        return Err(conflict(ConflictReason::TerminalState));
    }
    let update = OrderUpdate::from_order(order, now);
    let awaiting_payment = order.status == AwaitingPayment;
    let update = match trigger {
        OrderTrigger::GatewaySettled { payment_method } if awaiting_payment => {
            let mut update = update;
            update.status = Processing;
            update.payment_status = Pay::Paid;
            update.paid_at = Some(now);
            if payment_method.is_some() {
                update.payment_method = payment_method.clone();
            }
            update
        },
        OrderTrigger::GatewayPending { payment_method } if awaiting_payment => {
            let method_changed = payment_method.is_some() && payment_method != &order.payment_method;
            if order.payment_status == Pay::Pending && !method_changed {
                return Ok(Transition::Unchanged);
            }
            let mut update = update;
            update.payment_status = Pay::Pending;
            if method_changed {
                update.payment_method = payment_method.clone();
            }
            update
        },
        OrderTrigger::GatewayFailed if awaiting_payment => update.cancel(Pay::Failed, None, now),
        OrderTrigger::GatewayExpired if awaiting_payment => {
            update.cancel(Pay::Expired, Some(EXPIRED_PAYMENT_REASON.to_string()), now)
        },
        OrderTrigger::DeadlinePassed if awaiting_payment => {
            if order.payment_status != Pay::Pending {
                return Err(conflict(ConflictReason::InvalidPaymentStatus));
            }
            update.cancel(Pay::Expired, Some(EXPIRED_PAYMENT_REASON.to_string()), now)
        },
        OrderTrigger::RequestCancellation { reason } if matches!(order.status, AwaitingPayment | Processing) => {
            if order.cancellation_requested {
                return Err(conflict(ConflictReason::CancellationAlreadyRequested));
            }
            let mut update = update;
            update.cancellation_requested = true;
            update.cancellation_request_reason = Some(reason.clone());
            update.cancellation_requested_at = Some(now);
            update
        },
        OrderTrigger::DenyCancellation => {
            if !order.cancellation_requested {
                return Err(conflict(ConflictReason::NoCancellationRequested));
            }
            let mut update = update;
            update.cancellation_requested = false;
            update
        },
        OrderTrigger::ApproveCancellation { reason } if matches!(order.status, AwaitingPayment | Processing) => {
            let reason = reason.clone().or_else(|| order.cancellation_request_reason.clone());
            // Payment status is kept. Refunds of paid orders happen outside this system.
            let payment_status = order.payment_status;
            update.cancel(payment_status, reason, now)
        },
        OrderTrigger::MarkShipped if order.status == Processing => {
            if order.payment_status != Pay::Paid {
                return Err(conflict(ConflictReason::InvalidPaymentStatus));
            }
            let mut update = update;
            update.status = Shipped;
            update.shipped_at = Some(now);
            update
        },
        OrderTrigger::MarkCompleted if order.status == Shipped => {
            if order.payment_status != Pay::Paid {
                return Err(conflict(ConflictReason::InvalidPaymentStatus));
            }
            let mut update = update;
            update.status = Completed;
            update.completed_at = Some(now);
            update
        },
        _ => return Err(conflict(ConflictReason::InvalidStatus)),
    };
    Ok(Transition::Apply(update))
}

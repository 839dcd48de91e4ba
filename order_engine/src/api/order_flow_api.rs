use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    api::order_objects::{SweepResult, TransitionOutcome},
    db_types::{NewOrder, NewOrderItem, Order, OrderId, OrderItem, OrderStatusType, PaymentStatusType},
    events::{EventProducers, OrderAnnulledEvent, OrderPaidEvent, OrderTransitionEvent},
    state_machine::{transition, ConflictReason, OrderTrigger, Transition, TransitionConflict},
    traits::{OrderFlowError, OrderManagement},
};

/// How often a trigger is re-evaluated after losing a compare-and-swap race before giving up.
const MAX_CAS_ATTEMPTS: usize = 3;

/// `OrderFlowApi` is the only component that changes the lifecycle of an order. Gateway notifications, admin actions,
/// customer cancellation requests and the expiry sweeper all end up in [`OrderFlowApi::apply_trigger`].
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: OrderManagement
{
    /// Stores a brand-new order along with its item snapshots. The order starts out awaiting payment.
    pub async fn process_new_order(&self, order: NewOrder, items: Vec<NewOrderItem>) -> Result<Order, OrderFlowError> {
        let item_count = items.len();
        let order = self.db.insert_order(order, items).await?;
        info!(
            "🔄️📦️ Order [{}] for {} created with {item_count} items. Total {}",
            order.order_number, order.customer_id, order.total_amount
        );
        Ok(order)
    }

    pub async fn fetch_order(&self, id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        self.db.fetch_order_by_id(id).await
    }

    pub async fn fetch_order_by_order_number(&self, order_number: &str) -> Result<Option<Order>, OrderFlowError> {
        self.db.fetch_order_by_order_number(order_number).await
    }

    pub async fn fetch_order_items(&self, id: &OrderId) -> Result<Vec<OrderItem>, OrderFlowError> {
        self.db.fetch_order_items(id).await
    }

    /// Applies `trigger` to the order using the current time.
    pub async fn apply_trigger(&self, id: &OrderId, trigger: OrderTrigger) -> Result<TransitionOutcome, OrderFlowError> {
        self.apply_trigger_at(id, trigger, Utc::now()).await
    }

    /// Reads the order, evaluates the trigger with the state machine and writes the result with a compare-and-swap.
    ///
    /// If another writer changed the order between the read and the write, the order is re-read and the trigger
    /// re-evaluated against the fresh state, at most [`MAX_CAS_ATTEMPTS`] times. Usually the second evaluation already
    /// reports a benign conflict (e.g. a sweeper losing to a payment), which is returned as
    /// [`TransitionOutcome::Conflict`].
    ///
    /// Event subscribers are notified only after the write has been committed.
    pub async fn apply_trigger_at(
        &self,
        id: &OrderId,
        trigger: OrderTrigger,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, OrderFlowError> {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let order = self.fetch_existing_order(id).await?;
            let update = match transition(&order, &trigger, now) {
                Ok(Transition::Apply(update)) => update,
                Ok(Transition::Unchanged) => {
                    debug!("🔄️ Order {id} is already {}. {trigger} is a no-op", order.state());
                    return Ok(TransitionOutcome::Unchanged(order));
                },
                Err(conflict) => {
                    info!("🔄️ Ignoring {trigger} for order {id}. {conflict}");
                    return Ok(TransitionOutcome::Conflict { order, conflict });
                },
            };
            match self.db.update_order_state(id, &update).await? {
                Some(new_order) => {
                    info!("🔄️ Order {id} moved from {} to {} by {trigger}", order.state(), new_order.state());
                    self.publish_events(&order, &new_order, &trigger).await;
                    return Ok(TransitionOutcome::Applied { old_order: order, new_order });
                },
                None => {
                    debug!("🔄️ Order {id} changed while applying {trigger} (attempt {attempt}/{MAX_CAS_ATTEMPTS})");
                },
            }
        }
        let order = self.fetch_existing_order(id).await?;
        warn!("🔄️ Gave up applying {trigger} to order {id} after {MAX_CAS_ATTEMPTS} attempts");
        let conflict = TransitionConflict {
            state: order.state(),
            trigger: trigger.name(),
            reason: ConflictReason::ConcurrentModification,
        };
        Ok(TransitionOutcome::Conflict { order, conflict })
    }

    async fn fetch_existing_order(&self, id: &OrderId) -> Result<Order, OrderFlowError> {
        self.db.fetch_order_by_id(id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(id.clone()))
    }

    async fn publish_events(&self, old_order: &Order, new_order: &Order, trigger: &OrderTrigger) {
        for emitter in &self.producers.order_transition_producer {
            trace!("🔄️📬️ Notifying order transition hook subscribers");
            let event = OrderTransitionEvent::new(old_order.clone(), new_order.clone(), trigger.clone());
            emitter.publish_event(event).await;
        }
        let became_paid =
            old_order.payment_status != PaymentStatusType::Paid && new_order.payment_status == PaymentStatusType::Paid;
        if became_paid {
            for emitter in &self.producers.order_paid_producer {
                debug!("🔄️📬️ Notifying order paid hook subscribers for order {}", new_order.id);
                emitter.publish_event(OrderPaidEvent::new(new_order.clone())).await;
            }
        }
        let became_cancelled =
            old_order.status != OrderStatusType::Cancelled && new_order.status == OrderStatusType::Cancelled;
        if became_cancelled {
            for emitter in &self.producers.order_annulled_producer {
                debug!("🔄️📬️ Notifying order annulled hook subscribers for order {}", new_order.id);
                emitter.publish_event(OrderAnnulledEvent::new(new_order.clone(), trigger.clone())).await;
            }
        }
    }

    /// Records a customer's request to cancel the order. The order itself stays as it is until an admin decides.
    pub async fn request_cancellation(&self, id: &OrderId, reason: &str) -> Result<TransitionOutcome, OrderFlowError> {
        self.apply_trigger(id, OrderTrigger::RequestCancellation { reason: reason.to_string() }).await
    }

    /// Rejects a pending cancellation request. The order carries on as before.
    pub async fn deny_cancellation(&self, id: &OrderId) -> Result<TransitionOutcome, OrderFlowError> {
        self.apply_trigger(id, OrderTrigger::DenyCancellation).await
    }

    /// Cancels an order that is awaiting payment or being processed. The payment status is left untouched, so a paid
    /// order stays `paid` and must be refunded through other channels.
    pub async fn approve_cancellation(
        &self,
        id: &OrderId,
        reason: Option<String>,
    ) -> Result<TransitionOutcome, OrderFlowError> {
        self.apply_trigger(id, OrderTrigger::ApproveCancellation { reason }).await
    }

    pub async fn mark_shipped(&self, id: &OrderId) -> Result<TransitionOutcome, OrderFlowError> {
        self.apply_trigger(id, OrderTrigger::MarkShipped).await
    }

    pub async fn mark_completed(&self, id: &OrderId) -> Result<TransitionOutcome, OrderFlowError> {
        self.apply_trigger(id, OrderTrigger::MarkCompleted).await
    }

    /// Cancels every unpaid order whose payment deadline has passed.
    pub async fn sweep_expired_orders(&self) -> Result<SweepResult, OrderFlowError> {
        self.sweep_expired_orders_at(Utc::now()).await
    }

    /// Runs the expiry sweep as if the current time were `now`.
    ///
    /// Failures on individual orders are logged and counted, and never abort the sweep. Only a failure to fetch the
    /// candidate list is returned as an error. Concurrent sweeps and webhook deliveries are safe: each order is expired
    /// through [`Self::apply_trigger_at`], so at most one writer wins and the others see a conflict.
    pub async fn sweep_expired_orders_at(&self, now: DateTime<Utc>) -> Result<SweepResult, OrderFlowError> {
        let candidates = self.db.fetch_expired_unpaid_orders(now).await?;
        trace!("🕰️ {} orders are past their payment deadline", candidates.len());
        let mut result = SweepResult::default();
        for order in candidates {
            match self.apply_trigger_at(&order.id, OrderTrigger::DeadlinePassed, now).await {
                Ok(TransitionOutcome::Applied { new_order, .. }) => {
                    debug!("🕰️ Order {} expired", new_order.order_number);
                    result.record_expired(&new_order);
                },
                Ok(outcome) => {
                    debug!("🕰️ Order {} was not expired. It is now {}", order.order_number, outcome.order().state());
                    result.skipped_count += 1;
                },
                Err(e) => {
                    error!("🕰️ Could not expire order {}: {e}", order.order_number);
                    result.failed_count += 1;
                },
            }
        }
        if result.expired_count > 0 || result.failed_count > 0 {
            info!(
                "🕰️ Sweep complete. {} expired, {} skipped, {} failed",
                result.expired_count, result.skipped_count, result.failed_count
            );
        }
        Ok(result)
    }
}

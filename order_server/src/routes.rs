//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use order_engine::{
    db_types::OrderId,
    traits::{OrderManagement, VoucherManagement},
    OrderFlowApi,
    PaymentNotification,
    PaymentWebhookApi,
    TransitionOutcome,
    VoucherApi,
    WebhookError,
    WebhookOutcome,
};

use crate::{
    config::ServerOptions,
    data_objects::{
        ApplyVoucherRequest,
        ApproveCancellationParams,
        CancellationRequestParams,
        JsonResponse,
        OrderDetails,
        SweepResponse,
    },
    errors::ServerError,
    helpers::remote_ip_key,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Gateway  ----------------------------------------------------
route!(gateway_notification => Post "/notification" impl OrderManagement);
/// Route handler for payment notifications from the payment gateway.
///
/// The gateway retries a notification until it receives a 2xx response, so every notification that was handled, or
/// that needs no handling (duplicates, late deliveries for finished orders, connectivity tests), is acknowledged with
/// `200 {"success": true}`. Forged notifications get a 401 and unknown orders a 404. If processing takes longer than the
/// configured webhook timeout, the gateway gets a 500 and will deliver the notification again.
///
/// This route is mounted under `/gateway` and rate-limited per source address.
pub async fn gateway_notification<B: OrderManagement>(
    req: HttpRequest,
    body: web::Json<PaymentNotification>,
    api: web::Data<PaymentWebhookApi<B>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    let notification = body.into_inner();
    let order_id = notification.order_id.clone();
    trace!("💻️ Received payment notification for order {order_id}");
    let deadline = options.webhook_timeout;
    let outcome = tokio::time::timeout(deadline, api.process_notification(notification))
        .await
        .map_err(|_| {
            error!("💻️ Payment notification for order {order_id} was not processed within {}ms", deadline.as_millis());
            ServerError::BackendError(format!("Processing the notification for order {order_id} timed out"))
        })?
        .map_err(|e| {
            if matches!(e, WebhookError::AuthenticationError) {
                let source = remote_ip_key(&req, **options);
                warn!("💻️ Payment notification for order {order_id} from {source} failed signature verification");
            }
            ServerError::from(e)
        })?;
    let message = match outcome {
        WebhookOutcome::TestNotification => "Test notification acknowledged".to_string(),
        WebhookOutcome::Processed { status, outcome: TransitionOutcome::Conflict { conflict, .. } } => {
            format!("Notification ({status}) required no changes. {conflict}")
        },
        WebhookOutcome::Processed { status, outcome } => {
            format!("Notification ({status}) processed. Order is {}", outcome.order().state())
        },
    };
    debug!("💻️ {message}");
    Ok(HttpResponse::Ok().json(JsonResponse::success(message)))
}

//----------------------------------------------   Vouchers  ----------------------------------------------------
route!(apply_voucher => Post "/vouchers/apply" impl VoucherManagement);
/// Checks a voucher code against a cart subtotal.
///
/// Returns the voucher together with the discount and the amount payable, or a 400 response with the rejection
/// `code` and a message that can be shown to the customer.
pub async fn apply_voucher<B: VoucherManagement>(
    body: web::Json<ApplyVoucherRequest>,
    api: web::Data<VoucherApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let ApplyVoucherRequest { code, subtotal, customer_id } = body.into_inner();
    debug!("💻️ POST apply voucher {code} to {subtotal}");
    let quote = api.evaluate(&code, subtotal, customer_id.as_deref()).await?;
    Ok(HttpResponse::Ok().json(quote))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(request_cancellation => Post "/orders/{id}/request_cancellation" impl OrderManagement);
/// A customer asks for their order to be cancelled. The order is not cancelled until an admin approves the request.
pub async fn request_cancellation<B: OrderManagement>(
    path: web::Path<OrderId>,
    body: web::Json<CancellationRequestParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let CancellationRequestParams { customer_id, reason } = body.into_inner();
    debug!("💻️ POST cancellation request for order {id} from {customer_id}");
    if reason.trim().is_empty() {
        return Err(ServerError::InvalidRequestBody("A reason for the cancellation is required".to_string()));
    }
    // Orders belonging to someone else are reported as missing
    let owned = api.fetch_order(&id).await?.filter(|o| o.customer_id == customer_id);
    if owned.is_none() {
        return Err(ServerError::NoRecordFound(format!("Order {id} not found")));
    }
    let outcome = api.request_cancellation(&id, reason.trim()).await?;
    transition_response(outcome)
}

route!(order_by_id => Get "/orders/{id}" impl OrderManagement);
pub async fn order_by_id<B: OrderManagement>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ GET order {id}");
    let order = api.fetch_order(&id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("Order {id} not found")))?;
    let items = api.fetch_order_items(&id).await?;
    Ok(HttpResponse::Ok().json(OrderDetails { order, items }))
}

route!(approve_cancellation => Post "/orders/{id}/approve_cancellation" impl OrderManagement);
/// Cancels an order that is awaiting payment or being processed. The request body is optional. A `reason` in the body
/// replaces the reason the customer gave.
pub async fn approve_cancellation<B: OrderManagement>(
    path: web::Path<OrderId>,
    body: Option<web::Json<ApproveCancellationParams>>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let reason = body.and_then(|b| b.into_inner().reason).filter(|r| !r.trim().is_empty());
    info!("💻️ POST approve cancellation of order {id}");
    let outcome = api.approve_cancellation(&id, reason).await?;
    transition_response(outcome)
}

route!(deny_cancellation => Post "/orders/{id}/deny_cancellation" impl OrderManagement);
pub async fn deny_cancellation<B: OrderManagement>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    info!("💻️ POST deny cancellation of order {id}");
    let outcome = api.deny_cancellation(&id).await?;
    transition_response(outcome)
}

route!(ship_order => Post "/orders/{id}/ship" impl OrderManagement);
pub async fn ship_order<B: OrderManagement>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    info!("💻️ POST ship order {id}");
    let outcome = api.mark_shipped(&id).await?;
    transition_response(outcome)
}

route!(complete_order => Post "/orders/{id}/complete" impl OrderManagement);
pub async fn complete_order<B: OrderManagement>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    info!("💻️ POST complete order {id}");
    let outcome = api.mark_completed(&id).await?;
    transition_response(outcome)
}

/// Admin actions that do not apply to the order in its current state are reported as a 409 conflict.
fn transition_response(outcome: TransitionOutcome) -> Result<HttpResponse, ServerError> {
    match outcome {
        TransitionOutcome::Conflict { conflict, .. } => Err(ServerError::Conflict(conflict.to_string())),
        outcome => Ok(HttpResponse::Ok().json(outcome.order())),
    }
}

//----------------------------------------------   Sweeper  ----------------------------------------------------
route!(sweep => Post "/sweep" impl OrderManagement);
/// Expires every unpaid order whose payment deadline has passed. Intended to be called by an external scheduler. The
/// in-process expiry worker runs the same sweep.
pub async fn sweep<B: OrderManagement>(api: web::Data<OrderFlowApi<B>>) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST sweep");
    let result = api.sweep_expired_orders().await?;
    if result.failed_count > 0 {
        warn!("💻️ {} orders could not be expired in this sweep", result.failed_count);
    }
    Ok(HttpResponse::Ok().json(SweepResponse::from(result)))
}

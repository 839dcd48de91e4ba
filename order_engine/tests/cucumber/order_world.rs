use cucumber::World;
use log::*;
use order_engine::{
    events::EventProducers,
    OrderFlowApi,
    PaymentWebhookApi,
    SqliteDatabase,
    SweepResult,
    TransitionOutcome,
    VoucherApi,
    VoucherApiError,
    VoucherQuote,
    WebhookConfig,
    WebhookError,
};
use shop_common::Secret;

use crate::support::prepare_env::{prepare_test_env, random_db_path};

pub const SERVER_KEY: &str = "cucumber-server-key";

#[derive(Default, Debug, World)]
pub struct OrderWorld {
    pub system: Option<StorefrontSystem>,
    pub last_outcome: Option<TransitionOutcome>,
    pub last_webhook_error: Option<WebhookError>,
    pub last_sweep: Option<SweepResult>,
    pub last_quote: Option<Result<VoucherQuote, VoucherApiError>>,
}

#[derive(Debug)]
pub struct StorefrontSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub webhook: PaymentWebhookApi<SqliteDatabase>,
    pub vouchers: VoucherApi<SqliteDatabase>,
}

impl OrderWorld {
    pub fn system(&self) -> &StorefrontSystem {
        self.system.as_ref().expect("Storefront not initialised. Did you forget 'Given a fresh install'?")
    }

    pub fn flow(&self) -> &OrderFlowApi<SqliteDatabase> {
        self.system().webhook.flow()
    }

    pub fn webhook(&self) -> &PaymentWebhookApi<SqliteDatabase> {
        &self.system().webhook
    }

    pub fn vouchers(&self) -> &VoucherApi<SqliteDatabase> {
        &self.system().vouchers
    }
}

impl StorefrontSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let flow = OrderFlowApi::new(db.clone(), EventProducers::default());
        let webhook = PaymentWebhookApi::new(flow, WebhookConfig::new(Secret::new(SERVER_KEY.to_string())));
        let vouchers = VoucherApi::new(db.clone());
        Self { db_path: url, db, webhook, vouchers }
    }
}

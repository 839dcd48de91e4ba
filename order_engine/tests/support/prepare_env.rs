#![allow(dead_code)]
use std::path::Path;

use chrono::{Duration, Utc};
use log::*;
use order_engine::{
    db_types::{NewOrder, NewOrderItem, Order, OrderId},
    OrderManagement,
    SqliteDatabase,
};
use shop_common::Rupiah;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    run_migrations(url).await;
}

pub fn random_db_path() -> String {
    format!("sqlite://../data/test_storefront_{}.db", rand::random::<u64>())
}

pub async fn run_migrations(url: &str) {
    let db = SqliteDatabase::new_with_url(url, 1).await.expect("Error creating connection to database");
    db.run_migrations().await.expect("Error running DB migrations");
    db.pool().close().await;
    info!("🚀️ Migrations complete");
}

pub async fn create_database<P: AsRef<Path>>(path: P) {
    let p = path.as_ref().as_os_str().to_str().unwrap();
    if let Err(e) = Sqlite::drop_database(p).await {
        warn!("Error dropping database {p}: {e:?}");
    }
    Sqlite::create_database(p).await.expect("Error creating database");
    info!("🚀️ Created Sqlite database {p}");
}

/// A freshly migrated database with a random name.
pub async fn new_test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 10).await.expect("Error creating connection to database")
}

pub async fn tear_down(db: SqliteDatabase) {
    let url = db.url().to_string();
    db.pool().close().await;
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Could not remove test database {url}: {e}");
    }
}

/// Inserts an unpaid order for 200,000 + 15,000 shipping, with a payment deadline `deadline_mins` minutes from now.
pub async fn unpaid_order(db: &SqliteDatabase, id: &str, deadline_mins: i64) -> Order {
    let number = format!("INV-{id}");
    let order = NewOrder::new(OrderId::from(id), &number, "alice", Rupiah::from(200_000), Rupiah::from(15_000))
        .with_payment_deadline(Utc::now() + Duration::minutes(deadline_mins));
    let items = vec![
        NewOrderItem::new("sku-1", "Batik shirt", Rupiah::from(150_000), 1),
        NewOrderItem::new("sku-2", "Socks", Rupiah::from(25_000), 2),
    ];
    db.insert_order(order, items).await.expect("Error inserting order")
}

/// Inserts an unpaid order like [`unpaid_order`], placed by `customer` with voucher `code` applied at checkout.
pub async fn voucher_order(db: &SqliteDatabase, id: &str, customer: &str, code: &str) -> Order {
    let number = format!("INV-{id}");
    let order = NewOrder::new(OrderId::from(id), &number, customer, Rupiah::from(200_000), Rupiah::from(15_000))
        .with_payment_deadline(Utc::now() + Duration::minutes(60))
        .with_voucher(code, Rupiah::zero());
    let items = vec![NewOrderItem::new("sku-1", "Batik shirt", Rupiah::from(200_000), 1)];
    db.insert_order(order, items).await.expect("Error inserting order")
}

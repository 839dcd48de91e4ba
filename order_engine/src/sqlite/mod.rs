//! SQLite backend for the order engine.
//!
//! Migrations live in `src/sqlite/migrations` and are embedded with `sqlx::migrate!`.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;

//! SQLite backend for the wallet engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;

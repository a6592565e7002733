//! Persistence layer: one module per entity family, all sharing the same
//! `SqlitePool`-wrapping, `sqlx::query(...).bind(...)` idiom.

pub mod digest_store;
pub mod event_store;
pub mod item_store;
pub mod profile_store;
pub mod schedule_store;
pub mod thread_store;

//! wa-panel is a WhatsApp dashboard backend over libSQL, Turso or PostgreSQL.

pub mod api;
pub mod config;
pub mod error;
pub mod live;
pub mod store;

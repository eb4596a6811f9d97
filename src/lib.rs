// src/lib.rs
// Library surface so integration tests can drive the full router.

pub mod aggregate;
pub mod api;
pub mod config;
pub mod error;
pub mod export;
pub mod label;
pub mod metrics;
pub mod model;
pub mod parse;
pub mod pipeline;
pub mod store;
pub mod vision;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::error::ExtractError;
pub use crate::model::{Article, BrandGroup, Card, DailyRecord};

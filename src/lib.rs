//! farmnet - Sustainable Farming Network API
//!
//! REST backend for farmers: accounts, a keyword-matched advisory assistant,
//! a catalog of sustainable practices, badge/XP progression, a formula-based
//! "digital twin" crop estimator and SMS/WhatsApp messaging.
//!
//! ## Services
//!
//! - **Auth**: JWT bearer tokens, argon2 password hashes
//! - **Advisory**: text and image queries answered by canned responders
//! - **Practices**: catalog with filtering, adoption, ratings and ownership
//! - **Gamification**: XP, levels and at-most-once milestone badges
//! - **Digital twin**: yield/revenue/sustainability estimates
//! - **Communication**: Twilio dispatch, or demo mode without credentials
//! - **Localization**: language catalog, location-based detection

pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod routes;
pub mod server;
pub mod services;
pub mod store;
pub mod types;
pub mod validation;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{FarmError, Result};

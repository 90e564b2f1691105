//! # Spotter
//!
//! A gym session booking server, usable both as a standalone binary and as a library.
//!
//! Lifters book one-hour training slots against a weekly quota. Each slot's
//! capacity is split between experienced and inexperienced lifters, and the
//! [`engine::Engine`] keeps bookings, capacity and quota usage consistent
//! under concurrent requests.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! spotter = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mockable::DefaultClock;
//! use spotter::engine::Engine;
//! use spotter::server::{AppState, create_router};
//! use spotter::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new("./data/spotter.db").unwrap();
//! store.initialize().unwrap();
//!
//! let engine = Arc::new(Engine::new(Arc::new(store), Arc::new(DefaultClock)));
//! engine.seed_default_policies().unwrap();
//!
//! let router = create_router(Arc::new(AppState::new(engine)));
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `spotter` binary. Disable with `default-features = false`.

pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod server;
pub mod store;
pub mod types;

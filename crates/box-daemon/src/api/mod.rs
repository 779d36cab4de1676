//! API layer for box-daemon

pub mod rest;

pub use rest::{create_router, AppState};

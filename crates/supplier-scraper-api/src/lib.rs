//! Supplier scraper front end: REST endpoints and payload-file loading for the CLI.

pub mod payload;
pub mod rest;

pub use rest::{router, AppState};

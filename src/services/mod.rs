// src/services/mod.rs

//! External-facing services.

pub mod fetch;

pub use fetch::ContentFetcher;

// src/lib.rs

//! featwatch library

pub mod error;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod resolver;
pub mod services;
pub mod store;
pub mod taxonomy;
pub mod utils;

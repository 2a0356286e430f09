//! settlement-service: per-transaction settlement calculation for the
//! retail-dealer network, plus the asynchronous batch-job pipeline.
pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
pub mod workers;

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod normalize;
pub mod payload;
pub mod service;
pub mod store;
pub mod vendor;

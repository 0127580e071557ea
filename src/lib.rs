pub mod classifier;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod labels;
pub mod models;

//! HTTP API Server Module
//!
//! Polling API used by the web client to search, select and download
//! novels, plus health, status and metrics endpoints.

pub mod auth;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod types;

pub use routes::create_router;
pub use server::HttpServer;

//! HTTP API: routing, request context, error mapping and the supervised server.

pub mod app;
pub mod cli;
pub mod middleware;
pub mod server;

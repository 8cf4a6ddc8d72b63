//! HTTP API: configuration, the protection pipeline, routes and the server.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
pub mod server;
pub mod watch;

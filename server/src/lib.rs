pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;
pub mod ws;

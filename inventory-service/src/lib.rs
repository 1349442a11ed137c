pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod rate_limit;
pub mod reservation;
pub mod schema;
pub mod service;
pub mod store;
pub mod sweeper;
pub mod validation;

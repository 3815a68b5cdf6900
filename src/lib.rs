pub mod api;
pub mod config;
pub mod engine;
pub mod models;
pub mod repositories;
pub mod services;

//! Prediction form server: HTML form, JSON API, health checks and metrics

pub mod api;
pub mod config;
pub mod form;

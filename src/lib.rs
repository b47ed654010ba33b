pub mod clock;
pub mod configuration;
pub mod controller;
pub mod error_handling;
pub mod lapi;
pub mod metrics;
pub mod models;
pub mod normalization;
pub mod session_management;
pub mod storage;
pub mod web_interface;

pub use controller::Controller;

pub mod api;
pub mod config;
pub mod engine;
pub mod metrics_server;
pub mod observability;
pub mod service;
pub mod stores;

pub use engine::ReportEngine;
pub use service::EnergyService;

pub mod api;
pub mod data_collector;
pub mod database;
pub mod error;
pub mod models;
pub mod schema_report;
pub mod utils;

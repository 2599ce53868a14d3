pub mod api;
pub mod core;
pub mod db;
pub mod error;
pub mod messages;
pub mod models;
pub mod services;
pub mod state;
pub mod transport;
pub mod validators;

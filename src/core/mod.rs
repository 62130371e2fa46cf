pub mod config;
pub mod error;
pub mod provider;
pub mod record;
pub mod store;

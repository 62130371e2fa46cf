mod database;
mod log_repo;


pub use database::Database;
pub use log_repo::LogRepo;

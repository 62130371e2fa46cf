pub mod chat;
pub mod cli;
pub mod core;
pub mod history;
pub mod providers;
pub mod storage;

// Services module
pub mod audit_service;
pub mod config_service;
pub mod credential_service;
pub mod launcher;
pub mod resize_watcher;
pub mod session_runner;
pub mod ssh_service;
pub mod title_keeper;

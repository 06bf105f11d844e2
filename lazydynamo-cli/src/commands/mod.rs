pub mod cache;
pub mod config_cmd;
pub mod scan;
pub mod tables;

pub mod agent;
pub mod ask;
pub mod config;
pub mod diagram;
pub mod init;
pub mod status;

pub mod app;
pub mod camera;
pub mod capture;
pub mod common;
pub mod config;
pub mod logger;
pub mod output;
pub mod sweep;

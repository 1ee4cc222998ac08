pub mod config;
pub mod studio;

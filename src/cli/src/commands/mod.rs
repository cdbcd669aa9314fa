pub mod auth;
pub mod config;
pub mod health;
pub mod permissions;
pub mod users;

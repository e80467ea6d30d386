pub mod auth;
pub mod console;
pub mod health;

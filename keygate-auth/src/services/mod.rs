pub mod auth;
pub mod console;
pub mod jwt;
pub mod oauth;

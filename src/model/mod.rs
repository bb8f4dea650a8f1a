pub mod auth;
pub mod ballot;
pub mod notice;
pub mod results;
pub mod store;
pub mod user;

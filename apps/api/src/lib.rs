//! Resume builder backend: accounts, token auth and owner-scoped resumes,
//! plus the web-tier session adapter that fronts it.

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod response;
pub mod resumes;
pub mod routes;
pub mod state;
pub mod store;
pub mod validation;
pub mod web_session;

//! Database queries

pub mod call;
pub mod campaign;
pub mod company;
pub mod import;
pub mod lead;
pub mod refresh_token;
pub mod user;

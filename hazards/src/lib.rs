pub mod application;
pub mod cli;
pub mod domain;
pub mod error;
pub mod infra;
pub mod scenario;

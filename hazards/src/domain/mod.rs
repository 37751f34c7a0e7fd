pub mod ids;
pub mod memory;
pub mod models;
pub mod report;
pub mod resource;

pub mod entity;
pub mod error;
pub mod schema;
pub mod types;

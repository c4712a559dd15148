pub mod repositories;
pub mod schema;

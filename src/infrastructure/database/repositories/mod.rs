mod memory_repo;
mod sqlite_repo;

pub use memory_repo::*;
pub use sqlite_repo::*;

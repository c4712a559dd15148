pub mod allocation;
pub mod error;
pub mod locks;
pub mod retry;

pub use allocation::{Actor, AllocationService};
pub use error::AllocationError;

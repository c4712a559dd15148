mod jwt_service;

pub use jwt_service::{Claims, JwtError, JwtService};

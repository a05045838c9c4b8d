mod error;
mod grpc_web;
mod jwt;
mod traits;
pub mod wire;

pub use error::IdentityError;
pub use grpc_web::GrpcWebVerifier;
pub use jwt::{Claims, JwtVerifier};
pub use traits::{Identity, IdentityVerifier};

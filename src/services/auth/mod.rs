pub mod authorizer;
pub mod claims;
pub mod error;
pub mod expiry;
pub mod factory;
pub mod issuer;
pub mod jwks;
pub mod key_set_cache;
pub mod passthrough;
pub mod token;

pub use authorizer::{Authorizer, Outcome, RequestInfo};
pub use claims::Claims;
pub use error::AuthError;
pub use factory::build_authorizer;

//! Credential record, OAuth state scheme, and token lifecycle management.

pub mod credentials;
pub mod state;
pub mod token;

pub use credentials::{Credentials, Secret};
pub use state::{StateIssuer, constant_time_eq, parse_state};
pub use token::TokenManager;

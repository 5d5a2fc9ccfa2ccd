pub mod certificate;
pub mod config;
pub mod db;
pub mod error;
pub mod loader;
pub mod pdf;
pub mod routes;
pub mod session;
pub mod state;
pub mod templates;

pub use error::{CertError, CertResult};

pub mod client;
pub mod error;
pub mod http;
pub mod split;
pub mod types;

pub use client::CrmClient;
pub use error::{CrmError, Result};

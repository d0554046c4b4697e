pub mod client;
pub mod error;
pub mod types;

pub use client::{JobTransport, RemoteClient};
pub use error::RemoteError;
pub use types::RemoteOutcome;

//! Remote store facade for the labmirror reconciliation engine.
//!
//! The engine never talks to a store directly; it goes through the port
//! traits in [`ports`]. The default implementation is [`HttpRemote`], a JSON
//! over HTTP client. Test code substitutes an in-memory fake.

pub mod dto;
pub mod http;
pub mod ports;

mod error;

pub use error::Error;
pub use http::HttpRemote;
pub use ports::{
    AttachmentUpdateOp, Auth, FetchOptions, FileTransfer, ReadApi, Remote, SessionToken, WriteApi,
};

/// Result type for remote operations.
pub type Result<T> = std::result::Result<T, Error>;

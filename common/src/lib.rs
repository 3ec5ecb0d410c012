//! n4d Common Library
//!
//! This crate provides the protocol pieces shared by n4d clients:
//!
//! - The wire value union carried in calls and replies
//! - XML-RPC `methodCall` encoding and `methodResponse` decoding
//! - The reply envelope, its status codes and the structural validator
//! - Server address parsing and well-known locations
//!
//! It performs no I/O; transports live in the client crate.

/// Well-known constants, key locations and server addresses
pub mod config;

/// Reply envelope and status codes
pub mod envelope;

/// Tagged union of XML-RPC values
pub mod value;

/// XML-RPC document codec
pub mod xmlrpc;

// Re-export commonly used types for convenience
pub use config::{AddressError, Scheme, ServerAddress, DEFAULT_ADDRESS, TICKET_MAGIC};
pub use envelope::{status, ResponseEnvelope};
pub use value::Value;
pub use xmlrpc::{CodecError, MethodResponse};

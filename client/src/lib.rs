//! n4d Client Library
//!
//! This crate calls methods on an n4d administration daemon over XML-RPC and
//! TLS. It covers the client's side of the n4d contract:
//!
//! - Keys, credentials (anonymous, password, user key, master key) and
//!   tickets
//! - Control methods (tickets, variables, method listing, version)
//! - Calls on arbitrary remote classes through [`Proxy`]
//! - Validation of every reply envelope and typed [`RpcError`]s
//!
//! # Example
//!
//! ```no_run
//! use n4d_client::{Client, ClientConfig, Value};
//!
//! # fn main() -> Result<(), n4d_client::RpcError> {
//! let client = Client::new(
//!     ClientConfig::new()
//!         .with_address("https://127.0.0.1:9779")
//!         .with_user("alice")
//!         .with_password("secret"),
//! );
//!
//! client.validate_user()?;
//! let ticket = client.get_ticket()?;
//! println!("ticket: {ticket}");
//!
//! let reply = client.proxy("VariablesManager").call("list_variables", vec![])?;
//! println!("{reply}");
//!
//! client.set_variable("greeting", Value::from("hello"), None)?;
//! # Ok(())
//! # }
//! ```

mod call;
mod client;
mod credential;
mod error;
mod key;
mod ticket;
/// XML-RPC transports
pub mod transport;

pub use call::{invoke, Call, Proxy};
pub use client::{Client, ClientConfig};
pub use credential::{AuthMode, Credential};
pub use error::RpcError;
pub use key::{Key, KeyStore, KEY_LENGTH};
pub use ticket::{Ticket, TicketParseError};
pub use transport::{TlsTransport, Transport};
// Re-export important types from n4d-common for convenience
pub use n4d_common::{status, ResponseEnvelope, Value, DEFAULT_ADDRESS};

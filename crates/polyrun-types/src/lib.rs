//! Wire types for the polyrun execution protocol.
//!
//! Shared contract between the execution server and its clients: the batch
//! HTTP request/response bodies and the WebSocket messages used by the
//! interactive runner. Nothing in here performs I/O.
//!
//! ## Example
//!
//! ```rust
//! use polyrun_types::ClientMessage;
//!
//! let msg = ClientMessage::parse(r#"{"action":"stdin","input":"abc"}"#).unwrap();
//! assert_eq!(msg, ClientMessage::Stdin { input: "abc".to_string() });
//! ```

pub mod error;
pub mod messages;
pub mod requests;

pub use error::*;
pub use messages::*;
pub use requests::*;

//! Connection gateway and TCP listener for the quill server.
//!
//! Each accepted connection gets one gateway task that decodes client
//! frames, relays submissions to the document's coordinator, and streams
//! canonical events back out. A connection edits at most one document.

#![warn(missing_docs)]

pub mod gateway;
pub mod listen;

pub use gateway::run_connection;
pub use listen::Server;

//! Wire protocol for the quill synchronization server.
//!
//! Frames are self-describing JSON objects, one per line, with a `type`
//! field discriminating variants. Unknown or malformed frames are decode
//! errors, never a silent pass-through.

#![warn(missing_docs)]

pub mod client;
pub mod codec;
pub mod frames;

pub use client::Client;
pub use codec::{CodecError, MAX_FRAME_LEN, read_frame, write_frame};
pub use frames::{ClientFrame, ServerFrame};

/// Default TCP port the server listens on.
pub const DEFAULT_TCP_PORT: u16 = 65432;

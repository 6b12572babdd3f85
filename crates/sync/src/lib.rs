//! Document state and per-document session coordination.
//!
//! One coordinator actor per document serializes every submission, rebases
//! it across intervening history, mutates the authoritative buffer, and
//! fans the applied operation out to every subscribed session. Different
//! documents are fully independent.

#![warn(missing_docs)]

pub mod coordinator;
pub mod document;
pub mod error;
pub mod registry;

pub use coordinator::{DocHandle, SessionEvent, Subscription, spawn};
pub use document::{Applied, DocumentState};
pub use error::{Closed, SubmitError};
pub use registry::DocumentRegistry;

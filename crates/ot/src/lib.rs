//! Operation model and transform engine for collaborative text editing.
//!
//! This crate provides the pure core of the synchronization engine:
//! * [`Operation`]: an immutable description of one edit, tagged with the
//!   revision it was authored against
//! * [`Operation::apply`]: bounds-checked application to a text buffer
//! * [`transform`]: rebasing an operation authored against an old revision
//!   so it applies correctly to the current revision
//!
//! All offsets are measured in characters, not bytes.

#![warn(missing_docs)]

pub mod operation;
pub mod transform;

pub use operation::{ApplyError, ClientId, ClientSeq, OpKind, Operation, Revision};
pub use transform::{TransformError, transform};

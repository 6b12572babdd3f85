//! Submission and lifecycle errors.

use quill_ot::{ApplyError, ClientSeq, Revision};

/// Why a submitted operation was refused.
///
/// A refused submission has zero observable side effect: buffer, revision
/// and history are untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
	/// The client claims a base revision the server never produced.
	/// A programming error on the client, not a race.
	#[error("base revision {base} is ahead of current revision {current}")]
	FutureRevision {
		/// Base revision the client sent.
		base: Revision,
		/// The document's current revision.
		current: Revision,
	},
	/// The client's sequence number was already applied; resubmitting an
	/// acknowledged edit never double-applies.
	#[error("client sequence {client_seq} was already applied")]
	DuplicateSeq {
		/// The repeated sequence number.
		client_seq: ClientSeq,
	},
	/// History was evicted past the operation's base revision, so the
	/// rebase cannot be computed. The client must resync from a snapshot.
	#[error("history no longer reaches base revision {base}")]
	HistoryEvicted {
		/// Base revision the client sent.
		base: Revision,
	},
	/// A whole-buffer replace landed after the operation's base revision;
	/// the client must re-derive its intent from a fresh snapshot.
	#[error("superseded by a whole-buffer replace; resync required")]
	Superseded,
	/// Out of bounds against the buffer even after the rebase.
	#[error(transparent)]
	OutOfBounds(#[from] ApplyError),
	/// The document's coordinator is gone.
	#[error("document closed")]
	DocumentClosed,
}

/// The document's coordinator has shut down (last session detached).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("document closed")]
pub struct Closed;

impl From<Closed> for SubmitError {
	fn from(_: Closed) -> Self {
		Self::DocumentClosed
	}
}

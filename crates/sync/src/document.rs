//! Authoritative per-document state.

use std::collections::VecDeque;

use quill_ot::{ClientId, ClientSeq, OpKind, Operation, Revision, TransformError, transform};
use rustc_hash::FxHashMap;

use crate::error::SubmitError;

/// Outcome of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
	/// The revision the operation produced.
	pub revision: Revision,
	/// The operation as applied, post-transform. Its `base_revision` is
	/// rewritten to the revision it was actually applied against.
	pub op: Operation,
}

/// The authoritative text buffer, revision counter and operation log for
/// one document.
///
/// Purely synchronous; the coordinator actor is its single owner and
/// serializes all mutation through itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentState {
	revision: Revision,
	buffer: String,
	/// Applied operations, oldest first. Entry `k` moved the document from
	/// revision `history_start + k` to `history_start + k + 1`.
	history: VecDeque<Operation>,
	/// Revision of the buffer before the first retained history entry.
	history_start: Revision,
	/// Highest applied sequence number per client, for duplicate detection.
	last_seq: FxHashMap<ClientId, ClientSeq>,
}

impl Default for DocumentState {
	fn default() -> Self {
		Self::new()
	}
}

impl DocumentState {
	/// Creates an empty document at revision 0.
	#[must_use]
	pub fn new() -> Self {
		Self {
			revision: Revision(0),
			buffer: String::new(),
			history: VecDeque::new(),
			history_start: Revision(0),
			last_seq: FxHashMap::default(),
		}
	}

	/// Current revision.
	#[must_use]
	pub fn revision(&self) -> Revision {
		self.revision
	}

	/// Current buffer content.
	#[must_use]
	pub fn buffer(&self) -> &str {
		&self.buffer
	}

	/// Number of retained history entries.
	#[must_use]
	pub fn history_len(&self) -> usize {
		self.history.len()
	}

	/// Validates, rebases and applies one operation.
	///
	/// On success the buffer is mutated, the revision bumped by exactly
	/// one, and the applied operation appended to history. On any error
	/// the state is untouched.
	///
	/// Whole-buffer replaces skip the rebase (they carry no positions) and
	/// are exempt from duplicate-sequence tracking.
	///
	/// # Errors
	///
	/// See [`SubmitError`] for the taxonomy.
	pub fn submit(&mut self, op: Operation) -> Result<Applied, SubmitError> {
		if op.base_revision > self.revision {
			return Err(SubmitError::FutureRevision {
				base: op.base_revision,
				current: self.revision,
			});
		}

		let is_replace = matches!(op.kind, OpKind::Replace { .. });
		if !is_replace
			&& let Some(&seen) = self.last_seq.get(&op.client_id)
			&& op.client_seq <= seen
		{
			return Err(SubmitError::DuplicateSeq {
				client_seq: op.client_seq,
			});
		}

		let transformed = if is_replace {
			op
		} else {
			if op.base_revision < self.history_start {
				return Err(SubmitError::HistoryEvicted {
					base: op.base_revision,
				});
			}
			let skip = (op.base_revision.0 - self.history_start.0) as usize;
			transform(&op, self.history.iter().skip(skip)).map_err(|TransformError::Superseded| SubmitError::Superseded)?
		};

		let buffer = transformed.apply(&self.buffer)?;

		let mut applied = transformed;
		applied.base_revision = self.revision;
		self.buffer = buffer;
		self.revision = self.revision.next();
		self.history.push_back(applied.clone());
		if !matches!(applied.kind, OpKind::Replace { .. }) {
			self.last_seq.insert(applied.client_id, applied.client_seq);
		}

		Ok(Applied {
			revision: self.revision,
			op: applied,
		})
	}

	/// Drops history entries no client can still rebase against.
	///
	/// `floor` is the oldest base revision that must stay reachable;
	/// entries that produced revisions at or below it are released.
	pub fn evict_below(&mut self, floor: Revision) {
		while self.history_start < floor && !self.history.is_empty() {
			self.history.pop_front();
			self.history_start = self.history_start.next();
		}
	}
}

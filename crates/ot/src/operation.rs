//! Edit operations and their application to a text buffer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Monotonically increasing integer identifying a point in a document's
/// edit history. Starts at 0 for an empty document and increments exactly
/// once per accepted operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Revision(pub u64);

impl Revision {
	/// Returns the revision after this one.
	#[must_use]
	pub fn next(self) -> Self {
		Self(self.0 + 1)
	}
}

impl std::fmt::Display for Revision {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.0.fmt(f)
	}
}

/// Identity of an editing client.
///
/// Ordering is total and identical on every replica; combined with
/// [`ClientSeq`] it gives the tie-break key for concurrent inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientId(pub Uuid);

impl ClientId {
	/// Allocates a fresh random client identity.
	#[must_use]
	pub fn random() -> Self {
		Self(Uuid::new_v4())
	}
}

impl std::fmt::Display for ClientId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.0.fmt(f)
	}
}

/// Per-client monotonic sequence number, assigned by the authoring client.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientSeq(pub u64);

impl std::fmt::Display for ClientSeq {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.0.fmt(f)
	}
}

/// The edit described by an operation.
///
/// Positions and lengths are character offsets valid at the operation's
/// base revision. `Replace` ignores position entirely and swaps the whole
/// buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OpKind {
	/// Insert `text` before the character at `position`.
	Insert {
		/// Zero-based character offset into the buffer.
		position: usize,
		/// The inserted text.
		text: String,
	},
	/// Delete `length` characters starting at `position`.
	///
	/// A zero-length delete is a valid identity edit (transforms can
	/// shrink a delete down to nothing).
	Delete {
		/// Zero-based character offset into the buffer.
		position: usize,
		/// Number of characters to remove.
		length: usize,
	},
	/// Replace the entire buffer with `content`.
	Replace {
		/// The full new buffer content.
		content: String,
	},
}

/// An immutable description of one edit.
///
/// Carries the revision the authoring client last observed plus its
/// identity and per-client sequence number, which together order
/// concurrent operations deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
	/// What the edit does.
	#[serde(flatten)]
	pub kind: OpKind,
	/// Revision the authoring client last observed.
	pub base_revision: Revision,
	/// Origin client.
	pub client_id: ClientId,
	/// Position in the origin client's authoring order.
	pub client_seq: ClientSeq,
}

/// Why an operation cannot be applied to a buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
	/// Insert position past the end of the buffer.
	#[error("position {position} out of bounds for buffer of {len} chars")]
	PositionOutOfBounds {
		/// The offending character offset.
		position: usize,
		/// Buffer length in characters.
		len: usize,
	},
	/// Delete run extends past the end of the buffer.
	#[error("delete of {length} chars at {position} extends past buffer of {len} chars")]
	RangeOutOfBounds {
		/// Start of the delete run.
		position: usize,
		/// Length of the delete run.
		length: usize,
		/// Buffer length in characters.
		len: usize,
	},
}

impl Operation {
	/// Applies this operation to `buffer`, returning the new content.
	///
	/// Pure: the input buffer is untouched. Bounds are validated against
	/// the buffer as given; callers must have transformed the operation to
	/// the buffer's revision first.
	///
	/// # Errors
	///
	/// Returns [`ApplyError`] if the position or delete run is out of
	/// bounds. Invalid operations are rejected, never clamped.
	pub fn apply(&self, buffer: &str) -> Result<String, ApplyError> {
		let len = buffer.chars().count();
		match &self.kind {
			OpKind::Insert { position, text } => {
				if *position > len {
					return Err(ApplyError::PositionOutOfBounds {
						position: *position,
						len,
					});
				}
				let at = byte_of_char(buffer, *position);
				let mut out = String::with_capacity(buffer.len() + text.len());
				out.push_str(&buffer[..at]);
				out.push_str(text);
				out.push_str(&buffer[at..]);
				Ok(out)
			}
			OpKind::Delete { position, length } => {
				// The sum can overflow on hostile input; that is out of
				// bounds, not a panic.
				if position.checked_add(*length).is_none_or(|end| end > len) {
					return Err(ApplyError::RangeOutOfBounds {
						position: *position,
						length: *length,
						len,
					});
				}
				let start = byte_of_char(buffer, *position);
				let end = byte_of_char(buffer, position + length);
				let mut out = String::with_capacity(buffer.len() - (end - start));
				out.push_str(&buffer[..start]);
				out.push_str(&buffer[end..]);
				Ok(out)
			}
			OpKind::Replace { content } => Ok(content.clone()),
		}
	}

	/// Returns the length in characters this operation adds or removes.
	///
	/// Used by the transform rules to shift later positions.
	#[must_use]
	pub fn span(&self) -> usize {
		match &self.kind {
			OpKind::Insert { text, .. } => text.chars().count(),
			OpKind::Delete { length, .. } => *length,
			OpKind::Replace { content } => content.chars().count(),
		}
	}

	/// The tie-break key ordering concurrent operations: lexicographic on
	/// `(client_id, client_seq)`.
	#[must_use]
	pub fn order_key(&self) -> (ClientId, ClientSeq) {
		(self.client_id, self.client_seq)
	}
}

/// Byte offset of the `char_idx`-th character (or the buffer end).
///
/// Caller guarantees `char_idx <= buffer.chars().count()`.
fn byte_of_char(buffer: &str, char_idx: usize) -> usize {
	buffer
		.char_indices()
		.nth(char_idx)
		.map_or(buffer.len(), |(byte, _)| byte)
}

//! Rebasing operations across intervening history.
//!
//! The server applies operations in arrival order; an operation authored
//! against revision R must be rebased across every operation applied since
//! R before it can touch the buffer. The rules here are position shifts for
//! linear text: O(intervening operations) per rebase, independent of
//! document size.

use crate::operation::{OpKind, Operation};

/// Why an operation cannot be rebased onto the current revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
	/// A whole-buffer replace landed after the operation's base revision.
	/// The operation's coordinates are meaningless against the new content;
	/// the client must re-derive its intent from a fresh snapshot.
	#[error("operation superseded by a whole-buffer replace")]
	Superseded,
}

/// Rebases `op` across `history`, oldest applied operation first.
///
/// `history` must be exactly the operations applied after
/// `op.base_revision`, in apply order. Returns an equivalent operation
/// expressed against the revision after the last history entry. The
/// returned operation keeps the author's identity fields; callers that
/// record it decide what base revision to stamp.
///
/// # Errors
///
/// Returns [`TransformError::Superseded`] if any intervening operation was
/// a replace.
pub fn transform<'a>(
	op: &Operation,
	history: impl IntoIterator<Item = &'a Operation>,
) -> Result<Operation, TransformError> {
	let mut out = op.clone();
	for applied in history {
		rebase_one(&mut out, applied)?;
	}
	Ok(out)
}

/// Rebases `op` across a single already-applied operation.
///
/// `op`'s coordinates come straight off the wire and are untrusted:
/// position shifts saturate, so a hostile offset stays out of range and
/// surfaces as a bounds error at apply time instead of overflowing here.
fn rebase_one(op: &mut Operation, applied: &Operation) -> Result<(), TransformError> {
	match &applied.kind {
		OpKind::Replace { .. } => Err(TransformError::Superseded),
		OpKind::Insert { position: at, text } => {
			let inserted = text.chars().count();
			let op_key = op.order_key();
			match &mut op.kind {
				OpKind::Insert { position, .. } => {
					// Equal positions order by (client_id, client_seq); the
					// smaller key counts as earlier and keeps its spot.
					if *position > *at || (*position == *at && applied.order_key() < op_key) {
						*position = position.saturating_add(inserted);
					}
				}
				OpKind::Delete { position, length } => {
					if *at <= *position {
						*position = position.saturating_add(inserted);
					} else if *at < position.saturating_add(*length) {
						// Insert landed inside the pending run: grow the run
						// so the surrounding text still joins up as the
						// deleting client intended.
						*length = length.saturating_add(inserted);
					}
				}
				OpKind::Replace { .. } => {}
			}
			Ok(())
		}
		OpKind::Delete {
			position: at,
			length,
		} => {
			let (dstart, dlen) = (*at, *length);
			let dend = dstart + dlen;
			match &mut op.kind {
				OpKind::Insert { position, .. } => {
					if *position >= dend {
						*position -= dlen;
					} else if *position > dstart {
						// Inside the deleted run: the edit's intent survives
						// at the point where the surrounding text now meets.
						*position = dstart;
					}
				}
				OpKind::Delete { position, length } => {
					let start = *position;
					let end = start.saturating_add(*length);
					if start >= dend {
						*position -= dlen;
					} else if end > dstart {
						// Overlap: only characters that survived the applied
						// delete remain to be deleted. May shrink to zero.
						let overlap = end.min(dend) - start.max(dstart);
						*length -= overlap;
						*position = start.min(dstart);
					}
				}
				OpKind::Replace { .. } => {}
			}
			Ok(())
		}
	}
}

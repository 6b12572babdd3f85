//! Frame types exchanged between clients and the server.

use quill_ot::{ClientSeq, Operation, Revision};
use serde::{Deserialize, Serialize};

/// A frame sent from a client to the server.
///
/// Closed tagged-variant type: decoding matches exhaustively, so an
/// unknown `type` tag or a missing field is a decode error at the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientFrame {
	/// Attach this connection's session to a document.
	#[serde(rename_all = "camelCase")]
	Open {
		/// Identifier of the document to edit.
		document_id: String,
	},
	/// Insert `text` at `position`.
	#[serde(rename_all = "camelCase")]
	Insert {
		/// Revision the client last observed.
		base_revision: Revision,
		/// Character offset at the base revision.
		position: usize,
		/// Text to insert.
		text: String,
		/// Client-assigned sequence number.
		client_seq: ClientSeq,
	},
	/// Delete `length` characters at `position`.
	#[serde(rename_all = "camelCase")]
	Delete {
		/// Revision the client last observed.
		base_revision: Revision,
		/// Character offset at the base revision.
		position: usize,
		/// Run length in characters.
		length: usize,
		/// Client-assigned sequence number.
		client_seq: ClientSeq,
	},
	/// Replace the entire document content.
	Set {
		/// The full new content.
		content: String,
	},
}

/// A frame sent from the server to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerFrame {
	/// Broadcast of an accepted, transformed edit.
	Update {
		/// Revision the edit produced.
		revision: Revision,
		/// The operation as applied (post-transform, which may differ
		/// from what the author submitted).
		op: Operation,
	},
	/// The receiving client's own edit was applied.
	#[serde(rename_all = "camelCase")]
	Ack {
		/// The client's sequence number for the applied edit.
		client_seq: ClientSeq,
		/// Revision the edit produced.
		revision: Revision,
	},
	/// Full document state, sent on attach.
	Snapshot {
		/// Current revision.
		revision: Revision,
		/// Full buffer content.
		content: String,
	},
	/// The named submission was invalid and had no effect.
	#[serde(rename_all = "camelCase")]
	Reject {
		/// The client's sequence number for the refused submission.
		client_seq: ClientSeq,
		/// Human-readable cause.
		reason: String,
	},
}

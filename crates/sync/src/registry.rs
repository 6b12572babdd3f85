//! Registry mapping document ids to live coordinators.

use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;

use crate::coordinator::{DocHandle, WeakDocHandle, spawn};

/// Tracks one coordinator per document id.
///
/// Holds only weak handles: a coordinator lives exactly as long as some
/// gateway holds a strong [`DocHandle`], so the last detach closes the
/// document without any explicit teardown protocol. Re-attaching under
/// the same id after that starts a fresh document.
#[derive(Debug, Default)]
pub struct DocumentRegistry {
	docs: Mutex<FxHashMap<String, WeakDocHandle>>,
}

impl DocumentRegistry {
	/// Creates an empty registry.
	#[must_use]
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Returns the live coordinator for `doc_id`, spawning one if needed.
	pub fn attach(&self, doc_id: &str) -> DocHandle {
		let mut docs = self.docs.lock().unwrap();
		if let Some(weak) = docs.get(doc_id)
			&& let Some(handle) = weak.upgrade()
		{
			return handle;
		}
		let handle = spawn(doc_id.to_owned());
		docs.insert(doc_id.to_owned(), handle.downgrade());
		// Shed entries whose coordinators have since shut down.
		docs.retain(|_, weak| weak.upgrade().is_some());
		handle
	}

	/// Number of registered document ids, dead entries included until the
	/// next attach sweeps them.
	#[must_use]
	pub fn len(&self) -> usize {
		self.docs.lock().unwrap().len()
	}

	/// True if no document ids are registered.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.docs.lock().unwrap().is_empty()
	}
}

#[cfg(test)]
mod tests {
	use quill_ot::{ClientId, ClientSeq, OpKind, Operation, Revision};
	use uuid::Uuid;

	use super::*;

	fn set_op(content: &str) -> Operation {
		Operation {
			kind: OpKind::Replace {
				content: content.into(),
			},
			base_revision: Revision(0),
			client_id: ClientId(Uuid::from_u128(1)),
			client_seq: ClientSeq(0),
		}
	}

	#[tokio::test]
	async fn attach_reuses_the_live_coordinator() {
		let registry = DocumentRegistry::new();
		let first = registry.attach("notes");
		first.submit(set_op("shared")).await.unwrap();

		let second = registry.attach("notes");
		let (revision, buffer) = second.content().await.unwrap();
		assert_eq!(revision, Revision(1));
		assert_eq!(buffer, "shared");
		assert_eq!(registry.len(), 1);
	}

	#[tokio::test]
	async fn documents_are_independent() {
		let registry = DocumentRegistry::new();
		let a = registry.attach("a");
		let b = registry.attach("b");
		a.submit(set_op("alpha")).await.unwrap();

		assert_eq!(b.content().await.unwrap(), (Revision(0), String::new()));
		assert_eq!(registry.len(), 2);
	}

	#[tokio::test]
	async fn document_closes_when_last_handle_drops() {
		let registry = DocumentRegistry::new();
		let handle = registry.attach("gone");
		handle.submit(set_op("data")).await.unwrap();
		let weak = handle.downgrade();
		drop(handle);
		assert!(weak.upgrade().is_none());

		// A later attach starts a fresh document.
		let fresh = registry.attach("gone");
		assert_eq!(fresh.content().await.unwrap(), (Revision(0), String::new()));
	}
}

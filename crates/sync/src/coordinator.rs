//! Per-document coordinator actor.
//!
//! All submissions for a document flow through one mailbox; the actor owns
//! the [`DocumentState`], rebases and applies each operation, and fans the
//! result out to every subscribed session. Acks travel on the same event
//! stream as updates so each client observes revisions strictly in order.

use quill_ot::{ClientId, ClientSeq, Operation, Revision};
use rustc_hash::FxHashMap;
use tokio::sync::{mpsc, oneshot};

use crate::document::{Applied, DocumentState};
use crate::error::{Closed, SubmitError};

/// Mailbox capacity; gateways feel backpressure when the actor lags.
const MAILBOX_CAP: usize = 128;

/// Outbound event queue capacity per session. A session that falls this
/// far behind is dropped rather than allowed to stall the document.
const EVENT_QUEUE_CAP: usize = 256;

/// Canonical event delivered to a subscribed session, in revision order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
	/// Another client's operation was applied.
	Update {
		/// Revision the operation produced.
		revision: Revision,
		/// The operation as applied.
		op: Operation,
	},
	/// This session's own operation was applied.
	Ack {
		/// The session's sequence number for the edit.
		client_seq: ClientSeq,
		/// Revision the edit produced.
		revision: Revision,
	},
}

/// Initial sync handed back by [`DocHandle::subscribe`].
#[derive(Debug)]
pub struct Subscription {
	/// Revision of the snapshot.
	pub revision: Revision,
	/// Full buffer content at that revision.
	pub content: String,
	/// Ordered stream of subsequent canonical events.
	pub events: mpsc::Receiver<SessionEvent>,
}

enum Command {
	Submit {
		op: Operation,
		reply: oneshot::Sender<Result<Applied, SubmitError>>,
	},
	Subscribe {
		client_id: ClientId,
		reply: oneshot::Sender<Subscription>,
	},
	Unsubscribe {
		client_id: ClientId,
	},
	Content {
		reply: oneshot::Sender<(Revision, String)>,
	},
}

/// Cloneable handle to one document's coordinator.
///
/// The coordinator runs for as long as any strong handle exists; the
/// registry holds only a weak one, so the document closes when the last
/// gateway drops its handle.
#[derive(Debug, Clone)]
pub struct DocHandle {
	tx: mpsc::Sender<Command>,
}

/// Weak counterpart of [`DocHandle`], held by the registry.
#[derive(Debug, Clone)]
pub struct WeakDocHandle {
	tx: mpsc::WeakSender<Command>,
}

impl WeakDocHandle {
	/// Attempts to revive a strong handle; `None` once the coordinator
	/// has shut down.
	#[must_use]
	pub fn upgrade(&self) -> Option<DocHandle> {
		self.tx.upgrade().map(|tx| DocHandle { tx })
	}
}

impl DocHandle {
	/// Submits one operation through the document's serialization point.
	///
	/// On success the applied operation has already been fanned out:
	/// subscribers other than the origin received an `Update`, the origin
	/// session (if still attached) an `Ack`.
	///
	/// # Errors
	///
	/// Returns [`SubmitError`] when the operation is refused; the document
	/// is unaffected.
	pub async fn submit(&self, op: Operation) -> Result<Applied, SubmitError> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(Command::Submit { op, reply })
			.await
			.map_err(|_| SubmitError::DocumentClosed)?;
		rx.await.map_err(|_| SubmitError::DocumentClosed)?
	}

	/// Registers a session for broadcast and returns the initial snapshot.
	///
	/// # Errors
	///
	/// Returns [`Closed`] if the coordinator has shut down.
	pub async fn subscribe(&self, client_id: ClientId) -> Result<Subscription, Closed> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(Command::Subscribe { client_id, reply })
			.await
			.map_err(|_| Closed)?;
		rx.await.map_err(|_| Closed)
	}

	/// Removes a session from the broadcast list. Document state is not
	/// mutated; a missing session is a no-op.
	pub async fn unsubscribe(&self, client_id: ClientId) {
		let _ = self.tx.send(Command::Unsubscribe { client_id }).await;
	}

	/// Returns the current `(revision, buffer)` pair.
	///
	/// # Errors
	///
	/// Returns [`Closed`] if the coordinator has shut down.
	pub async fn content(&self) -> Result<(Revision, String), Closed> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(Command::Content { reply })
			.await
			.map_err(|_| Closed)?;
		rx.await.map_err(|_| Closed)
	}

	/// Downgrades to a registry-held weak handle.
	#[must_use]
	pub fn downgrade(&self) -> WeakDocHandle {
		WeakDocHandle {
			tx: self.tx.downgrade(),
		}
	}
}

struct Session {
	tx: mpsc::Sender<SessionEvent>,
	/// Oldest base revision this session could still author against:
	/// its snapshot revision, advanced by its own acknowledged edits.
	floor: Revision,
}

struct Coordinator {
	doc_id: String,
	state: DocumentState,
	sessions: FxHashMap<ClientId, Session>,
	rx: mpsc::Receiver<Command>,
}

/// Spawns the coordinator actor for one document and returns its handle.
pub fn spawn(doc_id: String) -> DocHandle {
	let (tx, rx) = mpsc::channel(MAILBOX_CAP);
	let mut actor = Coordinator {
		doc_id,
		state: DocumentState::new(),
		sessions: FxHashMap::default(),
		rx,
	};
	tokio::spawn(async move { actor.run().await });
	DocHandle { tx }
}

impl Coordinator {
	async fn run(&mut self) {
		tracing::info!(doc = %self.doc_id, "document opened");
		while let Some(cmd) = self.rx.recv().await {
			self.handle(cmd);
		}
		tracing::info!(doc = %self.doc_id, revision = %self.state.revision(), "document closed");
	}

	fn handle(&mut self, cmd: Command) {
		match cmd {
			Command::Submit { op, reply } => {
				let result = self.submit(op);
				let _ = reply.send(result);
			}
			Command::Subscribe { client_id, reply } => {
				let subscription = self.subscribe(client_id);
				let _ = reply.send(subscription);
			}
			Command::Unsubscribe { client_id } => {
				if self.sessions.remove(&client_id).is_some() {
					tracing::info!(doc = %self.doc_id, client = %client_id, "session detached");
				}
				self.evict_history();
			}
			Command::Content { reply } => {
				let _ = reply.send((self.state.revision(), self.state.buffer().to_owned()));
			}
		}
	}

	fn subscribe(&mut self, client_id: ClientId) -> Subscription {
		let (tx, events) = mpsc::channel(EVENT_QUEUE_CAP);
		let revision = self.state.revision();
		self.sessions.insert(client_id, Session { tx, floor: revision });
		tracing::info!(doc = %self.doc_id, client = %client_id, revision = %revision, "session attached");
		Subscription {
			revision,
			content: self.state.buffer().to_owned(),
			events,
		}
	}

	fn submit(&mut self, op: Operation) -> Result<Applied, SubmitError> {
		let origin = op.client_id;
		let applied = match self.state.submit(op) {
			Ok(applied) => applied,
			Err(err) => {
				tracing::warn!(doc = %self.doc_id, client = %origin, error = %err, "submission refused");
				return Err(err);
			}
		};
		tracing::debug!(
			doc = %self.doc_id,
			client = %origin,
			revision = %applied.revision,
			"operation applied"
		);

		// Fan out in revision order. A full queue means the session is
		// hopelessly behind; it gets dropped so the document stays live.
		let mut dead = Vec::new();
		for (client_id, session) in &mut self.sessions {
			let event = if *client_id == origin {
				session.floor = applied.revision;
				SessionEvent::Ack {
					client_seq: applied.op.client_seq,
					revision: applied.revision,
				}
			} else {
				SessionEvent::Update {
					revision: applied.revision,
					op: applied.op.clone(),
				}
			};
			if session.tx.try_send(event).is_err() {
				dead.push(*client_id);
			}
		}
		for client_id in dead {
			tracing::warn!(doc = %self.doc_id, client = %client_id, "dropping unresponsive session");
			self.sessions.remove(&client_id);
		}

		self.evict_history();
		Ok(applied)
	}

	/// Releases history entries below the oldest base revision any
	/// attached session could still author against.
	fn evict_history(&mut self) {
		if let Some(floor) = self.sessions.values().map(|s| s.floor).min() {
			self.state.evict_below(floor);
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use quill_ot::OpKind;
	use uuid::Uuid;

	use super::*;

	fn client(n: u128) -> ClientId {
		ClientId(Uuid::from_u128(n))
	}

	fn insert(client_id: ClientId, seq: u64, base: u64, position: usize, text: &str) -> Operation {
		Operation {
			kind: OpKind::Insert {
				position,
				text: text.into(),
			},
			base_revision: Revision(base),
			client_id,
			client_seq: ClientSeq(seq),
		}
	}

	#[tokio::test]
	async fn origin_gets_ack_others_get_update() {
		let doc = spawn("t".into());
		let a = client(1);
		let b = client(2);
		let mut sub_a = doc.subscribe(a).await.unwrap();
		let mut sub_b = doc.subscribe(b).await.unwrap();
		assert_eq!(sub_a.revision, Revision(0));
		assert_eq!(sub_a.content, "");

		doc.submit(insert(a, 1, 0, 0, "hi")).await.unwrap();

		assert_eq!(
			sub_a.events.recv().await,
			Some(SessionEvent::Ack {
				client_seq: ClientSeq(1),
				revision: Revision(1),
			})
		);
		let update = sub_b.events.recv().await.unwrap();
		match update {
			SessionEvent::Update { revision, op } => {
				assert_eq!(revision, Revision(1));
				assert_eq!(
					op.kind,
					OpKind::Insert {
						position: 0,
						text: "hi".into()
					}
				);
			}
			other => panic!("expected update, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn broadcast_carries_the_transformed_op() {
		let doc = spawn("t".into());
		let a = client(1);
		let b = client(2);
		let observer = client(3);
		doc.submit(insert(a, 1, 0, 0, "helo")).await.unwrap();
		let mut sub = doc.subscribe(observer).await.unwrap();
		assert_eq!(sub.content, "helo");

		// Concurrent edits against revision 1.
		doc.submit(insert(a, 2, 1, 2, "l")).await.unwrap();
		doc.submit(insert(b, 1, 1, 0, "X")).await.unwrap();

		let mut buffer = sub.content.clone();
		for _ in 0..2 {
			match sub.events.recv().await.unwrap() {
				SessionEvent::Update { op, .. } => buffer = op.apply(&buffer).unwrap(),
				SessionEvent::Ack { .. } => panic!("observer never submits"),
			}
		}
		assert_eq!(buffer, "Xhello");
		assert_eq!(doc.content().await.unwrap(), (Revision(3), "Xhello".into()));
	}

	#[tokio::test]
	async fn rejected_submission_leaves_document_untouched() {
		let doc = spawn("t".into());
		let a = client(1);
		doc.submit(insert(a, 1, 0, 0, "hi")).await.unwrap();
		let before = doc.content().await.unwrap();

		let err = doc.submit(insert(a, 2, 1, 99, "X")).await.unwrap_err();
		assert!(matches!(err, SubmitError::OutOfBounds(_)));
		assert_eq!(doc.content().await.unwrap(), before);
	}

	#[tokio::test]
	async fn unsubscribed_session_stops_receiving() {
		let doc = spawn("t".into());
		let a = client(1);
		let b = client(2);
		let mut sub_b = doc.subscribe(b).await.unwrap();

		doc.unsubscribe(b).await;
		doc.submit(insert(a, 1, 0, 0, "x")).await.unwrap();

		// Sender side is gone, so the stream ends rather than delivering.
		assert_eq!(sub_b.events.recv().await, None);
	}

	#[tokio::test]
	async fn submit_after_origin_detach_still_applies() {
		let doc = spawn("t".into());
		let a = client(1);
		doc.subscribe(a).await.unwrap();
		doc.unsubscribe(a).await;

		// The ack has nowhere to go but the edit still lands.
		doc.submit(insert(a, 1, 0, 0, "x")).await.unwrap();
		assert_eq!(doc.content().await.unwrap(), (Revision(1), "x".into()));
	}

	#[tokio::test]
	async fn coordinator_shuts_down_when_handles_drop() {
		let doc = spawn("t".into());
		let weak = doc.downgrade();
		let mut sub = doc.subscribe(client(1)).await.unwrap();

		drop(doc);
		// Mailbox closed: the actor drains and exits, ending event streams.
		assert_eq!(sub.events.recv().await, None);
		assert!(weak.upgrade().is_none());
	}

	#[tokio::test]
	async fn slow_subscriber_is_dropped_not_waited_on() {
		let doc = spawn("t".into());
		let a = client(1);
		let slow = client(2);
		let _sub = doc.subscribe(slow).await.unwrap();

		// Never drain `slow`; flood past its queue capacity.
		for i in 0..(EVENT_QUEUE_CAP as u64 + 8) {
			doc.submit(insert(a, i + 1, i, 0, "x")).await.unwrap();
		}
		// The document stayed live throughout.
		let (revision, buffer) = doc.content().await.unwrap();
		assert_eq!(revision, Revision(EVENT_QUEUE_CAP as u64 + 8));
		assert_eq!(buffer.len(), EVENT_QUEUE_CAP + 8);
	}

	/// Deterministic pseudo-random number generator for reproducible
	/// stress tests.
	struct Xorshift64(u64);

	impl Xorshift64 {
		fn next(&mut self) -> u64 {
			let mut x = self.0;
			x ^= x << 13;
			x ^= x >> 7;
			x ^= x << 17;
			self.0 = x;
			x
		}

		fn next_usize(&mut self, bound: usize) -> usize {
			(self.next() % bound.max(1) as u64) as usize
		}
	}

	/// Crafts a random operation valid against `(revision, buffer)`.
	fn random_op(rng: &mut Xorshift64, revision: Revision, buffer: &str, client_id: ClientId, seq: u64) -> Operation {
		let len = buffer.chars().count();
		let kind = if rng.next_usize(4) == 0 && len > 0 {
			let position = rng.next_usize(len);
			let length = rng.next_usize(len - position + 1);
			OpKind::Delete { position, length }
		} else {
			OpKind::Insert {
				position: rng.next_usize(len + 1),
				text: format!("{}", rng.next_usize(10)),
			}
		};
		Operation {
			kind,
			base_revision: revision,
			client_id,
			client_seq: ClientSeq(seq),
		}
	}

	#[tokio::test]
	async fn stress_observer_reconstruction_matches_authoritative_buffer() {
		const ROUNDS: usize = 200;
		let doc = spawn("stress".into());
		let authors: Vec<ClientId> = (1..=3).map(client).collect();
		let observer = client(9);
		let mut sub = doc.subscribe(observer).await.unwrap();
		let mut rng = Xorshift64(0xD0C5_EED5);
		let mut seqs = [0u64; 3];

		for _ in 0..ROUNDS {
			// Two distinct authors edit against the same stale snapshot;
			// the second submission always goes through the rebase path.
			let first = rng.next_usize(3);
			let second = (first + 1 + rng.next_usize(2)) % 3;
			let (revision, buffer) = doc.content().await.unwrap();

			for who in [first, second] {
				seqs[who] += 1;
				let op = random_op(&mut rng, revision, &buffer, authors[who], seqs[who]);
				doc.submit(op).await.unwrap();
			}

			// Keep the observer drained so it is never dropped as slow.
			while let Ok(event) = sub.events.try_recv() {
				apply_event(&mut sub.content, event);
			}
		}

		let (revision, authoritative) = doc.content().await.unwrap();
		assert_eq!(revision, Revision(2 * ROUNDS as u64));
		// Drain whatever is still queued.
		while let Ok(event) = sub.events.try_recv() {
			apply_event(&mut sub.content, event);
		}
		assert_eq!(sub.content, authoritative);
	}

	fn apply_event(buffer: &mut String, event: SessionEvent) {
		match event {
			SessionEvent::Update { op, .. } => *buffer = op.apply(buffer).unwrap(),
			SessionEvent::Ack { .. } => panic!("observer never submits"),
		}
	}
}

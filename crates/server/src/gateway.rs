//! Per-connection frame loop.
//!
//! The gateway owns the protocol session for one connection: it decodes
//! client frames, stamps them with the connection's identity, relays them
//! to the attached document's coordinator, and forwards the coordinator's
//! event stream back out. Writes go through a dedicated task so a slow
//! peer never blocks frame decoding.

use std::sync::Arc;

use quill_ot::{ClientId, ClientSeq, OpKind, Operation, Revision};
use quill_proto::{ClientFrame, ServerFrame, read_frame, write_frame};
use quill_sync::{DocHandle, DocumentRegistry, SessionEvent};
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Outbound frame queue capacity per connection.
const OUTBOUND_CAP: usize = 256;

/// The outbound half is gone; nothing more can reach this peer.
struct Hangup;

struct Gateway {
	client_id: ClientId,
	registry: Arc<DocumentRegistry>,
	out: mpsc::Sender<ServerFrame>,
	doc: Option<DocHandle>,
	forward: Option<JoinHandle<()>>,
}

/// Drives one connection until EOF, a fatal stream error, or peer hangup.
///
/// Malformed frames are answered with a reject and the connection stays
/// up; only I/O failures and oversized lines tear it down.
pub async fn run_connection<R, W>(mut reader: R, writer: W, registry: Arc<DocumentRegistry>)
where
	R: AsyncBufRead + Unpin,
	W: AsyncWrite + Unpin + Send + 'static,
{
	let client_id = ClientId::random();
	let (out, out_rx) = mpsc::channel(OUTBOUND_CAP);
	let writer_task = tokio::spawn(write_loop(writer, out_rx));

	let mut gateway = Gateway {
		client_id,
		registry,
		out,
		doc: None,
		forward: None,
	};

	loop {
		let frame = match read_frame(&mut reader).await {
			Ok(Some(frame)) => frame,
			Ok(None) => break,
			Err(err) if err.is_fatal() => {
				tracing::warn!(client = %client_id, error = %err, "connection torn down");
				break;
			}
			Err(err) => {
				tracing::warn!(client = %client_id, error = %err, "undecodable frame");
				if gateway.reject(ClientSeq(0), err.to_string()).await.is_err() {
					break;
				}
				continue;
			}
		};
		if gateway.dispatch(frame).await.is_err() {
			break;
		}
	}

	// Detach before dropping the handle so the coordinator logs the
	// session out even when other connections keep the document alive.
	if let Some(doc) = gateway.doc.take() {
		doc.unsubscribe(client_id).await;
	}
	if let Some(forward) = gateway.forward.take() {
		let _ = forward.await;
	}
	drop(gateway);
	let _ = writer_task.await;
	tracing::debug!(client = %client_id, "gateway finished");
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::Receiver<ServerFrame>)
where
	W: AsyncWrite + Unpin,
{
	while let Some(frame) = rx.recv().await {
		if let Err(err) = write_frame(&mut writer, &frame).await {
			tracing::debug!(error = %err, "outbound write failed");
			break;
		}
	}
	let _ = writer.shutdown().await;
}

impl Gateway {
	async fn dispatch(&mut self, frame: ClientFrame) -> Result<(), Hangup> {
		match frame {
			ClientFrame::Open { document_id } => self.open(document_id).await,
			ClientFrame::Insert {
				base_revision,
				position,
				text,
				client_seq,
			} => {
				self.submit(Operation {
					kind: OpKind::Insert { position, text },
					base_revision,
					client_id: self.client_id,
					client_seq,
				})
				.await
			}
			ClientFrame::Delete {
				base_revision,
				position,
				length,
				client_seq,
			} => {
				self.submit(Operation {
					kind: OpKind::Delete { position, length },
					base_revision,
					client_id: self.client_id,
					client_seq,
				})
				.await
			}
			// Whole-buffer replaces carry no base; they land against
			// whatever revision is current.
			ClientFrame::Set { content } => {
				self.submit(Operation {
					kind: OpKind::Replace { content },
					base_revision: Revision(0),
					client_id: self.client_id,
					client_seq: ClientSeq(0),
				})
				.await
			}
		}
	}

	async fn open(&mut self, document_id: String) -> Result<(), Hangup> {
		if self.doc.is_some() {
			return self.reject(ClientSeq(0), "already attached to a document".into()).await;
		}

		let handle = self.registry.attach(&document_id);
		let Ok(subscription) = handle.subscribe(self.client_id).await else {
			// The coordinator died between attach and subscribe; the
			// client can simply reopen.
			return self.reject(ClientSeq(0), "document closed".into()).await;
		};

		self.send(ServerFrame::Snapshot {
			revision: subscription.revision,
			content: subscription.content,
		})
		.await?;

		let out = self.out.clone();
		let mut events = subscription.events;
		self.forward = Some(tokio::spawn(async move {
			while let Some(event) = events.recv().await {
				let frame = match event {
					SessionEvent::Update { revision, op } => ServerFrame::Update { revision, op },
					SessionEvent::Ack { client_seq, revision } => ServerFrame::Ack { client_seq, revision },
				};
				if out.send(frame).await.is_err() {
					break;
				}
			}
		}));
		self.doc = Some(handle);
		Ok(())
	}

	async fn submit(&mut self, op: Operation) -> Result<(), Hangup> {
		let client_seq = op.client_seq;
		let Some(doc) = &self.doc else {
			return self.reject(client_seq, "no document attached".into()).await;
		};

		// The ack rides the subscription's event stream, interleaved with
		// updates in revision order; only refusals are answered here.
		if let Err(err) = doc.submit(op).await {
			return self.reject(client_seq, err.to_string()).await;
		}
		Ok(())
	}

	async fn reject(&self, client_seq: ClientSeq, reason: String) -> Result<(), Hangup> {
		self.send(ServerFrame::Reject { client_seq, reason }).await
	}

	async fn send(&self, frame: ServerFrame) -> Result<(), Hangup> {
		self.out.send(frame).await.map_err(|_| Hangup)
	}
}

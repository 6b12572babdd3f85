//! TCP accept loop.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use quill_sync::DocumentRegistry;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::gateway::run_connection;

/// Listening server: one shared document registry, one gateway task per
/// accepted connection.
pub struct Server {
	listener: TcpListener,
	registry: Arc<DocumentRegistry>,
}

impl Server {
	/// Binds the listener.
	///
	/// # Errors
	///
	/// Returns the underlying bind error.
	pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
		let listener = TcpListener::bind(addr).await?;
		Ok(Self {
			listener,
			registry: DocumentRegistry::new(),
		})
	}

	/// The bound address; useful when binding port 0.
	///
	/// # Errors
	///
	/// Returns the underlying socket error.
	pub fn local_addr(&self) -> io::Result<SocketAddr> {
		self.listener.local_addr()
	}

	/// Accepts connections until `shutdown` fires.
	///
	/// In-flight gateways are not awaited on shutdown; dropping the
	/// runtime tears them down with their connections.
	///
	/// # Errors
	///
	/// Returns the address lookup error for the startup log line; accept
	/// errors are logged and retried.
	pub async fn run(self, shutdown: CancellationToken) -> io::Result<()> {
		tracing::info!(addr = %self.local_addr()?, "server listening");
		loop {
			tokio::select! {
				_ = shutdown.cancelled() => {
					tracing::info!("server shutting down");
					break;
				}
				res = self.listener.accept() => {
					match res {
						Ok((stream, peer)) => {
							tracing::info!(%peer, "connection accepted");
							tokio::spawn(handle_connection(stream, self.registry.clone()));
						}
						Err(err) => {
							tracing::error!(error = %err, "accept failed");
						}
					}
				}
			}
		}
		Ok(())
	}
}

async fn handle_connection(stream: TcpStream, registry: Arc<DocumentRegistry>) {
	let peer = stream.peer_addr().ok();
	let (reader, writer) = stream.into_split();
	run_connection(BufReader::new(reader), writer, registry).await;
	tracing::info!(peer = ?peer, "connection closed");
}

//! Programmatic protocol client.
//!
//! Used by integration tests and external tooling; the interactive editor
//! front-ends are separate collaborators speaking the same frames.

use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::codec::{self, CodecError};
use crate::frames::{ClientFrame, ServerFrame};

/// One duplex protocol connection from the client side.
pub struct Client<R, W> {
	reader: R,
	writer: W,
}

impl Client<BufReader<OwnedReadHalf>, OwnedWriteHalf> {
	/// Connects to a server over TCP.
	///
	/// # Errors
	///
	/// Returns the underlying connect error.
	pub async fn connect(addr: impl tokio::net::ToSocketAddrs) -> std::io::Result<Self> {
		let stream = TcpStream::connect(addr).await?;
		let (rx, tx) = stream.into_split();
		Ok(Self::new(BufReader::new(rx), tx))
	}
}

impl<R, W> Client<R, W>
where
	R: AsyncBufRead + Unpin,
	W: AsyncWrite + Unpin,
{
	/// Wraps an existing duplex stream pair.
	pub fn new(reader: R, writer: W) -> Self {
		Self { reader, writer }
	}

	/// Sends one frame.
	///
	/// # Errors
	///
	/// Returns [`CodecError`] on serialization or stream failure.
	pub async fn send(&mut self, frame: &ClientFrame) -> Result<(), CodecError> {
		codec::write_frame(&mut self.writer, frame).await
	}

	/// Receives the next server frame. Returns `None` on clean EOF.
	///
	/// # Errors
	///
	/// Returns [`CodecError`] on decode or stream failure.
	pub async fn recv(&mut self) -> Result<Option<ServerFrame>, CodecError> {
		codec::read_frame(&mut self.reader).await
	}
}

#[cfg(test)]
mod tests {
	use tokio::io::{BufReader, duplex};

	use super::*;
	use crate::codec::{read_frame, write_frame};
	use quill_ot::Revision;

	#[tokio::test]
	async fn client_speaks_the_line_protocol() {
		let (ours, theirs) = duplex(4096);
		let (our_rx, our_tx) = tokio::io::split(ours);
		let (their_rx, mut their_tx) = tokio::io::split(theirs);

		let mut client = Client::new(BufReader::new(our_rx), our_tx);
		client
			.send(&ClientFrame::Open {
				document_id: "doc".into(),
			})
			.await
			.unwrap();

		let mut server_reader = BufReader::new(their_rx);
		let got: ClientFrame = read_frame(&mut server_reader).await.unwrap().unwrap();
		assert_eq!(
			got,
			ClientFrame::Open {
				document_id: "doc".into()
			}
		);

		write_frame(
			&mut their_tx,
			&ServerFrame::Snapshot {
				revision: Revision(0),
				content: String::new(),
			},
		)
		.await
		.unwrap();

		let frame = client.recv().await.unwrap().unwrap();
		assert_eq!(
			frame,
			ServerFrame::Snapshot {
				revision: Revision(0),
				content: String::new()
			}
		);
	}
}

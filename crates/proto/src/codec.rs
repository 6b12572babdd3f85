//! Line-delimited JSON framing over async byte streams.
//!
//! One frame per line. The reader caps line length so a misbehaving peer
//! cannot grow a connection's buffer without bound.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum encoded frame length in bytes, newline excluded.
pub const MAX_FRAME_LEN: usize = 1 << 20;

/// Codec failure while reading or writing a frame.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
	/// Underlying stream failure.
	#[error("io: {0}")]
	Io(#[from] std::io::Error),
	/// The line was not a valid frame of the expected type.
	#[error("json: {0}")]
	Json(#[from] serde_json::Error),
	/// The peer sent a line longer than [`MAX_FRAME_LEN`].
	#[error("frame exceeds {MAX_FRAME_LEN} bytes")]
	FrameTooLong,
}

impl CodecError {
	/// True for errors that poison the stream (resynchronization on a
	/// line boundary is no longer possible); the connection should close.
	#[must_use]
	pub fn is_fatal(&self) -> bool {
		matches!(self, Self::Io(_) | Self::FrameTooLong)
	}
}

/// Reads one frame from `input`. Returns `None` on clean EOF.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for a malformed line (the stream remains
/// usable), [`CodecError::FrameTooLong`] or [`CodecError::Io`] for
/// unrecoverable stream states.
pub async fn read_frame<T, R>(input: &mut R) -> Result<Option<T>, CodecError>
where
	T: DeserializeOwned,
	R: AsyncBufRead + Unpin,
{
	let mut line = String::new();
	// Read through a take adapter so an unterminated line cannot grow the
	// buffer past the frame cap.
	let n = (&mut *input)
		.take(MAX_FRAME_LEN as u64 + 1)
		.read_line(&mut line)
		.await?;
	if n == 0 {
		return Ok(None);
	}
	// The cap excludes the line terminator, so trim before measuring.
	let payload = line.trim_end_matches(['\r', '\n']);
	if payload.len() > MAX_FRAME_LEN {
		return Err(CodecError::FrameTooLong);
	}
	let frame = serde_json::from_str(payload)?;
	Ok(Some(frame))
}

/// Writes one frame to `output`, newline-terminated, and flushes.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if the frame fails to serialize,
/// [`CodecError::Io`] on stream failure.
pub async fn write_frame<T, W>(output: &mut W, frame: &T) -> Result<(), CodecError>
where
	T: Serialize,
	W: AsyncWrite + Unpin,
{
	let mut buf = serde_json::to_vec(frame)?;
	buf.push(b'\n');
	output.write_all(&buf).await?;
	output.flush().await?;
	Ok(())
}

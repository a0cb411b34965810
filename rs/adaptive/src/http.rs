//! Seams toward the connection layer.
//!
//! The core never opens sockets. It asks an [ConnectionManager] for a [ChunkSource] per
//! segment URL and reads from it synchronously; timeouts, pooling, retries and actual
//! transfer strategy are the manager's business.

use bytes::Bytes;

use crate::playlist::Id;

/// What a chunk is for, so the connection layer can prioritize or route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
	Init,
	Index,
	Media,
	Playlist,
	Key,
}

/// An inclusive byte range of an HTTP resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BytesRange {
	pub start: u64,
	pub end: u64,
}

impl BytesRange {
	pub fn new(start: u64, end: u64) -> Self {
		Self { start, end }
	}
}

/// The terminal status of a chunk request.
///
/// Transient failures surface here; the consumer retries at its own cadence, the tracker
/// just moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
	Success,
	Redirection,
	Unauthorized,
	NotFound,
	GenericError,
}

/// One opened source of chunk bytes, usually an HTTP response body.
///
/// Reads may block; the tracker treats them as its only suspension points.
pub trait ChunkSource {
	/// The Content-Type the server declared, if any.
	fn content_type(&self) -> Option<String>;

	fn request_status(&self) -> RequestStatus;

	/// Read whatever is available next, or `None` at end of stream.
	fn read_block(&mut self) -> Option<Bytes>;

	/// Read up to `size` bytes.
	fn read(&mut self, size: usize) -> Option<Bytes>;

	fn has_more_data(&self) -> bool;

	fn bytes_read(&self) -> usize;
}

/// Opens chunk sources by URL.
///
/// Implementations own all connection state and may prefetch, multiplex or recycle
/// connections behind this surface.
pub trait ConnectionManager {
	fn make_source(
		&self,
		uri: &str,
		rep_id: &Id,
		chunk_type: ChunkType,
		range: Option<BytesRange>,
	) -> Option<Box<dyn ChunkSource>>;

	/// Kick off the transfer, if the implementation separates open from start.
	fn start(&self, _source: &mut dyn ChunkSource) {}

	/// Abort an in-flight transfer, e.g. on seek.
	fn cancel(&self, _source: &mut dyn ChunkSource) {}

	/// Hand a finished source back for connection reuse.
	fn recycle(&self, _source: Box<dyn ChunkSource>) {}

	fn close_all_connections(&self) {}
}

use std::sync::Arc;

use bytes::Bytes;

use crate::http::{ChunkSource, RequestStatus};
use crate::playlist::Segment;
use crate::{CommonEncryption, StreamFormat};

/// How many leading bytes the tracker peeks to sniff a container format.
pub const FORMAT_PROBE_SIZE: usize = 16;

/// What the demuxer side of the pipeline sees: a readable chunk of one segment.
pub trait ChunkInterface {
	fn content_type(&self) -> Option<String>;
	fn request_status(&self) -> RequestStatus;
	fn read_block(&mut self) -> Option<Bytes>;
	fn read(&mut self, size: usize) -> Option<Bytes>;
	/// Look at upcoming bytes without consuming them. May return fewer than requested.
	fn peek(&mut self, size: usize) -> &[u8];
	fn has_more_data(&self) -> bool;
	fn bytes_read(&self) -> usize;
	/// Whether this chunk sits just after an authored discontinuity.
	fn discontinuity(&self) -> bool;
	fn stream_format(&self) -> StreamFormat;
	fn set_stream_format(&mut self, format: StreamFormat);
}

/// A chunk bound to its segment.
///
/// Holds an [`Arc`] on the segment for its whole lifetime, so live-window pruning can
/// never free bytes an in-flight read still addresses. Peeked bytes are buffered and
/// replayed on the next read, which is how format probing avoids consuming the stream.
pub struct SegmentChunk {
	source: Box<dyn ChunkSource>,
	segment: Arc<Segment>,
	format: StreamFormat,
	peeked: Vec<u8>,
}

impl SegmentChunk {
	pub fn new(source: Box<dyn ChunkSource>, segment: Arc<Segment>, format: StreamFormat) -> Self {
		Self {
			source,
			segment,
			format,
			peeked: Vec::new(),
		}
	}

	pub fn segment(&self) -> &Arc<Segment> {
		&self.segment
	}

	/// The decryption descriptor attached to the segment, for the consumer's DRM session.
	pub fn encryption(&self) -> Option<&CommonEncryption> {
		self.segment.encryption.as_ref()
	}

	/// Sniff the container format from the first bytes without consuming them.
	pub fn probe_format(&mut self) -> StreamFormat {
		StreamFormat::probe(self.peek(FORMAT_PROBE_SIZE))
	}
}

impl ChunkInterface for SegmentChunk {
	fn content_type(&self) -> Option<String> {
		self.source.content_type()
	}

	fn request_status(&self) -> RequestStatus {
		self.source.request_status()
	}

	fn read_block(&mut self) -> Option<Bytes> {
		if !self.peeked.is_empty() {
			return Some(Bytes::from(std::mem::take(&mut self.peeked)));
		}
		self.source.read_block()
	}

	fn read(&mut self, size: usize) -> Option<Bytes> {
		if !self.peeked.is_empty() {
			let take = size.min(self.peeked.len());
			let rest = self.peeked.split_off(take);
			let out = Bytes::from(std::mem::replace(&mut self.peeked, rest));
			return Some(out);
		}
		self.source.read(size)
	}

	fn peek(&mut self, size: usize) -> &[u8] {
		while self.peeked.len() < size && self.source.has_more_data() {
			match self.source.read(size - self.peeked.len()) {
				Some(block) if !block.is_empty() => self.peeked.extend_from_slice(&block),
				_ => break,
			}
		}
		let end = size.min(self.peeked.len());
		&self.peeked[..end]
	}

	fn has_more_data(&self) -> bool {
		!self.peeked.is_empty() || self.source.has_more_data()
	}

	fn bytes_read(&self) -> usize {
		// Peeked bytes haven't been delivered downstream yet.
		self.source.bytes_read() - self.peeked.len()
	}

	fn discontinuity(&self) -> bool {
		self.segment.discontinuity
	}

	fn stream_format(&self) -> StreamFormat {
		self.format
	}

	fn set_stream_format(&mut self, format: StreamFormat) {
		self.format = format;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct StaticSource {
		data: Vec<u8>,
		offset: usize,
	}

	impl StaticSource {
		fn new(data: &[u8]) -> Box<dyn ChunkSource> {
			Box::new(Self {
				data: data.to_vec(),
				offset: 0,
			})
		}
	}

	impl ChunkSource for StaticSource {
		fn content_type(&self) -> Option<String> {
			Some("audio/aac".to_string())
		}

		fn request_status(&self) -> RequestStatus {
			RequestStatus::Success
		}

		fn read_block(&mut self) -> Option<Bytes> {
			self.read(self.data.len() - self.offset)
		}

		fn read(&mut self, size: usize) -> Option<Bytes> {
			let remain = self.data.len() - self.offset;
			if remain == 0 {
				return None;
			}
			let take = size.min(remain);
			let out = Bytes::copy_from_slice(&self.data[self.offset..self.offset + take]);
			self.offset += take;
			Some(out)
		}

		fn has_more_data(&self) -> bool {
			self.offset < self.data.len()
		}

		fn bytes_read(&self) -> usize {
			self.offset
		}
	}

	fn chunk(data: &[u8]) -> SegmentChunk {
		SegmentChunk::new(
			StaticSource::new(data),
			Arc::new(Segment::media("sample/aac")),
			StreamFormat::Unknown,
		)
	}

	#[test]
	fn peek_does_not_consume() {
		let mut chunk = chunk(&[0xFF, 0xF1, 0x00, 0x00, 0xAA, 0xBB]);

		assert_eq!(chunk.peek(4), &[0xFF, 0xF1, 0x00, 0x00]);
		assert_eq!(chunk.probe_format(), StreamFormat::PackedAac);
		assert_eq!(chunk.bytes_read(), 0);

		// The peeked bytes replay in order.
		let all: Vec<u8> = std::iter::from_fn(|| chunk.read_block()).flatten().collect();
		assert_eq!(all, vec![0xFF, 0xF1, 0x00, 0x00, 0xAA, 0xBB]);
		assert!(!chunk.has_more_data());
	}

	#[test]
	fn short_sources_peek_what_exists() {
		let mut chunk = chunk(&[0x0B, 0x77]);
		assert_eq!(chunk.peek(16), &[0x0B, 0x77]);
		assert_eq!(chunk.probe_format(), StreamFormat::PackedAc3);
	}

	#[test]
	fn read_drains_peek_buffer_first() {
		let mut chunk = chunk(&[1, 2, 3, 4, 5]);
		chunk.peek(4);
		assert_eq!(chunk.read(2).unwrap().as_ref(), &[1, 2]);
		assert_eq!(chunk.read(2).unwrap().as_ref(), &[3, 4]);
		assert_eq!(chunk.read(2).unwrap().as_ref(), &[5]);
		assert!(chunk.read(2).is_none());
	}
}

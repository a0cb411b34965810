use std::sync::Arc;

use crate::http::BytesRange;
use crate::playlist::Url;
use crate::{CommonEncryption, Stime, Ticks};

/// The sequence number marking an unset or unreachable position.
pub const SEQUENCE_INVALID: u64 = u64::MAX;

/// What a segment carries.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
	#[default]
	Media,
	Init,
	Index,
	/// A byte range inside a parent media segment, discovered from a container index.
	Sub,
}

/// One independently fetchable HTTP resource (or byte range) of media or metadata.
///
/// Segments are shared between the playlist and in-flight chunks through [`Arc`]; a
/// segment pruned from its list stays alive for as long as a chunk still reads from it.
#[derive(Debug, Default, Clone)]
pub struct Segment {
	pub kind: SegmentKind,
	pub source_url: Url,
	/// Scaled start time, in units of the inherited timescale.
	pub start_time: Stime,
	/// Scaled duration.
	pub duration: Stime,
	pub sequence: u64,
	pub discontinuity_sequence: u64,
	/// Wall-clock presentation time, when the manifest carried one (HLS program date).
	pub display_time: Option<Ticks>,
	pub range: Option<BytesRange>,
	/// An authored cue that continuity may not hold across this boundary.
	pub discontinuity: bool,
	/// Whether the URL needs `$...$` substitution at emission time.
	pub templated: bool,
	pub encryption: Option<CommonEncryption>,
	sub_segments: Vec<Arc<Segment>>,
}

impl Segment {
	pub fn new(kind: SegmentKind) -> Self {
		Self {
			kind,
			..Self::default()
		}
	}

	pub fn media(url: impl Into<String>) -> Self {
		Self {
			kind: SegmentKind::Media,
			source_url: Url::new(url),
			..Self::default()
		}
	}

	pub fn init(url: impl Into<String>) -> Self {
		Self {
			kind: SegmentKind::Init,
			source_url: Url::new(url),
			..Self::default()
		}
	}

	pub fn index(url: impl Into<String>) -> Self {
		Self {
			kind: SegmentKind::Index,
			source_url: Url::new(url),
			..Self::default()
		}
	}

	pub fn sequence_number(&self) -> u64 {
		self.sequence
	}

	pub fn is_template(&self) -> bool {
		self.templated
	}

	/// The first byte of this segment within its resource.
	pub fn offset(&self) -> u64 {
		self.range.map(|r| r.start).unwrap_or(0)
	}

	/// Whether `byte` falls inside this segment's byte range.
	///
	/// A range with `end == 0` is open ended; a segment without a range contains nothing.
	pub fn contains(&self, byte: u64) -> bool {
		let Some(range) = self.range else {
			return false;
		};
		if range.start == 0 && range.end == 0 {
			return false;
		}
		byte >= range.start && (range.end == 0 || byte <= range.end)
	}

	pub fn sub_segments(&self) -> &[Arc<Segment>] {
		&self.sub_segments
	}

	pub fn add_sub_segment(&mut self, mut sub: Segment) {
		sub.kind = SegmentKind::Sub;
		sub.sequence = self.sub_segments.len() as u64;
		self.sub_segments.push(Arc::new(sub));
	}
}

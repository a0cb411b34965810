use std::sync::Arc;

use crate::http::BytesRange;
use crate::playlist::{find_segment_number_by_scaled_time, AttrsTree, NodeId, Segment, SegmentKind};
use crate::{Ticks, Timescale};

/// A subsegment boundary read from a container index (SIDX, tfra).
#[derive(Debug, Clone, Copy)]
pub struct SplitPoint {
	/// Byte offset of the subsegment start within the container.
	pub offset: u64,
	pub time: Ticks,
	pub duration: Ticks,
}

/// The single-container addressing scheme: one media resource whose subsegments are byte
/// ranges discovered from the container's own index.
#[derive(Debug)]
pub struct SegmentBase {
	media: Arc<Segment>,
	pub init_segment: Option<Arc<Segment>>,
	pub index_segment: Option<Arc<Segment>>,
}

impl SegmentBase {
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			media: Arc::new(Segment::media(url)),
			init_segment: None,
			index_segment: None,
		}
	}

	pub fn media(&self) -> &Arc<Segment> {
		&self.media
	}

	pub fn sub_segments(&self) -> &[Arc<Segment>] {
		self.media.sub_segments()
	}

	pub fn media_segment(&self, position: u64) -> Option<Arc<Segment>> {
		self.media.sub_segments().get(position as usize).cloned()
	}

	pub fn sequence_number(&self) -> u64 {
		self.media.sequence_number()
	}

	pub fn set_byte_range(&mut self, start: u64, end: u64) {
		Arc::make_mut(&mut self.media).range = Some(BytesRange::new(start, end));
	}

	pub fn set_media_duration(&mut self, duration: crate::Stime) {
		Arc::make_mut(&mut self.media).duration = duration;
	}

	/// Build subsegments from external index split points.
	///
	/// Each subsegment's byte range must land inside the container's known range; without
	/// one nothing is created. The final subsegment is open ended.
	pub fn split_using_index(&mut self, splits: &[SplitPoint], timescale: Timescale) {
		let Some(last) = splits.last() else {
			return;
		};
		let media = Arc::make_mut(&mut self.media);

		let mut prev_offset = 0u64;
		let mut prev_time = 0;
		for (i, split) in splits.iter().enumerate() {
			if i > 0 {
				let duration = timescale.to_scaled(split.duration);
				insert_sub_segment(media, prev_offset, split.offset.saturating_sub(1), prev_time, duration);
			}
			prev_offset = split.offset;
			prev_time = timescale.to_scaled(split.time);
		}

		let duration = timescale.to_scaled(last.duration);
		insert_sub_segment(media, prev_offset, 0, prev_time, duration);
	}
}

fn insert_sub_segment(media: &mut Segment, start: u64, end: u64, time: crate::Stime, duration: crate::Stime) {
	if media.range.is_none() {
		return;
	}
	if end != 0 && !media.contains(end) {
		return;
	}
	let mut sub = Segment::new(SegmentKind::Sub);
	sub.source_url = media.source_url.clone();
	sub.range = Some(BytesRange::new(start, end));
	sub.start_time = time;
	sub.duration = duration;
	media.add_sub_segment(sub);
}

impl AttrsTree {
	pub fn base_segment_number_by_time(&self, base_id: NodeId, time: Ticks) -> Option<u64> {
		let timescale = self.inherit_timescale(base_id);
		if !timescale.is_valid() {
			return None;
		}
		let base = self.base(base_id)?;
		find_segment_number_by_scaled_time(base.sub_segments(), timescale.to_scaled(time))
	}

	pub fn base_playback_time_duration(&self, base_id: NodeId, number: u64) -> Option<(Ticks, Ticks)> {
		let timescale = self.inherit_timescale(base_id);
		let segment = self.base(base_id)?.media_segment(number)?;
		Some((timescale.to_time(segment.start_time), timescale.to_time(segment.duration)))
	}

	/// Total duration of the subsegments after `current`.
	pub fn base_min_ahead_time(&self, base_id: NodeId, current: u64) -> Ticks {
		let Some(base) = self.base(base_id) else {
			return Ticks::ZERO;
		};
		let subs = base.sub_segments();
		if subs.is_empty() || current as usize >= subs.len() - 1 {
			return Ticks::ZERO;
		}
		let timescale = self.inherit_timescale(base_id);
		if !timescale.is_valid() {
			return Ticks::ZERO;
		}
		let ahead: crate::Stime = subs[current as usize + 1..].iter().map(|seg| seg.duration).sum();
		timescale.to_time(ahead)
	}

	pub fn base_split_using_index(&mut self, base_id: NodeId, splits: &[SplitPoint]) {
		let timescale = self.inherit_timescale(base_id);
		if let Some(base) = self.base_mut(base_id) {
			base.split_using_index(splits, timescale);
		}
	}
}

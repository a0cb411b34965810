use std::sync::Arc;

use crate::playlist::{AttrsTree, NodeId, Segment, SEQUENCE_INVALID};
use crate::{Stime, Ticks};

/// An explicit ordered list of segments, the addressing scheme of HLS media playlists and
/// DASH `<SegmentList>`.
///
/// Sorted by sequence number, with a cached total duration in scaled units and a rolling
/// `pruned` watermark for live windows.
#[derive(Debug, Default)]
pub struct SegmentList {
	segments: Vec<Arc<Segment>>,
	total_length: Stime,
	/// HLS-style lists restamp media times relative to the window on update.
	relative_media_times: bool,
	pruned: u64,
	pub init_segment: Option<Arc<Segment>>,
	pub index_segment: Option<Arc<Segment>>,
}

impl SegmentList {
	pub fn new(relative_media_times: bool) -> Self {
		Self {
			relative_media_times,
			..Self::default()
		}
	}

	pub fn segments(&self) -> &[Arc<Segment>] {
		&self.segments
	}

	pub fn has_relative_media_times(&self) -> bool {
		self.relative_media_times
	}

	/// The watermark below which segments have been pruned away.
	pub fn pruned(&self) -> u64 {
		self.pruned
	}

	pub fn add_segment(&mut self, segment: Segment) {
		self.push(Arc::new(segment));
	}

	fn push(&mut self, segment: Arc<Segment>) {
		self.total_length += segment.duration;
		self.segments.push(segment);
	}

	/// Total scaled duration of the held segments.
	pub fn total_length(&self) -> Stime {
		self.total_length
	}

	/// Drop every segment numbered below `number`.
	///
	/// In-flight chunks keep their own handle on a dropped segment, so nothing they read
	/// from disappears under them.
	pub fn prune_by_segment_number(&mut self, number: u64) {
		let mut removed = 0;
		for segment in &self.segments {
			if segment.sequence_number() >= number {
				break;
			}
			self.total_length -= segment.duration;
			removed += 1;
		}
		self.segments.drain(..removed);

		let watermark = match self.segments.first() {
			Some(first) => number.min(first.sequence_number()),
			None => number,
		};
		self.pruned = self.pruned.max(watermark);
	}

	/// Fuse a refreshed list into this one.
	///
	/// Relative media times (HLS) keep the local list and rebase fresh segments onto the
	/// current tail, filling numbering gaps with `inherited_duration` per missing
	/// segment; an update that prunes down to nothing is a no-op. Absolute times replace
	/// the list wholesale.
	pub fn update_with(&mut self, mut updated: SegmentList, inherited_duration: Stime) {
		if updated.segments.is_empty() {
			return;
		}

		if !self.relative_media_times || self.segments.is_empty() {
			self.segments.clear();
			self.total_length = 0;
			for segment in updated.segments.drain(..) {
				self.push(segment);
			}
			return;
		}

		let tail = self.segments.last().unwrap();
		let tail_sequence = tail.sequence_number();
		let mut prev_end = tail.start_time + tail.duration;
		let mut prev_sequence = tail_sequence;
		let oldest = updated.segments.first().unwrap().sequence_number();

		// Filter out segments we already hold.
		updated.prune_by_segment_number(tail_sequence + 1);
		if updated.segments.is_empty() {
			return;
		}

		for mut segment in updated.segments.drain(..) {
			let seg = Arc::make_mut(&mut segment);
			seg.start_time = prev_end;
			if seg.sequence_number() != prev_sequence + 1 {
				// Not continuous: account a full inherited duration per missing number.
				let gap = seg.sequence_number() - prev_sequence - 1;
				seg.start_time += inherited_duration * gap as Stime;
			}
			prev_sequence = seg.sequence_number();
			prev_end = seg.start_time + seg.duration;
			self.push(segment);
		}

		// Roll the window forward to the update's start.
		self.prune_by_segment_number(oldest);
	}
}

/// Locate the last segment whose start time is at or before a scaled time.
///
/// Lists whose segments carry no start times (beyond the first) cannot answer.
pub(crate) fn find_segment_number_by_scaled_time(segments: &[Arc<Segment>], time: Stime) -> Option<u64> {
	if segments.is_empty() || (segments.len() > 1 && segments[1].start_time == 0) {
		return None;
	}

	let mut found = None;
	for segment in segments {
		if segment.start_time > time {
			break;
		}
		found = Some(segment.sequence_number());
	}
	found
}

impl AttrsTree {
	pub fn list_media_segment(&self, list_id: NodeId, number: u64) -> Option<Arc<Segment>> {
		let list = self.list(list_id)?;

		// A timeline (when inherited) maps sequence numbers to list positions.
		if let Some(tl_id) = self.inherit_timeline(list_id) {
			let index = self.timeline(tl_id)?.element_index_by_sequence(number);
			return list.segments().get(index as usize).cloned();
		}

		for segment in list.segments() {
			if segment.sequence_number() == number {
				return Some(segment.clone());
			}
			if segment.sequence_number() > number {
				break;
			}
		}
		None
	}

	/// The wanted segment, or the next one in sequence when the exact number is gone.
	pub fn list_next_media_segment(&self, list_id: NodeId, position: u64) -> Option<(Arc<Segment>, u64, bool)> {
		let list = self.list(list_id)?;

		if let Some(tl_id) = self.inherit_timeline(list_id) {
			let index = self.timeline(tl_id)?.element_index_by_sequence(position);
			let segment = list.segments().get(index as usize).cloned()?;
			return Some((segment, position, false));
		}

		for segment in list.segments() {
			if segment.sequence_number() >= position {
				let newpos = segment.sequence_number();
				return Some((segment.clone(), newpos, newpos != position));
			}
		}
		None
	}

	pub fn list_start_segment_number(&self, list_id: NodeId) -> u64 {
		if let Some(tl_id) = self.inherit_timeline(list_id) {
			if let Some(timeline) = self.timeline(tl_id) {
				return timeline.min_element_number();
			}
		}
		let list = match self.list(list_id) {
			Some(list) => list,
			None => return SEQUENCE_INVALID,
		};
		match list.segments().first() {
			Some(first) => first.sequence_number(),
			None => self.inherit_start_number(list_id).unwrap_or(SEQUENCE_INVALID),
		}
	}

	pub fn list_segment_number_by_time(&self, list_id: NodeId, time: Ticks) -> Option<u64> {
		if let Some(tl_id) = self.inherit_timeline(list_id) {
			let timeline = self.timeline(tl_id)?;
			let timescale = self.inherit_timescale(tl_id);
			return Some(timeline.element_number_by_scaled_time(timescale.to_scaled(time)));
		}

		let timescale = self.inherit_timescale(list_id);
		if !timescale.is_valid() {
			return None;
		}
		find_segment_number_by_scaled_time(self.list(list_id)?.segments(), timescale.to_scaled(time))
	}

	pub fn list_playback_time_duration(&self, list_id: NodeId, number: u64) -> Option<(Ticks, Ticks)> {
		if number == SEQUENCE_INVALID {
			return None;
		}

		if let Some(tl_id) = self.inherit_timeline(list_id) {
			let timeline = self.timeline(tl_id)?;
			let timescale = self.inherit_timescale(tl_id);
			let (time, duration) = timeline.scaled_time_duration_by_number(number);
			return Some((timescale.to_time(time), timescale.to_time(duration)));
		}

		let timescale = self.inherit_timescale(list_id);
		let list = self.list(list_id)?;
		let first = list.segments().first()?;
		if first.sequence_number() > number {
			return None;
		}

		let mut time = first.start_time;
		for segment in list.segments() {
			let duration = match segment.duration {
				0 => self.inherit_duration(list_id),
				d => d,
			};
			// Assuming no discontinuity in sequence.
			if segment.sequence_number() == number {
				return Some((timescale.to_time(time), timescale.to_time(duration)));
			}
			time += duration;
		}
		None
	}

	pub fn list_min_ahead_time(&self, list_id: NodeId, current: u64) -> Ticks {
		if let Some(tl_id) = self.inherit_timeline(list_id) {
			if let Some(timeline) = self.timeline(tl_id) {
				let timescale = self.inherit_timescale(tl_id);
				return timescale.to_time(timeline.min_ahead_scaled_time(current));
			}
		}

		let timescale = self.inherit_timescale(list_id);
		let Some(list) = self.list(list_id) else {
			return Ticks::ZERO;
		};
		let mut ahead = Ticks::ZERO;
		for segment in list.segments() {
			if segment.sequence_number() > current {
				ahead += timescale.to_time(segment.duration);
			}
		}
		ahead
	}

	pub fn list_total_length(&self, list_id: NodeId) -> Stime {
		if let Some(tl_id) = self.inherit_timeline(list_id) {
			if let Some(timeline) = self.timeline(tl_id) {
				return timeline.total_length();
			}
		}
		self.list(list_id).map(|list| list.total_length()).unwrap_or(0)
	}

	pub fn list_update_with(&mut self, list_id: NodeId, updated: SegmentList) {
		let inherited_duration = self.inherit_duration(list_id);
		if let Some(list) = self.list_mut(list_id) {
			list.update_with(updated, inherited_duration);
		}
	}

	pub fn list_prune_by_playback_time(&mut self, list_id: NodeId, time: Ticks) {
		let timescale = self.inherit_timescale(list_id);
		let number = match self.list(list_id) {
			Some(list) => find_segment_number_by_scaled_time(list.segments(), timescale.to_scaled(time)),
			None => None,
		};
		if let Some(number) = number {
			if let Some(list) = self.list_mut(list_id) {
				list.prune_by_segment_number(number);
			}
		}
	}
}

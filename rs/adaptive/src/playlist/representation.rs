use std::sync::Arc;

use crate::playlist::{
	AttrKind, Id, NodeId, Playlist, RepAddr, Segment, SegmentList, SegmentTimeline, Url, SEQUENCE_INVALID,
};
use crate::{CommonEncryption, Result, SharedResources, Stime, StreamFormat, Ticks};

/// Lazy-load hook installed by the parser on representations whose segment addressing is
/// fetched on demand (HLS media playlists, expiring DASH manifests).
///
/// The updater fetches and parses; the core merges the result into the tree under the
/// playlist-wide lock. This keeps network formats out of the core entirely.
pub trait RepresentationUpdater: Send {
	/// Whether the local window has expired for the given cursor position.
	fn needs_update(&self, number: u64) -> bool;

	/// Fetch and parse the refreshed addressing data. `Ok(None)` means nothing changed.
	fn fetch_update(&mut self, resources: &SharedResources) -> Result<Option<RepresentationUpdate>>;

	/// Adjust the re-check deadline: back off after a productive update, tighten near the
	/// live edge.
	fn schedule_next_update(&mut self, _number: u64, _was_updated: bool) {}
}

/// The outcome of a representation refresh, merged by the core.
#[derive(Default)]
pub struct RepresentationUpdate {
	pub list: Option<SegmentList>,
	pub timeline: Option<SegmentTimeline>,
	/// Playback time below which merged timeline entries can be dropped.
	pub prune_barrier: Option<Ticks>,
}

/// One encoding variant within an adaptation set.
pub struct Representation {
	pub(crate) node: NodeId,
	pub id: Id,
	/// Bits per second this representation requires.
	pub bandwidth: u64,
	pub codecs: Vec<String>,
	/// Whether segment numbers line up with sibling representations; when false, switches
	/// translate the cursor through playback time instead.
	pub consistent_segment_number: bool,
	/// The container format the manifest declared, if any.
	pub stream_format: StreamFormat,
	pub width: Option<u32>,
	pub height: Option<u32>,
	pub frame_rate: Option<f64>,
	pub base_url: Option<Url>,
	pub encryption: Option<CommonEncryption>,
	pub(crate) updater: Option<Box<dyn RepresentationUpdater>>,
}

impl Representation {
	pub(crate) fn new(node: NodeId) -> Self {
		Self {
			node,
			id: Id::default(),
			bandwidth: 0,
			codecs: Vec::new(),
			consistent_segment_number: true,
			stream_format: StreamFormat::Unknown,
			width: None,
			height: None,
			frame_rate: None,
			base_url: None,
			encryption: None,
			updater: None,
		}
	}

	pub fn node(&self) -> NodeId {
		self.node
	}

	/// Split a comma-separated codecs attribute into tokens.
	pub fn add_codecs(&mut self, codecs: &str) {
		for token in codecs.split(',') {
			let token = token.trim();
			if !token.is_empty() {
				self.codecs.push(token.to_string());
			}
		}
	}

	pub fn set_updater(&mut self, updater: Box<dyn RepresentationUpdater>) {
		self.updater = Some(updater);
	}
}

/// The addressing scheme effective for a representation after inheritance.
///
/// Deepest node wins; at equal depth a template shadows a list shadows a base.
#[derive(Debug, Clone, Copy)]
pub(crate) enum SchemeRef {
	Template(NodeId),
	List(NodeId),
	Base(NodeId),
}

impl Playlist {
	pub(crate) fn effective_scheme(&self, rep: RepAddr) -> Option<SchemeRef> {
		let mut node = Some(self.representation(rep)?.node);
		while let Some(current) = node {
			if let Some(id) = self.tree.get_attr(current, AttrKind::SegmentTemplate) {
				return Some(SchemeRef::Template(id));
			}
			if let Some(id) = self.tree.get_attr(current, AttrKind::SegmentList) {
				return Some(SchemeRef::List(id));
			}
			if let Some(id) = self.tree.get_attr(current, AttrKind::SegmentBase) {
				return Some(SchemeRef::Base(id));
			}
			node = self.tree.parent(current);
		}
		None
	}

	/// The singleton init segment, if any level of the tree supplies one.
	pub fn init_segment(&self, rep: RepAddr) -> Option<Arc<Segment>> {
		let mut node = Some(self.representation(rep)?.node);
		while let Some(current) = node {
			if let Some(id) = self.tree.get_attr(current, AttrKind::SegmentBase) {
				if let Some(init) = self.tree.base(id).and_then(|b| b.init_segment.clone()) {
					return Some(init);
				}
			}
			if let Some(id) = self.tree.get_attr(current, AttrKind::SegmentList) {
				if let Some(init) = self.tree.list(id).and_then(|l| l.init_segment.clone()) {
					return Some(init);
				}
			}
			if let Some(id) = self.tree.get_attr(current, AttrKind::SegmentTemplate) {
				if let Some(init) = self.tree.template(id).and_then(|t| t.init_segment.clone()) {
					return Some(init);
				}
			}
			node = self.tree.parent(current);
		}
		None
	}

	/// The singleton index segment; templates have none.
	pub fn index_segment(&self, rep: RepAddr) -> Option<Arc<Segment>> {
		let mut node = Some(self.representation(rep)?.node);
		while let Some(current) = node {
			if let Some(id) = self.tree.get_attr(current, AttrKind::SegmentBase) {
				if let Some(index) = self.tree.base(id).and_then(|b| b.index_segment.clone()) {
					return Some(index);
				}
			}
			if let Some(id) = self.tree.get_attr(current, AttrKind::SegmentList) {
				if let Some(index) = self.tree.list(id).and_then(|l| l.index_segment.clone()) {
					return Some(index);
				}
			}
			node = self.tree.parent(current);
		}
		None
	}

	pub fn needs_index(&self, rep: RepAddr) -> bool {
		self.index_segment(rep).is_some()
	}

	pub fn media_segment(&self, rep: RepAddr, number: u64) -> Option<Arc<Segment>> {
		match self.effective_scheme(rep)? {
			SchemeRef::Template(id) => self.tree.template_media_segment(id, number),
			SchemeRef::List(id) => self.tree.list_media_segment(id, number),
			SchemeRef::Base(id) => self.tree.base(id)?.media_segment(number),
		}
	}

	/// The wanted media segment, or the next available one.
	///
	/// The returned number is the position actually served; a `true` gap flag reports
	/// that the wanted number fell out of the window and the cursor was clamped forward.
	pub fn next_media_segment(&self, rep: RepAddr, position: u64) -> Option<(Arc<Segment>, u64, bool)> {
		match self.effective_scheme(rep)? {
			SchemeRef::Template(id) => {
				let newpos = match self.tree.inherit_timeline(id).and_then(|tl| self.tree.timeline(tl)) {
					Some(timeline) if !timeline.is_empty() => {
						if timeline.max_element_number() < position {
							return None;
						}
						position.max(timeline.min_element_number())
					}
					_ => {
						// Bound a VOD template by the period or playlist duration.
						let start_number = self.tree.inherit_start_number(id)?;
						if !self.is_live {
							let timescale = self.tree.inherit_timescale(id);
							let segment_duration = self.tree.inherit_duration(id);
							let total = self
								.period_of(rep)
								.and_then(|p| p.duration)
								.or(self.duration)
								.unwrap_or(Ticks::ZERO);
							if !total.is_zero() && segment_duration > 0 {
								let scaled_total = timescale.to_scaled(total);
								let endnum =
									start_number + ((scaled_total + segment_duration - 1) / segment_duration) as u64;
								if position >= endnum {
									return None;
								}
							}
						}
						position.max(start_number)
					}
				};
				let segment = self.tree.template_media_segment(id, newpos)?;
				Some((segment, newpos, newpos != position))
			}
			SchemeRef::List(id) => self.tree.list_next_media_segment(id, position),
			SchemeRef::Base(id) => {
				let segment = self.tree.base(id)?.media_segment(position)?;
				Some((segment, position, false))
			}
		}
	}

	/// Map a playback time to the segment number holding it.
	pub fn segment_number_by_time(&self, rep: RepAddr, time: Ticks) -> Option<u64> {
		match self.effective_scheme(rep)? {
			SchemeRef::Template(id) => {
				if let Some(tl_id) = self.tree.inherit_timeline(id) {
					let timeline = self.tree.timeline(tl_id)?;
					let timescale = self.tree.inherit_timescale(tl_id);
					return Some(timeline.element_number_by_scaled_time(timescale.to_scaled(time)));
				}

				let duration = self.tree.inherit_duration(id);
				if duration == 0 {
					return None;
				}

				if self.is_live {
					let now = Ticks::now_wall();
					let ast = self.availability_start_time?;
					if !ast.is_zero() && time >= ast && time < now {
						Some(self.live_template_number(rep, id, time, true))
					} else if !ast.is_zero() && now - ast > time {
						Some(self.live_template_number(rep, id, time, false))
					} else {
						None
					}
				} else {
					let timescale = self.tree.inherit_timescale(id);
					let start_number = self.tree.inherit_start_number(id)?;
					Some(start_number + (timescale.to_scaled(time) / duration) as u64)
				}
			}
			SchemeRef::List(id) => self.tree.list_segment_number_by_time(id, time),
			SchemeRef::Base(id) => self.tree.base_segment_number_by_time(id, time),
		}
	}

	/// Playback time and duration of a segment number.
	pub fn playback_time_duration(&self, rep: RepAddr, number: u64) -> Option<(Ticks, Ticks)> {
		if number == SEQUENCE_INVALID {
			return None;
		}
		match self.effective_scheme(rep)? {
			SchemeRef::Template(id) => self.tree.template_playback_time_duration(id, number),
			SchemeRef::List(id) => self.tree.list_playback_time_duration(id, number),
			SchemeRef::Base(id) => self.tree.base_playback_time_duration(id, number),
		}
	}

	/// How much playable time sits after the given segment number.
	pub fn min_ahead_time(&self, rep: RepAddr, number: u64) -> Ticks {
		match self.effective_scheme(rep) {
			Some(SchemeRef::Template(id)) => {
				let timescale = self.tree.inherit_timescale(id);
				match self.tree.inherit_timeline(id).and_then(|tl| self.tree.timeline(tl)) {
					Some(timeline) => timescale.to_time(timeline.min_ahead_scaled_time(number)),
					None => {
						let current = self.live_template_number(rep, id, Ticks::now_wall(), true);
						let duration = self.tree.inherit_duration(id);
						timescale.to_time(current.saturating_sub(number) as Stime * duration)
					}
				}
			}
			Some(SchemeRef::List(id)) => self.tree.list_min_ahead_time(id, number),
			Some(SchemeRef::Base(id)) => self.tree.base_min_ahead_time(id, number),
			None => Ticks::ZERO,
		}
	}

	/// The playable range (begin, end, length) of the representation.
	pub fn media_playback_range(&self, rep: RepAddr) -> Option<(Ticks, Ticks, Ticks)> {
		match self.effective_scheme(rep)? {
			SchemeRef::Template(id) => {
				if let Some(timeline) = self.tree.inherit_timeline(id).and_then(|tl| self.tree.timeline(tl)) {
					if timeline.is_empty() {
						return None;
					}
					let timescale = self.tree.inherit_timescale(id);
					let (start, _) = timeline.scaled_time_duration_by_number(timeline.min_element_number());
					let (end, duration) = timeline.scaled_time_duration_by_number(timeline.max_element_number());
					return Some((
						timescale.to_time(start),
						timescale.to_time(end + duration),
						timescale.to_time(timeline.total_length()),
					));
				}
				if self.tree.inherit_duration(id) > 0 {
					let depth = self.time_shift_buffer_depth.unwrap_or(Ticks::ZERO);
					return Some((Ticks::ZERO - depth, Ticks::ZERO, depth));
				}
				None
			}
			SchemeRef::List(id) => {
				let list = self.tree.list(id)?;
				let first = list.segments().first()?;
				let last = list.segments().last()?;
				let timescale = self.tree.inherit_timescale(id);
				Some((
					timescale.to_time(first.start_time),
					timescale.to_time(last.start_time + last.duration),
					timescale.to_time(self.tree.list_total_length(id)),
				))
			}
			SchemeRef::Base(id) => {
				let base = self.tree.base(id)?;
				let first = base.sub_segments().first()?;
				let last = base.sub_segments().last()?;
				let timescale = self.tree.inherit_timescale(id);
				Some((
					timescale.to_time(first.start_time),
					timescale.to_time(last.start_time + last.duration),
					Ticks::ZERO,
				))
			}
		}
	}

	/// Convert a segment number between representations whose numbering differs, by
	/// mapping through playback time. `None` when the time falls outside the target's
	/// availability, in which case a switch must be refused.
	pub fn translate_segment_number(&self, number: u64, from: RepAddr, to: RepAddr) -> Option<u64> {
		let (time, _) = self.playback_time_duration(from, number)?;
		self.segment_number_by_time(to, time)
	}

	/// The live segment number for a wall or elapsed time on a duration-based template.
	///
	/// `precise` marks `time` as an absolute wall time, measured against the availability
	/// start; otherwise it is an already-elapsed offset. Either way the result clamps to
	/// the last completed segment, floored at the start number.
	pub fn live_template_number(&self, rep: RepAddr, template_id: NodeId, time: Ticks, precise: bool) -> u64 {
		let start_number = self.tree.inherit_start_number(template_id).unwrap_or(1);
		let duration = self.tree.inherit_duration(template_id);
		if duration == 0 {
			return start_number;
		}
		let timescale = self.tree.inherit_timescale(template_id);

		let elapsed = if precise {
			let mut stream_start = self.availability_start_time.unwrap_or(Ticks::ZERO);
			if let Some(period) = self.period_of(rep) {
				stream_start += period.start;
			}
			time - stream_start
		} else {
			time
		};

		let completed = timescale.to_scaled(elapsed) - duration;
		if completed > 0 {
			start_number + (completed / duration) as u64
		} else {
			start_number
		}
	}

	pub(crate) fn rep_timescale(&self, rep: RepAddr) -> crate::Timescale {
		match self.representation(rep) {
			Some(representation) => self.tree.inherit_timescale(representation.node),
			None => crate::Timescale::new(1),
		}
	}
}

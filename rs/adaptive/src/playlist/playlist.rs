use std::sync::Arc;

use tracing::{debug, warn};

use crate::http::{ChunkType, ConnectionManager};
use crate::playlist::{
	AdaptationSet, AttrKind, AttrPayload, AttrsTree, Id, NodeId, Period, Representation, Segment, SegmentKind,
	SegmentTimeline, TemplateContext, Url,
};
use crate::{CommonEncryption, Result, SegmentChunk, SharedResources, Ticks};

/// Address of an adaptation set within a playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SetAddr {
	pub period: usize,
	pub set: usize,
}

/// Address of a representation within a playlist.
///
/// Stable across manifest refreshes: updates merge in place, they never reorder the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RepAddr {
	pub period: usize,
	pub set: usize,
	pub rep: usize,
}

impl RepAddr {
	pub fn set_addr(&self) -> SetAddr {
		SetAddr {
			period: self.period,
			set: self.set,
		}
	}
}

impl SetAddr {
	pub fn rep(&self, rep: usize) -> RepAddr {
		RepAddr {
			period: self.period,
			set: self.set,
			rep,
		}
	}
}

/// The root of the model: global availability plus an ordered list of periods, all of it
/// bound to one attribute arena.
///
/// Built by a parser, read by trackers, and mutated only during manifest refresh behind a
/// playlist-wide lock the caller owns (typically `Arc<Mutex<Playlist>>`).
pub struct Playlist {
	pub(crate) tree: AttrsTree,
	root: NodeId,
	periods: Vec<Period>,

	pub is_live: bool,
	pub low_latency: bool,
	pub availability_start_time: Option<Ticks>,
	pub availability_end_time: Option<Ticks>,
	pub duration: Option<Ticks>,
	pub min_update_period: Option<Ticks>,
	pub time_shift_buffer_depth: Option<Ticks>,
	pub suggested_presentation_delay: Option<Ticks>,
	pub min_buffering: Option<Ticks>,
	pub max_buffering: Option<Ticks>,
	pub base_urls: Vec<Url>,
}

impl Default for Playlist {
	fn default() -> Self {
		Self::new()
	}
}

impl Playlist {
	pub fn new() -> Self {
		let mut tree = AttrsTree::new();
		let root = tree.add_node(AttrKind::Playlist, None);
		Self {
			tree,
			root,
			periods: Vec::new(),
			is_live: false,
			low_latency: false,
			availability_start_time: None,
			availability_end_time: None,
			duration: None,
			min_update_period: None,
			time_shift_buffer_depth: None,
			suggested_presentation_delay: None,
			min_buffering: None,
			max_buffering: None,
			base_urls: Vec::new(),
		}
	}

	pub fn root(&self) -> NodeId {
		self.root
	}

	pub fn tree(&self) -> &AttrsTree {
		&self.tree
	}

	pub fn tree_mut(&mut self) -> &mut AttrsTree {
		&mut self.tree
	}

	// Builder surface for parsers.

	pub fn add_period(&mut self) -> usize {
		let node = self.tree.add_node(AttrKind::SegmentInformation, Some(self.root));
		self.periods.push(Period::new(node));
		self.periods.len() - 1
	}

	pub fn add_adaptation_set(&mut self, period: usize) -> SetAddr {
		let parent = self.periods[period].node;
		let node = self.tree.add_node(AttrKind::SegmentInformation, Some(parent));
		let sets = &mut self.periods[period].sets;
		sets.push(AdaptationSet::new(node));
		SetAddr {
			period,
			set: sets.len() - 1,
		}
	}

	pub fn add_representation(&mut self, set: SetAddr) -> RepAddr {
		let parent = self.periods[set.period].sets[set.set].node;
		let node = self.tree.add_node(AttrKind::SegmentInformation, Some(parent));
		let reps = &mut self.periods[set.period].sets[set.set].representations;
		reps.push(Representation::new(node));
		set.rep(reps.len() - 1)
	}

	/// Attach a segment template to a node, with the default start number of one that the
	/// manifest may override.
	pub fn add_segment_template(&mut self, node: NodeId, template: crate::playlist::SegmentTemplate) -> NodeId {
		let id = self.tree.add_attr(node, AttrPayload::Template(template));
		self.tree.add_attr(id, AttrPayload::StartNumber(1));
		id
	}

	// Accessors.

	pub fn periods(&self) -> &[Period] {
		&self.periods
	}

	pub fn period(&self, index: usize) -> Option<&Period> {
		self.periods.get(index)
	}

	pub fn period_mut(&mut self, index: usize) -> Option<&mut Period> {
		self.periods.get_mut(index)
	}

	pub fn first_set(&self) -> Option<SetAddr> {
		self.periods
			.iter()
			.enumerate()
			.find(|(_, p)| !p.sets.is_empty())
			.map(|(period, _)| SetAddr { period, set: 0 })
	}

	pub fn adaptation_set(&self, addr: SetAddr) -> Option<&AdaptationSet> {
		self.periods.get(addr.period)?.sets.get(addr.set)
	}

	pub fn adaptation_set_mut(&mut self, addr: SetAddr) -> Option<&mut AdaptationSet> {
		self.periods.get_mut(addr.period)?.sets.get_mut(addr.set)
	}

	pub fn adaptation_set_by_id(&self, id: &Id) -> Option<SetAddr> {
		for (period, p) in self.periods.iter().enumerate() {
			for (set, s) in p.sets.iter().enumerate() {
				if &s.id == id {
					return Some(SetAddr { period, set });
				}
			}
		}
		None
	}

	pub fn representation(&self, addr: RepAddr) -> Option<&Representation> {
		self.adaptation_set(addr.set_addr())?.representations.get(addr.rep)
	}

	pub fn representation_mut(&mut self, addr: RepAddr) -> Option<&mut Representation> {
		self.adaptation_set_mut(addr.set_addr())?.representations.get_mut(addr.rep)
	}

	pub fn representations(&self, addr: SetAddr) -> impl Iterator<Item = (RepAddr, &Representation)> {
		self.adaptation_set(addr)
			.into_iter()
			.flat_map(move |set| set.representations.iter().enumerate())
			.map(move |(rep, representation)| (addr.rep(rep), representation))
	}

	pub(crate) fn period_of(&self, rep: RepAddr) -> Option<&Period> {
		self.periods.get(rep.period)
	}

	// Lazy updates.

	/// Whether the representation's local window has expired for the given position.
	pub fn needs_update(&self, rep: RepAddr, number: u64) -> bool {
		self.representation(rep)
			.and_then(|r| r.updater.as_ref())
			.is_some_and(|u| u.needs_update(number))
	}

	/// Synchronously refetch and merge the representation's addressing data.
	///
	/// On failure the previous playlist state remains authoritative. Returns whether
	/// anything was merged.
	pub fn run_local_updates(&mut self, rep: RepAddr, resources: &SharedResources) -> Result<bool> {
		let Some(mut updater) = self.representation_mut(rep).and_then(|r| r.updater.take()) else {
			return Ok(false);
		};
		let outcome = updater.fetch_update(resources);
		if let Some(representation) = self.representation_mut(rep) {
			representation.updater = Some(updater);
		}

		match outcome {
			Ok(Some(update)) => {
				if let Some(list) = update.list {
					self.update_segment_list(rep, list);
				}
				if let Some(timeline) = update.timeline {
					self.merge_template_timeline(rep, timeline, update.prune_barrier);
				}
				debug!(rep = %self.representation(rep).map(|r| r.id.clone()).unwrap_or_default(), "merged representation update");
				Ok(true)
			}
			Ok(None) => Ok(false),
			Err(err) => {
				warn!(%err, "representation update failed, keeping previous playlist");
				Err(err)
			}
		}
	}

	pub fn schedule_next_update(&mut self, rep: RepAddr, number: u64, was_updated: bool) {
		if let Some(updater) = self.representation_mut(rep).and_then(|r| r.updater.as_mut()) {
			updater.schedule_next_update(number, was_updated);
		}
	}

	/// Merge a refreshed segment list into the representation, or adopt it outright when
	/// none existed.
	pub fn update_segment_list(&mut self, rep: RepAddr, list: crate::playlist::SegmentList) {
		let Some(node) = self.representation(rep).map(|r| r.node) else {
			return;
		};
		match self.tree.get_attr(node, AttrKind::SegmentList) {
			Some(list_id) => self.tree.list_update_with(list_id, list),
			None => {
				self.tree.add_attr(node, AttrPayload::List(list));
			}
		}
	}

	/// Merge timeline entries (manifest refresh or a Smooth `tfrf` live-edge extension)
	/// into the representation's inherited template timeline.
	pub fn merge_template_timeline(&mut self, rep: RepAddr, incoming: SegmentTimeline, prune_barrier: Option<Ticks>) {
		let Some(node) = self.representation(rep).map(|r| r.node) else {
			return;
		};
		let Some(template_id) = self.tree.inherit_template(node) else {
			return;
		};
		self.tree.template_merge_timeline(template_id, incoming, prune_barrier);
	}

	/// Convert a fragment list of `(absolute_time, duration)` pairs, as carried by a
	/// Smooth `tfrf` box, into timeline entries and merge them in.
	pub fn merge_timeline_fragments(&mut self, rep: RepAddr, fragments: &[(u64, u64)]) {
		let mut timeline = SegmentTimeline::new();
		for (index, (time, duration)) in fragments.iter().enumerate() {
			timeline.add_element(index as u64 + 1, *duration as crate::Stime, 0, *time as crate::Stime);
		}
		self.merge_template_timeline(rep, timeline, None);
	}

	/// Roll every live window in the playlist below a playback time.
	pub fn prune_by_playback_time(&mut self, time: Ticks) {
		let mut rep_addrs = Vec::new();
		for (period_idx, period) in self.periods.iter().enumerate() {
			for (set_idx, set) in period.sets.iter().enumerate() {
				for rep_idx in 0..set.representations.len() {
					rep_addrs.push(RepAddr {
						period: period_idx,
						set: set_idx,
						rep: rep_idx,
					});
				}
			}
		}

		for rep in rep_addrs {
			let Some(node) = self.representation(rep).map(|r| r.node) else {
				continue;
			};
			if let Some(list_id) = self.tree.get_attr(node, AttrKind::SegmentList) {
				self.tree.list_prune_by_playback_time(list_id, time);
			}
			if let Some(template_id) = self.tree.get_attr(node, AttrKind::SegmentTemplate) {
				if let Some(number) = self.segment_number_by_time(rep, time) {
					self.tree.template_prune_by_sequence_number(template_id, number);
				}
			}
		}
	}

	/// The encryption descriptor effective for a representation: the deepest level whose
	/// method is set.
	pub fn inherit_encryption(&self, rep: RepAddr) -> Option<CommonEncryption> {
		let representation = self.representation(rep)?;
		if let Some(enc) = &representation.encryption {
			if enc.method != crate::EncryptionMethod::None {
				return Some(enc.clone());
			}
		}
		if let Some(enc) = self.adaptation_set(rep.set_addr()).and_then(|s| s.encryption.as_ref()) {
			if enc.method != crate::EncryptionMethod::None {
				return Some(enc.clone());
			}
		}
		self.period_of(rep)
			.and_then(|p| p.encryption.as_ref())
			.filter(|enc| enc.method != crate::EncryptionMethod::None)
			.cloned()
	}

	// Chunk materialization.

	/// The fully resolved URL for a segment of a representation, with template
	/// substitution applied.
	pub fn segment_url(&self, rep: RepAddr, segment: &Segment, number: u64) -> Option<String> {
		let representation = self.representation(rep)?;
		let ctx = TemplateContext {
			number,
			time: segment.start_time,
			bandwidth: representation.bandwidth,
			representation_id: representation.id.to_string(),
		};

		if segment.source_url.has_scheme() {
			return Some(segment.source_url.to_string_with(Some(&ctx)));
		}

		let mut url = Url::default();
		let period = self.period_of(rep)?;
		let set = self.adaptation_set(rep.set_addr())?;
		let levels = [
			self.base_urls.first(),
			period.base_url.as_ref(),
			set.base_url.as_ref(),
			representation.base_url.as_ref(),
		];
		for base in levels.into_iter().flatten() {
			if base.has_scheme() {
				url = base.clone();
			} else {
				url.append_url(base.clone());
			}
		}
		url.append_url(segment.source_url.clone());
		Some(url.to_string_with(Some(&ctx)))
	}

	/// Open a chunk for a segment through the connection manager.
	///
	/// The chunk holds its own handle on the segment, keeping it alive across any prune.
	pub fn make_chunk(
		&self,
		rep: RepAddr,
		segment: &Arc<Segment>,
		number: u64,
		conn: &dyn ConnectionManager,
	) -> Option<SegmentChunk> {
		let url = self.segment_url(rep, segment, number)?;
		let representation = self.representation(rep)?;
		let chunk_type = match segment.kind {
			SegmentKind::Init => ChunkType::Init,
			SegmentKind::Index => ChunkType::Index,
			_ => ChunkType::Media,
		};
		let source = conn.make_source(&url, &representation.id, chunk_type, segment.range)?;

		// Segments without their own key line pick up the inherited one.
		let mut segment = segment.clone();
		if segment.encryption.is_none() {
			if let Some(encryption) = self.inherit_encryption(rep) {
				Arc::make_mut(&mut segment).encryption = Some(encryption);
			}
		}

		Some(SegmentChunk::new(source, segment, representation.stream_format))
	}
}

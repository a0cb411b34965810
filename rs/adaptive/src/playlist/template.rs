use std::sync::Arc;

use crate::playlist::{AttrsTree, NodeId, Segment, SegmentKind, Url, SEQUENCE_INVALID};
use crate::{Stime, Ticks};

/// The templated addressing scheme: one URL pattern stamped with `$Number$`/`$Time$` at
/// emission time, optionally refined by a timeline.
///
/// Start number, duration, timescale and the timeline live as attributes on the template's
/// tree node, so siblings and ancestors can supply what the pattern leaves out.
#[derive(Debug)]
pub struct SegmentTemplate {
	media: Url,
	pub init_segment: Option<Arc<Segment>>,
}

impl SegmentTemplate {
	pub fn new(pattern: impl Into<String>) -> Self {
		Self {
			media: Url::template(pattern),
			init_segment: None,
		}
	}

	pub fn set_init(&mut self, pattern: impl Into<String>) {
		let mut init = Segment::new(SegmentKind::Init);
		init.source_url = Url::template(pattern);
		init.templated = true;
		self.init_segment = Some(Arc::new(init));
	}

	pub fn media_pattern(&self) -> &Url {
		&self.media
	}

	/// Synthesize the virtual media segment for a sequence number.
	fn virtual_segment(&self, number: u64, start: Stime, duration: Stime) -> Arc<Segment> {
		let mut segment = Segment::new(SegmentKind::Media);
		segment.source_url = self.media.clone();
		segment.templated = true;
		segment.sequence = number;
		segment.start_time = start;
		segment.duration = duration;
		Arc::new(segment)
	}
}

impl AttrsTree {
	pub fn template_start_segment_number(&self, template_id: NodeId) -> u64 {
		if let Some(tl_id) = self.inherit_timeline(template_id) {
			if let Some(timeline) = self.timeline(tl_id) {
				if !timeline.is_empty() {
					return timeline.min_element_number();
				}
			}
		}
		self.inherit_start_number(template_id).unwrap_or(SEQUENCE_INVALID)
	}

	/// Scaled start and duration of segment `number`, bounded by the timeline window when
	/// one applies.
	pub fn template_scaled_time_duration(&self, template_id: NodeId, number: u64) -> Option<(Stime, Stime)> {
		if let Some(tl_id) = self.inherit_timeline(template_id) {
			let timeline = self.timeline(tl_id)?;
			if timeline.is_empty() || number < timeline.min_element_number() || number > timeline.max_element_number() {
				return None;
			}
			return Some(timeline.scaled_time_duration_by_number(number));
		}

		let start_number = self.inherit_start_number(template_id)?;
		if number < start_number {
			return None;
		}
		let duration = self.inherit_duration(template_id);
		if duration == 0 {
			return None;
		}
		Some(((number - start_number) as Stime * duration, duration))
	}

	pub fn template_media_segment(&self, template_id: NodeId, number: u64) -> Option<Arc<Segment>> {
		let (start, duration) = self.template_scaled_time_duration(template_id, number)?;
		let template = self.template(template_id)?;
		Some(template.virtual_segment(number, start, duration))
	}

	pub fn template_playback_time_duration(&self, template_id: NodeId, number: u64) -> Option<(Ticks, Ticks)> {
		if number == SEQUENCE_INVALID {
			return None;
		}
		let timescale = self.inherit_timescale(template_id);
		let (start, duration) = self.template_scaled_time_duration(template_id, number)?;
		Some((timescale.to_time(start), timescale.to_time(duration)))
	}

	/// Merge a refreshed timeline into the template's, pruning below a sequence number
	/// afterwards when a barrier applies.
	pub fn template_merge_timeline(
		&mut self,
		template_id: NodeId,
		incoming: crate::playlist::SegmentTimeline,
		prune_barrier: Option<Ticks>,
	) {
		let Some(tl_id) = self.inherit_timeline(template_id) else {
			return;
		};

		if let Some(timeline) = self.timeline_mut(tl_id) {
			timeline.merge_with(incoming);
		}

		if let Some(barrier) = prune_barrier {
			let timescale = self.inherit_timescale(tl_id);
			let number = match self.timeline(tl_id) {
				Some(timeline) => timeline.element_number_by_scaled_time(timescale.to_scaled(barrier)),
				None => return,
			};
			if let Some(timeline) = self.timeline_mut(tl_id) {
				timeline.prune_by_sequence_number(number);
			}
		}
	}

	pub fn template_prune_by_sequence_number(&mut self, template_id: NodeId, number: u64) -> usize {
		match self.inherit_timeline(template_id) {
			Some(tl_id) => self
				.timeline_mut(tl_id)
				.map(|timeline| timeline.prune_by_sequence_number(number))
				.unwrap_or(0),
			None => 0,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::playlist::{AttrKind, AttrPayload, SegmentTimeline, TemplateContext};
	use crate::Timescale;

	const START: Stime = 1337;

	fn tree_with_template() -> (AttrsTree, NodeId, NodeId) {
		let mut tree = AttrsTree::new();
		let rep = tree.add_node(AttrKind::SegmentInformation, None);
		tree.add_attr(rep, AttrPayload::Timescale(Timescale::new(100)));
		let template_id = tree.add_attr(rep, AttrPayload::Template(SegmentTemplate::new("$Number$.m4v")));
		tree.add_attr(template_id, AttrPayload::StartNumber(11));
		(tree, rep, template_id)
	}

	#[test]
	fn without_duration_nothing_resolves() {
		let (tree, _, template_id) = tree_with_template();
		assert_eq!(tree.template_start_segment_number(template_id), 11);
		assert!(tree.template_media_segment(template_id, 11).is_none());
		assert_eq!(tree.template_playback_time_duration(template_id, 11), None);
	}

	#[test]
	fn duration_based_addressing() {
		let (mut tree, rep, template_id) = tree_with_template();
		let timescale = Timescale::new(100);
		tree.add_attr(rep, AttrPayload::Duration(100));

		let (time, duration) = tree.template_playback_time_duration(template_id, 11 + 2).unwrap();
		assert_eq!(time, timescale.to_time(2 * 100));
		assert_eq!(duration, timescale.to_time(100));

		let segment = tree.template_media_segment(template_id, 11 + 2).unwrap();
		assert!(segment.is_template());
		assert_eq!(segment.sequence_number(), 13);
		assert_eq!(segment.start_time, 200);

		let ctx = TemplateContext {
			number: segment.sequence_number(),
			time: segment.start_time,
			bandwidth: 0,
			representation_id: String::new(),
		};
		assert_eq!(segment.source_url.to_string_with(Some(&ctx)), "13.m4v");

		assert!(tree.template_media_segment(template_id, 10).is_none());
	}

	#[test]
	fn timeline_based_addressing() {
		let (mut tree, _, template_id) = tree_with_template();
		let timescale = Timescale::new(100);

		let mut timeline = SegmentTimeline::new();
		timeline.add_element(44, 100, 4, START);
		timeline.add_element(44 + 5, 33, 4, START + 5 * 100);
		tree.add_attr(template_id, AttrPayload::Timeline(timeline));

		assert!(tree.template_media_segment(template_id, 44 - 1).is_none());
		assert!(tree.template_media_segment(template_id, 44 + 5 + 4).is_some());
		assert!(tree.template_media_segment(template_id, 44 + 5 + 5).is_none());
		assert_eq!(tree.template_start_segment_number(template_id), 44);

		let (time, duration) = tree.template_playback_time_duration(template_id, 44 + 6).unwrap();
		assert_eq!(time, timescale.to_time(START + 5 * 100 + 33));
		assert_eq!(duration, timescale.to_time(33));
	}

	#[test]
	fn merge_extends_and_prunes() {
		let (mut tree, _, template_id) = tree_with_template();
		let timescale = Timescale::new(100);

		let mut timeline = SegmentTimeline::new();
		timeline.add_element(44, 100, 4, START);
		tree.add_attr(template_id, AttrPayload::Timeline(timeline));

		let mut incoming = SegmentTimeline::new();
		incoming.add_element(44 + 5, 100, 4, START + 5 * 100);
		tree.template_merge_timeline(template_id, incoming, None);

		let tl_id = tree.inherit_timeline(template_id).unwrap();
		assert_eq!(tree.timeline(tl_id).unwrap().max_element_number(), 44 + 9);

		// Prune everything before the barrier time.
		let mut incoming = SegmentTimeline::new();
		incoming.add_element(44 + 10, 100, 0, START + 10 * 100);
		tree.template_merge_timeline(
			template_id,
			incoming,
			Some(timescale.to_time(START + 5 * 100 + 1)),
		);
		let timeline = tree.timeline(tl_id).unwrap();
		assert_eq!(timeline.min_element_number(), 44 + 5);
		assert_eq!(timeline.max_element_number(), 44 + 10);
	}
}

use crate::playlist::{SegmentBase, SegmentList, SegmentTemplate, SegmentTimeline};
use crate::{Stime, Ticks, Timescale};

/// The kinds of nodes and attributes participating in inheritance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrKind {
	/// The playlist root.
	Playlist,
	/// A structural node: period, adaptation set or representation.
	SegmentInformation,
	SegmentList,
	SegmentBase,
	SegmentTemplate,
	Timescale,
	Timeline,
	Duration,
	StartNumber,
	AvailabilityTimeOffset,
	AvailabilityTimeComplete,
}

/// A stable handle into the [AttrsTree] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// What a node holds.
///
/// Structural nodes are empty vertices; value attributes carry one datum; the addressing
/// schemes and timelines are attribute nodes that themselves hold further attributes.
#[derive(Debug)]
pub enum AttrPayload {
	Branch,
	Timescale(Timescale),
	Duration(Stime),
	StartNumber(u64),
	AvailabilityTimeOffset(Ticks),
	AvailabilityTimeComplete(bool),
	List(SegmentList),
	Base(SegmentBase),
	Template(SegmentTemplate),
	Timeline(SegmentTimeline),
}

impl AttrPayload {
	fn kind(&self, branch_kind: AttrKind) -> AttrKind {
		match self {
			Self::Branch => branch_kind,
			Self::Timescale(_) => AttrKind::Timescale,
			Self::Duration(_) => AttrKind::Duration,
			Self::StartNumber(_) => AttrKind::StartNumber,
			Self::AvailabilityTimeOffset(_) => AttrKind::AvailabilityTimeOffset,
			Self::AvailabilityTimeComplete(_) => AttrKind::AvailabilityTimeComplete,
			Self::List(_) => AttrKind::SegmentList,
			Self::Base(_) => AttrKind::SegmentBase,
			Self::Template(_) => AttrKind::SegmentTemplate,
			Self::Timeline(_) => AttrKind::Timeline,
		}
	}
}

struct Node {
	kind: AttrKind,
	parent: Option<NodeId>,
	/// Structural nodes bound the path-matching phase of the inheritance walk.
	canonical_root: bool,
	/// Attribute children, newest first so replacements shadow older entries.
	attrs: Vec<NodeId>,
	payload: AttrPayload,
}

/// The arena of inheritance vertices.
///
/// Nodes are addressed by stable [NodeId] indices; parent links replace the cyclic
/// pointers a naive tree would need, and nothing here owns anything twice.
#[derive(Default)]
pub struct AttrsTree {
	nodes: Vec<Node>,
}

impl AttrsTree {
	pub fn new() -> Self {
		Self::default()
	}

	/// Add a structural node. Periods, adaptation sets and representations all use
	/// [AttrKind::SegmentInformation] and bound sibling path matching.
	pub fn add_node(&mut self, kind: AttrKind, parent: Option<NodeId>) -> NodeId {
		let id = NodeId(self.nodes.len());
		self.nodes.push(Node {
			kind,
			parent,
			canonical_root: kind == AttrKind::SegmentInformation,
			attrs: Vec::new(),
			payload: AttrPayload::Branch,
		});
		id
	}

	/// Attach an attribute to a node, shadowing older attributes of the same kind.
	pub fn add_attr(&mut self, node: NodeId, payload: AttrPayload) -> NodeId {
		let kind = payload.kind(AttrKind::SegmentInformation);
		let id = NodeId(self.nodes.len());
		self.nodes.push(Node {
			kind,
			parent: Some(node),
			canonical_root: false,
			attrs: Vec::new(),
			payload,
		});
		self.nodes[node.0].attrs.insert(0, id);
		id
	}

	/// Replace a node's attribute of the payload's kind, dropping the old one from
	/// lookup.
	pub fn replace_attr(&mut self, node: NodeId, payload: AttrPayload) -> NodeId {
		let kind = payload.kind(AttrKind::SegmentInformation);
		let kept: Vec<NodeId> = self.nodes[node.0]
			.attrs
			.iter()
			.copied()
			.filter(|id| self.nodes[id.0].kind != kind)
			.collect();
		// The old arena entry stays allocated but unreachable; nodes are few and the
		// arena lives only as long as the playlist.
		self.nodes[node.0].attrs = kept;
		self.add_attr(node, payload)
	}

	pub fn kind(&self, id: NodeId) -> AttrKind {
		self.nodes[id.0].kind
	}

	pub fn parent(&self, id: NodeId) -> Option<NodeId> {
		self.nodes[id.0].parent
	}

	pub fn payload(&self, id: NodeId) -> &AttrPayload {
		&self.nodes[id.0].payload
	}

	/// A node's own attribute of a kind, ignoring inheritance.
	pub fn get_attr(&self, node: NodeId, kind: AttrKind) -> Option<NodeId> {
		self.nodes[node.0]
			.attrs
			.iter()
			.copied()
			.find(|id| self.nodes[id.0].kind == kind)
	}

	fn is_valid(&self, id: NodeId) -> bool {
		match &self.nodes[id.0].payload {
			AttrPayload::Timescale(timescale) => timescale.is_valid(),
			AttrPayload::Duration(duration) => *duration > 0,
			_ => true,
		}
	}

	fn get_valid_attr(&self, node: NodeId, kind: AttrKind) -> Option<NodeId> {
		self.get_attr(node, kind).filter(|id| self.is_valid(*id))
	}

	/// Descend from `node` through attribute children matching `path`, then look up
	/// `kind` on the node reached.
	fn get_attr_by_path(&self, node: NodeId, kind: AttrKind, path: &[AttrKind]) -> Option<NodeId> {
		let mut current = node;
		for step in path {
			let attr = self.get_valid_attr(current, *step)?;
			match self.nodes[attr.0].payload {
				AttrPayload::List(_) | AttrPayload::Base(_) | AttrPayload::Template(_) | AttrPayload::Timeline(_) => {
					current = attr;
				}
				_ => return None,
			}
		}
		self.get_valid_attr(current, kind)
	}

	/// Resolve an attribute by kind, with inheritance.
	///
	/// Phase one returns a valid local attribute. Phase two records the attribute-kind
	/// path up to the nearest canonical root and retries that path, progressively
	/// shortened, on each ancestor of that root; this is what lets a period-level
	/// `SegmentTemplate/SegmentTimeline` supply the timescale for a representation whose
	/// own template lacks one. Phase three searches upward purely by kind.
	pub fn inherit(&self, node: NodeId, kind: AttrKind) -> Option<NodeId> {
		if let Some(attr) = self.get_valid_attr(node, kind) {
			return Some(attr);
		}

		// Record our path up to the pseudo root.
		let mut path = Vec::new();
		let mut root = Some(node);
		while let Some(current) = root {
			if self.nodes[current.0].canonical_root {
				break;
			}
			path.insert(0, self.nodes[current.0].kind);
			root = self.nodes[current.0].parent;
		}

		if let Some(root) = root {
			// Try the matched path on each sibling level, deepest path first.
			while !path.is_empty() {
				let mut ancestor = self.nodes[root.0].parent;
				while let Some(current) = ancestor {
					if let Some(attr) = self.get_attr_by_path(current, kind, &path) {
						return Some(attr);
					}
					ancestor = self.nodes[current.0].parent;
				}
				path.pop();
			}
		}

		// Finally, anything above us by kind alone.
		let mut ancestor = self.nodes[node.0].parent;
		while let Some(current) = ancestor {
			if let Some(attr) = self.get_valid_attr(current, kind) {
				return Some(attr);
			}
			ancestor = self.nodes[current.0].parent;
		}

		None
	}

	pub fn inherit_timescale(&self, node: NodeId) -> Timescale {
		match self.inherit(node, AttrKind::Timescale).map(|id| self.payload(id)) {
			Some(AttrPayload::Timescale(timescale)) => *timescale,
			_ => Timescale::new(1),
		}
	}

	pub fn inherit_duration(&self, node: NodeId) -> Stime {
		match self.inherit(node, AttrKind::Duration).map(|id| self.payload(id)) {
			Some(AttrPayload::Duration(duration)) => *duration,
			_ => 0,
		}
	}

	pub fn inherit_start_number(&self, node: NodeId) -> Option<u64> {
		match self.inherit(node, AttrKind::StartNumber).map(|id| self.payload(id)) {
			Some(AttrPayload::StartNumber(number)) => Some(*number),
			_ => None,
		}
	}

	pub fn inherit_availability_time_offset(&self, node: NodeId) -> Ticks {
		match self
			.inherit(node, AttrKind::AvailabilityTimeOffset)
			.map(|id| self.payload(id))
		{
			Some(AttrPayload::AvailabilityTimeOffset(offset)) => *offset,
			_ => Ticks::ZERO,
		}
	}

	pub fn inherit_availability_time_complete(&self, node: NodeId) -> bool {
		match self
			.inherit(node, AttrKind::AvailabilityTimeComplete)
			.map(|id| self.payload(id))
		{
			Some(AttrPayload::AvailabilityTimeComplete(complete)) => *complete,
			_ => true,
		}
	}

	pub fn inherit_list(&self, node: NodeId) -> Option<NodeId> {
		self.inherit(node, AttrKind::SegmentList)
	}

	pub fn inherit_base(&self, node: NodeId) -> Option<NodeId> {
		self.inherit(node, AttrKind::SegmentBase)
	}

	pub fn inherit_template(&self, node: NodeId) -> Option<NodeId> {
		self.inherit(node, AttrKind::SegmentTemplate)
	}

	pub fn inherit_timeline(&self, node: NodeId) -> Option<NodeId> {
		self.inherit(node, AttrKind::Timeline)
	}

	pub fn list(&self, id: NodeId) -> Option<&SegmentList> {
		match self.payload(id) {
			AttrPayload::List(list) => Some(list),
			_ => None,
		}
	}

	pub fn list_mut(&mut self, id: NodeId) -> Option<&mut SegmentList> {
		match &mut self.nodes[id.0].payload {
			AttrPayload::List(list) => Some(list),
			_ => None,
		}
	}

	pub fn base(&self, id: NodeId) -> Option<&SegmentBase> {
		match self.payload(id) {
			AttrPayload::Base(base) => Some(base),
			_ => None,
		}
	}

	pub fn base_mut(&mut self, id: NodeId) -> Option<&mut SegmentBase> {
		match &mut self.nodes[id.0].payload {
			AttrPayload::Base(base) => Some(base),
			_ => None,
		}
	}

	pub fn template(&self, id: NodeId) -> Option<&SegmentTemplate> {
		match self.payload(id) {
			AttrPayload::Template(template) => Some(template),
			_ => None,
		}
	}

	pub fn template_mut(&mut self, id: NodeId) -> Option<&mut SegmentTemplate> {
		match &mut self.nodes[id.0].payload {
			AttrPayload::Template(template) => Some(template),
			_ => None,
		}
	}

	pub fn timeline(&self, id: NodeId) -> Option<&SegmentTimeline> {
		match self.payload(id) {
			AttrPayload::Timeline(timeline) => Some(timeline),
			_ => None,
		}
	}

	pub fn timeline_mut(&mut self, id: NodeId) -> Option<&mut SegmentTimeline> {
		match &mut self.nodes[id.0].payload {
			AttrPayload::Timeline(timeline) => Some(timeline),
			_ => None,
		}
	}
}

use crate::playlist::{AdaptationSet, NodeId, Url};
use crate::{CommonEncryption, Ticks};

/// A maximal time interval with a stable adaptation-set composition.
pub struct Period {
	pub(crate) node: NodeId,
	/// Offset of this period from the presentation start.
	pub start: Ticks,
	pub duration: Option<Ticks>,
	pub base_url: Option<Url>,
	pub encryption: Option<CommonEncryption>,
	pub(crate) sets: Vec<AdaptationSet>,
}

impl Period {
	pub(crate) fn new(node: NodeId) -> Self {
		Self {
			node,
			start: Ticks::ZERO,
			duration: None,
			base_url: None,
			encryption: None,
			sets: Vec::new(),
		}
	}

	pub fn node(&self) -> NodeId {
		self.node
	}

	pub fn adaptation_sets(&self) -> &[AdaptationSet] {
		&self.sets
	}
}

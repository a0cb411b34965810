use crate::playlist::{Id, NodeId, Representation, Url};
use crate::CommonEncryption;

/// The function a track plays in the presentation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RoleKind {
	#[default]
	None,
	Main,
	Alternate,
	Supplementary,
	Commentary,
	Dub,
	Caption,
	Subtitle,
}

/// A role plus the selection hints manifests attach to it (HLS DEFAULT/AUTOSELECT).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Role {
	pub kind: RoleKind,
	pub default: bool,
	pub auto_select: bool,
}

impl Role {
	pub fn new(kind: RoleKind) -> Self {
		Self {
			kind,
			default: kind == RoleKind::Main,
			auto_select: kind == RoleKind::Main,
		}
	}

	pub fn is_default(&self) -> bool {
		self.default
	}

	pub fn auto_selectable(&self) -> bool {
		self.auto_select
	}
}

/// A group of interchangeable representations of the same content.
pub struct AdaptationSet {
	pub(crate) node: NodeId,
	pub id: Id,
	pub role: Role,
	pub language: Option<String>,
	pub mime_type: Option<String>,
	pub resolution: Option<(u32, u32)>,
	pub frame_rate: Option<f64>,
	pub sample_rate: Option<u32>,
	/// Whether representations share segment boundaries, permitting mid-stream quality
	/// switches without re-reading an init segment pair.
	pub segment_aligned: bool,
	pub base_url: Option<Url>,
	pub encryption: Option<CommonEncryption>,
	pub(crate) representations: Vec<Representation>,
}

impl AdaptationSet {
	pub(crate) fn new(node: NodeId) -> Self {
		Self {
			node,
			id: Id::default(),
			role: Role::default(),
			language: None,
			mime_type: None,
			resolution: None,
			frame_rate: None,
			sample_rate: None,
			segment_aligned: true,
			base_url: None,
			encryption: None,
			representations: Vec::new(),
		}
	}

	pub fn node(&self) -> NodeId {
		self.node
	}

	pub fn representations(&self) -> &[Representation] {
		&self.representations
	}
}

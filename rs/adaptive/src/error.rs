/// A list of possible errors surfaced by the core.
///
/// Transient chunk I/O is not reported here; it flows through
/// [`ChunkInterface::request_status`](crate::ChunkInterface::request_status) so the consumer
/// can retry at its own cadence.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
	/// A manifest refresh could not be fetched.
	#[error("refresh failed: {0}")]
	Refresh(String),

	/// A manifest refresh fetched fine but could not be merged; the previous
	/// playlist remains authoritative.
	#[error("malformed update: {0}")]
	MalformedUpdate(String),

	/// The representation has no playable segments.
	#[error("no segments available")]
	NoSegments,

	/// A scaled time conversion was attempted with a zero timescale.
	#[error("invalid timescale")]
	InvalidTimescale,
}

pub type Result<T> = std::result::Result<T, Error>;

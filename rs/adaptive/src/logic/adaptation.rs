use crate::playlist::{Playlist, RepAddr, SetAddr};

/// Picks which representation to fetch next.
///
/// The heuristics (throughput estimation, buffer occupancy, user caps) are the
/// implementor's business; the tracker only asks, at every chunk boundary where a switch
/// is permitted, whether to stay or move.
pub trait AdaptationLogic: Send {
	/// The representation to use next, or `None` when the set has nothing usable.
	///
	/// `current` is `None` on startup; returning the current address means no switch.
	fn next_representation(&mut self, playlist: &Playlist, set: SetAddr, current: Option<RepAddr>) -> Option<RepAddr>;
}

use crate::playlist::{find_segment_number_by_scaled_time, Playlist, RepAddr, SchemeRef, SEQUENCE_INVALID};
use crate::{Stime, Ticks};

/// Computes buffering budgets and where playback starts.
pub trait BufferingLogic: Send + Sync {
	/// The segment number playback should start from, [SEQUENCE_INVALID] when the
	/// representation has nothing to play.
	fn start_segment_number(&self, playlist: &Playlist, rep: RepAddr) -> u64;

	fn min_buffering(&self, playlist: &Playlist) -> Ticks;
	fn max_buffering(&self, playlist: &Playlist) -> Ticks;
	fn live_delay(&self, playlist: &Playlist) -> Ticks;
}

/// User overrides for the buffering policy; unset fields fall back to the defaults and to
/// whatever the playlist advertises.
#[derive(Debug, Default, Clone)]
pub struct BufferingConfig {
	pub min_buffering: Option<Ticks>,
	pub max_buffering: Option<Ticks>,
	pub live_delay: Option<Ticks>,
	pub low_latency: Option<bool>,
}

/// The stock buffering policy.
pub struct DefaultBufferingLogic {
	config: BufferingConfig,
}

impl Default for DefaultBufferingLogic {
	fn default() -> Self {
		Self::new(BufferingConfig::default())
	}
}

impl DefaultBufferingLogic {
	pub const BUFFERING_LOWEST_LIMIT: Ticks = Ticks::from_secs(2);
	pub const DEFAULT_MIN_BUFFERING: Ticks = Ticks::from_secs(6);
	pub const DEFAULT_MAX_BUFFERING: Ticks = Ticks::from_secs(30);
	pub const DEFAULT_LIVE_BUFFERING: Ticks = Ticks::from_secs(15);

	/// Never start on the very last completed segment of a live window.
	pub const SAFETY_BUFFERING_EDGE_OFFSET: u64 = 1;
	/// Keep clear of segments about to roll out of the window.
	pub const SAFETY_EXPURGING_OFFSET: u64 = 2;

	pub fn new(config: BufferingConfig) -> Self {
		Self { config }
	}

	fn is_low_latency(&self, playlist: &Playlist) -> bool {
		self.config.low_latency.unwrap_or(playlist.low_latency)
	}

	/// How far behind the live edge (or how much ahead of VOD playback) to aim.
	fn buffering_offset(&self, playlist: &Playlist) -> Ticks {
		if playlist.is_live {
			self.live_delay(playlist)
		} else {
			self.max_buffering(playlist)
		}
	}

	fn live_start_segment_number(&self, playlist: &Playlist, rep: RepAddr) -> u64 {
		let buffering = self.buffering_offset(playlist);
		let tree = playlist.tree();

		match playlist.effective_scheme(rep) {
			Some(SchemeRef::Template(template_id)) => {
				let timescale = tree.inherit_timescale(template_id);

				if let Some(timeline) = tree.inherit_timeline(template_id).and_then(|tl| tree.timeline(tl)) {
					if timeline.is_empty() {
						return SEQUENCE_INVALID;
					}

					let mut safe_min = timeline.min_element_number();
					let mut safe_max = timeline.max_element_number();
					for _ in 0..Self::SAFETY_BUFFERING_EDGE_OFFSET {
						if safe_min == safe_max {
							break;
						}
						safe_max -= 1;
					}
					let (time, duration) = timeline.scaled_time_duration_by_number(safe_max);
					let safe_edge_time = time + duration - 1;

					for _ in 0..Self::SAFETY_EXPURGING_OFFSET {
						if safe_min + 1 >= safe_max {
							break;
						}
						safe_min += 1;
					}
					let (mut safe_start_time, _) = timeline.scaled_time_duration_by_number(safe_min);

					if let Some(depth) = playlist.time_shift_buffer_depth {
						let (time, duration) = timeline.scaled_time_duration_by_number(timeline.max_element_number());
						let edge_time = time + duration - 1;
						let scaled_depth = timescale.to_scaled(depth);
						if safe_start_time + scaled_depth < edge_time {
							safe_start_time = edge_time - scaled_depth;
						}
					}

					let scaled_buffering = timescale.to_scaled(buffering);
					let start_time = if safe_edge_time - safe_start_time > scaled_buffering {
						safe_edge_time - scaled_buffering
					} else {
						safe_start_time
					};
					return timeline.element_number_by_scaled_time(start_time);
				}

				// Duration-based template: derive from wall time within the DVR window.
				let start_number = tree.inherit_start_number(template_id).unwrap_or(1);
				let segment_duration = timescale.to_time(tree.inherit_duration(template_id));
				if !timescale.is_valid() || segment_duration.is_zero() {
					return start_number;
				}

				let now = Ticks::now_wall();
				let mut playback_time = now - buffering;
				let mut min_avail_time = playlist.availability_start_time.unwrap_or(Ticks::ZERO);
				if let Some(period) = playlist.period(rep.period) {
					min_avail_time += period.start;
				}

				if let Some(depth) = playlist.time_shift_buffer_depth {
					let mut elapsed = now - min_avail_time;
					// Align to the last completed segment.
					elapsed = elapsed - (elapsed % segment_duration);
					let aligned_now = min_avail_time + elapsed;
					if depth < elapsed {
						min_avail_time = aligned_now - depth;
					}
				}
				if playback_time < min_avail_time {
					playback_time = min_avail_time;
				}

				let mut start = playlist.live_template_number(rep, template_id, playback_time, true);
				if start < start_number {
					start = start_number;
				}

				let max_safety_offset = ((playback_time - min_avail_time) / segment_duration).max(0) as u64;
				let safety_offset = Self::SAFETY_BUFFERING_EDGE_OFFSET.min(max_safety_offset);
				if start_number + safety_offset <= start {
					start -= safety_offset;
				} else {
					start = start_number;
				}
				start
			}

			Some(SchemeRef::List(list_id)) => {
				let Some(list) = tree.list(list_id) else {
					return SEQUENCE_INVALID;
				};
				let segments = list.segments();
				if segments.is_empty() {
					return SEQUENCE_INVALID;
				}
				let timescale = tree.inherit_timescale(list_id);

				// Working around discontinuities by using durations throughout.
				let total: Stime = segments.iter().map(|seg| seg.duration).sum();

				let available = match playlist.time_shift_buffer_depth {
					Some(depth) => total.min(timescale.to_scaled(depth)),
					None => total,
				};

				let mut available_start_number = segments[0].sequence_number();
				if total != available {
					let mut offset = total - available;
					for segment in segments {
						available_start_number = segment.sequence_number();
						if offset < segment.duration {
							break;
						}
						offset -= segment.duration;
					}
				}

				let back_number = segments.last().unwrap().sequence_number();
				let safe_edge_number =
					back_number - (segments.len() as u64 - 1).min(Self::SAFETY_BUFFERING_EDGE_OFFSET);
				let mut safe_start_number = available_start_number;
				if safe_edge_number > safe_start_number {
					safe_start_number = safe_start_number
						.saturating_sub((safe_edge_number - safe_start_number - 1).min(Self::SAFETY_EXPURGING_OFFSET));
				}

				let mut max_bufferizable: Stime = 0;
				let mut safe_edge_duration: Stime = 0;
				for segment in segments {
					if segment.sequence_number() < safe_start_number {
						continue;
					}
					if segment.sequence_number() <= safe_edge_number {
						max_bufferizable += segment.duration;
					} else {
						safe_edge_duration += segment.duration;
					}
				}

				let to_buffer = max_bufferizable.min(timescale.to_scaled(buffering));
				let mut skip = total - safe_edge_duration - to_buffer;
				let mut start = safe_start_number;
				for segment in segments {
					start = segment.sequence_number();
					if segment.duration > skip {
						break;
					}
					skip -= segment.duration;
				}
				start
			}

			Some(SchemeRef::Base(base_id)) => {
				let Some(base) = tree.base(base_id) else {
					return SEQUENCE_INVALID;
				};
				let subs = base.sub_segments();
				let Some(back) = subs.last() else {
					return SEQUENCE_INVALID;
				};
				let timescale = playlist.tree().inherit_timescale(base_id);
				let buffering_start = back.start_time + back.duration - timescale.to_scaled(buffering);
				match find_segment_number_by_scaled_time(subs, buffering_start) {
					Some(start) if base.sequence_number() + Self::SAFETY_BUFFERING_EDGE_OFFSET <= start => {
						start - Self::SAFETY_BUFFERING_EDGE_OFFSET
					}
					Some(_) => base.sequence_number(),
					None => subs[0].sequence_number(),
				}
			}

			None => SEQUENCE_INVALID,
		}
	}
}

impl BufferingLogic for DefaultBufferingLogic {
	fn start_segment_number(&self, playlist: &Playlist, rep: RepAddr) -> u64 {
		if playlist.is_live {
			return self.live_start_segment_number(playlist, rep);
		}

		let tree = playlist.tree();
		match playlist.effective_scheme(rep) {
			Some(SchemeRef::Template(id)) => tree.template_start_segment_number(id),
			Some(SchemeRef::List(id)) => tree.list_start_segment_number(id),
			Some(SchemeRef::Base(id)) => tree.base(id).map(|b| b.sequence_number()).unwrap_or(0),
			None => 0,
		}
	}

	fn min_buffering(&self, playlist: &Playlist) -> Ticks {
		if self.is_low_latency(playlist) {
			return Self::BUFFERING_LOWEST_LIMIT;
		}

		let mut buffering = self.config.min_buffering.unwrap_or(Self::DEFAULT_MIN_BUFFERING);
		if let Some(min) = playlist.min_buffering {
			buffering = buffering.max(min);
		}
		buffering.max(Self::BUFFERING_LOWEST_LIMIT)
	}

	fn max_buffering(&self, playlist: &Playlist) -> Ticks {
		if self.is_low_latency(playlist) {
			return self.min_buffering(playlist);
		}

		let mut buffering = self.config.max_buffering.unwrap_or(Self::DEFAULT_MAX_BUFFERING);
		if playlist.is_live {
			buffering = buffering.min(self.live_delay(playlist));
		}
		if let Some(max) = playlist.max_buffering {
			buffering = buffering.min(max);
		}
		buffering.max(self.min_buffering(playlist))
	}

	fn live_delay(&self, playlist: &Playlist) -> Ticks {
		if self.is_low_latency(playlist) {
			return self.min_buffering(playlist);
		}

		let mut delay = self.config.live_delay.unwrap_or(Self::DEFAULT_LIVE_BUFFERING);
		if let Some(suggested) = playlist.suggested_presentation_delay {
			delay = suggested;
		}
		if let Some(depth) = playlist.time_shift_buffer_depth {
			delay = delay.min(depth);
		}
		delay.max(self.min_buffering(playlist))
	}
}

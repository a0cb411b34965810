//! The per-track state machine driving segment fetches.
//!
//! One tracker exists per selected adaptation set, with exactly one caller thread. All
//! state transitions happen on that thread; the only blocking points are chunk opening
//! through the connection manager and synchronous manifest refreshes.

mod events;

pub use events::*;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::http::ConnectionManager;
use crate::logic::{AdaptationLogic, BufferingLogic};
use crate::playlist::{Id, Playlist, RepAddr, Role, SetAddr, SEQUENCE_INVALID};
use crate::{ChunkInterface, SegmentChunk, SharedResources, StreamFormat, Ticks};

/// The tracker cursor: which representation, which segment, and how much of the
/// init/index preamble has been delivered for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
	pub rep: Option<RepAddr>,
	pub number: u64,
	pub init_sent: bool,
	pub index_sent: bool,
}

impl Default for Position {
	fn default() -> Self {
		Self {
			rep: None,
			number: SEQUENCE_INVALID,
			init_sent: false,
			index_sent: false,
		}
	}
}

impl Position {
	pub fn new(rep: RepAddr, number: u64) -> Self {
		Self {
			rep: Some(rep),
			number,
			init_sent: false,
			index_sent: false,
		}
	}

	pub fn is_valid(&self) -> bool {
		self.number != SEQUENCE_INVALID && self.rep.is_some()
	}

	/// Post-increment: init, then index, and only then the next segment number.
	pub fn advance(&mut self) {
		if !self.is_valid() {
			return;
		}
		if self.index_sent {
			self.number += 1;
		} else if self.init_sent {
			self.index_sent = true;
		} else {
			self.init_sent = true;
		}
	}
}

/// A prepared chunk with the media timing it stands for.
struct ChunkEntry {
	chunk: SegmentChunk,
	pos: Position,
	start_time: Ticks,
	duration: Ticks,
	display_time: Option<Ticks>,
	sequence: u64,
}

/// Advances a [Position] through one adaptation set, dispatching init/index/media
/// fetches, probing formats, and emitting [TrackerEvent]s.
pub struct SegmentTracker {
	playlist: Arc<Mutex<Playlist>>,
	set: SetAddr,
	resources: Arc<SharedResources>,
	logic: Box<dyn AdaptationLogic>,
	buffering: Arc<dyn BufferingLogic>,
	listeners: Vec<Box<dyn TrackerListener>>,

	current: Position,
	next: Position,
	chunks: VecDeque<ChunkEntry>,
	initializing: bool,
	format: StreamFormat,
}

impl SegmentTracker {
	pub fn new(
		playlist: Arc<Mutex<Playlist>>,
		set: SetAddr,
		resources: Arc<SharedResources>,
		logic: Box<dyn AdaptationLogic>,
		buffering: Arc<dyn BufferingLogic>,
	) -> Self {
		Self {
			playlist,
			set,
			resources,
			logic,
			buffering,
			listeners: Vec::new(),
			current: Position::default(),
			next: Position::default(),
			chunks: VecDeque::new(),
			initializing: true,
			format: StreamFormat::Unknown,
		}
	}

	/// Listeners are notified synchronously, in registration order. Register them
	/// between manifest loads, never from inside a callback.
	pub fn register_listener(&mut self, listener: Box<dyn TrackerListener>) {
		self.listeners.push(listener);
	}

	pub fn stream_role(&self) -> Role {
		let playlist = self.playlist.lock().unwrap();
		playlist.adaptation_set(self.set).map(|set| set.role).unwrap_or_default()
	}

	/// The format the current representation declares, refreshing it first if needed.
	pub fn current_format(&mut self) -> StreamFormat {
		let mut playlist = self.playlist.lock().unwrap();
		let rep = match self.current.rep {
			Some(rep) => Some(rep),
			None => self.logic.next_representation(&playlist, self.set, None),
		};
		let Some(rep) = rep else {
			return StreamFormat::Unknown;
		};
		if playlist.needs_update(rep, self.next.number) {
			let _ = playlist.run_local_updates(rep, &self.resources);
		}
		playlist
			.representation(rep)
			.map(|r| r.stream_format)
			.unwrap_or_default()
	}

	/// Drop all state and report the track as switched away.
	pub fn reset(&mut self) {
		let prev = self.rep_id(self.current.rep);
		Self::emit(&mut self.listeners, TrackerEvent::RepresentationSwitch { prev, next: None });
		self.current = Position::default();
		self.next = Position::default();
		self.chunks.clear();
		self.initializing = true;
		self.format = StreamFormat::Unknown;
	}

	/// The position playback would start from, without adopting it.
	pub fn start_position(&mut self) -> Position {
		let mut playlist = self.playlist.lock().unwrap();
		Self::start_position_locked(
			&mut playlist,
			self.logic.as_mut(),
			self.buffering.as_ref(),
			&self.resources,
			self.set,
		)
	}

	/// Adopt the start position as the cursor, unless one is already set.
	pub fn set_start_position(&mut self) -> bool {
		if self.next.is_valid() {
			return true;
		}
		let pos = self.start_position();
		if !pos.is_valid() {
			return false;
		}
		self.next = pos;
		true
	}

	/// Move the cursor to an explicit position. Pending chunks are dropped before the
	/// position change is announced.
	pub fn set_position(&mut self, pos: Position, restarted: bool) {
		if restarted {
			self.initializing = true;
		}
		self.current = Position::default();
		self.next = pos;
		self.chunks.clear();

		let resume_time = {
			let playlist = self.playlist.lock().unwrap();
			pos.rep
				.and_then(|rep| playlist.playback_time_duration(rep, pos.number))
				.map(|(time, _)| time)
				.unwrap_or(Ticks::ZERO)
		};
		Self::emit(&mut self.listeners, TrackerEvent::PositionChange { resume_time });
	}

	/// Seek to a playback time. With `tryonly`, only report whether the seek would
	/// resolve.
	pub fn set_position_by_time(&mut self, time: Ticks, restarted: bool, tryonly: bool) -> bool {
		let pos = {
			let mut playlist = self.playlist.lock().unwrap();
			let rep = match self.current.rep {
				Some(rep) => Some(rep),
				None => self.logic.next_representation(&playlist, self.set, None),
			};
			let Some(rep) = rep else {
				return false;
			};

			// The representation might not have been loaded at all (HLS) or expired.
			if playlist.needs_update(rep, self.current.number)
				&& playlist.run_local_updates(rep, &self.resources).is_err()
			{
				warn!(rep = ?rep, "failed to update representation for seek");
				return false;
			}

			playlist.segment_number_by_time(rep, time).map(|n| Position::new(rep, n))
		};

		match pos {
			Some(pos) => {
				if !tryonly {
					self.set_position(pos, restarted);
				}
				true
			}
			None => false,
		}
	}

	/// Playback time of the cursor (`next`) or of the last delivered segment.
	pub fn playback_time(&mut self, of_next: bool) -> Ticks {
		let playlist = self.playlist.lock().unwrap();
		let rep = match self.current.rep {
			Some(rep) => Some(rep),
			None => self.logic.next_representation(&playlist, self.set, None),
		};
		let Some(rep) = rep else {
			return Ticks::ZERO;
		};
		let number = if of_next { self.next.number } else { self.current.number };
		playlist
			.playback_time_duration(rep, number)
			.map(|(time, _)| time)
			.unwrap_or(Ticks::ZERO)
	}

	pub fn media_playback_range(&self) -> Option<(Ticks, Ticks, Ticks)> {
		let rep = self.current.rep?;
		let playlist = self.playlist.lock().unwrap();
		playlist.media_playback_range(rep)
	}

	/// How much time sits between the cursor and the end of what is addressable.
	pub fn min_ahead_time(&mut self) -> Ticks {
		let mut playlist = self.playlist.lock().unwrap();
		let rep = match self.current.rep {
			Some(rep) => Some(rep),
			None => self.logic.next_representation(&playlist, self.set, None),
		};
		let Some(rep) = rep else {
			return Ticks::ZERO;
		};

		if playlist.needs_update(rep, self.next.number) {
			let _ = playlist.run_local_updates(rep, &self.resources);
		}

		let mut start = self.current.number;
		if start == SEQUENCE_INVALID {
			start = self.buffering.start_segment_number(&playlist, rep);
		}
		if start == SEQUENCE_INVALID {
			return Ticks::ZERO;
		}
		playlist.min_ahead_time(rep, start)
	}

	/// Live playlists can stall when nothing new is addressable yet.
	pub fn buffering_available(&mut self) -> bool {
		let live = self.playlist.lock().unwrap().is_live;
		if live {
			self.min_ahead_time() > Ticks::ZERO
		} else {
			true
		}
	}

	pub fn notify_buffering_state(&mut self, enabled: bool) {
		let id = self.set_id();
		Self::emit(&mut self.listeners, TrackerEvent::BufferingStateUpdate { id, enabled });
	}

	pub fn notify_buffering_level(&mut self, minimum: Ticks, maximum: Ticks, current: Ticks, target: Ticks) {
		let id = self.set_id();
		Self::emit(
			&mut self.listeners,
			TrackerEvent::BufferingLevelChange {
				id,
				minimum,
				maximum,
				current,
				target,
			},
		);
	}

	/// Refresh the selected representation if its update window expired.
	pub fn update_selected(&mut self) {
		let Some(rep) = self.current.rep else {
			return;
		};
		let mut playlist = self.playlist.lock().unwrap();
		if playlist.needs_update(rep, self.next.number) {
			let was_updated = playlist.run_local_updates(rep, &self.resources).unwrap_or(false);
			playlist.schedule_next_update(rep, self.current.number, was_updated);
		}
	}

	/// Produce the next chunk to fetch, or `None` at the end of the addressable window.
	///
	/// `switch_allowed` permits a representation change at this boundary; it is ignored
	/// while the init/index preamble of the current representation is incomplete or the
	/// set is not segment aligned.
	pub fn next_chunk(&mut self, switch_allowed: bool, conn: &dyn ConnectionManager) -> Option<Box<dyn ChunkInterface>> {
		if !self.next.is_valid() {
			return None;
		}

		if self.chunks.is_empty() {
			let mut playlist = self.playlist.lock().unwrap();
			if let Some(entry) = Self::prepare_chunk(
				&mut playlist,
				self.logic.as_mut(),
				self.buffering.as_ref(),
				&self.resources,
				self.set,
				switch_allowed,
				self.next,
				conn,
			) {
				self.chunks.push_back(entry);
			}
		}

		let Some(mut entry) = self.chunks.pop_front() else {
			// Nothing addressable: end of stream for this representation.
			let id = self.set_id();
			Self::emit(&mut self.listeners, TrackerEvent::BufferingStateUpdate { id, enabled: false });
			return None;
		};

		let b_switched = entry.pos.rep != self.current.rep;
		let mut b_gap = entry.pos.number != self.next.number;
		let b_discontinuity = entry.chunk.discontinuity();

		if b_switched {
			let prev = self.rep_id(self.current.rep);
			let next = self.rep_id(entry.pos.rep);
			debug!(prev = ?prev, next = ?next, "representation switch");
			Self::emit(&mut self.listeners, TrackerEvent::RepresentationSwitch { prev, next });
			self.initializing = true;
		}

		// Advance, and don't trigger duplicate events.
		self.next = entry.pos;
		self.current = entry.pos;

		let mut format = entry.chunk.stream_format();
		if format == StreamFormat::Unknown {
			// Probe the first bytes; fall back on the declared MIME type.
			format = entry.chunk.probe_format();
			if !format.is_known() {
				if let Some(mime) = entry.chunk.content_type() {
					format = StreamFormat::from_mime(&mime);
				}
			}
			entry.chunk.set_stream_format(format);
		}
		if format != self.format && format != StreamFormat::Unknown {
			self.format = format;
			Self::emit(&mut self.listeners, TrackerEvent::FormatChange { format });
		}

		if self.initializing {
			b_gap = false;
			// Stop initializing after the first chunk.
			self.initializing = false;
		}

		// New segment timing for stats and adaptation logic.
		let id = self.set_id();
		Self::emit(
			&mut self.listeners,
			TrackerEvent::SegmentChange {
				id,
				sequence: entry.sequence,
				start_time: entry.start_time,
				duration: entry.duration,
				display_time: entry.display_time,
			},
		);

		// Both implicit and explicit discontinuities.
		if b_gap || b_discontinuity {
			Self::emit(&mut self.listeners, TrackerEvent::Discontinuity);
		}

		if !b_gap {
			self.next.advance();
		}

		Some(Box::new(entry.chunk))
	}

	fn start_position_locked(
		playlist: &mut Playlist,
		logic: &mut dyn AdaptationLogic,
		buffering: &dyn BufferingLogic,
		resources: &SharedResources,
		set: SetAddr,
	) -> Position {
		let Some(rep) = logic.next_representation(playlist, set, None) else {
			return Position::default();
		};
		// Ensure ephemeral content is loaded.
		if playlist.needs_update(rep, SEQUENCE_INVALID) {
			let _ = playlist.run_local_updates(rep, resources);
		}
		let number = buffering.start_segment_number(playlist, rep);
		Position {
			rep: Some(rep),
			number,
			init_sent: false,
			index_sent: false,
		}
	}

	#[allow(clippy::too_many_arguments)]
	fn prepare_chunk(
		playlist: &mut Playlist,
		logic: &mut dyn AdaptationLogic,
		buffering: &dyn BufferingLogic,
		resources: &SharedResources,
		set: SetAddr,
		mut switch_allowed: bool,
		mut pos: Position,
		conn: &dyn ConnectionManager,
	) -> Option<ChunkEntry> {
		let aligned = playlist.adaptation_set(set)?.segment_aligned;
		let mut was_updated = false;

		if !pos.is_valid() {
			// Starting from scratch.
			pos = Self::start_position_locked(playlist, logic, buffering, resources, set);
			if !pos.is_valid() {
				return None;
			}
		} else {
			// The init/index pair must complete on one representation before any switch.
			if !aligned || !pos.init_sent || !pos.index_sent {
				switch_allowed = false;
			}

			if switch_allowed {
				if let Some(candidate) = logic.next_representation(playlist, set, pos.rep) {
					if Some(candidate) != pos.rep {
						if playlist.needs_update(candidate, pos.number) {
							was_updated = playlist.run_local_updates(candidate, resources).unwrap_or(false);
						}

						let consistent = playlist
							.representation(candidate)
							.map(|r| r.consistent_segment_number)
							.unwrap_or(true);
						let number = if consistent {
							Some(pos.number)
						} else {
							// Convert our segment number through time; refuse the switch
							// when it falls outside the target's availability.
							pos.rep
								.and_then(|from| playlist.translate_segment_number(pos.number, from, candidate))
						};

						if let Some(number) = number {
							if number != SEQUENCE_INVALID {
								pos = Position::new(candidate, number);
							}
						}
					}
				}
			}
		}

		let rep = pos.rep?;
		playlist.schedule_next_update(rep, pos.number, was_updated);

		let mut segment = None;
		if !pos.init_sent {
			segment = playlist.init_segment(rep);
			if segment.is_none() {
				pos.advance();
			}
		}
		if segment.is_none() && !pos.index_sent {
			if playlist.needs_index(rep) {
				segment = playlist.index_segment(rep);
			}
			if segment.is_none() {
				pos.advance();
			}
		}
		if segment.is_none() {
			let (media, newpos, _gap) = playlist.next_media_segment(rep, pos.number)?;
			pos.number = newpos;
			segment = Some(media);
		}

		let segment = segment?;
		let chunk = playlist.make_chunk(rep, &segment, pos.number, conn)?;

		// Timing of the media position this chunk belongs to, also for init chunks.
		let (start_time, duration) = playlist
			.playback_time_duration(rep, pos.number)
			.unwrap_or((Ticks::ZERO, Ticks::ZERO));
		let (sequence, display_time) = match playlist.media_segment(rep, pos.number) {
			Some(media) => (media.discontinuity_sequence, media.display_time),
			None => (0, None),
		};

		Some(ChunkEntry {
			chunk,
			pos,
			start_time,
			duration,
			display_time,
			sequence,
		})
	}

	fn set_id(&self) -> Id {
		let playlist = self.playlist.lock().unwrap();
		playlist.adaptation_set(self.set).map(|set| set.id.clone()).unwrap_or_default()
	}

	fn rep_id(&self, rep: Option<RepAddr>) -> Option<Id> {
		let rep = rep?;
		let playlist = self.playlist.lock().unwrap();
		playlist.representation(rep).map(|r| r.id.clone())
	}

	fn emit(listeners: &mut [Box<dyn TrackerListener>], event: TrackerEvent) {
		for listener in listeners.iter_mut() {
			listener.tracker_event(&event);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::cell::RefCell;
	use std::collections::HashMap;
	use std::rc::Rc;
	use std::sync::atomic::{AtomicUsize, Ordering};

	use bytes::Bytes;

	use crate::http::{BytesRange, ChunkSource, ChunkType, RequestStatus};
	use crate::logic::DefaultBufferingLogic;
	use crate::playlist::{AttrPayload, Segment, SegmentList};
	use crate::{Result, Stime, Timescale};

	const START: Stime = 1337;

	struct DummyLogic {
		index: Arc<AtomicUsize>,
	}

	impl AdaptationLogic for DummyLogic {
		fn next_representation(&mut self, playlist: &Playlist, set: SetAddr, _: Option<RepAddr>) -> Option<RepAddr> {
			let index = self.index.load(Ordering::Relaxed);
			let set_ref = playlist.adaptation_set(set)?;
			if set_ref.representations().len() <= index {
				return None;
			}
			Some(set.rep(index))
		}
	}

	struct DummySource {
		data: Vec<u8>,
		offset: usize,
		content_type: String,
	}

	impl ChunkSource for DummySource {
		fn content_type(&self) -> Option<String> {
			Some(self.content_type.clone())
		}

		fn request_status(&self) -> RequestStatus {
			if self.data.is_empty() {
				RequestStatus::GenericError
			} else {
				RequestStatus::Success
			}
		}

		fn read_block(&mut self) -> Option<Bytes> {
			self.read(self.data.len() - self.offset)
		}

		fn read(&mut self, size: usize) -> Option<Bytes> {
			let remain = self.data.len() - self.offset;
			if remain == 0 {
				return None;
			}
			let take = size.min(remain);
			let out = Bytes::copy_from_slice(&self.data[self.offset..self.offset + take]);
			self.offset += take;
			Some(out)
		}

		fn has_more_data(&self) -> bool {
			self.offset < self.data.len()
		}

		fn bytes_read(&self) -> usize {
			self.offset
		}
	}

	struct DummyConnectionManager {
		data: HashMap<String, Vec<u8>>,
	}

	impl DummyConnectionManager {
		fn new() -> Self {
			let mut data = HashMap::new();
			data.insert("sample/aac".to_string(), vec![0xFF, 0xF1, 0x00, 0x00]);
			data.insert("sample/ac3".to_string(), vec![0x0B, 0x77, 0x00, 0x00, 0x00, 0x00]);
			data.insert("sample/aacinit".to_string(), vec![0xFF, 0xF1, 0x00, 0x00]);
			Self { data }
		}
	}

	impl ConnectionManager for DummyConnectionManager {
		fn make_source(
			&self,
			uri: &str,
			_rep_id: &Id,
			_chunk_type: ChunkType,
			_range: Option<BytesRange>,
		) -> Option<Box<dyn ChunkSource>> {
			Some(Box::new(DummySource {
				data: self.data.get(uri).cloned().unwrap_or_default(),
				offset: 0,
				content_type: uri.to_string(),
			}))
		}
	}

	struct Recorder(Rc<RefCell<Vec<TrackerEvent>>>);

	impl TrackerListener for Recorder {
		fn tracker_event(&mut self, event: &TrackerEvent) {
			self.0.borrow_mut().push(event.clone());
		}
	}

	struct Fixture {
		playlist: Arc<Mutex<Playlist>>,
		tracker: SegmentTracker,
		events: Rc<RefCell<Vec<TrackerEvent>>>,
		logic_index: Arc<AtomicUsize>,
		conn: DummyConnectionManager,
		set: SetAddr,
	}

	impl Fixture {
		fn new() -> Self {
			let mut playlist = Playlist::new();
			let period = playlist.add_period();
			let set = playlist.add_adaptation_set(period);
			let playlist = Arc::new(Mutex::new(playlist));

			let logic_index = Arc::new(AtomicUsize::new(0));
			let mut tracker = SegmentTracker::new(
				playlist.clone(),
				set,
				Arc::new(SharedResources::new()),
				Box::new(DummyLogic {
					index: logic_index.clone(),
				}),
				Arc::new(DefaultBufferingLogic::default()),
			);

			let events = Rc::new(RefCell::new(Vec::new()));
			tracker.register_listener(Box::new(Recorder(events.clone())));

			Self {
				playlist,
				tracker,
				events,
				logic_index,
				conn: DummyConnectionManager::new(),
				set,
			}
		}

		fn add_list_representation(&self, id: &str, count: usize, duration: Stime, url: impl Fn(usize) -> String) -> RepAddr {
			let mut playlist = self.playlist.lock().unwrap();
			let rep = playlist.add_representation(self.set);
			playlist.representation_mut(rep).unwrap().id = Id::new(id);
			let node = playlist.representation(rep).unwrap().node();

			let mut list = SegmentList::new(false);
			for i in 0..count {
				let mut segment = Segment::media(url(i));
				segment.sequence = 123 + i as u64;
				segment.discontinuity_sequence = 456;
				segment.start_time = START + duration * i as Stime;
				segment.duration = duration;
				list.add_segment(segment);
			}
			let list_id = playlist.tree_mut().add_attr(node, AttrPayload::List(list));
			playlist
				.tree_mut()
				.add_attr(list_id, AttrPayload::Timescale(Timescale::new(100)));
			rep
		}

		fn clear(&self) {
			self.events.borrow_mut().clear();
		}

		fn segment_change(&self) -> Option<(u64, Ticks, Ticks)> {
			self.events.borrow().iter().rev().find_map(|event| match event {
				TrackerEvent::SegmentChange {
					sequence,
					start_time,
					duration,
					..
				} => Some((*sequence, *start_time, *duration)),
				_ => None,
			})
		}

		fn format_change(&self) -> Option<StreamFormat> {
			self.events.borrow().iter().find_map(|event| match event {
				TrackerEvent::FormatChange { format } => Some(*format),
				_ => None,
			})
		}

		fn switch(&self) -> Option<(Option<Id>, Option<Id>)> {
			self.events.borrow().iter().find_map(|event| match event {
				TrackerEvent::RepresentationSwitch { prev, next } => Some((prev.clone(), next.clone())),
				_ => None,
			})
		}

		fn position_change(&self) -> Option<Ticks> {
			self.events.borrow().iter().find_map(|event| match event {
				TrackerEvent::PositionChange { resume_time } => Some(*resume_time),
				_ => None,
			})
		}

		fn discontinuity(&self) -> bool {
			self.events
				.borrow()
				.iter()
				.any(|event| matches!(event, TrackerEvent::Discontinuity))
		}
	}

	fn timescale() -> Timescale {
		Timescale::new(100)
	}

	#[test]
	fn formats_are_probed_and_announced_once() {
		let mut fixture = Fixture::new();
		fixture.add_list_representation("0", 3, 100, |i| {
			if i < 2 {
				"sample/aac".to_string()
			} else {
				"sample/ac3".to_string()
			}
		});

		// No start position adopted yet.
		let pos = fixture.tracker.start_position();
		assert!(pos.is_valid());
		assert_eq!(pos.number, 123);
		assert!(fixture.tracker.next_chunk(true, &fixture.conn).is_none());

		assert!(fixture.tracker.set_start_position());

		fixture.clear();
		let chunk = fixture.tracker.next_chunk(true, &fixture.conn);
		assert!(chunk.is_some());
		let (sequence, start, duration) = fixture.segment_change().unwrap();
		assert_eq!(sequence, 456);
		assert_eq!(start, timescale().to_time(START));
		assert_eq!(duration, timescale().to_time(100));
		assert_eq!(fixture.format_change(), Some(StreamFormat::PackedAac));

		fixture.clear();
		let chunk = fixture.tracker.next_chunk(true, &fixture.conn);
		assert!(chunk.is_some());
		let (_, start, duration) = fixture.segment_change().unwrap();
		assert_eq!(start, timescale().to_time(START + 100));
		assert_eq!(duration, timescale().to_time(100));
		// Same format, announced exactly once.
		assert_eq!(fixture.format_change(), None);

		fixture.clear();
		let chunk = fixture.tracker.next_chunk(true, &fixture.conn);
		assert!(chunk.is_some());
		let (_, start, _) = fixture.segment_change().unwrap();
		assert_eq!(start, timescale().to_time(START + 200));
		assert_eq!(fixture.format_change(), Some(StreamFormat::PackedAc3));

		// Past the window: end of stream, no segment event.
		fixture.clear();
		assert!(fixture.tracker.next_chunk(true, &fixture.conn).is_none());
		assert!(fixture.segment_change().is_none());
	}

	#[test]
	fn seeks_align_and_reject_out_of_range() {
		let mut fixture = Fixture::new();
		fixture.add_list_representation("0", 10, 100, |_| "sample/aac".to_string());
		let timescale = timescale();

		// Try-only leaves everything untouched.
		fixture.clear();
		assert!(fixture
			.tracker
			.set_position_by_time(timescale.to_time(START + 250), false, true));
		assert!(fixture.position_change().is_none());
		assert_eq!(fixture.tracker.playback_time(false), Ticks::ZERO);

		fixture.clear();
		assert!(fixture
			.tracker
			.set_position_by_time(timescale.to_time(START + 250), false, false));
		assert!(fixture.tracker.next_chunk(true, &fixture.conn).is_some());
		assert_eq!(fixture.position_change(), Some(timescale.to_time(START + 200)));
		assert_eq!(fixture.tracker.playback_time(false), timescale.to_time(START + 200));

		// Past the playlist: aligns to the end.
		fixture.clear();
		assert!(fixture
			.tracker
			.set_position_by_time(timescale.to_time(START + 9999), false, false));
		assert!(fixture.tracker.next_chunk(true, &fixture.conn).is_some());
		assert!(fixture.position_change().is_some());

		// Before the playlist: must fail.
		assert!(!fixture.tracker.set_position_by_time(timescale.to_time(START / 2), false, true));
		assert!(!fixture.tracker.set_position_by_time(timescale.to_time(START / 2), false, false));

		// Restart from the start position.
		fixture.clear();
		let start = fixture.tracker.start_position();
		assert!(start.is_valid());
		fixture.tracker.set_position(start, false);
		assert!(fixture.tracker.next_chunk(true, &fixture.conn).is_some());
		assert_eq!(fixture.position_change(), Some(timescale.to_time(START)));
		assert_eq!(fixture.tracker.playback_time(false), timescale.to_time(START));

		// Unaligned position resolves to the enclosing segment.
		fixture.clear();
		assert!(fixture
			.tracker
			.set_position_by_time(timescale.to_time(START + 250), false, false));
		assert!(fixture.tracker.next_chunk(true, &fixture.conn).is_some());
		assert_eq!(fixture.position_change(), Some(timescale.to_time(START + 200)));
		assert_eq!(fixture.tracker.playback_time(false), timescale.to_time(START + 200));
	}

	#[test]
	fn switches_gate_on_init_and_translate_events() {
		let mut fixture = Fixture::new();
		let rep0 = fixture.add_list_representation("0", 5, 100, |_| "sample/aac".to_string());
		let rep1 = fixture.add_list_representation("1", 5, 100, |_| "sample/aac".to_string());
		let timescale = timescale();

		{
			let mut playlist = fixture.playlist.lock().unwrap();

			// An authored discontinuity on rep0's last segment.
			let node = playlist.representation(rep0).unwrap().node();
			let list_id = playlist.tree().get_attr(node, crate::playlist::AttrKind::SegmentList).unwrap();
			let list = playlist.tree_mut().list_mut(list_id).unwrap();
			let mut flagged = (*list.segments()[4]).clone();
			flagged.discontinuity = true;
			flagged.discontinuity_sequence = 457;
			let mut rebuilt = SegmentList::new(false);
			for segment in &list.segments()[..4] {
				rebuilt.add_segment((**segment).clone());
			}
			rebuilt.add_segment(flagged);
			playlist.tree_mut().replace_attr(node, AttrPayload::List(rebuilt));
			let list_id = playlist.tree().get_attr(node, crate::playlist::AttrKind::SegmentList).unwrap();
			playlist
				.tree_mut()
				.add_attr(list_id, AttrPayload::Timescale(Timescale::new(100)));

			// rep1 carries an init segment.
			let node = playlist.representation(rep1).unwrap().node();
			let list_id = playlist.tree().get_attr(node, crate::playlist::AttrKind::SegmentList).unwrap();
			playlist.tree_mut().list_mut(list_id).unwrap().init_segment = Some(Arc::new(Segment::init("sample/aacinit")));

			assert!(playlist.adaptation_set(fixture.set).unwrap().segment_aligned);
			assert_eq!(playlist.adaptation_set(fixture.set).unwrap().representations().len(), 2);
		}

		// Initial switch notification.
		fixture.clear();
		assert!(fixture.tracker.set_start_position());
		assert!(fixture.tracker.next_chunk(true, &fixture.conn).is_some());
		let (prev, next) = fixture.switch().unwrap();
		assert_eq!(prev, None);
		assert_eq!(next, Some(Id::new("0")));

		// Ask the logic to switch; not allowed at this boundary.
		fixture.logic_index.store(1, Ordering::Relaxed);
		fixture.clear();
		assert!(fixture.tracker.next_chunk(false, &fixture.conn).is_some());
		assert!(fixture.switch().is_none());

		// Allowed now: the new representation re-sends its init first.
		fixture.clear();
		let chunk = fixture.tracker.next_chunk(true, &fixture.conn).unwrap();
		let (prev, next) = fixture.switch().unwrap();
		assert_eq!(prev, Some(Id::new("0")));
		assert_eq!(next, Some(Id::new("1")));
		assert_eq!(chunk.content_type().as_deref(), Some("sample/aacinit"));
		let (sequence, start, duration) = fixture.segment_change().unwrap();
		assert_eq!(sequence, 456);
		assert_eq!(start, timescale.to_time(START + 100 * 2));
		assert_eq!(duration, timescale.to_time(100));

		// The media segment follows with the same timing.
		fixture.clear();
		let chunk = fixture.tracker.next_chunk(true, &fixture.conn).unwrap();
		assert!(fixture.switch().is_none());
		assert_eq!(chunk.content_type().as_deref(), Some("sample/aac"));
		let (sequence, start, duration) = fixture.segment_change().unwrap();
		assert_eq!(sequence, 456);
		assert_eq!(start, timescale.to_time(START + 100 * 2));
		assert_eq!(duration, timescale.to_time(100));

		// Switch back.
		fixture.logic_index.store(0, Ordering::Relaxed);
		fixture.clear();
		assert!(fixture.tracker.next_chunk(true, &fixture.conn).is_some());
		let (prev, next) = fixture.switch().unwrap();
		assert_eq!(prev, Some(Id::new("1")));
		assert_eq!(next, Some(Id::new("0")));

		// Continuity and sequence handling across the authored discontinuity.
		fixture.clear();
		assert!(fixture.tracker.next_chunk(true, &fixture.conn).is_some());
		assert!(fixture.discontinuity());
		let (sequence, _, _) = fixture.segment_change().unwrap();
		assert_eq!(sequence, 457);

		// Restart on rep1: init must come back before anything else.
		fixture.logic_index.store(1, Ordering::Relaxed);
		fixture.clear();
		let start = fixture.tracker.start_position();
		assert!(start.is_valid());
		fixture.tracker.set_position(start, false);
		let chunk = fixture.tracker.next_chunk(true, &fixture.conn).unwrap();
		let (prev, next) = fixture.switch().unwrap();
		assert_eq!(prev, None);
		assert_eq!(next, Some(Id::new("1")));
		assert_eq!(chunk.content_type().as_deref(), Some("sample/aacinit"));

		// rep1's init must not be followed by an unmatched rep0 segment.
		fixture.logic_index.store(0, Ordering::Relaxed);
		fixture.clear();
		let chunk = fixture.tracker.next_chunk(true, &fixture.conn).unwrap();
		assert!(fixture.switch().is_none());
		assert_eq!(chunk.content_type().as_deref(), Some("sample/aac"));

		// The next segment boundary allows the switch.
		fixture.clear();
		assert!(fixture.tracker.next_chunk(true, &fixture.conn).is_some());
		assert!(fixture.switch().is_some());
	}

	#[test]
	fn inconsistent_numbering_translates_through_time() {
		let mut fixture = Fixture::new();
		let rep0 = fixture.add_list_representation("0", 10, 100, |_| "sample/aac".to_string());
		let rep1 = fixture.add_list_representation("1", 4, 250, |_| "sample/aac".to_string());
		let timescale = timescale();

		{
			let mut playlist = fixture.playlist.lock().unwrap();
			playlist.representation_mut(rep0).unwrap().consistent_segment_number = false;
			playlist.representation_mut(rep1).unwrap().consistent_segment_number = false;
		}

		// Seek on rep0.
		fixture.clear();
		assert!(fixture
			.tracker
			.set_position_by_time(timescale.to_time(START + 300), false, false));
		assert!(fixture.tracker.next_chunk(true, &fixture.conn).is_some());
		assert_eq!(fixture.position_change(), Some(timescale.to_time(START + 300)));
		assert_eq!(fixture.tracker.playback_time(false), timescale.to_time(START + 300));

		// Switch to rep1: the cursor converts through playback time.
		fixture.logic_index.store(1, Ordering::Relaxed);
		fixture.clear();
		assert!(fixture.tracker.next_chunk(true, &fixture.conn).is_some());
		assert!(fixture.switch().is_some());
		assert_eq!(fixture.tracker.playback_time(false), timescale.to_time(START + 250));
	}

	struct LazyUpdater {
		loaded: bool,
	}

	impl crate::playlist::RepresentationUpdater for LazyUpdater {
		fn needs_update(&self, _number: u64) -> bool {
			!self.loaded
		}

		fn fetch_update(&mut self, _resources: &SharedResources) -> Result<Option<crate::playlist::RepresentationUpdate>> {
			self.loaded = true;
			let mut list = SegmentList::new(true);
			for i in 0..3u64 {
				let mut segment = Segment::media("sample/aac");
				segment.sequence = 10 + i;
				segment.start_time = 100 * i as Stime;
				segment.duration = 100;
				list.add_segment(segment);
			}
			Ok(Some(crate::playlist::RepresentationUpdate {
				list: Some(list),
				..Default::default()
			}))
		}
	}

	#[test]
	fn lazily_loaded_representation_updates_before_start() {
		let fixture = Fixture::new();
		{
			let mut playlist = fixture.playlist.lock().unwrap();
			let rep = playlist.add_representation(fixture.set);
			playlist.representation_mut(rep).unwrap().id = Id::new("0");
			playlist
				.representation_mut(rep)
				.unwrap()
				.set_updater(Box::new(LazyUpdater { loaded: false }));
			let node = playlist.representation(rep).unwrap().node();
			playlist
				.tree_mut()
				.add_attr(node, AttrPayload::Timescale(Timescale::new(100)));
		}

		let mut tracker = fixture.tracker;
		let pos = tracker.start_position();
		assert!(pos.is_valid());
		assert_eq!(pos.number, 10);
	}
}

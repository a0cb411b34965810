//! Drives the tracker over a small synthetic VOD playlist, end to end.
//!
//! Everything the core would normally get from a manifest parser and a connection pool is
//! built inline here, so the example runs without touching the network:
//!
//! ```sh
//! cargo run --example walkthrough
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use adaptive::http::{BytesRange, ChunkSource, ChunkType, ConnectionManager, RequestStatus};
use adaptive::logic::{AdaptationLogic, DefaultBufferingLogic};
use adaptive::playlist::{AttrPayload, Id, Playlist, RepAddr, Segment, SegmentList, SetAddr};
use adaptive::tracker::{SegmentTracker, TrackerEvent, TrackerListener};
use adaptive::{ChunkInterface, SharedResources, Timescale};

use bytes::Bytes;

/// Serves canned bytes for every URL, the way a connection pool would serve HTTP bodies.
struct MemoryConnections {
	responses: HashMap<String, Vec<u8>>,
}

struct MemorySource {
	data: Vec<u8>,
	offset: usize,
	content_type: String,
}

impl ChunkSource for MemorySource {
	fn content_type(&self) -> Option<String> {
		Some(self.content_type.clone())
	}

	fn request_status(&self) -> RequestStatus {
		if self.data.is_empty() {
			RequestStatus::NotFound
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
		let block = Bytes::copy_from_slice(&self.data[self.offset..self.offset + take]);
		self.offset += take;
		Some(block)
	}

	fn has_more_data(&self) -> bool {
		self.offset < self.data.len()
	}

	fn bytes_read(&self) -> usize {
		self.offset
	}
}

impl ConnectionManager for MemoryConnections {
	fn make_source(
		&self,
		uri: &str,
		_rep_id: &Id,
		_chunk_type: ChunkType,
		_range: Option<BytesRange>,
	) -> Option<Box<dyn ChunkSource>> {
		Some(Box::new(MemorySource {
			data: self.responses.get(uri).cloned().unwrap_or_default(),
			offset: 0,
			content_type: "video/mp2t".to_string(),
		}))
	}
}

/// Always picks the highest bandwidth; a stand-in for a real ABR implementation.
struct HighestBandwidth;

impl AdaptationLogic for HighestBandwidth {
	fn next_representation(&mut self, playlist: &Playlist, set: SetAddr, _: Option<RepAddr>) -> Option<RepAddr> {
		playlist
			.representations(set)
			.max_by_key(|(_, rep)| rep.bandwidth)
			.map(|(addr, _)| addr)
	}
}

struct PrintEvents;

impl TrackerListener for PrintEvents {
	fn tracker_event(&mut self, event: &TrackerEvent) {
		println!("  event: {event:?}");
	}
}

fn build_playlist() -> Playlist {
	let mut playlist = Playlist::new();
	playlist.base_urls.push(adaptive::playlist::Url::new("http://example.com/vod/"));

	let period = playlist.add_period();
	let set = playlist.add_adaptation_set(period);
	playlist.adaptation_set_mut(set).unwrap().id = Id::new("video");

	let timescale = Timescale::new(90_000);
	for (name, bandwidth) in [("lo", 800_000u64), ("hi", 2_400_000u64)] {
		let rep = playlist.add_representation(set);
		let representation = playlist.representation_mut(rep).unwrap();
		representation.id = Id::new(name);
		representation.bandwidth = bandwidth;
		representation.add_codecs("avc1.64001f,mp4a.40.2");

		let node = playlist.representation(rep).unwrap().node();
		let mut list = SegmentList::new(false);
		for i in 0..4u64 {
			let mut segment = Segment::media(format!("{name}/seg-{i}.ts"));
			segment.sequence = i;
			segment.start_time = (i * 90_000 * 4) as i64;
			segment.duration = 90_000 * 4;
			list.add_segment(segment);
		}
		let list_id = playlist.tree_mut().add_attr(node, AttrPayload::List(list));
		playlist.tree_mut().add_attr(list_id, AttrPayload::Timescale(timescale));
	}

	playlist
}

fn main() {
	// A transport-stream sync byte so the tracker's probe recognizes the payload.
	let mut payload = vec![0u8; 188 * 2];
	payload[0] = 0x47;
	payload[188] = 0x47;

	let mut responses = HashMap::new();
	for name in ["lo", "hi"] {
		for i in 0..4 {
			responses.insert(format!("http://example.com/vod/{name}/seg-{i}.ts"), payload.clone());
		}
	}
	let conn = MemoryConnections { responses };

	let playlist = Arc::new(Mutex::new(build_playlist()));
	let set = playlist.lock().unwrap().first_set().expect("playlist has a set");

	let mut tracker = SegmentTracker::new(
		playlist,
		set,
		Arc::new(SharedResources::new()),
		Box::new(HighestBandwidth),
		Arc::new(DefaultBufferingLogic::default()),
	);
	tracker.register_listener(Box::new(PrintEvents));

	assert!(tracker.set_start_position());
	println!("start position: {:?}", tracker.start_position());

	while let Some(mut chunk) = tracker.next_chunk(true, &conn) {
		let mut total = 0;
		while let Some(block) = chunk.read_block() {
			total += block.len();
		}
		println!("fetched {total} bytes, format {}", chunk.stream_format());
	}

	println!("end of stream");
}

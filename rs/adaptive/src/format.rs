/// The container format of a stream, as far as segment handling cares.
///
/// The tracker probes this from the first bytes of a chunk when the manifest didn't say,
/// falling back on the server-declared MIME type. Anything beyond recognizing the container
/// (codec parameters, track layout) belongs to the demuxer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamFormat {
	#[default]
	Unknown,
	Unsupported,
	Mpeg2Ts,
	Mp4,
	WebVtt,
	Ttml,
	PackedAac,
	PackedAc3,
	PackedMp3,
	WebM,
	Ogg,
}

impl StreamFormat {
	/// Sniff a format from the first bytes of a media chunk.
	///
	/// Needs at most 12 bytes; fewer bytes simply reduce what can be recognized.
	pub fn probe(data: &[u8]) -> Self {
		if data.len() < 2 {
			return Self::Unknown;
		}

		// Packed audio first: ADTS and (E-)AC-3 sync words.
		if data[0] == 0xFF && (data[1] & 0xF6) == 0xF0 {
			return Self::PackedAac;
		}
		if data[0] == 0x0B && data[1] == 0x77 {
			return Self::PackedAc3;
		}
		if data[0] == 0xFF && (data[1] & 0xE0) == 0xE0 {
			return Self::PackedMp3;
		}

		// HLS packed audio segments commonly lead with an ID3 timestamp tag.
		if data.starts_with(b"ID3") {
			return Self::PackedAac;
		}

		if data.starts_with(b"WEBVTT") {
			return Self::WebVtt;
		}
		if data.starts_with(b"<?xml") || data.starts_with(b"<tt") {
			return Self::Ttml;
		}
		if data.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
			return Self::WebM;
		}
		if data.starts_with(b"OggS") {
			return Self::Ogg;
		}

		// ISOBMFF: any box type we'd expect to lead a segment.
		if data.len() >= 8 {
			match &data[4..8] {
				b"ftyp" | b"styp" | b"moov" | b"moof" | b"sidx" | b"skip" | b"uuid" => return Self::Mp4,
				_ => (),
			}
		}

		// A transport stream sync byte, confirmed on the next packet boundary when
		// enough bytes were peeked.
		if data[0] == 0x47 && (data.len() <= 188 || data[188] == 0x47) {
			return Self::Mpeg2Ts;
		}

		Self::Unknown
	}

	/// Map a server-declared MIME type to a format, the fallback when probing is
	/// inconclusive.
	pub fn from_mime(mime: &str) -> Self {
		let mime = mime.split(';').next().unwrap_or("").trim();
		match mime {
			"video/mp2t" => Self::Mpeg2Ts,
			"video/mp4" | "audio/mp4" | "application/mp4" => Self::Mp4,
			"audio/aac" | "audio/aacp" => Self::PackedAac,
			"audio/ac3" => Self::PackedAc3,
			"audio/mpeg" => Self::PackedMp3,
			"text/vtt" => Self::WebVtt,
			"application/ttml+xml" => Self::Ttml,
			"video/webm" | "audio/webm" => Self::WebM,
			"application/ogg" | "audio/ogg" => Self::Ogg,
			_ => Self::Unknown,
		}
	}

	pub fn is_known(self) -> bool {
		!matches!(self, Self::Unknown | Self::Unsupported)
	}
}

impl std::fmt::Display for StreamFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			Self::Unknown => "unknown",
			Self::Unsupported => "unsupported",
			Self::Mpeg2Ts => "mpeg2ts",
			Self::Mp4 => "mp4",
			Self::WebVtt => "webvtt",
			Self::Ttml => "ttml",
			Self::PackedAac => "aac",
			Self::PackedAc3 => "ac3",
			Self::PackedMp3 => "mp3",
			Self::WebM => "webm",
			Self::Ogg => "ogg",
		};
		f.write_str(name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn probe_packed_audio() {
		assert_eq!(StreamFormat::probe(&[0xFF, 0xF1, 0x00, 0x00]), StreamFormat::PackedAac);
		assert_eq!(StreamFormat::probe(&[0xFF, 0xF9, 0x00, 0x00]), StreamFormat::PackedAac);
		assert_eq!(StreamFormat::probe(&[0x0B, 0x77, 0x00, 0x00, 0x00, 0x00]), StreamFormat::PackedAc3);
		assert_eq!(StreamFormat::probe(&[0xFF, 0xFB, 0x90, 0x00]), StreamFormat::PackedMp3);
	}

	#[test]
	fn probe_containers() {
		assert_eq!(StreamFormat::probe(b"\x00\x00\x00\x20ftypisom"), StreamFormat::Mp4);
		assert_eq!(StreamFormat::probe(b"\x00\x00\x02\x48moof\x00\x00"), StreamFormat::Mp4);
		assert_eq!(StreamFormat::probe(b"WEBVTT\n\n00:00.000"), StreamFormat::WebVtt);
		let mut ts = [0xFFu8; 4];
		ts[0] = 0x47;
		assert_eq!(StreamFormat::probe(&ts), StreamFormat::Mpeg2Ts);
	}

	#[test]
	fn probe_inconclusive() {
		assert_eq!(StreamFormat::probe(&[]), StreamFormat::Unknown);
		assert_eq!(StreamFormat::probe(&[0x00]), StreamFormat::Unknown);
		assert_eq!(StreamFormat::probe(&[0x12, 0x34, 0x56, 0x78]), StreamFormat::Unknown);
	}

	#[test]
	fn mime_fallback() {
		assert_eq!(StreamFormat::from_mime("video/mp2t"), StreamFormat::Mpeg2Ts);
		assert_eq!(StreamFormat::from_mime("audio/mp4; codecs=\"mp4a.40.2\""), StreamFormat::Mp4);
		assert_eq!(StreamFormat::from_mime("sample/aac"), StreamFormat::Unknown);
	}
}

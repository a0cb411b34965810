use std::time::{SystemTime, UNIX_EPOCH};

/// A scaled tick: a duration or instant expressed in units of some [Timescale].
pub type Stime = i64;

/// A realtime tick in microseconds.
///
/// Signed so that relative offsets (e.g. a negative start offset into a live window) are
/// representable.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticks(i64);

impl Ticks {
	pub const ZERO: Self = Self(0);

	pub const fn from_secs(seconds: i64) -> Self {
		Self(seconds * 1_000_000)
	}

	pub const fn from_millis(millis: i64) -> Self {
		Self(millis * 1000)
	}

	pub const fn from_micros(micros: i64) -> Self {
		Self(micros)
	}

	pub const fn as_micros(self) -> i64 {
		self.0
	}

	pub const fn as_secs(self) -> i64 {
		self.0 / 1_000_000
	}

	pub const fn is_zero(self) -> bool {
		self.0 == 0
	}

	/// Wall clock time as ticks since the UNIX epoch.
	pub fn now_wall() -> Self {
		let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
		Self(elapsed.as_micros() as i64)
	}

	pub fn checked_sub(self, rhs: Self) -> Option<Self> {
		self.0.checked_sub(rhs.0).map(Self)
	}

	pub fn min(self, other: Self) -> Self {
		Self(self.0.min(other.0))
	}

	pub fn max(self, other: Self) -> Self {
		Self(self.0.max(other.0))
	}
}

impl std::ops::Add for Ticks {
	type Output = Self;

	fn add(self, rhs: Self) -> Self {
		Self(self.0 + rhs.0)
	}
}

impl std::ops::AddAssign for Ticks {
	fn add_assign(&mut self, rhs: Self) {
		self.0 += rhs.0;
	}
}

impl std::ops::Sub for Ticks {
	type Output = Self;

	fn sub(self, rhs: Self) -> Self {
		Self(self.0 - rhs.0)
	}
}

impl std::ops::SubAssign for Ticks {
	fn sub_assign(&mut self, rhs: Self) {
		self.0 -= rhs.0;
	}
}

impl std::ops::Rem for Ticks {
	type Output = Self;

	fn rem(self, rhs: Self) -> Self {
		Self(self.0 % rhs.0)
	}
}

impl std::ops::Div for Ticks {
	// A duration divided by a duration is a count.
	type Output = i64;

	fn div(self, rhs: Self) -> i64 {
		self.0 / rhs.0
	}
}

impl std::ops::Div<i64> for Ticks {
	type Output = Self;

	fn div(self, rhs: i64) -> Self {
		Self(self.0 / rhs)
	}
}

impl std::ops::Mul<i64> for Ticks {
	type Output = Self;

	fn mul(self, rhs: i64) -> Self {
		Self(self.0 * rhs)
	}
}

impl std::fmt::Display for Ticks {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}µs", self.0)
	}
}

/// The denominator converting scaled ticks to realtime: `scaled = seconds * timescale`.
///
/// A zero timescale is invalid; conversions through it collapse to zero rather than divide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timescale(u64);

impl Default for Timescale {
	fn default() -> Self {
		Self(0)
	}
}

impl Timescale {
	pub const fn new(scale: u64) -> Self {
		Self(scale)
	}

	pub const fn is_valid(self) -> bool {
		self.0 != 0
	}

	pub const fn get(self) -> u64 {
		self.0
	}

	/// Convert a scaled tick to realtime microseconds.
	///
	/// Split into whole and remainder parts so large tick values don't overflow the
	/// intermediate multiplication.
	pub fn to_time(self, t: Stime) -> Ticks {
		if self.0 == 0 {
			return Ticks::ZERO;
		}
		let scale = self.0 as i64;
		let v = t / scale;
		let r = t % scale;
		Ticks::from_micros(v * 1_000_000 + r * 1_000_000 / scale)
	}

	/// The exact inverse of [`to_time`](Self::to_time).
	pub fn to_scaled(self, t: Ticks) -> Stime {
		let scale = self.0 as i64;
		let micros = t.as_micros();
		let v = micros / 1_000_000;
		let r = micros % 1_000_000;
		v * scale + r * scale / 1_000_000
	}
}

impl From<u64> for Timescale {
	fn from(scale: u64) -> Self {
		Self(scale)
	}
}

/// The clocks a delivered segment carries: the demuxer clock, the media clock, and the
/// wall display clock. Any of them may be unknown.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SegmentTimes {
	pub demux: Option<Ticks>,
	pub media: Option<Ticks>,
	pub display: Option<Ticks>,
}

impl SegmentTimes {
	pub fn new(demux: Option<Ticks>, media: Option<Ticks>, display: Option<Ticks>) -> Self {
		Self { demux, media, display }
	}

	pub fn offset_by(&mut self, offset: Ticks) {
		if offset.is_zero() {
			return;
		}
		for time in [&mut self.demux, &mut self.media, &mut self.display] {
			if let Some(time) = time {
				*time += offset;
			}
		}
	}
}

/// Segment clocks plus the continuous (stitched) timestamp downstream consumers play by.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Times {
	pub continuous: Option<Ticks>,
	pub segment: SegmentTimes,
}

impl Times {
	pub fn new(segment: SegmentTimes, continuous: Option<Ticks>) -> Self {
		Self { continuous, segment }
	}

	pub fn offset_by(&mut self, offset: Ticks) {
		if let Some(continuous) = &mut self.continuous {
			*continuous += offset;
		}
		self.segment.offset_by(offset);
	}
}

/// Remembered timestamp anchors per discontinuity sequence.
///
/// Demuxers restart their clocks across discontinuities; consumers stitch them back
/// together by looking up the anchor recorded the last time the sequence was seen.
#[derive(Default)]
pub struct SynchronizationReferences {
	refs: std::collections::VecDeque<(u64, Times)>,
}

impl SynchronizationReferences {
	/// How many discontinuity sequences to remember.
	const DEPTH: usize = 10;

	/// A quarter of the 33-bit 90kHz clock roll, in microseconds. Anchors older than this
	/// are refreshed to prevent a false roll-over on lookup.
	const QUARTER_ROLL: i64 = (0x1_FFFF_FFFFi64 * 100 / 9) >> 2;

	pub fn add_reference(&mut self, sequence: u64, times: Times) {
		for (seq, existing) in &mut self.refs {
			if *seq != sequence {
				continue;
			}
			let stale = match (times.continuous, existing.continuous) {
				(Some(new), Some(old)) => (new - old).as_micros() > Self::QUARTER_ROLL,
				_ => false,
			};
			if stale {
				*existing = times;
			}
			return;
		}

		while self.refs.len() >= Self::DEPTH {
			self.refs.pop_back();
		}
		self.refs.push_front((sequence, times));
	}

	pub fn reference(&self, sequence: u64) -> Option<Times> {
		self.refs
			.iter()
			.find(|(seq, _)| *seq == sequence)
			.map(|(_, times)| *times)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn conversion_round_trip() {
		// Exact for every timescale dividing the microsecond clock.
		for scale in [1u64, 8, 100, 1000, 250_000, 1_000_000] {
			let timescale = Timescale::new(scale);
			for t in [0i64, 1, 1337, 90_000, 123_456_789] {
				assert_eq!(timescale.to_scaled(timescale.to_time(t)), t, "scale {scale} tick {t}");
			}
		}
	}

	#[test]
	fn coarse_timescales_floor() {
		// 90kHz does not divide 1MHz; conversions floor instead of rounding.
		let timescale = Timescale::new(90_000);
		assert_eq!(timescale.to_time(90_000), Ticks::from_secs(1));
		assert_eq!(timescale.to_scaled(Ticks::from_secs(1)), 90_000);
		assert_eq!(timescale.to_time(1337), Ticks::from_micros(14_855));
	}

	#[test]
	fn invalid_timescale_yields_zero() {
		let timescale = Timescale::default();
		assert!(!timescale.is_valid());
		assert_eq!(timescale.to_time(123_456), Ticks::ZERO);
	}

	#[test]
	fn large_values_do_not_overflow() {
		let timescale = Timescale::new(10_000);
		// A century of 10kHz ticks; the split division keeps the intermediate products
		// in range.
		let t: Stime = 10_000i64 * 3600 * 24 * 365 * 100;
		assert_eq!(timescale.to_scaled(timescale.to_time(t)), t);
	}

	#[test]
	fn tick_arithmetic() {
		let a = Ticks::from_secs(8);
		let b = Ticks::from_secs(3);
		assert_eq!(a - b, Ticks::from_secs(5));
		assert_eq!(a % b, Ticks::from_secs(2));
		assert_eq!(a / b, 2);
		assert_eq!(b * 2, Ticks::from_secs(6));
	}

	#[test]
	fn segment_times_offset_skips_unknown_clocks() {
		let mut times = Times::new(
			SegmentTimes::new(Some(Ticks::from_secs(1)), None, Some(Ticks::from_secs(3))),
			Some(Ticks::from_secs(5)),
		);
		times.offset_by(Ticks::from_secs(2));
		assert_eq!(times.continuous, Some(Ticks::from_secs(7)));
		assert_eq!(times.segment.demux, Some(Ticks::from_secs(3)));
		assert_eq!(times.segment.media, None);
		assert_eq!(times.segment.display, Some(Ticks::from_secs(5)));
	}

	#[test]
	fn synchronization_references_keep_the_oldest_anchor() {
		let mut refs = SynchronizationReferences::default();
		let anchor = Times::new(SegmentTimes::default(), Some(Ticks::from_secs(10)));
		refs.add_reference(7, anchor);

		// A nearby update for the same sequence does not move the anchor.
		let newer = Times::new(SegmentTimes::default(), Some(Ticks::from_secs(11)));
		refs.add_reference(7, newer);
		assert_eq!(refs.reference(7), Some(anchor));
		assert_eq!(refs.reference(8), None);

		// Old sequences roll out once the depth is exceeded.
		for seq in 100..110 {
			refs.add_reference(seq, anchor);
		}
		assert_eq!(refs.reference(7), None);
		assert_eq!(refs.reference(109), Some(anchor));
	}
}

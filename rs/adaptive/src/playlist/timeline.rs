use std::collections::VecDeque;

use crate::playlist::SEQUENCE_INVALID;
use crate::Stime;

/// One `(t, d, r)` run of a timeline: `r + 1` segments of duration `d` starting at `t`,
/// the first numbered `number`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineElement {
	pub number: u64,
	pub duration: Stime,
	pub repeat: u64,
	pub start: Stime,
}

impl TimelineElement {
	/// Whether a scaled time falls inside this run.
	pub fn contains(&self, time: Stime) -> bool {
		time >= self.start && time < self.start + (self.repeat as Stime + 1) * self.duration
	}
}

/// A compressed sequence of segment timings.
///
/// Elements implicitly chain (`next.start = prev.start + prev.duration * (prev.repeat + 1)`)
/// unless an explicit start resets the clock at a discontinuity.
#[derive(Debug, Default, Clone)]
pub struct SegmentTimeline {
	elements: VecDeque<TimelineElement>,
}

impl SegmentTimeline {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn elements(&self) -> impl Iterator<Item = &TimelineElement> {
		self.elements.iter()
	}

	pub fn is_empty(&self) -> bool {
		self.elements.is_empty()
	}

	/// Append a run. A zero `start` on a non-first element chains off the previous run.
	pub fn add_element(&mut self, number: u64, duration: Stime, repeat: u64, start: Stime) {
		let start = match self.elements.back() {
			Some(last) if start == 0 => last.start + last.duration * (last.repeat as Stime + 1),
			_ => start,
		};
		self.elements.push_back(TimelineElement {
			number,
			duration,
			repeat,
			start,
		});
	}

	pub fn total_length(&self) -> Stime {
		self.elements
			.iter()
			.map(|el| el.duration * (el.repeat as Stime + 1))
			.sum()
	}

	pub fn min_element_number(&self) -> u64 {
		self.elements.front().map(|el| el.number).unwrap_or(0)
	}

	pub fn max_element_number(&self) -> u64 {
		self.elements.back().map(|el| el.number + el.repeat).unwrap_or(0)
	}

	/// Map a sequence number to the index of the element run holding it.
	pub fn element_index_by_sequence(&self, number: u64) -> u64 {
		for (index, el) in self.elements.iter().enumerate() {
			if number >= el.number && number <= el.number + el.repeat {
				return index as u64;
			}
			if number < el.number {
				break;
			}
		}
		SEQUENCE_INVALID
	}

	/// The number of the segment holding a scaled playback time.
	///
	/// Times before the window clamp to the first segment, times past a run's end (e.g.
	/// inside a discontinuity hole) to its last repeat.
	pub fn element_number_by_scaled_time(&self, scaled: Stime) -> u64 {
		let mut number = self.elements.front().map(|el| el.number).unwrap_or(0);
		for el in &self.elements {
			if scaled < el.start {
				break;
			}
			let offset = match el.duration {
				d if d > 0 => ((scaled - el.start) / d) as u64,
				_ => 0,
			};
			number = el.number + offset.min(el.repeat);
		}
		number
	}

	/// The scaled start time and duration of a segment number.
	///
	/// Out-of-range numbers clamp to the nearest run boundary, as updates can briefly
	/// outpace the cursor.
	pub fn scaled_time_duration_by_number(&self, number: u64) -> (Stime, Stime) {
		let mut total: Stime = 0;
		let mut lastduration: Stime = 0;

		for (i, el) in self.elements.iter().enumerate() {
			// Start of list, or an explicit start after a discontinuity.
			if i == 0 || el.start != 0 {
				total = el.start;
			}
			lastduration = el.duration;

			if number <= el.number {
				break;
			}
			if number <= el.number + el.repeat {
				total += el.duration * (number - el.number) as Stime;
				break;
			}
			total += el.duration * (el.repeat as Stime + 1);
		}

		(total, lastduration)
	}

	pub fn scaled_time_by_number(&self, number: u64) -> Stime {
		self.scaled_time_duration_by_number(number).0
	}

	/// Total scaled duration of the segments strictly after `number`.
	pub fn min_ahead_scaled_time(&self, number: u64) -> Stime {
		let mut total: Stime = 0;
		for el in self.elements.iter().rev() {
			if number < el.number {
				total += el.duration * (el.repeat as Stime + 1);
			} else if number <= el.number + el.repeat {
				total += el.duration * (el.number + el.repeat - number) as Stime;
				break;
			} else {
				break;
			}
		}
		total
	}

	/// Drop all segments numbered below `number`, splitting the front run in place when
	/// the cut lands inside it. Returns how many segments were dropped.
	pub fn prune_by_sequence_number(&mut self, number: u64) -> usize {
		let mut pruned = 0;
		while let Some(el) = self.elements.front_mut() {
			if el.number >= number {
				break;
			} else if el.number + el.repeat >= number {
				let count = number - el.number;
				el.number += count;
				el.start += count as Stime * el.duration;
				el.repeat -= count;
				pruned += count as usize;
				break;
			} else {
				pruned += el.repeat as usize + 1;
				self.elements.pop_front();
			}
		}
		pruned
	}

	/// Fuse a refreshed timeline into this one.
	///
	/// Overlapping runs extend the tail's repeat count; genuinely new runs are appended
	/// and renumbered to continue the local sequence. Runs entirely in the past are
	/// dropped.
	pub fn merge_with(&mut self, mut other: SegmentTimeline) {
		if self.elements.is_empty() {
			self.elements = other.elements;
			return;
		}

		while let Some(mut el) = other.elements.pop_front() {
			let last = self.elements.back_mut().unwrap();
			if last.contains(el.start) {
				// Same run, but ours may have started mid-repeat.
				let count = ((el.start - last.start) / last.duration) as u64;
				last.repeat = last.repeat.max(el.repeat + count);
			} else if el.start >= last.start {
				// Did not exist in the previous timeline.
				el.number = last.number + last.repeat + 1;
				self.elements.push_back(el);
			}
			// Else: entirely in the past, drop.
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const START: Stime = 1337;

	#[test]
	fn empty_timeline() {
		let timeline = SegmentTimeline::new();
		assert_eq!(timeline.total_length(), 0);
		assert_eq!(timeline.element_index_by_sequence(123), SEQUENCE_INVALID);
		assert_eq!(timeline.element_number_by_scaled_time(123), 0);
		assert_eq!(timeline.min_ahead_scaled_time(0), 0);
		assert_eq!(timeline.min_element_number(), 0);
		assert_eq!(timeline.max_element_number(), 0);
	}

	#[test]
	fn simple_elements() {
		let mut timeline = SegmentTimeline::new();
		timeline.add_element(11, 100, 0, START);
		timeline.add_element(12, 50, 0, 0);
		timeline.add_element(13, 25, 0, 0);

		assert_eq!(timeline.min_element_number(), 11);
		assert_eq!(timeline.max_element_number(), 13);
		assert_eq!(timeline.total_length(), 175);

		assert_eq!(timeline.element_index_by_sequence(0), SEQUENCE_INVALID);
		assert_eq!(timeline.element_index_by_sequence(100), SEQUENCE_INVALID);
		assert_eq!(timeline.element_index_by_sequence(11), 0);
		assert_eq!(timeline.element_index_by_sequence(13), 2);

		assert_eq!(timeline.min_ahead_scaled_time(11), 75);
		assert_eq!(timeline.min_ahead_scaled_time(12), 25);
		assert_eq!(timeline.min_ahead_scaled_time(14), 0);

		assert_eq!(timeline.scaled_time_by_number(11), START);
		assert_eq!(timeline.scaled_time_by_number(13), START + 150);
		let (time, duration) = timeline.scaled_time_duration_by_number(12);
		assert_eq!(time, START + 100);
		assert_eq!(duration, 50);

		assert_eq!(timeline.element_number_by_scaled_time(START - 1), 11);
		assert_eq!(timeline.element_number_by_scaled_time(START + 9), 11);
		assert_eq!(timeline.element_number_by_scaled_time(START + 151), 13);
	}

	#[test]
	fn repeats() {
		let mut timeline = SegmentTimeline::new();
		timeline.add_element(11, 100, 0, START);
		timeline.add_element(12, 50, 0, 0);
		timeline.add_element(13, 25, 0, 0);
		timeline.add_element(14, 100, 1, 0);

		assert_eq!(timeline.min_element_number(), 11);
		assert_eq!(timeline.max_element_number(), 14 + 1);
		assert_eq!(timeline.total_length(), 175 + 100 * 2);
		assert_eq!(timeline.element_index_by_sequence(14), 3);
		assert_eq!(timeline.element_index_by_sequence(15), 3);

		timeline.add_element(16, 20, 9, 0);
		assert_eq!(timeline.max_element_number(), 16 + 9);
		assert_eq!(timeline.total_length(), 175 + 100 * 2 + 20 * 10);

		assert_eq!(timeline.min_ahead_scaled_time(14), 100 + 20 * 10);
		assert_eq!(timeline.min_ahead_scaled_time(15), 20 * 10);
		assert_eq!(timeline.min_ahead_scaled_time(20), 20 * 5);

		assert_eq!(timeline.scaled_time_by_number(15), START + 175 + 100);
		assert_eq!(timeline.scaled_time_by_number(21), START + 175 + 100 * 2 + 20 * 5);

		assert_eq!(timeline.element_number_by_scaled_time(START + 175 + 100 + 10), 15);
	}

	#[test]
	fn discontinuity_and_pruning() {
		let mut timeline = SegmentTimeline::new();
		timeline.add_element(11, 100, 0, START);
		timeline.add_element(12, 50, 0, 0);
		timeline.add_element(13, 25, 0, 0);
		timeline.add_element(14, 100, 1, 0);
		timeline.add_element(16, 20, 9, 0);

		// Discontinuity: explicit restart time, jumped numbering.
		timeline.add_element(40, 33, 1, START + 1000);
		assert_eq!(timeline.max_element_number(), 41);
		assert_eq!(timeline.total_length(), 175 + 100 * 2 + 20 * 10 + 66);
		assert_eq!(timeline.element_index_by_sequence(39), SEQUENCE_INVALID);
		assert_eq!(timeline.element_index_by_sequence(41), 5);

		assert_eq!(timeline.prune_by_sequence_number(24), 5 + 8);
		assert_eq!(timeline.min_element_number(), 24);
		assert_eq!(timeline.total_length(), 20 * 2 + 33 * 2);

		assert_eq!(timeline.prune_by_sequence_number(50), 4);
		assert_eq!(timeline.total_length(), 0);
	}

	#[test]
	fn merge_repeats() {
		let mut timeline = SegmentTimeline::new();
		timeline.add_element(1, 1000, 0, START);
		timeline.add_element(2, 2000, 1, 0);
		assert_eq!(timeline.max_element_number(), 2 + 1);
		assert_eq!(timeline.total_length(), 1000 + 2000 * 2);

		// Identical content merges to no change.
		let mut other = SegmentTimeline::new();
		other.add_element(1, 1000, 0, START);
		other.add_element(2, 2000, 1, 0);
		timeline.merge_with(other);
		assert_eq!(timeline.min_element_number(), 1);
		assert_eq!(timeline.max_element_number(), 2 + 1);
		assert_eq!(timeline.total_length(), 1000 + 2000 * 2);

		// Appends missing content.
		let mut other = SegmentTimeline::new();
		other.add_element(1, 1000, 0, START);
		other.add_element(2, 2000, 1, 0);
		other.add_element(4, 2, 99, 0);
		assert_eq!(other.max_element_number(), 4 + 99);
		timeline.merge_with(other);
		assert_eq!(timeline.max_element_number(), 4 + 99);
		assert_eq!(timeline.total_length(), 1000 + 2000 * 2 + 2 * 100);

		// Same run advertised one repeat in: no change.
		let mut other = SegmentTimeline::new();
		other.add_element(4 + 1, 2, 99 - 1, START + 1000 + 2000 * 2 + 2);
		timeline.merge_with(other);
		assert_eq!(timeline.max_element_number(), 4 + 99);

		// Same run, ten more repeats: extends the tail.
		let mut other = SegmentTimeline::new();
		other.add_element(4 + 1, 2, 99 - 1 + 10, START + 1000 + 2000 * 2 + 2);
		timeline.merge_with(other);
		assert_eq!(timeline.max_element_number(), 4 + 99 + 10);
	}
}

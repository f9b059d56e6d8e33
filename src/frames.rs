/*
 *  frames.rs
 *
 *  SkyMonS - what's overhead
 *  (c) 2025-26 Stuart Hunter
 *
 *  Frame rotation - four flights then the clock, on a fixed cadence
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use chrono::{DateTime, TimeDelta, Utc};

/// Flight frames in each cycle, the clock takes the last position.
pub const FLIGHTS_PER_CYCLE: u64 = 4;
pub const CYCLE_LEN: u64 = FLIGHTS_PER_CYCLE + 1;

/// What a frame index shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Clock,
    /// index into the display queue
    Flight(usize),
}

/// Map a frame counter onto the queue. The flight index keeps moving
/// across cycles so a long queue is walked end to end.
pub fn slot_for(frame_index: u64, queue_len: usize) -> Slot {
    if queue_len == 0 {
        return Slot::Clock;
    }
    let position = frame_index % CYCLE_LEN;
    if position == FLIGHTS_PER_CYCLE {
        return Slot::Clock;
    }
    let cycle = frame_index / CYCLE_LEN;
    let idx = (cycle * FLIGHTS_PER_CYCLE + position) % queue_len as u64;
    Slot::Flight(idx as usize)
}

/// Discrete frame counter advanced at most once per interval.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    frame_index: u64,
    last_advance: Option<DateTime<Utc>>,
    interval: TimeDelta,
}

impl FrameScheduler {
    pub fn new(interval: TimeDelta) -> Self {
        Self { frame_index: 0, last_advance: None, interval }
    }

    /// Returns true when the counter moved.
    pub fn advance(&mut self, now: DateTime<Utc>) -> bool {
        match self.last_advance {
            None => {
                self.last_advance = Some(now);
                false
            }
            Some(last) if now - last >= self.interval => {
                self.frame_index += 1;
                self.last_advance = Some(now);
                log::debug!("frame {} (slot {})", self.frame_index, self.frame_index % CYCLE_LEN);
                true
            }
            Some(_) => false,
        }
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn slot(&self, queue_len: usize) -> Slot {
        slot_for(self.frame_index, queue_len)
    }
}

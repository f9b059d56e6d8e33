/*
 *  timesource.rs
 *
 *  SkyMonS - what's overhead
 *  (c) 2025-26 Stuart Hunter
 *
 *  Wall clock and the regional summer-time rule
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
//! The device RTC runs on UTC. Local time is UTC plus one hour between
//! 01:00 UTC on the last Sunday of March and 01:00 UTC on the last Sunday
//! of October. Any calendar failure falls back to plain UTC, the clock
//! face must never take the loop down.

use chrono::{prelude::*, TimeDelta};

const SUMMER_OFFSET_SECS: i32 = 3600;

/// Calendar fields of the local (regional) time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl LocalTime {
    /// dd/mm as drawn on the clock frame
    pub fn date_str(&self) -> String {
        format!("{:02}/{:02}", self.day, self.month)
    }

    /// hh:mm as drawn on the clock frame
    pub fn time_str(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }
}

pub trait TimeSource {
    fn now(&self) -> DateTime<Utc>;

    fn apply_regional_dst(&self, utc: DateTime<Utc>) -> DateTime<FixedOffset> {
        apply_regional_dst(utc)
    }

    fn local_time(&self, utc: DateTime<Utc>) -> LocalTime {
        local_time(utc)
    }
}

/// System clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Day of month of the last Sunday, scanning 31 down to 25.
pub fn last_sunday(year: i32, month: u32) -> Option<u32> {
    (25..=31).rev().find(|&day| {
        NaiveDate::from_ymd_opt(year, month, day)
            .is_some_and(|d| d.weekday() == Weekday::Sun)
    })
}

/// Summer time window for `year` as [start, end) in UTC.
pub fn summer_bounds(year: i32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start_day = last_sunday(year, 3)?;
    let end_day = last_sunday(year, 10)?;
    let start = Utc.with_ymd_and_hms(year, 3, start_day, 1, 0, 0).single()?;
    let end = Utc.with_ymd_and_hms(year, 10, end_day, 1, 0, 0).single()?;
    Some((start, end))
}

/// Shift a UTC instant into regional time.
pub fn apply_regional_dst(utc: DateTime<Utc>) -> DateTime<FixedOffset> {
    let utc_offset = utc.fixed_offset();
    let offset = match summer_bounds(utc.year()) {
        Some((start, end)) if start <= utc && utc < end => SUMMER_OFFSET_SECS,
        Some(_) => 0,
        None => return utc_offset,
    };
    match FixedOffset::east_opt(offset) {
        Some(tz) => utc.with_timezone(&tz),
        None => utc_offset,
    }
}

pub fn local_time(utc: DateTime<Utc>) -> LocalTime {
    let t = apply_regional_dst(utc);
    LocalTime {
        year: t.year(),
        month: t.month(),
        day: t.day(),
        hour: t.hour(),
        minute: t.minute(),
        second: t.second(),
    }
}

/// Time elapsed between two instants, never negative.
#[inline]
pub fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> TimeDelta {
    (now - since).max(TimeDelta::zero())
}

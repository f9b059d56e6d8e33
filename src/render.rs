/*
 *  render.rs
 *
 *  SkyMonS - what's overhead
 *  (c) 2025-26 Stuart Hunter
 *
 *  Per-tick render decision and the render collaborator seam
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

use log::{debug, info};
use std::fmt;

use crate::timesource::LocalTime;

pub const WIFI_ERROR: &str = "WIFI ERROR";
pub const UPDATE_ERROR: &str = "UPDATE ERROR";

/// Everything the render layer needs for one flight frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightCard {
    /// ICAO callsign as broadcast
    pub callsign: String,
    pub display_callsign: String,
    pub route: Option<String>,
    /// ICAO carrier code, picks the logo
    pub carrier: Option<String>,
}

/// What to draw this tick. Pixels are the renderer's business.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Clock(LocalTime),
    Loading,
    Error(String),
    CountOverlay(usize),
    Flight(FlightCard),
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Clock(t) => write!(f, "{} {}", t.time_str(), t.date_str()),
            Frame::Loading => write!(f, "loading"),
            Frame::Error(msg) => write!(f, "{msg}"),
            Frame::CountOverlay(1) => write!(f, "1 Flight"),
            Frame::CountOverlay(n) => write!(f, "{n} Flights"),
            Frame::Flight(card) => match &card.route {
                Some(route) => write!(f, "{} {}", card.display_callsign, route),
                None => write!(f, "{}", card.display_callsign),
            },
        }
    }
}

impl Frame {
    /// Two clock frames in the same minute draw the same thing.
    fn same_face(&self, other: &Frame) -> bool {
        match (self, other) {
            (Frame::Clock(a), Frame::Clock(b)) => a.time_str() == b.time_str() && a.date_str() == b.date_str(),
            _ => self == other,
        }
    }
}

pub trait Renderer {
    fn render(&mut self, frame: &Frame);

    /// 0.0 ..= 1.0
    fn set_brightness(&mut self, level: f32);
}

/// Logs each changed frame, for headless runs.
#[derive(Debug, Default)]
pub struct ConsoleRenderer {
    last: Option<Frame>,
    brightness: Option<f32>,
}

impl ConsoleRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for ConsoleRenderer {
    fn render(&mut self, frame: &Frame) {
        if self.last.as_ref().is_some_and(|last| last.same_face(frame)) {
            return;
        }
        match frame {
            Frame::Flight(card) => info!(
                "[{}] {}{}",
                card.carrier.as_deref().unwrap_or("---"),
                frame,
                if card.display_callsign != card.callsign { format!(" ({})", card.callsign) } else { String::new() }
            ),
            _ => info!("{}", frame),
        }
        self.last = Some(frame.clone());
    }

    fn set_brightness(&mut self, level: f32) {
        if self.brightness != Some(level) {
            debug!("brightness {:.2}", level);
            self.brightness = Some(level);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(h: u32, m: u32, s: u32) -> Frame {
        Frame::Clock(LocalTime { year: 2025, month: 5, day: 1, hour: h, minute: m, second: s })
    }

    #[test]
    fn test_frame_text() {
        assert_eq!(clock(9, 5, 0).to_string(), "09:05 01/05");
        assert_eq!(Frame::CountOverlay(1).to_string(), "1 Flight");
        assert_eq!(Frame::CountOverlay(0).to_string(), "0 Flights");
        let card = FlightCard {
            callsign: "BAW117".into(),
            display_callsign: "BA117".into(),
            route: Some("LHR>JFK".into()),
            carrier: Some("BAW".into()),
        };
        assert_eq!(Frame::Flight(card).to_string(), "BA117 LHR>JFK");
    }

    #[test]
    fn test_console_renderer_dedups() {
        let mut r = ConsoleRenderer::new();
        r.render(&clock(9, 5, 0));
        r.render(&clock(9, 5, 30));
        assert_eq!(r.last, Some(clock(9, 5, 0)));
        r.render(&clock(9, 6, 0));
        assert_eq!(r.last, Some(clock(9, 6, 0)));
        r.set_brightness(0.5);
        assert_eq!(r.brightness, Some(0.5));
    }
}

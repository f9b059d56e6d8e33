/*
 *  scheduler.rs
 *
 *  SkyMonS - what's overhead
 *  (c) 2025-26 Stuart Hunter
 *
 *  Top level polling loop - fetch timing, backoff, night mode,
 *  asset resync and the per-tick render decision
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
use log::{debug, info, warn};
use std::collections::VecDeque;

use crate::assets::AssetSync;
use crate::config::{Config, NightConfig};
use crate::connectivity::Connectivity;
use crate::flight::carrier_of;
use crate::frames::{FrameScheduler, Slot};
use crate::positions::{FetchOutcome, FlightSource};
use crate::queue::DisplayQueue;
use crate::render::{FlightCard, Frame, Renderer, UPDATE_ERROR, WIFI_ERROR};
use crate::routes::{RouteLookup, RouteResolver};
use crate::timesource::{elapsed, LocalTime, TimeSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// waiting for a network link, never gives up
    Connecting,
    Operating,
}

/// External requests, applied at the start of the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    FetchNow,
    ToggleClockOnly,
    ShowCount,
}

/// Loop state, owned by the scheduler and only read from outside.
#[derive(Debug, Clone)]
pub struct ScheduleState {
    pub phase: Phase,
    /// `None` until the first fetch is scheduled
    pub fetch_due_at: Option<DateTime<Utc>>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    /// false until the first good fetch, and after any failed one
    pub last_fetch_ok: bool,
    pub night_mode: bool,
    pub last_asset_sync: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub clock_only: bool,
    pub count_overlay_until: Option<DateTime<Utc>>,
    pub frames: FrameScheduler,
}

impl ScheduleState {
    pub fn new(frame_interval: TimeDelta) -> Self {
        Self {
            phase: Phase::Connecting,
            fetch_due_at: None,
            last_attempt: None,
            last_success: None,
            last_fetch_ok: false,
            night_mode: false,
            last_asset_sync: None,
            last_error: None,
            clock_only: false,
            count_overlay_until: None,
            frames: FrameScheduler::new(frame_interval),
        }
    }

    pub fn fetch_due(&self, now: DateTime<Utc>) -> bool {
        self.fetch_due_at.is_none_or(|due| now >= due)
    }

    pub fn asset_sync_due(&self, now: DateTime<Utc>, interval: TimeDelta) -> bool {
        self.last_asset_sync.is_none_or(|last| elapsed(last, now) >= interval)
    }

    pub fn overlay_active(&self, now: DateTime<Utc>) -> bool {
        self.count_overlay_until.is_some_and(|until| now < until)
    }
}

/// Timing knobs lifted out of the config once.
#[derive(Debug, Clone)]
struct Cadence {
    poll_interval: TimeDelta,
    asset_sync_interval: TimeDelta,
    count_overlay: TimeDelta,
    night: NightConfig,
    carriers: Vec<String>,
}

pub struct PollingScheduler<S, L, A, R, C, T> {
    source: S,
    routes: RouteResolver<L>,
    assets: A,
    renderer: R,
    connectivity: C,
    clock: T,
    queue: DisplayQueue,
    state: ScheduleState,
    cadence: Cadence,
    pending: VecDeque<Trigger>,
    brightness: Option<f32>,
}

impl<S, L, A, R, C, T> PollingScheduler<S, L, A, R, C, T>
where
    S: FlightSource,
    L: RouteLookup,
    A: AssetSync,
    R: Renderer,
    C: Connectivity,
    T: TimeSource,
{
    pub fn new(
        cfg: &Config,
        source: S,
        routes: RouteResolver<L>,
        assets: A,
        renderer: R,
        connectivity: C,
        clock: T,
    ) -> Self {
        Self {
            source,
            routes,
            assets,
            renderer,
            connectivity,
            clock,
            queue: DisplayQueue::new(),
            state: ScheduleState::new(cfg.schedule.frame_interval()),
            cadence: Cadence {
                poll_interval: cfg.schedule.poll_interval(),
                asset_sync_interval: cfg.schedule.asset_sync_interval(),
                count_overlay: cfg.schedule.count_overlay(),
                night: cfg.night.clone(),
                carriers: cfg.search.carriers.clone(),
            },
            pending: VecDeque::new(),
            brightness: None,
        }
    }

    pub fn state(&self) -> &ScheduleState {
        &self.state
    }

    pub fn queue(&self) -> &DisplayQueue {
        &self.queue
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn trigger(&mut self, trigger: Trigger) {
        debug!("trigger {:?}", trigger);
        self.pending.push_back(trigger);
    }

    /// One loop iteration against the wall clock.
    pub async fn tick(&mut self) -> Frame {
        let now = self.clock.now();
        self.tick_at(now).await
    }

    /// One loop iteration at `now`. Returns what was rendered.
    pub async fn tick_at(&mut self, now: DateTime<Utc>) -> Frame {
        if self.state.phase == Phase::Connecting {
            if !self.connectivity.is_connected() {
                let frame = Frame::Error(WIFI_ERROR.to_string());
                self.renderer.render(&frame);
                return frame;
            }
            info!("Network connected, starting flight polling");
            self.state.phase = Phase::Operating;
            self.state.fetch_due_at = Some(now);
        }

        let local = self.clock.local_time(now);
        self.update_night_mode(local.hour);

        let mut force_fetch = false;
        while let Some(trigger) = self.pending.pop_front() {
            match trigger {
                Trigger::FetchNow => force_fetch = true,
                Trigger::ToggleClockOnly => {
                    self.state.clock_only = !self.state.clock_only;
                    info!("Clock only {}", if self.state.clock_only { "on" } else { "off" });
                }
                Trigger::ShowCount => {
                    self.state.count_overlay_until = Some(now + self.cadence.count_overlay);
                }
            }
        }

        if force_fetch {
            info!("Manual fetch requested");
            self.fetch(now).await;
        } else if !self.state.night_mode && self.state.fetch_due(now) {
            self.fetch(now).await;
        }

        if self.state.asset_sync_due(now, self.cadence.asset_sync_interval) {
            self.sync_assets(now).await;
        }

        self.update_brightness();

        let frame = self.compose(now, local).await;
        self.renderer.render(&frame);
        frame
    }

    fn update_night_mode(&mut self, hour: u32) {
        let night = self.cadence.night.contains(hour);
        if night != self.state.night_mode {
            info!("Night mode {}", if night { "on, polling suspended" } else { "off" });
            self.state.night_mode = night;
        }
    }

    fn update_brightness(&mut self) {
        let level = if self.state.night_mode {
            self.cadence.night.brightness
        } else {
            self.cadence.night.day_brightness
        };
        if self.brightness != Some(level) {
            self.renderer.set_brightness(level);
            self.brightness = Some(level);
        }
    }

    /// The only writer of the display queue.
    async fn fetch(&mut self, now: DateTime<Utc>) {
        self.state.fetch_due_at = Some(now + self.cadence.poll_interval);
        self.state.last_attempt = Some(now);

        match self.source.fetch(now).await {
            FetchOutcome::Flights(flights) => {
                self.queue.merge_in(&flights);
                self.state.last_fetch_ok = true;
                self.state.last_success = Some(now);
                self.state.last_error = None;
                debug!("{} flights queued", self.queue.len());
            }
            FetchOutcome::Backoff { status, retry_at } => {
                self.state.last_fetch_ok = false;
                self.state.fetch_due_at = Some(retry_at);
                warn!("Next position fetch after {} ({})", retry_at.format("%H:%M:%S"), status);
            }
            FetchOutcome::Failed(e) => {
                debug!("fetch failed: {}", e);
                self.state.last_fetch_ok = false;
                self.state.last_error = Some(UPDATE_ERROR.to_string());
            }
            FetchOutcome::Skipped => {}
        }
    }

    async fn sync_assets(&mut self, now: DateTime<Utc>) {
        self.state.last_asset_sync = Some(now);
        if let Err(e) = self.assets.sync(&self.cadence.carriers).await {
            warn!("Logo sync failed: {}", e);
        }
    }

    async fn compose(&mut self, now: DateTime<Utc>, local: LocalTime) -> Frame {
        if self.state.night_mode || self.state.clock_only {
            return Frame::Clock(local);
        }
        if !self.state.last_fetch_ok {
            return match &self.state.last_error {
                Some(msg) => Frame::Error(msg.clone()),
                None => Frame::Loading,
            };
        }
        if self.queue.is_empty() {
            return Frame::Clock(local);
        }

        self.state.frames.advance(now);

        if self.state.overlay_active(now) {
            return Frame::CountOverlay(self.queue.len());
        }

        match self.state.frames.slot(self.queue.len()) {
            Slot::Clock => Frame::Clock(local),
            Slot::Flight(idx) => {
                let Some(entry) = self.queue.get(idx) else {
                    return Frame::Clock(local);
                };
                let callsign = entry.callsign.clone();
                let route = self.routes.resolve_route(&callsign, now).await;
                let display_callsign = self.routes.resolve_display_callsign(&callsign, now).await;
                Frame::Flight(FlightCard {
                    carrier: carrier_of(&callsign).map(str::to_string),
                    callsign,
                    display_callsign,
                    route,
                })
            }
        }
    }
}

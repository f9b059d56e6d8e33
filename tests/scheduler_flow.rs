/*
 *  tests/scheduler_flow.rs
 *
 *  Polling loop driven end to end with in-memory collaborators
 *
 *  SkyMonS - what's overhead
 *  (c) 2025-26 Stuart Hunter
 */

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use skymons::assets::AssetSync;
use skymons::config::{BackoffConfig, Config};
use skymons::connectivity::Connectivity;
use skymons::error::{AssetError, FetchError, RouteError};
use skymons::flight::Flight;
use skymons::positions::{FetchOutcome, FlightSource};
use skymons::render::{Frame, Renderer};
use skymons::routes::{RouteInfo, RouteLookup, RouteResolver};
use skymons::scheduler::{Phase, PollingScheduler, Trigger};
use skymons::timesource::TimeSource;

enum Step {
    Flights(Vec<Flight>),
    Status(u16),
    Fail,
    Skip,
}

struct ScriptedSource {
    script: VecDeque<Step>,
    steady: Vec<Flight>,
    calls: Rc<Cell<usize>>,
}

impl FlightSource for ScriptedSource {
    async fn fetch(&mut self, now: DateTime<Utc>) -> FetchOutcome {
        self.calls.set(self.calls.get() + 1);
        match self.script.pop_front() {
            Some(Step::Flights(f)) => FetchOutcome::Flights(f),
            Some(Step::Status(status)) => FetchOutcome::Backoff {
                status,
                retry_at: now + BackoffConfig::default().delay_for(status).unwrap(),
            },
            Some(Step::Fail) => FetchOutcome::Failed(FetchError::Status(500)),
            Some(Step::Skip) => FetchOutcome::Skipped,
            None => FetchOutcome::Flights(self.steady.clone()),
        }
    }
}

struct FakeRoutes;

impl RouteLookup for FakeRoutes {
    async fn lookup(&self, callsign: &str) -> Result<RouteInfo, RouteError> {
        match callsign {
            "BAW1" => Ok(RouteInfo { route: Some("LHR>JFK".into()), callsign_iata: Some("BA1".into()) }),
            _ => Err(RouteError::Status(404)),
        }
    }
}

struct CountingAssets(Rc<Cell<usize>>);

impl AssetSync for CountingAssets {
    async fn sync(&mut self, _codes: &[String]) -> Result<usize, AssetError> {
        self.0.set(self.0.get() + 1);
        Ok(0)
    }
}

#[derive(Default)]
struct Recording {
    frames: Vec<Frame>,
    brightness: Vec<f32>,
}

struct RecordingRenderer(Rc<RefCell<Recording>>);

impl Renderer for RecordingRenderer {
    fn render(&mut self, frame: &Frame) {
        self.0.borrow_mut().frames.push(frame.clone());
    }

    fn set_brightness(&mut self, level: f32) {
        self.0.borrow_mut().brightness.push(level);
    }
}

struct Link(Rc<Cell<bool>>);

impl Connectivity for Link {
    fn is_connected(&mut self) -> bool {
        self.0.get()
    }
}

struct FixedClock(DateTime<Utc>);

impl TimeSource for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

type Sched = PollingScheduler<ScriptedSource, FakeRoutes, CountingAssets, RecordingRenderer, Link, FixedClock>;

struct Harness {
    sched: Sched,
    fetches: Rc<Cell<usize>>,
    syncs: Rc<Cell<usize>>,
    link: Rc<Cell<bool>>,
    out: Rc<RefCell<Recording>>,
}

fn flight(icao: &str, callsign: &str, distance_km: f64) -> Flight {
    Flight {
        icao24: icao.into(),
        callsign: callsign.into(),
        latitude: 51.5,
        longitude: -0.4,
        altitude_m: 9000.0,
        distance_km,
        on_ground: false,
    }
}

fn three() -> Vec<Flight> {
    vec![flight("aaa001", "BAW1", 3.0), flight("bbb002", "EZY2", 5.0), flight("ccc003", "VIR3", 8.0)]
}

fn harness(script: Vec<Step>, steady: Vec<Flight>) -> Harness {
    let fetches = Rc::new(Cell::new(0));
    let syncs = Rc::new(Cell::new(0));
    let link = Rc::new(Cell::new(true));
    let out = Rc::new(RefCell::new(Recording::default()));
    let cfg = Config::default();
    let sched = PollingScheduler::new(
        &cfg,
        ScriptedSource { script: script.into(), steady, calls: fetches.clone() },
        RouteResolver::new(FakeRoutes, &cfg.routes),
        CountingAssets(syncs.clone()),
        RecordingRenderer(out.clone()),
        Link(link.clone()),
        FixedClock(day()),
    );
    Harness { sched, fetches, syncs, link, out }
}

/// 13:00 local, summer time
fn day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap()
}

/// 03:00 local, winter time
fn night() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 3, 0, 0).unwrap()
}

fn secs(s: i64) -> TimeDelta {
    TimeDelta::seconds(s)
}

fn callsign_of(frame: &Frame) -> Option<&str> {
    match frame {
        Frame::Flight(card) => Some(card.callsign.as_str()),
        _ => None,
    }
}

#[tokio::test]
async fn test_waits_for_network() {
    let mut h = harness(vec![], three());
    h.link.set(false);
    for i in 0..3 {
        let frame = h.sched.tick_at(day() + secs(i)).await;
        assert_eq!(frame, Frame::Error("WIFI ERROR".into()));
    }
    assert_eq!(h.fetches.get(), 0);
    assert_eq!(h.syncs.get(), 0);
    assert_eq!(h.sched.state().phase, Phase::Connecting);

    h.link.set(true);
    h.sched.tick_at(day() + secs(3)).await;
    assert_eq!(h.sched.state().phase, Phase::Operating);
    assert_eq!(h.fetches.get(), 1);
    assert_eq!(h.syncs.get(), 1);
}

#[tokio::test]
async fn test_rotation_and_route_resolution() {
    let mut h = harness(vec![], three());
    let t = day();

    let first = h.sched.tick_at(t).await;
    match &first {
        Frame::Flight(card) => {
            assert_eq!(card.callsign, "BAW1");
            assert_eq!(card.display_callsign, "BA1");
            assert_eq!(card.route.as_deref(), Some("LHR>JFK"));
            assert_eq!(card.carrier.as_deref(), Some("BAW"));
        }
        other => panic!("expected a flight frame, got {other:?}"),
    }

    let mut shown = vec![callsign_of(&first).map(str::to_string)];
    for i in 1..5 {
        let frame = h.sched.tick_at(t + secs(4 * i)).await;
        shown.push(callsign_of(&frame).map(str::to_string));
    }
    let shown: Vec<Option<&str>> = shown.iter().map(|s| s.as_deref()).collect();
    assert_eq!(shown, vec![Some("BAW1"), Some("EZY2"), Some("VIR3"), Some("BAW1"), None]);

    // unknown route falls back to the broadcast callsign
    let recorded = h.out.borrow();
    let Some(Frame::Flight(card)) = recorded.frames.get(1) else { panic!("no second frame") };
    assert_eq!(card.display_callsign, "EZY2");
    assert_eq!(card.route, None);
}

#[tokio::test]
async fn test_polls_on_interval() {
    let mut h = harness(vec![], three());
    let t = day();
    h.sched.tick_at(t).await;
    h.sched.tick_at(t + secs(14)).await;
    assert_eq!(h.fetches.get(), 1);
    h.sched.tick_at(t + secs(15)).await;
    assert_eq!(h.fetches.get(), 2);
    assert_eq!(h.sched.state().fetch_due_at, Some(t + secs(30)));
}

#[tokio::test]
async fn test_queue_stays_stable_across_polls() {
    let mut h = harness(
        vec![Step::Flights(three())],
        vec![flight("ddd004", "DLH4", 1.0), flight("ccc003", "VIR3", 2.0), flight("aaa001", "BAW1", 9.0)],
    );
    h.sched.tick_at(day()).await;
    h.sched.tick_at(day() + secs(15)).await;
    let keys: Vec<&str> = h.sched.queue().entries().iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["aaa001", "ccc003", "ddd004"]);
}

#[tokio::test]
async fn test_rate_limit_backs_off_longer_than_unavailable() {
    let mut h = harness(vec![Step::Status(429)], three());
    let t = day();
    assert_eq!(h.sched.tick_at(t).await, Frame::Loading);
    let limited = h.sched.state().fetch_due_at.unwrap();
    assert!(limited >= t + secs(300));

    // nothing goes out while backing off
    h.sched.tick_at(t + secs(15)).await;
    h.sched.tick_at(t + secs(120)).await;
    assert_eq!(h.fetches.get(), 1);

    let mut h = harness(vec![Step::Status(503)], three());
    h.sched.tick_at(t).await;
    let unavailable = h.sched.state().fetch_due_at.unwrap();
    assert!(unavailable >= t + secs(60));
    assert!(unavailable < limited);
}

#[tokio::test]
async fn test_manual_fetch_overrides_backoff() {
    let mut h = harness(vec![Step::Status(429)], three());
    let t = day();
    h.sched.tick_at(t).await;
    assert_eq!(h.fetches.get(), 1);

    h.sched.trigger(Trigger::FetchNow);
    let frame = h.sched.tick_at(t + secs(30)).await;
    assert_eq!(h.fetches.get(), 2);
    assert!(matches!(frame, Frame::Flight(_)));
    // periodic polling resumes from the manual fetch
    assert_eq!(h.sched.state().fetch_due_at, Some(t + secs(45)));
}

#[tokio::test]
async fn test_unauthorized_invalidates_into_backoff() {
    let mut h = harness(vec![Step::Status(401)], three());
    h.sched.tick_at(day()).await;
    assert_eq!(h.sched.state().fetch_due_at, Some(day() + secs(60)));
    assert!(!h.sched.state().last_fetch_ok);
}

#[tokio::test]
async fn test_night_suppresses_fetching() {
    let mut h = harness(vec![], three());
    let t = night();
    for i in 0..4 {
        let frame = h.sched.tick_at(t + secs(15 * i)).await;
        assert!(matches!(frame, Frame::Clock(ref lt) if lt.hour == 3), "{frame:?}");
    }
    assert_eq!(h.fetches.get(), 0);
    assert!(h.sched.state().night_mode);
    assert_eq!(h.out.borrow().brightness, vec![0.5]);
    // logos still sync at night
    assert_eq!(h.syncs.get(), 1);

    // a manual fetch is still honoured, the display stays on the clock
    h.sched.trigger(Trigger::FetchNow);
    let frame = h.sched.tick_at(t + secs(90)).await;
    assert_eq!(h.fetches.get(), 1);
    assert!(matches!(frame, Frame::Clock(_)));
    assert_eq!(h.sched.queue().len(), 3);
}

#[tokio::test]
async fn test_night_window_uses_local_time() {
    let mut h = harness(vec![], three());
    // 23:30 UTC on 30 April is 00:30 local
    let t = Utc.with_ymd_and_hms(2025, 4, 30, 23, 30, 0).unwrap();
    h.sched.tick_at(t).await;
    assert!(h.sched.state().night_mode);
    assert_eq!(h.fetches.get(), 0);
}

#[tokio::test]
async fn test_update_error_until_next_success() {
    let mut h = harness(vec![Step::Fail], three());
    let t = day();
    assert_eq!(h.sched.tick_at(t).await, Frame::Error("UPDATE ERROR".into()));
    assert_eq!(h.sched.tick_at(t + secs(5)).await, Frame::Error("UPDATE ERROR".into()));

    let frame = h.sched.tick_at(t + secs(15)).await;
    assert!(matches!(frame, Frame::Flight(_)));
    assert_eq!(h.sched.state().last_error, None);
}

#[tokio::test]
async fn test_skipped_cycle_shows_loading() {
    let mut h = harness(vec![Step::Skip], three());
    assert_eq!(h.sched.tick_at(day()).await, Frame::Loading);
    assert_eq!(h.sched.state().fetch_due_at, Some(day() + secs(15)));
}

#[tokio::test]
async fn test_empty_sky_shows_clock() {
    let mut h = harness(vec![], vec![]);
    let frame = h.sched.tick_at(day()).await;
    assert!(matches!(frame, Frame::Clock(ref lt) if lt.hour == 13 && lt.minute == 0));
}

#[tokio::test]
async fn test_clock_only_and_count_overlay() {
    let mut h = harness(vec![], three());
    let t = day();
    h.sched.tick_at(t).await;

    h.sched.trigger(Trigger::ToggleClockOnly);
    assert!(matches!(h.sched.tick_at(t + secs(1)).await, Frame::Clock(_)));
    h.sched.trigger(Trigger::ToggleClockOnly);
    assert!(matches!(h.sched.tick_at(t + secs(2)).await, Frame::Flight(_)));

    h.sched.trigger(Trigger::ShowCount);
    assert_eq!(h.sched.tick_at(t + secs(3)).await, Frame::CountOverlay(3));
    assert_eq!(h.sched.tick_at(t + secs(7)).await, Frame::CountOverlay(3));
    assert!(!matches!(h.sched.tick_at(t + secs(8)).await, Frame::CountOverlay(_)));
}

#[tokio::test]
async fn test_hourly_asset_resync() {
    let mut h = harness(vec![], three());
    let t = day();
    h.sched.tick_at(t).await;
    h.sched.tick_at(t + TimeDelta::minutes(59)).await;
    assert_eq!(h.syncs.get(), 1);
    h.sched.tick_at(t + TimeDelta::minutes(60)).await;
    assert_eq!(h.syncs.get(), 2);
}

#[tokio::test]
async fn test_brightness_only_sent_on_change() {
    let mut h = harness(vec![], three());
    for i in 0..5 {
        h.sched.tick_at(day() + secs(i)).await;
    }
    assert_eq!(h.out.borrow().brightness, vec![1.0]);
}

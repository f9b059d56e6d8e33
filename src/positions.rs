/*
 *  positions.rs
 *
 *  SkyMonS - what's overhead
 *  (c) 2025-26 Stuart Hunter
 *
 *  Bounding-box position query and the commercial flight filter
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

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

use crate::auth::{AuthTokenManager, Credentials};
use crate::config::{BackoffConfig, Config, SearchConfig};
use crate::error::FetchError;
use crate::flight::{carrier_of, haversine_km, BoundingBox, Flight, GeoPoint};
use crate::http::{build_client, read_bounded};

/// Result of one polling attempt.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Accepted flights, nearest first.
    Flights(Vec<Flight>),
    /// Upstream asked us to go away until `retry_at`.
    Backoff { status: u16, retry_at: DateTime<Utc> },
    Failed(FetchError),
    /// Credentials configured but no token; nothing was sent.
    Skipped,
}

/// Anything that can produce this cycle's flights.
#[allow(async_fn_in_trait)]
pub trait FlightSource {
    async fn fetch(&mut self, now: DateTime<Utc>) -> FetchOutcome;
}

#[derive(Debug, Clone)]
pub struct SearchFilters {
    pub radius_km: f64,
    pub altitude_min_m: f64,
    pub altitude_max_m: f64,
    pub commercial_min_altitude_m: f64,
    pub include_ground: bool,
    pub max_flights: usize,
    pub carriers: HashSet<String>,
}

impl From<&SearchConfig> for SearchFilters {
    fn from(s: &SearchConfig) -> Self {
        Self {
            radius_km: s.radius_km,
            altitude_min_m: s.altitude_min_m,
            altitude_max_m: s.altitude_max_m,
            commercial_min_altitude_m: s.commercial_min_altitude_m,
            include_ground: s.include_ground,
            max_flights: s.max_flights,
            carriers: s.carriers.iter().map(|c| c.trim().to_uppercase()).collect(),
        }
    }
}

impl SearchFilters {
    fn is_commercial(&self, callsign: &str, altitude_m: f64) -> bool {
        if callsign.is_empty() || callsign == "Unknown" {
            return false;
        }
        let Some(code) = carrier_of(callsign) else {
            return false;
        };
        self.carriers.contains(&code.to_uppercase()) && altitude_m >= self.commercial_min_altitude_m
    }
}

/// Fields read from one state vector row.
#[derive(Debug, Clone, PartialEq)]
struct StateVector {
    icao24: String,
    callsign: String,
    lat: f64,
    lon: f64,
    altitude_m: f64,
    on_ground: bool,
}

// state vector offsets
const IDX_ICAO24: usize = 0;
const IDX_CALLSIGN: usize = 1;
const IDX_LON: usize = 5;
const IDX_LAT: usize = 6;
const IDX_BARO_ALT: usize = 7;
const IDX_ON_GROUND: usize = 8;

/// `None` when either geo field is absent.
fn parse_state(row: &Value) -> Option<StateVector> {
    let lat = row.get(IDX_LAT)?.as_f64()?;
    let lon = row.get(IDX_LON)?.as_f64()?;
    Some(StateVector {
        icao24: row.get(IDX_ICAO24).and_then(Value::as_str).unwrap_or("").trim().to_string(),
        callsign: row.get(IDX_CALLSIGN).and_then(Value::as_str).map(str::trim).unwrap_or("Unknown").to_string(),
        lat,
        lon,
        altitude_m: row.get(IDX_BARO_ALT).and_then(Value::as_f64).unwrap_or(0.0),
        on_ground: row.get(IDX_ON_GROUND).and_then(Value::as_bool).unwrap_or(false),
    })
}

/// Apply geometry and category filters to a states document.
/// Scanning stops at `max_flights`; the result is sorted by distance.
pub fn select_flights(doc: &Value, home: GeoPoint, filters: &SearchFilters) -> Vec<Flight> {
    let Some(states) = doc.get("states").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut flights: Vec<Flight> = Vec::new();
    for row in states {
        let Some(sv) = parse_state(row) else { continue };
        let distance_km = haversine_km(home, GeoPoint { lat: sv.lat, lon: sv.lon });
        if distance_km > filters.radius_km {
            continue;
        }
        if sv.altitude_m < filters.altitude_min_m || sv.altitude_m > filters.altitude_max_m {
            continue;
        }
        if sv.on_ground && !filters.include_ground {
            continue;
        }
        if !filters.is_commercial(&sv.callsign, sv.altitude_m) {
            continue;
        }
        flights.push(Flight {
            icao24: sv.icao24,
            callsign: sv.callsign,
            latitude: sv.lat,
            longitude: sv.lon,
            altitude_m: sv.altitude_m,
            distance_km,
            on_ground: sv.on_ground,
        });
        if flights.len() >= filters.max_flights {
            break;
        }
    }
    flights.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    flights
}

enum Authorization {
    Bearer(String),
    Basic { username: String, password: String },
    Anonymous,
}

/// OpenSky style `states/all` client.
#[derive(Debug)]
pub struct PositionFetcher {
    client: Client,
    states_url: String,
    home: GeoPoint,
    filters: SearchFilters,
    backoff: BackoffConfig,
    max_payload_bytes: usize,
    auth: AuthTokenManager,
}

impl PositionFetcher {
    pub fn new(cfg: &Config, home: GeoPoint, auth: AuthTokenManager) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(Duration::from_secs(3), Duration::from_secs(10))?,
            states_url: cfg.endpoints.states_url.clone(),
            home,
            filters: SearchFilters::from(&cfg.search),
            backoff: cfg.backoff.clone(),
            max_payload_bytes: cfg.search.max_payload_bytes,
            auth,
        })
    }

    async fn authorization(&mut self, now: DateTime<Utc>) -> Option<Authorization> {
        match self.auth.credentials().clone() {
            Credentials::ClientCredentials { .. } => {
                self.auth.get_token(now).await.map(Authorization::Bearer)
            }
            Credentials::Password { username, password } => {
                Some(match self.auth.get_token(now).await {
                    Some(token) => Authorization::Bearer(token),
                    None => Authorization::Basic { username, password },
                })
            }
            Credentials::Anonymous => Some(Authorization::Anonymous),
        }
    }

    async fn query(&mut self, now: DateTime<Utc>) -> Result<FetchOutcome, FetchError> {
        let Some(authorization) = self.authorization(now).await else {
            warn!("No position API token, skipping this cycle");
            return Ok(FetchOutcome::Skipped);
        };

        let bbox = BoundingBox::around(self.home, self.filters.radius_km);
        let mut request = self.client.get(&self.states_url).query(&bbox.query());
        request = match authorization {
            Authorization::Bearer(token) => {
                debug!("Using bearer authentication");
                request.bearer_auth(token)
            }
            Authorization::Basic { username, password } => {
                debug!("Using basic authentication");
                request.basic_auth(username, Some(password))
            }
            Authorization::Anonymous => {
                debug!("Using anonymous access");
                request
            }
        };

        let response = request.send().await?;
        let status = response.status().as_u16();
        debug!("Position API response status: {}", status);

        match status {
            200 => {
                let body = read_bounded(response, self.max_payload_bytes).await?;
                let doc: Value = serde_json::from_str(&body)?;
                drop(body);
                let flights = select_flights(&doc, self.home, &self.filters);
                info!(
                    "Found {} flights (cap {}) in {}km radius",
                    flights.len(), self.filters.max_flights, self.filters.radius_km
                );
                Ok(FetchOutcome::Flights(flights))
            }
            401 | 403 | 429 | 503 => {
                if matches!(status, 401 | 403) {
                    self.auth.invalidate();
                }
                let delay = self.backoff.delay_for(status).unwrap_or_default();
                warn!("Position API returned {}, backing off {}s", status, delay.num_seconds());
                let retry_at = now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC);
                Ok(FetchOutcome::Backoff { status, retry_at })
            }
            other => Err(FetchError::Status(other)),
        }
    }
}

impl FlightSource for PositionFetcher {
    async fn fetch(&mut self, now: DateTime<Utc>) -> FetchOutcome {
        match self.query(now).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Position request failed: {}", e);
                FetchOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HOME: GeoPoint = GeoPoint { lat: 51.47, lon: -0.45 };

    fn filters() -> SearchFilters {
        SearchFilters::from(&SearchConfig::default())
    }

    fn row(icao: &str, cs: Option<&str>, lat: Option<f64>, lon: Option<f64>, alt: Option<f64>, ground: bool) -> Value {
        json!([icao, cs, "United Kingdom", 0, 0, lon, lat, alt, ground, 200.0, 90.0])
    }

    #[test]
    fn test_accepts_commercial_overhead() {
        let doc = json!({ "time": 0, "states": [
            row("4ca1fa", Some("BAW123  "), Some(51.50), Some(-0.40), Some(9000.0), false),
        ]});
        let flights = select_flights(&doc, HOME, &filters());
        assert_eq!(flights.len(), 1);
        assert_eq!(flights[0].callsign, "BAW123");
        assert_eq!(flights[0].key(), "4ca1fa");
        assert!(flights[0].distance_km < 15.0);
    }

    #[test]
    fn test_rejections() {
        let doc = json!({ "states": [
            row("a1", Some("BAW1"), None, Some(-0.40), Some(9000.0), false),       // no lat
            row("a2", Some("BAW2"), Some(52.50), Some(-0.40), Some(9000.0), false), // too far
            row("a3", Some("BAW3"), Some(51.50), Some(-0.40), Some(16000.0), false),// above band
            row("a4", Some("BAW4"), Some(51.50), Some(-0.40), Some(9000.0), true),  // on ground
            row("a5", Some("N123AB"), Some(51.50), Some(-0.40), Some(9000.0), false),// not a carrier
            row("a6", Some("BAW6"), Some(51.50), Some(-0.40), Some(1500.0), false), // below commercial floor
            row("a7", None, Some(51.50), Some(-0.40), Some(9000.0), false),         // no callsign
            row("a8", Some("EZY8"), Some(51.48), Some(-0.44), Some(4000.0), false), // ok
        ]});
        let flights = select_flights(&doc, HOME, &filters());
        let keys: Vec<&str> = flights.iter().map(Flight::key).collect();
        assert_eq!(keys, vec!["a8"]);
    }

    #[test]
    fn test_ground_allowed_when_configured() {
        let mut f = filters();
        f.include_ground = true;
        f.commercial_min_altitude_m = 0.0;
        let doc = json!({ "states": [row("g1", Some("BAW9"), Some(51.47), Some(-0.45), None, true)] });
        assert_eq!(select_flights(&doc, HOME, &f).len(), 1);
    }

    #[test]
    fn test_cap_and_sort() {
        let mut f = filters();
        f.max_flights = 3;
        let states: Vec<Value> = (0..6)
            .map(|i| {
                // farther first
                let lat = 51.47 + 0.01 * (6 - i) as f64;
                row(&format!("c{i}"), Some("DLH400"), Some(lat), Some(-0.45), Some(9000.0), false)
            })
            .collect();
        let doc = json!({ "states": states });
        let flights = select_flights(&doc, HOME, &f);
        // scanning stopped after the first three, then sorted nearest first
        let keys: Vec<&str> = flights.iter().map(Flight::key).collect();
        assert_eq!(keys, vec!["c2", "c1", "c0"]);
    }

    mod fetcher {
        use super::*;
        use crate::auth::Grant;
        use crate::config::AuthConfig;
        use crate::http::{canned, serve_once};
        use chrono::{TimeDelta, TimeZone};

        fn t0() -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap()
        }

        async fn fetcher_for(response: Vec<u8>, auth: AuthConfig, max_payload_bytes: usize) -> PositionFetcher {
            let mut cfg = Config::default();
            cfg.endpoints.states_url = format!("{}/api/states/all", serve_once(response).await);
            cfg.endpoints.token_url = "http://127.0.0.1:9/token".into();
            cfg.search.max_payload_bytes = max_payload_bytes;
            cfg.auth = auth;
            let auth = AuthTokenManager::new(&cfg.auth, &cfg.endpoints).unwrap();
            PositionFetcher::new(&cfg, HOME, auth).unwrap()
        }

        async fn anonymous(response: Vec<u8>) -> PositionFetcher {
            fetcher_for(response, AuthConfig::default(), 262_144).await
        }

        /// Client-credential fetcher holding a valid token.
        async fn with_token(response: Vec<u8>) -> PositionFetcher {
            let auth = AuthConfig {
                client_id: Some("id".into()),
                client_secret: Some("secret".into()),
                ..Default::default()
            };
            let mut f = fetcher_for(response, auth, 262_144).await;
            f.auth.store(Grant { token: "tok".into(), lifetime_secs: Some(1800) }, t0());
            f
        }

        #[tokio::test]
        async fn test_ok_publishes_flights() {
            let body = json!({ "time": 1, "states": [
                row("4ca1fa", Some("BAW123"), Some(51.50), Some(-0.40), Some(9000.0), false),
                row("ffffff", Some("N123AB"), Some(51.50), Some(-0.40), Some(9000.0), false),
            ]})
            .to_string();
            let mut f = anonymous(canned(200, &body)).await;
            match f.fetch(t0()).await {
                FetchOutcome::Flights(flights) => {
                    assert_eq!(flights.len(), 1);
                    assert_eq!(flights[0].callsign, "BAW123");
                }
                other => panic!("expected flights, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_backoff_delays_per_status() {
            let backoff = BackoffConfig::default();
            for status in [429u16, 503] {
                let mut f = anonymous(canned(status, "")).await;
                match f.fetch(t0()).await {
                    FetchOutcome::Backoff { status: s, retry_at } => {
                        assert_eq!(s, status);
                        assert_eq!(retry_at, t0() + backoff.delay_for(status).unwrap());
                    }
                    other => panic!("{status}: expected backoff, got {other:?}"),
                }
            }
        }

        #[tokio::test]
        async fn test_auth_rejection_drops_token() {
            for (status, delay) in [(401u16, 60), (403, 300)] {
                let mut f = with_token(canned(status, "")).await;
                assert_eq!(f.auth.cached(t0()), Some("tok"));
                match f.fetch(t0()).await {
                    FetchOutcome::Backoff { retry_at, .. } => {
                        assert_eq!(retry_at, t0() + TimeDelta::seconds(delay));
                    }
                    other => panic!("{status}: expected backoff, got {other:?}"),
                }
                assert_eq!(f.auth.cached(t0()), None);
            }
        }

        #[tokio::test]
        async fn test_unavailable_keeps_token() {
            let mut f = with_token(canned(503, "")).await;
            assert!(matches!(f.fetch(t0()).await, FetchOutcome::Backoff { status: 503, .. }));
            assert_eq!(f.auth.cached(t0()), Some("tok"));
        }

        #[tokio::test]
        async fn test_other_status_fails() {
            let mut f = anonymous(canned(500, "oops")).await;
            assert!(matches!(f.fetch(t0()).await, FetchOutcome::Failed(FetchError::Status(500))));
        }

        #[tokio::test]
        async fn test_oversized_body_publishes_nothing() {
            let states: Vec<Value> = (0..50)
                .map(|i| row(&format!("a{i}"), Some("BAW1"), Some(51.5), Some(-0.4), Some(9000.0), false))
                .collect();
            let body = json!({ "states": states }).to_string();
            let mut f = fetcher_for(canned(200, &body), AuthConfig::default(), 256).await;
            assert!(matches!(
                f.fetch(t0()).await,
                FetchOutcome::Failed(FetchError::PayloadTooLarge { limit: 256, .. })
            ));
        }

        #[tokio::test]
        async fn test_malformed_body_fails() {
            let mut f = anonymous(canned(200, "{\"states\": [")).await;
            assert!(matches!(f.fetch(t0()).await, FetchOutcome::Failed(FetchError::Json(_))));
        }

        #[tokio::test]
        async fn test_client_credentials_without_token_skips() {
            let auth = AuthConfig {
                client_id: Some("id".into()),
                client_secret: Some("secret".into()),
                ..Default::default()
            };
            // token endpoint is dead, the states server must never be hit
            let mut f = fetcher_for(canned(500, ""), auth, 262_144).await;
            assert!(matches!(f.fetch(t0()).await, FetchOutcome::Skipped));
        }
    }

    #[test]
    fn test_null_states() {
        assert!(select_flights(&json!({ "time": 1, "states": null }), HOME, &filters()).is_empty());
    }
}

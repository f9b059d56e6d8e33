/*
 *  routes.rs
 *
 *  SkyMonS - what's overhead
 *  (c) 2025-26 Stuart Hunter
 *
 *  Callsign to route resolution, cached and throttled per callsign
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
use log::{debug, warn};
use mini_moka::sync::Cache;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::{secs, EndpointConfig, RouteConfig};
use crate::error::RouteError;
use crate::http::build_client;

/// What the route API knows about one callsign.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteInfo {
    /// `ORG>DST` IATA pair
    pub route: Option<String>,
    pub callsign_iata: Option<String>,
}

#[allow(async_fn_in_trait)]
pub trait RouteLookup {
    async fn lookup(&self, callsign: &str) -> Result<RouteInfo, RouteError>;
}

#[derive(Debug, Deserialize, Default)]
struct Airport {
    iata_code: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct FlightRoute {
    #[serde(default)]
    origin: Airport,
    #[serde(default)]
    destination: Airport,
    callsign_iata: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RouteBody {
    flightroute: Option<FlightRoute>,
}

#[derive(Debug, Deserialize)]
struct RouteEnvelope {
    // adsbdb answers "unknown callsign" as a bare string here
    response: serde_json::Value,
}

fn non_empty_upper(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_uppercase()).filter(|v| !v.is_empty())
}

impl From<FlightRoute> for RouteInfo {
    fn from(fr: FlightRoute) -> Self {
        let route = match (non_empty_upper(fr.origin.iata_code), non_empty_upper(fr.destination.iata_code)) {
            (Some(o), Some(d)) => Some(format!("{o}>{d}")),
            _ => None,
        };
        RouteInfo { route, callsign_iata: non_empty_upper(fr.callsign_iata) }
    }
}

/// Parse an adsbdb callsign document.
pub fn parse_route_body(body: &str) -> Result<RouteInfo, RouteError> {
    let envelope: RouteEnvelope = serde_json::from_str(body)?;
    let parsed: RouteBody = serde_json::from_value(envelope.response).unwrap_or_default();
    Ok(parsed.flightroute.map(RouteInfo::from).unwrap_or_default())
}

#[derive(Debug)]
pub struct AdsbdbClient {
    client: Client,
    base_url: String,
}

impl AdsbdbClient {
    pub fn new(endpoints: &EndpointConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(Duration::from_secs(3), Duration::from_secs(5))?,
            base_url: endpoints.route_url.trim_end_matches('/').to_string(),
        })
    }
}

impl RouteLookup for AdsbdbClient {
    async fn lookup(&self, callsign: &str) -> Result<RouteInfo, RouteError> {
        let url = format!("{}/{}", self.base_url, callsign.to_lowercase());
        debug!("Route lookup {}", url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RouteError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        parse_route_body(&body)
    }
}

/// Trim and uppercase, the only form used as a cache key.
pub fn normalize(callsign: &str) -> String {
    callsign.trim().to_uppercase()
}

/// Route and IATA callsign caches with lazy TTL, plus a per-callsign
/// cooldown between lookups whatever their outcome.
pub struct RouteResolver<L> {
    lookup: L,
    ttl: TimeDelta,
    cooldown: TimeDelta,
    routes: Cache<String, (String, DateTime<Utc>)>,
    iata: Cache<String, (String, DateTime<Utc>)>,
    /// last attempt per callsign, pruned past the cooldown
    attempts: HashMap<String, DateTime<Utc>>,
}

impl<L: RouteLookup> RouteResolver<L> {
    pub fn new(lookup: L, cfg: &RouteConfig) -> Self {
        // moka ages entries out on its own clock, freshness is still
        // judged against the stored timestamp
        let cache = || {
            Cache::builder()
                .max_capacity(cfg.cache_capacity)
                .time_to_live(Duration::from_secs(cfg.ttl_secs))
                .build()
        };
        Self {
            lookup,
            ttl: secs(cfg.ttl_secs),
            cooldown: secs(cfg.cooldown_secs),
            routes: cache(),
            iata: cache(),
            attempts: HashMap::new(),
        }
    }

    fn fresh(&self, cache: &Cache<String, (String, DateTime<Utc>)>, key: &str, now: DateTime<Utc>) -> Option<String> {
        cache
            .get(&key.to_string())
            .filter(|(_, at)| now - *at < self.ttl)
            .map(|(value, _)| value)
    }

    pub fn cached_route(&self, callsign: &str, now: DateTime<Utc>) -> Option<String> {
        self.fresh(&self.routes, &normalize(callsign), now)
    }

    /// Records an attempt unless one is still cooling down.
    fn try_attempt(&mut self, key: &str, now: DateTime<Utc>) -> bool {
        let cooldown = self.cooldown;
        self.attempts.retain(|_, at| now - *at < cooldown);
        if self.attempts.contains_key(key) {
            return false;
        }
        self.attempts.insert(key.to_string(), now);
        true
    }

    pub async fn resolve_route(&mut self, callsign: &str, now: DateTime<Utc>) -> Option<String> {
        let key = normalize(callsign);
        if key.is_empty() {
            return None;
        }
        if let Some(route) = self.fresh(&self.routes, &key, now) {
            return Some(route);
        }
        if !self.try_attempt(&key, now) {
            debug!("Route lookup for {} throttled", key);
            return None;
        }

        match self.lookup.lookup(&key).await {
            Ok(info) => {
                if let Some(cs) = info.callsign_iata {
                    self.iata.insert(key.clone(), (cs, now));
                }
                if let Some(route) = info.route {
                    debug!("Route {} -> {}", key, route);
                    self.routes.insert(key.clone(), (route, now));
                }
            }
            Err(e) => warn!("Route lookup for {} failed: {}", key, e),
        }
        self.fresh(&self.routes, &key, now)
    }

    /// Preferred callsign for display, the normalized input if none is known.
    pub async fn resolve_display_callsign(&mut self, callsign: &str, now: DateTime<Utc>) -> String {
        let key = normalize(callsign);
        if key.is_empty() {
            return key;
        }
        if let Some(cs) = self.fresh(&self.iata, &key, now) {
            return cs;
        }
        self.resolve_route(&key, now).await;
        self.fresh(&self.iata, &key, now).unwrap_or(key)
    }
}

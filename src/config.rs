/*
 *  config.rs
 *
 *  SkyMonS - what's overhead
 *  (c) 2025-26 Stuart Hunter
 *
 *  YAML + CLI configuration, read once at startup
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

use serde::{Deserialize, Serialize};
use clap::{ArgAction, Parser, ValueHint};
use chrono::TimeDelta;
use dirs_next::home_dir;
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

/// Major carriers only, ICAO airline designators.
pub const DEFAULT_CARRIERS: [&str; 27] = [
    "BAW", "VIR", "EZY", "RYR",             // UK
    "UAL", "AAL", "DAL", "JBU",             // US
    "AFR", "DLH", "KLM", "IBE", "SAS",      // Europe
    "UAE", "ETD", "QTR", "SVA", "THY",      // Middle East
    "SIA", "CPA", "JAL", "ANA", "QFA",      // Asia Pacific
    "ACA", "WJA",                           // Canada
    "TAM", "LAN",                           // South America
];

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub log_level: Option<String>,
    /// Home point; required, checked by `validate`
    pub home: Option<HomeConfig>,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub backoff: BackoffConfig,
    #[serde(default)]
    pub night: NightConfig,
    #[serde(default)]
    pub routes: RouteConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub assets: AssetConfig,
    #[serde(default)]
    pub endpoints: EndpointConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HomeConfig {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    pub radius_km: f64,
    pub altitude_min_m: f64,
    pub altitude_max_m: f64,
    /// below this a flight is not treated as commercial
    pub commercial_min_altitude_m: f64,
    pub include_ground: bool,
    pub max_flights: usize,
    pub max_payload_bytes: usize,
    pub carriers: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            radius_km: 15.0,
            altitude_min_m: 0.0,
            altitude_max_m: 15_000.0,
            commercial_min_altitude_m: 3_000.0,
            include_ground: false,
            max_flights: 24,
            max_payload_bytes: 256 * 1024,
            carriers: DEFAULT_CARRIERS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleConfig {
    pub poll_interval_secs: u64,
    pub tick_millis: u64,
    pub frame_secs: u64,
    pub asset_sync_secs: u64,
    pub count_overlay_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 15,
            tick_millis: 100,
            frame_secs: 4,
            asset_sync_secs: 3600,
            count_overlay_secs: 5,
        }
    }
}

impl ScheduleConfig {
    pub fn poll_interval(&self) -> TimeDelta { secs(self.poll_interval_secs) }
    pub fn frame_interval(&self) -> TimeDelta { secs(self.frame_secs) }
    pub fn asset_sync_interval(&self) -> TimeDelta { secs(self.asset_sync_secs) }
    pub fn count_overlay(&self) -> TimeDelta { secs(self.count_overlay_secs) }
}

/// Forward "do not retry before" delays per upstream status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackoffConfig {
    pub unauthorized_secs: u64,
    pub forbidden_secs: u64,
    pub unavailable_secs: u64,
    pub rate_limited_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            unauthorized_secs: 60,
            forbidden_secs: 300,
            unavailable_secs: 60,
            rate_limited_secs: 300,
        }
    }
}

impl BackoffConfig {
    /// Delay for a status code, `None` when the status carries no backoff.
    pub fn delay_for(&self, status: u16) -> Option<TimeDelta> {
        match status {
            401 => Some(secs(self.unauthorized_secs)),
            403 => Some(secs(self.forbidden_secs)),
            429 => Some(secs(self.rate_limited_secs)),
            503 => Some(secs(self.unavailable_secs)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NightConfig {
    pub start_hour: u32,
    pub end_hour: u32,
    pub brightness: f32,
    pub day_brightness: f32,
}

impl Default for NightConfig {
    fn default() -> Self {
        Self { start_hour: 0, end_hour: 8, brightness: 0.5, day_brightness: 1.0 }
    }
}

impl NightConfig {
    /// `start <= hour < end`, wrapping past midnight when start > end.
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            self.start_hour <= hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouteConfig {
    pub ttl_secs: u64,
    pub cooldown_secs: u64,
    pub cache_capacity: u64,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self { ttl_secs: 1800, cooldown_secs: 5, cache_capacity: 256 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub refresh_margin_secs: u64,
    pub default_lifetime_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            username: None,
            password: None,
            refresh_margin_secs: 300,
            default_lifetime_secs: 1800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetConfig {
    pub dir: PathBuf,
    pub base_url: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./logos"),
            base_url: "https://raw.githubusercontent.com/steveberryman/galactic-flight-tracker/main/logos".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointConfig {
    pub states_url: String,
    pub token_url: String,
    pub login_url: String,
    pub route_url: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            states_url: "https://opensky-network.org/api/states/all".to_string(),
            token_url: "https://auth.opensky-network.org/auth/realms/opensky-network/protocol/openid-connect/token".to_string(),
            login_url: "https://opensky-network.org/api/auth/login".to_string(),
            route_url: "https://api.adsbdb.com/v0/callsign".to_string(),
        }
    }
}

/// Longest duration any `*_secs` option may hold.
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 3600;

/// Saturates instead of panicking on values chrono cannot hold.
#[inline]
pub fn secs(s: u64) -> TimeDelta {
    i64::try_from(s)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "SkyMonS", about = "SkyMonS - flights overhead on a tiny display")]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    /// Debug logging
    #[arg(long, action = ArgAction::SetTrue)]
    pub debug: bool,
    #[arg(long)]
    pub home_lat: Option<f64>,
    #[arg(long)]
    pub home_lon: Option<f64>,
    #[arg(long)]
    pub radius_km: Option<f64>,
    #[arg(long)]
    pub poll_interval_secs: Option<u64>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Read YAML, layer CLI overrides, validate.
pub fn load(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults, or the YAML file (explicit path or search)
    let mut cfg = if let Some(p) = cli.config.as_ref() {
        if !p.exists() {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
        read_yaml(p)?
    } else if let Some(p) = find_config_file() {
        read_yaml(&p)?
    } else {
        Config::default()
    };

    // 2) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 3) Validate
    validate(&cfg)?;
    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/skymons/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/skymons/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/skymons.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["skymons.yaml", "config.yaml", "config/skymons.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    parse_yaml(&s)
}

pub fn parse_yaml(s: &str) -> Result<Config, ConfigError> {
    let cfg: Config = serde_yaml::from_str(s)?;
    Ok(cfg)
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some() { cfg.log_level = cli.log_level.clone(); }
    match (cli.home_lat, cli.home_lon, cfg.home.as_mut()) {
        (Some(lat), Some(lon), None) => cfg.home = Some(HomeConfig { lat, lon }),
        (lat, lon, Some(home)) => {
            if let Some(lat) = lat { home.lat = lat; }
            if let Some(lon) = lon { home.lon = lon; }
        }
        _ => {}
    }
    if let Some(r) = cli.radius_km { cfg.search.radius_km = r; }
    if let Some(p) = cli.poll_interval_secs { cfg.schedule.poll_interval_secs = p; }
}

/// Required fields and ranges.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let home = cfg.home.as_ref()
        .ok_or_else(|| ConfigError::Validation("home.lat/home.lon are required".into()))?;
    if !(-90.0..=90.0).contains(&home.lat) || !(-180.0..=180.0).contains(&home.lon) {
        return Err(ConfigError::Validation(format!(
            "home ({}, {}) is not a valid coordinate", home.lat, home.lon
        )));
    }
    // bounding box uses cos(lat)
    if home.lat.abs() >= 89.9 {
        return Err(ConfigError::Validation("home latitude too close to a pole".into()));
    }

    let s = &cfg.search;
    if !(s.radius_km > 0.0) {
        return Err(ConfigError::Validation("search.radius_km must be > 0".into()));
    }
    if s.altitude_min_m > s.altitude_max_m {
        return Err(ConfigError::Validation("search.altitude_min_m exceeds altitude_max_m".into()));
    }
    if s.max_flights == 0 {
        return Err(ConfigError::Validation("search.max_flights must be > 0".into()));
    }
    if s.carriers.is_empty() {
        return Err(ConfigError::Validation("search.carriers must not be empty".into()));
    }

    let sc = &cfg.schedule;
    if sc.poll_interval_secs == 0 || sc.tick_millis == 0 || sc.frame_secs == 0 {
        return Err(ConfigError::Validation(
            "schedule poll_interval_secs, tick_millis and frame_secs must be > 0".into()));
    }

    let n = &cfg.night;
    if n.start_hour > 24 || n.end_hour > 24 {
        return Err(ConfigError::Validation("night hours must be within 0..=24".into()));
    }
    for b in [n.brightness, n.day_brightness] {
        if !(0.0..=1.0).contains(&b) {
            return Err(ConfigError::Validation("brightness must be within 0.0..=1.0".into()));
        }
    }

    if cfg.routes.ttl_secs == 0 {
        return Err(ConfigError::Validation("routes.ttl_secs must be > 0".into()));
    }

    let b = &cfg.backoff;
    let durations = [
        ("schedule.poll_interval_secs", sc.poll_interval_secs),
        ("schedule.frame_secs", sc.frame_secs),
        ("schedule.asset_sync_secs", sc.asset_sync_secs),
        ("schedule.count_overlay_secs", sc.count_overlay_secs),
        ("schedule.tick_millis", sc.tick_millis / 1000),
        ("backoff.unauthorized_secs", b.unauthorized_secs),
        ("backoff.forbidden_secs", b.forbidden_secs),
        ("backoff.unavailable_secs", b.unavailable_secs),
        ("backoff.rate_limited_secs", b.rate_limited_secs),
        ("routes.ttl_secs", cfg.routes.ttl_secs),
        ("routes.cooldown_secs", cfg.routes.cooldown_secs),
        ("auth.refresh_margin_secs", cfg.auth.refresh_margin_secs),
        ("auth.default_lifetime_secs", cfg.auth.default_lifetime_secs),
    ];
    for (name, value) in durations {
        if value > MAX_DURATION_SECS {
            return Err(ConfigError::Validation(format!(
                "{name} must be at most {MAX_DURATION_SECS}s, got {value}"
            )));
        }
    }

    let a = &cfg.auth;
    if a.client_id.is_some() != a.client_secret.is_some() {
        return Err(ConfigError::Validation("auth.client_id and auth.client_secret go together".into()));
    }
    if a.username.is_some() != a.password.is_some() {
        return Err(ConfigError::Validation("auth.username and auth.password go together".into()));
    }
    if a.refresh_margin_secs >= a.default_lifetime_secs {
        return Err(ConfigError::Validation("auth.refresh_margin_secs must be below default_lifetime_secs".into()));
    }
    Ok(())
}

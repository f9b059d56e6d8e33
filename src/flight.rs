/*
 *  flight.rs
 *
 *  SkyMonS - what's overhead
 *  (c) 2025-26 Stuart Hunter
 *
 *  Tracked flight records and the geometry used to select them
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

use std::fmt;

const EARTH_RADIUS_KM: f64 = 6371.0;
const KM_PER_DEGREE: f64 = 111.0;

/// A flight accepted from one polling cycle. Rebuilt every fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Flight {
    pub icao24: String,
    pub callsign: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: f64,
    pub distance_km: f64,
    pub on_ground: bool,
}

impl Flight {
    /// icao24, or the callsign when the hex id is empty
    pub fn key(&self) -> &str {
        if !self.icao24.is_empty() { &self.icao24 } else { &self.callsign }
    }
}

/// What the display keeps of a flight across cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub key: String,
    pub callsign: String,
}

impl From<&Flight> for QueueEntry {
    fn from(f: &Flight) -> Self {
        Self { key: f.key().to_string(), callsign: f.callsign.clone() }
    }
}

/// Three letter airline designator from a callsign.
pub fn carrier_of(callsign: &str) -> Option<&str> {
    let cs = callsign.trim();
    cs.get(..3).filter(|c| c.chars().all(|ch| ch.is_ascii_alphabetic()))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.lat, self.lon)
    }
}

/// Query box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lamin: f64,
    pub lamax: f64,
    pub lomin: f64,
    pub lomax: f64,
}

impl BoundingBox {
    /// Flat-earth box: 111 km per degree, longitude widened by 1/cos(lat).
    pub fn around(home: GeoPoint, radius_km: f64) -> Self {
        let lat_delta = radius_km / KM_PER_DEGREE;
        let lon_delta = radius_km / (KM_PER_DEGREE * home.lat.to_radians().cos());
        Self {
            lamin: home.lat - lat_delta,
            lamax: home.lat + lat_delta,
            lomin: home.lon - lon_delta,
            lomax: home.lon + lon_delta,
        }
    }

    pub fn query(&self) -> [(&'static str, String); 4] {
        [
            ("lamin", self.lamin.to_string()),
            ("lamax", self.lamax.to_string()),
            ("lomin", self.lomin.to_string()),
            ("lomax", self.lomax.to_string()),
        ]
    }
}

/// Great-circle distance in km.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lon = (b.lon - a.lon).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

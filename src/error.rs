/*
 *  error.rs
 *
 *  SkyMonS - what's overhead
 *  (c) 2025-26 Stuart Hunter
 *
 *  Error types for the polling core
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

use thiserror::Error;

/// Failure acquiring a bearer token. Never fatal, the caller degrades.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("token endpoint returned {0}")]
    Status(u16),
    #[error("token response malformed: {0}")]
    Malformed(String),
    #[error("no credentials configured")]
    NoCredentials,
}

/// Failure fetching or parsing the position feed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("position API returned {0}")]
    Status(u16),
    /// Body exceeded the parse budget; nothing was published.
    #[error("response too large: {size} bytes (limit {limit})")]
    PayloadTooLarge { size: usize, limit: usize },
}

/// Failure resolving a route. Treated as "no route known".
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("route API returned {0}")]
    Status(u16),
    #[error("route response malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Failure syncing one carrier logo.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("asset server returned {0}")]
    Status(u16),
}

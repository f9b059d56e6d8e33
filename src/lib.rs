/*
 *  lib.rs
 *
 *  SkyMonS - what's overhead
 *  (c) 2025-26 Stuart Hunter
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
//! Nearby commercial flights for a small always-on display.

pub mod assets;
pub mod auth;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod flight;
pub mod frames;
pub mod http;
pub mod positions;
pub mod queue;
pub mod render;
pub mod routes;
pub mod scheduler;
pub mod timesource;

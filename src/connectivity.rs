/*
 *  connectivity.rs
 *
 *  SkyMonS - what's overhead
 *  (c) 2025-26 Stuart Hunter
 *
 *  Network link probe
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

use local_ip_address::local_ip;
use log::{debug, info};

pub trait Connectivity {
    fn is_connected(&mut self) -> bool;
}

/// Connected once the host has a routable local address.
#[derive(Debug, Default)]
pub struct LocalIpProbe {
    reported: bool,
}

impl LocalIpProbe {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Connectivity for LocalIpProbe {
    fn is_connected(&mut self) -> bool {
        match local_ip() {
            Ok(ip) => {
                if !self.reported {
                    info!("Network up, local address {}", ip);
                    self.reported = true;
                }
                true
            }
            Err(e) => {
                debug!("No local address yet: {}", e);
                self.reported = false;
                false
            }
        }
    }
}

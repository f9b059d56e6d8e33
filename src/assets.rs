/*
 *  assets.rs
 *
 *  SkyMonS - what's overhead
 *  (c) 2025-26 Stuart Hunter
 *
 *  Carrier logo sync
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

use log::{debug, info, warn};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::config::AssetConfig;
use crate::error::AssetError;
use crate::http::build_client;

/// Makes sure a local icon exists per carrier code.
#[allow(async_fn_in_trait)]
pub trait AssetSync {
    /// Returns how many assets were fetched.
    async fn sync(&mut self, codes: &[String]) -> Result<usize, AssetError>;
}

/// Downloads `<CODE>.png` for every code missing from the logo directory.
#[derive(Debug)]
pub struct LogoSync {
    client: Client,
    dir: PathBuf,
    base_url: String,
}

impl LogoSync {
    pub fn new(cfg: &AssetConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(Duration::from_secs(3), Duration::from_secs(10))?,
            dir: cfg.dir.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn logo_path(&self, code: &str) -> PathBuf {
        logo_path(&self.dir, code)
    }

    async fn download(&self, code: &str, path: &Path) -> Result<bool, AssetError> {
        let url = format!("{}/{}.png", self.base_url, code);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            debug!("No logo for {} ({})", code, status.as_u16());
            return Err(AssetError::Status(status.as_u16()));
        }
        let data = response.bytes().await?;
        if data.is_empty() {
            return Ok(false);
        }
        fs::write(path, &data).await?;
        Ok(true)
    }
}

pub fn logo_path(dir: &Path, code: &str) -> PathBuf {
    dir.join(format!("{}.png", code.to_uppercase()))
}

async fn present(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.len() > 0).unwrap_or(false)
}

impl AssetSync for LogoSync {
    async fn sync(&mut self, codes: &[String]) -> Result<usize, AssetError> {
        fs::create_dir_all(&self.dir).await?;
        let mut fetched = 0;
        for code in codes {
            let path = self.logo_path(code);
            if present(&path).await {
                continue;
            }
            debug!("Downloading logo for {}", code);
            match self.download(&code.to_uppercase(), &path).await {
                Ok(true) => fetched += 1,
                Ok(false) => {}
                Err(AssetError::Status(_)) => {}
                Err(e) => warn!("Logo download for {} failed: {}", code, e),
            }
        }
        info!("Logo sync done, {} new of {} carriers", fetched, codes.len());
        Ok(fetched)
    }
}

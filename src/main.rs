/*
 *  main.rs
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

use anyhow::{anyhow, Context};
use clap::Parser;
use env_logger::Env;
use log::info;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::MissedTickBehavior;

use skymons::assets::LogoSync;
use skymons::auth::AuthTokenManager;
use skymons::config::{self, Cli};
use skymons::connectivity::LocalIpProbe;
use skymons::flight::GeoPoint;
use skymons::positions::PositionFetcher;
use skymons::render::ConsoleRenderer;
use skymons::routes::{AdsbdbClient, RouteResolver};
use skymons::scheduler::{PollingScheduler, Trigger};
use skymons::timesource::SystemClock;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli).context("loading configuration")?;

    if cli.dump_config {
        print!("{}", serde_yaml::to_string(&cfg)?);
        return Ok(());
    }

    let default_level = if cli.debug {
        "debug".to_string()
    } else {
        cfg.log_level.clone().unwrap_or_else(|| "info".to_string())
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();

    info!("{} - what's overhead", env!("CARGO_PKG_NAME"));
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let home = cfg.home.ok_or_else(|| anyhow!("home position missing"))?;
    let home = GeoPoint { lat: home.lat, lon: home.lon };
    info!("Watching {}km around {}", cfg.search.radius_km, home);

    let auth = AuthTokenManager::new(&cfg.auth, &cfg.endpoints)?;
    let source = PositionFetcher::new(&cfg, home, auth)?;
    let routes = RouteResolver::new(AdsbdbClient::new(&cfg.endpoints)?, &cfg.routes);
    let assets = LogoSync::new(&cfg.assets)?;

    let mut scheduler = PollingScheduler::new(
        &cfg,
        source,
        routes,
        assets,
        ConsoleRenderer::new(),
        LocalIpProbe::new(),
        SystemClock,
    );

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigusr1 = signal(SignalKind::user_defined1())?;
    let mut sigusr2 = signal(SignalKind::user_defined2())?;

    let mut ticker = tokio::time::interval(Duration::from_millis(cfg.schedule.tick_millis));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                scheduler.tick().await;
            }
            _ = sigusr1.recv() => scheduler.trigger(Trigger::FetchNow),
            _ = sigusr2.recv() => scheduler.trigger(Trigger::ShowCount),
            _ = sighup.recv() => scheduler.trigger(Trigger::ToggleClockOnly),
            _ = sigint.recv() => {
                info!("SIGINT received. Shutting down.");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received. Shutting down.");
                break;
            }
        }
    }
    Ok(())
}

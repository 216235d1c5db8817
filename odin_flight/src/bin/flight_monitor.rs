/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

use std::{env, sync::Arc};
use anyhow::Result;
use clap::Parser;
use tracing::{info,warn};
use tracing_subscriber::EnvFilter;

use odin_flight::{
    FeedStatus, FlightFeedConfig, ViewRegion, load_config,
    actor::FlightFeedActor,
    connector::{LiveFlightConnector,create_client},
    credentials::{ClientCredentials,CredentialManager},
    provider::{ProviderId,ProviderRegistry},
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = "poll an ADS-B aggregator for aircraft around a location and log the published updates")]
pub struct Args {
    /// RON config file (defaults are used if not set)
    #[arg(short,long)]
    pub config: Option<String>,

    /// provider to use (opensky, adsb.lol, airplanes.live), overrides config
    #[arg(short,long)]
    pub provider: Option<ProviderId>,

    /// latitude of view center in degrees
    #[arg(long, default_value_t = 37.62, allow_hyphen_values = true)]
    pub lat: f64,

    /// longitude of view center in degrees
    #[arg(long, default_value_t = -122.38, allow_hyphen_values = true)]
    pub lon: f64,

    /// view span in degrees (both axes)
    #[arg(long, default_value_t = 1.0)]
    pub span: f64,

    /// icao24 address of aircraft to select
    #[arg(short,long)]
    pub select: Option<String>,

    /// number of updates to log before exiting (0 = run until killed)
    #[arg(short,long, default_value_t = 0)]
    pub n_updates: usize,
}

#[tokio::main]
async fn main()->Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter( EnvFilter::from_default_env()) // use RUST_LOG to set max level
        .init();

    let args = Args::parse();

    let mut config: FlightFeedConfig = match &args.config {
        Some(path) => load_config( path)?,
        None => FlightFeedConfig::default()
    };
    if let Some(id) = args.provider { config.provider = id }

    if !config.credentials.contains_key( &ProviderId::OpenSky) {
        if let (Ok(id),Ok(secret)) = (env::var("OPENSKY_CLIENT_ID"), env::var("OPENSKY_CLIENT_SECRET")) {
            info!("using OpenSky credentials from environment");
            config.credentials.insert( ProviderId::OpenSky, ClientCredentials::new( id, secret));
        }
    }

    let registry = ProviderRegistry::with_overrides( &config.providers);
    let client = create_client( config.fetch_timeout)?;
    let credentials = Arc::new( CredentialManager::new( client.clone(), config.credentials.clone()));
    let connectors = LiveFlightConnector::for_registry( &registry, &client, &credentials)?;

    let (hfeed, join_handle) = FlightFeedActor::spawn( config, registry, connectors)?;
    let mut rx = hfeed.subscribe();

    hfeed.set_viewport( ViewRegion::new( args.lat, args.lon, args.span, args.span)).await?;
    if let Some(icao24) = &args.select {
        match hfeed.select( icao24).await? {
            Some(ac) => info!("selected {ac}"),
            None => warn!("{icao24} is not in the current set, waiting for it to show up")
        }
    }

    let mut n = 0;
    let mut last_update = None;
    while rx.changed().await.is_ok() {
        let view = rx.borrow_and_update().clone();
        if let FeedStatus::Error(msg) = &view.status {
            warn!("{}: {}", view.provider, msg);
        }
        if view.last_update.is_none() || view.last_update == last_update {
            continue // nothing new to show
        }
        last_update = view.last_update;

        info!("{}: {} aircraft", view.provider, view.aircraft.len());
        for ac in view.aircraft.iter() {
            info!("  {ac}");
        }
        if let Some(sel) = &view.selection {
            let stale = if sel.stale { " (stale)" } else { "" };
            info!("selected {}{}: track with {} positions", sel.icao24, stale, sel.track.len());
        }

        n += 1;
        if args.n_updates > 0 && n >= args.n_updates { break }
    }

    hfeed.terminate().await?;
    join_handle.await?;
    Ok(())
}

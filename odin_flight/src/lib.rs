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

//! crate to keep a map viewport supplied with aircraft positions polled from public ADS-B aggregators.
//!
//! The engine runs as a single owner task ([`actor::FlightFeedActor`]) that receives viewport, zoom and
//! selection commands from a presentation layer and publishes a normalized [`Aircraft`] list, a
//! [`FeedStatus`] and the current [`selection::Selection`] through a [`actor::FlightFeedHandle`].
//! Provider specific request shaping and response parsing lives behind the [`connector::FeedProvider`]
//! strategy trait.

use std::{collections::HashMap, fmt, fs, path::Path, sync::Arc, time::Duration};
use serde::{Serialize,Deserialize};
use chrono::{DateTime,Utc};
use uom::si::{
    f64::{Length,Velocity},
    length::{foot,meter,mile},
    velocity::{foot_per_minute,knot,meter_per_second}
};

pub mod errors;
use errors::{OdinFlightError,Result};

pub mod provider;
use provider::{ProviderConfig,ProviderId};

pub mod credentials;
use credentials::ClientCredentials;

pub mod registration;
pub mod connector;
pub mod state_vectors;
pub mod aircraft_list;

pub mod scheduler;

pub mod debouncer;
use debouncer::DebounceConfig;

pub mod selection;

pub mod actor;

/* #region data model ***************************************************************************/

/// statute miles per degree of latitude
const MILES_PER_DEGREE: f64 = 69.05;

pub const MIN_SPAN: f64 = 0.01;
pub const MAX_LAT_SPAN: f64 = 180.0;
pub const MAX_LON_SPAN: f64 = 360.0;

/// a geodetic position in degrees
#[derive(Debug,Clone,Copy,PartialEq,Serialize,Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64
}

impl Position {
    pub fn new (latitude: f64, longitude: f64)->Self { Position{latitude,longitude} }

    pub fn is_valid (&self)->bool {
        self.latitude.is_finite() && self.longitude.is_finite() &&
        self.latitude.abs() <= 90.0 && self.longitude.abs() <= 180.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!( f, "({:.5},{:.5})", self.latitude, self.longitude)
    }
}

/// the visible map area. Spans are always kept within [MIN_SPAN,MAX_LAT_SPAN] and [MIN_SPAN,MAX_LON_SPAN]
#[derive(Debug,Clone,Copy,PartialEq,Serialize)]
pub struct ViewRegion {
    center: Position,
    lat_span: f64,
    lon_span: f64
}

impl ViewRegion {
    pub fn new (latitude: f64, longitude: f64, lat_span: f64, lon_span: f64)->Self {
        let center = Position::new( latitude.clamp(-90.0, 90.0), normalize_longitude(longitude));
        ViewRegion {
            center,
            lat_span: clamp_span( lat_span, MAX_LAT_SPAN),
            lon_span: clamp_span( lon_span, MAX_LON_SPAN)
        }
    }

    pub fn center (&self)->Position { self.center }
    pub fn lat_span (&self)->f64 { self.lat_span }
    pub fn lon_span (&self)->f64 { self.lon_span }

    /// multiply both spans, clamping the result. Non-positive or non-finite multipliers leave the region unchanged
    pub fn zoomed (&self, multiplier: f64)->Self {
        if multiplier.is_finite() && multiplier > 0.0 {
            ViewRegion::new( self.center.latitude, self.center.longitude, self.lat_span * multiplier, self.lon_span * multiplier)
        } else {
            *self
        }
    }

    pub fn contains (&self, p: &Position)->bool {
        let dlat = (p.latitude - self.center.latitude).abs();
        let dlon = normalize_longitude( p.longitude - self.center.longitude).abs();
        dlat <= self.lat_span / 2.0 && dlon <= self.lon_span / 2.0
    }

    /// radius of the circle around the center that covers the larger extent of the region
    pub fn radius (&self)->Length {
        let lon_extent = self.lon_span * self.center.latitude.to_radians().cos();
        let extent = self.lat_span.max( lon_extent);
        Length::new::<mile>( extent * MILES_PER_DEGREE / 2.0)
    }
}

impl fmt::Display for ViewRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!( f, "ViewRegion( center: {}, span: {:.3}x{:.3} )", self.center, self.lat_span, self.lon_span)
    }
}

fn clamp_span (span: f64, max: f64)->f64 {
    if span.is_nan() { MIN_SPAN } else { span.clamp( MIN_SPAN, max) }
}

/// map into [-180,180)
pub fn normalize_longitude (lon: f64)->f64 {
    if (-180.0..180.0).contains(&lon) { lon } else { (lon + 180.0).rem_euclid(360.0) - 180.0 }
}

#[inline] pub fn length_from_feet (ft: f64)->Length { Length::new::<foot>(ft) }
#[inline] pub fn length_from_meters (m: f64)->Length { Length::new::<meter>(m) }
#[inline] pub fn velocity_from_knots (kn: f64)->Velocity { Velocity::new::<knot>(kn) }
#[inline] pub fn velocity_from_feet_per_minute (fpm: f64)->Velocity { Velocity::new::<foot_per_minute>(fpm) }
#[inline] pub fn velocity_from_meters_per_second (mps: f64)->Velocity { Velocity::new::<meter_per_second>(mps) }

/// the provider independent data model for a tracked aircraft. All quantities are unit safe, regardless
/// of what the provider reports
#[derive(Debug,Clone,PartialEq,Serialize)]
pub struct Aircraft {
    pub icao24: Arc<String>, // we keep that in an Arc so that we can clone without heap allocation
    pub callsign: String, // as reported, might be blank or padded
    pub origin: String,
    pub registration: Option<String>,
    pub type_code: Option<String>,

    pub position: Position,
    pub altitude: Option<Length>, // barometric
    pub groundspeed: Option<Velocity>,
    pub track: Option<f64>, // degrees
    pub vertical_rate: Option<Velocity>,
}

impl Aircraft {
    pub fn new (icao24: &str, callsign: &str, origin: &str, position: Position)->Self {
        Aircraft {
            icao24: Arc::new( normalize_icao24( icao24)),
            callsign: callsign.to_string(),
            origin: origin.to_string(),
            registration: None,
            type_code: None,
            position,
            altitude: None,
            groundspeed: None,
            track: None,
            vertical_rate: None
        }
    }

    pub fn id (&self)->&str { self.icao24.as_str() }

    pub fn display_callsign (&self)->&str {
        let cs = self.callsign.trim();
        if cs.is_empty() { self.icao24.as_str() } else { cs }
    }

    /// aircraft on the ground or with unknown altitude/speed are not displayed
    pub fn is_active (&self)->bool {
        let alt = self.altitude.map( |a| a.get::<meter>()).unwrap_or(0.0);
        let spd = self.groundspeed.map( |v| v.get::<meter_per_second>()).unwrap_or(0.0);
        alt != 0.0 && spd != 0.0
    }
}

impl fmt::Display for Aircraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!( f, "Aircraft( icao24: {}, cs: \"{}\", origin: {}, pos: {}", self.icao24, self.callsign.trim(), self.origin, self.position)?;
        if let Some(reg) = &self.registration { write!( f, ", reg: {reg}")?; }
        if let Some(t) = &self.type_code { write!( f, ", type: {t}")?; }
        if let Some(alt) = self.altitude { write!( f, ", alt: {:.0}m", alt.get::<meter>())?; }
        if let Some(gs) = self.groundspeed { write!( f, ", spd: {:.1}m/s", gs.get::<meter_per_second>())?; }
        if let Some(trk) = self.track { write!( f, ", trk: {:.0}", trk)?; }
        if let Some(vr) = self.vertical_rate { write!( f, ", vr: {:.1}m/s", vr.get::<meter_per_second>())?; }
        write!( f, " )")
    }
}

pub fn normalize_icao24 (s: &str)->String { s.trim().to_lowercase() }

/// what the presentation layer shows as feed state
#[derive(Debug,Clone,PartialEq,Default)]
pub enum FeedStatus {
    #[default]
    Idle,
    Loading,
    Error(String)
}

impl fmt::Display for FeedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedStatus::Idle => write!( f, "idle"),
            FeedStatus::Loading => write!( f, "loading"),
            FeedStatus::Error(msg) => write!( f, "error: {msg}")
        }
    }
}

/// the outcome of one aircraft fetch. Produced by the fetch task and moved into the scheduler
#[derive(Debug)]
pub struct FetchResult {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub aircraft: Vec<Aircraft>,
    pub error: Option<OdinFlightError>
}

impl FetchResult {
    pub fn from_result (seq: u64, res: Result<Vec<Aircraft>>)->Self {
        let timestamp = Utc::now();
        match res {
            Ok(aircraft) => FetchResult{ seq, timestamp, aircraft, error: None },
            Err(e) => FetchResult{ seq, timestamp, aircraft: Vec::new(), error: Some(e) }
        }
    }

    pub fn is_ok (&self)->bool { self.error.is_none() }
}

/* #endregion data model */

/* #region config *******************************************************************************/

#[derive(Deserialize,Serialize,Debug,Clone)]
#[serde(default)]
pub struct FlightFeedConfig {
    pub provider: ProviderId, // the initially active provider
    pub max_display: usize, // max number of published aircraft
    pub fetch_timeout: Duration, // per network operation
    pub debounce: DebounceConfig,
    pub clip_global_to_region: bool, // only publish aircraft of global snapshots that are within the view region
    pub credentials: HashMap<ProviderId,ClientCredentials>,
    pub providers: Vec<ProviderConfig>, // registry overrides
}

impl Default for FlightFeedConfig {
    fn default()->Self {
        FlightFeedConfig {
            provider: ProviderId::OpenSky,
            max_display: 100,
            fetch_timeout: Duration::from_secs(30),
            debounce: DebounceConfig::default(),
            clip_global_to_region: true,
            credentials: HashMap::new(),
            providers: Vec::new()
        }
    }
}

/// load a RON config file
pub fn load_config<C> (path: impl AsRef<Path>)->Result<C> where C: for<'a> Deserialize<'a> {
    let path = path.as_ref();
    let data = fs::read( path).map_err( |e| OdinFlightError::ConfigError( format!("cannot read {path:?}: {e}")))?;
    Ok( ron::de::from_bytes( data.as_slice())? )
}

/* #endregion config */

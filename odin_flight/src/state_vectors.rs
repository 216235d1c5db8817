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

use std::sync::Arc;
use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

use crate::{
    Aircraft, Position, length_from_meters, velocity_from_meters_per_second,
    connector::{FeedProvider,dedup_last_wins},
    errors::Result,
    provider::ProviderConfig,
};

/// array-of-arrays state vector responses (OpenSky `states/all`)
///
/// ```text
/// {"time":1700000000,"states":[["a0b1c2","UAL123  ","United States",1700000000,1700000000,-122.3,37.6,10668.0,false,231.5,270.0,0.0,null,10900.0,"1200",false,0],...]}
/// ```
/// fields:
///   0: icao24
///   1: callsign (8 chars, space padded)
///   2: origin country
///   3: time position
///   4: last contact
///   5: longitude
///   6: latitude
///   7: barometric altitude (m)
///   8: on ground
///   9: velocity (m/s)
///  10: true track (deg)
///  11: vertical rate (m/s)
///  12..: sensors, geo altitude, squawk, spi, position source
///
/// 0,1,2,5,6 are required. Records without them are noise and get dropped
pub struct StateVectorProvider {
    config: Arc<ProviderConfig>
}

impl StateVectorProvider {
    pub fn new (config: Arc<ProviderConfig>)->Self { StateVectorProvider{config} }
}

const ICAO24: usize = 0;
const CALLSIGN: usize = 1;
const ORIGIN: usize = 2;
const LON: usize = 5;
const LAT: usize = 6;
const BARO_ALT: usize = 7;
const VELOCITY: usize = 9;
const TRACK: usize = 10;
const VRATE: usize = 11;

#[derive(Deserialize)]
struct StatesResponse {
    #[serde(default)]
    states: Option<Vec<Value>>
}

#[derive(Deserialize)]
struct TrackResponse {
    #[serde(default)]
    path: Vec<Value>
}

impl FeedProvider for StateVectorProvider {
    fn capabilities (&self)->&ProviderConfig { &self.config }

    fn parse_response (&self, data: &[u8])->Result<Vec<Aircraft>> {
        let response: StatesResponse = serde_json::from_slice( data)?;
        let records = response.states.unwrap_or_default(); // null states means nothing in range

        let parsed: Vec<Aircraft> = records.iter().filter_map( |rec| {
            let ac = parse_state_vector( rec);
            if ac.is_none() { trace!("dropped malformed state vector {rec}"); }
            ac
        }).collect();

        Ok( dedup_last_wins( parsed))
    }

    fn parse_track (&self, data: &[u8])->Result<Vec<Position>> {
        let response: TrackResponse = serde_json::from_slice( data)?;
        let mut track = Vec::with_capacity( response.path.len());

        // waypoints are [time, lat, lon, baro_alt, true_track, on_ground]
        for wp in &response.path {
            if let Some(fields) = wp.as_array() {
                let lat = fields.get(1).and_then( Value::as_f64);
                let lon = fields.get(2).and_then( Value::as_f64);
                if let (Some(lat),Some(lon)) = (lat,lon) {
                    let p = Position::new( lat, lon);
                    if p.is_valid() { track.push( p) }
                }
            }
        }
        Ok(track)
    }
}

pub fn parse_state_vector (rec: &Value)->Option<Aircraft> {
    let fields = rec.as_array()?;

    let icao24 = fields.get( ICAO24)?.as_str()?;
    let callsign = fields.get( CALLSIGN)?.as_str()?;
    let origin = fields.get( ORIGIN)?.as_str()?;
    let longitude = fields.get( LON)?.as_f64()?;
    let latitude = fields.get( LAT)?.as_f64()?;

    let position = Position::new( latitude, longitude);
    if icao24.trim().is_empty() || !position.is_valid() { return None }

    let mut ac = Aircraft::new( icao24, callsign, origin, position);
    ac.altitude = opt_f64( fields, BARO_ALT).map( length_from_meters);
    ac.groundspeed = opt_f64( fields, VELOCITY).map( velocity_from_meters_per_second);
    ac.track = opt_f64( fields, TRACK);
    ac.vertical_rate = opt_f64( fields, VRATE).map( velocity_from_meters_per_second);
    Some(ac)
}

fn opt_f64 (fields: &[Value], idx: usize)->Option<f64> {
    fields.get( idx).and_then( Value::as_f64)
}

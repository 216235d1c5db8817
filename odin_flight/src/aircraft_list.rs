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
use serde::{Deserialize,Deserializer,de::DeserializeOwned};
use serde_json::Value;
use tracing::trace;

use crate::{
    Aircraft, Position, length_from_feet, velocity_from_feet_per_minute, velocity_from_knots,
    connector::{FeedProvider,dedup_last_wins},
    errors::{OdinFlightError,Result,parse_error},
    provider::ProviderConfig,
    registration::country_for_registration,
};

const UNKNOWN_ORIGIN: &str = "Unknown";

/// readsb style aircraft lists (adsb.lol, airplanes.live `v2/point`) with named fields in aviation units
///
/// ```text
/// {"ac":[{"hex":"a0b1c2","flight":"UAL123  ","r":"N12345","t":"B738","lat":37.6,"lon":-122.3,"alt_baro":35000,"gs":450.0,"track":270.0,"baro_rate":-64},...],"msg":"No error","now":1700000000000,...}
/// ```
pub struct AircraftListProvider {
    config: Arc<ProviderConfig>
}

impl AircraftListProvider {
    pub fn new (config: Arc<ProviderConfig>)->Self { AircraftListProvider{config} }
}

/// barometric altitude is either feet or the literal "ground"
#[derive(Deserialize,Debug,Clone,PartialEq)]
#[serde(untagged)]
pub enum BaroAltitude {
    Feet(f64),
    Label(String)
}

impl BaroAltitude {
    pub fn feet (&self)->Option<f64> {
        match self {
            BaroAltitude::Feet(ft) => Some(*ft),
            BaroAltitude::Label(s) if s.eq_ignore_ascii_case("ground") => Some(0.0),
            _ => None
        }
    }
}

/// only hex and position are required. Optional fields with unexpected values are treated as missing
#[derive(Deserialize,Debug)]
struct AircraftRecord {
    hex: String,
    lat: f64,
    lon: f64,
    #[serde(default, deserialize_with = "lenient")] flight: Option<String>,
    #[serde(default, deserialize_with = "lenient")] r: Option<String>,
    #[serde(default, deserialize_with = "lenient")] t: Option<String>,
    #[serde(default, deserialize_with = "lenient")] desc: Option<String>,
    #[serde(default, deserialize_with = "lenient")] alt_baro: Option<BaroAltitude>,
    #[serde(default, deserialize_with = "lenient")] gs: Option<f64>, // knots
    #[serde(default, deserialize_with = "lenient")] track: Option<f64>,
    #[serde(default, deserialize_with = "lenient")] baro_rate: Option<f64>, // ft/min
}

fn lenient<'de,D,T> (deserializer: D)->std::result::Result<Option<T>,D::Error>
    where D: Deserializer<'de>, T: DeserializeOwned
{
    let value = Value::deserialize( deserializer)?;
    Ok( serde_json::from_value( value).ok())
}

impl AircraftRecord {
    fn into_aircraft (self)->Option<Aircraft> {
        let position = Position::new( self.lat, self.lon);
        if self.hex.trim().is_empty() || !position.is_valid() { return None }

        let origin = self.r.as_deref()
            .and_then( country_for_registration)
            .map( str::to_string)
            .or_else( || self.desc.clone().filter( |d| !d.trim().is_empty()))
            .unwrap_or_else( || UNKNOWN_ORIGIN.to_string());

        let mut ac = Aircraft::new( &self.hex, self.flight.as_deref().unwrap_or(""), &origin, position);
        ac.registration = self.r.map( |r| r.trim().to_string()).filter( |r| !r.is_empty());
        ac.type_code = self.t.map( |t| t.trim().to_string()).filter( |t| !t.is_empty());
        ac.altitude = self.alt_baro.and_then( |a| a.feet()).map( length_from_feet);
        ac.groundspeed = self.gs.map( velocity_from_knots);
        ac.track = self.track;
        ac.vertical_rate = self.baro_rate.map( velocity_from_feet_per_minute);
        Some(ac)
    }
}

impl FeedProvider for AircraftListProvider {
    fn capabilities (&self)->&ProviderConfig { &self.config }

    fn parse_response (&self, data: &[u8])->Result<Vec<Aircraft>> {
        let mut response: Value = serde_json::from_slice( data)?;

        let records = match response.get_mut("ac").map( Value::take) {
            Some(Value::Array(list)) => list,
            Some(Value::Null) | None => Vec::new(), // empty areas might omit the list
            Some(other) => return Err( parse_error!("unexpected aircraft list: {}", other))
        };

        let parsed: Vec<Aircraft> = records.into_iter().filter_map( |rec| {
            match serde_json::from_value::<AircraftRecord>( rec) {
                Ok(r) => {
                    let ac = r.into_aircraft();
                    if ac.is_none() { trace!("dropped aircraft record without valid id or position"); }
                    ac
                }
                Err(e) => {
                    trace!("dropped malformed aircraft record: {e}");
                    None
                }
            }
        }).collect();

        Ok( dedup_last_wins( parsed))
    }

    /// aircraft list providers have no track history
    fn parse_track (&self, _data: &[u8])->Result<Vec<Position>> {
        Ok( Vec::new())
    }
}

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

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc, time::Duration};
use serde::{Serialize,Deserialize};
use crate::errors::{OdinFlightError,Result};

/// upper bound for geographic queries of all supported aggregators
pub const MAX_RADIUS_NM: f64 = 250.0;

#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash,Serialize,Deserialize,Default)]
pub enum ProviderId {
    #[default]
    OpenSky,
    AdsbLol,
    AirplanesLive
}

impl ProviderId {
    pub const ALL: [ProviderId;3] = [ProviderId::OpenSky, ProviderId::AdsbLol, ProviderId::AirplanesLive];

    pub fn name (&self)->&'static str {
        match self {
            ProviderId::OpenSky => "opensky",
            ProviderId::AdsbLol => "adsb.lol",
            ProviderId::AirplanesLive => "airplanes.live"
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!( f, "{}", self.name())
    }
}

impl FromStr for ProviderId {
    type Err = OdinFlightError;

    fn from_str (s: &str)->Result<Self> {
        let s = s.trim().to_lowercase();
        ProviderId::ALL.into_iter()
            .find( |id| id.name() == s || format!("{id:?}").to_lowercase() == s)
            .ok_or_else( || OdinFlightError::UnknownProvider(s))
    }
}

/// the wire shape of aircraft responses
#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize)]
pub enum ResponseFormat {
    /// array-of-arrays with fixed field positions
    StateVectors,
    /// list of objects with named fields in aviation units
    AircraftList
}

/// immutable description of a data source. Created once, shared as `Arc<ProviderConfig>`
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct ProviderConfig {
    pub id: ProviderId,
    pub format: ResponseFormat,
    pub aircraft_url: String, // template with {lat}, {lon}, {radius} placeholders for geographic queries
    pub track_url: Option<String>, // template with {icao24} placeholder
    pub auth_url: Option<String>, // OAuth2 client credentials token endpoint
    pub min_refresh_interval: Duration, // nobody polls faster than this
    pub max_radius_nm: f64,
    pub supports_global_query: bool,
    pub supports_historical_track: bool,
    pub requires_auth: bool, // attach a bearer token if we can get one (anonymous access still works)
}

impl ProviderConfig {
    pub fn opensky ()->Self {
        ProviderConfig {
            id: ProviderId::OpenSky,
            format: ResponseFormat::StateVectors,
            aircraft_url: "https://opensky-network.org/api/states/all".to_string(),
            track_url: Some("https://opensky-network.org/api/tracks/all?icao24={icao24}&time=0".to_string()),
            auth_url: Some("https://auth.opensky-network.org/auth/realms/opensky-network/protocol/openid-connect/token".to_string()),
            min_refresh_interval: Duration::from_secs(10),
            max_radius_nm: MAX_RADIUS_NM,
            supports_global_query: true,
            supports_historical_track: true,
            requires_auth: true
        }
    }

    pub fn adsb_lol ()->Self {
        ProviderConfig {
            id: ProviderId::AdsbLol,
            format: ResponseFormat::AircraftList,
            aircraft_url: "https://api.adsb.lol/v2/point/{lat}/{lon}/{radius}".to_string(),
            track_url: None,
            auth_url: None,
            min_refresh_interval: Duration::from_secs(5),
            max_radius_nm: MAX_RADIUS_NM,
            supports_global_query: false,
            supports_historical_track: false,
            requires_auth: false
        }
    }

    pub fn airplanes_live ()->Self {
        ProviderConfig {
            id: ProviderId::AirplanesLive,
            format: ResponseFormat::AircraftList,
            aircraft_url: "https://api.airplanes.live/v2/point/{lat}/{lon}/{radius}".to_string(),
            track_url: None,
            auth_url: None,
            min_refresh_interval: Duration::from_secs(2),
            max_radius_nm: MAX_RADIUS_NM,
            supports_global_query: false,
            supports_historical_track: false,
            requires_auth: false
        }
    }
}

/// lookup table of provider descriptors. This is all the provider identity branching we do outside of the
/// [`crate::connector::FeedProvider`] implementations
#[derive(Debug,Clone)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderId,Arc<ProviderConfig>>
}

impl Default for ProviderRegistry {
    fn default()->Self {
        ProviderRegistry::from_configs( vec![ ProviderConfig::opensky(), ProviderConfig::adsb_lol(), ProviderConfig::airplanes_live() ])
    }
}

impl ProviderRegistry {
    pub fn from_configs (configs: Vec<ProviderConfig>)->Self {
        let providers = configs.into_iter().map( |c| (c.id, Arc::new(c))).collect();
        ProviderRegistry { providers }
    }

    /// the built-in providers, with entries replaced by the given overrides
    pub fn with_overrides (overrides: &[ProviderConfig])->Self {
        let mut registry = ProviderRegistry::default();
        for c in overrides {
            registry.providers.insert( c.id, Arc::new( c.clone()));
        }
        registry
    }

    pub fn get (&self, id: ProviderId)->Result<Arc<ProviderConfig>> {
        self.providers.get( &id).cloned().ok_or_else( || OdinFlightError::UnknownProvider( id.to_string()))
    }

    pub fn ids (&self)->impl Iterator<Item=ProviderId> + '_ { self.providers.keys().copied() }

    pub fn len (&self)->usize { self.providers.len() }
}

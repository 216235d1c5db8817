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

use std::{collections::HashMap, sync::Arc, time::Duration};
use async_trait::async_trait;
use reqwest::{Client,RequestBuilder,StatusCode,header::{ACCEPT,HeaderValue}};
use uom::si::{f64::Length, length::nautical_mile};
use tracing::{debug,trace,warn};

use crate::{
    Aircraft, Position, ViewRegion,
    aircraft_list::AircraftListProvider,
    credentials::CredentialManager,
    errors::{OdinFlightError,Result},
    provider::{ProviderConfig,ProviderRegistry,ResponseFormat},
    state_vectors::StateVectorProvider,
};

/// what area to ask for. Providers with global queries ignore it
#[derive(Debug,Clone,Copy,PartialEq)]
pub struct FeedQuery {
    pub center: Position,
    pub radius: Length,
}

impl FeedQuery {
    pub fn new (center: Position, radius: Length)->Self { FeedQuery{center,radius} }

    pub fn for_region (region: &ViewRegion)->Self {
        FeedQuery { center: region.center(), radius: region.radius() }
    }

    /// used for global providers before we know a view region
    pub fn world ()->Self {
        FeedQuery { center: Position::new(0.0, 0.0), radius: Length::new::<nautical_mile>( f64::MAX) }
    }

    /// radius in whole nautical miles, capped at the provider limit and never below 1
    pub fn radius_nm (&self, max_nm: f64)->u32 {
        let nm = self.radius.get::<nautical_mile>();
        let nm = if nm.is_finite() { nm.min( max_nm) } else { max_nm };
        nm.ceil().max(1.0) as u32
    }
}

/// the provider strategy - everything that depends on which aggregator we talk to.
/// One implementation per response format, selected once per provider (see [`provider_for`])
pub trait FeedProvider: Send + Sync {
    fn capabilities (&self)->&ProviderConfig;

    fn parse_response (&self, data: &[u8])->Result<Vec<Aircraft>>;

    fn parse_track (&self, data: &[u8])->Result<Vec<Position>>;

    fn aircraft_url (&self, query: &FeedQuery)->String {
        let config = self.capabilities();
        if config.supports_global_query {
            config.aircraft_url.clone()
        } else {
            config.aircraft_url
                .replace( "{lat}", &format!("{:.4}", query.center.latitude))
                .replace( "{lon}", &format!("{:.4}", query.center.longitude))
                .replace( "{radius}", &query.radius_nm( config.max_radius_nm).to_string())
        }
    }

    fn track_url (&self, icao24: &str)->Option<String> {
        let config = self.capabilities();
        if config.supports_historical_track {
            config.track_url.as_ref().map( |t| t.replace( "{icao24}", icao24))
        } else {
            None
        }
    }

    fn build_request (&self, client: &Client, query: &FeedQuery)->RequestBuilder {
        client.get( self.aircraft_url( query)).header( ACCEPT, HeaderValue::from_static("application/json"))
    }

    fn build_track_request (&self, client: &Client, icao24: &str)->Option<RequestBuilder> {
        self.track_url( icao24).map( |url| client.get( url).header( ACCEPT, HeaderValue::from_static("application/json")))
    }
}

pub fn provider_for (config: Arc<ProviderConfig>)->Arc<dyn FeedProvider> {
    match config.format {
        ResponseFormat::StateVectors => Arc::new( StateVectorProvider::new( config)),
        ResponseFormat::AircraftList => Arc::new( AircraftListProvider::new( config)),
    }
}

/// the abstraction the engine uses to get data, which allows us to inject mock connectors for testing
#[async_trait]
pub trait FlightConnector: Send + Sync {
    fn provider (&self)->&ProviderConfig;

    async fn fetch_aircraft (&self, query: &FeedQuery)->Result<Vec<Aircraft>>;

    /// the raw track request. Use [`FlightConnector::fetch_track`] unless you need the error
    async fn request_track (&self, icao24: &str)->Result<Vec<Position>>;

    /// a missing track never fails the flight display - unsupported providers and failures both yield an empty track
    async fn fetch_track (&self, icao24: &str)->Vec<Position> {
        if !self.provider().supports_historical_track {
            return Vec::new()
        }
        match self.request_track( icao24).await {
            Ok(track) => track,
            Err(e) => {
                warn!("track request for {} from {} failed: {}", icao24, self.provider().id, e);
                Vec::new()
            }
        }
    }
}

/// the http based FlightConnector
pub struct LiveFlightConnector {
    client: Client,
    provider: Arc<dyn FeedProvider>,
    credentials: Arc<CredentialManager>,
}

impl LiveFlightConnector {
    pub fn new (client: Client, provider: Arc<dyn FeedProvider>, credentials: Arc<CredentialManager>)->Self {
        LiveFlightConnector { client, provider, credentials }
    }

    /// one connector per registered provider, all sharing the same client and credential manager
    pub fn for_registry (registry: &ProviderRegistry, client: &Client, credentials: &Arc<CredentialManager>)->Result<Vec<Arc<dyn FlightConnector>>> {
        let mut connectors: Vec<Arc<dyn FlightConnector>> = Vec::with_capacity( registry.len());
        for id in registry.ids() {
            let provider = provider_for( registry.get( id)?);
            connectors.push( Arc::new( LiveFlightConnector::new( client.clone(), provider, credentials.clone())));
        }
        Ok(connectors)
    }

    /// attach a bearer token if the provider wants one and we can get one. Failing to get a token is not
    /// fatal - we fall back to anonymous access
    async fn authorize (&self, request: RequestBuilder)->RequestBuilder {
        let config = self.provider.capabilities();
        if !config.requires_auth {
            return request
        }
        if !self.credentials.has_credentials( config.id) {
            trace!("no credentials for {}, using anonymous access", config.id);
            return request
        }

        match self.credentials.acquire_token( config).await {
            Ok(token) => request.bearer_auth( token),
            Err(e) => {
                warn!("falling back to anonymous access for {}: {}", config.id, e);
                request
            }
        }
    }

    async fn get_bytes (&self, request: RequestBuilder)->Result<Vec<u8>> {
        let request = self.authorize( request).await;
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            self.credentials.invalidate( self.provider.capabilities().id).await; // renew on next request
        }
        check_status( status)?;

        Ok( response.bytes().await?.to_vec() )
    }
}

#[async_trait]
impl FlightConnector for LiveFlightConnector {
    fn provider (&self)->&ProviderConfig { self.provider.capabilities() }

    async fn fetch_aircraft (&self, query: &FeedQuery)->Result<Vec<Aircraft>> {
        let request = self.provider.build_request( &self.client, query);
        let data = self.get_bytes( request).await?;
        let aircraft = self.provider.parse_response( &data)?;
        debug!("{} returned {} aircraft", self.provider().id, aircraft.len());
        Ok(aircraft)
    }

    async fn request_track (&self, icao24: &str)->Result<Vec<Position>> {
        let Some(request) = self.provider.build_track_request( &self.client, icao24) else {
            return Ok( Vec::new())
        };
        let data = self.get_bytes( request).await?;
        self.provider.parse_track( &data)
    }
}

/// HTTP status classification shared by all providers
pub fn check_status (status: StatusCode)->Result<()> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        Err( OdinFlightError::RateLimitError)
    } else if !status.is_success() {
        Err( OdinFlightError::ServerError( status.as_u16()))
    } else {
        Ok(())
    }
}

/// a client with a bounded per-request timeout
pub fn create_client (timeout: Duration)->Result<Client> {
    Client::builder()
        .timeout( timeout)
        .user_agent( concat!( env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err( |e| OdinFlightError::NetworkError( format!("failed to create http client: {e}")))
}

/// enforce identifier uniqueness within one response. The first occurrence keeps its place in delivery
/// order, the last parsed record for that identifier provides the data
pub fn dedup_last_wins (parsed: Vec<Aircraft>)->Vec<Aircraft> {
    let mut index: HashMap<Arc<String>,usize> = HashMap::with_capacity( parsed.len());
    let mut list: Vec<Aircraft> = Vec::with_capacity( parsed.len());

    for ac in parsed {
        if let Some(&i) = index.get( &ac.icao24) {
            list[i] = ac;
        } else {
            index.insert( ac.icao24.clone(), list.len());
            list.push( ac);
        }
    }
    list
}

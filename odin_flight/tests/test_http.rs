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

use std::{collections::HashMap, sync::{Arc,atomic::{AtomicUsize,Ordering}}, time::Duration};
use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap,StatusCode,header::{AUTHORIZATION,CONTENT_TYPE}},
    response::{IntoResponse,Response},
    routing::{get,post},
};
use serde_json::json;
use uom::si::{f64::Length, length::mile};
use odin_flight::{
    FeedStatus, FlightFeedConfig, Position,
    actor::FlightFeedActor,
    connector::{FeedQuery,FlightConnector,LiveFlightConnector,create_client,provider_for},
    credentials::{ClientCredentials,CredentialManager},
    errors::OdinFlightError,
    provider::{ProviderConfig,ProviderId,ProviderRegistry,ResponseFormat},
};

const STATES: &str = r#"{"time":1700000000,"states":[["a0b1c2","UAL123  ","United States",1700000000,1700000000,-122.3,37.6,10668.0,false,231.5,270.0,0.0,null,10900.0,"1200",false,0]]}"#;
const AIRCRAFT_LIST: &str = r#"{"ac":[{"hex":"a1b2c3","flight":"DAL45   ","r":"N12345","lat":37.5,"lon":-122.2,"alt_baro":10000,"gs":450.0}]}"#;

async fn token (State(n_exchanges): State<Arc<AtomicUsize>>, Form(params): Form<HashMap<String,String>>)->Response {
    n_exchanges.fetch_add( 1, Ordering::SeqCst);
    tokio::time::sleep( Duration::from_millis(100)).await;

    let param = |k: &str| params.get(k).map( String::as_str);
    if param("grant_type") == Some("client_credentials") && param("client_id") == Some("me") && param("client_secret") == Some("s3cret") {
        Json( json!({ "access_token": "tok1", "expires_in": 1800 })).into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

// anonymous access works, a wrong token does not
async fn states (headers: HeaderMap)->Response {
    match headers.get( AUTHORIZATION).and_then( |v| v.to_str().ok()) {
        None | Some("Bearer tok1") => ([(CONTENT_TYPE, "application/json")], STATES).into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn aircraft_list ()->Response {
    ([(CONTENT_TYPE, "application/json")], AIRCRAFT_LIST).into_response()
}

struct TestServer {
    base: String,
    n_exchanges: Arc<AtomicUsize>,
}

async fn serve ()->TestServer {
    let n_exchanges = Arc::new( AtomicUsize::new(0));
    let router = Router::new()
        .route( "/token", post( token))
        .route( "/states", get( states))
        .route( "/v2/point/{lat}/{lon}/{radius}", get( aircraft_list))
        .route( "/ratelimited", get( || async { StatusCode::TOO_MANY_REQUESTS }))
        .route( "/broken", get( || async { StatusCode::INTERNAL_SERVER_ERROR }))
        .with_state( n_exchanges.clone());

    let listener = tokio::net::TcpListener::bind( "127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn( async move { axum::serve( listener, router).await.unwrap() });

    TestServer { base: format!("http://{addr}"), n_exchanges }
}

fn global_provider (base: &str, path: &str)->ProviderConfig {
    ProviderConfig {
        aircraft_url: format!("{base}{path}"),
        track_url: None,
        auth_url: Some( format!("{base}/token")),
        ..ProviderConfig::opensky()
    }
}

fn connector (config: ProviderConfig, credentials: HashMap<ProviderId,ClientCredentials>)->(Arc<LiveFlightConnector>,Arc<CredentialManager>) {
    let client = create_client( Duration::from_secs(5)).unwrap();
    let credentials = Arc::new( CredentialManager::new( client.clone(), credentials));
    let connector = Arc::new( LiveFlightConnector::new( client, provider_for( Arc::new( config)), credentials.clone()));
    (connector, credentials)
}

fn query ()->FeedQuery { FeedQuery::new( Position::new( 37.5, -122.3), Length::new::<mile>( 50.0)) }

fn valid_credentials ()->HashMap<ProviderId,ClientCredentials> {
    HashMap::from([ (ProviderId::OpenSky, ClientCredentials::new( "me", "s3cret")) ])
}

#[tokio::test]
async fn test_status_classification () {
    let server = serve().await;

    let (c, _) = connector( global_provider( &server.base, "/ratelimited"), HashMap::new());
    let res = c.fetch_aircraft( &query()).await;
    assert!( matches!( res, Err(OdinFlightError::RateLimitError)));
    assert!( res.unwrap_err().is_transient());

    let (c, _) = connector( global_provider( &server.base, "/broken"), HashMap::new());
    assert!( matches!( c.fetch_aircraft( &query()).await, Err(OdinFlightError::ServerError(500))));

    let (c, _) = connector( global_provider( &server.base, "/does_not_exist"), HashMap::new());
    assert!( matches!( c.fetch_aircraft( &query()).await, Err(OdinFlightError::ServerError(404))));
}

#[tokio::test]
async fn test_connection_failure () {
    // bind and drop to get a port nobody listens on
    let addr = tokio::net::TcpListener::bind( "127.0.0.1:0").await.unwrap().local_addr().unwrap();
    let (c, _) = connector( global_provider( &format!("http://{addr}"), "/states"), HashMap::new());

    let err = c.fetch_aircraft( &query()).await.unwrap_err();
    assert!( matches!( err, OdinFlightError::NetworkError(_)));
    assert!( err.is_transient());
}

#[tokio::test]
async fn test_geographic_query () {
    let server = serve().await;
    let config = ProviderConfig {
        aircraft_url: format!("{}/v2/point/{{lat}}/{{lon}}/{{radius}}", server.base),
        ..ProviderConfig::adsb_lol()
    };
    assert_eq!( config.format, ResponseFormat::AircraftList);

    let (c, _) = connector( config, HashMap::new());
    let list = c.fetch_aircraft( &query()).await.unwrap();
    assert_eq!( list.len(), 1);
    assert_eq!( list[0].id(), "a1b2c3");
    assert_eq!( list[0].origin, "United States");

    assert!( c.fetch_track( "a1b2c3").await.is_empty());
}

#[tokio::test]
async fn test_single_token_exchange () {
    let server = serve().await;
    let (c, credentials) = connector( global_provider( &server.base, "/states"), valid_credentials());

    let tasks: Vec<_> = (0..5).map( |_| {
        let c = c.clone();
        tokio::spawn( async move { c.fetch_aircraft( &query()).await })
    }).collect();

    for task in tasks {
        let list = task.await.unwrap().unwrap();
        assert_eq!( list[0].id(), "a0b1c2");
    }
    assert_eq!( server.n_exchanges.load( Ordering::SeqCst), 1);

    // cached until it needs renewal
    let token = credentials.acquire_token( c.provider()).await.unwrap();
    assert_eq!( token, "tok1");
    assert_eq!( server.n_exchanges.load( Ordering::SeqCst), 1);

    credentials.invalidate( ProviderId::OpenSky).await;
    credentials.acquire_token( c.provider()).await.unwrap();
    assert_eq!( server.n_exchanges.load( Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_anonymous_fallback () {
    let server = serve().await;
    let creds = HashMap::from([ (ProviderId::OpenSky, ClientCredentials::new( "me", "wrong")) ]);
    let (c, credentials) = connector( global_provider( &server.base, "/states"), creds);

    let res = credentials.acquire_token( c.provider()).await;
    assert!( matches!( res, Err(OdinFlightError::AuthError(_))));

    // the fetch itself still works without a token
    let list = c.fetch_aircraft( &query()).await.unwrap();
    assert_eq!( list.len(), 1);
}

#[tokio::test]
async fn test_failed_track () {
    let server = serve().await;
    let config = ProviderConfig {
        track_url: Some( format!("{}/broken?icao24={{icao24}}", server.base)),
        ..global_provider( &server.base, "/states")
    };
    assert!( config.supports_historical_track);

    let (c, _) = connector( config.clone(), HashMap::new());
    assert!( matches!( c.request_track( "a0b1c2").await, Err(OdinFlightError::ServerError(500))));
    assert!( c.fetch_track( "a0b1c2").await.is_empty());

    // the engine still publishes aircraft, the selection just has no track
    let feed_config = FlightFeedConfig { provider: ProviderId::OpenSky, clip_global_to_region: false, ..FlightFeedConfig::default() };
    let registry = ProviderRegistry::from_configs( vec![ config ]);
    let (hfeed, _join_handle) = FlightFeedActor::spawn( feed_config, registry, vec![ c as Arc<dyn FlightConnector> ]).unwrap();

    let mut rx = hfeed.subscribe();
    tokio::time::timeout( Duration::from_secs(5), rx.wait_for( |view| !view.aircraft.is_empty())).await.unwrap().unwrap();

    assert!( hfeed.select( "a0b1c2").await.unwrap().is_some());
    tokio::time::sleep( Duration::from_millis(500)).await; // let the track request fail

    let view = hfeed.view();
    assert_eq!( view.status, FeedStatus::Idle);
    assert_eq!( view.aircraft[0].id(), "a0b1c2");
    let selection = view.selection.unwrap();
    assert!( !selection.stale);
    assert!( selection.track.is_empty());

    hfeed.terminate().await.unwrap();
}

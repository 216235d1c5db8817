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

use std::time::Duration;
use uom::si::length::mile;
use odin_flight::{
    Aircraft, FetchResult, FlightFeedConfig, MIN_SPAN, Position, ViewRegion,
    length_from_meters, load_config, velocity_from_meters_per_second,
    connector::dedup_last_wins,
    debouncer::{DebounceConfig,RegionChange,ViewportDebouncer},
    errors::OdinFlightError,
    provider::ProviderId,
    scheduler::{FetchOutcome,FetchState,RefreshScheduler,select_display},
    selection::SelectionReconciler,
};

fn aircraft (id: &str, lat: f64, lon: f64, alt: f64, spd: f64)->Aircraft {
    let mut ac = Aircraft::new( id, "TEST", "Nowhere", Position::new( lat, lon));
    ac.altitude = Some( length_from_meters( alt));
    ac.groundspeed = Some( velocity_from_meters_per_second( spd));
    ac
}

fn ids (list: &[Aircraft])->Vec<&str> { list.iter().map( |ac| ac.id()).collect() }

#[test]
fn test_region_clamping () {
    let r = ViewRegion::new( 37.0, -122.0, 0.02, 0.02).zoomed( 0.1);
    assert_eq!( r.lat_span(), MIN_SPAN);
    assert_eq!( r.lon_span(), MIN_SPAN);

    let r = ViewRegion::new( 37.0, -122.0, 100.0, 100.0).zoomed( 10.0);
    assert_eq!( r.lat_span(), 180.0);
    assert_eq!( r.lon_span(), 360.0);

    let r = ViewRegion::new( 95.0, 190.0, 0.0, 500.0);
    assert_eq!( r.center(), Position::new( 90.0, -170.0));
    assert_eq!( r.lat_span(), MIN_SPAN);
    assert_eq!( r.lon_span(), 360.0);

    let r = ViewRegion::new( 37.0, -122.0, 1.0, 2.0);
    assert_eq!( r.zoomed( 0.0), r);
    assert_eq!( r.zoomed( -2.0), r);
    assert_eq!( r.zoomed( f64::NAN), r);
    assert_eq!( r.zoomed( 0.5).lat_span(), 0.5);
}

#[test]
fn test_region_geometry () {
    let r = ViewRegion::new( 0.0, 0.0, 1.0, 1.0);
    assert!( (r.radius().get::<mile>() - 34.525).abs() < 1e-9);
    assert!( r.contains( &Position::new( 0.4, -0.4)));
    assert!( !r.contains( &Position::new( 0.6, 0.0)));

    // across the antimeridian
    let r = ViewRegion::new( 10.0, 179.5, 2.0, 2.0);
    assert!( r.contains( &Position::new( 10.0, -179.8)));
    assert!( !r.contains( &Position::new( 10.0, -178.0)));
}

#[test]
fn test_significant_changes () {
    let debouncer = ViewportDebouncer::new( DebounceConfig::default());
    let prev = ViewRegion::new( 0.0, 0.0, 1.0, 1.0);

    assert!( debouncer.is_significant( &prev, &ViewRegion::new( 0.1251, 0.0, 1.0, 1.0)));
    assert!( !debouncer.is_significant( &prev, &ViewRegion::new( 0.05, 0.0, 1.0, 1.0)));
    assert!( !debouncer.is_significant( &prev, &ViewRegion::new( 0.1, 0.0, 1.0, 1.0)));
    assert!( debouncer.is_significant( &prev, &ViewRegion::new( 0.0, -0.2, 1.0, 1.0)));

    assert!( debouncer.is_significant( &prev, &ViewRegion::new( 0.0, 0.0, 1.11, 1.0)));
    assert!( debouncer.is_significant( &prev, &ViewRegion::new( 0.0, 0.0, 1.0, 0.8)));
    assert!( !debouncer.is_significant( &prev, &ViewRegion::new( 0.0, 0.0, 1.05, 0.95)));
}

#[test]
fn test_observe_updates_reference () {
    let mut debouncer = ViewportDebouncer::new( DebounceConfig::default());

    assert_eq!( debouncer.observe( ViewRegion::new( 0.0, 0.0, 1.0, 1.0)), RegionChange::First);
    assert_eq!( debouncer.observe( ViewRegion::new( 0.06, 0.0, 1.0, 1.0)), RegionChange::Insignificant);
    assert_eq!( debouncer.reference(), Some( &ViewRegion::new( 0.06, 0.0, 1.0, 1.0)));
    assert_eq!( debouncer.observe( ViewRegion::new( 0.12, 0.0, 1.0, 1.0)), RegionChange::Insignificant);
    assert_eq!( debouncer.observe( ViewRegion::new( 0.5, 0.0, 1.0, 1.0)), RegionChange::Significant);

    debouncer.reset();
    assert_eq!( debouncer.observe( ViewRegion::new( 0.5, 0.0, 1.0, 1.0)), RegionChange::First);
}

#[test]
fn test_display_selection () {
    let list = vec![
        aircraft( "a00001", 37.0, -122.0, 1000.0, 100.0),
        aircraft( "a00002", 37.0, -122.0, 0.0, 100.0), // on ground
        aircraft( "a00003", 37.1, -122.1, 1000.0, 0.0), // no speed
        aircraft( "a00004", 37.2, -122.2, 1000.0, 100.0),
        aircraft( "a00005", 45.0, -100.0, 1000.0, 100.0),
        aircraft( "a00006", 37.3, -122.3, 1000.0, 100.0),
    ];

    assert_eq!( ids( &select_display( list.clone(), None, 100)), vec!["a00001", "a00004", "a00005", "a00006"]);
    assert_eq!( ids( &select_display( list.clone(), None, 2)), vec!["a00001", "a00004"]);

    let region = ViewRegion::new( 37.0, -122.0, 1.0, 1.0);
    assert_eq!( ids( &select_display( list, Some(&region), 100)), vec!["a00001", "a00004", "a00006"]);

    let mut ac = aircraft( "a00007", 37.0, -122.0, 1000.0, 100.0);
    ac.altitude = None;
    assert!( !ac.is_active());
}

#[test]
fn test_dedup () {
    let list = dedup_last_wins( vec![
        aircraft( "a00001", 37.0, -122.0, 1000.0, 100.0),
        aircraft( "a00002", 37.0, -122.0, 1000.0, 100.0),
        aircraft( "A00001", 38.0, -123.0, 2000.0, 100.0),
    ]);
    assert_eq!( ids( &list), vec!["a00001", "a00002"]);
    assert_eq!( list[0].position, Position::new( 38.0, -123.0));
}

#[test]
fn test_stale_results () {
    let mut scheduler = RefreshScheduler::new( 100);
    assert_eq!( scheduler.state(), FetchState::Idle);

    let slow = scheduler.begin_fetch();
    let fast = scheduler.begin_fetch();
    assert_eq!( scheduler.state(), FetchState::Fetching { seq: fast });

    let res = FetchResult::from_result( fast, Ok( vec![ aircraft( "b00002", 37.0, -122.0, 1000.0, 100.0) ]));
    assert!( matches!( scheduler.apply( res, None), FetchOutcome::Updated(_)));
    assert_eq!( scheduler.state(), FetchState::Idle);

    let res = FetchResult::from_result( slow, Ok( vec![ aircraft( "b00001", 37.0, -122.0, 1000.0, 100.0) ]));
    assert!( matches!( scheduler.apply( res, None), FetchOutcome::Stale { .. }));
    assert_eq!( ids( &scheduler.aircraft()), vec!["b00002"]);

    // errors keep the last good set
    let seq = scheduler.begin_fetch();
    let res = FetchResult::from_result( seq, Err( OdinFlightError::RateLimitError));
    assert!( !res.is_ok());
    assert!( matches!( scheduler.apply( res, None), FetchOutcome::Failed( OdinFlightError::RateLimitError)));
    assert_eq!( ids( &scheduler.aircraft()), vec!["b00002"]);
    assert_eq!( scheduler.state(), FetchState::Idle);

    // a reset supersedes whatever is in flight
    let seq = scheduler.begin_fetch();
    scheduler.reset();
    assert!( scheduler.aircraft().is_empty());
    let res = FetchResult::from_result( seq, Ok( vec![ aircraft( "b00003", 37.0, -122.0, 1000.0, 100.0) ]));
    assert!( matches!( scheduler.apply( res, None), FetchOutcome::Stale { .. }));
}

#[test]
fn test_selection_reconciler () {
    let mut reconciler = SelectionReconciler::new();
    let first = vec![ aircraft( "test123", 37.0, -122.0, 1000.0, 100.0), aircraft( "other1", 37.0, -122.0, 1000.0, 100.0) ];

    let (snapshot, generation) = reconciler.select( "TEST123", &first);
    assert_eq!( snapshot.as_ref().map( |ac| ac.id()), Some("test123"));
    assert!( !reconciler.current().unwrap().stale);

    // absent from the next update: snapshot retained, marked stale
    let second = vec![ aircraft( "other1", 37.1, -122.0, 1000.0, 100.0) ];
    assert!( reconciler.rebind( &second));
    let sel = reconciler.current().unwrap();
    assert!( sel.stale);
    assert_eq!( sel.snapshot, snapshot);

    // back again: re-bound to the new record
    let third = vec![ aircraft( "test123", 37.5, -122.5, 1100.0, 100.0) ];
    assert!( reconciler.rebind( &third));
    let sel = reconciler.current().unwrap();
    assert!( !sel.stale);
    assert_eq!( sel.snapshot.as_ref().unwrap().position, Position::new( 37.5, -122.5));

    // tracks only apply to the generation they were requested for
    assert!( reconciler.set_track( "test123", generation, vec![ Position::new( 37.0, -122.0) ]));
    assert_eq!( reconciler.current().unwrap().track.len(), 1);
    let (_, generation) = reconciler.reset_track().unwrap();
    assert!( reconciler.current().unwrap().track.is_empty());
    assert!( !reconciler.set_track( "test123", generation - 1, vec![ Position::new( 37.0, -122.0) ]));

    assert!( reconciler.clear());
    assert!( reconciler.current().is_none());
    assert!( !reconciler.set_track( "test123", generation, Vec::new()));
}

#[test]
fn test_load_config () {
    let config: FlightFeedConfig = load_config( "configs/flight_feed.ron").unwrap();
    assert_eq!( config.provider, ProviderId::AdsbLol);
    assert_eq!( config.max_display, 100);
    assert_eq!( config.fetch_timeout, Duration::from_secs(30));
    assert_eq!( config.debounce, DebounceConfig::default());
    assert!( config.credentials.is_empty());

    let config: FlightFeedConfig = ron::from_str( "(max_display: 20)").unwrap();
    assert_eq!( config.max_display, 20);
    assert_eq!( config.provider, ProviderId::OpenSky);

    assert!( matches!( load_config::<FlightFeedConfig>( "configs/no_such_file.ron"), Err(OdinFlightError::ConfigError(_))));
}

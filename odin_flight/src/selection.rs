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
use serde::Serialize;
use tracing::debug;

use crate::{Aircraft, Position, normalize_icao24};

/// the aircraft the user is looking at.
/// If it is missing from a fetch result we keep the last snapshot and set `stale` until it shows up again.
/// A selection is never cleared automatically
#[derive(Debug,Clone,PartialEq,Serialize)]
pub struct Selection {
    pub icao24: Arc<String>,
    pub snapshot: Option<Aircraft>,
    pub track: Arc<Vec<Position>>,
    pub stale: bool,
}

#[derive(Debug,Default)]
pub struct SelectionReconciler {
    current: Option<Selection>,
    generation: u64, // bumped on every select/clear so that late track results can be identified
}

impl SelectionReconciler {
    pub fn new ()->Self { SelectionReconciler::default() }

    pub fn current (&self)->Option<&Selection> { self.current.as_ref() }

    pub fn generation (&self)->u64 { self.generation }

    /// select `icao24`, binding it to the matching record in `aircraft` if there is one.
    /// Returns that snapshot together with the generation to use for the track request
    pub fn select (&mut self, icao24: &str, aircraft: &[Aircraft])->(Option<Aircraft>,u64) {
        let id = normalize_icao24( icao24);
        let snapshot = aircraft.iter().find( |ac| ac.id() == id).cloned();

        self.generation += 1;
        self.current = Some( Selection {
            icao24: Arc::new( id),
            stale: snapshot.is_none(),
            snapshot: snapshot.clone(),
            track: Arc::new( Vec::new())
        });
        (snapshot, self.generation)
    }

    /// re-bind to a new aircraft set. Returns true if the selection changed
    pub fn rebind (&mut self, aircraft: &[Aircraft])->bool {
        let Some(sel) = self.current.as_mut() else { return false };

        match aircraft.iter().find( |ac| ac.icao24 == sel.icao24) {
            Some(ac) => {
                let changed = sel.stale || sel.snapshot.as_ref() != Some(ac);
                sel.snapshot = Some( ac.clone());
                sel.stale = false;
                changed
            }
            None => {
                if !sel.stale { debug!("selected aircraft {} not in latest update", sel.icao24); }
                let changed = !sel.stale;
                sel.stale = true;
                changed
            }
        }
    }

    /// store a track result if it belongs to the current selection
    pub fn set_track (&mut self, icao24: &str, generation: u64, track: Vec<Position>)->bool {
        match self.current.as_mut() {
            Some(sel) if generation == self.generation && sel.icao24.as_str() == icao24 => {
                sel.track = Arc::new( track);
                true
            }
            _ => {
                debug!("ignoring outdated track for {icao24}");
                false
            }
        }
    }

    /// drop the cached track but keep the selection. Returns the id and generation for a new track request
    pub fn reset_track (&mut self)->Option<(Arc<String>,u64)> {
        let sel = self.current.as_mut()?;
        self.generation += 1;
        sel.track = Arc::new( Vec::new());
        Some((sel.icao24.clone(), self.generation))
    }

    pub fn clear (&mut self)->bool {
        self.generation += 1;
        self.current.take().is_some()
    }
}

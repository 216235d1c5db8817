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
use serde::{Serialize,Deserialize};
use tokio::{sync::mpsc, task::AbortHandle, time};
use tracing::trace;

use crate::{ViewRegion, normalize_longitude};

#[derive(Deserialize,Serialize,Debug,Clone,PartialEq)]
#[serde(default)]
pub struct DebounceConfig {
    pub quiet_period: Duration,
    pub center_threshold: f64, // degrees, lat or lon
    pub span_threshold: f64, // relative to the previous span
}

impl Default for DebounceConfig {
    fn default()->Self {
        DebounceConfig {
            quiet_period: Duration::from_millis(500),
            center_threshold: 0.1,
            span_threshold: 0.1
        }
    }
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum RegionChange {
    /// nothing to compare against yet
    First,
    Significant,
    Insignificant
}

/// filters viewport updates and owns the trailing-edge debounce timer.
///
/// Each armed timer gets a new generation. A timer message is only honored if its generation is still
/// the pending one, which covers timers that fired after they were superseded but before their abort
/// took effect
#[derive(Debug)]
pub struct ViewportDebouncer {
    config: DebounceConfig,
    reference: Option<ViewRegion>,
    generation: u64,
    pending: Option<(u64,AbortHandle)>,
}

impl ViewportDebouncer {
    pub fn new (config: DebounceConfig)->Self {
        ViewportDebouncer { config, reference: None, generation: 0, pending: None }
    }

    pub fn config (&self)->&DebounceConfig { &self.config }

    pub fn reference (&self)->Option<&ViewRegion> { self.reference.as_ref() }

    /// classify `region` against the previous one. The region always becomes the new reference
    pub fn observe (&mut self, region: ViewRegion)->RegionChange {
        let change = match &self.reference {
            None => RegionChange::First,
            Some(prev) => {
                if self.is_significant( prev, &region) { RegionChange::Significant } else { RegionChange::Insignificant }
            }
        };
        self.reference = Some(region);
        change
    }

    /// either the center moved more than `center_threshold` on one axis or a span changed by more
    /// than `span_threshold` of its previous value
    pub fn is_significant (&self, prev: &ViewRegion, next: &ViewRegion)->bool {
        let (pc, nc) = (prev.center(), next.center());
        let dlat = (nc.latitude - pc.latitude).abs();
        let dlon = normalize_longitude( nc.longitude - pc.longitude).abs();

        let rel_lat = (next.lat_span() - prev.lat_span()).abs() / prev.lat_span();
        let rel_lon = (next.lon_span() - prev.lon_span()).abs() / prev.lon_span();

        dlat > self.config.center_threshold || dlon > self.config.center_threshold
            || rel_lat > self.config.span_threshold || rel_lon > self.config.span_threshold
    }

    /// cancel any pending timer and start a new one that sends `create_msg(generation)` after the quiet period
    pub fn arm<M,F> (&mut self, tx: &mpsc::Sender<M>, create_msg: F)->u64
        where M: Send + 'static, F: FnOnce(u64)->M + Send + 'static
    {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        let quiet_period = self.config.quiet_period;
        let tx = tx.clone();

        let handle = tokio::spawn( async move {
            time::sleep( quiet_period).await;
            let _ = tx.send( create_msg( generation)).await;
        }).abort_handle();

        self.pending = Some((generation,handle));
        generation
    }

    pub fn cancel (&mut self) {
        if let Some((generation,handle)) = self.pending.take() {
            trace!("cancel debounce timer {generation}");
            handle.abort();
        }
    }

    pub fn is_pending (&self)->bool { self.pending.is_some() }

    /// the timer for `generation` went off. Returns true if that is still the one we wait for
    pub fn fire (&mut self, generation: u64)->bool {
        match self.pending {
            Some((g,_)) if g == generation => {
                self.pending = None;
                true
            }
            _ => false
        }
    }

    /// forget the reference region so that the next viewport counts as the first one
    pub fn reset (&mut self) {
        self.cancel();
        self.reference = None;
    }
}

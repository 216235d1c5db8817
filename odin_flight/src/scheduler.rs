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

use std::{sync::Arc, time::Duration};
use chrono::{DateTime,Utc};
use tokio::{sync::mpsc, task::AbortHandle, time::{self,Instant,MissedTickBehavior}};
use tracing::debug;

use crate::{Aircraft, FetchResult, ViewRegion, errors::OdinFlightError};

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum FetchState {
    Idle,
    Fetching { seq: u64 }
}

/// what applying a [`FetchResult`] did
#[derive(Debug)]
pub enum FetchOutcome {
    /// superseded by a newer request, state untouched
    Stale { seq: u64, latest: u64 },
    /// the published aircraft set was replaced
    Updated (Arc<Vec<Aircraft>>),
    /// the last good aircraft set stays published
    Failed (OdinFlightError),
}

/// owns the current aircraft set and the request sequence numbers that decide which fetch results
/// are still allowed to replace it. Only the latest issued request can apply
#[derive(Debug)]
pub struct RefreshScheduler {
    state: FetchState,
    last_issued: u64,
    max_display: usize,
    aircraft: Arc<Vec<Aircraft>>,
    last_update: Option<DateTime<Utc>>,
}

impl RefreshScheduler {
    pub fn new (max_display: usize)->Self {
        RefreshScheduler {
            state: FetchState::Idle,
            last_issued: 0,
            max_display,
            aircraft: Arc::new( Vec::new()),
            last_update: None
        }
    }

    pub fn state (&self)->FetchState { self.state }

    pub fn is_fetching (&self)->bool { matches!( self.state, FetchState::Fetching{..}) }

    pub fn last_issued (&self)->u64 { self.last_issued }

    pub fn is_latest (&self, seq: u64)->bool { seq == self.last_issued }

    pub fn aircraft (&self)->Arc<Vec<Aircraft>> { self.aircraft.clone() }

    pub fn last_update (&self)->Option<DateTime<Utc>> { self.last_update }

    /// Idle|Fetching -> Fetching with a new sequence number. Any request still in flight is superseded
    pub fn begin_fetch (&mut self)->u64 {
        self.last_issued += 1;
        self.state = FetchState::Fetching { seq: self.last_issued };
        self.last_issued
    }

    /// supersede everything in flight and drop the current set (e.g. when switching providers)
    pub fn reset (&mut self) {
        self.last_issued += 1;
        self.state = FetchState::Idle;
        self.aircraft = Arc::new( Vec::new());
        self.last_update = None;
    }

    /// apply a completed fetch. `clip` restricts global snapshots to the visible region
    pub fn apply (&mut self, result: FetchResult, clip: Option<&ViewRegion>)->FetchOutcome {
        if !self.is_latest( result.seq) {
            return FetchOutcome::Stale { seq: result.seq, latest: self.last_issued }
        }
        self.state = FetchState::Idle;

        if let Some(err) = result.error {
            return FetchOutcome::Failed( err)
        }

        let n_received = result.aircraft.len();
        let list = select_display( result.aircraft, clip, self.max_display);
        debug!("fetch {} applied: {} of {} aircraft published", result.seq, list.len(), n_received);

        self.aircraft = Arc::new( list);
        self.last_update = Some( result.timestamp);
        FetchOutcome::Updated( self.aircraft.clone())
    }
}

/// the published subset of a fetch result: optionally clipped to a region, active aircraft only, and
/// capped at `max_display` in delivery order
pub fn select_display (aircraft: Vec<Aircraft>, clip: Option<&ViewRegion>, max_display: usize)->Vec<Aircraft> {
    aircraft.into_iter()
        .filter( |ac| clip.is_none_or( |r| r.contains( &ac.position)))
        .filter( Aircraft::is_active)
        .take( max_display)
        .collect()
}

/// spawn a task that sends `create_msg()` every `period`, starting one period from now. The task holds only a
/// weak sender so that it does not keep the receiver alive, and it stops once the receiver is gone
pub fn repeat_timer<M,F> (tx: mpsc::WeakSender<M>, period: Duration, create_msg: F)->AbortHandle
    where M: Send + 'static, F: Fn()->M + Send + 'static
{
    tokio::spawn( async move {
        let mut interval = time::interval_at( Instant::now() + period, period);
        interval.set_missed_tick_behavior( MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let Some(tx) = tx.upgrade() else { break };
            if tx.send( create_msg()).await.is_err() { break }
        }
    }).abort_handle()
}

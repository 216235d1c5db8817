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

use std::{collections::HashMap, sync::Arc};
use chrono::{DateTime,Utc};
use tokio::{sync::{mpsc,oneshot,watch}, task::{AbortHandle,JoinHandle}, time};
use tracing::{debug,info,trace,warn};

use crate::{
    Aircraft, FeedStatus, FetchResult, FlightFeedConfig, Position, ViewRegion,
    connector::{FeedQuery,FlightConnector},
    debouncer::{RegionChange,ViewportDebouncer},
    errors::{OdinFlightError,Result,op_failed},
    provider::{ProviderConfig,ProviderId,ProviderRegistry},
    scheduler::{FetchOutcome,RefreshScheduler,repeat_timer},
    selection::{Selection,SelectionReconciler},
};

const MSG_QUEUE_LEN: usize = 64;

/// what the presentation layer gets to see. Published as a whole whenever something changes
#[derive(Debug,Clone,Default)]
pub struct FeedView {
    pub provider: ProviderId,
    pub aircraft: Arc<Vec<Aircraft>>,
    pub status: FeedStatus,
    pub selection: Option<Selection>,
    pub region: Option<ViewRegion>,
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub enum FlightFeedMsg {
    //--- from the presentation layer
    SetProvider { id: ProviderId, reply: oneshot::Sender<Result<()>> },
    SetViewport (ViewRegion),
    AdjustZoom (f64),
    Select { icao24: String, reply: oneshot::Sender<Option<Aircraft>> },
    ClearSelection,
    Terminate,

    //--- from our own timers and fetch tasks
    RefreshTick,
    DebounceElapsed { generation: u64 },
    FetchCompleted (FetchResult),
    TrackCompleted { icao24: String, generation: u64, track: Vec<Position> },
}

/// the single owner of all mutable feed state. Network I/O and timers run in their own tasks and
/// report back through our message queue, i.e. results are always applied one at a time
pub struct FlightFeedActor {
    config: FlightFeedConfig,
    registry: ProviderRegistry,
    connectors: HashMap<ProviderId,Arc<dyn FlightConnector>>,

    provider: Arc<ProviderConfig>,
    connector: Arc<dyn FlightConnector>,
    region: Option<ViewRegion>,
    status: FeedStatus,

    scheduler: RefreshScheduler,
    debouncer: ViewportDebouncer,
    selection: SelectionReconciler,
    refresh_timer: Option<AbortHandle>,
    tasks: Vec<AbortHandle>, // in-flight fetches

    hself: mpsc::WeakSender<FlightFeedMsg>, // weak so that dropping all handles ends the actor
    view_tx: watch::Sender<FeedView>,
}

impl FlightFeedActor {
    /// start the actor task for `config.provider`. Fails if that provider has no registry entry or connector
    pub fn spawn (config: FlightFeedConfig, registry: ProviderRegistry, connectors: Vec<Arc<dyn FlightConnector>>)
        ->Result<(FlightFeedHandle,JoinHandle<()>)>
    {
        let connectors: HashMap<ProviderId,Arc<dyn FlightConnector>> = connectors.into_iter().map( |c| (c.provider().id, c)).collect();
        let provider = registry.get( config.provider)?;
        let connector = connectors.get( &provider.id).cloned().ok_or_else( || OdinFlightError::UnknownProvider( provider.id.to_string()))?;

        let (tx, rx) = mpsc::channel( MSG_QUEUE_LEN);
        let (view_tx, view_rx) = watch::channel( FeedView { provider: provider.id, ..FeedView::default() });

        let actor = FlightFeedActor {
            scheduler: RefreshScheduler::new( config.max_display),
            debouncer: ViewportDebouncer::new( config.debounce.clone()),
            selection: SelectionReconciler::new(),
            config,
            registry,
            connectors,
            provider,
            connector,
            region: None,
            status: FeedStatus::Idle,
            refresh_timer: None,
            tasks: Vec::new(),
            hself: tx.downgrade(),
            view_tx,
        };

        let join_handle = tokio::spawn( actor.run( rx));
        Ok(( FlightFeedHandle { tx, view_rx }, join_handle ))
    }

    async fn run (mut self, mut rx: mpsc::Receiver<FlightFeedMsg>) {
        info!("flight feed started with provider {}", self.provider.id);
        self.start_refresh_timer();
        if self.provider.supports_global_query {
            self.start_fetch();
        }

        while let Some(msg) = rx.recv().await {
            match msg {
                FlightFeedMsg::SetProvider { id, reply } => { let _ = reply.send( self.set_provider( id)); }
                FlightFeedMsg::SetViewport( region) => self.set_viewport( region),
                FlightFeedMsg::AdjustZoom( multiplier) => self.adjust_zoom( multiplier),
                FlightFeedMsg::Select { icao24, reply } => { let _ = reply.send( self.select( &icao24)); }
                FlightFeedMsg::ClearSelection => self.clear_selection(),
                FlightFeedMsg::Terminate => break,

                FlightFeedMsg::RefreshTick => self.refresh_tick(),
                FlightFeedMsg::DebounceElapsed { generation } => self.debounce_elapsed( generation),
                FlightFeedMsg::FetchCompleted( result) => self.fetch_completed( result),
                FlightFeedMsg::TrackCompleted { icao24, generation, track } => self.track_completed( &icao24, generation, track),
            }
        }

        self.shutdown();
        info!("flight feed terminated");
    }

    fn shutdown (&mut self) {
        if let Some(timer) = self.refresh_timer.take() { timer.abort() }
        self.debouncer.cancel();
        for task in self.tasks.drain(..) { task.abort() }
    }

    fn publish (&self) {
        self.view_tx.send_replace( FeedView {
            provider: self.provider.id,
            aircraft: self.scheduler.aircraft(),
            status: self.status.clone(),
            selection: self.selection.current().cloned(),
            region: self.region,
            last_update: self.scheduler.last_update(),
        });
    }

    fn start_refresh_timer (&mut self) {
        if let Some(timer) = self.refresh_timer.take() { timer.abort() }
        let period = self.provider.min_refresh_interval;
        debug!("refresh interval for {} is {:?}", self.provider.id, period);
        self.refresh_timer = Some( repeat_timer( self.hself.clone(), period, || FlightFeedMsg::RefreshTick));
    }

    fn query (&self)->Option<FeedQuery> {
        if self.provider.supports_global_query {
            Some( FeedQuery::world())
        } else {
            self.region.as_ref().map( FeedQuery::for_region)
        }
    }

    /// issue a new fetch, superseding whatever is still in flight
    fn start_fetch (&mut self) {
        let Some(query) = self.query() else {
            trace!("no region yet, nothing to fetch from {}", self.provider.id);
            return
        };
        let Some(tx) = self.hself.upgrade() else { return };

        let seq = self.scheduler.begin_fetch();
        let connector = self.connector.clone();
        let timeout = self.config.fetch_timeout;
        debug!("fetch {} from {}", seq, self.provider.id);

        self.tasks.retain( |t| !t.is_finished());

        // the connector runs in its own task so that we always report back, even if it panics
        let fetch = tokio::spawn( async move { time::timeout( timeout, connector.fetch_aircraft( &query)).await });
        self.tasks.push( fetch.abort_handle());

        let task = tokio::spawn( async move {
            let res = match fetch.await {
                Ok(Ok(res)) => res,
                Ok(Err(_)) => Err( OdinFlightError::NetworkError( format!("timeout after {timeout:?}"))),
                Err(e) => Err( op_failed!("fetch task failed: {}", e))
            };
            let _ = tx.send( FlightFeedMsg::FetchCompleted( FetchResult::from_result( seq, res))).await;
        });
        self.tasks.push( task.abort_handle());

        self.status = FeedStatus::Loading;
        self.publish();
    }

    fn request_track (&mut self, icao24: Arc<String>, generation: u64) {
        if !self.provider.supports_historical_track { return }
        let Some(tx) = self.hself.upgrade() else { return };

        let connector = self.connector.clone();
        let timeout = self.config.fetch_timeout;

        tokio::spawn( async move {
            // fetch_track never fails, a timeout just means no track
            let track = time::timeout( timeout, connector.fetch_track( icao24.as_str())).await.unwrap_or_default();
            let _ = tx.send( FlightFeedMsg::TrackCompleted { icao24: icao24.to_string(), generation, track }).await;
        });
    }

    //--- presentation commands

    fn set_provider (&mut self, id: ProviderId)->Result<()> {
        let provider = self.registry.get( id)?;
        let connector = self.connectors.get( &id).cloned().ok_or_else( || OdinFlightError::UnknownProvider( id.to_string()))?;
        info!("switching provider from {} to {}", self.provider.id, id);

        self.debouncer.cancel();
        self.scheduler.reset(); // late results of the old provider are now stale
        self.selection.rebind( &[]);
        self.provider = provider;
        self.connector = connector;
        self.status = FeedStatus::Idle;

        if let Some((icao24,generation)) = self.selection.reset_track() {
            self.request_track( icao24, generation);
        }
        self.start_refresh_timer();
        self.publish();
        self.start_fetch();
        Ok(())
    }

    fn set_viewport (&mut self, region: ViewRegion) {
        self.region = Some(region);

        match self.debouncer.observe( region) {
            RegionChange::First => {
                debug!("first view region {region}");
                self.publish();
                self.start_fetch();
            }
            RegionChange::Significant => {
                trace!("significant region change {region}");
                if let Some(tx) = self.hself.upgrade() {
                    self.debouncer.arm( &tx, |generation| FlightFeedMsg::DebounceElapsed { generation });
                }
                self.publish();
            }
            RegionChange::Insignificant => self.publish()
        }
    }

    fn adjust_zoom (&mut self, multiplier: f64) {
        match self.region {
            Some(region) => self.set_viewport( region.zoomed( multiplier)),
            None => debug!("ignoring zoom without view region")
        }
    }

    fn select (&mut self, icao24: &str)->Option<Aircraft> {
        let aircraft = self.scheduler.aircraft();
        let (snapshot, generation) = self.selection.select( icao24, &aircraft);
        if let Some(sel) = self.selection.current() {
            let id = sel.icao24.clone();
            self.request_track( id, generation);
        }
        self.publish();
        snapshot
    }

    fn clear_selection (&mut self) {
        if self.selection.clear() {
            self.publish();
        }
    }

    //--- timer and task results

    fn refresh_tick (&mut self) {
        if self.scheduler.is_fetching() {
            debug!("skipping refresh of {}, fetch {} still in flight", self.provider.id, self.scheduler.last_issued());
        } else {
            self.start_fetch();
        }
    }

    fn debounce_elapsed (&mut self, generation: u64) {
        if self.debouncer.fire( generation) {
            if let Some(region) = &self.region { debug!("view region settled at {region}"); }
            self.start_fetch();
        }
    }

    fn fetch_completed (&mut self, result: FetchResult) {
        let clip = if self.provider.supports_global_query && self.config.clip_global_to_region { self.region } else { None };

        match self.scheduler.apply( result, clip.as_ref()) {
            FetchOutcome::Stale { seq, latest } => {
                debug!("dropping stale fetch result {seq} (latest is {latest})");
            }
            FetchOutcome::Updated( aircraft) => {
                self.status = FeedStatus::Idle;
                self.selection.rebind( &aircraft);
                self.publish();
            }
            FetchOutcome::Failed( err) => {
                warn!("fetch from {} failed: {}", self.provider.id, err);
                self.status = FeedStatus::Error( err.status_message());
                self.publish();
            }
        }
    }

    fn track_completed (&mut self, icao24: &str, generation: u64, track: Vec<Position>) {
        let n = track.len();
        if self.selection.set_track( icao24, generation, track) {
            debug!("got track of {n} positions for {icao24}");
            self.publish();
        }
    }
}

/// the presentation side of a [`FlightFeedActor`]. Cheap to clone
#[derive(Clone)]
pub struct FlightFeedHandle {
    tx: mpsc::Sender<FlightFeedMsg>,
    view_rx: watch::Receiver<FeedView>,
}

impl FlightFeedHandle {
    async fn send (&self, msg: FlightFeedMsg)->Result<()> {
        self.tx.send( msg).await.map_err( |_| op_failed!("flight feed is terminated"))
    }

    pub async fn set_provider (&self, id: ProviderId)->Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send( FlightFeedMsg::SetProvider { id, reply }).await?;
        rx.await.map_err( |_| op_failed!("no response to provider change"))?
    }

    pub async fn set_viewport (&self, region: ViewRegion)->Result<()> {
        self.send( FlightFeedMsg::SetViewport( region)).await
    }

    pub async fn adjust_zoom (&self, multiplier: f64)->Result<()> {
        self.send( FlightFeedMsg::AdjustZoom( multiplier)).await
    }

    /// select an aircraft. Returns its current record if it is in the published set
    pub async fn select (&self, icao24: &str)->Result<Option<Aircraft>> {
        let (reply, rx) = oneshot::channel();
        self.send( FlightFeedMsg::Select { icao24: icao24.to_string(), reply }).await?;
        rx.await.map_err( |_| op_failed!("no response to selection"))
    }

    pub async fn clear_selection (&self)->Result<()> {
        self.send( FlightFeedMsg::ClearSelection).await
    }

    pub async fn terminate (&self)->Result<()> {
        self.send( FlightFeedMsg::Terminate).await
    }

    /// the latest published view
    pub fn view (&self)->FeedView { self.view_rx.borrow().clone() }

    /// a receiver that gets notified whenever a new view is published
    pub fn subscribe (&self)->watch::Receiver<FeedView> { self.view_rx.clone() }
}

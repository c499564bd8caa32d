use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ErrorKind, FetchError};
use crate::intake::{CaptureSessionManager, PermissionOutcome};
use crate::pipeline::events::{Command, Generation, PipelineEvent};
use crate::pipeline::services::{
    DeduplicationStore, EnrichmentFetcher, RecognitionPass, RecoveryDecision, RecoveryMonitor,
};
use crate::pipeline::types::{EnrichmentRecord, PipelineState};

/// The single owner of `PipelineState`. Commands and completion events are
/// applied one at a time, and every change is published as a whole snapshot.
pub(crate) struct PipelineController {
    session: CaptureSessionManager,
    dedup: DeduplicationStore,
    recovery: RecoveryMonitor,
    fetcher: Arc<dyn EnrichmentFetcher>,
    events_tx: mpsc::Sender<PipelineEvent>,
    state: PipelineState,
    state_tx: watch::Sender<PipelineState>,
}

impl PipelineController {
    pub(crate) fn new(
        session: CaptureSessionManager,
        fetcher: Arc<dyn EnrichmentFetcher>,
        events_tx: mpsc::Sender<PipelineEvent>,
        state_tx: watch::Sender<PipelineState>,
    ) -> Self {
        Self {
            session,
            dedup: DeduplicationStore::new(),
            recovery: RecoveryMonitor::new(),
            fetcher,
            events_tx,
            state: PipelineState::default(),
            state_tx,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::Receiver<PipelineEvent>,
        cancel_token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(event) = events.recv() => self.handle_event(event),
            }
        }
        self.shutdown();
    }

    fn handle_command(&mut self, command: Command) {
        debug!(?command, "Handling command");
        match command {
            Command::Start => {
                self.session.request_start();
            }
            Command::Stop => self.stop_session(),
        }
    }

    fn handle_event(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::PermissionResolved {
                generation,
                granted,
            } => self.on_permission(generation, granted),
            PipelineEvent::Recognized { generation, pass } => self.on_recognized(generation, pass),
            PipelineEvent::Enriched {
                generation,
                code,
                result,
            } => self.on_enriched(generation, code, result),
            PipelineEvent::RuntimeError { generation, event } => {
                if !self.session.on_runtime_error(generation, &event) {
                    self.drop_stale("runtime error", generation);
                    return;
                }
                self.state.last_error = Some(ErrorKind::RuntimeInterruption(event.kind.clone()));
                if self.recovery.on_runtime_error(&event, self.session.state())
                    == RecoveryDecision::Restart
                {
                    self.session.request_start();
                }
                self.publish();
            }
        }
    }

    fn on_permission(&mut self, generation: Generation, granted: bool) {
        match self.session.on_permission(generation, granted) {
            PermissionOutcome::Stale => self.drop_stale("permission answer", generation),
            PermissionOutcome::Denied => {
                self.state.last_error = Some(ErrorKind::PermissionDenied);
                self.publish();
            }
            PermissionOutcome::Granted => {
                // A fresh session starts from an empty history.
                self.dedup.reset();
                self.state.ordered_codes.clear();
                self.publish();

                if let Err(e) = self.session.complete_start() {
                    self.state.last_error = Some(ErrorKind::from(e));
                }
                self.publish();
            }
        }
    }

    fn on_recognized(&mut self, generation: Generation, pass: RecognitionPass) {
        if !self.session.is_current(generation) {
            self.drop_stale("recognition pass", generation);
            return;
        }

        self.state.stats.recognition_passes += 1;
        if let Err(e) = &pass.result {
            warn!(frame_id = %pass.frame_id, error = %e, "Recognition pass failed");
            self.state.stats.recognition_failures += 1;
        }

        let now = Utc::now();
        for code in pass.codes() {
            if !self.dedup.observe_at(code, now) {
                self.state.stats.duplicate_detections += 1;
                continue;
            }
            if let Some(detected) = self.dedup.get(code) {
                info!(%code, "New code detected");
                self.state.ordered_codes.push(detected.clone());
            }
            self.spawn_lookup(generation, code.clone());
        }
        self.publish();
    }

    fn spawn_lookup(&mut self, generation: Generation, code: String) {
        self.state.stats.lookups_started += 1;
        let fetcher = Arc::clone(&self.fetcher);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch(&code).await;
            let _ = events
                .send(PipelineEvent::Enriched {
                    generation,
                    code,
                    result,
                })
                .await;
        });
    }

    fn on_enriched(
        &mut self,
        generation: Generation,
        code: String,
        result: Result<EnrichmentRecord, FetchError>,
    ) {
        if !self.session.is_current(generation) {
            self.drop_stale("lookup result", generation);
            return;
        }
        match result {
            Ok(record) => {
                info!(%code, name = %record.name, brand = %record.brand, "Lookup resolved");
                self.state.latest_record = Some(record);
            }
            Err(e) => {
                warn!(%code, error = %e, "Lookup failed");
                self.state.last_error = Some(ErrorKind::from(e));
            }
        }
        self.publish();
    }

    fn stop_session(&mut self) {
        if self.session.begin_stop() {
            self.publish();
            self.session.finish_stop();
        }
        self.publish();
    }

    fn drop_stale(&mut self, what: &str, generation: Generation) {
        debug!(
            %generation,
            current = %self.session.generation(),
            "Dropping stale {}",
            what
        );
        self.state.stats.stale_results_dropped += 1;
        self.publish();
    }

    fn publish(&mut self) {
        self.state.session_state = self.session.state();
        self.state_tx.send_replace(self.state.clone());
    }

    fn shutdown(&mut self) {
        self.stop_session();
        debug!("Pipeline controller stopped");
    }
}

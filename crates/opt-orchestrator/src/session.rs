use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use opt_core::{EngineConfig, ObjectiveBuilder, SamplerChoice, Space};
use opt_sampler::{AcquisitionKind, BayesSampler, InitialDesignKind, Proposal, Sampler};
use opt_types::{BestSnapshot, ParetoFront, ParetoSolution, Settings, Trial, PENALTY_SCORE};
use opt_wire::{ClientMessage, OptimisationConfig, Progress, ServerMessage, TerminationReason, TrialResultPayload};

use crate::channel::{ChannelEvent, SessionChannel};
use crate::error::SessionError;
use crate::registry::SessionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingConfig,
    Running,
    Terminating,
    Closed,
}

/// Owns the state machine tying the parameter space, sampler, and
/// objective builder to a client channel; enforces ask/tell ordering and
/// cancellation (spec.md §4.4).
pub struct Session {
    pub id: String,
    state: SessionState,
    cancellation: CancellationToken,
    engine_config: EngineConfig,
    space: Option<Space>,
    sampler: Option<Box<dyn Sampler>>,
    objective_builder: Option<ObjectiveBuilder>,
    settings: Option<Settings>,
    completed: u32,
    best: Option<BestSnapshot>,
    pareto: ParetoFront,
    stop_requested: bool,
    history: Vec<Trial>,
}

enum WaitOutcome {
    Result(TrialResultPayload),
    Stop,
    Disconnect,
    ProtocolError(String),
    DuplicateStart,
}

struct TrialOutcome {
    params: opt_types::ParameterVector,
    metrics: opt_types::MetricBag,
    filters_passed: bool,
    filter_reasons: Vec<String>,
    objective: f64,
}

impl Session {
    pub fn new(id: String, cancellation: CancellationToken, engine_config: EngineConfig) -> Self {
        Session {
            id,
            state: SessionState::AwaitingConfig,
            cancellation,
            engine_config,
            space: None,
            sampler: None,
            objective_builder: None,
            settings: None,
            completed: 0,
            best: None,
            pareto: ParetoFront::new(),
            stop_requested: false,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn history(&self) -> &[Trial] {
        &self.history
    }

    pub fn best(&self) -> Option<&BestSnapshot> {
        self.best.as_ref()
    }

    /// Snapshots this session's space, working bounds, settings, and trial
    /// history into a persistable [`SessionRecord`] (spec.md §4.6).
    pub fn to_record(&self, config_fingerprint: &str, created_at: DateTime<Utc>) -> SessionRecord {
        let dimensions = self
            .space
            .as_ref()
            .map(|space| space.dimensions().to_vec())
            .unwrap_or_default();
        let working_ranges = self
            .sampler
            .as_ref()
            .map(|sampler| sampler.working_ranges())
            .unwrap_or_default();

        SessionRecord {
            id: self.id.clone(),
            config_fingerprint: config_fingerprint.to_string(),
            dimensions,
            working_ranges,
            settings: self.settings.clone(),
            history: self.history.clone(),
            created_at,
            last_updated: Utc::now(),
        }
    }

    /// Rebuilds a `Session` from a persisted [`SessionRecord`]: reconstructs
    /// the space and sampler from the saved dimensions and working bounds,
    /// then replays the saved history through the sampler, the best
    /// snapshot, and the Pareto front exactly as `record_result` would have
    /// as each trial first completed.
    pub fn warm_start(
        record: &SessionRecord,
        cancellation: CancellationToken,
        engine_config: EngineConfig,
    ) -> Result<Session, SessionError> {
        let settings = record
            .settings
            .clone()
            .ok_or_else(|| SessionError::Internal("warm-start record is missing settings".into()))?;
        settings.validate().map_err(SessionError::InvalidSettings)?;

        let space = Space::build(record.dimensions.clone()).map_err(SessionError::InvalidSpace)?;
        let dim_ids: Vec<String> = space.dimensions().iter().map(|d| d.id.clone()).collect();
        let ranges: HashMap<String, (f64, f64)> = space
            .dimensions()
            .iter()
            .map(|dim| {
                let range = record
                    .working_ranges
                    .get(&dim.id)
                    .copied()
                    .unwrap_or_else(|| dim.encoded_range());
                (dim.id.clone(), range)
            })
            .collect();

        let (acquisition_kind, design_kind) = match engine_config.optuna_sampler {
            SamplerChoice::Auto => (AcquisitionKind::Mixed, InitialDesignKind::Sobol),
            SamplerChoice::Tpe => (AcquisitionKind::Ucb, InitialDesignKind::LatinHypercube),
        };

        let mut sampler = BayesSampler::new(
            dim_ids,
            ranges,
            settings.trials,
            engine_config.optuna_sampler_seed,
            acquisition_kind,
            design_kind,
            None,
            false,
            false,
            None,
        )
        .map_err(SessionError::Sampler)?;

        let target_metric = settings
            .target_metrics
            .first()
            .cloned()
            .ok_or_else(|| SessionError::Internal("no target metric in warm-start settings".into()))?;
        let objective_builder = ObjectiveBuilder::new(target_metric, settings.filters.clone());

        let mut session = Session {
            id: record.id.clone(),
            state: SessionState::Running,
            cancellation,
            engine_config,
            space: Some(space),
            sampler: None,
            objective_builder: Some(objective_builder),
            settings: Some(settings),
            completed: 0,
            best: None,
            pareto: ParetoFront::new(),
            stop_requested: false,
            history: Vec::new(),
        };

        for trial in &record.history {
            session.replay_trial(trial);
            let encoded = session.space.as_ref().unwrap().encode(&trial.params);
            let objective = trial.objective.unwrap_or(PENALTY_SCORE);
            // Pop the initial-design queue / consume the surrogate-phase RNG
            // exactly as the original ask/tell cycle did, so the sampler's
            // internal state after replay matches an uninterrupted run's —
            // the drawn point itself is discarded since `trial` already
            // records what was actually proposed and observed.
            sampler.next_proposal().map_err(SessionError::Sampler)?;
            sampler.observe(encoded, objective);
        }
        session.sampler = Some(Box::new(sampler));

        Ok(session)
    }

    /// Re-derives best/Pareto state from one already-scored historical
    /// trial, without re-running filters or re-emitting any message.
    fn replay_trial(&mut self, trial: &Trial) {
        if let Some(metrics) = &trial.metrics {
            let settings = self.settings.as_ref().unwrap();
            let builder = self.objective_builder.as_ref().unwrap();
            let evaluation = if settings.is_multi_objective() {
                builder.evaluate_multi(settings, metrics)
            } else {
                builder.evaluate(metrics)
            };

            if evaluation.filters_passed {
                if let Some(raw) = evaluation.metric_value {
                    self.best = BestSnapshot::consider(
                        self.best.take(),
                        raw,
                        trial.number,
                        &trial.params,
                        metrics,
                    );
                }
            }
            if !evaluation.objectives.is_empty() {
                self.pareto.offer(ParetoSolution {
                    params: trial.params.clone(),
                    metrics: metrics.clone(),
                    scalarized: evaluation.objective,
                    objectives: evaluation.objectives.clone(),
                });
            }
        }
        self.history.push(trial.clone());
        self.completed += 1;
    }

    /// Builds the parameter space, sampler, and objective builder from a
    /// validated `start` message. Rejects per spec.md §7 categories 1–2.
    fn configure(&mut self, config: OptimisationConfig) -> Result<(), SessionError> {
        let settings = config.settings();
        settings
            .validate()
            .map_err(SessionError::InvalidSettings)?;

        let dimensions = config.enabled_dimensions();
        let space = Space::build(dimensions).map_err(SessionError::InvalidSpace)?;

        let ranges: HashMap<String, (f64, f64)> = space
            .dimensions()
            .iter()
            .map(|d| (d.id.clone(), d.encoded_range()))
            .collect();
        let dim_ids: Vec<String> = space.dimensions().iter().map(|d| d.id.clone()).collect();

        let (acquisition_kind, design_kind) = match self.engine_config.optuna_sampler {
            SamplerChoice::Auto => (AcquisitionKind::Mixed, InitialDesignKind::Sobol),
            SamplerChoice::Tpe => (AcquisitionKind::Ucb, InitialDesignKind::LatinHypercube),
        };

        let sampler = BayesSampler::new(
            dim_ids,
            ranges,
            settings.trials,
            self.engine_config.optuna_sampler_seed,
            acquisition_kind,
            design_kind,
            None,
            false,
            false,
            None,
        )
        .map_err(SessionError::Sampler)?;

        let target_metric = settings
            .target_metrics
            .first()
            .cloned()
            .ok_or_else(|| SessionError::Internal("no target metric after validation".into()))?;
        let objective_builder = ObjectiveBuilder::new(target_metric, settings.filters.clone());

        self.space = Some(space);
        self.sampler = Some(Box::new(sampler));
        self.objective_builder = Some(objective_builder);
        self.settings = Some(settings);
        Ok(())
    }

    /// Runs the session end to end: awaits `start`, then drives the
    /// ask/tell loop until termination, emitting exactly one `complete`
    /// frame before returning.
    pub async fn run(&mut self, channel: &mut dyn SessionChannel) -> anyhow::Result<()> {
        if !self.await_start(channel).await? {
            return Ok(());
        }

        self.state = SessionState::Running;
        channel
            .send(ServerMessage::status("session configured"))
            .await
            .ok();

        self.run_to_completion(channel).await
    }

    /// Runs a session produced by [`Session::warm_start`] end to end: it is
    /// already `Running` and configured from its saved record, so this skips
    /// `await_start`'s wait for a fresh `start` message and resumes the
    /// ask/tell loop directly at the next proposal (spec.md §4.6, §8
    /// invariant 9, scenario S6).
    pub async fn run_resumed(&mut self, channel: &mut dyn SessionChannel) -> anyhow::Result<()> {
        debug_assert_eq!(self.state, SessionState::Running);
        channel
            .send(ServerMessage::status("session resumed"))
            .await
            .ok();

        self.run_to_completion(channel).await
    }

    async fn run_to_completion(&mut self, channel: &mut dyn SessionChannel) -> anyhow::Result<()> {
        let reason = self.run_loop(channel).await;
        self.state = SessionState::Terminating;

        info!(session_id = %self.id, ?reason, completed = self.completed, "session terminating");
        channel
            .send(ServerMessage::Complete {
                reason,
                best: self.best.clone(),
            })
            .await
            .ok();

        self.state = SessionState::Closed;
        Ok(())
    }

    /// Waits in `AwaitingConfig` for a valid `start` message. Returns
    /// `Ok(true)` once configured and ready to run, `Ok(false)` if the
    /// session closed without ever running (invalid config or disconnect).
    async fn await_start(&mut self, channel: &mut dyn SessionChannel) -> anyhow::Result<bool> {
        loop {
            match channel.recv().await {
                ChannelEvent::Message(ClientMessage::Start { config }) => {
                    return match self.configure(config) {
                        Ok(()) => Ok(true),
                        Err(error) => {
                            warn!(session_id = %self.id, %error, "rejected start message");
                            channel.send(ServerMessage::error(error.to_string())).await.ok();
                            self.state = SessionState::Closed;
                            Ok(false)
                        }
                    };
                }
                ChannelEvent::Message(_) => {
                    channel
                        .send(ServerMessage::error("expected a `start` message first"))
                        .await
                        .ok();
                    self.state = SessionState::Closed;
                    return Ok(false);
                }
                ChannelEvent::Invalid(reason) => {
                    warn!(session_id = %self.id, %reason, "rejected malformed frame before start");
                    channel.send(ServerMessage::error(reason)).await.ok();
                    self.state = SessionState::Closed;
                    return Ok(false);
                }
                ChannelEvent::Disconnected => {
                    self.state = SessionState::Closed;
                    return Ok(false);
                }
            }
        }
    }

    async fn run_loop(&mut self, channel: &mut dyn SessionChannel) -> TerminationReason {
        loop {
            if self.cancellation.is_cancelled() {
                return TerminationReason::Stopped;
            }

            let encoded = match self.sampler.as_mut().unwrap().next_proposal() {
                Ok(Proposal::Done) => return TerminationReason::Finished,
                Ok(Proposal::Point(encoded)) => encoded,
                Err(error) => {
                    warn!(session_id = %self.id, %error, "sampler failed to produce a proposal");
                    channel.send(ServerMessage::error(error.to_string())).await.ok();
                    return TerminationReason::Error;
                }
            };

            let trial_number = self.completed;
            let params = self.space.as_ref().unwrap().decode(&encoded);
            if channel
                .send(ServerMessage::TrialRequest {
                    trial: trial_number,
                    params: params.clone(),
                })
                .await
                .is_err()
            {
                return TerminationReason::Stopped;
            }

            match self.wait_for_trial_result(channel, trial_number).await {
                WaitOutcome::Stop => {
                    self.stop_requested = true;
                    return TerminationReason::Stopped;
                }
                WaitOutcome::Disconnect => return TerminationReason::Stopped,
                WaitOutcome::DuplicateStart => {
                    channel
                        .send(ServerMessage::error("session already started"))
                        .await
                        .ok();
                    return TerminationReason::Error;
                }
                WaitOutcome::ProtocolError(message) => {
                    channel.send(ServerMessage::error(message)).await.ok();
                    return TerminationReason::Error;
                }
                WaitOutcome::Result(payload) => {
                    let outcome = self.record_result(trial_number, &encoded, params, payload);
                    let total = self.settings.as_ref().unwrap().trials;
                    if channel
                        .send(ServerMessage::TrialComplete {
                            trial: trial_number,
                            params: outcome.params,
                            metrics: outcome.metrics,
                            passed_filters: outcome.filters_passed,
                            filter_reasons: outcome.filter_reasons,
                            objective: outcome.objective,
                            progress: progress(self.completed, total),
                            best: self.best.clone(),
                        })
                        .await
                        .is_err()
                    {
                        return TerminationReason::Stopped;
                    }
                }
            }
        }
    }

    fn record_result(
        &mut self,
        trial_number: u32,
        encoded: &opt_types::EncodedVector,
        params: opt_types::ParameterVector,
        payload: TrialResultPayload,
    ) -> TrialOutcome {
        let settings = self.settings.as_ref().unwrap();
        let builder = self.objective_builder.as_ref().unwrap();
        let evaluation = if settings.is_multi_objective() {
            builder.evaluate_multi(settings, &payload.metrics)
        } else {
            builder.evaluate(&payload.metrics)
        };

        let mut is_best = false;
        if evaluation.filters_passed {
            if let Some(raw) = evaluation.metric_value {
                let updated = BestSnapshot::consider(
                    self.best.take(),
                    raw,
                    trial_number,
                    &params,
                    &payload.metrics,
                );
                is_best = updated
                    .as_ref()
                    .map(|b| b.trial_number == trial_number)
                    .unwrap_or(false);
                self.best = updated;
            }
        }

        if !evaluation.objectives.is_empty() {
            self.pareto.offer(ParetoSolution {
                params: params.clone(),
                metrics: payload.metrics.clone(),
                scalarized: evaluation.objective,
                objectives: evaluation.objectives.clone(),
            });
        }

        self.sampler
            .as_mut()
            .unwrap()
            .observe(encoded.clone(), evaluation.objective);

        self.history.push(Trial {
            number: trial_number,
            params: params.clone(),
            metrics: Some(payload.metrics.clone()),
            objective: Some(evaluation.objective),
            filters_passed: evaluation.filters_passed,
            filter_reasons: evaluation.filter_reasons.clone(),
            is_best,
        });

        self.completed += 1;

        TrialOutcome {
            params,
            metrics: payload.metrics,
            filters_passed: evaluation.filters_passed,
            filter_reasons: evaluation.filter_reasons,
            objective: evaluation.objective,
        }
    }

    async fn wait_for_trial_result(
        &mut self,
        channel: &mut dyn SessionChannel,
        expected_trial: u32,
    ) -> WaitOutcome {
        loop {
            tokio::select! {
                _ = self.cancellation.cancelled() => return WaitOutcome::Stop,
                event = channel.recv() => match event {
                    ChannelEvent::Disconnected => return WaitOutcome::Disconnect,
                    ChannelEvent::Invalid(reason) => return WaitOutcome::ProtocolError(reason),
                    ChannelEvent::Message(ClientMessage::Stop) => return WaitOutcome::Stop,
                    ChannelEvent::Message(ClientMessage::Start { .. }) => return WaitOutcome::DuplicateStart,
                    ChannelEvent::Message(ClientMessage::TrialResult { trial, payload }) => {
                        if trial != expected_trial {
                            warn!(session_id = %self.id, expected_trial, got = trial, "ignoring mismatched trial-result");
                            continue;
                        }
                        if let Some(bad_metric) = payload.metrics.iter().find(|(_, v)| !v.is_finite()).map(|(k, _)| k.clone()) {
                            return WaitOutcome::ProtocolError(format!("metric `{bad_metric}` has a non-finite value"));
                        }
                        return WaitOutcome::Result(payload);
                    }
                },
            }
        }
    }
}

pub fn progress(completed: u32, total: u32) -> Progress {
    Progress { completed, total }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opt_wire::{WireOptimisationSettings, WireParameterConfig, WireParameterKind, WireParameterRange};
    use opt_types::MetricBag;

    fn test_config() -> OptimisationConfig {
        OptimisationConfig {
            strategy_id: "test-strategy".to_string(),
            params: vec![WireParameterConfig {
                param_id: "x".to_string(),
                label: None,
                kind: WireParameterKind::Float,
                enabled: true,
                range: WireParameterRange {
                    min: Some(0.0),
                    max: Some(1.0),
                    step: None,
                    labels: Vec::new(),
                },
            }],
            settings: WireOptimisationSettings {
                metric: Some("score".to_string()),
                metrics: Vec::new(),
                weights: None,
                trials: 3,
                use_custom_range: false,
                start_date: None,
                end_date: None,
                filters: Vec::new(),
            },
        }
    }

    fn test_engine_config() -> EngineConfig {
        EngineConfig {
            cors_allow_origins: vec!["http://localhost:8000".to_string()],
            optuna_storage: None,
            optuna_sampler: SamplerChoice::Auto,
            optuna_sampler_seed: Some(11),
        }
    }

    #[test]
    fn warm_start_replays_history_into_best_and_completed() {
        let mut session = Session::new(
            "sess-1".to_string(),
            CancellationToken::new(),
            test_engine_config(),
        );
        session.configure(test_config()).expect("configure");

        for i in 0..2u32 {
            let encoded = session.sampler.as_mut().unwrap().next_proposal().unwrap();
            let opt_sampler::Proposal::Point(encoded) = encoded else {
                panic!("expected a point proposal");
            };
            let params = session.space.as_ref().unwrap().decode(&encoded);
            let mut metrics = MetricBag::new();
            metrics.insert("score".to_string(), 1.0 + i as f64);
            session.record_result(
                i,
                &encoded,
                params,
                TrialResultPayload {
                    metrics,
                    passed_filters: None,
                },
            );
        }

        assert_eq!(session.history().len(), 2);
        assert!(session.best().is_some());

        let record = session.to_record("fingerprint", Utc::now());
        assert_eq!(record.history.len(), 2);

        let mut restored = Session::warm_start(&record, CancellationToken::new(), test_engine_config())
            .expect("warm start");
        assert_eq!(restored.history().len(), 2);
        assert_eq!(
            restored.best().map(|b| b.metric),
            session.best().map(|b| b.metric)
        );

        // spec.md §8 invariant 9 / scenario S6: the next proposal after a
        // save/load must match the proposal an uninterrupted run would have
        // produced at the same step, not an already-tried point.
        let expected = session.sampler.as_mut().unwrap().next_proposal().unwrap();
        let resumed = restored.sampler.as_mut().unwrap().next_proposal().unwrap();
        assert_eq!(
            expected, resumed,
            "warm-started sampler must continue the same proposal sequence"
        );
    }

    /// A `SessionChannel` fed from a fixed queue of inbound events, recording
    /// everything the session sends back.
    struct MockChannel {
        inbound: std::collections::VecDeque<ChannelEvent>,
        sent: Vec<ServerMessage>,
    }

    #[async_trait::async_trait]
    impl SessionChannel for MockChannel {
        async fn send(&mut self, message: ServerMessage) -> anyhow::Result<()> {
            self.sent.push(message);
            Ok(())
        }

        async fn recv(&mut self) -> ChannelEvent {
            self.inbound.pop_front().unwrap_or(ChannelEvent::Disconnected)
        }
    }

    #[tokio::test]
    async fn invalid_frame_before_start_is_reported_and_closes() {
        let mut channel = MockChannel {
            inbound: vec![ChannelEvent::Invalid("not valid json".to_string())].into(),
            sent: Vec::new(),
        };
        let mut session = Session::new("sess-2".to_string(), CancellationToken::new(), test_engine_config());

        session.run(&mut channel).await.expect("run returns Ok even on protocol error");

        assert_eq!(session.state(), SessionState::Closed);
        assert!(
            channel
                .sent
                .iter()
                .any(|message| matches!(message, ServerMessage::Error { .. })),
            "an invalid frame before start must be surfaced as an error, not silently dropped"
        );
    }

    #[tokio::test]
    async fn invalid_frame_during_trial_wait_terminates_the_session() {
        let mut channel = MockChannel {
            inbound: vec![
                ChannelEvent::Message(ClientMessage::Start {
                    config: test_config(),
                }),
                ChannelEvent::Invalid("metric `score` has a non-finite value".to_string()),
            ]
            .into(),
            sent: Vec::new(),
        };
        let mut session = Session::new("sess-3".to_string(), CancellationToken::new(), test_engine_config());

        session.run(&mut channel).await.expect("run returns Ok even on protocol error");

        assert_eq!(session.state(), SessionState::Closed);
        assert!(
            channel.sent.iter().any(|message| matches!(
                message,
                ServerMessage::Complete {
                    reason: TerminationReason::Error,
                    ..
                }
            )),
            "a malformed trial-result frame must terminate the run with TerminationReason::Error"
        );
    }

    #[tokio::test]
    async fn run_resumed_skips_await_start_and_drives_the_loop() {
        let mut live = Session::new("sess-4".to_string(), CancellationToken::new(), test_engine_config());
        live.configure(test_config()).expect("configure");
        for i in 0..3u32 {
            let opt_sampler::Proposal::Point(encoded) = live.sampler.as_mut().unwrap().next_proposal().unwrap() else {
                panic!("expected a point proposal");
            };
            let params = live.space.as_ref().unwrap().decode(&encoded);
            let mut metrics = MetricBag::new();
            metrics.insert("score".to_string(), 1.0 + i as f64);
            live.record_result(
                i,
                &encoded,
                params,
                TrialResultPayload {
                    metrics,
                    passed_filters: None,
                },
            );
        }
        let record = live.to_record("fingerprint", Utc::now());

        let mut resumed = Session::warm_start(&record, CancellationToken::new(), test_engine_config())
            .expect("warm start");
        let mut channel = MockChannel {
            inbound: std::collections::VecDeque::new(),
            sent: Vec::new(),
        };

        // `test_config()`'s trials: 3 is already satisfied by the replayed
        // history, so the resumed run should finish immediately without ever
        // waiting on a `start` message.
        resumed
            .run_resumed(&mut channel)
            .await
            .expect("resumed run completes");

        assert_eq!(resumed.state(), SessionState::Closed);
        assert!(channel.sent.iter().any(|message| matches!(
            message,
            ServerMessage::Complete {
                reason: TerminationReason::Finished,
                ..
            }
        )));
    }
}

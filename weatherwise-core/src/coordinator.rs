//! Concurrent fetch across every available provider with per-client failure isolation.

use std::{
    collections::HashMap,
    future,
    sync::Arc,
    time::{Duration, Instant},
};

use serde::Serialize;
use tokio::{sync::Semaphore, task::JoinSet, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    context::Context,
    error::{PipelineError, ProviderError},
    model::Observation,
    provider::ProviderClient,
};

/// How a single provider's fetch ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchOutcome {
    Succeeded,
    Failed { kind: &'static str, message: String },
    /// Still running when the coordinator stopped waiting.
    Cancelled,
}

impl std::fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchOutcome::Succeeded => f.write_str("ok"),
            FetchOutcome::Failed { kind, message } => write!(f, "failed: {kind}: {message}"),
            FetchOutcome::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchAttempt {
    pub provider: String,
    pub outcome: FetchOutcome,
    pub latency: Duration,
}

/// Result of one fetch cycle. Observations come back in completion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchReport {
    pub observations: Vec<Observation>,
    pub attempts: Vec<FetchAttempt>,
    /// Registered clients skipped because they reported themselves unavailable.
    pub unavailable: Vec<String>,
    /// The coordinator stopped waiting before every task finished.
    pub interrupted: bool,
}

impl FetchReport {
    /// True when no client was dispatched at all, as opposed to every dispatched client failing.
    pub fn no_clients_dispatched(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.observations.len()
    }

    pub fn failed(&self) -> impl Iterator<Item = &FetchAttempt> {
        self.attempts.iter().filter(|a| a.outcome != FetchOutcome::Succeeded)
    }

    fn every_attempt_rejected_location(&self) -> bool {
        !self.attempts.is_empty()
            && self.attempts.iter().all(|a| {
                matches!(a.outcome, FetchOutcome::Failed { kind, .. } if kind == "location_not_supported")
            })
    }
}

type TaskOutput = (String, Duration, Result<Observation, ProviderError>);

#[derive(Debug, Clone)]
pub struct FetchCoordinator {
    workers: usize,
    overall_timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl FetchCoordinator {
    pub fn new(ctx: &Context) -> Self {
        Self {
            workers: ctx.config.fetch.worker_count(),
            overall_timeout: ctx.config.fetch.overall_timeout(),
            cancel: ctx.cancel.clone(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_overall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.overall_timeout = timeout;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Fetch `location` from every available client concurrently.
    ///
    /// Individual failures are recorded in the report, never raised. The only
    /// error is every dispatched client rejecting the location.
    pub async fn fetch_all(
        &self,
        location: &str,
        clients: &[Arc<dyn ProviderClient>],
    ) -> Result<FetchReport, PipelineError> {
        let mut report = FetchReport::default();
        let mut ready = Vec::with_capacity(clients.len());

        for client in clients {
            if client.is_available() {
                debug!(provider = client.name(), "client loaded");
                ready.push(Arc::clone(client));
            } else {
                info!(provider = client.name(), "client unavailable, skipping");
                report.unavailable.push(client.name().to_string());
            }
        }

        if ready.is_empty() {
            warn!(location, registered = clients.len(), "no available providers");
            return Ok(report);
        }

        let started = Instant::now();
        let permits = Arc::new(Semaphore::new(self.workers));
        let mut tasks: JoinSet<TaskOutput> = JoinSet::new();
        let mut pending = HashMap::new();

        for client in ready {
            let permits = Arc::clone(&permits);
            let location = location.to_string();
            let name = client.name().to_string();

            let handle = tasks.spawn(async move {
                // The semaphore is never closed, so acquisition only fails after shutdown.
                let _permit = permits.acquire_owned().await.ok();
                let start = Instant::now();
                let result = client.fetch(&location).await;
                (client.name().to_string(), start.elapsed(), result)
            });
            pending.insert(handle.id(), name);
        }

        let deadline = self.overall_timeout.map(|t| time::Instant::now() + t);

        loop {
            let stop_waiting = async {
                match deadline {
                    Some(at) => time::sleep_until(at).await,
                    None => future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    warn!(location, outstanding = pending.len(), "fetch cancelled");
                    report.interrupted = true;
                    break;
                }
                _ = stop_waiting => {
                    warn!(location, outstanding = pending.len(), "fetch deadline reached");
                    report.interrupted = true;
                    break;
                }
                joined = tasks.join_next_with_id() => match joined {
                    None => break,
                    Some(Ok((id, (provider, latency, result)))) => {
                        pending.remove(&id);
                        record(&mut report, provider, latency, result);
                    }
                    Some(Err(err)) => {
                        let provider = pending
                            .remove(&err.id())
                            .unwrap_or_else(|| "unknown".to_string());
                        warn!(provider = %provider, error = %err, "fetch task aborted");
                        report.attempts.push(FetchAttempt {
                            provider,
                            outcome: FetchOutcome::Failed {
                                kind: "task_failed",
                                message: err.to_string(),
                            },
                            latency: started.elapsed(),
                        });
                    }
                },
            }
        }

        if report.interrupted {
            tasks.abort_all();
            let elapsed = started.elapsed();
            let mut outstanding: Vec<String> = pending.into_values().collect();
            outstanding.sort();
            report.attempts.extend(outstanding.into_iter().map(|provider| FetchAttempt {
                provider,
                outcome: FetchOutcome::Cancelled,
                latency: elapsed,
            }));
        }

        info!(
            location,
            succeeded = report.succeeded(),
            failed = report.failed().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetch cycle finished"
        );

        if report.every_attempt_rejected_location() {
            return Err(PipelineError::LocationNotSupported { location: location.to_string() });
        }

        Ok(report)
    }
}

fn record(
    report: &mut FetchReport,
    provider: String,
    latency: Duration,
    result: Result<Observation, ProviderError>,
) {
    let latency_ms = latency.as_millis() as u64;

    let outcome = match result {
        Ok(observation) => {
            info!(provider = %provider, latency_ms, "fetch succeeded");
            report.observations.push(observation);
            FetchOutcome::Succeeded
        }
        Err(err) => {
            warn!(provider = %provider, kind = err.kind(), latency_ms, error = %err, "fetch failed");
            FetchOutcome::Failed { kind: err.kind(), message: err.to_string() }
        }
    };

    report.attempts.push(FetchAttempt { provider, outcome, latency });
}

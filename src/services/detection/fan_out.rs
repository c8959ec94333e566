// Fan-Out Coordinator
// Runs every registered adapter concurrently and waits for all of them to settle.
// Outcomes come back in registration order regardless of completion order, which
// makes registration order the dedup tie-break downstream.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::models::{AdapterOutcome, Document, OutcomeStatus, Provider};

use super::sources::SourceAdapter;

/// Explicit, ordered adapter list. Index order is the documented tie-break contract.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>) -> Self {
        Self { adapters }
    }

    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.push(adapter);
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SourceAdapter>> {
        self.adapters.iter()
    }
}

pub struct FanOutCoordinator {
    registry: AdapterRegistry,
    /// Bound applied to each adapter; all start together, so this is also the overall bound.
    deadline: Duration,
}

impl FanOutCoordinator {
    pub fn new(registry: AdapterRegistry, deadline: Duration) -> Self {
        Self { registry, deadline }
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Never fails: errors, timeouts and panics become `Failed` outcomes.
    pub async fn run_all(&self, document: Arc<Document>) -> Vec<AdapterOutcome> {
        let started = Instant::now();
        let mut outcomes = Vec::with_capacity(self.registry.len());
        let mut pending: Vec<(Provider, Option<JoinHandle<AdapterOutcome>>)> = Vec::new();

        for adapter in self.registry.iter() {
            let provider = adapter.provider();
            if !adapter.is_available() {
                info!(provider = %provider, "[FAN_OUT] adapter not configured, skipping");
                pending.push((provider, None));
                continue;
            }

            let adapter = Arc::clone(adapter);
            let document = Arc::clone(&document);
            let deadline = self.deadline;
            let handle = tokio::spawn(async move {
                let t0 = Instant::now();
                let status = match tokio::time::timeout(deadline, adapter.query(&document)).await {
                    Ok(Ok(partial)) => OutcomeStatus::Completed(partial),
                    Ok(Err(e)) => {
                        warn!(provider = %provider, error = %e, "[FAN_OUT] adapter failed");
                        OutcomeStatus::Failed(e.to_string())
                    }
                    Err(_) => {
                        warn!(
                            provider = %provider,
                            deadline_ms = deadline.as_millis() as u64,
                            "[FAN_OUT] adapter timed out"
                        );
                        OutcomeStatus::Failed(format!("timed out after {}ms", deadline.as_millis()))
                    }
                };
                AdapterOutcome {
                    provider,
                    status,
                    elapsed_ms: t0.elapsed().as_millis() as u64,
                }
            });
            pending.push((provider, Some(handle)));
        }

        // All tasks are already running; awaiting in registration order only fixes the output order.
        for (provider, handle) in pending {
            let outcome = match handle {
                None => AdapterOutcome {
                    provider,
                    status: OutcomeStatus::Skipped("not configured".to_string()),
                    elapsed_ms: 0,
                },
                Some(handle) => match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(provider = %provider, error = %e, "[FAN_OUT] adapter task aborted");
                        AdapterOutcome {
                            provider,
                            status: OutcomeStatus::Failed(format!("task aborted: {}", e)),
                            elapsed_ms: started.elapsed().as_millis() as u64,
                        }
                    }
                },
            };
            outcomes.push(outcome);
        }

        info!(
            adapters = outcomes.len(),
            completed = outcomes.iter().filter(|o| o.partial().is_some()).count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "[FAN_OUT] all adapters settled"
        );
        outcomes
    }
}

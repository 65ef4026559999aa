use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    error::{ExecutionError, ExecutionResult},
    executor::Row,
    planner::MergePhase,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamFailureKind {
    /// The shard the upstream should read is gone.
    MissingShard,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamFailure {
    pub node_id: String,
    pub message: String,
    pub kind: UpstreamFailureKind,
}

impl UpstreamFailure {
    pub fn failed(node_id: &str, message: &str) -> Self {
        Self { node_id: node_id.to_string(), message: message.to_string(), kind: UpstreamFailureKind::Failed }
    }

    pub fn missing_shard(node_id: &str, message: &str) -> Self {
        Self { node_id: node_id.to_string(), message: message.to_string(), kind: UpstreamFailureKind::MissingShard }
    }
}

/// Everything one upstream produced, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamBatch {
    pub node_id: String,
    pub rows: Vec<Row>,
}

pub type UpstreamOutcome = Result<UpstreamBatch, UpstreamFailure>;

/// The reporting end given to one upstream. Reports at most once; dropping it
/// without reporting leaves the barrier short.
#[derive(Debug)]
pub struct UpstreamHandle {
    tx: mpsc::Sender<UpstreamOutcome>,
    cancel: CancellationToken,
}

impl UpstreamHandle {
    /// Delivers the outcome. Returns false when the barrier is gone.
    pub async fn report(self, outcome: UpstreamOutcome) -> bool {
        self.tx.send(outcome).await.is_ok()
    }

    /// Fires when the merge gave up on this upstream.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Waits for exactly `num_upstreams` outcomes before the merge phase runs.
///
/// The first failure cancels the remaining upstreams and is returned; whatever
/// arrives after it is dropped. A missing shard counts as an empty upstream when
/// `ignore_missing_shards` is set.
pub struct MergeBarrier {
    num_upstreams: usize,
    ignore_missing_shards: bool,
    rx: mpsc::Receiver<UpstreamOutcome>,
    cancel: CancellationToken,
}

impl MergeBarrier {
    /// A barrier plus one handle per upstream. Cancelling `parent` aborts the wait.
    pub fn new(
        num_upstreams: usize,
        ignore_missing_shards: bool,
        parent: &CancellationToken,
    ) -> (Self, Vec<UpstreamHandle>) {
        let (tx, rx) = mpsc::channel(num_upstreams.max(1));
        let cancel = parent.child_token();
        let handles = (0..num_upstreams)
            .map(|_| UpstreamHandle { tx: tx.clone(), cancel: cancel.clone() })
            .collect();
        let barrier = Self { num_upstreams, ignore_missing_shards, rx, cancel };
        (barrier, handles)
    }

    /// A barrier sized for the upstreams of `phase`.
    pub fn for_phase(
        phase: &MergePhase,
        ignore_missing_shards: bool,
        parent: &CancellationToken,
    ) -> (Self, Vec<UpstreamHandle>) {
        Self::new(phase.num_upstreams, ignore_missing_shards, parent)
    }

    pub fn num_upstreams(&self) -> usize {
        self.num_upstreams
    }

    /// Collects the rows of all upstreams, upstream by upstream in arrival order.
    pub async fn wait(mut self) -> ExecutionResult<Vec<Row>> {
        let mut rows = Vec::new();
        let mut received = 0;
        while received < self.num_upstreams {
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(received, expected = self.num_upstreams, "merge cancelled");
                    return Err(ExecutionError::Cancelled);
                }
                outcome = self.rx.recv() => outcome,
            };
            let Some(outcome) = outcome else {
                self.cancel.cancel();
                return Err(ExecutionError::Incomplete { expected: self.num_upstreams, received });
            };
            received += 1;

            match outcome {
                Ok(batch) => {
                    debug!(node_id = %batch.node_id, rows = batch.rows.len(), received, "upstream done");
                    rows.extend(batch.rows);
                }
                Err(failure) if failure.kind == UpstreamFailureKind::MissingShard && self.ignore_missing_shards => {
                    warn!(node_id = %failure.node_id, reason = %failure.message, "ignoring missing shard");
                }
                Err(failure) => {
                    warn!(node_id = %failure.node_id, reason = %failure.message, "upstream failed, cancelling merge");
                    self.cancel.cancel();
                    return Err(ExecutionError::Upstream { node_id: failure.node_id, message: failure.message });
                }
            }
        }
        Ok(rows)
    }
}

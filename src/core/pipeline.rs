use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::{ActivityCounters, ActivitySnapshot, GenesisFacts, PendingReward, ReputationResult};
use crate::rewards::RewardState;
use crate::rewards::ScanReport;
use crate::rewards::claim::ClaimOutcome;
use crate::rewards::ledger::{RewardLedger, RewardStore, StoreError};
use crate::scoring::ReputationEngine;

/// A request for the single-writer queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum LedgerCommand {
    Scan {
        user_id: String,
        snapshot: ActivitySnapshot,
        #[serde(default)]
        genesis: Option<GenesisFacts>,
    },
    Claim {
        user_id: String,
    },
    CheckIn {
        user_id: String,
    },
    Referral {
        user_id: String,
    },
    Task {
        user_id: String,
        task: String,
    },
    State {
        user_id: String,
    },
    Reputation {
        counters: ActivityCounters,
    },
}

/// Messages from pipeline to consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "output", rename_all = "snake_case")]
pub enum PipelineOutput {
    Scanned { user_id: String, report: ScanReport },
    Claimed { user_id: String, outcome: ClaimOutcome },
    Queued { user_id: String, rewards: Vec<PendingReward> },
    State { state: RewardState },
    Reputation { result: ReputationResult },
    Failed { user_id: String, error: String },
}

fn apply<S: RewardStore>(
    ledger: &RewardLedger<S>,
    engine: &ReputationEngine,
    command: LedgerCommand,
) -> Result<PipelineOutput, (String, StoreError)> {
    let now = Utc::now();
    match command {
        LedgerCommand::Scan { user_id, snapshot, genesis } => ledger
            .scan(&user_id, &snapshot, genesis.as_ref())
            .map(|report| PipelineOutput::Scanned { user_id: user_id.clone(), report })
            .map_err(|e| (user_id, e)),
        LedgerCommand::Claim { user_id } => ledger
            .claim(&user_id, now)
            .map(|outcome| PipelineOutput::Claimed { user_id: user_id.clone(), outcome })
            .map_err(|e| (user_id, e)),
        LedgerCommand::CheckIn { user_id } => ledger
            .check_in(&user_id, now)
            .map(|reward| PipelineOutput::Queued {
                user_id: user_id.clone(),
                rewards: reward.into_iter().collect(),
            })
            .map_err(|e| (user_id, e)),
        LedgerCommand::Referral { user_id } => ledger
            .referral(&user_id, now)
            .map(|rewards| PipelineOutput::Queued { user_id: user_id.clone(), rewards })
            .map_err(|e| (user_id, e)),
        LedgerCommand::Task { user_id, task } => ledger
            .task_completed(&user_id, &task, now)
            .map(|reward| PipelineOutput::Queued {
                user_id: user_id.clone(),
                rewards: vec![reward],
            })
            .map_err(|e| (user_id, e)),
        LedgerCommand::State { user_id } => ledger
            .state(&user_id)
            .map(|state| PipelineOutput::State { state })
            .map_err(|e| (user_id, e)),
        LedgerCommand::Reputation { counters } => Ok(PipelineOutput::Reputation {
            result: engine.compute(&counters),
        }),
    }
}

/// Run the pipeline: receive commands, apply them in arrival order, forward results.
pub async fn run_pipeline<S: RewardStore>(
    mut rx: mpsc::UnboundedReceiver<LedgerCommand>,
    out_tx: mpsc::UnboundedSender<PipelineOutput>,
    ledger: Arc<RewardLedger<S>>,
) {
    let engine = ReputationEngine::new(ledger.tables().clone());
    let mut command_count: u64 = 0;
    let mut failure_count: u64 = 0;

    info!("Pipeline started, waiting for commands...");

    while let Some(command) = rx.recv().await {
        debug!("Command: {command:?}");
        command_count += 1;

        let output = match apply(&ledger, &engine, command) {
            Ok(output) => output,
            Err((user_id, e)) => {
                failure_count += 1;
                warn!("Command for {user_id} failed: {e}");
                PipelineOutput::Failed {
                    user_id,
                    error: e.to_string(),
                }
            }
        };

        if command_count % 1000 == 0 {
            info!("Pipeline processed {command_count} commands ({failure_count} failed)");
        }

        if out_tx.send(output).is_err() {
            info!("Output channel closed, stopping pipeline");
            break;
        }
    }

    info!("Pipeline shutting down after {command_count} commands ({failure_count} failed)");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SharedDatabase;
    use crate::scoring::tables::RuleTables;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_ledger() -> Arc<RewardLedger<SharedDatabase>> {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "repscan_pipeline_test_{}_{}.db",
            std::process::id(),
            id
        ));
        let _ = std::fs::remove_file(&path);
        let db = SharedDatabase::open(&path).unwrap();
        Arc::new(RewardLedger::new(db, RuleTables::default()).unwrap())
    }

    #[test]
    fn command_json_shape() {
        let json = r#"{"command":"task","user_id":"alice","task":"quiz"}"#;
        let command: LedgerCommand = serde_json::from_str(json).unwrap();
        assert_eq!(
            command,
            LedgerCommand::Task {
                user_id: "alice".into(),
                task: "quiz".into()
            }
        );

        let scan = r#"{"command":"scan","user_id":"a","snapshot":{"wallet_address":"G1","sent_count":3,"taken_at":"2024-01-01T00:00:00Z"}}"#;
        let command: LedgerCommand = serde_json::from_str(scan).unwrap();
        match command {
            LedgerCommand::Scan { snapshot, genesis, .. } => {
                assert_eq!(snapshot.sent_count, 3.0);
                assert!(genesis.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[tokio::test]
    async fn processes_commands_in_order() {
        let ledger = temp_ledger();
        let (tx, rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_pipeline(rx, out_tx, Arc::clone(&ledger)));

        tx.send(LedgerCommand::Task { user_id: "alice".into(), task: "intro".into() }).unwrap();
        tx.send(LedgerCommand::Claim { user_id: "alice".into() }).unwrap();
        tx.send(LedgerCommand::Reputation { counters: ActivityCounters::default() }).unwrap();
        drop(tx);

        let mut outputs = Vec::new();
        while let Some(output) = out_rx.recv().await {
            outputs.push(output);
        }
        handle.await.unwrap();

        assert_eq!(outputs.len(), 3);
        assert!(matches!(&outputs[0], PipelineOutput::Queued { rewards, .. } if rewards.len() == 1));
        match &outputs[1] {
            PipelineOutput::Claimed { outcome, .. } => assert_eq!(outcome.admitted_points, 2_000),
            other => panic!("unexpected output {other:?}"),
        }
        match &outputs[2] {
            PipelineOutput::Reputation { result } => assert_eq!(result.total_score, 0),
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_check_in_queues_nothing() {
        let ledger = temp_ledger();
        let (tx, rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_pipeline(rx, out_tx, ledger));

        tx.send(LedgerCommand::CheckIn { user_id: "bob".into() }).unwrap();
        tx.send(LedgerCommand::CheckIn { user_id: "bob".into() }).unwrap();
        drop(tx);

        let first = out_rx.recv().await.unwrap();
        let second = out_rx.recv().await.unwrap();
        handle.await.unwrap();
        assert!(matches!(first, PipelineOutput::Queued { rewards, .. } if rewards.len() == 1));
        assert!(matches!(second, PipelineOutput::Queued { rewards, .. } if rewards.is_empty()));
    }

    struct BrokenStore;

    impl RewardStore for BrokenStore {
        fn load_reward_state(&self, _user_id: &str) -> Result<RewardState, StoreError> {
            Err(StoreError::Database(rusqlite::Error::InvalidQuery))
        }

        fn save_reward_state(&self, _state: &RewardState) -> Result<(), StoreError> {
            Ok(())
        }

        fn commit_claim(
            &self,
            _state: &RewardState,
            _outcome: &ClaimOutcome,
            _at: chrono::DateTime<Utc>,
        ) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn store_errors_become_failed_outputs() {
        let ledger = Arc::new(RewardLedger::new(BrokenStore, RuleTables::default()).unwrap());
        let (tx, rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_pipeline(rx, out_tx, ledger));

        tx.send(LedgerCommand::Claim { user_id: "alice".into() }).unwrap();
        drop(tx);

        let output = out_rx.recv().await.unwrap();
        handle.await.unwrap();
        match output {
            PipelineOutput::Failed { user_id, .. } => assert_eq!(user_id, "alice"),
            other => panic!("unexpected output {other:?}"),
        }
    }
}

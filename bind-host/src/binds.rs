//! Simulated SMPP binds sharing one process.
//!
//! Each bind draws the sequence numbers of its requests from its own generator, while a single
//! dispatcher routes all responses back by their range tag.

use crate::config::Config;
use log::*;
use pdu_sequence::RangeTag;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tokio::{sync::mpsc::channel, task::JoinSet};

// Private internals that drive the traffic.
mod engine;

/// Public bind APIs are handled here.
pub mod api;

/// Public subscriptions to routed responses are handled here.
pub mod receipts;

pub use api::{BindError, BindPool};
pub use engine::{Bind, BindReport};

/// Outcome of a simulation run.
#[derive(Debug)]
pub struct RunSummary {
    pub reports: Vec<BindReport>,
    /// Responses the dispatcher could not hand to a bind.
    pub misrouted: u64,
    pub receipts: FxHashMap<RangeTag, u64>,
}

impl RunSummary {
    /// Every request of every bind got exactly its own response.
    pub fn is_clean(&self) -> bool {
        self.misrouted == 0 && self.reports.iter().all(BindReport::is_clean)
    }
}

/// Open the configured binds, send their requests and correlate all responses.
pub async fn run(config: &Config) -> Result<RunSummary, BindError> {
    let pool = Arc::new(BindPool::new(config.policy));
    let receipt_counts = receipts::tally(&pool);

    let (request_tx, request_rx) = channel(1000);
    let (response_tx, response_rx) = channel(1000);
    let peer = tokio::spawn(engine::loopback_peer(request_rx, response_tx));
    let dispatcher = tokio::spawn(engine::dispatcher(pool.clone(), response_rx));

    let mut binds = Vec::with_capacity(config.binds.len());
    for bind_config in &config.binds {
        binds.push(pool.open(bind_config.initial_value).await?);
    }

    let workers = config.workers_per_bind.max(1);
    let mut tasks = JoinSet::new();

    for bind in &binds {
        for worker in 0..workers {
            let share = config.requests_per_bind / workers
                + u32::from(worker < config.requests_per_bind % workers);
            tasks.spawn(engine::request_worker(
                bind.clone(),
                share,
                request_tx.clone(),
            ));
        }
    }

    // The peer stops once every worker has dropped its sender.
    drop(request_tx);

    while let Some(result) = tasks.join_next().await {
        result?;
    }

    peer.await?;
    let misrouted = dispatcher.await?;

    let mut reports = Vec::with_capacity(binds.len());
    for bind in &binds {
        reports.push(bind.report().await);

        // A reused tag may already be closed through the newer bind.
        if let Err(e) = pool.close(bind.range_tag()).await {
            trace!("{e}");
        }
    }

    // Dropping the pool ends the receipt subscription.
    drop(pool);
    let receipts = receipt_counts.await?;

    Ok(RunSummary {
        reports,
        misrouted,
        receipts,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::BindConfig;
    use pdu_sequence::{ValidationPolicy, MAX_VALUE};

    fn config(binds: Vec<BindConfig>) -> Config {
        // Few enough requests that the receipt tally never lags.
        Config {
            requests_per_bind: 301,
            workers_per_bind: 3,
            binds,
            ..Config::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn all_responses_find_their_bind() {
        let config = config(vec![
            BindConfig::default(),
            BindConfig {
                initial_value: Some(MAX_VALUE - 500),
            },
            BindConfig {
                initial_value: Some(0),
            },
        ]);

        let summary = run(&config).await.unwrap();

        assert!(summary.is_clean(), "{summary:?}");
        assert_eq!(summary.reports.len(), 3);
        for report in &summary.reports {
            assert_eq!(report.issued, 301);
            assert_eq!(summary.receipts.get(&report.tag), Some(&301));
        }
    }

    #[tokio::test]
    async fn strict_policy_fails_run() {
        let config = Config {
            policy: ValidationPolicy::Strict,
            ..config(vec![BindConfig {
                initial_value: Some(u32::MAX),
            }])
        };

        assert!(matches!(
            run(&config).await,
            Err(BindError::InvalidSequenceNumber(_))
        ));
    }

    #[tokio::test]
    async fn reused_tags_lose_responses() {
        let config = config(vec![BindConfig::default(); 17]);

        let summary = run(&config).await.unwrap();

        // The first bind's responses went to the seventeenth.
        assert!(!summary.is_clean());
        assert_eq!(summary.reports[0].matched, 0);
        assert!(summary.misrouted > 0);
    }
}

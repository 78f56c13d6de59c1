use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::worker::{CycleOutcome, Worker};

/// Totals across every cycle the scheduler ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub cycles: u64,
    pub idle: u64,
    pub completed: u64,
    pub failed: u64,
    pub claim_errors: u64,
}

/// Drive the worker. With no interval a single cycle runs; otherwise one cycle
/// per tick, starting immediately, until `cancel` fires. A tick that arrives
/// while a cycle is still running is skipped, so cycles never overlap.
pub async fn run(worker: &Worker, interval: Option<Duration>, cancel: CancellationToken) -> SchedulerStats {
    let mut stats = SchedulerStats::default();

    let Some(period) = interval else {
        info!("Running a single cycle");
        run_once(worker, &cancel, &mut stats).await;
        return stats;
    };

    info!(interval_minutes = period.as_secs() / 60, "Starting scrape interval loop");
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                info!(cycles = stats.cycles, "Shutdown requested, stopping scheduler");
                break;
            }
            _ = ticker.tick() => {
                run_once(worker, &cancel, &mut stats).await;
            }
        }
    }

    stats
}

async fn run_once(worker: &Worker, cancel: &CancellationToken, stats: &mut SchedulerStats) {
    stats.cycles += 1;
    match worker.run_cycle(cancel).await {
        Ok(CycleOutcome::Idle) => stats.idle += 1,
        Ok(CycleOutcome::Completed(_)) => stats.completed += 1,
        Ok(CycleOutcome::Failed { ticket_id, .. }) => {
            warn!(ticket_id, "Cycle failed, ticket released for a later retry");
            stats.failed += 1;
        }
        Err(e) => {
            error!(error = %e, "Cycle could not claim a ticket");
            stats.claim_errors += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::testing::{ticket, MockSource, MockTicketStore, RecordingSink};
    use crate::PipelineSettings;

    fn worker(store: MockTicketStore) -> Worker {
        let settings = PipelineSettings {
            search_delay: Duration::ZERO,
            default_window_days: 0,
            ..PipelineSettings::default()
        };
        Worker::new(
            Arc::new(store),
            Arc::new(MockSource::new()),
            Arc::new(RecordingSink::new()),
            settings,
        )
    }

    #[tokio::test]
    async fn single_cycle_without_interval() {
        let w = worker(MockTicketStore::new(vec![ticket(1)]));
        let stats = run(&w, None, CancellationToken::new()).await;
        assert_eq!(stats.cycles, 1);
        assert_eq!(stats.completed, 1);
    }

    #[tokio::test]
    async fn claim_errors_are_counted_not_fatal() {
        let w = worker(MockTicketStore::new(vec![]).failing_claim());
        let stats = run(&w, None, CancellationToken::new()).await;
        assert_eq!(stats.claim_errors, 1);
    }

    #[tokio::test]
    async fn interval_loop_claims_nothing_once_cancelled() {
        let store = Arc::new(MockTicketStore::new(vec![ticket(1)]));
        let w = Worker::new(
            store.clone(),
            Arc::new(MockSource::new()),
            Arc::new(RecordingSink::new()),
            PipelineSettings::default(),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        // The first tick is immediately ready too
        let stats = run(&w, Some(Duration::from_secs(600)), cancel).await;
        assert_eq!(stats.cycles, 0);
        assert_eq!(store.running(1), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn interval_loop_stops_on_cancel() {
        let w = worker(MockTicketStore::new(vec![]));
        let cancel = CancellationToken::new();

        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(25 * 60)).await;
            stopper.cancel();
        });

        let stats = run(&w, Some(Duration::from_secs(10 * 60)), cancel).await;
        // Ticks at 0, 10 and 20 minutes
        assert_eq!(stats.cycles, 3);
        assert_eq!(stats.idle, 3);
    }
}

//! Fixed-cadence scheduler with a single-flight guard.
//!
//! The runner is moved into the spawned cycle task and returned through its `JoinHandle`, so at
//! most one cycle can hold it. Ticks that find the handle unfinished are skipped.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::mention_pipeline::PollCycleReport;

#[async_trait]
pub trait CycleRunner: Send + 'static {
    async fn run_cycle(&mut self) -> Result<PollCycleReport>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Started,
    /// A cycle was still running; nothing was started.
    Skipped,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SchedulerStats {
    pub started_cycles: u64,
    pub completed_cycles: u64,
    pub failed_cycles: u64,
    pub skipped_ticks: u64,
    pub failure_streak: u64,
    pub last_error: Option<String>,
}

type CycleTask<R> = JoinHandle<(R, Result<PollCycleReport>)>;

pub struct PollScheduler<R: CycleRunner> {
    interval: Duration,
    idle_runner: Option<R>,
    in_flight: Option<CycleTask<R>>,
    stats: SchedulerStats,
}

impl<R: CycleRunner> PollScheduler<R> {
    pub fn new(runner: R, interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            idle_runner: Some(runner),
            in_flight: None,
            stats: SchedulerStats::default(),
        }
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    pub fn is_cycle_running(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Starts a cycle unless one is still running. A finished cycle is reclaimed first.
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        if self.is_cycle_running() {
            self.stats.skipped_ticks = self.stats.skipped_ticks.saturating_add(1);
            tracing::debug!(
                skipped_ticks = self.stats.skipped_ticks,
                "poll cycle still running, skipping tick"
            );
            return Ok(TickOutcome::Skipped);
        }
        self.reclaim().await?;

        let mut runner = self
            .idle_runner
            .take()
            .ok_or_else(|| anyhow!("poll runner is unavailable"))?;
        self.stats.started_cycles = self.stats.started_cycles.saturating_add(1);
        self.in_flight = Some(tokio::spawn(async move {
            let result = runner.run_cycle().await;
            (runner, result)
        }));
        Ok(TickOutcome::Started)
    }

    /// Waits for the in-flight cycle, if any, and takes the runner back.
    pub async fn drain(&mut self) -> Result<()> {
        self.reclaim().await
    }

    async fn reclaim(&mut self) -> Result<()> {
        let Some(handle) = self.in_flight.take() else {
            return Ok(());
        };
        let (runner, result) = handle
            .await
            .map_err(|error| anyhow!("poll cycle task aborted: {error}"))?;
        self.idle_runner = Some(runner);

        match result {
            Ok(_) => {
                self.stats.completed_cycles = self.stats.completed_cycles.saturating_add(1);
                self.stats.failure_streak = 0;
                self.stats.last_error = None;
            }
            Err(error) => {
                self.stats.failed_cycles = self.stats.failed_cycles.saturating_add(1);
                self.stats.failure_streak = self.stats.failure_streak.saturating_add(1);
                tracing::warn!(
                    error = %format!("{error:#}"),
                    failure_streak = self.stats.failure_streak,
                    "poll cycle failed"
                );
                self.stats.last_error = Some(format!("{error:#}"));
            }
        }
        Ok(())
    }

    /// Runs one cycle and returns its failure, if any.
    pub async fn run_once(&mut self) -> Result<()> {
        self.tick().await?;
        self.drain().await?;
        if let Some(error) = self.stats.last_error.clone() {
            bail!("poll cycle failed: {error}");
        }
        Ok(())
    }

    /// Ticks at the configured interval until Ctrl-C, then waits for the in-flight cycle.
    pub async fn run(&mut self) -> Result<()> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            "mention poller started"
        );

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutdown requested, waiting for in-flight poll cycle");
                    self.drain().await?;
                    tracing::info!(
                        completed = self.stats.completed_cycles,
                        failed = self.stats.failed_cycles,
                        skipped_ticks = self.stats.skipped_ticks,
                        "mention poller stopped"
                    );
                    return Ok(());
                }
                _ = ticker.tick() => {
                    self.tick().await?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use anyhow::{bail, Result};
    use async_trait::async_trait;

    use super::{CycleRunner, PollScheduler, TickOutcome};
    use crate::mention_pipeline::PollCycleReport;

    #[derive(Clone, Default)]
    struct Probe {
        cycles: Arc<AtomicUsize>,
        running: Arc<AtomicBool>,
        overlapped: Arc<AtomicBool>,
    }

    struct SlowRunner {
        probe: Probe,
        duration: Duration,
        fail: bool,
    }

    #[async_trait]
    impl CycleRunner for SlowRunner {
        async fn run_cycle(&mut self) -> Result<PollCycleReport> {
            if self.probe.running.swap(true, Ordering::SeqCst) {
                self.probe.overlapped.store(true, Ordering::SeqCst);
            }
            tokio::time::sleep(self.duration).await;
            self.probe.cycles.fetch_add(1, Ordering::SeqCst);
            self.probe.running.store(false, Ordering::SeqCst);
            if self.fail {
                bail!("feed unavailable");
            }
            Ok(PollCycleReport::default())
        }
    }

    fn slow_runner(probe: &Probe, fail: bool) -> SlowRunner {
        SlowRunner {
            probe: probe.clone(),
            duration: Duration::from_millis(150),
            fail,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn functional_tick_skips_while_cycle_in_flight() {
        let probe = Probe::default();
        let mut scheduler = PollScheduler::new(slow_runner(&probe, false), Duration::from_millis(50));

        assert_eq!(scheduler.tick().await.expect("tick"), TickOutcome::Started);
        assert_eq!(scheduler.tick().await.expect("tick"), TickOutcome::Skipped);
        assert_eq!(scheduler.tick().await.expect("tick"), TickOutcome::Skipped);
        assert_eq!(scheduler.stats().skipped_ticks, 2);

        scheduler.drain().await.expect("drain");
        assert_eq!(scheduler.stats().completed_cycles, 1);
        assert_eq!(scheduler.tick().await.expect("tick"), TickOutcome::Started);
        scheduler.drain().await.expect("drain");

        assert_eq!(probe.cycles.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.stats().started_cycles, 2);
        assert!(!probe.overlapped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn functional_finished_cycle_is_reclaimed_on_next_tick() {
        let probe = Probe::default();
        let mut scheduler = PollScheduler::new(slow_runner(&probe, false), Duration::from_millis(50));

        scheduler.tick().await.expect("tick");
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!scheduler.is_cycle_running());
        assert_eq!(scheduler.tick().await.expect("tick"), TickOutcome::Started);
        assert_eq!(scheduler.stats().completed_cycles, 1);
        scheduler.drain().await.expect("drain");
    }

    #[tokio::test(start_paused = true)]
    async fn regression_failed_cycle_is_counted_and_runner_survives() {
        let probe = Probe::default();
        let mut scheduler = PollScheduler::new(slow_runner(&probe, true), Duration::from_millis(50));

        let error = scheduler.run_once().await.expect_err("cycle failure surfaces");
        assert!(error.to_string().contains("feed unavailable"));
        assert_eq!(scheduler.stats().failed_cycles, 1);
        assert_eq!(scheduler.stats().failure_streak, 1);

        assert_eq!(scheduler.tick().await.expect("tick"), TickOutcome::Started);
        scheduler.drain().await.expect("drain");
        assert_eq!(scheduler.stats().failure_streak, 2);
        assert_eq!(probe.cycles.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unit_run_once_succeeds_for_healthy_runner() {
        let probe = Probe::default();
        let mut scheduler = PollScheduler::new(slow_runner(&probe, false), Duration::from_secs(60));
        scheduler.run_once().await.expect("run once");
        assert_eq!(scheduler.stats().completed_cycles, 1);
        assert!(scheduler.stats().last_error.is_none());
    }
}

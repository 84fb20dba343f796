//! Fixed-cadence orchestration of ingestion runs.
//!
//! Runs fire at set wall-clock times in the site's home time zone. At most
//! one run is in flight at any moment; triggers that arrive while a run is
//! busy are dropped.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::app::{HarvestError, Result};
use crate::pipeline::{Harvester, RunReport};

/// Time zone the schedule is evaluated in, regardless of host locale.
pub const SCHEDULE_TZ: Tz = chrono_tz::America::Phoenix;

/// A wall-clock trigger time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub hour: u32,
    pub minute: u32,
}

impl ScheduleEntry {
    pub const fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }
}

pub const DEFAULT_SCHEDULE: [ScheduleEntry; 4] = [
    ScheduleEntry::new(6, 0),
    ScheduleEntry::new(10, 0),
    ScheduleEntry::new(14, 0),
    ScheduleEntry::new(18, 0),
];

/// Schedule entries compiled to cron expressions in a fixed time zone.
///
/// Entries sharing a minute collapse into one expression, so the default
/// schedule is the single expression `0 0 6,10,14,18 * * *`.
#[derive(Debug, Clone)]
pub struct TriggerSchedule {
    schedules: Vec<Schedule>,
    tz: Tz,
}

impl TriggerSchedule {
    pub fn new(entries: &[ScheduleEntry], tz: Tz) -> Result<Self> {
        let schedules = cron_expressions(entries)
            .iter()
            .map(|expr| {
                Schedule::from_str(expr).map_err(|e| {
                    HarvestError::Config(format!("Invalid schedule '{}': {}", expr, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { schedules, tz })
    }

    /// First trigger strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&self.tz);
        self.schedules
            .iter()
            .filter_map(|schedule| schedule.after(&local).next())
            .min()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }
}

/// Six-field cron expressions (`sec min hour dom month dow`), one per
/// distinct minute.
fn cron_expressions(entries: &[ScheduleEntry]) -> Vec<String> {
    let mut by_minute: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    for entry in entries {
        by_minute.entry(entry.minute).or_default().push(entry.hour);
    }

    by_minute
        .into_iter()
        .map(|(minute, mut hours)| {
            hours.sort_unstable();
            hours.dedup();
            let hours: Vec<String> = hours.iter().map(u32::to_string).collect();
            format!("0 {} {} * * *", minute, hours.join(","))
        })
        .collect()
}

/// Wall-clock source for the timer loop.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Admits one run at a time.
#[derive(Debug, Clone)]
pub struct RunGate {
    running: Arc<watch::Sender<bool>>,
}

/// Held for the duration of a run. Dropping it reopens the gate, also when
/// the run panics.
#[derive(Debug)]
pub struct RunPermit {
    running: Arc<watch::Sender<bool>>,
}

impl Default for RunGate {
    fn default() -> Self {
        let (running, _) = watch::channel(false);
        Self {
            running: Arc::new(running),
        }
    }
}

impl RunGate {
    pub fn try_acquire(&self) -> Option<RunPermit> {
        let acquired = self.running.send_if_modified(|running| {
            if *running {
                false
            } else {
                *running = true;
                true
            }
        });

        acquired.then(|| RunPermit {
            running: self.running.clone(),
        })
    }

    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    /// Resolves once no permit is held.
    pub async fn wait_idle(&self) {
        let mut state = self.running.subscribe();
        let _ = state.wait_for(|running| !*running).await;
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.running.send_replace(false);
    }
}

/// The part of the scheduler shared with the timer task.
#[derive(Clone)]
struct Runner {
    harvester: Arc<Harvester>,
    gate: RunGate,
}

impl Runner {
    fn trigger(&self) -> Option<JoinHandle<usize>> {
        let Some(permit) = self.gate.try_acquire() else {
            tracing::info!("Harvest already running, skipping trigger");
            return None;
        };

        let harvester = self.harvester.clone();
        Some(tokio::spawn(async move {
            let _permit = permit;
            let run = tokio::spawn(async move { harvester.run_once().await });

            match run.await {
                Ok(Ok(report)) => {
                    tracing::info!("Scheduled harvest added {} new jobs", report.new_records);
                    report.new_records
                }
                Ok(Err(e)) => {
                    tracing::error!("Scheduled harvest failed: {}", e);
                    0
                }
                Err(e) => {
                    tracing::error!("Scheduled harvest aborted: {}", e);
                    0
                }
            }
        }))
    }
}

struct Timer {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

pub struct Scheduler {
    runner: Runner,
    schedule: TriggerSchedule,
    clock: Arc<dyn Clock>,
    timer: Option<Timer>,
}

impl Scheduler {
    pub fn new(harvester: Arc<Harvester>) -> Result<Self> {
        let schedule = TriggerSchedule::new(&DEFAULT_SCHEDULE, SCHEDULE_TZ)?;
        Ok(Self::with_schedule(harvester, schedule, Arc::new(SystemClock)))
    }

    pub fn with_schedule(
        harvester: Arc<Harvester>,
        schedule: TriggerSchedule,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            runner: Runner {
                harvester,
                gate: RunGate::default(),
            },
            schedule,
            clock,
            timer: None,
        }
    }

    /// Spawn the timer task. Calling it again while started does nothing.
    ///
    /// Each trigger is computed strictly after the previous one, so a slot
    /// fires at most once even if the wall clock lags the timer.
    pub fn start(&mut self) {
        if self.timer.is_some() {
            return;
        }

        let (shutdown, mut stopped) = watch::channel(false);
        let runner = self.runner.clone();
        let schedule = self.schedule.clone();
        let clock = self.clock.clone();
        let mut last = clock.now();

        let handle = tokio::spawn(async move {
            loop {
                let Some(next) = schedule.next_after(last) else {
                    tracing::warn!("Schedule has no upcoming trigger, timer stopped");
                    break;
                };
                tracing::info!("Next harvest at {}", next.with_timezone(&schedule.tz()));

                let wait = (next - clock.now()).to_std().unwrap_or(Duration::ZERO);
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        runner.trigger();
                        // Slots missed while suspended are skipped, not replayed
                        last = next.max(clock.now());
                    }
                    _ = stopped.changed() => break,
                }
            }
        });

        self.timer = Some(Timer { handle, shutdown });
    }

    /// Fire a run in the background unless one is already in flight.
    ///
    /// The handle resolves to the number of new records; failures and panics
    /// are logged and count as zero.
    pub fn trigger(&self) -> Option<JoinHandle<usize>> {
        self.runner.trigger()
    }

    /// Run immediately and wait for the outcome.
    pub async fn run_now(&self) -> Result<RunReport> {
        let _permit = self
            .runner
            .gate
            .try_acquire()
            .ok_or(HarvestError::RunInProgress)?;
        self.runner.harvester.run_once().await
    }

    pub fn is_running(&self) -> bool {
        self.runner.gate.is_running()
    }

    /// End the timer loop, then wait for an in-flight run to finish.
    pub async fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            let _ = timer.shutdown.send(true);
            if let Err(e) = timer.handle.await {
                tracing::warn!("Scheduler timer ended abnormally: {}", e);
            }
        }

        if self.is_running() {
            tracing::info!("Waiting for in-flight harvest to finish");
            self.runner.gate.wait_idle().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;

    use crate::fetcher::Fetcher;
    use crate::pipeline::{PipelineConfig, SiteConfig};
    use crate::store::SqliteStore;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn default_schedule() -> TriggerSchedule {
        TriggerSchedule::new(&DEFAULT_SCHEDULE, SCHEDULE_TZ).unwrap()
    }

    #[test]
    fn test_default_schedule_is_one_expression() {
        assert_eq!(
            cron_expressions(&DEFAULT_SCHEDULE),
            vec!["0 0 6,10,14,18 * * *".to_string()]
        );
    }

    #[test]
    fn test_entries_with_different_minutes() {
        let entries = [
            ScheduleEntry::new(18, 30),
            ScheduleEntry::new(6, 0),
            ScheduleEntry::new(7, 30),
        ];
        assert_eq!(
            cron_expressions(&entries),
            vec!["0 0 6 * * *".to_string(), "0 30 7,18 * * *".to_string()]
        );

        let schedule = TriggerSchedule::new(&entries, SCHEDULE_TZ).unwrap();
        // 06:10 in Phoenix
        assert_eq!(
            schedule.next_after(utc(2025, 3, 10, 13, 10)),
            Some(utc(2025, 3, 10, 14, 30))
        );
    }

    #[test]
    fn test_next_trigger_same_day() {
        // 08:00 in Phoenix (UTC-7)
        let next = default_schedule().next_after(utc(2025, 3, 10, 15, 0));
        assert_eq!(next, Some(utc(2025, 3, 10, 17, 0)));
    }

    #[test]
    fn test_next_trigger_rolls_over_to_next_morning() {
        // 19:30 in Phoenix
        let next = default_schedule().next_after(utc(2025, 3, 11, 2, 30));
        assert_eq!(next, Some(utc(2025, 3, 11, 13, 0)));
    }

    #[test]
    fn test_next_trigger_is_strictly_after() {
        // Exactly 14:00 in Phoenix
        let next = default_schedule().next_after(utc(2025, 7, 1, 21, 0));
        assert_eq!(next, Some(utc(2025, 7, 2, 1, 0)));
    }

    #[test]
    fn test_next_trigger_ignores_dst() {
        // Phoenix stays at UTC-7 through summer
        let schedule = default_schedule();
        assert_eq!(
            schedule.next_after(utc(2025, 1, 15, 12, 0)),
            Some(utc(2025, 1, 15, 13, 0))
        );
        assert_eq!(
            schedule.next_after(utc(2025, 7, 15, 12, 0)),
            Some(utc(2025, 7, 15, 13, 0))
        );
    }

    #[test]
    fn test_empty_schedule_never_fires() {
        let schedule = TriggerSchedule::new(&[], SCHEDULE_TZ).unwrap();
        assert_eq!(schedule.next_after(Utc::now()), None);
    }

    #[test]
    fn test_out_of_range_entry_is_rejected() {
        let result = TriggerSchedule::new(&[ScheduleEntry::new(25, 0)], SCHEDULE_TZ);
        assert!(matches!(result, Err(HarvestError::Config(_))));
    }

    #[test]
    fn test_gate_admits_one_permit() {
        let gate = RunGate::default();
        let permit = gate.try_acquire().unwrap();
        assert!(gate.is_running());
        assert!(gate.try_acquire().is_none());

        drop(permit);
        assert!(!gate.is_running());
        assert!(gate.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_wait_idle_resolves_when_permit_drops() {
        let gate = RunGate::default();
        let permit = gate.try_acquire().unwrap();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait_idle().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(permit);
        waiter.await.unwrap();
        assert!(!gate.is_running());
    }

    /// Wall clock anchored at `origin` that advances with tokio time,
    /// scaled by `rate_permille`.
    struct TestClock {
        origin: DateTime<Utc>,
        started: tokio::time::Instant,
        rate_permille: i64,
    }

    impl TestClock {
        fn at(origin: DateTime<Utc>) -> Self {
            Self::with_rate(origin, 1000)
        }

        fn with_rate(origin: DateTime<Utc>, rate_permille: i64) -> Self {
            Self {
                origin,
                started: tokio::time::Instant::now(),
                rate_permille,
            }
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> DateTime<Utc> {
            let elapsed = self.started.elapsed().as_millis() as i64;
            self.origin + chrono::Duration::milliseconds(elapsed * self.rate_permille / 1000)
        }
    }

    /// Listing fetch that takes a while and counts calls.
    struct SlowSite {
        calls: AtomicUsize,
        delay: Duration,
    }

    impl SlowSite {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for SlowSite {
        async fn fetch(&self, _url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok("<table><tbody></tbody></table>".to_string())
        }
    }

    fn slow_site() -> Arc<SlowSite> {
        Arc::new(SlowSite {
            calls: AtomicUsize::new(0),
            delay: Duration::from_secs(10),
        })
    }

    fn harvester(fetcher: Arc<dyn Fetcher>) -> Arc<Harvester> {
        Arc::new(
            Harvester::new(
                Arc::new(SqliteStore::in_memory().unwrap()),
                fetcher,
                &SiteConfig::default(),
                &PipelineConfig::default(),
            )
            .unwrap(),
        )
    }

    fn scheduler(site: Arc<SlowSite>) -> Scheduler {
        Scheduler::new(harvester(site)).unwrap()
    }

    fn scheduler_with_clock(site: Arc<SlowSite>, clock: TestClock) -> Scheduler {
        Scheduler::with_schedule(harvester(site), default_schedule(), Arc::new(clock))
    }

    // 05:00 in Phoenix
    fn five_am() -> DateTime<Utc> {
        utc(2025, 3, 10, 12, 0)
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_at_first_slot() {
        let site = slow_site();
        let mut scheduler = scheduler_with_clock(site.clone(), TestClock::at(five_am()));

        scheduler.start();
        tokio::time::sleep(Duration::from_secs(59 * 60)).await;
        assert_eq!(site.calls(), 0);

        tokio::time::sleep(Duration::from_secs(2 * 60)).await;
        assert_eq!(site.calls(), 1);

        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_once_per_slot() {
        let site = slow_site();
        let mut scheduler = scheduler_with_clock(site.clone(), TestClock::at(five_am()));

        scheduler.start();
        // Through 06:00 and 10:00, short of 14:00
        tokio::time::sleep(Duration::from_secs(5 * 3600 + 60)).await;
        assert_eq!(site.calls(), 2);

        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_lagging_wall_clock_does_not_refire_slot() {
        let site = slow_site();
        // Wall clock runs at 90% speed, so the timer wakes before 06:00
        let clock = TestClock::with_rate(five_am(), 900);
        let mut scheduler = scheduler_with_clock(site.clone(), clock);

        scheduler.start();
        tokio::time::sleep(Duration::from_secs(2 * 3600)).await;
        assert_eq!(site.calls(), 1);

        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_during_run_is_dropped() {
        let site = slow_site();
        let scheduler = scheduler(site.clone());

        let first = scheduler.trigger().unwrap();
        assert!(scheduler.trigger().is_none());

        assert_eq!(first.await.unwrap(), 0);
        assert_eq!(site.calls(), 1);
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_now_rejected_while_busy() {
        let site = slow_site();
        let scheduler = scheduler(site.clone());

        let background = scheduler.trigger().unwrap();
        let result = scheduler.run_now().await;
        assert!(matches!(result, Err(HarvestError::RunInProgress)));

        background.await.unwrap();
        let report = scheduler.run_now().await.unwrap();
        assert_eq!(report.new_records, 0);
        assert_eq!(site.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_in_flight_run() {
        let site = slow_site();
        let mut scheduler = scheduler(site.clone());

        scheduler.start();
        let run = scheduler.trigger().unwrap();
        scheduler.stop().await;

        assert!(!scheduler.is_running());
        assert!(run.is_finished());
        assert!(scheduler.timer.is_none());
    }

    struct PanickingSite;

    #[async_trait]
    impl Fetcher for PanickingSite {
        async fn fetch(&self, _url: &str) -> Result<String> {
            panic!("fetcher exploded");
        }
    }

    #[tokio::test]
    async fn test_panicking_run_releases_gate() {
        let scheduler = Scheduler::new(harvester(Arc::new(PanickingSite))).unwrap();

        let handle = scheduler.trigger().unwrap();
        assert_eq!(handle.await.unwrap(), 0);
        assert!(!scheduler.is_running());
    }
}

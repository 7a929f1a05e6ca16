//! Build scheduling.
//!
//! At most `concurrency` builds run at once, and never two for the same
//! entry. An invalidation that arrives while its entry is building is parked
//! and runs right after; further invalidations before that collapse into the
//! parked one.
//!
//! Every finished build goes through [`Scheduler::report`], which publishes
//! its `compile` or `error` event and counts initial builds. Once the count
//! reaches the number of entries discovered at startup, the `build` event is
//! published, exactly once.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::{Semaphore, watch};
use tracing::{debug, trace};

use crate::entry::{Entry, EntryId};
use crate::error::EntryError;
use crate::events::{Emitter, PipelineEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BuildReason {
    /// First build after discovery; counts toward the `build` event.
    Initial,
    /// A dependency changed.
    Invalidated,
}

#[derive(Debug, Clone)]
pub(crate) struct BuildTask {
    pub entry: Arc<Entry>,
    pub reason: BuildReason,
}

impl BuildTask {
    pub fn initial(entry: Arc<Entry>) -> Self {
        Self {
            entry,
            reason: BuildReason::Initial,
        }
    }

    pub fn invalidated(entry: Arc<Entry>) -> Self {
        Self {
            entry,
            reason: BuildReason::Invalidated,
        }
    }
}

/// Performs one build of one entry.
#[async_trait]
pub(crate) trait TaskRunner: Send + Sync + 'static {
    async fn run(&self, task: &BuildTask) -> Result<(), EntryError>;
}

/// What [`Scheduler::submit`] did with a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Submitted {
    /// A worker picked it up.
    Started,
    /// The entry is building; the task runs when that build ends.
    Queued,
    /// An identical follow-up was already queued.
    Coalesced,
}

#[derive(Debug, Default)]
struct Slot {
    running: bool,
    pending: Option<BuildReason>,
}

#[derive(Debug, Default)]
struct Tally {
    expected: Option<usize>,
    completed: usize,
    files: Vec<PathBuf>,
    fired: bool,
}

struct Inner {
    runner: Arc<dyn TaskRunner>,
    permits: Semaphore,
    slots: Mutex<FxHashMap<EntryId, Slot>>,
    tally: Mutex<Tally>,
    emitter: Emitter,
    active: watch::Sender<usize>,
    initial_done: watch::Sender<bool>,
}

#[derive(Clone)]
pub(crate) struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(runner: Arc<dyn TaskRunner>, concurrency: usize, emitter: Emitter) -> Self {
        let (active, _) = watch::channel(0);
        let (initial_done, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                runner,
                permits: Semaphore::new(concurrency.max(1)),
                slots: Mutex::new(FxHashMap::default()),
                tally: Mutex::new(Tally::default()),
                emitter,
                active,
                initial_done,
            }),
        }
    }

    /// Arm the `build` event for the entries found at startup. With no
    /// entries it fires immediately.
    pub fn begin_initial(&self, files: Vec<PathBuf>) {
        let mut tally = self.inner.tally.lock();
        tally.expected = Some(files.len());
        tally.files = files;
        self.inner.fire_if_complete(&mut tally);
    }

    pub fn submit(&self, task: BuildTask) -> Submitted {
        let id = task.entry.id();
        {
            let mut slots = self.inner.slots.lock();
            let slot = slots.entry(id).or_default();
            if slot.running {
                return match slot.pending {
                    Some(_) => {
                        trace!(entry = %task.entry.input().display(), "rebuild already queued");
                        Submitted::Coalesced
                    }
                    None => {
                        slot.pending = Some(task.reason);
                        Submitted::Queued
                    }
                };
            }
            slot.running = true;
        }

        self.inner.active.send_modify(|active| *active += 1);
        tokio::spawn(Inner::drive(Arc::clone(&self.inner), task));
        Submitted::Started
    }

    /// Whether a follow-up build for `id` is already parked.
    pub fn has_pending(&self, id: EntryId) -> bool {
        self.inner
            .slots
            .lock()
            .get(&id)
            .is_some_and(|slot| slot.pending.is_some())
    }

    /// Record a finished build. Also used for entries that failed before
    /// they could be scheduled.
    pub fn report(&self, task: &BuildTask, duration: Duration, outcome: Result<(), EntryError>) {
        self.inner.report(task, duration, outcome);
    }

    pub fn initial_done(&self) -> watch::Receiver<bool> {
        self.inner.initial_done.subscribe()
    }

    /// Wait until no build is running or parked.
    pub async fn wait_idle(&self) {
        let mut active = self.inner.active.subscribe();
        let _ = active.wait_for(|active| *active == 0).await;
    }
}

impl Inner {
    async fn drive(self: Arc<Self>, mut task: BuildTask) {
        let id = task.entry.id();
        loop {
            let (duration, outcome) = {
                let _permit = self
                    .permits
                    .acquire()
                    .await
                    .expect("semaphore closed unexpectedly");
                let started = Instant::now();
                let runner = Arc::clone(&self.runner);
                let run_task = task.clone();
                let outcome = match tokio::spawn(async move { runner.run(&run_task).await }).await {
                    Ok(outcome) => outcome,
                    // Task panicked - convert to error
                    Err(join_err) => Err(EntryError::Panicked(join_err.to_string())),
                };
                (started.elapsed(), outcome)
            };
            self.report(&task, duration, outcome);

            let next = {
                let mut slots = self.slots.lock();
                let slot = slots.entry(id).or_default();
                let next = slot.pending.take();
                if next.is_none() {
                    slot.running = false;
                }
                next
            };
            match next {
                Some(reason) => task.reason = reason,
                None => break,
            }
        }
        self.active.send_modify(|active| *active -= 1);
    }

    fn report(&self, task: &BuildTask, duration: Duration, outcome: Result<(), EntryError>) {
        let entry = &task.entry;
        let event = match outcome {
            Ok(()) => PipelineEvent::Compile {
                entry: entry.input().to_path_buf(),
                output: entry.output().to_path_buf(),
                duration,
            },
            Err(error) => PipelineEvent::Error {
                entry: entry.input().to_path_buf(),
                stage: error.stage(),
                error: Arc::new(error),
            },
        };

        // Held across the emit so `build` can never overtake a `compile`.
        let mut tally = self.tally.lock();
        self.emitter.emit(event);
        if task.reason == BuildReason::Initial {
            tally.completed += 1;
            self.fire_if_complete(&mut tally);
        }
    }

    fn fire_if_complete(&self, tally: &mut Tally) {
        if tally.fired || tally.expected != Some(tally.completed) {
            return;
        }
        tally.fired = true;
        debug!(entries = tally.completed, "initial build complete");
        self.emitter.emit(PipelineEvent::Build {
            files: std::mem::take(&mut tally.files),
        });
        self.initial_done.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::SilentLogger;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    /// Runner that sleeps and records concurrency.
    #[derive(Default)]
    struct CountingRunner {
        running: AtomicUsize,
        peak: AtomicUsize,
        per_entry: Mutex<FxHashMap<EntryId, usize>>,
        per_entry_peak: AtomicUsize,
        runs: AtomicUsize,
        fail_ids: Vec<usize>,
    }

    #[async_trait]
    impl TaskRunner for CountingRunner {
        async fn run(&self, task: &BuildTask) -> Result<(), EntryError> {
            let id = task.entry.id();
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            {
                let mut per_entry = self.per_entry.lock();
                let count = per_entry.entry(id).or_default();
                *count += 1;
                self.per_entry_peak.fetch_max(*count, Ordering::SeqCst);
            }

            tokio::time::sleep(Duration::from_millis(20)).await;

            *self.per_entry.lock().entry(id).or_default() -= 1;
            self.running.fetch_sub(1, Ordering::SeqCst);
            self.runs.fetch_add(1, Ordering::SeqCst);

            if self.fail_ids.contains(&id.index()) {
                Err(EntryError::Panicked("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn entries(n: usize) -> Vec<Arc<Entry>> {
        (0..n)
            .map(|i| {
                Arc::new(Entry::new(
                    EntryId::new(i),
                    format!("/src/{i}/main.js"),
                    format!("/dist/{i}/main.js"),
                ))
            })
            .collect()
    }

    fn scheduler(runner: Arc<CountingRunner>, concurrency: usize) -> (Scheduler, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (emitter, rx) = Emitter::new(Arc::new(SilentLogger));
        (Scheduler::new(runner, concurrency, emitter), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<PipelineEvent>) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn run_initial(scheduler: &Scheduler, entries: &[Arc<Entry>]) {
        scheduler.begin_initial(entries.iter().map(|e| e.input().to_path_buf()).collect());
        for entry in entries {
            scheduler.submit(BuildTask::initial(Arc::clone(entry)));
        }
        let mut done = scheduler.initial_done();
        done.wait_for(|done| *done).await.unwrap();
        scheduler.wait_idle().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_limit_is_respected() {
        let runner = Arc::new(CountingRunner::default());
        let (scheduler, mut rx) = scheduler(Arc::clone(&runner), 2);
        let entries = entries(6);

        run_initial(&scheduler, &entries).await;

        assert!(runner.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(runner.runs.load(Ordering::SeqCst), 6);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 7);
        assert!(events[..6].iter().all(|e| matches!(e, PipelineEvent::Compile { .. })));
        assert!(matches!(&events[6], PipelineEvent::Build { files } if files.len() == 6));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failures_count_toward_build() {
        let runner = Arc::new(CountingRunner {
            fail_ids: vec![1],
            ..Default::default()
        });
        let (scheduler, mut rx) = scheduler(runner, 4);
        let entries = entries(3);

        run_initial(&scheduler, &entries).await;

        let events = drain(&mut rx);
        let errors = events
            .iter()
            .filter(|e| matches!(e, PipelineEvent::Error { .. }))
            .count();
        let compiles = events
            .iter()
            .filter(|e| matches!(e, PipelineEvent::Compile { .. }))
            .count();
        assert_eq!((errors, compiles), (1, 2));
        assert!(matches!(events.last(), Some(PipelineEvent::Build { .. })));
    }

    #[tokio::test]
    async fn test_no_entries_fires_build_immediately() {
        let (scheduler, mut rx) = scheduler(Arc::new(CountingRunner::default()), 1);
        scheduler.begin_initial(Vec::new());

        assert!(*scheduler.initial_done().borrow());
        let events = drain(&mut rx);
        assert!(matches!(events.as_slice(), [PipelineEvent::Build { files }] if files.is_empty()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_rebuilds_of_one_entry_never_overlap_and_coalesce() {
        let runner = Arc::new(CountingRunner::default());
        let (scheduler, mut rx) = scheduler(Arc::clone(&runner), 4);
        let entries = entries(1);
        run_initial(&scheduler, &entries).await;
        drain(&mut rx);

        let first = scheduler.submit(BuildTask::invalidated(Arc::clone(&entries[0])));
        let second = scheduler.submit(BuildTask::invalidated(Arc::clone(&entries[0])));
        let third = scheduler.submit(BuildTask::invalidated(Arc::clone(&entries[0])));
        assert_eq!(first, Submitted::Started);
        assert_eq!(second, Submitted::Queued);
        assert_eq!(third, Submitted::Coalesced);
        assert!(scheduler.has_pending(entries[0].id()));

        scheduler.wait_idle().await;
        assert_eq!(runner.per_entry_peak.load(Ordering::SeqCst), 1);
        // initial + started + queued
        assert_eq!(runner.runs.load(Ordering::SeqCst), 3);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| matches!(e, PipelineEvent::Compile { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_report_counts_unscheduled_failures() {
        let (scheduler, mut rx) = scheduler(Arc::new(CountingRunner::default()), 1);
        let entries = entries(2);
        scheduler.begin_initial(entries.iter().map(|e| e.input().to_path_buf()).collect());

        scheduler.report(
            &BuildTask::initial(Arc::clone(&entries[0])),
            Duration::ZERO,
            Err(EntryError::Panicked("bundler unavailable".to_string())),
        );
        assert!(!*scheduler.initial_done().borrow());

        scheduler.submit(BuildTask::initial(Arc::clone(&entries[1])));
        scheduler
            .initial_done()
            .wait_for(|done| *done)
            .await
            .unwrap();

        let events = drain(&mut rx);
        assert!(matches!(events[0], PipelineEvent::Error { .. }));
        assert!(matches!(events[1], PipelineEvent::Compile { .. }));
        assert!(matches!(events[2], PipelineEvent::Build { .. }));
    }
}

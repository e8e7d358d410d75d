//! Worker group membership and synchronization.
//!
//! The pipeline runs as a group of independent workers, one per rank, that
//! share nothing but the output file. The group is synchronized at exactly
//! two points, after output creation and before close; a fatal error in any
//! worker aborts the whole group instead of leaving the others waiting.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::{Error, Result};

pub trait WorkerGroup {
    fn rank(&self) -> usize;
    fn worker_count(&self) -> usize;

    /// Blocks until every member of the group has arrived, or fails when the
    /// group has been aborted.
    fn barrier(&self) -> Result<()>;

    /// Marks the group as failed so that members blocked in [`Self::barrier`]
    /// wake up with an error.
    fn abort(&self);
}

/// Trivial group for single worker runs; barriers are no-ops.
pub struct SoloGroup;

impl WorkerGroup for SoloGroup {
    fn rank(&self) -> usize {
        0
    }

    fn worker_count(&self) -> usize {
        1
    }

    fn barrier(&self) -> Result<()> {
        Ok(())
    }

    fn abort(&self) {}
}

struct BarrierState {
    arrived: usize,
    generation: u64,
    aborted: bool,
}

/// Reusable barrier that can be torn down: aborting releases current and
/// future waiters with an error. The standard library barrier would leave the
/// surviving workers blocked forever when one of them dies.
struct AbortableBarrier {
    state: Mutex<BarrierState>,
    condvar: Condvar,
    participants: usize,
}

impl AbortableBarrier {
    fn new(participants: usize) -> Self {
        AbortableBarrier {
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                aborted: false,
            }),
            condvar: Condvar::new(),
            participants,
        }
    }

    fn wait(&self) -> Result<()> {
        let mut state = self.state.lock().expect("barrier mutex poisoned");
        if state.aborted {
            return Err(Error::Runtime("Worker group aborted".into()));
        }

        state.arrived += 1;
        if state.arrived == self.participants {
            state.arrived = 0;
            state.generation += 1;
            self.condvar.notify_all();
            return Ok(());
        }

        let generation = state.generation;
        while state.generation == generation && !state.aborted {
            state = self.condvar.wait(state).expect("barrier mutex poisoned");
        }

        if state.aborted {
            return Err(Error::Runtime("Worker group aborted".into()));
        }
        Ok(())
    }

    fn abort(&self) {
        let mut state = self.state.lock().expect("barrier mutex poisoned");
        state.aborted = true;
        self.condvar.notify_all();
    }
}

/// In-process worker group: every rank runs on its own thread with its own
/// file handles and projection handles, synchronized over a shared barrier.
pub struct ThreadGroup {
    rank: usize,
    worker_count: usize,
    barrier: Arc<AbortableBarrier>,
}

impl ThreadGroup {
    /// Creates the group handles for `worker_count` ranks.
    pub fn split(worker_count: usize) -> Vec<ThreadGroup> {
        assert!(worker_count > 0);
        let barrier = Arc::new(AbortableBarrier::new(worker_count));

        (0..worker_count)
            .map(|rank| ThreadGroup {
                rank,
                worker_count,
                barrier: Arc::clone(&barrier),
            })
            .collect()
    }
}

impl WorkerGroup for ThreadGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn worker_count(&self) -> usize {
        self.worker_count
    }

    fn barrier(&self) -> Result<()> {
        self.barrier.wait()
    }

    fn abort(&self) {
        self.barrier.abort();
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(25);
/// Grace period between the last barrier file appearing and directory
/// cleanup; every waiter leaves its poll loop within one poll interval.
const FINALIZE_GRACE: Duration = Duration::from_millis(250);

/// Worker group for separate processes started by an external launcher.
/// Barriers are sentinel files in a shared directory next to the output file:
/// each rank announces its arrival with a per-generation file and polls until
/// the whole group has arrived. An aborting rank leaves an abort sentinel
/// that fails the barrier for everyone else.
pub struct FsGroup {
    rank: usize,
    worker_count: usize,
    dir: PathBuf,
    generation: AtomicU32,
    aborted: AtomicBool,
    timeout: Duration,
}

impl FsGroup {
    pub fn new(rank: usize, worker_count: usize, dir: &Path) -> Result<Self> {
        Self::with_timeout(rank, worker_count, dir, Duration::from_secs(600))
    }

    pub fn with_timeout(rank: usize, worker_count: usize, dir: &Path, timeout: Duration) -> Result<Self> {
        if worker_count == 0 || rank >= worker_count {
            return Err(Error::InvalidArgument(format!(
                "Invalid rank {rank} for a group of {worker_count} workers"
            )));
        }

        if rank == 0 {
            if dir.exists() {
                return Err(Error::InvalidArgument(format!(
                    "Synchronization directory {} already exists; remove leftovers of a previous run first",
                    dir.display()
                )));
            }
            std::fs::create_dir_all(dir)?;
        }

        Ok(FsGroup {
            rank,
            worker_count,
            dir: dir.to_path_buf(),
            generation: AtomicU32::new(0),
            aborted: AtomicBool::new(false),
            timeout,
        })
    }

    fn sentinel(&self, generation: u32, rank: usize) -> PathBuf {
        self.dir.join(format!("barrier-{generation}.rank-{rank}"))
    }

    fn abort_sentinel(&self, rank: usize) -> PathBuf {
        self.dir.join(format!("abort.rank-{rank}"))
    }

    fn group_aborted(&self) -> bool {
        (0..self.worker_count).any(|rank| self.abort_sentinel(rank).exists())
    }

    /// Removes the synchronization directory. Only rank 0 calls this, after
    /// the final barrier has been passed.
    pub fn finalize(&self) -> Result<()> {
        if self.rank == 0 {
            std::thread::sleep(FINALIZE_GRACE);
            std::fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }
}

impl WorkerGroup for FsGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn worker_count(&self) -> usize {
        self.worker_count
    }

    fn barrier(&self) -> Result<()> {
        if self.aborted.load(Ordering::SeqCst) {
            return Err(Error::Runtime("Worker group aborted".into()));
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst);

        // The directory is created by rank 0; later ranks may arrive first.
        let started = Instant::now();
        while !self.dir.exists() {
            if started.elapsed() > self.timeout {
                return Err(Error::Runtime(format!(
                    "Timed out waiting for synchronization directory {}",
                    self.dir.display()
                )));
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        std::fs::write(self.sentinel(generation, self.rank), b"")?;

        loop {
            if self.group_aborted() {
                return Err(Error::Runtime("Worker group aborted".into()));
            }

            let arrived = (0..self.worker_count)
                .filter(|&rank| self.sentinel(generation, rank).exists())
                .count();
            if arrived == self.worker_count {
                return Ok(());
            }

            if started.elapsed() > self.timeout {
                return Err(Error::Runtime(format!(
                    "Timed out at barrier generation {generation}: {arrived}/{} workers arrived",
                    self.worker_count
                )));
            }

            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        if self.dir.exists() {
            let _ = std::fs::write(self.abort_sentinel(self.rank), b"");
        }
    }
}

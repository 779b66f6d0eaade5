use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use crate::logging::GridLogger;

/// Position of a core inside a launch, handed to the kernel of every core.
///
/// The equivalent of `CUBE_POS` / `CUBE_COUNT` for a grid of cooperating cores, with a
/// barrier that spans the whole grid rather than a single cube.
pub struct CoreContext<'a> {
    core_idx: usize,
    core_num: usize,
    barrier: &'a GridBarrier,
    logger: &'a GridLogger,
}

impl CoreContext<'_> {
    /// Index of the current core, in `0..core_num`.
    pub fn core_idx(&self) -> usize {
        self.core_idx
    }

    /// Number of cores of the launch.
    pub fn core_num(&self) -> usize {
        self.core_num
    }

    /// Whether the current core has the highest index of the launch.
    pub fn is_last(&self) -> bool {
        self.core_idx + 1 == self.core_num
    }

    /// Blocks until every core of the launch reached this point.
    ///
    /// All global memory and workspace writes issued before the barrier by any core are
    /// visible to every core after it.
    ///
    /// # Panics
    /// Panics if another core of the launch panicked, before or while waiting.
    pub fn sync_all(&self) {
        self.barrier.wait();
    }

    /// Logs a phase transition of the current core.
    pub fn log_phase(&self, phase: &str, window: usize) {
        self.logger.log_phase(self.core_idx, phase, window);
    }
}

/// Launches kernels on a fixed number of cooperating cores.
#[derive(Debug, Default)]
pub struct CoreGrid {
    logger: GridLogger,
}

impl CoreGrid {
    /// Creates a grid logging according to the global configuration.
    pub fn new() -> Self {
        Self {
            logger: GridLogger::new(),
        }
    }

    /// Creates a grid with an explicit logger.
    pub fn with_logger(logger: GridLogger) -> Self {
        Self { logger }
    }

    /// Runs `kernel` once on each of `core_count` cores and returns when all of them returned.
    ///
    /// A panic on any core is propagated to the caller once every core stopped.
    pub fn launch<K>(&self, name: &str, core_count: usize, kernel: K)
    where
        K: Fn(&CoreContext<'_>) + Sync,
    {
        if core_count == 0 {
            return;
        }

        self.logger.log_launch(name, core_count);
        let barrier = GridBarrier::new(core_count);

        thread::scope(|scope| {
            for core_idx in 0..core_count {
                let context = CoreContext {
                    core_idx,
                    core_num: core_count,
                    barrier: &barrier,
                    logger: &self.logger,
                };
                let kernel = &kernel;
                let barrier = &barrier;

                thread::Builder::new()
                    .name(format!("{name}-core-{core_idx}"))
                    .spawn_scoped(scope, move || {
                        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| kernel(&context))) {
                            barrier.fault();
                            resume_unwind(payload);
                        }
                    })
                    .unwrap_or_else(|err| {
                        barrier.fault();
                        panic!("Can't spawn core {core_idx}: {err}")
                    });
            }
        });
    }
}

#[derive(Debug, Default)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    faulted: bool,
}

/// Barrier over every core of a launch. Once a core faults, every waiting or arriving core
/// panics instead of blocking.
#[derive(Debug)]
struct GridBarrier {
    core_count: usize,
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl GridBarrier {
    fn new(core_count: usize) -> Self {
        Self {
            core_count,
            state: Mutex::new(BarrierState::default()),
            released: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BarrierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait(&self) {
        let mut state = self.lock();
        if !state.faulted {
            let generation = state.generation;
            state.arrived += 1;

            if state.arrived == self.core_count {
                state.arrived = 0;
                state.generation += 1;
                self.released.notify_all();
            } else {
                while state.generation == generation && !state.faulted {
                    state = self
                        .released
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }

            if state.generation != generation {
                return;
            }
        }

        drop(state);
        panic!("A core of the launch faulted, the grid barrier can't be reached");
    }

    fn fault(&self) {
        self.lock().faulted = true;
        self.released.notify_all();
    }
}

use std::panic::catch_unwind;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use cubecl_grid::config::KernelLogLevel;
use cubecl_grid::logging::GridLogger;
use cubecl_grid::{COUNTER_SIZE, CoreContext, CoreGrid, GlobalMemory, ScratchPipeline, Workspace};
use pretty_assertions::assert_eq;

#[test_log::test]
fn every_core_runs_once() {
    let grid = CoreGrid::new();
    let visits = (0..6).map(|_| AtomicUsize::new(0)).collect::<Vec<_>>();

    grid.launch("visit", 6, |core| {
        assert_eq!(core.core_num(), 6);
        visits[core.core_idx()].fetch_add(1, Ordering::Relaxed);
    });

    for visit in visits {
        assert_eq!(visit.into_inner(), 1);
    }
}

#[test_log::test]
fn barrier_publishes_workspace_stores() {
    let grid = CoreGrid::new();
    let cores = 8;
    let workspace = Workspace::new(cores * COUNTER_SIZE, 1);
    let sums = Mutex::new(vec![0; cores]);

    grid.launch("prefix", cores, |core| {
        workspace.store_region(core.core_idx(), &[core.core_idx() as u64 + 1]);
        core.sync_all();

        let lower = (0..core.core_idx())
            .map(|other| workspace.load(other, 0))
            .sum::<u64>();
        sums.lock().unwrap()[core.core_idx()] = lower;
    });

    assert_eq!(sums.into_inner().unwrap(), vec![0, 1, 3, 6, 10, 15, 21, 28]);
}

#[test_log::test]
fn only_last_core_is_last() {
    let grid = CoreGrid::new();
    let last = AtomicUsize::new(usize::MAX);

    grid.launch("last", 5, |core| {
        if core.is_last() {
            last.store(core.core_idx(), Ordering::Relaxed);
        }
    });

    assert_eq!(last.into_inner(), 4);
}

#[test_log::test]
fn cores_write_disjoint_ranges() {
    let grid = CoreGrid::new();
    let memory = GlobalMemory::zeros(4 * 3);

    grid.launch("fill", 4, |core| {
        let value = core.core_idx() as u8 + 1;
        // SAFETY: each core owns three bytes.
        unsafe {
            memory.write(core.core_idx() * 3, &[value; 3]);
        }
    });

    assert_eq!(
        memory.into_bytes(),
        vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4]
    );
}

#[test_log::test]
fn pipeline_preserves_job_order() {
    let mut pipeline = ScratchPipeline::new(|| Vec::<usize>::with_capacity(4));
    let mut consumed = Vec::new();

    pipeline.run(
        0..100usize,
        |job, slot| {
            slot.clear();
            slot.extend([*job; 4]);
        },
        |job, slot| {
            assert_eq!(slot.as_slice(), &[*job; 4]);
            consumed.push(*job);
        },
    );

    assert_eq!(consumed, (0..100).collect::<Vec<_>>());
}

#[test_log::test]
fn pipeline_has_at_most_two_jobs_in_flight() {
    let mut pipeline = ScratchPipeline::new(|| 0usize);
    let in_flight = AtomicUsize::new(0);
    let max_in_flight = AtomicUsize::new(0);

    pipeline.run(
        0..64usize,
        |job, slot| {
            let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            max_in_flight.fetch_max(current, Ordering::SeqCst);
            *slot = *job;
        },
        |job, slot| {
            assert_eq!(job, slot);
            in_flight.fetch_sub(1, Ordering::SeqCst);
        },
    );

    assert!(max_in_flight.into_inner() <= 2);
}

#[test_log::test]
fn pipeline_can_be_reused() {
    let mut pipeline = ScratchPipeline::new(|| 0u64);
    let mut total = 0;

    for round in 0..3u64 {
        pipeline.run(0..10u64, |job, slot| *slot = job * round, |_, slot| total += *slot);
    }

    assert_eq!(total, 45 * 3);
}

#[test_log::test]
fn pipeline_without_jobs_does_nothing() {
    let mut pipeline = ScratchPipeline::new(|| 0u8);
    let mut calls = 0;

    pipeline.run(core::iter::empty::<u8>(), |_, _| {}, |_, _| calls += 1);

    assert_eq!(calls, 0);
}

/// Launches `kernel` on a helper thread and returns whether the launch panicked, failing if it
/// doesn't return in time.
fn launch_panics(core_count: usize, kernel: fn(&CoreContext<'_>)) -> bool {
    let (sender, receiver) = mpsc::channel();

    thread::spawn(move || {
        let result = catch_unwind(|| CoreGrid::new().launch("fault", core_count, kernel));
        sender.send(result.is_err()).ok();
    });

    receiver
        .recv_timeout(Duration::from_secs(30))
        .expect("The launch returns once a core faulted")
}

#[test_log::test]
fn core_fault_releases_cores_waiting_at_the_barrier() {
    let panicked = launch_panics(2, |core| {
        if core.core_idx() == 0 {
            panic!("Core 0 faulted");
        }
        core.sync_all();
    });

    assert!(panicked);
}

#[test_log::test]
fn core_fault_after_a_barrier_is_propagated() {
    let panicked = launch_panics(4, |core| {
        core.sync_all();
        if core.is_last() {
            panic!("Last core faulted");
        }
        core.sync_all();
        core.sync_all();
    });

    assert!(panicked);
}

#[test_log::test]
fn barrier_can_be_crossed_many_times() {
    let panicked = launch_panics(3, |core| {
        for _ in 0..100 {
            core.sync_all();
        }
    });

    assert!(!panicked);
}

#[test_log::test]
fn explicit_logger_is_used_by_the_grid() {
    let logger = GridLogger::with_level(KernelLogLevel::Phases);
    assert_eq!(logger.level(), KernelLogLevel::Phases);

    let phases = AtomicUsize::new(0);
    CoreGrid::with_logger(logger).launch("phases", 3, |core| {
        core.log_phase("count", 0);
        core.sync_all();
        core.log_phase("write", 0);
        phases.fetch_add(2, Ordering::Relaxed);
    });

    assert_eq!(phases.into_inner(), 6);
}

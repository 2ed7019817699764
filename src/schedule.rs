//! # Frame Scheduler
//!
//! Fans frame rendering out across a bounded rayon pool. Frames are
//! independent and addressed by index, so no completion ordering is required;
//! the only hard guarantee is the barrier: `render_all` returns `Ok` only
//! after every index in `[0, count)` was rendered successfully.
//!
//! The first failure flips a cancellation flag that queued and in-flight jobs
//! observe, so a broken batch stops quickly instead of grinding through the
//! remaining frames. A render is not preempted mid-frame; a frame that
//! finishes over its wall-clock budget is reported as
//! [`RenderError::FrameTimeout`].

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, warn};
use rayon::prelude::*;

use crate::error::{RenderError, RenderResult};
use crate::input::frame_filename;

/// Effective pool size: the configured cap bounded by what the machine has.
pub fn effective_workers(max_workers: usize) -> usize {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    max_workers.min(available).max(1)
}

/// Renders every frame index in `[0, count)` via `render_fn`, using at most
/// `max_workers` parallel workers. Fail-fast: after the first error no new
/// frame is started.
pub fn render_all<F>(
    count: usize,
    max_workers: usize,
    frame_budget: Option<Duration>,
    render_fn: F,
) -> RenderResult<()>
where
    F: Fn(usize) -> RenderResult<()> + Sync,
{
    if count == 0 {
        return Ok(());
    }

    let workers = effective_workers(max_workers);
    debug!("rendering {} frames on {} workers", count, workers);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| RenderError::Io(std::io::Error::other(e)))?;

    let cancelled = AtomicBool::new(false);

    pool.install(|| {
        (0..count).into_par_iter().try_for_each(|n| {
            if cancelled.load(Ordering::Relaxed) {
                // Another frame already failed; let its error win.
                return Ok(());
            }

            let started = Instant::now();
            let result = render_fn(n).and_then(|()| match frame_budget {
                Some(budget) if started.elapsed() > budget => Err(RenderError::FrameTimeout {
                    index: n,
                    budget_secs: budget.as_secs(),
                }),
                _ => Ok(()),
            });

            if let Err(e) = result {
                warn!("frame {} failed: {}", n, e);
                cancelled.store(true, Ordering::Relaxed);
                return Err(e);
            }
            Ok(())
        })
    })
}

/// Checks that every expected frame file exists before encoding starts,
/// instead of relying on the encoder stopping at the first gap. Returns
/// [`RenderError::MissingFrames`] listing absent indices.
pub fn verify_frames(frames_dir: &Path, kind: &str, count: usize) -> RenderResult<()> {
    let missing: Vec<usize> = (0..count)
        .filter(|&n| !frames_dir.join(frame_filename(kind, n)).exists())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(RenderError::MissingFrames { indices: missing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn renders_every_index_exactly_once() {
        for workers in [1, 4] {
            let calls = AtomicUsize::new(0);
            let seen: Vec<AtomicBool> = (0..17).map(|_| AtomicBool::new(false)).collect();
            render_all(17, workers, None, |n| {
                calls.fetch_add(1, Ordering::SeqCst);
                seen[n].store(true, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
            assert_eq!(calls.load(Ordering::SeqCst), 17);
            assert!(seen.iter().all(|s| s.load(Ordering::SeqCst)));
        }
    }

    #[test]
    fn zero_frames_is_a_no_op() {
        render_all(0, 4, None, |_| panic!("should not be called")).unwrap();
    }

    #[test]
    fn first_failure_aborts_the_batch() {
        let calls = AtomicUsize::new(0);
        let err = render_all(100, 2, None, |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            if n == 3 {
                Err(RenderError::Shape("boom".to_string()))
            } else {
                Ok(())
            }
        })
        .unwrap_err();
        assert!(matches!(err, RenderError::Shape(_)));
        // Cancellation keeps the batch well short of completion.
        assert!(calls.load(Ordering::SeqCst) < 100);
    }

    #[test]
    fn over_budget_frame_is_a_timeout() {
        let err = render_all(1, 1, Some(Duration::from_millis(5)), |_| {
            std::thread::sleep(Duration::from_millis(25));
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, RenderError::FrameTimeout { index: 0, .. }));
    }

    #[test]
    fn verify_frames_reports_gaps() {
        let dir = tempfile::tempdir().unwrap();
        for n in [0usize, 2, 3] {
            std::fs::write(dir.path().join(frame_filename("sst", n)), b"png").unwrap();
        }
        let err = verify_frames(dir.path(), "sst", 5).unwrap_err();
        match err {
            RenderError::MissingFrames { indices } => assert_eq!(indices, vec![1, 4]),
            other => panic!("unexpected error: {}", other),
        }
        verify_frames(dir.path(), "sst", 1).unwrap();
    }
}

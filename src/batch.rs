//! Run the construction pipeline over many files with a pool of worker
//! processes.
//!
//! Each file is handled by its own child process, so a crash or a GDAL abort
//! in one worker cannot take the others down. Files share nothing; their order
//! of completion is unspecified.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Spawns `program args... <path>` once per path, keeping at most `jobs`
/// children alive.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    program: PathBuf,
    args: Vec<OsString>,
    jobs: usize,
    poll_interval: Duration,
}

/// How one file fared.
#[derive(Debug)]
pub struct BatchOutcome {
    pub path: PathBuf,
    pub status: WorkerStatus,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub enum WorkerStatus {
    Exited(ExitStatus),
    /// The worker could not be started or waited on.
    Failed(io::Error),
}

impl BatchOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(&self.status, WorkerStatus::Exited(status) if status.success())
    }
}

impl BatchRunner {
    /// A runner invoking `program` with `args` followed by the file path.
    /// `jobs` is clamped to at least one.
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I, jobs: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            jobs: jobs.max(1),
            poll_interval: Duration::from_millis(50),
        }
    }

    /// A runner that re-invokes the current executable as `<exe> convert <path>`.
    pub fn current_exe(jobs: usize) -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, ["convert"], jobs))
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Processes every path and returns one outcome per path, in completion
    /// order. Failures are logged and do not stop the batch.
    pub fn run<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<BatchOutcome> {
        let mut pending: VecDeque<PathBuf> =
            paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
        let mut running: Vec<Worker> = Vec::with_capacity(self.jobs);
        let mut outcomes = Vec::with_capacity(pending.len());

        tracing::info!(files = pending.len(), jobs = self.jobs, "batch start");
        while !pending.is_empty() || !running.is_empty() {
            while running.len() < self.jobs {
                let Some(path) = pending.pop_front() else {
                    break;
                };
                match self.spawn(&path) {
                    Ok(child) => running.push(Worker {
                        path,
                        child,
                        started: Instant::now(),
                    }),
                    Err(e) => outcomes.push(report(BatchOutcome {
                        path,
                        status: WorkerStatus::Failed(e),
                        elapsed: Duration::ZERO,
                    })),
                }
            }

            let mut i = 0;
            while i < running.len() {
                match running[i].child.try_wait() {
                    Ok(None) => i += 1,
                    Ok(Some(status)) => {
                        let worker = running.swap_remove(i);
                        outcomes.push(report(worker.finish(WorkerStatus::Exited(status))));
                    }
                    Err(e) => {
                        let mut worker = running.swap_remove(i);
                        let _ = worker.child.kill();
                        outcomes.push(report(worker.finish(WorkerStatus::Failed(e))));
                    }
                }
            }

            if !running.is_empty() {
                thread::sleep(self.poll_interval);
            }
        }

        let failed = outcomes.iter().filter(|o| !o.succeeded()).count();
        tracing::info!(files = outcomes.len(), failed, "batch done");
        outcomes
    }

    fn spawn(&self, path: &Path) -> io::Result<Child> {
        tracing::debug!(program = %self.program.display(), path = %path.display(), "spawn worker");
        Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .spawn()
    }
}

struct Worker {
    path: PathBuf,
    child: Child,
    started: Instant,
}

impl Worker {
    fn finish(self, status: WorkerStatus) -> BatchOutcome {
        BatchOutcome {
            path: self.path,
            status,
            elapsed: self.started.elapsed(),
        }
    }
}

fn report(outcome: BatchOutcome) -> BatchOutcome {
    let path = outcome.path.display();
    match &outcome.status {
        WorkerStatus::Exited(status) if status.success() => {
            tracing::info!(%path, elapsed = ?outcome.elapsed, "done");
        }
        WorkerStatus::Exited(status) => {
            tracing::warn!(%path, code = ?status.code(), "worker failed");
        }
        WorkerStatus::Failed(e) => {
            tracing::warn!(%path, error = %e, "worker could not run");
        }
    }
    outcome
}

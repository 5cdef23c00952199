//! Parallel wordlist search.
//!
//! A fixed pool of workers pulls candidate indices from a shared cursor, so
//! every candidate is handed to exactly one worker. Each worker owns its
//! scrypt scratch memory; the KDF parameters and cipher record are shared
//! read-only. The first verified candidate raises the [`CancelToken`], after
//! which no worker starts another candidate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rayon::ThreadPoolBuilder;
use tracing::{debug, info};

use crate::crypto::{CipherRecord, KdfParams, Verifier};
use crate::error::{RecoveryError, RecoveryResult};

/// Cooperative stop signal shared by all workers.
///
/// Workers check it before taking each candidate. Raised on the first match,
/// on a worker failure, or externally (e.g. from a Ctrl-C handler).
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Worker count; `None` uses the available hardware concurrency.
    pub threads: Option<usize>,
    /// Log progress every this many dispatched candidates; 0 disables it.
    pub progress_every: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threads: None,
            progress_every: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A candidate verified against the MAC.
    Found(String),
    /// Every candidate was tried without a match.
    Exhausted,
    /// The run was cancelled from outside before the wordlist was used up.
    Interrupted,
}

#[derive(Debug, Clone)]
pub struct SearchReport {
    pub outcome: Outcome,
    /// Wall-clock time until the match, or until the search ended.
    pub elapsed: Duration,
    /// Candidates fully verified.
    pub attempts: u64,
}

impl SearchReport {
    pub fn password(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Found(password) => Some(password),
            _ => None,
        }
    }
}

enum Hit {
    Found { password: String, elapsed: Duration },
    Failed(RecoveryError),
}

struct WorkerReport {
    hit: Option<Hit>,
    attempts: u64,
}

/// Shared, read-only view of one run handed to every worker.
struct Run<'a> {
    candidates: &'a [String],
    verifier: Verifier<'a>,
    cursor: AtomicUsize,
    cancel: &'a CancelToken,
    start: Instant,
    progress_every: u64,
}

impl Run<'_> {
    fn work(&self) -> WorkerReport {
        // allocated on first use so idle workers never reserve a lookup table
        let mut workspace = None;
        let mut attempts = 0u64;

        loop {
            if self.cancel.is_cancelled() {
                return WorkerReport { hit: None, attempts };
            }
            let index = self.cursor.fetch_add(1, Ordering::Relaxed);
            let Some(candidate) = self.candidates.get(index) else {
                return WorkerReport { hit: None, attempts };
            };
            if self.progress_every > 0 && index > 0 && index as u64 % self.progress_every == 0 {
                debug!(
                    dispatched = index,
                    total = self.candidates.len(),
                    elapsed = ?self.start.elapsed(),
                    "search progress"
                );
            }

            let workspace = workspace.get_or_insert_with(|| self.verifier.workspace());
            let result = self.verifier.verify_with(workspace, candidate);
            attempts += 1;

            match result {
                Ok(false) => {}
                Ok(true) => {
                    let elapsed = self.start.elapsed();
                    self.cancel.cancel();
                    let hit = Hit::Found {
                        password: candidate.clone(),
                        elapsed,
                    };
                    return WorkerReport {
                        hit: Some(hit),
                        attempts,
                    };
                }
                Err(e) => {
                    self.cancel.cancel();
                    return WorkerReport {
                        hit: Some(Hit::Failed(e)),
                        attempts,
                    };
                }
            }
        }
    }
}

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Tries every candidate until one verifies or the list is exhausted.
///
/// If several candidates verify, which one is reported depends on
/// scheduling. A worker failure aborts the run with that error unless
/// another worker already found the password.
pub fn search(
    candidates: &[String],
    kdf: &KdfParams,
    record: &CipherRecord,
    config: &SearchConfig,
    cancel: &CancelToken,
) -> RecoveryResult<SearchReport> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(config.threads.unwrap_or_else(default_threads))
        .thread_name(|i| format!("keyprobe-worker-{i}"))
        .build()
        .map_err(|e| RecoveryError::WorkerPool(e.to_string()))?;

    info!(
        candidates = candidates.len(),
        threads = pool.current_num_threads(),
        n = kdf.n(),
        r = kdf.r(),
        p = kdf.p(),
        "starting search"
    );

    let run = Run {
        candidates,
        verifier: Verifier::new(kdf, record),
        cursor: AtomicUsize::new(0),
        cancel,
        start: Instant::now(),
        progress_every: config.progress_every,
    };

    let reports = pool.broadcast(|_| run.work());

    let attempts: u64 = reports.iter().map(|r| r.attempts).sum();
    let mut failure = None;
    for report in reports {
        match report.hit {
            Some(Hit::Found { password, elapsed }) => {
                info!(attempts, ?elapsed, "password recovered");
                return Ok(SearchReport {
                    outcome: Outcome::Found(password),
                    elapsed,
                    attempts,
                });
            }
            Some(Hit::Failed(e)) => failure = Some(e),
            None => {}
        }
    }
    if let Some(e) = failure {
        return Err(e);
    }

    let elapsed = run.start.elapsed();
    let outcome = if cancel.is_cancelled() && attempts < candidates.len() as u64 {
        Outcome::Interrupted
    } else {
        Outcome::Exhausted
    };
    info!(attempts, ?elapsed, ?outcome, "search finished without a match");

    Ok(SearchReport {
        outcome,
        elapsed,
        attempts,
    })
}

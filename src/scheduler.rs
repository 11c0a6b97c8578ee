//! Fan-out of independent, pure tasks over a bounded pool of scoped threads.
//!
//! Tasks are keyed; the only observable outcome is the final key → value
//! map. The first failing task stops the pool from picking up new work and
//! the whole run fails; a partial map is never returned.

use std::collections::HashMap;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;

use tracing::debug;

use crate::error::{CovmergeError, Result};
use crate::model::FileCoverage;
use crate::parsers::source;

/// `std::thread::available_parallelism()` with a floor of 1.
#[must_use]
pub fn available_jobs() -> NonZeroUsize {
    thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

/// Run `task` once per job on at most `workers` threads and join the
/// results by key.
///
/// When several tasks fail, the error of the earliest submitted job among
/// those that ran is returned.
pub fn run<K, I, V, F>(jobs: Vec<(K, I)>, workers: NonZeroUsize, task: F) -> Result<HashMap<K, V>>
where
    K: Eq + Hash + Send,
    I: Send,
    V: Send,
    F: Fn(&K, I) -> Result<V> + Sync,
{
    let total = jobs.len();
    if total == 0 {
        return Ok(HashMap::new());
    }
    let workers = workers.get().min(total);
    debug!(jobs = total, workers, "scheduling tasks");

    let queue = Mutex::new(jobs.into_iter().enumerate());
    let failed = AtomicBool::new(false);

    let (queue, failed, task) = (&queue, &failed, &task);

    let finished: Vec<Vec<(usize, K, Result<V>)>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(move || {
                    let mut done = Vec::new();
                    while !failed.load(Ordering::Relaxed) {
                        let next = queue.lock().unwrap_or_else(PoisonError::into_inner).next();
                        let Some((idx, (key, input))) = next else {
                            break;
                        };
                        let result = task(&key, input);
                        if result.is_err() {
                            failed.store(true, Ordering::Relaxed);
                        }
                        done.push((idx, key, result));
                    }
                    done
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    });

    let mut values = HashMap::with_capacity(total);
    let mut first_error: Option<(usize, CovmergeError)> = None;
    for (idx, key, result) in finished.into_iter().flatten() {
        match result {
            Ok(value) => {
                values.insert(key, value);
            }
            Err(e) => {
                if first_error.as_ref().map_or(true, |(first, _)| idx < *first) {
                    first_error = Some((idx, e));
                }
            }
        }
    }

    match first_error {
        Some((_, e)) => Err(e),
        None => Ok(values),
    }
}

/// Parse every `(src_relative_path, detail page)` pair of one report.
pub fn parse_detail_pages(
    pages: Vec<(String, PathBuf)>,
    workers: NonZeroUsize,
) -> Result<HashMap<String, FileCoverage>> {
    run(pages, workers, |rel_path, page| {
        let input = std::fs::read_to_string(&page).map_err(|source| CovmergeError::Read {
            path: page.clone(),
            source,
        })?;
        let file = source::parse(&input, rel_path, &page)?;
        debug!(path = %rel_path, lines = file.lines.len(), "parsed detail page");
        Ok(file)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jobs(n: u32) -> Vec<(u32, u32)> {
        (0..n).map(|i| (i, i * 10)).collect()
    }

    #[test]
    fn test_joins_all_results_by_key() {
        let workers = NonZeroUsize::new(4).unwrap();
        let out = run(jobs(50), workers, |k, v| Ok(k + v)).unwrap();
        assert_eq!(out.len(), 50);
        assert_eq!(out[&7], 77);
        assert_eq!(out[&49], 539);
    }

    #[test]
    fn test_empty_job_list() {
        let out: HashMap<u32, u32> =
            run(Vec::<(u32, u32)>::new(), available_jobs(), |_, v| Ok(v)).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_single_failure_fails_everything() {
        let workers = NonZeroUsize::new(3).unwrap();
        let result = run(jobs(20), workers, |k, v| {
            if *k == 5 {
                Err(CovmergeError::parse("page.html", format!("bad job {k}")))
            } else {
                Ok(v)
            }
        });
        let err = result.unwrap_err();
        assert!(err.to_string().contains("bad job 5"));
    }

    #[test]
    fn test_serial_pool_reports_first_failure() {
        let result = run(jobs(10), NonZeroUsize::MIN, |k, v| {
            if *k >= 3 {
                Err(CovmergeError::parse("page.html", format!("bad job {k}")))
            } else {
                Ok(v)
            }
        });
        assert!(result.unwrap_err().to_string().contains("bad job 3"));
    }

    #[test]
    fn test_missing_page_is_read_error() {
        let pages = vec![("a.c".to_string(), PathBuf::from("/nonexistent/covmerge/a.c.html"))];
        let err = parse_detail_pages(pages, available_jobs()).unwrap_err();
        assert!(matches!(err, CovmergeError::Read { .. }));
    }
}

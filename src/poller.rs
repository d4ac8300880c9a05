use crate::analyzer::{Analyzer, SampleStatus, Verdict};
use crate::error::Error;
use crate::sample::Sample;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, trace, warn};

const SLEEP_SLICE: Duration = Duration::from_millis(250);

/// Randomized wait between verdict queries.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    interval: Duration,
}

impl Backoff {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Sample merely queued on the analyzer: between interval/2 and interval.
    pub fn long(&self) -> Duration {
        random_between(self.interval / 2, self.interval)
    }

    /// Analysis under way: between interval/8 and interval/4.
    pub fn short(&self) -> Duration {
        random_between(self.interval / 8, self.interval / 4)
    }
}

fn random_between(low: Duration, high: Duration) -> Duration {
    if high <= low {
        return low;
    }
    let low_nanos = low.as_nanos().min(u64::MAX as u128) as u64;
    let high_nanos = high.as_nanos().min(u64::MAX as u128) as u64;
    Duration::from_nanos(rand::thread_rng().gen_range(low_nanos..=high_nanos))
}

/// Queries the analyzer for one sample until it reaches a terminal state.
pub struct VerdictPoller<'a> {
    analyzer: &'a dyn Analyzer,
    backoff: Backoff,
    max_polls: Option<u32>,
    abort: &'a AtomicBool,
}

impl<'a> VerdictPoller<'a> {
    pub fn new(
        analyzer: &'a dyn Analyzer,
        backoff: Backoff,
        max_polls: Option<u32>,
        abort: &'a AtomicBool,
    ) -> Self {
        Self {
            analyzer,
            backoff,
            max_polls,
            abort,
        }
    }

    /// Poll until `Done`, `Error` or `Timeout`.
    ///
    /// Returns `Ok(None)` when the run was aborted while waiting. `NotFound`
    /// and any analyzer failure are errors. Once `max_polls` queries have
    /// come back non-terminal the sample is treated as timed out.
    pub fn poll(&self, sample: &Sample) -> Result<Option<Verdict>, Error> {
        let fingerprints = [sample.fingerprint().to_string()];
        let mut polls: u32 = 0;

        loop {
            polls += 1;
            let verdict = self
                .analyzer
                .get_verdict(&fingerprints)?
                .into_iter()
                .next()
                .ok_or_else(|| Error::EmptyVerdict(sample.fingerprint().to_string()))?;

            let pause = match verdict.sample_status {
                SampleStatus::NotFound => {
                    return Err(Error::SampleNotFound {
                        fingerprint: sample.fingerprint().to_string(),
                        path: sample.path().to_path_buf(),
                    });
                }
                SampleStatus::Arrived => self.backoff.long(),
                SampleStatus::Processing => self.backoff.short(),
                SampleStatus::Error | SampleStatus::Timeout => {
                    warn!("{} for {}", verdict.sample_status, sample.path().display());
                    return Ok(Some(verdict));
                }
                SampleStatus::Done => {
                    info!("{}: {}", verdict, sample.path().display());
                    return Ok(Some(verdict));
                }
            };

            if self.max_polls.is_some_and(|max| polls >= max) {
                warn!(
                    "No verdict for {} after {} queries, treating as timeout",
                    sample.path().display(),
                    polls
                );
                return Ok(Some(Verdict::new(sample.fingerprint(), SampleStatus::Timeout)));
            }

            trace!(
                "{} is {}, next query in {:?}",
                sample.path().display(),
                verdict.sample_status,
                pause
            );
            if !self.sleep(pause) {
                return Ok(None);
            }
        }
    }

    /// Sleep for `pause`, waking early when the run is aborted. Returns
    /// `false` if it was.
    fn sleep(&self, pause: Duration) -> bool {
        let deadline = Instant::now() + pause;
        loop {
            if self.abort.load(Ordering::Relaxed) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

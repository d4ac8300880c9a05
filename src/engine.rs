use crate::aggregate::{RunAggregate, RunOutcome};
use crate::analyzer::{Analyzer, AnalyzerError, CachedAnalyzer, HttpAnalyzer};
use crate::config::{AppConfig, FileErrorPolicy, RunConfig};
use crate::error::Error;
use crate::filter::Filter;
use crate::hasher;
use crate::policy::{Category, Policy};
use crate::poller::{Backoff, VerdictPoller};
use crate::progress::ProgressReporter;
use crate::sample::{Delivery, Sample, UploadRegistry};
use crate::scanner::{walk, FileDescriptor};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Two-stage admission pipeline.
///
/// The walk feeds a bounded prescan queue; prescan workers filter and size
/// candidates and forward survivors to a bounded submit queue; submit workers
/// fingerprint, deliver, poll and decide. The walk blocks when the prescan
/// queue is full and prescan workers block when the submit queue is full.
pub struct AdmissionEngine {
    analyzer: Arc<dyn Analyzer>,
    filter: Filter,
    policy: Policy,
    run: RunConfig,
}

impl AdmissionEngine {
    pub fn new(analyzer: Arc<dyn Analyzer>, filter: Filter) -> Self {
        Self {
            analyzer,
            filter,
            policy: Policy::default(),
            run: RunConfig::default(),
        }
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_run_config(mut self, run: RunConfig) -> Self {
        self.run = run;
        self
    }

    /// Build the engine the CLI runs: HTTP analyzer (optionally cached),
    /// filter file (or submit-all) and the configured policy.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let http = HttpAnalyzer::new(&config.analyzer)?;
        let analyzer: Arc<dyn Analyzer> = if config.analyzer.cache {
            Arc::new(CachedAnalyzer::new(http))
        } else {
            Arc::new(http)
        };
        let filter = Filter::from_config(config)?;
        Ok(Self::new(analyzer, filter)
            .with_policy(config.action)
            .with_run_config(config.run.clone()))
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Run the gate over every regular file under `root`.
    ///
    /// Returns the outcome when all files were decided, or the first fatal
    /// error. The prescan queue is closed once the walk ends, the submit queue
    /// only after every prescan worker has exited.
    pub fn run(&self, root: &Path, reporter: &dyn ProgressReporter) -> Result<RunOutcome, Error> {
        self.run.validate()?;
        let start = Instant::now();

        match self.analyzer.register() {
            Ok(()) => info!("Registration complete"),
            Err(AnalyzerError::AlreadyRegistered) => debug!("Client already registered"),
            Err(err) => return Err(err.into()),
        }

        info!("Process folder: {}", root.display());
        let shared = RunState {
            engine: self,
            reporter,
            aggregate: RunAggregate::new(),
            uploads: UploadRegistry::new(),
            abort: AtomicBool::new(false),
            fatal: Mutex::new(None),
        };
        let state = &shared;

        let (prescan_tx, prescan_rx) = bounded::<FileDescriptor>(self.run.queue_depth);
        let (submit_tx, submit_rx) = bounded::<FileDescriptor>(self.run.queue_depth);

        let walked = thread::scope(|s| {
            let prescan_workers: Vec<_> = (0..self.run.prescan_workers)
                .map(|_| {
                    let rx = prescan_rx.clone();
                    let tx = submit_tx.clone();
                    s.spawn(move || state.prescan_worker(rx, tx))
                })
                .collect();
            let submit_workers: Vec<_> = (0..self.run.submit_workers)
                .map(|_| {
                    let rx = submit_rx.clone();
                    s.spawn(move || state.submit_worker(rx))
                })
                .collect();
            drop(prescan_rx);
            drop(submit_rx);

            let walked = walk::walk(
                root,
                &self.run.skip_prefixes,
                &state.abort,
                reporter,
                |file| prescan_tx.send(file).is_ok(),
            );
            if let Ok(summary) = &walked {
                info!(
                    "Scan complete. Found {} files. Waiting for analysis results",
                    summary.files_found
                );
            }
            let walked = walked.map_err(|err| state.fail(err)).ok();

            drop(prescan_tx);
            for handle in prescan_workers {
                if handle.join().is_err() {
                    state.fail(Error::WorkerPanicked("prescan"));
                }
            }

            drop(submit_tx);
            for handle in submit_workers {
                if handle.join().is_err() {
                    state.fail(Error::WorkerPanicked("submit"));
                }
            }
            walked
        });

        let fatal = shared
            .fatal
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(err) = fatal {
            return Err(err);
        }

        let summary = walked.unwrap_or_default();
        let outcome = RunOutcome {
            files_found: summary.files_found,
            skipped_entries: summary.skipped_entries,
            stats: shared.aggregate.snapshot(),
            duration: start.elapsed(),
        };
        reporter.on_run_complete(&outcome);
        Ok(outcome)
    }
}

/// State shared by the walk and all workers for the duration of one run.
struct RunState<'a> {
    engine: &'a AdmissionEngine,
    reporter: &'a dyn ProgressReporter,
    aggregate: RunAggregate,
    uploads: UploadRegistry,
    abort: AtomicBool,
    fatal: Mutex<Option<Error>>,
}

impl RunState<'_> {
    fn aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    /// Record a run-fatal error and stop the run. Only the first one is kept.
    fn fail(&self, err: Error) {
        error!("{}", err);
        self.abort.store(true, Ordering::Relaxed);
        let mut fatal = self
            .fatal
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if fatal.is_none() {
            *fatal = Some(err);
        }
    }

    /// Decide what a failed file means for the run.
    fn settle(&self, path: &Path, err: Error) {
        if err.is_per_file() && self.engine.run.on_file_error == FileErrorPolicy::Reject {
            error!("Rejecting {}: {}", path.display(), err);
            self.aggregate.file_error();
            self.aggregate.reject();
            self.reporter.on_file_decided(path, false);
            return;
        }
        self.fail(err);
    }

    fn prescan_worker(&self, rx: Receiver<FileDescriptor>, tx: Sender<FileDescriptor>) {
        for file in rx.iter() {
            if self.aborted() {
                break;
            }
            let path = file.path().to_path_buf();
            match self.prescan(file) {
                Ok(Some(file)) => {
                    if tx.send(file).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(err) => self.settle(&path, err),
            }
        }
    }

    /// Filter and size check. Returns the file when it goes on to submission.
    fn prescan(&self, file: FileDescriptor) -> Result<Option<FileDescriptor>, Error> {
        if !self.engine.filter.evaluate(&file)? {
            debug!("Ignore: {}", file.path().display());
            self.aggregate.ignore();
            return Ok(None);
        }

        if file.size() > self.engine.run.max_file_size {
            self.aggregate.oversize();
            let admitted = self.engine.policy.admits(Category::BigFile);
            if admitted {
                info!("Skip {} bytes file: {}", file.size(), file.path().display());
            } else {
                warn!("Too big ({} bytes) file: {}", file.size(), file.path().display());
            }
            self.aggregate.record(admitted);
            self.reporter.on_file_decided(file.path(), admitted);
            return Ok(None);
        }

        Ok(Some(file))
    }

    fn submit_worker(&self, rx: Receiver<FileDescriptor>) {
        for file in rx.iter() {
            if self.aborted() {
                break;
            }
            let path = file.path().to_path_buf();
            if let Err(err) = self.submit(file) {
                self.settle(&path, err);
            }
        }
    }

    fn submit(&self, file: FileDescriptor) -> Result<(), Error> {
        debug!("Check file {}", file.path().display());
        self.aggregate.submit();

        let fingerprint = hasher::fingerprint(file.path())?;
        let sample = Sample::new(fingerprint, file);

        let analyzer = self.engine.analyzer.as_ref();
        if self.uploads.deliver(analyzer, &sample)? == Delivery::Uploaded {
            self.aggregate.upload();
        }

        let poller = VerdictPoller::new(
            analyzer,
            Backoff::new(self.engine.run.poll_interval()),
            self.engine.run.max_polls,
            &self.abort,
        );
        let Some(verdict) = poller.poll(&sample)? else {
            return Ok(());
        };

        let admitted = self.engine.policy.decide(&verdict)?;
        if admitted {
            info!("Admit {} ({})", sample.path().display(), verdict);
        } else {
            warn!("Reject {} ({})", sample.path().display(), verdict);
        }
        self.aggregate.record(admitted);
        self.reporter.on_file_decided(sample.path(), admitted);
        Ok(())
    }
}

use std::fmt;
use std::sync::Arc;

use jobkit_comms::CommsFactory;
use jobkit_model::{ErrorInfo, ExitStatus, RunHandle, RunState};
use jobkit_observe::{Lifecycle, LifecycleKind, log_event};
use tracing::{info, instrument};

use crate::{FileLockManager, Job, JobContext, LockGuard, LockManager, RunnerError};

/// Drives one job through lock acquisition, setup, run and cleanup.
///
/// A runner is single-use: the second call to [`run`](Runner::run) fails with
/// [`RunnerError::AlreadyRan`].
pub struct Runner {
    locks: Arc<dyn LockManager>,
    comms: Option<CommsFactory>,
    state: RunState,
    handle: Option<RunHandle>,
}

#[derive(Default)]
pub struct RunnerBuilder {
    locks: Option<Arc<dyn LockManager>>,
    comms: Option<CommsFactory>,
}

impl RunnerBuilder {
    pub fn with_lock_manager(mut self, locks: Arc<dyn LockManager>) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Factory handed to jobs through [`JobContext::communications`].
    pub fn with_comms(mut self, comms: CommsFactory) -> Self {
        self.comms = Some(comms);
        self
    }

    /// Locks default to [`FileLockManager`] in the OS temp directory.
    pub fn build(self) -> Runner {
        Runner {
            locks: self
                .locks
                .unwrap_or_else(|| Arc::new(FileLockManager::default())),
            comms: self.comms,
            state: RunState::Created,
            handle: None,
        }
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Runner {
    pub fn builder() -> RunnerBuilder {
        RunnerBuilder::default()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Bookkeeping of the current run, once [`run`](Runner::run) has started.
    pub fn handle(&self) -> Option<&RunHandle> {
        self.handle.as_ref()
    }

    /// Run `job` once under its execution lock.
    ///
    /// Contention is reported as [`ExitStatus::LockContention`] without touching the job. Once
    /// the lock is held it is released on every path, panics included. Failures of `run` are
    /// logged and mapped to [`ExitStatus::JobFailed`]; failures of `setup` are returned as
    /// [`RunnerError::Setup`].
    #[instrument(name = "job", level = "info", skip_all, fields(job = %job.identity()))]
    pub async fn run<J: Job + ?Sized>(&mut self, job: &mut J) -> Result<ExitStatus, RunnerError> {
        if self.state != RunState::Created {
            return Err(RunnerError::AlreadyRan);
        }

        let identity = job.identity();
        let mut handle = RunHandle::new();
        let labels = Labels {
            job: identity.to_string(),
            run_id: handle.run_id.to_string(),
        };

        self.transition(RunState::LockPending, &labels);
        let acquired = LockGuard::acquire(Arc::clone(&self.locks), &identity, &handle.run_id);
        let guard = match acquired {
            Ok(guard) => guard,
            Err(e) => {
                self.transition(RunState::LockFailed, &labels);
                self.handle = Some(handle);
                return if e.is_contended() {
                    Ok(ExitStatus::LockContention)
                } else {
                    Err(e.into())
                };
            }
        };
        handle.lock_acquired = true;

        self.transition(RunState::Initialized, &labels);
        let started_at = handle.started_at_rfc3339();
        log_event(
            &Lifecycle::new(LifecycleKind::Initialized, &labels.job, &labels.run_id)
                .with_start(&started_at, &handle.host),
        );
        info!(
            job = %labels.job,
            force_kill_after_secs = job.force_kill_after_seconds(),
            execute_every_micros = job.execute_every_micros(),
            "advisory timing"
        );

        let ctx = JobContext::new(identity, handle.clone(), self.comms.clone());
        self.handle = Some(handle);

        let outcome = self.supervise(job, &ctx, &labels).await;

        self.transition(RunState::Finishing, &labels);
        drop(guard);
        self.transition(RunState::Finished, &labels);
        log_event(&Lifecycle::new(
            LifecycleKind::Terminating,
            &labels.job,
            &labels.run_id,
        ));
        outcome
    }

    async fn supervise<J: Job + ?Sized>(
        &mut self,
        job: &mut J,
        ctx: &JobContext,
        labels: &Labels,
    ) -> Result<ExitStatus, RunnerError> {
        self.transition(RunState::SettingUp, labels);
        if let Err(e) = job.setup(ctx).await {
            let reason = e.to_string();
            log_event(
                &Lifecycle::new(LifecycleKind::SetupFailed, &labels.job, &labels.run_id)
                    .with_reason(&reason),
            );
            return Err(RunnerError::Setup(e));
        }

        self.transition(RunState::Running, labels);
        let outcome = job.run(ctx).await;

        let errors: Vec<ErrorInfo> = job.retrieve_errors().collect();
        if !errors.is_empty() {
            let payload = errors_payload(&errors);
            log_event(
                &Lifecycle::new(LifecycleKind::JobErrorsReported, &labels.job, &labels.run_id)
                    .with_reason(&payload),
            );
        }

        let status = match outcome {
            Ok(true) => {
                log_event(&Lifecycle::new(
                    LifecycleKind::JobSucceeded,
                    &labels.job,
                    &labels.run_id,
                ));
                ExitStatus::Success
            }
            Ok(false) => {
                log_event(
                    &Lifecycle::new(LifecycleKind::JobFailed, &labels.job, &labels.run_id)
                        .with_reason("run reported failure"),
                );
                ExitStatus::JobFailed
            }
            Err(e) => {
                let reason = e.to_string();
                log_event(
                    &Lifecycle::new(LifecycleKind::JobFailed, &labels.job, &labels.run_id)
                        .with_reason(&reason),
                );
                ExitStatus::JobFailed
            }
        };
        Ok(status)
    }

    fn transition(&mut self, next: RunState, labels: &Labels) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal run state transition {:?} -> {next:?}",
            self.state
        );
        self.state = next;
        log_event(
            &Lifecycle::new(LifecycleKind::StateChanged, &labels.job, &labels.run_id)
                .with_state(next.as_str()),
        );
    }
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("state", &self.state)
            .field("handle", &self.handle)
            .field("comms", &self.comms)
            .finish_non_exhaustive()
    }
}

struct Labels {
    job: String,
    run_id: String,
}

/// JSON array of the reported errors, as written to the log.
fn errors_payload(errors: &[ErrorInfo]) -> String {
    serde_json::to_string(errors).unwrap_or_else(|e| format!("unserializable errors: {e}"))
}

//! The contract a unit of work implements to be driven by a [`Runner`](crate::Runner).

use async_trait::async_trait;
use jobkit_comms::{CommsConfig, CommsError, CommsFactory, Communications};
use jobkit_model::{ErrorInfo, IntervalMicros, JobIdentity, KillAfterSecs, RunHandle};

use crate::JobError;

/// A single-shot job.
///
/// The runner calls [`setup`](Job::setup) once and then [`run`](Job::run) once, while holding the
/// execution lock of [`identity`](Job::identity).
#[async_trait]
pub trait Job: Send {
    /// Lock key and client id prefix. Defaults to the implementing type's path.
    fn identity(&self) -> JobIdentity {
        JobIdentity::of::<Self>()
    }

    /// Preparation before [`run`](Job::run). An error here aborts the run.
    async fn setup(&mut self, _ctx: &JobContext) -> Result<(), JobError> {
        Ok(())
    }

    /// The work itself. `Ok(true)` means success; `Ok(false)` and `Err` both fail the run.
    async fn run(&mut self, ctx: &JobContext) -> Result<bool, JobError>;

    /// Errors collected during the run, queried by the runner after [`run`](Job::run) returns.
    fn retrieve_errors(&self) -> Box<dyn Iterator<Item = ErrorInfo> + Send + '_> {
        Box::new(std::iter::empty())
    }

    /// Seconds an external supervisor should wait before killing the process.
    fn force_kill_after_seconds(&self) -> KillAfterSecs;

    /// Interval at which an external scheduler should start the job.
    fn execute_every_micros(&self) -> IntervalMicros;
}

/// What a job sees of its run.
#[derive(Debug)]
pub struct JobContext {
    identity: JobIdentity,
    run: RunHandle,
    comms: Option<CommsFactory>,
}

impl JobContext {
    pub(crate) fn new(identity: JobIdentity, run: RunHandle, comms: Option<CommsFactory>) -> Self {
        Self {
            identity,
            run,
            comms,
        }
    }

    pub fn identity(&self) -> &JobIdentity {
        &self.identity
    }

    pub fn run(&self) -> &RunHandle {
        &self.run
    }

    /// A fresh communications facade of `kind` bound to this job's identity.
    ///
    /// Without a factory configured on the runner, the broker settings are read from the
    /// environment.
    pub fn communications(&self, kind: &str) -> Result<Communications, JobError> {
        let comms = match &self.comms {
            Some(factory) => factory.create(kind, &self.identity)?,
            None => {
                let config = CommsConfig::from_env().map_err(CommsError::from)?;
                CommsFactory::new(config).create(kind, &self.identity)?
            }
        };
        Ok(comms)
    }
}

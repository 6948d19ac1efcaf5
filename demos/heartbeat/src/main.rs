use std::process::ExitCode;

use anyhow::Context;
use async_trait::async_trait;
use tracing::{error, info};

use jobkit_comms::{CommsConfig, CommsFactory};
use jobkit_core::prelude::*;
use jobkit_observe::{LoggerConfig, logger_init};

const UPTIME_SOURCE: &str = "/proc/uptime";
const UNEXPECTED_FAILURE: u8 = 3;

/// Publishes the host uptime once per invocation.
#[derive(Default)]
struct Heartbeat {
    errors: Vec<ErrorInfo>,
}

#[async_trait]
impl Job for Heartbeat {
    async fn run(&mut self, ctx: &JobContext) -> Result<bool, JobError> {
        let uptime = match read_uptime() {
            Ok(secs) => secs,
            Err(e) => {
                self.errors.push(
                    ErrorInfo::new("uptime unavailable")
                        .with_source(UPTIME_SOURCE)
                        .with_context("error", format!("{e:#}")),
                );
                return Ok(false);
            }
        };

        let topic = format!("sensors/{}/uptime", ctx.run().host);
        let mut comms = ctx.communications("mqtt")?;
        comms.publish(&topic, format!("{uptime:.0}")).await?;

        info!(%topic, uptime_secs = uptime, "uptime published");
        Ok(true)
    }

    fn retrieve_errors(&self) -> Box<dyn Iterator<Item = ErrorInfo> + Send + '_> {
        Box::new(self.errors.iter().cloned())
    }

    fn force_kill_after_seconds(&self) -> KillAfterSecs {
        30
    }

    fn execute_every_micros(&self) -> IntervalMicros {
        60_000_000
    }
}

fn read_uptime() -> anyhow::Result<f64> {
    let raw = std::fs::read_to_string(UPTIME_SOURCE)
        .with_context(|| format!("reading {UPTIME_SOURCE}"))?;
    let first = raw
        .split_whitespace()
        .next()
        .context("empty uptime record")?;
    first
        .parse::<f64>()
        .with_context(|| format!("malformed uptime '{first}'"))
}

/// Broker settings read through `lookup` and checked before any lock is taken.
fn comms_factory<F>(lookup: F) -> anyhow::Result<CommsFactory>
where
    F: Fn(&str) -> Option<String>,
{
    let config = CommsConfig::from_lookup(lookup).context("reading broker settings")?;
    config
        .check_prerequisites()
        .context("checking broker settings")?;
    Ok(CommsFactory::new(config))
}

async fn launch() -> anyhow::Result<ExitStatus> {
    // 1) Broker settings; a missing host fails here, before the lock is taken
    let comms = comms_factory(|key| std::env::var(key).ok())?;

    // 2) Runner with the default host-wide file locks
    let mut runner = Runner::builder().with_comms(comms).build();

    // 3) One run
    let status = runner.run(&mut Heartbeat::default()).await?;
    Ok(status)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let logger = LoggerConfig::from_env().and_then(|cfg| logger_init(&cfg));
    if let Err(e) = logger {
        eprintln!("heartbeat: logger: {e}");
        return ExitCode::from(UNEXPECTED_FAILURE);
    }

    match launch().await {
        Ok(status) => status.into(),
        Err(e) => {
            error!("heartbeat aborted: {e:#}");
            ExitCode::from(UNEXPECTED_FAILURE)
        }
    }
}

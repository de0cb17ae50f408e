//! Runs the engine and its relay as child processes.
//!
//! Each unit runs in its own task and reports how it ended on a channel.
//! The first failure (a spawn error or a non-zero exit) stops every other
//! unit. Shutting down through the token stops them all without failing.
//!
//! Units run in their own process group, so a terminal Ctrl-C reaches only
//! the supervisor. A unit interrupted by SIGINT anyway is treated as a
//! shutdown request rather than a failure.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use cyperconf::{EngineConfig, RelayConfig};
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A process to keep running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Unit {
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// The cyperus-server audio engine.
    pub fn engine(config: &EngineConfig) -> Self {
        Self::new("engine", &config.program).args(config.args())
    }

    /// The OSC relay between the editor and the engine.
    pub fn relay(config: &RelayConfig) -> Self {
        Self::new("relay", &config.program).args(config.args())
    }
}

#[derive(Debug)]
pub enum UnitOutcome {
    Exited(ExitStatus),
    SpawnFailed(io::Error),
    WaitFailed(io::Error),
    /// Killed by SIGINT from outside the supervisor.
    Interrupted(ExitStatus),
    /// Stopped by the supervisor.
    Stopped,
}

impl UnitOutcome {
    pub fn is_failure(&self) -> bool {
        match self {
            UnitOutcome::Exited(status) => !status.success(),
            UnitOutcome::SpawnFailed(_) | UnitOutcome::WaitFailed(_) => true,
            UnitOutcome::Interrupted(_) | UnitOutcome::Stopped => false,
        }
    }

    fn from_status(status: ExitStatus) -> Self {
        if interrupted(&status) {
            UnitOutcome::Interrupted(status)
        } else {
            UnitOutcome::Exited(status)
        }
    }
}

#[cfg(unix)]
fn interrupted(status: &ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;

    const SIGINT: i32 = 2;
    status.signal() == Some(SIGINT)
}

#[cfg(not(unix))]
fn interrupted(_status: &ExitStatus) -> bool {
    false
}

#[derive(Debug)]
pub struct UnitExit {
    pub name: String,
    pub outcome: UnitOutcome,
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("{name} failed to start: {source}")]
    Spawn { name: String, source: io::Error },

    #[error("{name} exited with {status}")]
    Exited { name: String, status: ExitStatus },

    #[error("lost track of {name}: {source}")]
    Wait { name: String, source: io::Error },
}

impl SupervisorError {
    fn from_exit(exit: UnitExit) -> Option<Self> {
        let name = exit.name;
        match exit.outcome {
            UnitOutcome::SpawnFailed(source) => Some(SupervisorError::Spawn { name, source }),
            UnitOutcome::WaitFailed(source) => Some(SupervisorError::Wait { name, source }),
            UnitOutcome::Exited(status) if !status.success() => {
                Some(SupervisorError::Exited { name, status })
            }
            UnitOutcome::Exited(_) | UnitOutcome::Interrupted(_) | UnitOutcome::Stopped => None,
        }
    }
}

/// Owns a set of units for one run.
#[derive(Debug)]
pub struct Supervisor {
    units: Vec<Unit>,
    shutdown: CancellationToken,
}

impl Supervisor {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            units: Vec::new(),
            shutdown,
        }
    }

    pub fn add(&mut self, unit: Unit) {
        self.units.push(unit);
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Start every unit and wait until all have ended.
    ///
    /// Returns how each unit ended, or the first failure once the remaining
    /// units have been stopped.
    pub async fn run(self) -> Result<Vec<UnitExit>, SupervisorError> {
        let (tx, mut rx) = mpsc::channel(self.units.len().max(1));
        let stop = CancellationToken::new();

        for unit in self.units {
            tokio::spawn(run_unit(unit, stop.clone(), tx.clone()));
        }
        drop(tx);

        let mut exits = Vec::new();
        let mut failure = None;
        let mut stopping = false;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled(), if !stopping => {
                    info!("shutdown requested, stopping units");
                    stopping = true;
                    stop.cancel();
                }
                exit = rx.recv() => {
                    let Some(exit) = exit else { break };
                    if stopping {
                        // Anything ending after stop was requested is part of the stop.
                        info!(unit = %exit.name, outcome = ?exit.outcome, "unit ended during shutdown");
                    } else if exit.outcome.is_failure() {
                        error!(unit = %exit.name, outcome = ?exit.outcome, "unit failed");
                        stopping = true;
                        stop.cancel();
                        failure = Some(exit);
                        continue;
                    } else if matches!(exit.outcome, UnitOutcome::Interrupted(_)) {
                        info!(unit = %exit.name, "unit interrupted, stopping the rest");
                        stopping = true;
                        stop.cancel();
                    } else {
                        info!(unit = %exit.name, outcome = ?exit.outcome, "unit ended");
                    }
                    exits.push(exit);
                }
            }
        }

        match failure.and_then(SupervisorError::from_exit) {
            Some(err) => Err(err),
            None => Ok(exits),
        }
    }
}

async fn run_unit(unit: Unit, stop: CancellationToken, tx: mpsc::Sender<UnitExit>) {
    let mut command = Command::new(&unit.program);
    command.args(&unit.args).kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);
    let spawned = command.spawn();

    let outcome = match spawned {
        Err(e) => UnitOutcome::SpawnFailed(e),
        Ok(mut child) => {
            info!(unit = %unit.name, pid = ?child.id(), program = %unit.program.display(), "started");
            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => UnitOutcome::from_status(status),
                    Err(e) => UnitOutcome::WaitFailed(e),
                },
                _ = stop.cancelled() => {
                    if let Err(e) = child.kill().await {
                        warn!(unit = %unit.name, "failed to kill: {}", e);
                    }
                    UnitOutcome::Stopped
                }
            }
        }
    };

    // The receiver only goes away once the supervisor is gone.
    let _ = tx
        .send(UnitExit {
            name: unit.name,
            outcome,
        })
        .await;
}

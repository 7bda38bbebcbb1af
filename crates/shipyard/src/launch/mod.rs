//! Process launcher: starts a staged artifact as a network service.
//!
//! The launcher checks that the service port is free, spawns the entry
//! command from the runtime root with `PORT` set, and optionally waits until
//! the port accepts connections. It never restarts a process.

mod port;

use std::io;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

pub use self::port::ensure_port_available;

use crate::error::PipelineError;
use crate::model::{RuntimeConfig, StagedArtifact};

#[cfg(unix)]
use libc::{SIGTERM, kill};

const LAUNCH_TARGET: &str = "shipyard::launch";
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Starts staged artifacts.
#[derive(Debug, Clone, Copy)]
pub struct ProcessLauncher {
    poll_interval: Duration,
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
        }
    }
}

impl ProcessLauncher {
    /// Creates a launcher polling readiness every 100 ms.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Launches `staged` as described by `runtime`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::PortUnavailable`] or
    /// [`PipelineError::PortProbe`] when the port check fails,
    /// [`PipelineError::ProcessStartFailure`] when the process cannot be
    /// spawned, and [`PipelineError::ProcessExited`] or
    /// [`PipelineError::StartupTimeout`] when readiness is not reached.
    pub fn launch(
        &self,
        runtime: &RuntimeConfig,
        staged: &StagedArtifact,
    ) -> Result<ProcessHandle, PipelineError> {
        ensure_port_available(runtime.host(), runtime.port())?;

        let argv = runtime.command_line(staged);
        let Some((program, args)) = argv.split_first() else {
            return Err(PipelineError::ProcessStartFailure {
                program: String::new(),
                source: Arc::new(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "launch command is empty",
                )),
            });
        };

        debug!(
            target: LAUNCH_TARGET,
            program = %program,
            args = ?args,
            cwd = %runtime.runtime_root().display(),
            port = runtime.port(),
            "spawning service"
        );
        let child = Command::new(program)
            .args(args)
            .current_dir(runtime.runtime_root())
            .env("PORT", runtime.port().to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| PipelineError::ProcessStartFailure {
                program: program.clone(),
                source: Arc::new(err),
            })?;

        let mut handle = ProcessHandle {
            child,
            program: program.clone(),
            port: runtime.port(),
        };
        if !runtime.ready_timeout().is_zero() {
            self.wait_for_ready(&mut handle, runtime)?;
        }
        Ok(handle)
    }

    fn wait_for_ready(
        &self,
        handle: &mut ProcessHandle,
        runtime: &RuntimeConfig,
    ) -> Result<(), PipelineError> {
        let address = port::readiness_address(runtime.host(), runtime.port()).map_err(|err| {
            drop(handle.kill());
            PipelineError::PortProbe {
                host: runtime.host().to_owned(),
                port: runtime.port(),
                source: Arc::new(err),
            }
        })?;
        let timeout = runtime.ready_timeout();
        let deadline = Instant::now().checked_add(timeout);

        loop {
            match handle.try_wait() {
                Ok(Some(status)) => {
                    return Err(PipelineError::ProcessExited {
                        program: handle.program.clone(),
                        exit_code: status.code(),
                    });
                }
                Ok(None) => {}
                Err(err) => {
                    drop(handle.kill());
                    return Err(PipelineError::ProcessStartFailure {
                        program: handle.program.clone(),
                        source: Arc::new(err),
                    });
                }
            }
            if port::accepts_connections(address, self.poll_interval) {
                debug!(
                    target: LAUNCH_TARGET,
                    pid = handle.pid(),
                    %address,
                    "service accepting connections"
                );
                return Ok(());
            }
            if deadline.is_some_and(|limit| Instant::now() >= limit) {
                warn!(
                    target: LAUNCH_TARGET,
                    pid = handle.pid(),
                    timeout_secs = timeout.as_secs(),
                    "service not ready, killing process"
                );
                drop(handle.kill());
                return Err(PipelineError::StartupTimeout {
                    port: runtime.port(),
                    timeout,
                });
            }
            thread::sleep(self.poll_interval);
        }
    }
}

/// Supervision handle for a launched service.
///
/// Dropping the handle leaves the process running; its lifetime is
/// independent of the pipeline that started it.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    program: String,
    port: u16,
}

impl ProcessHandle {
    /// Operating system process id.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Port the service was launched on.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Program that was started.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the exit status if the process has exited.
    ///
    /// # Errors
    ///
    /// Propagates the operating system error from polling the child.
    pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Blocks until the process exits.
    ///
    /// # Errors
    ///
    /// Propagates the operating system error from waiting on the child.
    pub fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait()
    }

    /// Asks the process to stop: SIGTERM on Unix, a hard kill elsewhere.
    /// Does nothing once the process has exited.
    ///
    /// # Errors
    ///
    /// Returns the operating system error when the signal cannot be sent.
    pub fn terminate(&mut self) -> io::Result<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }
        #[cfg(unix)]
        {
            let pid = libc::pid_t::try_from(self.child.id())
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
            // SAFETY: `kill(2)` only reads its integer arguments; an unknown
            // pid yields an error return rather than undefined behaviour.
            let result = unsafe { kill(pid, SIGTERM) };
            if result == 0 {
                Ok(())
            } else {
                Err(io::Error::last_os_error())
            }
        }
        #[cfg(not(unix))]
        {
            self.child.kill()
        }
    }

    /// Kills the process and reaps it.
    ///
    /// # Errors
    ///
    /// Returns the operating system error when the process cannot be killed.
    pub fn kill(&mut self) -> io::Result<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }
        self.child.kill()?;
        self.child.wait().map(drop)
    }
}

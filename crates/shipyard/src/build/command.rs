//! Build tool that spawns each step as a child process.

use std::io::{BufRead, BufReader, Read};
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{BUILD_TARGET, BuildReport, BuildTool, DEFAULT_TAIL_LINES, LogTail};
use crate::error::PipelineError;
use crate::model::{BuildSpec, BuildStep};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Runs build steps as OS processes with combined output capture.
///
/// Each step runs with the source directory as its working directory, stdin
/// closed, and stdout and stderr piped. Both pipes are drained by reader
/// threads into a channel so the child never blocks on a full pipe. The
/// build timeout bounds all steps together. Each step leads its own process
/// group on Unix, so a step still running when the timeout expires is killed
/// together with every process it started.
#[derive(Debug, Clone, Copy)]
pub struct CommandBuildTool {
    tail_lines: usize,
    drain_grace: Duration,
}

impl Default for CommandBuildTool {
    fn default() -> Self {
        Self {
            tail_lines: DEFAULT_TAIL_LINES,
            drain_grace: DRAIN_GRACE,
        }
    }
}

impl CommandBuildTool {
    /// Creates a tool retaining the default number of output lines.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many trailing output lines are retained.
    #[must_use]
    pub const fn with_tail_lines(mut self, tail_lines: usize) -> Self {
        self.tail_lines = tail_lines;
        self
    }

    /// Sets how long output is drained after a step exits.
    #[must_use]
    pub const fn with_drain_grace(mut self, drain_grace: Duration) -> Self {
        self.drain_grace = drain_grace;
        self
    }

    fn run_step(
        &self,
        spec: &BuildSpec,
        step: &BuildStep,
        deadline: Option<Instant>,
        log: &mut LogTail,
    ) -> Result<(), PipelineError> {
        let label = step.to_string();
        debug!(target: BUILD_TARGET, step = %label, "spawning build step");

        let mut command = Command::new(step.program());
        command
            .args(step.args())
            .current_dir(spec.source_path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        command.process_group(0);
        let mut child = command
            .spawn()
            .map_err(|err| PipelineError::BuildSpawn {
                step: label.clone(),
                source: Arc::new(err),
            })?;

        let (sender, receiver) = mpsc::channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, sender.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, sender.clone()));
        }
        drop(sender);

        let mut output = StepOutput {
            step: &label,
            receiver,
            log,
            disconnected: false,
        };
        let outcome = monitor(&mut child, &mut output, deadline);
        output.drain(self.drain_grace);
        if output.disconnected {
            for reader in readers {
                drop(reader.join());
            }
        } else {
            warn!(
                target: BUILD_TARGET,
                step = %label,
                "build output still open after exit; detaching readers"
            );
        }

        match outcome {
            Outcome::Exited(status) if status.success() => {
                debug!(target: BUILD_TARGET, step = %label, "build step succeeded");
                Ok(())
            }
            Outcome::Exited(status) => Err(PipelineError::BuildFailure {
                step: label,
                exit_code: status.code(),
                log: log.clone(),
            }),
            Outcome::TimedOut => {
                warn!(
                    target: BUILD_TARGET,
                    step = %label,
                    timeout_secs = spec.timeout().as_secs(),
                    "build timed out, killing process"
                );
                Err(PipelineError::BuildTimeout {
                    step: label,
                    timeout: spec.timeout(),
                    log: log.clone(),
                })
            }
            Outcome::Monitor(err) => Err(PipelineError::BuildMonitor {
                step: label,
                source: Arc::new(err),
            }),
        }
    }
}

impl BuildTool for CommandBuildTool {
    fn build(&self, spec: &BuildSpec) -> Result<BuildReport, PipelineError> {
        let started = Instant::now();
        let deadline = started.checked_add(spec.timeout());
        let mut log = LogTail::with_capacity(self.tail_lines);
        for step in spec.steps() {
            self.run_step(spec, step, deadline, &mut log)?;
        }
        let elapsed = started.elapsed();
        debug!(
            target: BUILD_TARGET,
            steps = spec.steps().len(),
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "build finished"
        );
        Ok(BuildReport::new(spec.steps().len(), elapsed, log))
    }
}

enum Outcome {
    Exited(ExitStatus),
    TimedOut,
    Monitor(std::io::Error),
}

/// Polls the child until it exits or the deadline passes, pumping output
/// between polls. A deadline too far out to represent never expires.
fn monitor(child: &mut Child, output: &mut StepOutput<'_>, deadline: Option<Instant>) -> Outcome {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Outcome::Exited(status),
            Ok(None) => {}
            Err(err) => {
                kill_step(child);
                return Outcome::Monitor(err);
            }
        }
        let wait = match deadline {
            Some(limit) => {
                let remaining = limit.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    kill_step(child);
                    return Outcome::TimedOut;
                }
                POLL_INTERVAL.min(remaining)
            }
            None => POLL_INTERVAL,
        };
        output.pump(wait);
    }
}

/// Kills the step's process group, then the child itself, and reaps it.
fn kill_step(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
            // SAFETY: `kill(2)` only reads its integer arguments. The child
            // is not yet reaped, so its pid still names the group it leads.
            unsafe { libc::kill(-pgid, libc::SIGKILL) };
        }
    }
    drop(child.kill());
    drop(child.wait());
}

struct StepOutput<'a> {
    step: &'a str,
    receiver: Receiver<String>,
    log: &'a mut LogTail,
    disconnected: bool,
}

impl StepOutput<'_> {
    /// Waits up to `wait` for output, then takes whatever else is queued.
    fn pump(&mut self, wait: Duration) {
        if self.disconnected {
            thread::sleep(wait);
            return;
        }
        match self.receiver.recv_timeout(wait) {
            Ok(line) => self.record(line),
            Err(RecvTimeoutError::Timeout) => return,
            Err(RecvTimeoutError::Disconnected) => {
                self.disconnected = true;
                return;
            }
        }
        loop {
            match self.receiver.try_recv() {
                Ok(line) => self.record(line),
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    return;
                }
            }
        }
    }

    /// Collects remaining output until both pipes close or `grace` elapses.
    fn drain(&mut self, grace: Duration) {
        let started = Instant::now();
        while !self.disconnected {
            let remaining = grace.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return;
            }
            match self.receiver.recv_timeout(remaining) {
                Ok(line) => self.record(line),
                Err(RecvTimeoutError::Timeout) => return,
                Err(RecvTimeoutError::Disconnected) => self.disconnected = true,
            }
        }
    }

    fn record(&mut self, line: String) {
        debug!(target: BUILD_TARGET, step = self.step, "{line}");
        self.log.push(line);
    }
}

fn spawn_reader<R>(pipe: R, sender: Sender<String>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer) {
                Ok(0) | Err(_) => return,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buffer)
                        .trim_end_matches(['\r', '\n'])
                        .to_owned();
                    if sender.send(line).is_err() {
                        return;
                    }
                }
            }
        }
    })
}

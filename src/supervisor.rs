// tecount: Transposable element quantification from sequencing reads.
//
// Copyright 2026 tecount contributors.
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::process::Child;
use std::process::Command;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;

use crossbeam_channel::bounded;
use crossbeam_channel::Sender;

type E = Box<dyn std::error::Error>;

// Lines queued for console echo before the consumer applies backpressure.
const ECHO_QUEUE_LEN: usize = 1024;

#[derive(Debug, Clone)]
pub struct EmptyCommand;

impl std::fmt::Display for EmptyCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "empty command line")
    }
}

impl std::error::Error for EmptyCommand {}

/// Exit code and captured output of a finished external tool.
///
/// The per-stream text is the drained lines rejoined with single spaces,
/// kept around for diagnostics after the tool has exited.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Runs external tools and keeps track of every child it has spawned.
///
/// Children still running when the supervisor is dropped are killed, so an
/// early error return or panic in the driver cannot leave an aligner or
/// trimmer process behind.
///
/// ## Usage
///
/// ```rust
/// use tecount::supervisor::Supervisor;
///
/// let supervisor = Supervisor::new();
/// let output = supervisor.run("echo counting reads", false).unwrap();
///
/// assert!(output.success());
/// assert_eq!(output.stdout, "counting reads");
/// ```
#[derive(Default)]
pub struct Supervisor {
    live: Mutex<Vec<Arc<Mutex<Child>>>>,
}

// Reads `stream` to the end, forwarding each line to the echo queue and
// keeping a copy for the caller.
fn drain_stream<R: Read>(stream: R, echo: Sender<String>) -> Vec<String> {
    let mut captured: Vec<String> = Vec::new();
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        match line {
            Ok(line) => {
                let _ = echo.send(line.clone());
                captured.push(line);
            }
            Err(_) => break,
        }
    }
    captured
}

impl Supervisor {
    pub fn new() -> Self {
        Self { live: Mutex::new(Vec::new()) }
    }

    /// Runs `command` to completion and returns its exit code and output.
    ///
    /// The command line is echoed to the console and split on whitespace
    /// into an argument vector; no shell is involved, so arguments must not
    /// rely on globbing or quoting.
    ///
    /// Both output streams are drained concurrently line by line. With
    /// `passthrough` the lines are additionally echoed to the console as
    /// they arrive, in arrival order across the two streams, so long-running
    /// tools stay visible while they work. Order within one stream is
    /// preserved; interleaving between the streams is best-effort.
    ///
    /// A non-zero exit code is not an error here: it is reported in the
    /// returned [RunOutput] and the caller decides whether to abort.
    pub fn run(&self, command: &str, passthrough: bool) -> Result<RunOutput, E> {
        println!("{}", command);

        let mut argv = command.split_whitespace();
        let program = argv.next().ok_or(EmptyCommand)?;

        let mut child = Command::new(program)
            .args(argv)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let child_stdout = child.stdout.take().ok_or("child stdout was not piped")?;
        let child_stderr = child.stderr.take().ok_or("child stderr was not piped")?;

        let handle = Arc::new(Mutex::new(child));
        self.live.lock().unwrap().push(Arc::clone(&handle));

        let (stdout_tx, echo_rx) = bounded::<String>(ECHO_QUEUE_LEN);
        let stderr_tx = stdout_tx.clone();

        let stdout_thread = thread::spawn(move || drain_stream(child_stdout, stdout_tx));
        let stderr_thread = thread::spawn(move || drain_stream(child_stderr, stderr_tx));

        // The queue disconnects once both drains have dropped their sender.
        for line in echo_rx.iter() {
            if passthrough {
                println!("{}", line);
            }
        }

        let stdout_lines = stdout_thread.join().map_err(|_| "stdout drain panicked")?;
        let stderr_lines = stderr_thread.join().map_err(|_| "stderr drain panicked")?;

        let status = handle.lock().unwrap().wait()?;
        self.live.lock().unwrap().retain(|entry| !Arc::ptr_eq(entry, &handle));

        Ok(RunOutput {
            code: status.code().unwrap_or(-1),
            stdout: stdout_lines.join(" "),
            stderr: stderr_lines.join(" "),
        })
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        let mut live = match self.live.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for handle in live.drain(..) {
            if let Ok(mut child) = handle.try_lock() {
                if let Ok(None) = child.try_wait() {
                    let _ = child.kill();
                    let _ = child.wait();
                }
            }
        }
    }
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn run_captures_stdout() {
        use super::Supervisor;

        let supervisor = Supervisor::new();
        let output = supervisor.run("echo hello world", false).unwrap();

        assert_eq!(output.code, 0);
        assert!(output.success());
        assert_eq!(output.stdout, "hello world");
        assert_eq!(output.stderr, "");
    }

    #[test]
    fn run_with_passthrough_still_captures() {
        use super::Supervisor;

        let supervisor = Supervisor::new();
        let output = supervisor.run("echo one two three", true).unwrap();

        assert_eq!(output.stdout, "one two three");
    }

    #[test]
    fn nonzero_exit_is_reported_not_fatal() {
        use super::Supervisor;

        let supervisor = Supervisor::new();
        let output = supervisor.run("false", false).unwrap();

        assert!(!output.success());
    }

    #[test]
    fn stderr_is_captured_separately() {
        use super::Supervisor;

        let supervisor = Supervisor::new();
        let output = supervisor.run("ls /this-path-does-not-exist-tecount", false).unwrap();

        assert!(!output.success());
        assert_eq!(output.stdout, "");
        assert!(!output.stderr.is_empty());
    }

    #[test]
    fn missing_binary_is_an_error() {
        use super::Supervisor;

        let supervisor = Supervisor::new();
        assert!(supervisor.run("tecount-no-such-binary", false).is_err());
    }

    #[test]
    fn empty_command_is_an_error() {
        use super::Supervisor;

        let supervisor = Supervisor::new();
        assert!(supervisor.run("", false).is_err());
    }

    #[test]
    fn registry_is_empty_after_run() {
        use super::Supervisor;

        let supervisor = Supervisor::new();
        supervisor.run("true", false).unwrap();

        assert!(supervisor.live.lock().unwrap().is_empty());
    }
}

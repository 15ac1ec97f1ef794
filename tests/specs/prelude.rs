//! Test helpers for behavioral specifications.
//!
//! Provides a small DSL for driving the fuel binary against a temp state
//! directory, plus an NDJSON client for the consume daemon's IPC stream.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};

/// How long to wait for the daemon to accept connections.
pub const DAEMON_START_TIMEOUT: Duration = Duration::from_secs(10);

/// How long to wait for a single IPC event.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(15);

/// Returns the path to the fuel binary, resolving relative to the test
/// binary when the manifest dir is stale (shared target directories).
pub fn fuel_binary() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let standard = manifest_dir.join("target/debug/fuel");
    if standard.exists() {
        return standard;
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join("fuel");
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

/// A temp workspace with its own `.fuel` state directory.
pub struct Project {
    temp: tempfile::TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self {
            temp: tempfile::tempdir().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn state_dir(&self) -> PathBuf {
        self.temp.path().join(".fuel")
    }

    /// Write a file under the project root, creating parent directories.
    pub fn file(&self, rel: &str, contents: &str) {
        let path = self.temp.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }

    /// Write a daemon config with one `claude` agent running `sh -c
    /// <script>`.
    pub fn config(&self, port: u16, script: &str) {
        self.file(
            ".fuel/config.toml",
            &format!(
                r#"consume_port = {port}
primary = "claude"

[agents.claude]
command = "sh"
args = ["-c", {script:?}]
"#
            ),
        );
    }

    /// Same, with a review agent.
    pub fn config_with_review(&self, port: u16, script: &str, review_script: &str) {
        self.file(
            ".fuel/config.toml",
            &format!(
                r#"consume_port = {port}
primary = "claude"
review = "reviewer"

[agents.claude]
command = "sh"
args = ["-c", {script:?}]

[agents.reviewer]
command = "sh"
args = ["-c", {review_script:?}]
"#
            ),
        );
    }

    /// Build a fuel invocation against this project's state dir.
    pub fn fuel(&self) -> CliBuilder {
        CliBuilder::new(self)
    }

    /// Start `fuel consume` in the background and wait for the port.
    pub fn consume(&self, port: u16) -> DaemonHandle {
        let child = Command::new(fuel_binary())
            .arg("consume")
            .current_dir(self.root())
            .env("FUEL_STATE_DIR", self.state_dir())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();
        let handle = DaemonHandle { child, port };
        handle.wait_until_accepting();
        handle
    }
}

/// Fluent builder for one CLI invocation.
pub struct CliBuilder {
    args: Vec<String>,
    dir: PathBuf,
    state_dir: PathBuf,
}

impl CliBuilder {
    fn new(project: &Project) -> Self {
        Self {
            args: Vec::new(),
            dir: project.root().to_path_buf(),
            state_dir: project.state_dir(),
        }
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn run(self) -> Output {
        Command::new(fuel_binary())
            .args(&self.args)
            .current_dir(&self.dir)
            .env("FUEL_STATE_DIR", &self.state_dir)
            .output()
            .unwrap()
    }

    /// Run and assert success.
    pub fn passes(self) -> Assertion {
        let output = self.run();
        assert!(
            output.status.success(),
            "expected success, got {:?}\nstdout: {}\nstderr: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
        Assertion { output }
    }

    /// Run and assert failure with exit code 1.
    pub fn fails(self) -> Assertion {
        let output = self.run();
        assert_eq!(
            output.status.code(),
            Some(1),
            "expected exit 1\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
        Assertion { output }
    }
}

/// Assertions over a finished invocation.
pub struct Assertion {
    pub output: Output,
}

impl Assertion {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_has(self, needle: &str) -> Self {
        assert!(
            self.stdout().contains(needle),
            "stdout missing {needle:?}:\n{}",
            self.stdout()
        );
        self
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        assert!(
            self.stderr().contains(needle),
            "stderr missing {needle:?}:\n{}",
            self.stderr()
        );
        self
    }

    /// First whitespace-delimited token of stdout (the printed id).
    pub fn first_token(&self) -> String {
        self.stdout()
            .split_whitespace()
            .next()
            .expect("empty stdout")
            .to_string()
    }
}

/// A running consume daemon, killed on drop.
pub struct DaemonHandle {
    child: Child,
    port: u16,
}

impl DaemonHandle {
    pub fn port(&self) -> u16 {
        self.port
    }

    fn wait_until_accepting(&self) {
        let deadline = Instant::now() + DAEMON_START_TIMEOUT;
        while Instant::now() < deadline {
            if TcpStream::connect(("127.0.0.1", self.port)).is_ok() {
                return;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        panic!("daemon did not start listening on port {}", self.port);
    }

    /// Connect an observer client.
    pub fn client(&self) -> EventClient {
        let stream = TcpStream::connect(("127.0.0.1", self.port)).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        EventClient {
            reader: BufReader::new(stream.try_clone().unwrap()),
            stream,
        }
    }

    /// Ask the daemon to shut down gracefully via SIGTERM and wait.
    pub fn stop(mut self) {
        let pid = self.child.id();
        let _ = Command::new("kill").arg(pid.to_string()).status();
        let deadline = Instant::now() + Duration::from_secs(15);
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                return;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for DaemonHandle {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// One connected NDJSON observer.
pub struct EventClient {
    reader: BufReader<TcpStream>,
    stream: TcpStream,
}

impl EventClient {
    /// Read the next event record, waiting up to `EVENT_TIMEOUT`.
    pub fn next_event(&mut self) -> serde_json::Value {
        let deadline = Instant::now() + EVENT_TIMEOUT;
        // The line accumulates across read timeouts so a record split by a
        // timeout is not lost.
        let mut line = String::new();
        while Instant::now() < deadline {
            match self.reader.read_line(&mut line) {
                Ok(0) => panic!("daemon closed the connection"),
                Ok(_) if line.ends_with('\n') => {
                    return serde_json::from_str(line.trim_end()).unwrap()
                }
                Ok(_) => continue,
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue
                }
                Err(e) => panic!("read failed: {e}"),
            }
        }
        panic!("timed out waiting for an event");
    }

    /// Read events until one of the given type arrives.
    pub fn wait_for(&mut self, event_type: &str) -> serde_json::Value {
        let deadline = Instant::now() + EVENT_TIMEOUT;
        while Instant::now() < deadline {
            let event = self.next_event();
            if event["type"] == event_type {
                return event;
            }
        }
        panic!("never observed a {event_type} event");
    }

    /// Send a command record.
    pub fn send(&mut self, command: serde_json::Value) {
        let mut line = command.to_string();
        line.push('\n');
        self.stream.write_all(line.as_bytes()).unwrap();
        self.stream.flush().unwrap();
    }
}

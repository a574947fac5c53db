//! Worker plumbing. The session only sees the [`Transport`] and
//! [`Spawner`] traits, so tests can drive it with a scripted fake instead
//! of a real binary.

use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::debug;

/// Write side of a running worker.
pub trait Transport: Send {
    fn send(&mut self, line: &str) -> io::Result<()>;
    /// Terminates the worker. Idempotent.
    fn kill(&mut self);
}

/// Creates workers, once per session (re)start. The returned receiver
/// yields output lines and disconnects when the worker exits.
pub trait Spawner: Send {
    fn spawn(&mut self) -> io::Result<(Box<dyn Transport>, Receiver<String>)>;
}

/// Runs the engine as a child process wired through pipes.
pub struct ChildSpawner {
    program: PathBuf,
    args: Vec<String>,
}

impl ChildSpawner {
    pub fn new(program: impl Into<PathBuf>) -> ChildSpawner {
        ChildSpawner { program: program.into(), args: Vec::new() }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> ChildSpawner {
        self.args.push(arg.into());
        self
    }
}

impl Spawner for ChildSpawner {
    fn spawn(&mut self) -> io::Result<(Box<dyn Transport>, Receiver<String>)> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let stdin = take_pipe(child.stdin.take())?;
        let stdout = take_pipe(child.stdout.take())?;
        let stderr = take_pipe(child.stderr.take())?;

        let (tx, rx) = unbounded();
        thread::spawn(move || read_lines(stdout, tx));
        thread::spawn(move || drain_stderr(stderr));

        Ok((Box::new(ChildTransport { child, stdin }), rx))
    }
}

fn take_pipe<T>(pipe: Option<T>) -> io::Result<T> {
    pipe.ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "engine pipe missing"))
}

fn read_lines<R: io::Read>(stdout: R, tx: Sender<String>) {
    let reader = BufReader::new(stdout);
    for line in reader.lines() {
        let Ok(line) = line else { break };
        if tx.send(line).is_err() {
            break;
        }
    }
    // Dropping the sender here is the exit signal the session listens for.
}

// An undrained stderr pipe fills up and stalls the worker mid-write.
fn drain_stderr<R: io::Read>(stderr: R) {
    let reader = BufReader::new(stderr);
    for line in reader.lines() {
        let Ok(line) = line else { break };
        debug!("engine stderr: {line}");
    }
}

struct ChildTransport {
    child: Child,
    stdin: ChildStdin,
}

impl Transport for ChildTransport {
    fn send(&mut self, line: &str) -> io::Result<()> {
        self.stdin.write_all(line.as_bytes())?;
        self.stdin.write_all(b"\n")?;
        self.stdin.flush()
    }

    fn kill(&mut self) {
        if let Err(e) = self.child.kill() {
            debug!("engine kill: {e}");
        }
        let _ = self.child.wait();
    }
}

impl Drop for ChildTransport {
    fn drop(&mut self) {
        self.kill();
    }
}

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use ndarray::Array1;
use serde::{Serialize, Deserialize};
use tracing::{debug, info, warn};

use crate::error::{DqnError, Result};
use super::{Environment, StepOutcome};

#[derive(Serialize, Debug)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum Request {
    Reset { train_mode: bool },
    Step { action: usize },
    Close,
}

/// First line written by the simulator after start-up
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Handshake {
    pub state_size: usize,
    pub action_size: usize,
    #[serde(default = "default_num_agents")]
    pub num_agents: usize,
}

fn default_num_agents() -> usize {
    1
}

#[derive(Deserialize, Debug)]
struct Reply {
    observation: Option<Vec<f32>>,
    #[serde(default)]
    reward: f32,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

/// Simulator running as a child process, driven over line-delimited JSON.
///
/// The child announces its dimensions with a [`Handshake`] line, then answers
/// every `reset`/`step` request with one line holding `observation`
/// (and `reward`/`done` for steps). A `close` request has no reply.
/// Dropping the environment without closing it kills the child.
pub struct ProcessEnvironment {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    handshake: Handshake,
    closed: bool,
}

impl ProcessEnvironment {
    /// Start the simulator at `path`, passing `--no-graphics` when requested
    pub fn spawn<P: AsRef<Path>>(path: P, no_graphics: bool) -> Result<Self> {
        let path = path.as_ref();
        let mut command = Command::new(path);
        if no_graphics {
            command.arg("--no-graphics");
        }
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| DqnError::Environment(format!("failed to start {}: {}", path.display(), e)))?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DqnError::Environment("simulator stdout unavailable".to_string()))?;

        let mut env = ProcessEnvironment {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            handshake: Handshake { state_size: 0, action_size: 0, num_agents: 0 },
            closed: false,
        };

        let line = env.read_line()?;
        let handshake: Handshake = serde_json::from_str(&line)
            .map_err(|e| DqnError::Environment(format!("bad handshake '{}': {}", line.trim(), e)))?;
        if handshake.state_size == 0 || handshake.action_size == 0 {
            return Err(DqnError::Environment(format!("degenerate handshake {:?}", handshake)));
        }
        info!(
            path = %path.display(),
            num_agents = handshake.num_agents,
            state_size = handshake.state_size,
            action_size = handshake.action_size,
            "simulator started"
        );
        env.handshake = handshake;
        Ok(env)
    }

    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    fn send(&mut self, request: &Request) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| DqnError::Environment("simulator already closed".to_string()))?;
        let line = serde_json::to_string(request)?;
        writeln!(stdin, "{}", line)
            .and_then(|_| stdin.flush())
            .map_err(|e| DqnError::Environment(format!("simulator went away: {}", e)))
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = self
            .stdout
            .read_line(&mut line)
            .map_err(|e| DqnError::Environment(format!("reading simulator output: {}", e)))?;
        if read == 0 {
            return Err(DqnError::Environment("simulator closed its output unexpectedly".to_string()));
        }
        Ok(line)
    }

    fn request(&mut self, request: &Request) -> Result<(Array1<f32>, f32, bool)> {
        self.send(request)?;
        let line = self.read_line()?;
        let reply: Reply = serde_json::from_str(&line)
            .map_err(|e| DqnError::Environment(format!("bad reply '{}': {}", line.trim(), e)))?;
        if let Some(error) = reply.error {
            return Err(DqnError::Environment(error));
        }
        let observation = reply
            .observation
            .ok_or_else(|| DqnError::Environment(format!("reply without observation: {}", line.trim())))?;
        if observation.len() != self.handshake.state_size {
            return Err(DqnError::dimension_mismatch(
                format!("observation of length {}", self.handshake.state_size),
                format!("length {}", observation.len()),
            ));
        }
        Ok((Array1::from_vec(observation), reply.reward, reply.done))
    }
}

impl Environment for ProcessEnvironment {
    fn state_size(&self) -> usize {
        self.handshake.state_size
    }

    fn action_size(&self) -> usize {
        self.handshake.action_size
    }

    fn reset(&mut self, train_mode: bool) -> Result<Array1<f32>> {
        let (observation, _, _) = self.request(&Request::Reset { train_mode })?;
        Ok(observation)
    }

    fn step(&mut self, action: usize) -> Result<StepOutcome> {
        if action >= self.handshake.action_size {
            return Err(DqnError::InvalidAction {
                action,
                max_actions: self.handshake.action_size,
            });
        }
        let (next_state, reward, done) = self.request(&Request::Step { action })?;
        Ok(StepOutcome { next_state, reward, done })
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Err(e) = self.send(&Request::Close) {
            warn!("could not send close request: {}", e);
        }
        // Dropping stdin signals EOF to simulators that ignore the close request
        self.stdin = None;
        let status = self.child.wait()?;
        debug!(%status, "simulator exited");
        Ok(())
    }
}

impl Drop for ProcessEnvironment {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

//! Scripted container runtime for integration tests.
//!
//! Understands a tiny shell: `echo TEXT`, `sleep SECS`, `exit CODE`,
//! `true`, `false` and `panic`, joined with `&&`. Anything else exits 127
//! with a "not found" message, the way `sh` does.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use dockhand::error::DockerError;
use dockhand::execution::{Command, ContainerRuntime, ExecResult, ProvisionSpec};

/// How `create` should fail, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateFailure {
    /// Host out of room for another container.
    Exhausted,
    /// Bad image or similar request error.
    Broken,
}

#[derive(Default)]
pub struct FakeRuntime {
    live: Mutex<HashSet<String>>,
    peak: AtomicUsize,
    creates: AtomicUsize,
    removes: AtomicUsize,
    create_failure: Mutex<Option<CreateFailure>>,
    remove_delay: Duration,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_with(failure: CreateFailure) -> Self {
        let runtime = Self::default();
        *runtime.create_failure.lock().unwrap() = Some(failure);
        runtime
    }

    /// Makes every removal take `delay` before the container is gone.
    pub fn with_remove_delay(mut self, delay: Duration) -> Self {
        self.remove_delay = delay;
        self
    }

    pub fn live(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn removes(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn create(&self, name: &str, _spec: &ProvisionSpec) -> Result<(), DockerError> {
        match *self.create_failure.lock().unwrap() {
            Some(CreateFailure::Exhausted) => {
                return Err(DockerError::ResourceExhausted(
                    "no space left on device".to_string(),
                ))
            }
            Some(CreateFailure::Broken) => {
                return Err(DockerError::CreateFailed(
                    "pull access denied for nosuchimage".to_string(),
                ))
            }
            None => {}
        }

        let mut live = self.live.lock().unwrap();
        live.insert(name.to_string());
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.peak.fetch_max(live.len(), Ordering::SeqCst);
        Ok(())
    }

    async fn exec(&self, name: &str, command: &Command) -> Result<ExecResult, DockerError> {
        if !self.live.lock().unwrap().contains(name) {
            return Err(DockerError::ContainerNotFound {
                id: name.to_string(),
            });
        }

        let script = match command.argv.as_slice() {
            [sh, flag, script] if sh == "sh" && flag == "-c" => script.clone(),
            argv => argv.join(" "),
        };

        let mut stdout = String::new();
        for step in script.split("&&").map(str::trim) {
            let (program, rest) = step.split_once(' ').unwrap_or((step, ""));
            match program {
                "echo" => {
                    stdout.push_str(rest);
                    stdout.push('\n');
                }
                "sleep" => {
                    let secs: f64 = rest.trim().parse().unwrap_or(0.0);
                    tokio::time::sleep(Duration::from_secs_f64(secs)).await;
                }
                "true" => {}
                "false" => return Ok(exit(1, stdout, String::new())),
                "exit" => {
                    let code = rest.trim().parse().unwrap_or(1);
                    return Ok(exit(code, stdout, String::new()));
                }
                "panic" => panic!("scripted panic"),
                other => {
                    return Ok(exit(127, stdout, format!("sh: 1: {}: not found\n", other)));
                }
            }
        }
        Ok(exit(0, stdout, String::new()))
    }

    async fn remove(&self, name: &str) -> Result<(), DockerError> {
        if !self.remove_delay.is_zero() {
            tokio::time::sleep(self.remove_delay).await;
        }
        if self.live.lock().unwrap().remove(name) {
            self.removes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "fake"
    }
}

fn exit(exit_code: i64, stdout: String, stderr: String) -> ExecResult {
    ExecResult {
        exit_code,
        stdout,
        stderr,
    }
}

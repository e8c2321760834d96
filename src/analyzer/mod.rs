//! Codebase analyzer: asks a coding agent to turn a repository into a task
//! list.
//!
//! The agent runs inside a throwaway environment. It clones the repository,
//! reads the analyzer prompt and writes `fsc/tasks.json`, which is read back
//! and parsed into [`Task`]s that can be fed straight to the orchestrator.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::AnalyzerError;
use crate::execution::{
    generate_name, Command, CommandSequence, ContainerRuntime, EnvironmentHandle, ProvisionSpec,
    TaskTimeout,
};
use crate::prompts::analyzer_prompt;
use crate::runner::REPO_DIR;
use crate::task::{Task, TaskStatus};
use crate::utils::extract_json_array;

/// Bound on reading the task list back out of the environment.
const READ_BACK_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs the analysis agent against one repository.
pub struct CodebaseAnalyzer {
    runtime: Arc<dyn ContainerRuntime>,
    config: AppConfig,
    api_key: Option<String>,
    cancel: CancellationToken,
}

impl CodebaseAnalyzer {
    /// Creates an analyzer. The agent API key is read from the process
    /// environment; override it with [`CodebaseAnalyzer::with_api_key`].
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: AppConfig) -> Self {
        let api_key = config.agent_api_key();
        Self {
            runtime,
            config,
            api_key,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Token that aborts a running analysis.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Analyzes the repository at `git_remote_url` and returns at most
    /// `max_tasks` tasks.
    pub async fn analyze(&self, git_remote_url: &str) -> Result<Vec<Task>, AnalyzerError> {
        let prompt = analyzer_prompt(
            &self.config.work_style_text(),
            self.config.coding_style_text(),
            self.config.max_tasks,
        )?;

        let mut spec = ProvisionSpec::new(self.config.image.clone())
            .with_limits(self.config.execution_limits());
        match &self.api_key {
            Some(key) => {
                spec = spec.with_env(vec![(
                    self.config.agent.api_key_env().to_string(),
                    key.clone(),
                )])
            }
            None => warn!(
                agent = %self.config.agent,
                key = self.config.agent.api_key_env(),
                "No API key set for agent"
            ),
        }

        let name = generate_name(&format!("{}-analyzer", self.config.name_prefix));
        let mut env = EnvironmentHandle::new(Arc::clone(&self.runtime), name)
            .provision(&spec)
            .await?;
        info!(environment = env.name(), repo = git_remote_url, agent = %self.config.agent, "Analyzing codebase");

        let result = self.run_agent(&env, git_remote_url, &prompt).await;
        env.teardown().await;
        result
    }

    async fn run_agent(
        &self,
        env: &EnvironmentHandle,
        git_remote_url: &str,
        prompt: &str,
    ) -> Result<Vec<Task>, AnalyzerError> {
        let session = self.config.agent.session(git_remote_url, prompt);
        let outcome = env
            .execute(&session, self.config.task_timeout(), &self.cancel)
            .await?;
        if outcome.status() != TaskStatus::Success {
            return Err(AnalyzerError::Execution {
                status: outcome.status().to_string(),
                detail: outcome.error_detail().unwrap_or_default(),
            });
        }
        debug!(environment = env.name(), elapsed_ms = outcome.elapsed.as_millis() as u64, "Agent finished");

        let read_back = CommandSequence::new().then(Command::read_file(&tasks_path()));
        let listing = env
            .execute(&read_back, TaskTimeout::Limited(READ_BACK_TIMEOUT), &self.cancel)
            .await?;
        if listing.status() != TaskStatus::Success {
            return Err(AnalyzerError::Execution {
                status: listing.status().to_string(),
                detail: listing.error_detail().unwrap_or_default(),
            });
        }

        let tasks = self.parse_tasks(&listing.output)?;
        info!(environment = env.name(), count = tasks.len(), "Task list extracted");
        Ok(tasks)
    }

    fn parse_tasks(&self, output: &str) -> Result<Vec<Task>, AnalyzerError> {
        let json = extract_json_array(output)
            .ok_or_else(|| AnalyzerError::NoTaskList(preview(output)))?;
        let mut tasks: Vec<Task> = serde_json::from_str(json)?;

        if tasks.len() > self.config.max_tasks {
            debug!(found = tasks.len(), max = self.config.max_tasks, "Truncating task list");
            tasks.truncate(self.config.max_tasks);
        }
        if tasks.len() < self.config.min_tasks {
            warn!(found = tasks.len(), min = self.config.min_tasks, "Agent produced fewer tasks than requested");
        }
        Ok(tasks)
    }
}

fn tasks_path() -> String {
    format!("{}/{}", REPO_DIR, crate::prompts::TASKS_FILE)
}

fn preview(output: &str) -> String {
    let trimmed = output.trim();
    if trimmed.chars().count() > 200 {
        let head: String = trimmed.chars().take(200).collect();
        format!("{}...", head)
    } else {
        trimmed.to_string()
    }
}

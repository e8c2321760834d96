//! Turning a task into the commands that carry it out.

use crate::error::ExecutionError;
use crate::execution::{Command, CommandSequence};
use crate::prompts::solver_prompt;
use crate::task::Task;

use super::agent::{AgentKind, REPO_DIR};

/// Derives a command sequence from a task.
///
/// Planning runs before an environment is provisioned, so a planning error
/// costs no capacity.
pub trait CommandPlanner: Send + Sync {
    fn plan(&self, task: &Task) -> Result<CommandSequence, ExecutionError>;

    fn name(&self) -> &'static str;
}

/// Runs the task description as a shell script.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellPlanner;

impl CommandPlanner for ShellPlanner {
    fn plan(&self, task: &Task) -> Result<CommandSequence, ExecutionError> {
        if task.description.trim().is_empty() {
            return Err(ExecutionError::Planning(format!(
                "task '{}' has an empty description",
                task.id
            )));
        }
        Ok(CommandSequence::new().then(Command::shell(task.description.clone())))
    }

    fn name(&self) -> &'static str {
        "shell"
    }
}

/// Has a coding agent solve the task in a fresh checkout and reports the
/// resulting diff.
#[derive(Debug, Clone)]
pub struct AgentPlanner {
    agent: AgentKind,
    repo_url: String,
    work_style: String,
    coding_style: String,
}

impl AgentPlanner {
    pub fn new(
        agent: AgentKind,
        repo_url: impl Into<String>,
        work_style: impl Into<String>,
        coding_style: impl Into<String>,
    ) -> Self {
        Self {
            agent,
            repo_url: repo_url.into(),
            work_style: work_style.into(),
            coding_style: coding_style.into(),
        }
    }

    pub fn agent(&self) -> AgentKind {
        self.agent
    }
}

impl CommandPlanner for AgentPlanner {
    fn plan(&self, task: &Task) -> Result<CommandSequence, ExecutionError> {
        let prompt = solver_prompt(task, &self.work_style, &self.coding_style)
            .map_err(|e| ExecutionError::Planning(e.to_string()))?;

        let mut commands = self.agent.session(&self.repo_url, &prompt);
        commands.push(Command::new(["git", "diff"]).in_dir(REPO_DIR));
        Ok(commands)
    }

    fn name(&self) -> &'static str {
        "agent"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_planner() {
        let task = Task::new("t", "echo", "sleep 1 && echo done");
        let seq = ShellPlanner.plan(&task).unwrap();
        assert_eq!(seq.len(), 1);
        assert_eq!(
            seq.iter().next().unwrap().argv,
            vec!["sh", "-c", "sleep 1 && echo done"]
        );
    }

    #[test]
    fn test_shell_planner_rejects_empty() {
        let task = Task::new("t", "nothing", "   ");
        assert!(matches!(
            ShellPlanner.plan(&task),
            Err(ExecutionError::Planning(_))
        ));
    }

    #[test]
    fn test_agent_planner_ends_with_diff() {
        let planner = AgentPlanner::new(
            AgentKind::ClaudeCode,
            "https://example.com/repo.git",
            "engineer",
            "minimal",
        );
        let task = Task::new("T-1", "Fix bug", "The parser drops trailing commas.");
        let seq = planner.plan(&task).unwrap();

        assert_eq!(seq.len(), 6);
        let last = seq.iter().last().unwrap();
        assert_eq!(last.argv, vec!["git", "diff"]);
        assert_eq!(last.workdir.as_deref(), Some(REPO_DIR));
        assert!(seq.iter().any(|c| c.argv[0] == "claude"));
    }
}

//! Coding agents that can run inside an environment.

use serde::{Deserialize, Serialize};

use crate::execution::{Command, CommandSequence};

/// Repository checkout inside the environment.
pub const REPO_DIR: &str = "/app/repo";
/// Scratch directory for prompt and output files.
pub const WORK_DIR: &str = "/app/repo/fsc";
/// Prompt file the agent is pointed at.
pub const PROMPT_FILE: &str = "/app/repo/fsc/prompt.txt";

/// Supported agent CLIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentKind {
    #[default]
    GeminiCli,
    ClaudeCode,
    Codex,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::GeminiCli => "gemini-cli",
            AgentKind::ClaudeCode => "claude-code",
            AgentKind::Codex => "codex",
        }
    }

    /// npm package providing the CLI.
    pub fn package(&self) -> &'static str {
        match self {
            AgentKind::GeminiCli => "@google/gemini-cli",
            AgentKind::ClaudeCode => "@anthropic-ai/claude-code",
            AgentKind::Codex => "@openai/codex",
        }
    }

    /// Environment variable the CLI reads its API key from.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            AgentKind::GeminiCli => "GEMINI_API_KEY",
            AgentKind::ClaudeCode => "ANTHROPIC_API_KEY",
            AgentKind::Codex => "OPENAI_API_KEY",
        }
    }

    pub fn install_command(&self) -> Command {
        Command::new(["npm", "install", "-g", self.package()])
    }

    /// Non-interactive, auto-approving invocation that reads its
    /// instructions from `prompt_file`.
    pub fn invoke_command(&self, prompt_file: &str) -> Command {
        let instruction = format!(
            "all the task descriptions are located at {}, please read and execute",
            prompt_file
        );
        let argv: Vec<String> = match self {
            AgentKind::GeminiCli => vec!["gemini".into(), "-p".into(), instruction, "--yolo".into()],
            AgentKind::ClaudeCode => vec![
                "claude".into(),
                "-p".into(),
                instruction,
                "--dangerously-skip-permissions".into(),
            ],
            AgentKind::Codex => vec![
                "codex".into(),
                "exec".into(),
                "--full-auto".into(),
                instruction,
            ],
        };
        Command::new(argv).in_dir(REPO_DIR)
    }

    /// Clone, install, write the prompt, run the agent.
    pub fn session(&self, repo_url: &str, prompt: &str) -> CommandSequence {
        CommandSequence::new()
            .then(Command::new(["git", "clone", repo_url, REPO_DIR]))
            .then(self.install_command())
            .then(Command::new(["mkdir", "-p", WORK_DIR]))
            .then(Command::write_file(PROMPT_FILE, prompt))
            .then(self.invoke_command(PROMPT_FILE))
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini-cli" | "gemini" => Ok(AgentKind::GeminiCli),
            "claude-code" | "claude" | "claudecode" => Ok(AgentKind::ClaudeCode),
            "codex" => Ok(AgentKind::Codex),
            other => Err(format!("Unknown agent type: {}", other)),
        }
    }
}

//! Command sequences executed inside an environment.
//!
//! Commands are argument vectors rather than shell strings, so nothing is
//! re-quoted on the way into the container. Shell syntax is still available
//! through [`Command::shell`], which passes the script as a single `sh -c`
//! argument.

use base64::Engine;
use serde::{Deserialize, Serialize};

/// A single command: program plus arguments, with optional working
/// directory and environment overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub argv: Vec<String>,
    #[serde(default)]
    pub workdir: Option<String>,
    #[serde(default)]
    pub env: Vec<(String, String)>,
}

impl Command {
    /// Creates a command from a program and its arguments.
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            workdir: None,
            env: Vec::new(),
        }
    }

    /// Runs `script` through `sh -c`.
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new(["sh".to_string(), "-c".to_string(), script.into()])
    }

    /// Writes `contents` to `path` inside the environment.
    ///
    /// The contents travel base64-encoded, so arbitrary text (quotes,
    /// newlines, `$`) lands byte-for-byte without shell interpretation.
    pub fn write_file(path: &str, contents: &str) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(contents.as_bytes());
        Self::shell(format!(
            "printf '%s' '{}' | base64 -d > '{}'",
            encoded,
            path.replace('\'', "'\\''")
        ))
    }

    /// Reads a file back with `cat`.
    pub fn read_file(path: &str) -> Self {
        Self::new(["cat", path])
    }

    pub fn in_dir(mut self, dir: impl Into<String>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Human-readable form used in transcripts.
    ///
    /// `sh -c` wrappers display as the script itself. Base64 payloads are
    /// long, so anything over 200 characters is elided.
    pub fn display(&self) -> String {
        let text = match self.argv.as_slice() {
            [sh, flag, script] if sh == "sh" && flag == "-c" => script.clone(),
            argv => argv.join(" "),
        };
        if text.chars().count() > 200 {
            let head: String = text.chars().take(200).collect();
            format!("{head}...")
        } else {
            text
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

/// Ordered list of commands. Execution stops at the first failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSequence {
    commands: Vec<Command>,
}

impl CommandSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command.
    pub fn then(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Command> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl FromIterator<Command> for CommandSequence {
    fn from_iter<T: IntoIterator<Item = Command>>(iter: T) -> Self {
        Self {
            commands: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a CommandSequence {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

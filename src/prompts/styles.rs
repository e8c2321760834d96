//! Work and coding style tables fed into agent prompts.

use serde::{Deserialize, Serialize};

/// Persona the agent adopts while analyzing or solving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStyle {
    #[default]
    Default,
    QaTester,
    BoldGenius,
    CarefulDocumentWriter,
    InstructiveDocumentWriter,
    BugFixer,
}

impl WorkStyle {
    pub const ALL: [WorkStyle; 6] = [
        WorkStyle::Default,
        WorkStyle::QaTester,
        WorkStyle::BoldGenius,
        WorkStyle::CarefulDocumentWriter,
        WorkStyle::InstructiveDocumentWriter,
        WorkStyle::BugFixer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkStyle::Default => "default",
            WorkStyle::QaTester => "qa_tester",
            WorkStyle::BoldGenius => "bold_genius",
            WorkStyle::CarefulDocumentWriter => "careful_document_writer",
            WorkStyle::InstructiveDocumentWriter => "instructive_document_writer",
            WorkStyle::BugFixer => "bug_fixer",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            WorkStyle::Default => "A generalist software engineer focused on contributing to an existing project by implementing new features and fixing bugs.",
            WorkStyle::QaTester => "A quality assurance engineer who focuses on ensuring code quality by continuously reviewing code, adding comprehensive unit tests, and running them to validate functionality.",
            WorkStyle::BoldGenius => "A forward-thinking engineer who proactively refactors the codebase for performance and maintainability while introducing new, impactful features.",
            WorkStyle::CarefulDocumentWriter => "A meticulous technical writer who keeps documentation detailed and accurate so the codebase stays easy to understand.",
            WorkStyle::InstructiveDocumentWriter => "A user-focused technical writer who creates clear, instructive documentation with tutorials and explanations that help users learn the project.",
            WorkStyle::BugFixer => "An analytical software engineer who specializes in finding and resolving latent bugs to keep the codebase stable and reliable.",
        }
    }
}

impl std::fmt::Display for WorkStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        WorkStyle::ALL
            .into_iter()
            .find(|style| style.as_str() == normalized)
            .ok_or_else(|| format!("Unknown work style: {}", s))
    }
}

/// Description for `style`, unless a non-empty custom label replaces it.
pub fn work_style_description(style: WorkStyle, custom_label: Option<&str>) -> String {
    match custom_label.map(str::trim) {
        Some(label) if !label.is_empty() => label.to_string(),
        _ => style.description().to_string(),
    }
}

const CODING_STYLES: [&str; 4] = [
    "Make the smallest change that solves the problem. Match the existing code exactly and do not refactor.",
    "Keep changes focused. Small cleanups in touched code are fine when they make the change clearer.",
    "Improve structure where it helps: extract helpers, tighten types, and add tests for the code you change.",
    "Treat the change as an opportunity to raise quality: refactor freely, strengthen error handling, and cover new behavior with thorough tests.",
];

/// Coding style guidance for levels 0 (conservative) to 3 (aggressive).
/// Levels above 3 clamp to 3.
pub fn coding_style(level: u8) -> &'static str {
    CODING_STYLES[usize::from(level.min(3))]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_style_round_trips_through_str() {
        for style in WorkStyle::ALL {
            assert_eq!(style.as_str().parse::<WorkStyle>().unwrap(), style);
        }
        assert_eq!("QA-Tester".parse::<WorkStyle>().unwrap(), WorkStyle::QaTester);
        assert!("wizard".parse::<WorkStyle>().is_err());
    }

    #[test]
    fn test_custom_label_overrides() {
        assert_eq!(
            work_style_description(WorkStyle::BugFixer, Some("A Rust performance specialist.")),
            "A Rust performance specialist."
        );
        assert_eq!(
            work_style_description(WorkStyle::BugFixer, Some("  ")),
            WorkStyle::BugFixer.description()
        );
        assert!(work_style_description(WorkStyle::QaTester, None).contains("quality assurance"));
    }

    #[test]
    fn test_coding_style_clamps() {
        assert_eq!(coding_style(3), coding_style(200));
        assert_ne!(coding_style(0), coding_style(1));
    }
}

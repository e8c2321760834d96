//! Prompts for coding agents running inside execution environments.
//!
//! - [`styles`] - work style personas and coding style levels
//! - [`templates`] - analyzer and solver prompts rendered with tera
//!
//! # Usage
//!
//! ```
//! use dockhand::prompts::{analyzer_prompt, coding_style, work_style_description, WorkStyle};
//!
//! let style = work_style_description(WorkStyle::BugFixer, None);
//! let prompt = analyzer_prompt(&style, coding_style(1), 10).expect("template renders");
//! assert!(prompt.contains("fsc/tasks.json"));
//! ```

pub mod styles;
pub mod templates;

pub use styles::{coding_style, work_style_description, WorkStyle};
pub use templates::{analyzer_prompt, solver_prompt, TASKS_FILE};

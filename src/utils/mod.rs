//! Shared utilities.

pub mod git;
pub mod json_extraction;

pub use git::{origin_remote, parse_remotes, GitRemote};
pub use json_extraction::{extract_json_array, find_matching_bracket};

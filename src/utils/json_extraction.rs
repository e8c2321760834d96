//! Locating JSON inside captured command output.
//!
//! Agent output read back from an environment carries the transcript's
//! `$ <command>` prefix and sometimes trailing chatter, so the JSON document
//! has to be cut out before parsing.

/// Returns the outermost JSON array in `content`: from the first `[` to its
/// matching `]`.
///
/// # Examples
///
/// ```
/// use dockhand::utils::extract_json_array;
///
/// let output = "\n$ cat tasks.json\n[{\"ID\": \"a\"}]\ndone";
/// assert_eq!(extract_json_array(output), Some("[{\"ID\": \"a\"}]"));
/// ```
pub fn extract_json_array(content: &str) -> Option<&str> {
    let start = content.find('[')?;
    let end = find_matching_bracket(&content[start..])?;
    Some(&content[start..=start + end])
}

/// Finds the byte index of the `]` closing the `[` at the start of `s`.
///
/// Brackets inside JSON strings (including escaped quotes) are ignored.
pub fn find_matching_bracket(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '[' if !in_string => depth += 1,
            ']' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

use std::path::PathBuf;

/// Expand a leading `~/` to the current user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Keep the first `max_lines` lines of command output, noting how many were cut.
pub fn truncate_lines(output: &str, max_lines: usize) -> String {
    let total = output.lines().count();
    if total <= max_lines {
        return output.to_string();
    }

    let mut kept = output.lines().take(max_lines).collect::<Vec<_>>().join("\n");
    kept.push_str(&format!("\n... ({} more lines)", total - max_lines));
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/etc/key"), PathBuf::from("/etc/key"));
        assert_eq!(expand_tilde("~user/key"), PathBuf::from("~user/key"));
    }

    #[test]
    fn truncate_long_output() {
        let output = "a\nb\nc\nd";
        assert_eq!(truncate_lines(output, 4), output);
        assert_eq!(truncate_lines(output, 2), "a\nb\n... (2 more lines)");
        assert_eq!(truncate_lines("", 2), "");
    }
}

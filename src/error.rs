use thiserror::Error;

/// Failure classes the dashboard distinguishes. `Config`, `TargetResolution` and
/// `TotalFetch` end the process; `Action` only ever reaches the status bar.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("configuration error: {details}")]
    Config { details: String },

    #[error("no namespaces found matching '{pattern}' in context '{context}'")]
    TargetResolution { context: String, pattern: String },

    #[error("every target failed to fetch:\n{}", messages.join("\n"))]
    TotalFetch { messages: Vec<String> },

    #[error("{details}")]
    Action { details: String },
}

impl DashboardError {
    pub fn config(details: impl Into<String>) -> Self {
        Self::Config {
            details: details.into(),
        }
    }

    pub fn action(details: impl Into<String>) -> Self {
        Self::Action {
            details: details.into(),
        }
    }
}

/// Flattens an error chain into the short form shown inline on a namespace row.
pub fn compact_error(error: &anyhow::Error) -> String {
    let mut out = Vec::new();
    for (index, cause) in error.chain().enumerate() {
        if index == 0 {
            out.push(cause.to_string());
        } else if index <= 2 {
            out.push(format!("caused by: {cause}"));
        } else {
            break;
        }
    }

    out.join("\n")
}

/// First non-blank line of a message, for single-row display.
pub fn summarize_error_line(error: &str) -> String {
    error
        .lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| "unknown error".to_string())
}

#[cfg(test)]
mod tests {
    use super::{DashboardError, compact_error, summarize_error_line};
    use anyhow::Context;

    #[test]
    fn total_fetch_lists_every_message() {
        let error = DashboardError::TotalFetch {
            messages: vec!["first".to_string(), "second".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "every target failed to fetch:\nfirst\nsecond"
        );
    }

    #[test]
    fn action_errors_show_bare_details() {
        assert_eq!(
            DashboardError::action("clipboard unavailable").to_string(),
            "clipboard unavailable"
        );
        assert_eq!(
            DashboardError::config("bad key").to_string(),
            "configuration error: bad key"
        );
    }

    #[test]
    fn compact_error_keeps_two_causes() {
        let error = Err::<(), _>(anyhow::anyhow!("root"))
            .context("middle")
            .context("outer")
            .context("top")
            .unwrap_err();
        assert_eq!(
            compact_error(&error),
            "top\ncaused by: outer\ncaused by: middle"
        );
    }

    #[test]
    fn summary_skips_blank_lines() {
        assert_eq!(summarize_error_line("\n  Unauthorized \nmore"), "Unauthorized");
        assert_eq!(summarize_error_line(""), "unknown error");
    }
}

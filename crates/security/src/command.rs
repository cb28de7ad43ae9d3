//! Dangerous-command denylist for the shell tool.
//!
//! Commands are screened before any process is spawned. Matching is done on
//! the command text with whitespace collapsed, so it over-blocks rather than
//! under-blocks (e.g. `echo "rm -rf /"` is refused too).

use std::sync::LazyLock;

use regex::Regex;

/// Why a command was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Command blocked: {reason}")]
pub struct CommandDenied {
    pub reason: String,
}

static DENYLIST: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        (
            "recursive deletion of root or home",
            r#"(?:^|[;&|(\s/])rm\s+(?:-\S+\s+)*["']?(?:/|~/?|\$HOME/?|\$\{HOME\}/?)\*?["']?(?:$|[\s;&|)])"#,
        ),
        ("filesystem formatting", r"\bmkfs(?:\.\w+)?\b"),
        ("raw disk write", r"\bdd\b.*\bof=/dev/"),
        ("raw disk write", r">\s*/dev/(?:sd|hd|vd|xvd|nvme|disk|mmcblk)"),
        ("fork bomb", r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:"),
        (
            "recursive permission change on root",
            r"\bch(?:mod|own)\s+(?:-\S+\s+)*-R\s+(?:\S+\s+)?/(?:$|[\s;&|])",
        ),
    ]
    .into_iter()
    .filter_map(|(reason, pattern)| Regex::new(pattern).ok().map(|re| (reason, re)))
    .collect()
});

/// Check `command` against the denylist.
pub fn check_command(command: &str) -> Result<(), CommandDenied> {
    let collapsed = command.split_whitespace().collect::<Vec<_>>().join(" ");

    match DENYLIST.iter().find(|(_, re)| re.is_match(&collapsed)) {
        Some((reason, _)) => {
            tracing::warn!(command = %collapsed, reason, "Blocked dangerous command");
            Err(CommandDenied {
                reason: (*reason).to_string(),
            })
        }
        None => Ok(()),
    }
}

//! shell is the one external collaborator the core evaluator blocks on:
//! the `$(shell ...)` builtin's subprocess invocation (spec.md §5, §6).
//!
//! Grounded on `original_source/pymake.py`'s `shell.execute()` call
//! site; implemented here with `std::process::Command` since the core
//! is fixed single-threaded/synchronous.

use std::process::Command;

/// run executes `cmdline` through `$SHELL -c`, returning stdout with
/// internal newlines folded to spaces and trailing whitespace trimmed —
/// GNU Make's own `$(shell)` contract.
pub fn run(cmdline: &str) -> Result<String, String> {
    let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
    let output = Command::new(&shell)
        .arg("-c")
        .arg(cmdline)
        .output()
        .map_err(|e| format!("failed to spawn {}: {}", shell, e))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(fold_newlines(&stdout))
}

/// run_with_env is like `run` but exports `vars` into the child
/// process's environment, for recipes evaluated after an `export`
/// directive (spec.md §8 end-to-end scenario 5).
pub fn run_with_env(cmdline: &str, vars: &std::collections::HashMap<String, String>) -> Result<String, String> {
    let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
    let output = Command::new(&shell)
        .arg("-c")
        .arg(cmdline)
        .envs(vars)
        .output()
        .map_err(|e| format!("failed to spawn {}: {}", shell, e))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(fold_newlines(&stdout))
}

fn fold_newlines(s: &str) -> String {
    let trimmed = s.trim_end_matches('\n');
    trimmed.replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_newlines_trailing() {
        assert_eq!(fold_newlines("hello\n"), "hello");
    }

    #[test]
    fn test_fold_newlines_internal() {
        assert_eq!(fold_newlines("a\nb\nc\n"), "a b c");
    }

    #[test]
    fn test_run_echo() {
        let out = run("echo hello").unwrap();
        assert_eq!(out, "hello");
    }
}

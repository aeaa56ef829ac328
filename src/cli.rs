//! cli is the source loader and argument surface for the `mkeval`
//! binary (spec.md §6), in the teacher's `getopts` + `die` idiom
//! (`src/bin/unmake.rs`).

use std::fs;
use std::io;

/// DEFAULT_MAKEFILE_NAMES is GNU Make's own search order when no
/// `-f`/`--file`/`--makefile` is given.
pub const DEFAULT_MAKEFILE_NAMES: &[&str] = &["Makefile", "makefile", "GNUmakefile"];

/// load_file reads `path` to a `String`, normalizing CRLF to LF so the
/// rest of the pipeline only ever sees `\n`.
pub fn load_file(path: &str) -> io::Result<String> {
    let raw = fs::read_to_string(path)?;
    Ok(raw.replace("\r\n", "\n"))
}

/// find_default_makefile walks `DEFAULT_MAKEFILE_NAMES` in order,
/// returning the first one that exists in the current directory.
pub fn find_default_makefile() -> Option<String> {
    DEFAULT_MAKEFILE_NAMES
        .iter()
        .find(|name| fs::metadata(name).is_ok())
        .map(|name| (*name).to_string())
}

/// Options is the parsed CLI surface, filled in by `src/bin/mkeval.rs`
/// from `getopts::Matches`.
pub struct Options {
    pub makefiles: Vec<String>,
    pub output: Option<String>,
    pub print_sexpr: bool,
    pub debug: bool,
    pub warn_undefined_variables: bool,
    pub assignments: Vec<(String, String)>,
    pub targets: Vec<String>,
}

impl Options {
    /// from_free splits `getopts`'s positional `free` arguments into
    /// `NAME=VALUE` command-line assignments and bare target names, per
    /// spec.md §6's CLI surface table.
    pub fn split_free(free: &[String]) -> (Vec<(String, String)>, Vec<String>) {
        let mut assignments = Vec::new();
        let mut targets = Vec::new();
        for arg in free {
            match arg.split_once('=') {
                Some((name, value)) if is_identifier(name) => {
                    assignments.push((name.to_string(), value.to_string()));
                }
                _ => targets.push(arg.clone()),
            }
        }
        (assignments, targets)
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_free_separates_assignments_from_targets() {
        let free = vec!["CC=gcc".to_string(), "all".to_string(), "clean".to_string()];
        let (assignments, targets) = Options::split_free(&free);
        assert_eq!(assignments, vec![("CC".to_string(), "gcc".to_string())]);
        assert_eq!(targets, vec!["all".to_string(), "clean".to_string()]);
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("CC"));
        assert!(is_identifier("FOO_BAR2"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("foo-bar"));
    }
}

//! vline folds physical source lines into virtual lines: one logical
//! makefile line after backslash-continuation joining.
//!
//! Statement-mode folding collapses each `\<newline>` into a single
//! (hidden-origin) space. Recipe-mode folding keeps the backslash and
//! newline verbatim, since the shell that eventually runs the recipe
//! needs to see them.

use std::rc::Rc;

use crate::pos::{PChar, PString, Pos};

/// VLineKind distinguishes the two folding rules a virtual line can be
/// built under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VLineKind {
    /// Statement lines fold `\<nl>` into one space.
    Statement,
    /// Recipe lines keep continuations verbatim for the shell.
    Recipe,
}

/// VirtualLine is one logical line: a PString plus the folding mode it
/// was built under.
#[derive(Clone, Debug, PartialEq)]
pub struct VirtualLine {
    pub chars: PString,
    pub kind: VLineKind,
}

impl VirtualLine {
    pub fn new(chars: PString, kind: VLineKind) -> VirtualLine {
        VirtualLine { chars, kind }
    }

    /// is_blank reports whether the rendered line is empty or all
    /// whitespace.
    pub fn is_blank(&self) -> bool {
        self.chars.render().trim().is_empty()
    }

    /// is_comment reports whether the first non-whitespace character is
    /// `#`.
    pub fn is_comment(&self) -> bool {
        self.chars
            .render()
            .trim_start()
            .starts_with('#')
    }

    /// starts_with_recipe_prefix reports whether the raw first character
    /// (before any folding hid it) equals `prefix`.
    pub fn starts_with_recipe_prefix(&self, prefix: char) -> bool {
        self.chars
            .as_slice()
            .first()
            .map(|c| c.ch == prefix)
            .unwrap_or(false)
    }
}

/// trailing_backslash_count returns how many consecutive `\` characters
/// end the given physical line content (newline already stripped).
fn trailing_backslash_count(line: &[char]) -> usize {
    let mut n = 0;
    let mut i = line.len();
    while i > 0 && line[i - 1] == '\\' {
        n += 1;
        i -= 1;
    }
    n
}

/// continues reports whether a physical line (newline stripped) ends
/// with an odd run of backslashes, meaning the newline is escaped and
/// folding continues onto the next physical line.
fn continues(line: &[char]) -> bool {
    trailing_backslash_count(line) % 2 == 1
}

/// VLineBuilder consumes physical lines of one source file and yields
/// VirtualLines.
pub struct VLineBuilder {
    file: Rc<str>,
    lines: Vec<String>,
    row: usize,
    recipe_prefix: char,
}

impl VLineBuilder {
    pub fn new(file: Rc<str>, text: &str, recipe_prefix: char) -> VLineBuilder {
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
        let lines: Vec<String> = normalized.split('\n').map(|s| s.to_string()).collect();
        VLineBuilder {
            file,
            lines,
            row: 0,
            recipe_prefix,
        }
    }

    /// next_physical returns the next raw physical line, or None at EOF.
    /// A trailing empty "line" produced by a final terminating `\n` is
    /// suppressed, matching how most line iterators behave.
    fn next_physical(&mut self) -> Option<(usize, String)> {
        if self.row >= self.lines.len() {
            return None;
        }
        if self.row == self.lines.len() - 1 && self.lines[self.row].is_empty() {
            self.row += 1;
            return None;
        }
        let row = self.row + 1;
        let line = self.lines[self.row].clone();
        self.row += 1;
        Some((row, line))
    }

    fn peek_is_recipe_mode(&self, first_line: &str) -> bool {
        first_line.starts_with(self.recipe_prefix)
    }

    /// next builds and returns the next VirtualLine, folding continuations
    /// per the mode implied by the first physical line's leading
    /// character.
    pub fn next(&mut self) -> Option<VirtualLine> {
        let (row0, first) = self.next_physical()?;
        let kind = if self.peek_is_recipe_mode(&first) {
            VLineKind::Recipe
        } else {
            VLineKind::Statement
        };

        let mut chars = PString::new();
        let mut cur_row = row0;
        let mut cur_line = first;
        let mut is_continuation = false;

        loop {
            let line_chars: Vec<char> = cur_line.chars().collect();
            let cont = continues(&line_chars);

            match kind {
                VLineKind::Statement => {
                    let body_len = if cont { line_chars.len() - 1 } else { line_chars.len() };
                    // A continuation line's leading whitespace is part of
                    // the folded continuation sequence, so it is hidden
                    // rather than copied verbatim.
                    let mut start = 0;
                    if is_continuation {
                        while start < body_len && line_chars[start].is_whitespace() {
                            chars.push(PChar::hidden(line_chars[start], Pos::new(self.file.clone(), cur_row, start + 1)));
                            start += 1;
                        }
                    }
                    for (i, ch) in line_chars[start..body_len].iter().enumerate() {
                        chars.push(PChar::new(*ch, Pos::new(self.file.clone(), cur_row, start + i + 1)));
                    }
                    if cont {
                        let bs_col = body_len + 1;
                        chars.push(PChar::hidden('\\', Pos::new(self.file.clone(), cur_row, bs_col)));
                        chars.push(PChar::hidden('\n', Pos::new(self.file.clone(), cur_row, bs_col + 1)));
                        chars.push(PChar::new(' ', Pos::new(self.file.clone(), cur_row, bs_col)));
                    }
                }
                VLineKind::Recipe => {
                    for (col0, ch) in line_chars.iter().enumerate() {
                        chars.push(PChar::new(*ch, Pos::new(self.file.clone(), cur_row, col0 + 1)));
                    }
                    if cont {
                        chars.push(PChar::new('\n', Pos::new(self.file.clone(), cur_row, line_chars.len() + 1)));
                    }
                }
            }

            if !cont {
                break;
            }

            match self.next_physical() {
                Some((r, l)) => {
                    cur_row = r;
                    cur_line = l;
                    is_continuation = true;
                }
                None => break,
            }
        }

        Some(VirtualLine::new(chars, kind))
    }
}

impl Iterator for VLineBuilder {
    type Item = VirtualLine;

    fn next(&mut self) -> Option<VirtualLine> {
        VLineBuilder::next(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(text: &str) -> Vec<VirtualLine> {
        VLineBuilder::new(Rc::from("Makefile"), text, '\t').collect()
    }

    #[test]
    fn test_no_continuation() {
        let vls = build("FOO := bar\nall:\n");
        assert_eq!(vls.len(), 2);
        assert_eq!(vls[0].chars.render(), "FOO := bar");
        assert_eq!(vls[0].kind, VLineKind::Statement);
    }

    #[test]
    fn test_statement_continuation_folds_to_space() {
        let vls = build("FOO = a \\\nb \\\nc\n");
        assert_eq!(vls.len(), 1);
        assert_eq!(vls[0].chars.render(), "FOO = a b c");
    }

    #[test]
    fn test_statement_continuation_elides_leading_whitespace() {
        let vls = build("FOO = a \\\n\t  b\n");
        assert_eq!(vls.len(), 1);
        assert_eq!(vls[0].chars.render(), "FOO = a  b");
    }

    #[test]
    fn test_recipe_continuation_preserves_backslash_newline() {
        let vls = build("all:\n\techo a \\\n\techo b\n");
        assert_eq!(vls.len(), 2);
        assert_eq!(vls[1].kind, VLineKind::Recipe);
        assert!(vls[1].chars.render().contains('\n'));
    }

    #[test]
    fn test_even_backslashes_do_not_continue() {
        let vls = build("FOO := a\\\\\nBAR := b\n");
        assert_eq!(vls.len(), 2);
        assert_eq!(vls[0].chars.render(), "FOO := a\\\\");
    }

    #[test]
    fn test_continuation_at_eof_is_accepted() {
        let vls = build("FOO = a \\\n");
        assert_eq!(vls.len(), 1);
        assert_eq!(vls[0].chars.render(), "FOO = a ");
    }

    #[test]
    fn test_positions_reachable() {
        let vls = build("FOO := bar\n");
        let first = vls[0].chars.as_slice().first().unwrap();
        assert_eq!(first.pos.row, 1);
        assert_eq!(first.pos.col, 1);
    }
}

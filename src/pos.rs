//! pos tracks the source file, row, and column of every character that
//! survives into the AST, so a parse or eval error can always name an
//! exact location.

use std::fmt;
use std::rc::Rc;

/// Pos names a single point in some source file.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Pos {
    /// file denotes the originating file path (or "-" for stdin-like sources).
    pub file: Rc<str>,

    /// row denotes the 1-indexed source line.
    pub row: usize,

    /// col denotes the 1-indexed source column.
    pub col: usize,
}

impl Pos {
    /// new constructs a Pos.
    pub fn new(file: Rc<str>, row: usize, col: usize) -> Pos {
        Pos { file, row, col }
    }

    /// start constructs a Pos for the beginning of a file.
    pub fn start(file: Rc<str>) -> Pos {
        Pos { file, row: 1, col: 1 }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.row, self.col)
    }
}

/// PChar is a Positioned character: a single char plus its origin and a
/// hidden flag.
///
/// `hide` marks characters that exist in the physical source but are
/// semantically invisible: backslash-newline sequences folded away during
/// virtual-line construction, or leading/trailing whitespace elided by
/// directive-specific rules (e.g. ifeq argument trimming).
#[derive(Clone, Debug, PartialEq)]
pub struct PChar {
    /// ch denotes the literal character value.
    pub ch: char,

    /// pos denotes the originating source position.
    pub pos: Pos,

    /// hide denotes whether this character should be elided from rendering.
    pub hide: bool,
}

impl PChar {
    /// new constructs a visible PChar.
    pub fn new(ch: char, pos: Pos) -> PChar {
        PChar { ch, pos, hide: false }
    }

    /// hidden constructs a PChar that exists in the source but renders as
    /// nothing.
    pub fn hidden(ch: char, pos: Pos) -> PChar {
        PChar { ch, pos, hide: true }
    }
}

/// PString is an ordered sequence of PChars: a Positioned string.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct PString {
    chars: Vec<PChar>,
}

impl PString {
    /// new constructs an empty PString.
    pub fn new() -> PString {
        PString { chars: Vec::new() }
    }

    /// from_chars wraps an existing Vec<PChar>.
    pub fn from_chars(chars: Vec<PChar>) -> PString {
        PString { chars }
    }

    /// push appends a single PChar.
    pub fn push(&mut self, c: PChar) {
        self.chars.push(c);
    }

    /// extend appends every PChar of another PString.
    pub fn extend(&mut self, other: PString) {
        self.chars.extend(other.chars);
    }

    /// is_empty reports whether any characters (hidden or not) are present.
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// len returns the raw character count, including hidden ones.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// iter iterates over the underlying PChars in order.
    pub fn iter(&self) -> std::slice::Iter<'_, PChar> {
        self.chars.iter()
    }

    /// as_slice exposes the underlying PChars.
    pub fn as_slice(&self) -> &[PChar] {
        &self.chars
    }

    /// starts_with reports whether the visible, in-order characters begin
    /// with the given literal string.
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.to_plain_string().starts_with(prefix)
    }

    /// first_pos returns the position of the first character, if any.
    pub fn first_pos(&self) -> Option<Pos> {
        self.chars.first().map(|c| c.pos.clone())
    }

    /// lstrip removes leading whitespace PChars by marking them hidden and
    /// dropping them from the sequence (callers that need them preserved
    /// invisibly should use hide_leading_whitespace instead).
    pub fn lstrip(&self) -> PString {
        let mut idx = 0;
        while idx < self.chars.len() && self.chars[idx].ch.is_whitespace() {
            idx += 1;
        }
        PString {
            chars: self.chars[idx..].to_vec(),
        }
    }

    /// rstrip removes trailing whitespace PChars.
    pub fn rstrip(&self) -> PString {
        let mut end = self.chars.len();
        while end > 0 && self.chars[end - 1].ch.is_whitespace() {
            end -= 1;
        }
        PString {
            chars: self.chars[..end].to_vec(),
        }
    }

    /// trim applies both lstrip and rstrip.
    pub fn trim(&self) -> PString {
        self.lstrip().rstrip()
    }

    /// hide_trailing_whitespace marks trailing whitespace hidden in place,
    /// preserving position information (used by the ifeq argument parser,
    /// which must keep characters addressable but invisible in rendering).
    pub fn hide_trailing_whitespace(&mut self) {
        let mut idx = self.chars.len();
        while idx > 0 && self.chars[idx - 1].ch.is_whitespace() {
            idx -= 1;
            self.chars[idx].hide = true;
        }
    }

    /// hide_leading_whitespace marks leading whitespace hidden in place.
    pub fn hide_leading_whitespace(&mut self) {
        let mut idx = 0;
        while idx < self.chars.len() && self.chars[idx].ch.is_whitespace() {
            self.chars[idx].hide = true;
            idx += 1;
        }
    }

    /// render reconstructs the text this PString represents, honoring
    /// `hide`.
    pub fn render(&self) -> String {
        self.chars
            .iter()
            .filter(|c| !c.hide)
            .map(|c| c.ch)
            .collect()
    }

    /// to_plain_string renders every character regardless of `hide`,
    /// useful for pattern matching against the raw source text.
    pub fn to_plain_string(&self) -> String {
        self.chars.iter().map(|c| c.ch).collect()
    }
}

impl fmt::Display for PString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl FromIterator<PChar> for PString {
    fn from_iter<T: IntoIterator<Item = PChar>>(iter: T) -> Self {
        PString {
            chars: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for PString {
    type Item = PChar;
    type IntoIter = std::vec::IntoIter<PChar>;

    fn into_iter(self) -> Self::IntoIter {
        self.chars.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pc(ch: char, col: usize) -> PChar {
        PChar::new(ch, Pos::new(Rc::from("-"), 1, col))
    }

    #[test]
    fn test_render_honors_hide() {
        let mut s = PString::new();
        s.push(pc('a', 1));
        s.push(PChar::hidden(' ', Pos::new(Rc::from("-"), 1, 2)));
        s.push(pc('b', 3));
        assert_eq!(s.render(), "ab");
        assert_eq!(s.to_plain_string(), "a b");
    }

    #[test]
    fn test_trim() {
        let mut s = PString::new();
        for (i, ch) in "  hi  ".chars().enumerate() {
            s.push(pc(ch, i + 1));
        }
        assert_eq!(s.trim().render(), "hi");
    }

    #[test]
    fn test_hide_trailing_whitespace_preserves_positions() {
        let mut s = PString::new();
        for (i, ch) in "hi  ".chars().enumerate() {
            s.push(pc(ch, i + 1));
        }
        s.hide_trailing_whitespace();
        assert_eq!(s.render(), "hi");
        assert_eq!(s.len(), 4);
    }
}

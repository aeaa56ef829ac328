//! scanner provides a generic cursor over a sequence of items, supporting
//! one-token lookahead and a push/pop state stack so a parser can attempt
//! a tokenization, discover it guessed wrong, and rewind without having
//! cloned the whole input up front.
//!
//! The statement tokenizer relies on this to try "this line is an
//! assignment" first and only rewind to "this line is a rule" once a
//! `RuleOp` turns up (see `tokenizer::tokenize_statement`).

use crate::pos::PChar;

/// Scanner walks a `Vec<T>` by value, tracking a cursor position. `T` is
/// typically `pos::PChar` or `vline::VirtualLine`.
#[derive(Clone, Debug)]
pub struct Scanner<T> {
    items: Vec<T>,
    pos: usize,
    state_stack: Vec<usize>,
}

impl<T: Clone> Scanner<T> {
    /// new constructs a Scanner positioned at the start of `items`.
    pub fn new(items: Vec<T>) -> Scanner<T> {
        Scanner {
            items,
            pos: 0,
            state_stack: Vec::new(),
        }
    }

    /// next consumes and returns the item at the cursor, advancing it.
    pub fn next(&mut self) -> Option<T> {
        if self.pos < self.items.len() {
            let item = self.items[self.pos].clone();
            self.pos += 1;
            Some(item)
        } else {
            None
        }
    }

    /// peek returns the item at the cursor without consuming it.
    pub fn peek(&self) -> Option<&T> {
        self.items.get(self.pos)
    }

    /// lookahead returns the item `n` positions ahead of the cursor
    /// without consuming anything (lookahead(0) == peek()).
    pub fn lookahead(&self, n: usize) -> Option<&T> {
        self.items.get(self.pos + n)
    }

    /// pushback moves the cursor back by one, re-exposing the last
    /// consumed item to `next`/`peek`.
    pub fn pushback(&mut self) {
        if self.pos > 0 {
            self.pos -= 1;
        }
    }

    /// remain returns a view of every item left unconsumed, without
    /// advancing the cursor.
    pub fn remain(&self) -> &[T] {
        &self.items[self.pos..]
    }

    /// at_end reports whether the cursor has consumed every item.
    pub fn at_end(&self) -> bool {
        self.pos >= self.items.len()
    }

    /// stop moves the cursor to the end, as if every remaining item had
    /// been consumed; subsequent `next`/`peek` calls return `None`.
    pub fn stop(&mut self) {
        self.pos = self.items.len();
    }

    /// push_state saves the current cursor position on a stack, so a
    /// tentative parse can later be undone with `pop_state`.
    pub fn push_state(&mut self) {
        self.state_stack.push(self.pos);
    }

    /// pop_state restores the most recently pushed cursor position,
    /// discarding any progress made since the matching `push_state`.
    /// This is how the tokenizer backtracks out of a failed LHS guess.
    pub fn pop_state(&mut self) {
        if let Some(saved) = self.state_stack.pop() {
            self.pos = saved;
        }
    }

    /// commit_state discards the most recently pushed checkpoint without
    /// rewinding — used once a tentative parse is confirmed correct.
    pub fn commit_state(&mut self) {
        self.state_stack.pop();
    }

    /// rest drains and returns every remaining item in order.
    pub fn rest(&mut self) -> Vec<T> {
        let r = self.items[self.pos..].to_vec();
        self.pos = self.items.len();
        r
    }

    /// position returns the current cursor offset, for diagnostics.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl Scanner<PChar> {
    /// eat consumes `prefix` (compared against raw character values,
    /// `hide` ignored) if the upcoming characters match it exactly,
    /// advancing the cursor past the match. Leaves the cursor untouched
    /// and returns false on a mismatch or a too-short remainder.
    pub fn eat(&mut self, prefix: &str) -> bool {
        let n = prefix.chars().count();
        let matches = self.items[self.pos..].len() >= n
            && self.items[self.pos..].iter().take(n).map(|c| c.ch).eq(prefix.chars());
        if matches {
            self.pos += n;
        }
        matches
    }

    /// lstrip advances the cursor past any run of leading whitespace
    /// characters.
    pub fn lstrip(&mut self) {
        while matches!(self.peek(), Some(c) if c.ch.is_whitespace()) {
            self.pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_and_peek() {
        let mut s = Scanner::new(vec![1, 2, 3]);
        assert_eq!(s.peek(), Some(&1));
        assert_eq!(s.next(), Some(1));
        assert_eq!(s.next(), Some(2));
        assert_eq!(s.peek(), Some(&3));
        assert_eq!(s.next(), Some(3));
        assert_eq!(s.next(), None);
    }

    #[test]
    fn test_push_pop_state_rewinds() {
        let mut s = Scanner::new(vec!['a', 'b', 'c']);
        s.next();
        s.push_state();
        s.next();
        s.next();
        assert!(s.at_end());
        s.pop_state();
        assert_eq!(s.peek(), Some(&'b'));
    }

    #[test]
    fn test_commit_state_keeps_progress() {
        let mut s = Scanner::new(vec![1, 2, 3]);
        s.push_state();
        s.next();
        s.commit_state();
        s.pop_state();
        assert_eq!(s.peek(), Some(&2));
    }

    #[test]
    fn test_lookahead_does_not_consume() {
        let mut s = Scanner::new(vec!['x', '=', '=']);
        s.next();
        assert_eq!(s.lookahead(0), Some(&'='));
        assert_eq!(s.lookahead(1), Some(&'='));
        assert_eq!(s.lookahead(2), None);
        assert_eq!(s.remain(), &['=', '=']);
    }

    #[test]
    fn test_stop_exhausts_cursor() {
        let mut s = Scanner::new(vec![1, 2, 3]);
        s.next();
        s.stop();
        assert!(s.at_end());
        assert_eq!(s.next(), None);
    }

    #[test]
    fn test_eat_and_lstrip_on_char_scanner() {
        use crate::pos::Pos;
        let text = "  foo bar";
        let chars: Vec<PChar> = text
            .chars()
            .enumerate()
            .map(|(i, ch)| PChar::new(ch, Pos::new(std::rc::Rc::from("-"), 1, i + 1)))
            .collect();
        let mut s = Scanner::new(chars);
        s.lstrip();
        assert!(s.eat("foo"));
        assert!(!s.eat("bar"));
        s.lstrip();
        assert!(s.eat("bar"));
        assert!(s.at_end());
    }

    #[test]
    fn test_pushback() {
        let mut s = Scanner::new(vec![1, 2]);
        s.next();
        s.pushback();
        assert_eq!(s.next(), Some(1));
    }
}

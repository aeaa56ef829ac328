//! symtable is the name -> entry mapping GNU Make expansion runs
//! against: assignment flavors, origin tracking, export/unexport,
//! push/pop scoping for `foreach`/`call`, and lazy re-expansion with
//! loop detection.
//!
//! Grounded on `pymake/symtablemk.py`'s `SymbolTable`/`Entry` class
//! hierarchy, folded here into one `Entry` struct carrying an `Origin`
//! enum rather than a tree of `Entry` subclasses (spec.md §9: "tagged
//! variant" over class hierarchy).

use std::collections::HashMap;
use std::env;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::ast::Node;
use crate::error::{EvalErrorKind, MakeError, MakeResult};
use crate::pos::Pos;

/// Origin records the provenance of a variable, exactly as GNU Make's
/// `$(origin NAME)` reports it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    File,
    Default,
    Environment,
    CommandLine,
    Override,
    Automatic,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::File => "file",
            Origin::Default => "default",
            Origin::Environment => "environment",
            Origin::CommandLine => "command line",
            Origin::Override => "override",
            Origin::Automatic => "automatic",
        }
    }

    /// precedence returns a rank where a higher number wins during `add`,
    /// per spec.md §4.H: command line > override > file > environment >
    /// default.
    fn precedence(&self) -> u8 {
        match self {
            Origin::CommandLine => 4,
            Origin::Override => 3,
            Origin::File => 2,
            Origin::Environment => 1,
            Origin::Default => 0,
            Origin::Automatic => 2,
        }
    }
}

/// Value is either a simple (already-evaluated) string, or an
/// unresolved expression tree kept for recursive (lazy) variables.
#[derive(Clone, Debug)]
pub enum Value {
    Str(String),
    Expr(Node),
    /// Callback entries compute their value on demand (`.VARIABLES`).
    Callback,
}

/// Entry is one symbol table binding.
#[derive(Clone, Debug)]
pub struct Entry {
    pub value: Value,
    pub appends: Vec<Node>,
    pub origin: Origin,
    pub export: bool,
    pub never_export: bool,
    pub loop_depth: u32,
    pub pos: Pos,
}

impl Entry {
    fn new(value: Value, origin: Origin, pos: Pos, export_default: bool) -> Entry {
        let never_export = matches!(origin, Origin::Default | Origin::Automatic);
        Entry {
            value,
            appends: Vec::new(),
            origin,
            export: !never_export && (export_default || matches!(origin, Origin::Environment | Origin::CommandLine)),
            never_export,
            loop_depth: 0,
            pos,
        }
    }
}

/// SymbolTable owns every known variable binding plus the per-name undo
/// stacks used by `push`/`pop`.
pub struct SymbolTable {
    symbols: HashMap<String, Entry>,
    push_stacks: HashMap<String, Vec<Option<Entry>>>,
    export_default: bool,
    /// warn_undefined toggles a stderr warning on reference to an
    /// absent variable (the CLI's `--warn-undefined-variables`).
    pub warn_undefined: bool,
    /// fatal_undefined promotes that warning to a hard `EvalError`, per
    /// spec.md §7: "a debug flag may promote to fatal."
    pub fatal_undefined: bool,
}

/// automatic_variables lists the one-letter (plus a few two-letter GNU
/// extension) automatic variables populated during recipe expansion.
pub const AUTOMATIC_VARIABLES: &[&str] = &[
    "@", "%", "<", "?", "^", "+", "*", "D", "F",
];

/// builtin_variables are conventionally-defaulted names GNU Make always
/// defines, per `original_source/pymake.py`'s `builtin_variables` set.
const BUILTIN_DEFAULTS: &[(&str, &str)] = &[
    ("MAKE", "make"),
    ("MAKEFLAGS", ""),
    ("MAKELEVEL", "0"),
    ("CURDIR", ""),
];

impl SymbolTable {
    /// new constructs a SymbolTable, pre-populating `.VARIABLES`,
    /// `MAKE_VERSION`, `SHELL`/`MAKE`/`MAKEFLAGS`/`MAKELEVEL`/`CURDIR`
    /// defaults, and a copy of the process environment, per spec.md
    /// §4.H.1.
    pub fn new() -> SymbolTable {
        let mut st = SymbolTable {
            symbols: HashMap::new(),
            push_stacks: HashMap::new(),
            export_default: false,
            warn_undefined: false,
            fatal_undefined: false,
        };

        let here = Pos::start(Rc::from("<builtin>"));
        st.symbols.insert(
            ".VARIABLES".to_string(),
            Entry::new(Value::Callback, Origin::Default, here.clone(), false),
        );
        st.symbols.insert(
            "MAKE_VERSION".to_string(),
            Entry::new(Value::Str("4.3".to_string()), Origin::Default, here.clone(), false),
        );

        for (name, default) in BUILTIN_DEFAULTS {
            let value = env::var(name).unwrap_or_else(|_| (*default).to_string());
            st.symbols.insert(
                (*name).to_string(),
                Entry::new(Value::Str(value), Origin::Default, here.clone(), false),
            );
        }
        if env::var("SHELL").is_err() {
            st.symbols.insert(
                "SHELL".to_string(),
                Entry::new(Value::Str("/bin/sh".to_string()), Origin::Default, here.clone(), false),
            );
        }

        for (key, value) in env::vars() {
            if BUILTIN_DEFAULTS.iter().any(|(n, _)| *n == key) || key == "SHELL" {
                continue;
            }
            st.symbols.insert(
                key,
                Entry::new(Value::Str(value), Origin::Environment, here.clone(), false),
            );
        }

        st
    }

    /// add defines or overwrites `name`, honoring command-line
    /// immutability and precedence (spec.md §4.H).
    pub fn add(&mut self, name: &str, value: Value, origin: Origin, pos: Pos) {
        if let Some(existing) = self.symbols.get(&*name) {
            if matches!(existing.origin, Origin::CommandLine) && !matches!(origin, Origin::CommandLine) {
                debug!(name, "ignoring assignment: command-line entry is immutable");
                return;
            }
            if existing.origin.precedence() > origin.precedence() {
                debug!(name, existing = ?existing.origin, incoming = ?origin, "lower-precedence assignment ignored");
                return;
            }
            if matches!(existing.origin, Origin::Default) {
                warn!(name, "overriding built-in variable");
            }
        }
        let entry = Entry::new(value, origin, pos, self.export_default);
        self.symbols.insert(name.to_string(), entry);
    }

    /// maybe_add implements `?=`: a no-op if `name` is already defined.
    pub fn maybe_add(&mut self, name: &str, value: Value, origin: Origin, pos: Pos) {
        if self.symbols.contains_key(name) {
            return;
        }
        self.add(name, value, origin, pos);
    }

    /// add_automatic installs a one-letter automatic variable, valid only
    /// for the scope of one recipe expansion (callers push/pop around
    /// it).
    pub fn add_automatic(&mut self, name: &str, value: String, pos: Pos) {
        debug_assert!(AUTOMATIC_VARIABLES.contains(&name));
        self.symbols.insert(
            name.to_string(),
            Entry::new(Value::Str(value), Origin::Automatic, pos, false),
        );
    }

    /// append implements `+=` per spec.md §4.H: absent -> `add`
    /// (recursive); present+recursive -> append expression to
    /// `appends`; present+simple -> evaluate and space-concatenate now.
    pub fn append(&mut self, name: &str, rhs: Node, pos: Pos) -> MakeResult<()> {
        match self.symbols.get_mut(name) {
            None => {
                self.add(name, Value::Expr(rhs), Origin::File, pos);
                Ok(())
            }
            Some(entry) => {
                match &entry.value {
                    Value::Expr(_) | Value::Callback => {
                        entry.appends.push(rhs);
                        Ok(())
                    }
                    Value::Str(s) => {
                        let addition = rhs.eval(self)?;
                        let entry = self.symbols.get_mut(name).expect("entry just looked up");
                        if let Value::Str(cur) = &mut entry.value {
                            if cur.is_empty() {
                                *cur = addition;
                            } else {
                                cur.push(' ');
                                cur.push_str(&addition);
                            }
                        }
                        let _ = s;
                        Ok(())
                    }
                }
            }
        }
    }

    /// fetch evaluates `name`'s current value, handling the
    /// `$(VAR:pat1=pat2)` substitution-reference shorthand first.
    pub fn fetch(&mut self, name: &str) -> MakeResult<String> {
        if let Some((var, pat1, pat2)) = parse_substitution_reference(name) {
            let base = self.fetch(&var)?;
            return Ok(apply_patsubst_words(&base, &pat1, &pat2));
        }

        let entry = match self.symbols.get(name) {
            None => {
                if self.fatal_undefined {
                    return Err(MakeError::eval(EvalErrorKind::UndefinedVariableFatal(name.to_string())));
                }
                if self.warn_undefined {
                    warn!(name, "undefined variable referenced");
                }
                return Ok(String::new());
            }
            Some(e) => e.clone(),
        };

        if entry.loop_depth > 0 {
            return Err(MakeError::eval(EvalErrorKind::RecursiveVariableLoop(name.to_string())));
        }

        match entry.value {
            Value::Str(s) => {
                let mut appended = s;
                let appends = entry.appends.clone();
                for a in appends {
                    let v = a.eval(self)?;
                    if !appended.is_empty() {
                        appended.push(' ');
                    }
                    appended.push_str(&v);
                }
                Ok(appended)
            }
            Value::Callback => Ok(self.variables_list()),
            Value::Expr(node) => {
                if let Some(e) = self.symbols.get_mut(name) {
                    e.loop_depth += 1;
                }
                let base = node.eval(self);
                if let Some(e) = self.symbols.get_mut(name) {
                    e.loop_depth = e.loop_depth.saturating_sub(1);
                }
                let mut base = base?;
                let appends = self.symbols.get(name).map(|e| e.appends.clone()).unwrap_or_default();
                for a in appends {
                    let v = a.eval(self)?;
                    if !base.is_empty() {
                        base.push(' ');
                    }
                    base.push_str(&v);
                }
                Ok(base)
            }
        }
    }

    fn variables_list(&self) -> String {
        let mut names: Vec<&str> = self.symbols.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names.join(" ")
    }

    /// push moves the current entry for `name` (or `None`) onto an undo
    /// stack, implementing `foreach`/`call` scoping.
    pub fn push(&mut self, name: &str) {
        let cur = self.symbols.remove(name);
        self.push_stacks.entry(name.to_string()).or_default().push(cur);
    }

    /// pop restores the entry pushed by the matching `push`, deleting the
    /// current binding if nothing had been pushed.
    pub fn pop(&mut self, name: &str) {
        if let Some(stack) = self.push_stacks.get_mut(name) {
            if let Some(prior) = stack.pop() {
                match prior {
                    Some(entry) => {
                        self.symbols.insert(name.to_string(), entry);
                    }
                    None => {
                        self.symbols.remove(name);
                    }
                }
                if stack.is_empty() {
                    self.push_stacks.remove(name);
                }
                return;
            }
        }
        self.symbols.remove(name);
    }

    /// export sets the export bit on `name`, if present and exportable.
    pub fn export(&mut self, name: &str) {
        if let Some(e) = self.symbols.get_mut(name) {
            if !e.never_export {
                e.export = true;
            }
        }
    }

    /// unexport clears the export bit on `name`.
    pub fn unexport(&mut self, name: &str) {
        if let Some(e) = self.symbols.get_mut(name) {
            e.export = false;
        }
    }

    /// export_all exports every exportable entry and flips
    /// `export_default` so future `add`s inherit the export bit.
    pub fn export_all(&mut self) {
        self.export_default = true;
        for e in self.symbols.values_mut() {
            if !e.never_export {
                e.export = true;
            }
        }
    }

    /// unexport_all clears every export bit and flips `export_default`
    /// off.
    pub fn unexport_all(&mut self) {
        self.export_default = false;
        for e in self.symbols.values_mut() {
            e.export = false;
        }
    }

    /// origin reports `name`'s provenance, or "undefined".
    pub fn origin(&self, name: &str) -> &'static str {
        match self.symbols.get(name) {
            None => "undefined",
            Some(e) => e.origin.as_str(),
        }
    }

    /// flavor reports "recursive"/"simple"/"undefined". Environment
    /// entries report "recursive" for GNU Make compatibility even though
    /// stored as plain strings (spec.md §4.H).
    pub fn flavor(&self, name: &str) -> &'static str {
        match self.symbols.get(name) {
            None => "undefined",
            Some(e) => match (&e.value, e.origin) {
                (_, Origin::Environment) => "recursive",
                (Value::Expr(_), _) | (Value::Callback, _) => "recursive",
                (Value::Str(_), _) => "simple",
            },
        }
    }

    /// value returns the unexpanded textual form of `name`: the
    /// rendered expression tree for recursive variables, the raw string
    /// otherwise.
    pub fn value(&self, name: &str) -> Option<String> {
        self.symbols.get(name).map(|e| match &e.value {
            Value::Str(s) => s.clone(),
            Value::Expr(n) => n.render(),
            Value::Callback => self.variables_list(),
        })
    }

    /// undefine removes `name` entirely.
    pub fn undefine(&mut self, name: &str) {
        self.symbols.remove(name);
    }

    /// is_defined reports whether `name` currently has a binding.
    pub fn is_defined(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    /// get_exports evaluates every currently-exported entry, for the
    /// shell collaborator to pass down as a child process environment.
    pub fn get_exports(&mut self) -> MakeResult<HashMap<String, String>> {
        let names: Vec<String> = self
            .symbols
            .iter()
            .filter(|(_, e)| e.export)
            .map(|(n, _)| n.clone())
            .collect();
        let mut out = HashMap::new();
        for n in names {
            let v = self.fetch(&n)?;
            out.insert(n, v);
        }
        Ok(out)
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable::new()
    }
}

/// parse_substitution_reference splits `NAME:pat1=pat2` into its three
/// parts, if `name` contains a `:` before any `=`.
fn parse_substitution_reference(name: &str) -> Option<(String, String, String)> {
    let colon = name.find(':')?;
    let rest = &name[colon + 1..];
    let eq = rest.find('=')?;
    let var = name[..colon].to_string();
    let pat1 = rest[..eq].to_string();
    let pat2 = rest[eq + 1..].to_string();
    Some((var, pat1, pat2))
}

/// apply_patsubst_words performs `$(VAR:pat1=pat2)`-style suffix
/// substitution on each whitespace-separated word of `text`.
fn apply_patsubst_words(text: &str, pat1: &str, pat2: &str) -> String {
    text.split_whitespace()
        .map(|w| {
            if let Some(stem) = pat1.strip_prefix('%') {
                if let Some(rest) = w.strip_suffix(stem) {
                    return pat2.replacen('%', rest, 1);
                }
                w.to_string()
            } else if let Some(stripped) = w.strip_suffix(pat1) {
                format!("{}{}", stripped, pat2)
            } else {
                w.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_fetch_simple() {
        let mut st = SymbolTable::new();
        st.add("FOO", Value::Str("bar".into()), Origin::File, Pos::start(Rc::from("-")));
        assert_eq!(st.fetch("FOO").unwrap(), "bar");
    }

    #[test]
    fn test_command_line_immutable_from_file() {
        let mut st = SymbolTable::new();
        st.add("FOO", Value::Str("cli".into()), Origin::CommandLine, Pos::start(Rc::from("-")));
        st.add("FOO", Value::Str("file".into()), Origin::File, Pos::start(Rc::from("-")));
        assert_eq!(st.fetch("FOO").unwrap(), "cli");
    }

    #[test]
    fn test_maybe_add_is_noop_when_defined() {
        let mut st = SymbolTable::new();
        st.add("FOO", Value::Str("one".into()), Origin::File, Pos::start(Rc::from("-")));
        st.maybe_add("FOO", Value::Str("two".into()), Origin::File, Pos::start(Rc::from("-")));
        assert_eq!(st.fetch("FOO").unwrap(), "one");
    }

    #[test]
    fn test_push_pop_restores_prior_binding() {
        let mut st = SymbolTable::new();
        st.add("FOO", Value::Str("one".into()), Origin::File, Pos::start(Rc::from("-")));
        st.push("FOO");
        st.add("FOO", Value::Str("two".into()), Origin::File, Pos::start(Rc::from("-")));
        assert_eq!(st.fetch("FOO").unwrap(), "two");
        st.pop("FOO");
        assert_eq!(st.fetch("FOO").unwrap(), "one");
    }

    #[test]
    fn test_push_pop_on_never_defined_deletes() {
        let mut st = SymbolTable::new();
        st.push("NEWVAR");
        st.add("NEWVAR", Value::Str("x".into()), Origin::File, Pos::start(Rc::from("-")));
        st.pop("NEWVAR");
        assert!(!st.is_defined("NEWVAR"));
    }

    #[test]
    fn test_fetch_absent_is_empty() {
        let mut st = SymbolTable::new();
        assert_eq!(st.fetch("NOPE").unwrap(), "");
        assert_eq!(st.origin("NOPE"), "undefined");
    }

    #[test]
    fn test_fatal_undefined_promotes_to_error() {
        let mut st = SymbolTable::new();
        st.fatal_undefined = true;
        assert!(st.fetch("NOPE").is_err());
    }

    #[test]
    fn test_substitution_reference() {
        let mut st = SymbolTable::new();
        st.add("SRC", Value::Str("a.c b.c c.c".into()), Origin::File, Pos::start(Rc::from("-")));
        assert_eq!(st.fetch("SRC:.c=.o").unwrap(), "a.o b.o c.o");
    }

    #[test]
    fn test_environment_flavor_is_recursive() {
        std::env::set_var("MKEVAL_TEST_VAR", "x");
        let st = SymbolTable::new();
        assert_eq!(st.flavor("MKEVAL_TEST_VAR"), "recursive");
        std::env::remove_var("MKEVAL_TEST_VAR");
    }
}

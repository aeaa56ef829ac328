//! tokenizer implements the statement tokenizer (spec.md §4.D): the
//! state machine that disambiguates rule LHS from assignment LHS
//! without lookahead beyond one character, plus the variable-reference,
//! rule-RHS, and assignment-RHS sub-tokenizers it calls into.
//!
//! Grounded on `original_source/pymake.py`'s `tokenize_statement` /
//! `tokenize_statement_LHS` / `tokenize_rule_prereq_or_assign` /
//! `tokenize_rule_RHS` / `tokenize_assign_RHS` / `tokenize_variable_ref`.

use std::rc::Rc;

use crate::ast::{AssignFlavor, Node, RuleKind};
use crate::directive;
use crate::error::{MakeError, MakeResult, ParseErrorKind};
use crate::pos::{PChar, PString, Pos};
use crate::recipe;
use crate::scanner::Scanner;
use crate::vline::{VLineKind, VirtualLine};

/// lines_from_text builds a Vec<VirtualLine> from raw text, for the
/// `eval`/`call` builtins which must re-tokenize arbitrary expanded
/// text as makefile statements.
pub fn lines_from_text(text: &str, file: Rc<str>) -> Vec<VirtualLine> {
    crate::vline::VLineBuilder::new(file, text, '\t').collect()
}

/// parse_expression_text tokenizes a flat string as a single Expression
/// (handling `$` references but no rule/assignment/directive syntax),
/// used by `call`/`value`/`eval`-adjacent paths.
pub fn parse_expression_text(text: &str, pos: Pos) -> MakeResult<Node> {
    let mut ps = PString::new();
    for (i, ch) in text.chars().enumerate() {
        ps.push(PChar::new(ch, Pos::new(pos.file.clone(), pos.row, pos.col + i)));
    }
    let mut scanner = Scanner::new(ps.as_slice().to_vec());
    tokenize_expression(&mut scanner, |_| false)
}

/// tokenize_program walks a sequence of virtual lines end to end,
/// producing the top-level node list. This is the driver both `eval.rs`
/// and deferred `LineBlock`s (conditional arms, `eval`/`call` bodies)
/// call into.
pub fn tokenize_program(lines: &[VirtualLine]) -> MakeResult<Vec<Node>> {
    let mut scanner = Scanner::new(lines.to_vec());
    let mut nodes = Vec::new();

    while let Some(vl) = scanner.next() {
        if vl.is_blank() || vl.is_comment() {
            continue;
        }
        if vl.kind == VLineKind::Recipe {
            let pos = vl.chars.first_pos().unwrap_or_else(|| Pos::start(Rc::from("-")));
            return Err(MakeError::parse(
                pos.file.clone(),
                pos.row,
                pos.col,
                ParseErrorKind::RecipeCommencesBeforeFirstTarget,
            ));
        }

        if let Some(node) = directive::try_parse_directive(&vl, &mut scanner)? {
            nodes.push(node);
            continue;
        }

        nodes.push(tokenize_statement(&vl, &mut scanner)?);
    }

    Ok(nodes)
}

/// tokenize_statement converts one statement virtual line into an
/// Assignment, Rule, or bare Expression node, per spec.md §4.D.
pub fn tokenize_statement(vl: &VirtualLine, lines: &mut Scanner<VirtualLine>) -> MakeResult<Node> {
    let chars = strip_comment(&vl.chars);
    let mut scanner = Scanner::new(chars.as_slice().to_vec());

    match split_lhs(&mut scanner)? {
        LhsSplit::Assignment(lhs, flavor, op_pos) => {
            let rhs = tokenize_assign_rhs(&mut scanner)?;
            Ok(Node::AssignmentExpression {
                lhs: Box::new(lhs),
                op: flavor,
                rhs: Box::new(rhs),
                pos: op_pos,
            })
        }
        LhsSplit::Rule(targets, kind, op_pos) => {
            tokenize_rule_tail(targets, kind, op_pos, &mut scanner, lines)
        }
        LhsSplit::Bare(expr) => check_bare_expression(expr, vl),
    }
}

/// check_bare_expression implements `original_source/pymake.py`'s
/// observation that "a lone expression in GNU make usually triggers the
/// 'missing separator' error": a statement line with neither an
/// assignment nor a rule operator is only legal when every non-literal
/// child is a side-effecting function call (`$(info ...)`, `$(eval
/// ...)`, ...); anything else — stray text, a bare variable reference —
/// is a parse error rather than being silently echoed.
fn check_bare_expression(expr: Node, vl: &VirtualLine) -> MakeResult<Node> {
    let Node::Expression(children) = &expr else {
        return Ok(expr);
    };
    let only_calls_and_blanks = children.iter().all(|c| match c {
        Node::FunctionCall { .. } => true,
        Node::Literal(s) => s.render().trim().is_empty(),
        _ => false,
    });
    if only_calls_and_blanks {
        return Ok(expr);
    }
    let pos = vl.chars.first_pos().unwrap_or_else(|| Pos::start(Rc::from("-")));
    Err(MakeError::parse(pos.file, pos.row, pos.col, ParseErrorKind::MissingSeparator))
}

enum LhsSplit {
    Assignment(Node, AssignFlavor, Pos),
    Rule(Node, RuleKind, Pos),
    Bare(Node),
}

/// split_lhs scans the left-hand side of a statement, producing either
/// an assignment operator, a rule operator, or (at end of line with
/// neither found) a bare expression — typically a side-effecting
/// function call like `$(info ...)` alone on a line.
fn split_lhs(scanner: &mut Scanner<PChar>) -> MakeResult<LhsSplit> {
    let mut buf = PString::new();
    let mut children = Vec::new();

    while let Some(c) = scanner.next() {
        match c.ch {
            '$' => {
                flush(&mut buf, &mut children);
                children.push(tokenize_variable_ref(scanner, &c.pos)?);
            }
            '\\' => {
                buf.push(c.clone());
                if let Some(next) = scanner.next() {
                    buf.push(next);
                }
            }
            ':' => {
                let pos = c.pos.clone();
                if scanner.peek().map(|n| n.ch) == Some(':') {
                    scanner.next();
                    if scanner.peek().map(|n| n.ch) == Some('=') {
                        scanner.next();
                        flush(&mut buf, &mut children);
                        return Ok(LhsSplit::Assignment(Node::Expression(children), AssignFlavor::SimplePosix, pos));
                    }
                    flush(&mut buf, &mut children);
                    return Ok(LhsSplit::Rule(Node::Expression(children), RuleKind::Double, pos));
                }
                if scanner.peek().map(|n| n.ch) == Some('=') {
                    scanner.next();
                    flush(&mut buf, &mut children);
                    return Ok(LhsSplit::Assignment(Node::Expression(children), AssignFlavor::Simple, pos));
                }
                flush(&mut buf, &mut children);
                return Ok(LhsSplit::Rule(Node::Expression(children), RuleKind::Single, pos));
            }
            '?' if scanner.peek().map(|n| n.ch) == Some('=') => {
                let pos = c.pos.clone();
                scanner.next();
                flush(&mut buf, &mut children);
                return Ok(LhsSplit::Assignment(Node::Expression(children), AssignFlavor::Conditional, pos));
            }
            '+' if scanner.peek().map(|n| n.ch) == Some('=') => {
                let pos = c.pos.clone();
                scanner.next();
                flush(&mut buf, &mut children);
                return Ok(LhsSplit::Assignment(Node::Expression(children), AssignFlavor::Append, pos));
            }
            '!' if scanner.peek().map(|n| n.ch) == Some('=') => {
                let pos = c.pos.clone();
                scanner.next();
                flush(&mut buf, &mut children);
                return Ok(LhsSplit::Assignment(Node::Expression(children), AssignFlavor::Shell, pos));
            }
            '=' => {
                let pos = c.pos.clone();
                flush(&mut buf, &mut children);
                return Ok(LhsSplit::Assignment(Node::Expression(children), AssignFlavor::Recursive, pos));
            }
            _ => buf.push(c),
        }
    }

    flush(&mut buf, &mut children);
    Ok(LhsSplit::Bare(Node::Expression(children)))
}

/// tokenize_rule_tail continues after a RuleOp: tokenizes prerequisites
/// (and order-only prerequisites after `|`), then either an inline `;`
/// recipe or subsequent tab-prefixed recipe lines.
fn tokenize_rule_tail(
    targets: Node,
    kind: RuleKind,
    pos: Pos,
    scanner: &mut Scanner<PChar>,
    lines: &mut Scanner<VirtualLine>,
) -> MakeResult<Node> {
    match tokenize_rule_rhs(scanner)? {
        None => {
            // RHS contained an assignment operator: rewind and
            // retokenize the whole tail as a target-specific variable
            // assignment (spec.md §4.D.2).
            let rhs = tokenize_assign_rhs(scanner)?;
            return Ok(Node::AssignmentExpression {
                lhs: Box::new(targets),
                op: AssignFlavor::Recursive,
                rhs: Box::new(rhs),
                pos,
            });
        }
        Some((prereqs, order_only)) => {
            let recipes = if scanner.peek().map(|c| c.ch) == Some(';') {
                scanner.next();
                let rest: PString = scanner.rest().into_iter().collect();
                recipe::tokenize_inline_recipe(rest)?
            } else {
                recipe::collect_recipes(lines)?
            };

            Ok(Node::RuleExpression {
                targets: Box::new(targets),
                op: kind,
                prereqs: Box::new(prereqs),
                order_only: Box::new(order_only),
                recipes: Box::new(recipes),
                pos,
            })
        }
    }
}

/// tokenize_rule_rhs scans prerequisites (and an optional `|
/// order-only-prerequisites` tail), per spec.md §4.D.2. Returns `None`
/// if an assignment operator appears anywhere in the RHS, signalling
/// the caller to rewind and retokenize as a target-specific assignment.
fn tokenize_rule_rhs(scanner: &mut Scanner<PChar>) -> MakeResult<Option<(Node, Node)>> {
    scanner.push_state();
    let prereqs = match tokenize_whitespace_separated(scanner, |c| c == ';' || c == '|')? {
        None => {
            scanner.pop_state();
            return Ok(None);
        }
        Some(items) => items,
    };

    let order_only = if scanner.peek().map(|c| c.ch) == Some('|') {
        scanner.next();
        match tokenize_whitespace_separated(scanner, |c| c == ';')? {
            None => {
                scanner.pop_state();
                return Ok(None);
            }
            Some(items) => items,
        }
    } else {
        Vec::new()
    };

    scanner.commit_state();
    Ok(Some((
        Node::PrerequisiteList(prereqs),
        Node::PrerequisiteList(order_only),
    )))
}

/// tokenize_whitespace_separated scans whitespace-separated Expression
/// items, stopping (without consuming) at the first character for
/// which `stop` is true, or at `#`. Returns `None` if any of the
/// assignment operators appear at depth 0.
pub fn tokenize_whitespace_separated(
    scanner: &mut Scanner<PChar>,
    stop: impl Fn(char) -> bool,
) -> MakeResult<Option<Vec<Node>>> {
    let mut items = Vec::new();
    let mut buf = PString::new();
    let mut children = Vec::new();

    macro_rules! flush_word {
        () => {
            flush(&mut buf, &mut children);
            if !children.is_empty() {
                items.push(Node::Expression(std::mem::take(&mut children)));
            }
        };
    }

    while let Some(c) = scanner.peek().cloned() {
        if stop(c.ch) {
            break;
        }
        match c.ch {
            '#' => break,
            ws if ws.is_whitespace() => {
                scanner.next();
                flush_word!();
            }
            '$' => {
                scanner.next();
                flush(&mut buf, &mut children);
                children.push(tokenize_variable_ref(scanner, &c.pos)?);
            }
            '\\' => {
                scanner.next();
                buf.push(c);
                if let Some(next) = scanner.next() {
                    buf.push(next);
                }
            }
            '=' | ':' | '?' | '+' | '!' if is_assign_operator_start(scanner, c.ch) => {
                return Ok(None);
            }
            _ => {
                scanner.next();
                buf.push(c);
            }
        }
    }
    flush_word!();
    Ok(Some(items))
}

fn is_assign_operator_start(scanner: &Scanner<PChar>, ch: char) -> bool {
    match ch {
        '=' => true,
        ':' => scanner.lookahead(1).map(|c| c.ch) == Some('='),
        '?' | '+' | '!' => scanner.lookahead(1).map(|c| c.ch) == Some('='),
        _ => false,
    }
}

/// tokenize_assign_rhs preserves internal whitespace, stripping only
/// leading whitespace, per spec.md §4.D.3.
fn tokenize_assign_rhs(scanner: &mut Scanner<PChar>) -> MakeResult<Node> {
    while let Some(c) = scanner.peek() {
        if c.ch.is_whitespace() {
            scanner.next();
        } else {
            break;
        }
    }

    let mut children = Vec::new();
    let mut buf = PString::new();

    while let Some(c) = scanner.next() {
        match c.ch {
            '$' => {
                flush(&mut buf, &mut children);
                children.push(tokenize_variable_ref(scanner, &c.pos)?);
            }
            '#' => break,
            '\\' => {
                buf.push(c.clone());
                if let Some(next) = scanner.next() {
                    buf.push(next);
                }
            }
            _ => buf.push(c),
        }
    }
    flush(&mut buf, &mut children);
    Ok(Node::Expression(children))
}

/// tokenize_variable_ref implements spec.md §4.D.1, entered right after
/// consuming the `$`.
pub fn tokenize_variable_ref(scanner: &mut Scanner<PChar>, dollar_pos: &Pos) -> MakeResult<Node> {
    let open = match scanner.next() {
        None => {
            return Ok(Node::Literal(PString::from_chars(vec![PChar::new('$', dollar_pos.clone())])));
        }
        Some(c) => c,
    };

    match open.ch {
        '$' => {
            let mut ps = PString::new();
            ps.push(PChar::new('$', dollar_pos.clone()));
            Ok(Node::Literal(ps))
        }
        '(' | '{' => {
            let close = if open.ch == '(' { ')' } else { '}' };
            let children = tokenize_until_close(scanner, open.ch, close, dollar_pos)?;
            Ok(build_varref_or_call(children, dollar_pos.clone()))
        }
        other if !other.is_whitespace() => {
            let mut ps = PString::new();
            ps.push(open);
            Ok(Node::VarRef(vec![Node::Literal(ps)]))
        }
        _ => {
            scanner.pushback();
            let mut ps = PString::new();
            ps.push(PChar::new('$', dollar_pos.clone()));
            Ok(Node::Literal(ps))
        }
    }
}

/// tokenize_until_close reads characters up to the matching close
/// bracket, recursing through nested `$(...)`/`${...}`, and returns the
/// accumulated child node list (the raw contents, not yet split into
/// function arguments).
fn tokenize_until_close(
    scanner: &mut Scanner<PChar>,
    open: char,
    close: char,
    start_pos: &Pos,
) -> MakeResult<Vec<Node>> {
    let mut depth = 1usize;
    let mut children = Vec::new();
    let mut buf = PString::new();

    loop {
        let c = match scanner.next() {
            None => {
                return Err(MakeError::parse(
                    start_pos.file.clone(),
                    start_pos.row,
                    start_pos.col,
                    ParseErrorKind::UnterminatedVarRef,
                ));
            }
            Some(c) => c,
        };

        if c.ch == open {
            depth += 1;
            buf.push(c);
        } else if c.ch == close {
            depth -= 1;
            if depth == 0 {
                break;
            }
            buf.push(c);
        } else if c.ch == '$' {
            flush(&mut buf, &mut children);
            children.push(tokenize_variable_ref(scanner, &c.pos)?);
        } else {
            buf.push(c);
        }
    }

    flush(&mut buf, &mut children);
    Ok(children)
}

/// build_varref_or_call inspects the accumulated children of a
/// `$(...)`: if the leading literal's first word names a builtin
/// function, splits the remainder into comma-separated arguments and
/// returns a FunctionCall; otherwise returns a plain VarRef.
fn build_varref_or_call(mut children: Vec<Node>, pos: Pos) -> Node {
    if let Some(Node::Literal(first)) = children.first() {
        let rendered = first.render();
        let mut word_end = 0;
        for (i, ch) in rendered.char_indices() {
            if ch.is_whitespace() {
                word_end = i;
                break;
            }
        }
        if word_end > 0 {
            let word = &rendered[..word_end];
            if let Some(name) = crate::ast::builtin_function_name(word) {
                let ws_end = rendered[word_end..]
                    .find(|c: char| !c.is_whitespace())
                    .map(|i| word_end + i)
                    .unwrap_or(rendered.len());
                let remainder_chars: Vec<PChar> = first.as_slice()[ws_end.min(first.len())..].to_vec();
                let mut rest = vec![Node::Literal(PString::from_chars(remainder_chars))];
                rest.extend(children.drain(1..));
                let max_args = crate::functions::ARITIES
                    .iter()
                    .find(|(n, _, _)| *n == name)
                    .map(|(_, _, max)| *max)
                    .unwrap_or(usize::MAX);
                let args = split_function_args(rest, max_args);
                return Node::FunctionCall { name, args, pos };
            }
        }
    }
    Node::VarRef(children)
}

/// split_function_args implements the comma-splitting algorithm
/// grounded on `functions_base.py`'s `FunctionWithArguments._parse_args`:
/// only commas inside `Literal` nodes separate arguments; leading
/// whitespace of argument 0 is stripped; once the final argument slot
/// is reached, remaining commas are swallowed as literal content.
fn split_function_args(tokens: Vec<Node>, max_args: usize) -> Vec<Node> {
    let mut args: Vec<Vec<Node>> = Vec::new();
    let mut arg_idx = 0usize;
    let mut final_arg_reached = max_args <= 1;
    let mut tokens_iter = tokens.into_iter();

    while let Some(t) = tokens_iter.next() {
        if final_arg_reached {
            push_arg(&mut args, arg_idx, t);
            continue;
        }

        let Node::Literal(lit) = t else {
            push_arg(&mut args, arg_idx, t);
            continue;
        };

        let mut cur = PString::new();
        let chars_iter = lit.as_slice().iter().cloned();
        for pc in chars_iter {
            if final_arg_reached {
                cur.push(pc);
                continue;
            }
            if pc.ch != ',' {
                if arg_idx == 0 && pc.ch.is_whitespace() && cur.is_empty() {
                    continue;
                }
                cur.push(pc);
                continue;
            }

            if !cur.is_empty() {
                push_arg(&mut args, arg_idx, Node::Literal(std::mem::take(&mut cur)));
            }
            arg_idx += 1;

            if arg_idx + 1 >= max_args {
                final_arg_reached = true;
            }
        }
        if !cur.is_empty() {
            push_arg(&mut args, arg_idx, Node::Literal(cur));
        }
    }

    args.into_iter()
        .map(|children| {
            if children.len() == 1 {
                children.into_iter().next().unwrap()
            } else {
                Node::Expression(children)
            }
        })
        .collect()
}

fn push_arg(args: &mut Vec<Vec<Node>>, idx: usize, node: Node) {
    if args.len() <= idx {
        args.resize_with(idx + 1, Vec::new);
    }
    args[idx].push(node);
}

/// tokenize_expression is a minimal standalone entry point used for
/// re-parsing arbitrary text (`call`/`eval`/conditional-argument
/// tokenizing) as a single Expression, honoring `$` references.
pub fn tokenize_expression(scanner: &mut Scanner<PChar>, stop: impl Fn(char) -> bool) -> MakeResult<Node> {
    let mut children = Vec::new();
    let mut buf = PString::new();

    while let Some(c) = scanner.peek().cloned() {
        if stop(c.ch) {
            break;
        }
        scanner.next();
        match c.ch {
            '$' => {
                flush(&mut buf, &mut children);
                children.push(tokenize_variable_ref(scanner, &c.pos)?);
            }
            '\\' => {
                buf.push(c);
                if let Some(next) = scanner.next() {
                    buf.push(next);
                }
            }
            _ => buf.push(c),
        }
    }
    flush(&mut buf, &mut children);
    Ok(Node::Expression(children))
}

/// strip_comment hides everything from an unescaped, unexpanded `#` to
/// end of line; makefile comments are invisible to the statement
/// tokenizer but remain addressable in the source.
fn strip_comment(chars: &PString) -> PString {
    let mut out = PString::new();
    let mut iter = chars.as_slice().iter().peekable();
    let mut in_comment = false;
    while let Some(c) = iter.next() {
        if in_comment {
            let mut hidden = c.clone();
            hidden.hide = true;
            out.push(hidden);
            continue;
        }
        if c.ch == '\\' && iter.peek().map(|n| n.ch) == Some('#') {
            out.push(c.clone());
            if let Some(n) = iter.next() {
                out.push(n.clone());
            }
            continue;
        }
        if c.ch == '#' {
            in_comment = true;
            let mut hidden = c.clone();
            hidden.hide = true;
            out.push(hidden);
            continue;
        }
        out.push(c.clone());
    }
    out
}

fn flush(buf: &mut PString, children: &mut Vec<Node>) {
    if !buf.is_empty() {
        children.push(Node::Literal(std::mem::take(buf)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vl(s: &str) -> VirtualLine {
        crate::vline::VLineBuilder::new(Rc::from("-"), s, '\t').next().unwrap()
    }

    #[test]
    fn test_simple_assignment() {
        let mut lines = Scanner::new(Vec::new());
        let node = tokenize_statement(&vl("FOO := bar"), &mut lines).unwrap();
        match node {
            Node::AssignmentExpression { op, .. } => assert_eq!(op, AssignFlavor::Simple),
            _ => panic!("expected assignment"),
        }
    }

    #[test]
    fn test_append_assignment() {
        let mut lines = Scanner::new(Vec::new());
        let node = tokenize_statement(&vl("X += world"), &mut lines).unwrap();
        match node {
            Node::AssignmentExpression { op, .. } => assert_eq!(op, AssignFlavor::Append),
            _ => panic!("expected assignment"),
        }
    }

    #[test]
    fn test_rule_with_inline_recipe() {
        let mut lines = Scanner::new(Vec::new());
        let node = tokenize_statement(&vl("all:;@:"), &mut lines).unwrap();
        match node {
            Node::RuleExpression { op, .. } => assert_eq!(op, RuleKind::Single),
            _ => panic!("expected rule"),
        }
    }

    #[test]
    fn test_double_colon_rule() {
        let mut lines = Scanner::new(Vec::new());
        let node = tokenize_statement(&vl("all::"), &mut lines).unwrap();
        match node {
            Node::RuleExpression { op, .. } => assert_eq!(op, RuleKind::Double),
            _ => panic!("expected double-colon rule"),
        }
    }

    #[test]
    fn test_bare_expression_is_function_call() {
        let mut lines = Scanner::new(Vec::new());
        let node = tokenize_statement(&vl("$(info hi)"), &mut lines).unwrap();
        match node {
            Node::Expression(children) => match &children[0] {
                Node::FunctionCall { name, .. } => assert_eq!(*name, "info"),
                _ => panic!("expected function call inside bare expression"),
            },
            _ => panic!("expected bare expression"),
        }
    }

    #[test]
    fn test_bare_stray_text_is_missing_separator() {
        let mut lines = Scanner::new(Vec::new());
        let err = tokenize_statement(&vl("hello world"), &mut lines).unwrap_err();
        match err {
            MakeError::Parse { kind: ParseErrorKind::MissingSeparator, .. } => {}
            other => panic!("expected MissingSeparator, got {:?}", other),
        }
    }

    #[test]
    fn test_var_ref_one_char() {
        let mut lines = Scanner::new(Vec::new());
        let node = tokenize_statement(&vl("X := $@"), &mut lines).unwrap();
        if let Node::AssignmentExpression { rhs, .. } = node {
            if let Node::Expression(children) = *rhs {
                assert!(matches!(children[0], Node::VarRef(_)));
                return;
            }
        }
        panic!("expected VarRef in rhs");
    }

    #[test]
    fn test_dollar_dollar_is_literal() {
        let mut lines = Scanner::new(Vec::new());
        let node = tokenize_statement(&vl("X := $$HOME"), &mut lines).unwrap();
        if let Node::AssignmentExpression { rhs, .. } = node {
            assert_eq!(rhs.render(), "$HOME");
        } else {
            panic!("expected assignment");
        }
    }
}

//! ast defines the symbol tree: a single tagged-union `Node` type
//! standing in for the deep class hierarchy the original parser used.
//! Every node exposes `render()` (reconstruct makefile text) and
//! `eval()` (produce the node's expanded string value, mutating the
//! symbol table as a side effect where applicable).

use crate::error::{MakeError, MakeResult, ParseErrorKind};
use crate::functions;
use crate::pos::{PString, Pos};
use crate::symtable::{Origin, SymbolTable, Value};
use crate::vline::VirtualLine;

/// AssignFlavor enumerates the six assignment operators GNU Make
/// recognises.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignFlavor {
    Recursive,  // =
    Simple,     // :=
    SimplePosix, // ::=
    Conditional, // ?=
    Append,     // +=
    Shell,      // !=
}

impl AssignFlavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignFlavor::Recursive => "=",
            AssignFlavor::Simple => ":=",
            AssignFlavor::SimplePosix => "::=",
            AssignFlavor::Conditional => "?=",
            AssignFlavor::Append => "+=",
            AssignFlavor::Shell => "!=",
        }
    }
}

/// RuleKind distinguishes single-colon from double-colon rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleKind {
    Single, // :
    Double, // ::
}

/// LineBlock is an unparsed, ordered collection of virtual lines held for
/// deferred parsing — conditional arm bodies and `define` bodies.
pub type LineBlock = Vec<VirtualLine>;

/// Node is the tagged union of every AST shape this crate produces.
#[derive(Clone, Debug)]
pub enum Node {
    Literal(PString),
    VarRef(Vec<Node>),
    Expression(Vec<Node>),
    AssignOp(AssignFlavor),
    RuleOp(RuleKind),
    AssignmentExpression {
        lhs: Box<Node>,
        op: AssignFlavor,
        rhs: Box<Node>,
        pos: Pos,
    },
    RuleExpression {
        targets: Box<Node>,
        op: RuleKind,
        prereqs: Box<Node>,
        order_only: Box<Node>,
        recipes: Box<Node>,
        pos: Pos,
    },
    PrerequisiteList(Vec<Node>),
    Recipe(Vec<Node>),
    RecipeList(Vec<Node>),
    ConditionalBlock {
        arms: Vec<(Box<Node>, LineBlock)>,
        else_body: Option<LineBlock>,
        pos: Pos,
    },
    DefineDirective {
        name: PString,
        body: LineBlock,
        pos: Pos,
    },
    IncludeDirective {
        optional: bool,
        paths: Vec<Node>,
        pos: Pos,
    },
    ExportDirective {
        names: Option<Vec<String>>,
        pos: Pos,
    },
    UnexportDirective {
        names: Option<Vec<String>>,
        pos: Pos,
    },
    OverrideDirective(Box<Node>),
    UndefineDirective {
        name: String,
        pos: Pos,
    },
    VpathDirective {
        pattern: Option<Box<Node>>,
        dirs: Option<Box<Node>>,
        pos: Pos,
    },
    FunctionCall {
        name: &'static str,
        args: Vec<Node>,
        pos: Pos,
    },
    Makefile(Vec<Node>),
}

impl Node {
    /// render reconstructs the makefile source text this node
    /// represents, honoring hidden characters in any embedded PString.
    pub fn render(&self) -> String {
        match self {
            Node::Literal(s) => s.render(),
            Node::VarRef(children) => {
                let inner: String = children.iter().map(Node::render).collect();
                format!("$({})", inner)
            }
            Node::Expression(children) => children.iter().map(Node::render).collect(),
            Node::AssignOp(flavor) => flavor.as_str().to_string(),
            Node::RuleOp(kind) => match kind {
                RuleKind::Single => ":".to_string(),
                RuleKind::Double => "::".to_string(),
            },
            Node::AssignmentExpression { lhs, op, rhs, .. } => {
                format!("{} {} {}", lhs.render(), op.as_str(), rhs.render())
            }
            Node::RuleExpression {
                targets,
                op,
                prereqs,
                order_only,
                recipes,
                ..
            } => {
                let op_str = match op {
                    RuleKind::Single => ":",
                    RuleKind::Double => "::",
                };
                let oo = order_only.render();
                let oo_part = if oo.is_empty() {
                    String::new()
                } else {
                    format!(" | {}", oo)
                };
                format!(
                    "{} {} {}{}\n{}",
                    targets.render(),
                    op_str,
                    prereqs.render(),
                    oo_part,
                    recipes.render()
                )
            }
            Node::PrerequisiteList(items) => items
                .iter()
                .map(Node::render)
                .collect::<Vec<_>>()
                .join(" "),
            Node::Recipe(children) => children.iter().map(Node::render).collect(),
            Node::RecipeList(items) => items
                .iter()
                .map(|r| format!("\t{}", r.render()))
                .collect::<Vec<_>>()
                .join("\n"),
            Node::ConditionalBlock { .. } => String::new(),
            Node::DefineDirective { name, .. } => format!("define {}", name.render()),
            Node::IncludeDirective { optional, paths, .. } => {
                let kw = if *optional { "-include" } else { "include" };
                format!(
                    "{} {}",
                    kw,
                    paths.iter().map(Node::render).collect::<Vec<_>>().join(" ")
                )
            }
            Node::ExportDirective { names, .. } => match names {
                Some(ns) => format!("export {}", ns.join(" ")),
                None => "export".to_string(),
            },
            Node::UnexportDirective { names, .. } => match names {
                Some(ns) => format!("unexport {}", ns.join(" ")),
                None => "unexport".to_string(),
            },
            Node::OverrideDirective(inner) => format!("override {}", inner.render()),
            Node::UndefineDirective { name, .. } => format!("undefine {}", name),
            Node::VpathDirective { pattern, dirs, .. } => {
                let mut s = "vpath".to_string();
                if let Some(p) = pattern {
                    s.push(' ');
                    s.push_str(&p.render());
                }
                if let Some(d) = dirs {
                    s.push(' ');
                    s.push_str(&d.render());
                }
                s
            }
            Node::FunctionCall { name, args, .. } => {
                format!(
                    "$({} {})",
                    name,
                    args.iter().map(Node::render).collect::<Vec<_>>().join(",")
                )
            }
            Node::Makefile(items) => items
                .iter()
                .map(Node::render)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// pos returns the best available source position for diagnostics.
    pub fn pos(&self) -> Option<Pos> {
        match self {
            Node::Literal(s) => s.first_pos(),
            Node::VarRef(c) | Node::Expression(c) => c.first().and_then(Node::pos),
            Node::AssignmentExpression { pos, .. }
            | Node::RuleExpression { pos, .. }
            | Node::ConditionalBlock { pos, .. }
            | Node::DefineDirective { pos, .. }
            | Node::IncludeDirective { pos, .. }
            | Node::ExportDirective { pos, .. }
            | Node::UnexportDirective { pos, .. }
            | Node::UndefineDirective { pos, .. }
            | Node::VpathDirective { pos, .. }
            | Node::FunctionCall { pos, .. } => Some(pos.clone()),
            _ => None,
        }
    }

    /// eval expands this node against `symtab`, returning its string
    /// value and applying any symbol-table mutation the node implies
    /// (assignment, export, define, ...).
    pub fn eval(&self, symtab: &mut SymbolTable) -> MakeResult<String> {
        match self {
            Node::Literal(s) => Ok(s.render()),

            Node::VarRef(children) => {
                let name: String = children
                    .iter()
                    .map(|c| c.eval(symtab))
                    .collect::<MakeResult<Vec<_>>>()?
                    .join("");
                symtab.fetch(&name)
            }

            Node::Expression(children) => {
                let mut out = String::new();
                for c in children {
                    out.push_str(&c.eval(symtab)?);
                }
                Ok(out)
            }

            Node::AssignOp(flavor) => Ok(flavor.as_str().to_string()),
            Node::RuleOp(_) => Ok(String::new()),

            Node::AssignmentExpression { lhs, op, rhs, pos } => {
                let name = lhs.eval(symtab)?.trim().to_string();
                match op {
                    AssignFlavor::Recursive => {
                        symtab.add(&name, Value::Expr((**rhs).clone()), Origin::File, pos.clone());
                        Ok(String::new())
                    }
                    AssignFlavor::Simple | AssignFlavor::SimplePosix => {
                        let v = rhs.eval(symtab)?;
                        symtab.add(&name, Value::Str(v), Origin::File, pos.clone());
                        Ok(String::new())
                    }
                    AssignFlavor::Conditional => {
                        symtab.maybe_add(&name, Value::Expr((**rhs).clone()), Origin::File, pos.clone());
                        Ok(String::new())
                    }
                    AssignFlavor::Append => {
                        symtab.append(&name, (**rhs).clone(), pos.clone())?;
                        Ok(String::new())
                    }
                    AssignFlavor::Shell => {
                        let cmd = rhs.eval(symtab)?;
                        let out = crate::shell::run(&cmd).map_err(MakeError::Shell)?;
                        symtab.add(&name, Value::Str(out), Origin::File, pos.clone());
                        Ok(String::new())
                    }
                }
            }

            Node::RuleExpression { .. } => Ok(String::new()),

            Node::PrerequisiteList(items) | Node::Recipe(items) => {
                let mut out = String::new();
                for (i, it) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    out.push_str(&it.eval(symtab)?);
                }
                Ok(out)
            }

            Node::RecipeList(_) => Ok(String::new()),

            Node::ConditionalBlock { arms, else_body, pos } => {
                for (cond, body) in arms {
                    let taken = !cond.eval(symtab)?.trim().is_empty();
                    if taken {
                        return eval_block(body, symtab);
                    }
                }
                if let Some(body) = else_body {
                    return eval_block(body, symtab);
                }
                let _ = pos;
                Ok(String::new())
            }

            Node::DefineDirective { name, body, pos } => {
                let text = render_block(body);
                symtab.add(
                    &name.render(),
                    Value::Str(text),
                    Origin::File,
                    pos.clone(),
                );
                Ok(String::new())
            }

            Node::IncludeDirective { optional, paths, pos } => {
                for p in paths {
                    let path = p.eval(symtab)?;
                    if let Err(e) = crate::eval::eval_file(&path, symtab) {
                        if *optional {
                            continue;
                        }
                        let _ = pos;
                        return Err(e);
                    }
                }
                Ok(String::new())
            }

            Node::ExportDirective { names, .. } => {
                match names {
                    None => symtab.export_all(),
                    Some(ns) => {
                        for n in ns {
                            symtab.export(n);
                        }
                    }
                }
                Ok(String::new())
            }

            Node::UnexportDirective { names, .. } => {
                match names {
                    None => symtab.unexport_all(),
                    Some(ns) => {
                        for n in ns {
                            symtab.unexport(n);
                        }
                    }
                }
                Ok(String::new())
            }

            Node::OverrideDirective(inner) => {
                if let Node::AssignmentExpression { lhs, rhs, pos, .. } = inner.as_ref() {
                    let name = lhs.eval(symtab)?.trim().to_string();
                    let v = rhs.eval(symtab)?;
                    symtab.add(&name, Value::Str(v), Origin::Override, pos.clone());
                }
                Ok(String::new())
            }

            Node::UndefineDirective { name, .. } => {
                symtab.undefine(name);
                Ok(String::new())
            }

            Node::VpathDirective { .. } => Ok(String::new()),

            Node::FunctionCall { name, args, pos } => {
                functions::call(name, args, symtab, pos)
            }

            Node::Makefile(items) => eval_block_nodes(items, symtab),
        }
    }
}

/// eval_block tokenizes a deferred LineBlock (the body of a conditional
/// arm) and evaluates it, concatenating each statement's output. This is
/// where the "deferred parsing" design point resolves: the block was
/// stored as raw VirtualLines at parse time and is only turned into
/// Nodes now, if this arm is actually taken.
fn eval_block(block: &LineBlock, symtab: &mut SymbolTable) -> MakeResult<String> {
    let nodes = crate::tokenizer::tokenize_program(block)?;
    eval_block_nodes(&nodes, symtab)
}

fn eval_block_nodes(nodes: &[Node], symtab: &mut SymbolTable) -> MakeResult<String> {
    let mut out = String::new();
    for n in nodes {
        out.push_str(&n.eval(symtab)?);
    }
    Ok(out)
}

fn render_block(block: &LineBlock) -> String {
    block
        .iter()
        .map(|vl| vl.chars.render())
        .collect::<Vec<_>>()
        .join("\n")
}

/// builtin_function_name reports whether `word` names one of this
/// crate's built-in functions (used by the variable-reference tokenizer
/// to decide whether `$(word ...)` is a FunctionCall or a VarRef).
pub fn builtin_function_name(word: &str) -> Option<&'static str> {
    functions::ARITIES.iter().find(|(n, _, _)| *n == word).map(|(n, _, _)| *n)
}

/// unterminated_var_ref_error is a small helper so callers across the
/// tokenizer can produce a consistently-shaped parse error.
pub fn unterminated_var_ref_error(file: std::rc::Rc<str>, pos: &Pos) -> MakeError {
    MakeError::parse(file, pos.row, pos.col, ParseErrorKind::UnterminatedVarRef)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pos::PChar;
    use std::rc::Rc;

    fn lit(s: &str) -> Node {
        let mut ps = PString::new();
        for (i, ch) in s.chars().enumerate() {
            ps.push(PChar::new(ch, Pos::new(Rc::from("-"), 1, i + 1)));
        }
        Node::Literal(ps)
    }

    #[test]
    fn test_render_expression_concatenates() {
        let e = Node::Expression(vec![lit("a"), lit("b")]);
        assert_eq!(e.render(), "ab");
    }

    #[test]
    fn test_eval_literal() {
        let mut st = SymbolTable::new();
        assert_eq!(lit("x").eval(&mut st).unwrap(), "x");
    }

    #[test]
    fn test_eval_simple_assignment_then_fetch() {
        let mut st = SymbolTable::new();
        let assign = Node::AssignmentExpression {
            lhs: Box::new(lit("FOO")),
            op: AssignFlavor::Simple,
            rhs: Box::new(lit("bar")),
            pos: Pos::start(Rc::from("-")),
        };
        assign.eval(&mut st).unwrap();
        assert_eq!(st.fetch("FOO").unwrap(), "bar");
    }
}

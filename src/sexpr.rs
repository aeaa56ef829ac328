//! sexpr renders an `ast::Node` tree as an S-expression, for the CLI's
//! `-S` flag. Generalized from the teacher's `Display`-based rendering
//! idiom onto this crate's richer, position-carrying `Node` tree.

use crate::ast::{AssignFlavor, LineBlock, Node, RuleKind};

/// to_sexpr renders `node` as a single-line, fully-parenthesized
/// S-expression.
pub fn to_sexpr(node: &Node) -> String {
    match node {
        Node::Literal(s) => quote(&s.to_plain_string()),
        Node::VarRef(children) => paren("var-ref", &children.iter().map(to_sexpr).collect::<Vec<_>>()),
        Node::Expression(children) => paren("expr", &children.iter().map(to_sexpr).collect::<Vec<_>>()),
        Node::AssignOp(flavor) => quote(flavor.as_str()),
        Node::RuleOp(kind) => quote(match kind {
            RuleKind::Single => ":",
            RuleKind::Double => "::",
        }),
        Node::AssignmentExpression { lhs, op, rhs, .. } => paren(
            "assign",
            &[to_sexpr(lhs), quote(assign_flavor_name(op)), to_sexpr(rhs)],
        ),
        Node::RuleExpression {
            targets,
            op,
            prereqs,
            order_only,
            recipes,
            ..
        } => paren(
            "rule",
            &[
                to_sexpr(targets),
                quote(match op {
                    RuleKind::Single => "single",
                    RuleKind::Double => "double",
                }),
                to_sexpr(prereqs),
                to_sexpr(order_only),
                to_sexpr(recipes),
            ],
        ),
        Node::PrerequisiteList(items) => paren("prereqs", &items.iter().map(to_sexpr).collect::<Vec<_>>()),
        Node::Recipe(children) => paren("recipe", &children.iter().map(to_sexpr).collect::<Vec<_>>()),
        Node::RecipeList(items) => paren("recipe-list", &items.iter().map(to_sexpr).collect::<Vec<_>>()),
        Node::ConditionalBlock { arms, else_body, .. } => {
            let mut parts: Vec<String> = arms
                .iter()
                .map(|(cond, body)| paren("arm", &[to_sexpr(cond), block_sexpr(body)]))
                .collect();
            if let Some(body) = else_body {
                parts.push(paren("else", &[block_sexpr(body)]));
            }
            paren("conditional", &parts)
        }
        Node::DefineDirective { name, body, .. } => paren(
            "define",
            &[quote(&name.to_plain_string()), block_sexpr(body)],
        ),
        Node::IncludeDirective { optional, paths, .. } => paren(
            "include",
            &[
                quote(if *optional { "optional" } else { "required" }),
                paren("paths", &paths.iter().map(to_sexpr).collect::<Vec<_>>()),
            ],
        ),
        Node::ExportDirective { names, .. } => paren("export", &[name_list_sexpr(names)]),
        Node::UnexportDirective { names, .. } => paren("unexport", &[name_list_sexpr(names)]),
        Node::OverrideDirective(inner) => paren("override", &[to_sexpr(inner)]),
        Node::UndefineDirective { name, .. } => paren("undefine", &[quote(name)]),
        Node::VpathDirective { pattern, dirs, .. } => paren(
            "vpath",
            &[
                pattern.as_ref().map(|n| to_sexpr(n)).unwrap_or_else(|| quote("")),
                dirs.as_ref().map(|n| to_sexpr(n)).unwrap_or_else(|| quote("")),
            ],
        ),
        Node::FunctionCall { name, args, .. } => paren(
            &format!("call:{}", name),
            &args.iter().map(to_sexpr).collect::<Vec<_>>(),
        ),
        Node::Makefile(nodes) => paren("makefile", &nodes.iter().map(to_sexpr).collect::<Vec<_>>()),
    }
}

fn assign_flavor_name(op: &AssignFlavor) -> &'static str {
    match op {
        AssignFlavor::Recursive => "recursive",
        AssignFlavor::Simple => "simple",
        AssignFlavor::SimplePosix => "simple-posix",
        AssignFlavor::Conditional => "conditional",
        AssignFlavor::Append => "append",
        AssignFlavor::Shell => "shell",
    }
}

fn block_sexpr(block: &LineBlock) -> String {
    quote(
        &block
            .iter()
            .map(|vl| vl.chars.to_plain_string())
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

fn name_list_sexpr(names: &Option<Vec<String>>) -> String {
    match names {
        None => "(all)".to_string(),
        Some(ns) => paren("names", &ns.iter().map(|n| quote(n)).collect::<Vec<_>>()),
    }
}

fn paren(tag: &str, children: &[String]) -> String {
    if children.is_empty() {
        format!("({})", tag)
    } else {
        format!("({} {})", tag, children.join(" "))
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pos::{PString, Pos};
    use std::rc::Rc;

    fn lit(s: &str) -> Node {
        let mut ps = PString::new();
        for c in s.chars() {
            ps.push(crate::pos::PChar::new(c, Pos::start(Rc::from("-"))));
        }
        Node::Literal(ps)
    }

    #[test]
    fn test_literal_sexpr() {
        assert_eq!(to_sexpr(&lit("hi")), "\"hi\"");
    }

    #[test]
    fn test_assignment_sexpr() {
        let n = Node::AssignmentExpression {
            lhs: Box::new(lit("FOO")),
            op: AssignFlavor::Simple,
            rhs: Box::new(lit("bar")),
            pos: Pos::start(Rc::from("-")),
        };
        assert_eq!(to_sexpr(&n), "(assign \"FOO\" \"simple\" \"bar\")");
    }

    #[test]
    fn test_function_call_sexpr() {
        let n = Node::FunctionCall {
            name: "info",
            args: vec![lit("hi")],
            pos: Pos::start(Rc::from("-")),
        };
        assert_eq!(to_sexpr(&n), "(call:info \"hi\")");
    }
}

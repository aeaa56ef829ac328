//! recipe tokenizes and collects the tab-prefixed (or inline `;`)
//! command lines that follow a rule, per spec.md §4.E.

use std::rc::Rc;

use crate::ast::Node;
use crate::error::MakeResult;
use crate::pos::{PChar, PString, Pos};
use crate::scanner::Scanner;
use crate::vline::{VLineKind, VirtualLine};

/// collect_recipes drains recipe-kind (or blank/comment) virtual lines
/// immediately following a rule, pushing back the first line that is
/// none of those.
pub fn collect_recipes(lines: &mut Scanner<VirtualLine>) -> MakeResult<Node> {
    let mut recipes = Vec::new();
    loop {
        match lines.peek() {
            None => break,
            Some(vl) => {
                if vl.kind == VLineKind::Recipe {
                    let vl = lines.next().expect("peeked Some");
                    recipes.push(tokenize_recipe_line(&vl)?);
                } else if vl.is_blank() || vl.is_comment() {
                    lines.next();
                } else {
                    break;
                }
            }
        }
    }
    Ok(Node::RecipeList(recipes))
}

/// tokenize_inline_recipe builds a single Recipe from text following an
/// inline `;` on a rule line.
pub fn tokenize_inline_recipe(chars: PString) -> MakeResult<Node> {
    let vl = VirtualLine::new(chars, VLineKind::Recipe);
    let recipe = tokenize_recipe_line(&vl)?;
    Ok(Node::RecipeList(vec![recipe]))
}

/// tokenize_recipe_line turns the raw characters of one recipe virtual
/// line into a `Recipe` node: `$` expansions and `\<char>` literal
/// pairs are recognised; everything else is left untouched for the
/// shell.
fn tokenize_recipe_line(vl: &VirtualLine) -> MakeResult<Node> {
    let mut scanner = Scanner::new(vl.chars.as_slice().to_vec());
    let mut children = Vec::new();
    let mut buf = PString::new();

    while let Some(c) = scanner.next() {
        match c.ch {
            '$' => {
                flush(&mut buf, &mut children);
                children.push(crate::tokenizer::tokenize_variable_ref(&mut scanner, &c.pos)?);
            }
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
    Ok(Node::Recipe(children))
}

fn flush(buf: &mut PString, children: &mut Vec<Node>) {
    if !buf.is_empty() {
        children.push(Node::Literal(std::mem::take(buf)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pos::PChar as PC;

    fn vl_recipe(s: &str) -> VirtualLine {
        let mut ps = PString::new();
        for (i, ch) in s.chars().enumerate() {
            ps.push(PC::new(ch, Pos::new(Rc::from("-"), 1, i + 1)));
        }
        VirtualLine::new(ps, VLineKind::Recipe)
    }

    #[test]
    fn test_tokenize_recipe_line_literal() {
        let vl = vl_recipe("\techo hi");
        let node = tokenize_recipe_line(&vl).unwrap();
        assert_eq!(node.render(), "\techo hi");
    }

    #[test]
    fn test_collect_recipes_stops_at_statement_line() {
        let mut lines = Scanner::new(vec![vl_recipe("\techo a"), vl_recipe("\techo b")]);
        let node = collect_recipes(&mut lines).unwrap();
        if let Node::RecipeList(items) = node {
            assert_eq!(items.len(), 2);
        } else {
            panic!("expected RecipeList");
        }
        assert!(lines.at_end());
    }
}

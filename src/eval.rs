//! eval is the evaluator driver (spec.md §4.J): walks the top-level
//! node list, dispatching each node's `eval`, and (since this core has
//! no build scheduler) offers a minimal direct single-target recipe
//! runner for the CLI's positional target arguments.

use std::rc::Rc;

use crate::ast::Node;
use crate::error::{MakeError, MakeResult};
use crate::pos::Pos;
use crate::symtable::SymbolTable;

/// RuleInfo is a materialised (not executed) rule: its expanded target
/// names and the still-lazy recipe node to run if the CLI invokes one
/// of those targets.
#[derive(Clone, Debug)]
pub struct RuleInfo {
    pub targets: Vec<String>,
    pub recipes: Node,
    pub pos: Pos,
}

/// eval_nodes evaluates a top-level node list in source order,
/// collecting both the concatenated side-effect output (from
/// `$(info)`/bare expressions) and any top-level rules encountered, so
/// the caller can later run one by name.
pub fn eval_nodes(nodes: &[Node], symtab: &mut SymbolTable) -> MakeResult<(String, Vec<RuleInfo>)> {
    let mut out = String::new();
    let mut rules = Vec::new();

    for n in nodes {
        if let Node::RuleExpression { targets, recipes, pos, .. } = n {
            let tnames = targets.eval(symtab)?;
            rules.push(RuleInfo {
                targets: tnames.split_whitespace().map(|s| s.to_string()).collect(),
                recipes: (**recipes).clone(),
                pos: pos.clone(),
            });
        }
        out.push_str(&n.eval(symtab)?);
    }

    Ok((out, rules))
}

/// eval_file loads, tokenizes, and evaluates one makefile, returning
/// its side-effect output. Used both for the CLI's top-level makefile
/// and for `include`/`-include`/`sinclude` directives.
pub fn eval_file(path: &str, symtab: &mut SymbolTable) -> MakeResult<String> {
    let text = crate::cli::load_file(path).map_err(|source| MakeError::Io {
        path: path.to_string(),
        source,
    })?;
    let vls = crate::tokenizer::lines_from_text(&text, Rc::from(path));
    let nodes = crate::tokenizer::tokenize_program(&vls)?;
    let (out, _rules) = eval_nodes(&nodes, symtab)?;
    Ok(out)
}

/// run_target executes one named rule's recipe lines directly via the
/// shell collaborator, setting the `$@` automatic variable for the
/// duration. This is intentionally not a build graph: it does not
/// check prerequisite timestamps or order; see spec.md §1 Non-goals.
pub fn run_target(name: &str, rules: &[RuleInfo], symtab: &mut SymbolTable) -> MakeResult<()> {
    let rule = rules
        .iter()
        .find(|r| r.targets.iter().any(|t| t == name))
        .ok_or_else(|| MakeError::Shell(format!("no rule to make target '{}'", name)))?;

    let exports = symtab.get_exports()?;

    if let Node::RecipeList(lines) = &rule.recipes {
        for line in lines {
            symtab.push("@");
            symtab.add_automatic("@", name.to_string(), rule.pos.clone());
            let rendered = line.eval(symtab);
            symtab.pop("@");
            let rendered = rendered?;

            let (cmd, silent, ignore_errors) = split_recipe_controls(&rendered);
            if cmd.trim().is_empty() {
                continue;
            }
            if !silent {
                println!("{}", cmd);
            }
            match crate::shell::run_with_env(&cmd, &exports) {
                Ok(out) => {
                    if !out.is_empty() {
                        println!("{}", out);
                    }
                }
                Err(e) => {
                    if !ignore_errors {
                        return Err(MakeError::Shell(e));
                    }
                    eprintln!("{}: [{}] Error (ignored)", name, e);
                }
            }
        }
    }
    Ok(())
}

/// split_recipe_controls strips the leading recipe prefix and any
/// combination of the `@` (silent), `-` (ignore errors), and `+`
/// (always run) command modifiers GNU Make recognises.
fn split_recipe_controls(raw: &str) -> (String, bool, bool) {
    let trimmed = raw.trim_start_matches(['\t', ' ']);
    let mut silent = false;
    let mut ignore_errors = false;
    let mut rest = trimmed;
    loop {
        match rest.chars().next() {
            Some('@') => {
                silent = true;
                rest = &rest[1..];
            }
            Some('-') => {
                ignore_errors = true;
                rest = &rest[1..];
            }
            Some('+') => {
                rest = &rest[1..];
            }
            _ => break,
        }
    }
    (rest.to_string(), silent, ignore_errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_recipe_controls_silent() {
        let (cmd, silent, ignore) = split_recipe_controls("\t@echo hi");
        assert_eq!(cmd, "echo hi");
        assert!(silent);
        assert!(!ignore);
    }

    #[test]
    fn test_split_recipe_controls_ignore_errors() {
        let (cmd, silent, ignore) = split_recipe_controls("\t-rm -f foo");
        assert_eq!(cmd, "rm -f foo");
        assert!(!silent);
        assert!(ignore);
    }

    #[test]
    fn test_eval_info_scenario() {
        let mut st = SymbolTable::new();
        let vls = crate::tokenizer::lines_from_text(
            "FOO := bar\n$(info $(FOO))\nall:;@:\n",
            Rc::from("Makefile"),
        );
        let nodes = crate::tokenizer::tokenize_program(&vls).unwrap();
        let (_out, rules) = eval_nodes(&nodes, &mut st).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].targets, vec!["all".to_string()]);
    }
}

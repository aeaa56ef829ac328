//! CLI mkeval tool

extern crate die;
extern crate getopts;
extern crate mkeval;

use die::{die, Die};
use mkeval::cli::{self, Options};
use mkeval::symtable::{Origin, SymbolTable, Value};
use mkeval::{eval, sexpr};
use std::env;
use std::rc::Rc;

fn main() {
    let brief: String = format!(
        "Usage: {} <OPTIONS> [<NAME=VALUE> ...] [<target> ...]",
        env!("CARGO_PKG_NAME")
    );

    let mut opts: getopts::Options = getopts::Options::new();
    opts.optmulti("f", "file", "makefile to read (repeatable)", "PATH");
    opts.optopt("o", "output", "write output to PATH instead of stdout", "PATH");
    opts.optflag("S", "", "print the parsed S-expression AST instead of evaluating");
    opts.optflag("d", "debug", "enable debug-level tracing to stderr");
    opts.optflag("", "warn-undefined-variables", "warn when an undefined variable is referenced");
    opts.optflag("h", "help", "print usage info");
    opts.optflag("v", "version", "print version info");

    let usage: String = opts.usage(&brief);
    let arguments: Vec<String> = env::args().collect();
    let optmatches: getopts::Matches = opts.parse(&arguments[1..]).die(&usage);

    if optmatches.opt_present("h") {
        die!(0; usage);
    }
    if optmatches.opt_present("v") {
        die!(0; format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")));
    }

    if optmatches.opt_present("d") {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    }

    let mut makefiles: Vec<String> = optmatches.opt_strs("f");
    if makefiles.is_empty() {
        match cli::find_default_makefile() {
            Some(found) => makefiles.push(found),
            None => die!(1; "no makefile found (looked for Makefile, makefile, GNUmakefile)"),
        }
    }

    let (assignments, targets) = Options::split_free(&optmatches.free);

    let mut symtab = SymbolTable::new();
    symtab.warn_undefined = optmatches.opt_present("warn-undefined-variables");
    symtab.fatal_undefined = symtab.warn_undefined && optmatches.opt_present("d");
    for (name, value) in &assignments {
        symtab.add(name, Value::Str(value.clone()), Origin::CommandLine, mkeval::pos::Pos::start(Rc::from("<command-line>")));
    }

    let mut output = String::new();
    let mut rules = Vec::new();

    for makefile in &makefiles {
        let text = cli::load_file(makefile).die("unable to read makefile");
        let vls = mkeval::tokenizer::lines_from_text(&text, Rc::from(makefile.as_str()));

        if optmatches.opt_present("S") {
            match mkeval::tokenizer::tokenize_program(&vls) {
                Ok(nodes) => {
                    for n in &nodes {
                        output.push_str(&sexpr::to_sexpr(n));
                        output.push('\n');
                    }
                }
                Err(e) => die!(1; e.to_string()),
            }
            continue;
        }

        let nodes = match mkeval::tokenizer::tokenize_program(&vls) {
            Ok(nodes) => nodes,
            Err(e) => die!(1; e.to_string()),
        };

        match eval::eval_nodes(&nodes, &mut symtab) {
            Ok((out, mut file_rules)) => {
                output.push_str(&out);
                rules.append(&mut file_rules);
            }
            Err(e) => die!(1; e.to_string()),
        }
    }

    if !optmatches.opt_present("S") {
        let goals: Vec<String> = if targets.is_empty() {
            rules.first().map(|r| r.targets.clone()).unwrap_or_default()
        } else {
            targets
        };
        for goal in goals {
            if let Err(e) = eval::run_target(&goal, &rules, &mut symtab) {
                die!(1; e.to_string());
            }
        }
    }

    match optmatches.opt_str("o") {
        Some(path) => {
            std::fs::write(&path, output).die("unable to write output file");
        }
        None => {
            if !output.is_empty() {
                print!("{}", output);
            }
        }
    }
}

mod config;
mod repl;

use config::{Input, Mode, Options};
use meow::lexer::TokenClass;
use meow::{compile, Compilation};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;
use tracing::{debug, info, Level};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    println!(
        r#"meow - The MeowScript Compiler v{}

Compiles MeowScript programs down to three-address code. Nothing is run;
the compiler stops after the intermediate code is produced.

USAGE:
    meow                    Start the REPL (interactive mode)
    meow <file.meow>        Compile a MeowScript program
    meow -e "code"          Compile statements directly
    meow -                  Read a program from stdin
    meow [OPTIONS]

OPTIONS:
    -h, --help          Print this help message
    -V, --version       Print version information
    -i, --repl          Start the REPL (interactive mode)
    -e <code>           Compile statements directly (no Wake/Sleep needed)
    -v, --verbose       Show tokens, tree and code; repeat for trace logging
    --tokens            Print the token stream
    --ast               Print the annotated syntax tree
    --tac-only          Print only the three-address code
    -o, --output <file> Write the three-address code to a file

EXAMPLE:
    meow -e "Box x paws 5 Purr (x < 10) {{ Meow(x) }}"

    x = 5
    t0 = x < 10
    if_false t0 goto L0
    print x
    L0:

LANGUAGE:
    Wake ... Sleep      Program start and end
    Box x paws 1        Declare a variable
    x paws x + 1        Assign
    Hunt f(a, b) {{ }}    Define a function
    Bring a + b         Return a value
    Purr (c) {{ }} Hiss {{ }}
                        If / else
    Chase (c) {{ }}       While loop
    Meow(x)             Print
"#,
        VERSION
    );
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn read_source(input: &Input) -> io::Result<String> {
    match input {
        Input::File(path) => fs::read_to_string(path),
        Input::Stdin => {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source)?;
            Ok(source)
        }
        Input::Inline(code) => Ok(format!("Wake\n{}\nSleep", code)),
    }
}

fn print_tokens(compilation: &Compilation, summary: bool) {
    println!("== tokens ==");
    for token in &compilation.tokens {
        println!(
            "{:>4}:{:<4} {:<16} {}",
            token.pos.line,
            token.pos.column,
            token.kind.class().to_string(),
            token.lexeme
        );
    }
    if summary {
        let mut counts: BTreeMap<TokenClass, usize> = BTreeMap::new();
        for token in &compilation.tokens {
            *counts.entry(token.kind.class()).or_default() += 1;
        }
        println!();
        for (class, count) in counts {
            println!("  {:<16} {}", class.to_string(), count);
        }
    }
    println!();
}

/// Compiles one input. Returns false on any compile or I/O failure.
fn run_compile(options: &Options, input: &Input) -> bool {
    let source = match read_source(input) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading '{}': {}", input.name(), e);
            return false;
        }
    };
    debug!(input = %input.name(), bytes = source.len(), "compiling");

    let compilation = match compile(&source) {
        Ok(compilation) => compilation,
        Err(err) => {
            for diagnostic in err.diagnostics() {
                eprintln!("{}: {}", input.name(), diagnostic);
            }
            eprintln!("{}: {}", input.name(), err);
            return false;
        }
    };
    info!(instructions = compilation.code.len(), "compilation succeeded");

    let listing = compilation.listing();
    if options.tac_only {
        print!("{}", listing);
    } else {
        if options.show_tokens || options.verbose() {
            print_tokens(&compilation, options.verbose());
        }
        if options.show_ast || options.verbose() {
            println!("== syntax tree ==");
            println!("{}", compilation.program);
        }
        if options.output.is_none() {
            println!("== three-address code ==");
            print!("{}", listing);
        }
    }

    if let Some(path) = &options.output {
        if let Err(e) = fs::write(path, &listing) {
            eprintln!("Error writing '{}': {}", path.display(), e);
            return false;
        }
        debug!(path = %path.display(), "wrote three-address code");
    }
    true
}

fn main() {
    let options = match Options::parse(env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Try 'meow --help' for usage.");
            process::exit(1);
        }
    };

    init_logging(options.verbosity);

    match &options.mode {
        Mode::Help => print_help(),
        Mode::Version => println!("meow {}", VERSION),
        Mode::Repl => repl::run_repl(),
        Mode::Compile(input) => {
            if !run_compile(&options, input) {
                process::exit(1);
            }
        }
    }
}

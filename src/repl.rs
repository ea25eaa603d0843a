use meow::{compile, render, Compilation, CompileError};
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

const BANNER: &str = r#"
  /\_/\
 ( o.o )  MeowScript
  > ^ <
"#;

/// Statements accepted so far. Every new input is compiled together with
/// them, so declarations and functions carry over between inputs.
#[derive(Default)]
struct Session {
    statements: Vec<String>,
    last: Option<Compilation>,
}

impl Session {
    fn source_with(&self, input: &str) -> String {
        let mut source = String::from("Wake\n");
        for stmt in &self.statements {
            source.push_str(stmt);
            source.push('\n');
        }
        source.push_str(input);
        source.push_str("\nSleep");
        source
    }

    /// Lines before the new input in the compiled source.
    fn line_offset(&self) -> usize {
        1 + self.statements.iter().map(|s| s.lines().count()).sum::<usize>()
    }

    fn code_len(&self) -> usize {
        self.last.as_ref().map_or(0, |c| c.code.len())
    }

    /// Compiles `input` against the session. On success the input is kept
    /// and the instructions it added are returned.
    fn submit(&mut self, input: &str) -> Result<String, CompileError> {
        let compilation = compile(&self.source_with(input))?;
        let before = self.code_len();
        let added = render(compilation.code.get(before..).unwrap_or(&[]));
        self.statements.push(input.to_string());
        self.last = Some(compilation);
        debug!(statements = self.statements.len(), "session extended");
        Ok(added)
    }
}

pub fn run_repl() {
    println!("{}", BANNER);
    println!("MeowScript REPL v{}", crate::VERSION);
    println!("Statements are compiled as you type; each input shows the code it adds.");
    println!("Type .help for commands, .exit to quit.");
    println!("Use arrow keys for history.\n");

    if let Err(e) = repl_loop() {
        eprintln!("REPL error: {}", e);
    }
}

/// Lines typed so far for one input. An input is complete once every `{`
/// it opened has been closed.
#[derive(Default)]
struct PendingInput {
    text: String,
    open_braces: usize,
}

impl PendingInput {
    fn is_continuing(&self) -> bool {
        !self.text.is_empty()
    }

    /// Adds a line and hands back the whole input once braces balance.
    fn push_line(&mut self, line: &str) -> Option<String> {
        for c in line.chars() {
            match c {
                '{' => self.open_braces += 1,
                '}' => self.open_braces = self.open_braces.saturating_sub(1),
                _ => {}
            }
        }
        self.text.push_str(line);
        self.text.push('\n');

        if self.open_braces > 0 {
            return None;
        }
        let input = self.text.trim().to_string();
        self.clear();
        Some(input)
    }

    fn clear(&mut self) {
        self.text.clear();
        self.open_braces = 0;
    }
}

fn repl_loop() -> RlResult<()> {
    let mut rl = DefaultEditor::new()?;
    let mut session = Session::default();
    let mut pending = PendingInput::default();

    let history_path = history_path();
    if let Some(path) = &history_path {
        if rl.load_history(path).is_err() {
            debug!(path = %path.display(), "no history loaded");
        }
    }

    loop {
        let prompt = if pending.is_continuing() { "...> " } else { "meow> " };
        let line = match rl.readline(prompt) {
            Ok(line) => line,
            // Ctrl-C drops a half-typed input, Ctrl-D leaves.
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                pending.clear();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        };

        let trimmed = line.trim();
        if !pending.is_continuing() && trimmed.starts_with('.') {
            rl.add_history_entry(trimmed)?;
            if handle_command(trimmed, &mut session) {
                break;
            }
            continue;
        }

        match pending.push_line(&line) {
            Some(input) if !input.is_empty() => {
                rl.add_history_entry(input.as_str())?;
                execute_input(&mut session, &input);
            }
            _ => {}
        }
    }

    if let Some(path) = &history_path {
        if let Err(e) = rl.save_history(path) {
            debug!(path = %path.display(), error = %e, "history not saved");
        }
    }

    Ok(())
}

fn history_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".meow_history"))
}

/// Handle a REPL command. Returns true if the REPL should exit.
fn handle_command(cmd: &str, session: &mut Session) -> bool {
    let parts: Vec<&str> = cmd.splitn(2, ' ').collect();
    let command = parts[0];
    let arg = parts.get(1).map(|s| s.trim());

    match command {
        ".exit" | ".quit" | ".q" => {
            println!("Goodbye!");
            return true;
        }
        ".help" | ".h" => {
            print_repl_help();
        }
        ".clear" => {
            *session = Session::default();
            println!("Session cleared.");
        }
        ".tac" => match &session.last {
            Some(compilation) => print!("{}", compilation.listing()),
            None => println!("No code yet."),
        },
        ".ast" => match &session.last {
            Some(compilation) => print!("{}", compilation.program),
            None => println!("No statements yet."),
        },
        ".load" => {
            if let Some(filename) = arg {
                load_file(filename);
            } else {
                eprintln!("Usage: .load <filename>");
            }
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            eprintln!("Type .help for available commands.");
        }
    }

    false
}

/// Compiles a whole program from disk without touching the session.
fn load_file(filename: &str) {
    let source = match fs::read_to_string(filename) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading '{}': {}", filename, e);
            return;
        }
    };
    match compile(&source) {
        Ok(compilation) => print!("{}", compilation.listing()),
        Err(err) => print_errors(&err, 0),
    }
}

fn execute_input(session: &mut Session, input: &str) {
    let offset = session.line_offset();
    match session.submit(input) {
        Ok(added) if added.is_empty() => {}
        Ok(added) => print!("{}", added),
        Err(err) => print_errors(&err, offset),
    }
}

/// Prints diagnostics with lines relative to the user's input.
fn print_errors(err: &CompileError, line_offset: usize) {
    for mut diagnostic in err.diagnostics() {
        diagnostic.line = diagnostic.line.saturating_sub(line_offset).max(1);
        eprintln!("{}", diagnostic);
    }
}

fn print_repl_help() {
    println!(
        r#"
REPL Commands:
    .help, .h          Show this help message
    .exit, .quit, .q   Exit the REPL
    .clear             Forget all statements entered so far
    .tac               Show the code for the whole session
    .ast               Show the annotated syntax tree of the session
    .load <file>       Compile a .meow file and show its code

Navigation:
    Up/Down arrows     Navigate command history
    Ctrl-C             Cancel current input
    Ctrl-D             Exit REPL

Examples:
    Box x paws 5       Declare a variable
    x paws x * 2       Assign
    Meow(x)            Print

    Hunt add(a, b) {{ Bring a + b }}
                       Define a function
    Meow(add(3, 4))    Call it

Tips:
    - Multi-line input: open braces are auto-detected
    - Declarations persist across inputs
    - Inputs that fail to compile are discarded
    - History is saved to ~/.meow_history
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_prints_only_new_code() {
        let mut session = Session::default();
        assert_eq!(session.submit("Box x paws 5").unwrap(), "    x = 5\n");
        assert_eq!(
            session.submit("Meow(x + 1)").unwrap(),
            "    t0 = x + 1\n    print t0\n"
        );
        assert_eq!(session.statements.len(), 2);
    }

    #[test]
    fn pending_input_waits_for_closing_brace() {
        let mut pending = PendingInput::default();
        assert_eq!(pending.push_line("Hunt f() {"), None);
        assert!(pending.is_continuing());
        assert_eq!(pending.push_line("  Bring 1"), None);
        assert_eq!(
            pending.push_line("}").as_deref(),
            Some("Hunt f() {\n  Bring 1\n}")
        );
        assert!(!pending.is_continuing());
        assert_eq!(pending.push_line("Meow(1)").as_deref(), Some("Meow(1)"));
    }

    #[test]
    fn stray_closing_brace_does_not_block_input() {
        let mut pending = PendingInput::default();
        assert_eq!(pending.push_line("}").as_deref(), Some("}"));
        pending.push_line("Purr (1) {");
        pending.clear();
        assert_eq!(pending.push_line("Meow(2)").as_deref(), Some("Meow(2)"));
    }

    #[test]
    fn failed_input_is_not_kept() {
        let mut session = Session::default();
        session.submit("Box x paws 5").unwrap();
        let offset = session.line_offset();
        let err = session.submit("Meow(ghost)").unwrap_err();
        assert_eq!(err.diagnostics()[0].line - offset, 1);
        assert_eq!(session.statements.len(), 1);
        assert!(session.submit("Box x paws 6").is_err());
    }
}

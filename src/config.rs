use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UsageError {
    #[error("{0} requires a value")]
    MissingValue(&'static str),
    #[error("unknown option '{0}'")]
    UnknownOption(String),
    #[error("unexpected argument '{0}': only one input may be given")]
    ExtraInput(String),
}

/// Where the program text comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    File(PathBuf),
    Stdin,
    /// Statements from `-e`, compiled inside an implicit `Wake ... Sleep`.
    Inline(String),
}

impl Input {
    pub fn name(&self) -> String {
        match self {
            Input::File(path) => path.display().to_string(),
            Input::Stdin => "<stdin>".to_string(),
            Input::Inline(_) => "<inline>".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Help,
    Version,
    Repl,
    Compile(Input),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub mode: Mode,
    /// 0 = warnings, 1 = debug, 2+ = trace. Verbose runs also dump every phase.
    pub verbosity: u8,
    pub show_tokens: bool,
    pub show_ast: bool,
    pub tac_only: bool,
    pub output: Option<PathBuf>,
}

impl Options {
    /// Parses the arguments after the program name. No input means REPL.
    pub fn parse<I>(args: I) -> Result<Options, UsageError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut input: Option<Input> = None;
        let mut help = false;
        let mut version = false;
        let mut repl = false;
        let mut options = Options {
            mode: Mode::Repl,
            verbosity: 0,
            show_tokens: false,
            show_ast: false,
            tac_only: false,
            output: None,
        };

        while let Some(arg) = args.next() {
            let next = match arg.as_str() {
                "-h" | "--help" => {
                    help = true;
                    None
                }
                "-V" | "--version" => {
                    version = true;
                    None
                }
                "-i" | "--repl" => {
                    repl = true;
                    None
                }
                "-v" | "--verbose" => {
                    options.verbosity = options.verbosity.saturating_add(1);
                    None
                }
                "-vv" => {
                    options.verbosity = options.verbosity.saturating_add(2);
                    None
                }
                "--tokens" => {
                    options.show_tokens = true;
                    None
                }
                "--ast" => {
                    options.show_ast = true;
                    None
                }
                "--tac-only" => {
                    options.tac_only = true;
                    None
                }
                "-o" | "--output" => {
                    let path = args.next().ok_or(UsageError::MissingValue("-o"))?;
                    options.output = Some(PathBuf::from(path));
                    None
                }
                "-e" => {
                    let code = args.next().ok_or(UsageError::MissingValue("-e"))?;
                    Some(Input::Inline(code))
                }
                "-" => Some(Input::Stdin),
                flag if flag.starts_with('-') => {
                    return Err(UsageError::UnknownOption(flag.to_string()));
                }
                file => Some(Input::File(PathBuf::from(file))),
            };

            if let Some(next) = next {
                if input.is_some() {
                    return Err(UsageError::ExtraInput(arg));
                }
                input = Some(next);
            }
        }

        options.mode = if help {
            Mode::Help
        } else if version {
            Mode::Version
        } else {
            match input {
                Some(input) if !repl => Mode::Compile(input),
                _ => Mode::Repl,
            }
        };
        Ok(options)
    }

    pub fn verbose(&self) -> bool {
        self.verbosity > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Options, UsageError> {
        Options::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn no_arguments_starts_the_repl() {
        let options = parse(&[]).unwrap();
        assert_eq!(options.mode, Mode::Repl);
        assert_eq!(options.verbosity, 0);
    }

    #[test]
    fn file_with_flags() {
        let options = parse(&["--tokens", "cat.meow", "-o", "cat.tac", "--ast"]).unwrap();
        assert_eq!(options.mode, Mode::Compile(Input::File("cat.meow".into())));
        assert!(options.show_tokens);
        assert!(options.show_ast);
        assert_eq!(options.output, Some(PathBuf::from("cat.tac")));
    }

    #[test]
    fn inline_and_stdin() {
        assert_eq!(
            parse(&["-e", "Meow(1)"]).unwrap().mode,
            Mode::Compile(Input::Inline("Meow(1)".into()))
        );
        assert_eq!(parse(&["-"]).unwrap().mode, Mode::Compile(Input::Stdin));
    }

    #[test]
    fn verbosity_accumulates() {
        assert_eq!(parse(&["-v", "a.meow"]).unwrap().verbosity, 1);
        assert_eq!(parse(&["-v", "--verbose", "a.meow"]).unwrap().verbosity, 2);
        assert_eq!(parse(&["-vv", "a.meow"]).unwrap().verbosity, 2);
    }

    #[test]
    fn help_and_version_win() {
        assert_eq!(parse(&["a.meow", "--help"]).unwrap().mode, Mode::Help);
        assert_eq!(parse(&["-V"]).unwrap().mode, Mode::Version);
    }

    #[test]
    fn usage_errors() {
        assert_eq!(parse(&["-e"]), Err(UsageError::MissingValue("-e")));
        assert_eq!(parse(&["a.meow", "-o"]), Err(UsageError::MissingValue("-o")));
        assert_eq!(
            parse(&["--purr"]),
            Err(UsageError::UnknownOption("--purr".into()))
        );
        assert_eq!(
            parse(&["a.meow", "b.meow"]),
            Err(UsageError::ExtraInput("b.meow".into()))
        );
    }
}

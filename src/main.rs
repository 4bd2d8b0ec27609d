use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use rustyline::DefaultEditor;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vine_lang::config::RuntimeConfig;
use vine_lang::diagnostics;
use vine_lang::error::VineError;
use vine_lang::interpreter::debugger::ConsoleDebugger;
use vine_lang::interpreter::environment::Environment;
use vine_lang::interpreter::module_context::ModuleRegistry;
use vine_lang::interpreter::value::Value;
use vine_lang::interpreter::Interpreter;
use vine_lang::keywords::load_keywords;
use vine_lang::parser::{parse_source, Parser};
use vine_lang::printer::print_program;
use vine_lang::scanner::token::TokenType;
use vine_lang::scanner::Scanner;

#[derive(ClapParser)]
#[command(name = "vine", version)]
#[command(about = "The Vine scripting language")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to keywords JSON file
    #[arg(short, long, global = true)]
    keywords: Option<String>,

    /// Path to runtime config JSON file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log filter such as `debug` or `vine_lang=trace` (default: RUST_LOG, then `warn`)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Skip unexpected tokens instead of failing on the first one
    #[arg(long, global = true)]
    lenient_match: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run a script
    Run { script: PathBuf },
    /// Start the interactive prompt (the default)
    Repl,
    /// Run a script under the console debugger
    Debug {
        script: PathBuf,
        /// Line to break at; may be repeated
        #[arg(short, long)]
        breakpoint: Vec<usize>,
    },
    /// Print a script in canonical layout
    Fmt {
        script: PathBuf,
        /// Overwrite the file instead of printing
        #[arg(short, long)]
        write: bool,
    },
    /// Dump the token stream of a script
    Tokens { script: PathBuf },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let keywords = load_keywords(cli.keywords.as_deref())?;
    let runtime_config = load_config(&cli)?;

    let ok = match cli.command {
        None | Some(Command::Repl) => {
            run_prompt(&keywords, runtime_config)?;
            true
        }
        Some(Command::Run { script }) => run_file(&script, &keywords, runtime_config)?,
        Some(Command::Debug { script, breakpoint }) => {
            debug_file(&script, &breakpoint, &keywords, runtime_config)?
        }
        Some(Command::Fmt { script, write }) => {
            format_file(&script, write, &keywords, &runtime_config)?
        }
        Some(Command::Tokens { script }) => dump_tokens(&script, &keywords)?,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    // program output owns stdout
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<RuntimeConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let contents =
                fs::read_to_string(path).with_context(|| format!("reading config {}", path))?;
            RuntimeConfig::from_json(&contents).with_context(|| format!("parsing config {}", path))?
        }
        None => RuntimeConfig::default(),
    };
    if cli.lenient_match {
        config.match_mode = RuntimeConfig::lenient().match_mode;
    }
    Ok(config)
}

// Errors raised inside an imported module are rendered against that module's source.
fn report(source: &str, current: Option<&Path>, error: &VineError) {
    let foreign = error
        .file
        .as_deref()
        .filter(|file| Some(*file) != current)
        .and_then(|file| fs::read_to_string(file).ok());
    eprint!(
        "{}",
        diagnostics::render_error(foreign.as_deref().unwrap_or(source), error)
    );
}

fn read_script(path: &Path) -> Result<(PathBuf, String)> {
    let path = fs::canonicalize(path).with_context(|| format!("opening {}", path.display()))?;
    let source = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    Ok((path, source))
}

fn run_file(
    script: &Path,
    keywords: &HashMap<String, TokenType>,
    runtime_config: RuntimeConfig,
) -> Result<bool> {
    let (path, source) = read_script(script)?;
    let program = match parse_source(&source, keywords, runtime_config.match_mode) {
        Ok(program) => program,
        Err(e) => {
            report(&source, Some(&path), &e);
            return Ok(false);
        }
    };

    let mut interpreter = Interpreter::new(
        Environment::new_root(Some(path.clone())),
        runtime_config,
        ModuleRegistry::standard(),
    )
    .with_keywords(keywords.clone());

    match interpreter.interpret(&program) {
        Ok(_) => Ok(true),
        Err(e) => {
            report(&source, Some(&path), &e);
            Ok(false)
        }
    }
}

fn debug_file(
    script: &Path,
    breakpoints: &[usize],
    keywords: &HashMap<String, TokenType>,
    runtime_config: RuntimeConfig,
) -> Result<bool> {
    let (path, source) = read_script(script)?;
    let program = match parse_source(&source, keywords, runtime_config.match_mode) {
        Ok(program) => program,
        Err(e) => {
            report(&source, Some(&path), &e);
            return Ok(false);
        }
    };

    let mut debugger = ConsoleDebugger::new(
        &source,
        Some(path.clone()),
        program.parents.clone(),
        io::stdin().lock(),
        io::stdout(),
    );
    for line in breakpoints {
        debugger.add_breakpoint(*line);
    }
    println!(
        "Debugging {}. Type 'help' for available commands.",
        path.display()
    );

    let mut interpreter = Interpreter::new(
        Environment::new_root(Some(path.clone())),
        runtime_config,
        ModuleRegistry::standard(),
    )
    .with_keywords(keywords.clone())
    .with_debugger(Box::new(debugger));

    match interpreter.interpret(&program) {
        Ok(_) => Ok(true),
        Err(e) => {
            report(&source, Some(&path), &e);
            Ok(false)
        }
    }
}

fn format_file(
    script: &Path,
    write: bool,
    keywords: &HashMap<String, TokenType>,
    runtime_config: &RuntimeConfig,
) -> Result<bool> {
    let (path, source) = read_script(script)?;
    let program = match parse_source(&source, keywords, runtime_config.match_mode) {
        Ok(program) => program,
        Err(e) => {
            report(&source, Some(&path), &e);
            return Ok(false);
        }
    };
    let formatted = print_program(&program);
    if write {
        fs::write(&path, formatted).with_context(|| format!("writing {}", path.display()))?;
    } else {
        print!("{}", formatted);
    }
    Ok(true)
}

fn dump_tokens(script: &Path, keywords: &HashMap<String, TokenType>) -> Result<bool> {
    let (path, source) = read_script(script)?;
    let result = Scanner::new(source.as_str(), keywords).scan_tokens();
    for token in &result.tokens {
        println!("{:>4}:{:<3} {:?} {:?}", token.span.line, token.span.col, token.token_type, token.lexeme);
    }
    for e in &result.errors {
        report(&source, Some(&path), &VineError::syntax(e.message.clone(), e.span));
    }
    Ok(result.errors.is_empty())
}

fn new_parser(keywords: &HashMap<String, TokenType>, runtime_config: &RuntimeConfig) -> Parser {
    Parser::new(Vec::new())
        .with_keywords(keywords)
        .with_match_mode(runtime_config.match_mode)
}

fn run_prompt(keywords: &HashMap<String, TokenType>, runtime_config: RuntimeConfig) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let mut buffer = String::new();

    let history_path = dirs::home_dir().map(|p| p.join(".vine_history"));
    if let Some(ref path) = history_path {
        let _ = rl.load_history(path);
    }

    // one root scope and one parser for the whole session
    let mut parser = new_parser(keywords, &runtime_config);
    let mut interpreter = Interpreter::new(
        Environment::new_root(None),
        runtime_config.clone(),
        ModuleRegistry::standard(),
    )
    .with_keywords(keywords.clone());

    loop {
        let prompt = if buffer.is_empty() { "> " } else { "| " };

        match rl.readline(prompt) {
            Ok(line) => {
                buffer.push_str(&line);
                buffer.push('\n');

                if is_complete(&buffer, keywords) {
                    if !buffer.trim().is_empty() {
                        let _ = rl.add_history_entry(buffer.trim());
                        if !eval_input(&buffer, keywords, &mut parser, &mut interpreter) {
                            // leftover tokens of a failed parse must not leak into the next input
                            parser = new_parser(keywords, &runtime_config);
                        }
                    }
                    buffer.clear();
                }
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(rustyline::error::ReadlineError::Interrupted) => {
                buffer.clear();
                println!("^C");
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
    }

    if let Some(ref path) = history_path {
        let _ = rl.save_history(path);
    }

    Ok(())
}

// An input is complete once parsing it no longer runs off the end of the text.
fn is_complete(code: &str, keywords: &HashMap<String, TokenType>) -> bool {
    let result = Scanner::new(code, keywords).scan_tokens();
    if result
        .errors
        .iter()
        .any(|e| e.message.starts_with("Unterminated multi-line comment"))
    {
        return false;
    }
    match Parser::new(result.tokens).with_keywords(keywords).parse() {
        Ok(_) => true,
        Err(e) => !e.message.ends_with("end of file"),
    }
}

// Returns false when the parser must be reset.
fn eval_input(
    source: &str,
    keywords: &HashMap<String, TokenType>,
    parser: &mut Parser,
    interpreter: &mut Interpreter,
) -> bool {
    let result = Scanner::new(source, keywords).scan_tokens();
    if let Some(e) = result.errors.first() {
        report(source, None, &VineError::syntax(e.message.clone(), e.span));
        return true;
    }

    parser.push_stack(result.tokens);
    let program = match parser.parse() {
        Ok(program) => program,
        Err(e) => {
            report(source, None, &e);
            return false;
        }
    };

    match interpreter.interpret(&program) {
        Ok(Value::Nil) => {}
        Ok(value) => println!("{}", value),
        Err(e) => report(source, None, &e),
    }
    true
}

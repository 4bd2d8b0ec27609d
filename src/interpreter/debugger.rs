use crate::error::VineError;
use crate::interpreter::environment::Environment;
use crate::parser::ast::NodeId;
use crate::parser::parents::ParentTable;
use std::collections::BTreeSet;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::rc::Rc;

/// Called by the interpreter before every non-trivia statement. Detaching a hook never changes
/// what a program computes.
pub trait DebugHook {
    fn report(&mut self, line: usize, stmt: NodeId, env: &Rc<Environment>)
        -> Result<(), VineError>;

    fn is_paused(&self) -> bool;

    /// Blocks until the user resumes. An `Err` aborts the interpreted program.
    fn wait_for_resume(&mut self) -> Result<(), VineError>;
}

const HELP: &str = "\
Commands:
  b, break, breakpoint <line>   set a breakpoint
  c, clear [line]               clear one breakpoint, or all
  l, list                       list breakpoints
  n, next                       continue to the next breakpoint
  w, where                      show the current position
  v, var, vars [name]           show one variable, or every visible one
  src, source                   print the source with breakpoints marked
  exit                          stop the program
  h, help                       show this help";

/// Line-oriented debugger driven by any reader/writer pair (stdin/stdout in `vine debug`).
pub struct ConsoleDebugger<R: BufRead, W: Write> {
    lines: Vec<String>,
    file: Option<PathBuf>,
    parents: ParentTable,
    breakpoints: BTreeSet<usize>,
    paused: bool,
    detached: bool,
    current_line: usize,
    current_stmt: Option<NodeId>,
    current_env: Option<Rc<Environment>>,
    input: R,
    output: W,
}

fn io_error(e: std::io::Error) -> VineError {
    VineError::interpreter(format!("Debugger I/O failed: {}", e))
}

impl<R: BufRead, W: Write> ConsoleDebugger<R, W> {
    /// The debugger starts paused so breakpoints can be set before the first statement runs.
    pub fn new(
        source: &str,
        file: Option<PathBuf>,
        parents: ParentTable,
        input: R,
        output: W,
    ) -> Self {
        Self {
            lines: source.lines().map(str::to_string).collect(),
            file,
            parents,
            breakpoints: BTreeSet::new(),
            paused: true,
            detached: false,
            current_line: 0,
            current_stmt: None,
            current_env: None,
            input,
            output,
        }
    }

    pub fn add_breakpoint(&mut self, line: usize) {
        self.breakpoints.insert(line);
    }

    pub fn breakpoints(&self) -> Vec<usize> {
        self.breakpoints.iter().copied().collect()
    }

    fn say(&mut self, text: impl AsRef<str>) -> Result<(), VineError> {
        writeln!(self.output, "{}", text.as_ref()).map_err(io_error)?;
        self.output.flush().map_err(io_error)
    }

    fn read_command(&mut self) -> Result<Option<String>, VineError> {
        write!(self.output, "debug> ").map_err(io_error)?;
        self.output.flush().map_err(io_error)?;
        let mut line = String::new();
        match self.input.read_line(&mut line).map_err(io_error)? {
            0 => Ok(None),
            _ => Ok(Some(line.trim().to_string())),
        }
    }

    fn where_am_i(&mut self) -> Result<(), VineError> {
        let Some(stmt) = self.current_stmt else {
            return self.say("Not started");
        };
        let depth = self.parents.depth(stmt);
        let block = match self.parents.enclosing_block(stmt) {
            Some(info) if info.parent.is_some() => format!("block at line {}", info.span.line),
            _ => "top level".to_string(),
        };
        let text = self
            .lines
            .get(self.current_line.saturating_sub(1))
            .map(|l| l.trim().to_string())
            .unwrap_or_default();
        self.say(format!(
            "Line {} (depth {}, {}): {}",
            self.current_line, depth, block, text
        ))
    }

    fn show_vars(&mut self, name: Option<&str>) -> Result<(), VineError> {
        let Some(env) = self.current_env.clone() else {
            return self.say("No scope yet");
        };
        if let Some(name) = name {
            let text = match env.get(name) {
                Ok(value) => format!("{} = {}", name, value),
                Err(e) => e.message,
            };
            return self.say(text);
        }

        let mut scope = Some(env);
        while let Some(current) = scope {
            for (name, value) in current.local_values() {
                if value.is_callable() && current.is_static(&name) {
                    continue; // prelude
                }
                self.say(format!("{} = {}", name, value))?;
            }
            scope = current.parent().cloned();
        }
        Ok(())
    }

    fn show_source(&mut self) -> Result<(), VineError> {
        let width = self.lines.len().to_string().len();
        let listing: Vec<String> = self
            .lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let number = i + 1;
                let marker = if self.breakpoints.contains(&number) { "*" } else { " " };
                let cursor = if number == self.current_line { ">" } else { " " };
                format!("{}{}{:>width$} | {}", marker, cursor, number, line, width = width)
            })
            .collect();
        for line in listing {
            self.say(line)?;
        }
        Ok(())
    }

    // Returns true when execution should resume.
    fn dispatch(&mut self, command: &str) -> Result<bool, VineError> {
        let mut parts = command.split_whitespace();
        let Some(verb) = parts.next() else {
            return Ok(false);
        };
        let arg = parts.next();

        match verb {
            "b" | "break" | "breakpoint" => match arg.and_then(|a| a.parse::<usize>().ok()) {
                Some(line) => {
                    self.breakpoints.insert(line);
                    self.say(format!("Breakpoint set at line {}", line))?;
                }
                None => self.say("Usage: b <line>")?,
            },
            "c" | "clear" => match arg.and_then(|a| a.parse::<usize>().ok()) {
                Some(line) => {
                    if self.breakpoints.remove(&line) {
                        self.say(format!("Breakpoint at line {} cleared", line))?;
                    } else {
                        self.say(format!("No breakpoint at line {}", line))?;
                    }
                }
                None => {
                    self.breakpoints.clear();
                    self.say("All breakpoints cleared")?;
                }
            },
            "l" | "list" => {
                if self.breakpoints.is_empty() {
                    self.say("No breakpoints")?;
                } else {
                    let listed = self
                        .breakpoints
                        .iter()
                        .map(|l| l.to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    self.say(format!("Breakpoints: {}", listed))?;
                }
            }
            "n" | "next" => {
                self.say("Continuing execution...")?;
                return Ok(true);
            }
            "w" | "where" => self.where_am_i()?,
            "v" | "var" | "vars" => self.show_vars(arg)?,
            "src" | "source" => self.show_source()?,
            "exit" => return Err(VineError::interpreter("Debugging session ended")),
            "h" | "help" => self.say(HELP)?,
            other => self.say(format!(
                "Unknown command: {}. Type 'help' for available commands.",
                other
            ))?,
        }
        Ok(false)
    }
}

impl<R: BufRead, W: Write> DebugHook for ConsoleDebugger<R, W> {
    fn report(
        &mut self,
        line: usize,
        stmt: NodeId,
        env: &Rc<Environment>,
    ) -> Result<(), VineError> {
        // statements of imported modules have their own line numbers
        if env.file_path() != self.file {
            return Ok(());
        }
        let entered_new_line = line != self.current_line;
        self.current_line = line;
        self.current_stmt = Some(stmt);
        self.current_env = Some(Rc::clone(env));

        if !self.detached && entered_new_line && self.breakpoints.contains(&line) {
            self.paused = true;
            self.say(format!("Paused at breakpoint at line {}", line))?;
        }
        Ok(())
    }

    fn is_paused(&self) -> bool {
        self.paused && !self.detached && self.current_stmt.is_some()
    }

    fn wait_for_resume(&mut self) -> Result<(), VineError> {
        loop {
            match self.read_command()? {
                None => {
                    // input closed: run to completion
                    self.detached = true;
                    self.paused = false;
                    return Ok(());
                }
                Some(command) => {
                    if self.dispatch(&command)? {
                        self.paused = false;
                        return Ok(());
                    }
                }
            }
        }
    }
}

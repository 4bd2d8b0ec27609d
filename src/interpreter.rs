pub mod debugger;
pub mod environment;
pub mod module_context;
pub mod native_function;
pub mod native_method;
pub mod stdlib;
pub mod task;
pub mod value;

use crate::config::RuntimeConfig;
use crate::error::{ErrorKind, ErrorStack, VineError};
use crate::interpreter::debugger::DebugHook;
use crate::interpreter::environment::Environment;
use crate::interpreter::module_context::{ModuleContext, ModuleKey, ModuleRegistry};
use crate::interpreter::native_method::{call_native_method, get_property};
use crate::interpreter::task::{Job, TaskHandle, TaskQueue};
use crate::interpreter::value::{Function, FunctionKind, HostContext, Object, Value};
use crate::keywords::default_table;
use crate::parser::ast::{
    BinaryOp, Block, CompareOp, ElseBranch, Expr, ExprKind, FunctionDecl, Ident, Literal,
    MemberKey, Program, Stmt, StmtKind, TemplatePart, UseDecl,
};
use crate::parser::parse_source;
use crate::scanner::token::TokenType;
use crate::span::Span;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, trace};

// Return is the only non-local exit in the language. It stops at the nearest function, lambda,
// `to` continuation, switch case or module top level.
#[derive(Debug, Clone)]
enum ControlFlow {
    Value(Value),
    Return(Value),
}

impl From<Value> for ControlFlow {
    fn from(v: Value) -> Self {
        ControlFlow::Value(v)
    }
}

impl ControlFlow {
    fn into_value(self) -> Value {
        match self {
            ControlFlow::Value(v) | ControlFlow::Return(v) => v,
        }
    }
}

// Propagate a return, discard a plain value
macro_rules! prop {
    ($expr:expr) => {
        match $expr? {
            ControlFlow::Value(_) => {}
            other => return Ok(other),
        }
    };
}

pub struct Interpreter {
    // head of the scope chain; swapped for the duration of blocks, calls and module loads
    env: Rc<Environment>,
    runtime_config: RuntimeConfig,
    registry: ModuleRegistry,
    modules: ModuleContext,
    tasks: TaskQueue,
    errors: ErrorStack,
    out: Box<dyn Write>,
    debugger: Option<Box<dyn DebugHook>>,
}

impl Interpreter {
    pub fn new(env: Environment, runtime_config: RuntimeConfig, registry: ModuleRegistry) -> Self {
        let interpreter = Self {
            env: Rc::new(env),
            runtime_config,
            registry,
            modules: ModuleContext::new(default_table()),
            tasks: TaskQueue::new(),
            errors: ErrorStack::new(),
            out: Box::new(io::stdout()),
            debugger: None,
        };
        interpreter.install_prelude(&interpreter.env);
        interpreter
    }

    /// Keyword table used to tokenize imported modules.
    pub fn with_keywords(mut self, keywords: HashMap<String, TokenType>) -> Self {
        self.modules.keywords = keywords;
        self
    }

    /// Where `print` writes. Defaults to stdout.
    pub fn with_output(mut self, out: Box<dyn Write>) -> Self {
        self.out = out;
        self
    }

    pub fn with_debugger(mut self, debugger: Box<dyn DebugHook>) -> Self {
        self.debugger = Some(debugger);
        self
    }

    pub fn env(&self) -> &Rc<Environment> {
        &self.env
    }

    pub fn runtime_config(&self) -> &RuntimeConfig {
        &self.runtime_config
    }

    /// Tasks scheduled with `run` that have not resolved yet.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.pending()
    }

    // every module root gets the `vine:global` entries as constants
    fn install_prelude(&self, env: &Environment) {
        let Some(globals) = self.registry.build("global") else {
            return;
        };
        for (name, value) in globals {
            if let Err(e) = env.declare(&name, value, true) {
                debug!(%name, error = %e, "prelude entry skipped");
            }
        }
    }

    /// Runs `program` in the current root environment, then every task it left scheduled.
    /// Returns the value of the last top-level statement.
    pub fn interpret(&mut self, program: &Program) -> Result<Value, VineError> {
        self.errors.clear();
        let result = match self.execute_statements(&program.body) {
            Ok(flow) => self.drain_tasks().map(|_| flow.into_value()),
            Err(e) => Err(e),
        };
        result.map_err(|e| {
            // a failed pass leaves nothing behind for the next one
            self.tasks.clear();
            self.errors.surface(e)
        })
    }

    fn fail(&mut self, error: VineError, span: Span) -> VineError {
        let error = error.at(span).in_file(self.env.file_path());
        self.errors.push(error)
    }

    // "did you mean" for names one or two edits away from something in scope
    fn suggest(&self, error: VineError, name: &str) -> VineError {
        if error.kind != ErrorKind::VariableNotFound || error.hint.is_some() {
            return error;
        }
        let best = self
            .env
            .visible_names()
            .into_iter()
            .filter(|candidate| candidate != name)
            .map(|candidate| (strsim::levenshtein(name, &candidate), candidate))
            .filter(|(distance, _)| *distance <= 2 && *distance < name.chars().count())
            .min();
        match best {
            Some((_, candidate)) => error.with_hint(format!("did you mean '{}'?", candidate)),
            None => error,
        }
    }

    fn child_env(&self) -> Rc<Environment> {
        Rc::new(Environment::new_with_enclosing(Rc::clone(&self.env)))
    }

    // ── statements ───────────────────────────────────────────────────────────

    fn execute_statements(&mut self, statements: &[Stmt]) -> Result<ControlFlow, VineError> {
        let mut last = Value::Nil;
        for stmt in statements {
            if stmt.kind.is_trivia() {
                continue;
            }
            match self.execute_stmt(stmt)? {
                ControlFlow::Value(v) => last = v,
                ret @ ControlFlow::Return(_) => return Ok(ret),
            }
        }
        Ok(last.into())
    }

    fn execute_block(
        &mut self,
        block: &Block,
        env: Rc<Environment>,
    ) -> Result<ControlFlow, VineError> {
        let previous = std::mem::replace(&mut self.env, env);
        let result = self.execute_statements(&block.body);
        self.env = previous;
        result
    }

    fn notify_debugger(&mut self, stmt: &Stmt) -> Result<(), VineError> {
        if let Some(hook) = self.debugger.as_mut() {
            hook.report(stmt.span.line, stmt.id, &self.env)?;
            if hook.is_paused() {
                hook.wait_for_resume()?;
            }
        }
        Ok(())
    }

    fn execute_stmt(&mut self, stmt: &Stmt) -> Result<ControlFlow, VineError> {
        trace!(line = stmt.span.line, "statement");
        self.notify_debugger(stmt)?;
        self.execute_stmt_kind(stmt)
            .map_err(|e| self.fail(e, stmt.span))
    }

    fn execute_stmt_kind(&mut self, stmt: &Stmt) -> Result<ControlFlow, VineError> {
        match &stmt.kind {
            StmtKind::Use(decl) => self.use_module(decl),
            StmtKind::Expose(inner) => {
                let flow = self.execute_stmt_kind(inner)?;
                if let Some(name) = inner.kind.declared_name() {
                    self.env.expose(&name.name);
                }
                Ok(flow)
            }
            StmtKind::Task(decl) => self.declare_function(decl, FunctionKind::Task),
            StmtKind::Fn(decl) => self.declare_function(decl, FunctionKind::Plain),
            StmtKind::Let {
                name,
                value,
                is_const,
            } => {
                let value = self.evaluate(value)?;
                self.env.declare(&name.name, value, *is_const)?;
                Ok(Value::Nil.into())
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.condition(condition)? {
                    let env = self.child_env();
                    self.execute_block(then_branch, env)
                } else {
                    match else_branch {
                        Some(ElseBranch::Block(block)) => {
                            let env = self.child_env();
                            self.execute_block(block, env)
                        }
                        Some(ElseBranch::If(nested)) => self.execute_stmt(nested),
                        None => Ok(Value::Nil.into()),
                    }
                }
            }
            StmtKind::For {
                key,
                value,
                iterable,
                body,
            } => self.execute_for(key, value.as_ref(), iterable, body),
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Ok(ControlFlow::Return(value))
            }
            StmtKind::Expression(expr) => Ok(self.evaluate(expr)?.into()),
            StmtKind::Comment(_) | StmtKind::EmptyLine => Ok(Value::Nil.into()),
        }
    }

    fn declare_function(
        &mut self,
        decl: &FunctionDecl,
        kind: FunctionKind,
    ) -> Result<ControlFlow, VineError> {
        // the closure is the declaring scope itself, so the function can see its own name
        let function = Function {
            kind,
            name: Rc::from(decl.name.name.as_str()),
            params: decl.params.iter().map(|p| Rc::from(p.name.as_str())).collect(),
            body: Rc::clone(&decl.body),
            closure: Rc::clone(&self.env),
        };
        self.env
            .declare(&decl.name.name, Value::Fn(Rc::new(function)), false)?;
        Ok(Value::Nil.into())
    }

    fn condition(&mut self, expr: &Expr) -> Result<bool, VineError> {
        match self.evaluate(expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(VineError::runtime(
                format!("Condition must be a boolean, got {}", other.tag()),
                expr.span,
            )),
        }
    }

    fn execute_for(
        &mut self,
        key: &Ident,
        value: Option<&Ident>,
        iterable: &Expr,
        body: &Block,
    ) -> Result<ControlFlow, VineError> {
        match self.evaluate(iterable)? {
            Value::Range(start, end) => {
                let mut n = start;
                let mut index = 0.0;
                while n <= end {
                    prop!(self.iteration(key, value, Value::Num(index), Value::Num(n), body, false));
                    n += 1.0;
                    index += 1.0;
                }
            }
            Value::Array(elements) => {
                // the body may push to the array it iterates
                let snapshot = elements.borrow().clone();
                for (i, element) in snapshot.into_iter().enumerate() {
                    prop!(self.iteration(key, value, Value::Num(i as f64), element, body, false));
                }
            }
            Value::Object(object) => {
                let entries: Vec<(Rc<str>, Value)> = object
                    .borrow()
                    .iter()
                    .map(|(k, v)| (Rc::clone(k), v.clone()))
                    .collect();
                for (k, v) in entries {
                    prop!(self.iteration(key, value, Value::Str(k), v, body, true));
                }
            }
            other => {
                return Err(VineError::runtime(
                    format!("Cannot iterate over {}", other.tag()),
                    iterable.span,
                ))
            }
        }
        Ok(Value::Nil.into())
    }

    // One pass of a loop body in a fresh scope. With a single loop variable, objects bind the
    // key and everything else binds the element.
    fn iteration(
        &mut self,
        key: &Ident,
        value: Option<&Ident>,
        first: Value,
        second: Value,
        body: &Block,
        single_binds_first: bool,
    ) -> Result<ControlFlow, VineError> {
        let env = self.child_env();
        match value {
            Some(value) => {
                env.declare(&key.name, first, false)?;
                env.declare(&value.name, second, false)?;
            }
            None if single_binds_first => env.declare(&key.name, first, false)?,
            None => env.declare(&key.name, second, false)?,
        }
        self.execute_block(body, env)
    }

    // ── modules ──────────────────────────────────────────────────────────────

    fn use_module(&mut self, decl: &UseDecl) -> Result<ControlFlow, VineError> {
        let module = self.load_module(&decl.source)?;

        if let Some(namespace) = &decl.namespace {
            self.env
                .declare(&namespace.name, Value::Module(Rc::clone(&module)), true)?;
        }
        for pick in &decl.picks {
            // fail at the `use` rather than at first access
            module.get(&pick.name.name)?;
            let local = pick.alias.as_ref().unwrap_or(&pick.name);
            self.env.link(&local.name, Rc::clone(&module))?;
            if pick.alias.is_some() {
                self.env.set_alias(&local.name, &pick.name.name);
            }
        }
        if decl.namespace.is_none() && decl.picks.is_empty() {
            self.env.link("*", module)?;
        }
        Ok(Value::Nil.into())
    }

    fn load_module(&mut self, source: &str) -> Result<Rc<Environment>, VineError> {
        match source.strip_prefix(self.runtime_config.builtin_prefix.as_str()) {
            Some(name) => self.load_builtin(name),
            None => self.load_file(source),
        }
    }

    fn load_builtin(&mut self, name: &str) -> Result<Rc<Environment>, VineError> {
        let key = ModuleKey::Builtin(name.to_string());
        if let Some(module) = self.modules.cached(&key) {
            debug!(module = name, "builtin module cache hit");
            return Ok(module);
        }
        let exports = self.registry.build(name).ok_or_else(|| {
            VineError::interpreter(format!(
                "Module '{}{}' not found",
                self.runtime_config.builtin_prefix, name
            ))
        })?;

        let module = Rc::new(Environment::new_root(None));
        for (export, value) in exports {
            module.declare(&export, value, true)?;
            module.expose(&export);
        }
        debug!(module = name, "builtin module loaded");
        self.modules.finish_loading(key, Rc::clone(&module));
        Ok(module)
    }

    fn resolve_module_path(&self, source: &str) -> Result<PathBuf, VineError> {
        let mut relative = PathBuf::from(source);
        if relative.extension().is_none() {
            relative.set_extension(&self.runtime_config.module_extension);
        }
        let base = self
            .env
            .file_path()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        base.join(&relative)
            .canonicalize()
            .map_err(|_| VineError::interpreter(format!("Module '{}' not found", source)))
    }

    fn load_file(&mut self, source: &str) -> Result<Rc<Environment>, VineError> {
        let path = self.resolve_module_path(source)?;
        let key = ModuleKey::File(path.clone());
        if let Some(module) = self.modules.cached(&key) {
            debug!(path = %path.display(), "module cache hit");
            return Ok(module);
        }

        self.modules.begin_loading(&key)?;
        match self.evaluate_module(&path) {
            Ok(module) => {
                debug!(path = %path.display(), "module loaded");
                self.modules.finish_loading(key, Rc::clone(&module));
                Ok(module)
            }
            Err(e) => {
                self.modules.abandon(&key);
                Err(e)
            }
        }
    }

    fn evaluate_module(&mut self, path: &Path) -> Result<Rc<Environment>, VineError> {
        let source = fs::read_to_string(path).map_err(|e| {
            VineError::interpreter(format!("Cannot read module '{}': {}", path.display(), e))
        })?;
        let program = parse_source(
            &source,
            &self.modules.keywords,
            self.runtime_config.match_mode,
        )
        .map_err(|e| e.in_file(Some(path.to_path_buf())))?;

        let module = Rc::new(Environment::new_root(Some(path.to_path_buf())));
        self.install_prelude(&module);

        let previous = std::mem::replace(&mut self.env, Rc::clone(&module));
        let result = self.execute_statements(&program.body);
        self.env = previous;
        result?;
        Ok(module)
    }

    // ── expressions ──────────────────────────────────────────────────────────

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, VineError> {
        self.evaluate_kind(expr).map_err(|e| self.fail(e, expr.span))
    }

    fn evaluate_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, VineError> {
        exprs.iter().map(|e| self.evaluate(e)).collect()
    }

    fn evaluate_kind(&mut self, expr: &Expr) -> Result<Value, VineError> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(match literal {
                Literal::Num(n) => Value::num(*n),
                Literal::Str(s) => Value::str(s),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Nil => Value::Nil,
                Literal::NaN => Value::NaN,
            }),
            ExprKind::Identifier(name) => self.env.get(name).map_err(|e| self.suggest(e, name)),
            ExprKind::Template { parts, .. } => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(t) => text.push_str(t),
                        TemplatePart::Expr(e) => text.push_str(&self.evaluate(e)?.to_string()),
                    }
                }
                Ok(Value::str(text))
            }
            ExprKind::Array(elements) => Ok(Value::array(self.evaluate_all(elements)?)),
            ExprKind::Object(properties) => {
                let mut object = Object::new();
                for property in properties {
                    let value = self.evaluate(&property.value)?;
                    object.insert(property.key.as_str(), value);
                }
                Ok(Value::object(object))
            }
            ExprKind::Lambda(lambda) => Ok(Value::Fn(Rc::new(Function {
                kind: FunctionKind::Lambda,
                name: Rc::from("lambda"),
                params: lambda.params.iter().map(|p| Rc::from(p.name.as_str())).collect(),
                body: Rc::clone(&lambda.body),
                closure: Rc::clone(&self.env),
            }))),

            ExprKind::Negate(operand) => {
                let value = self.evaluate(operand)?;
                match value.to_number() {
                    Some(n) => Ok(Value::num(-n)),
                    None => Err(VineError::runtime(
                        format!("Cannot negate {}", value.tag()),
                        span,
                    )),
                }
            }
            ExprKind::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary(*operator, &left, &right, span)
            }
            ExprKind::Compare {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                compare(*operator, &left, &right, span)
            }
            ExprKind::Equal {
                left,
                negated,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                Ok(Value::Bool(left.loose_eq(&right) != *negated))
            }
            ExprKind::Assign { target, value } => {
                let value = self.evaluate(value)?;
                match &target.kind {
                    ExprKind::Identifier(name) => {
                        self.env
                            .set(name, value.clone())
                            .map_err(|e| self.suggest(e, name))?;
                    }
                    ExprKind::Member { object, property } => {
                        let receiver = self.evaluate(object)?;
                        let key = self.member_key(property)?;
                        assign_member(&receiver, &key, value.clone(), span)?;
                    }
                    _ => return Err(VineError::runtime("Invalid assignment target", target.span)),
                }
                Ok(value)
            }
            ExprKind::Ternary {
                condition,
                consequent,
                alternate,
            } => {
                if self.condition(condition)? {
                    self.evaluate(consequent)
                } else {
                    self.evaluate(alternate)
                }
            }
            ExprKind::Range { start, end } => {
                let start = self.evaluate(start)?;
                let end = self.evaluate(end)?;
                match (&start, &end) {
                    (Value::Num(a), Value::Num(b)) => Ok(Value::Range(*a, *b)),
                    _ => Err(VineError::runtime(
                        format!(
                            "Range bounds must be numbers, got {} and {}",
                            start.tag(),
                            end.tag()
                        ),
                        span,
                    )),
                }
            }
            ExprKind::Member { object, property } => {
                let receiver = self.evaluate(object)?;
                let key = self.member_key(property)?;
                read_member(&receiver, &key, span)
            }
            ExprKind::Call { callee, arguments } => {
                // `receiver.name(args)` is a method call, not a call of a property value
                if let ExprKind::Member { object, property } = &callee.kind {
                    let receiver = self.evaluate(object)?;
                    let key = self.member_key(property)?;
                    let args = self.evaluate_all(arguments)?;
                    return self.call_method(&receiver, &key, &args, span);
                }
                let callee = self.evaluate(callee)?;
                let args = self.evaluate_all(arguments)?;
                self.call_function(&callee, &args, span)
            }

            ExprKind::Switch(switch) => {
                let subject = self.evaluate(&switch.test)?;
                for case in &switch.cases {
                    let matched = match &case.test {
                        Some(test) => self.evaluate(test)?.strict_eq(&subject),
                        None => true,
                    };
                    if matched {
                        let env = self.child_env();
                        return Ok(self.execute_block(&case.body, env)?.into_value());
                    }
                }
                Ok(Value::Nil)
            }
            ExprKind::Run(run) => {
                let ExprKind::Call { callee, arguments } = &run.call.kind else {
                    return Err(VineError::runtime("Expected a call after 'run'", span));
                };
                let callee = self.evaluate(callee)?;
                let args = self.evaluate_all(arguments)?;
                let task = self.tasks.reserve();
                debug!(task = task.id(), callee = %callee, "task scheduled");
                self.tasks.push(Job {
                    task: Rc::clone(&task),
                    callee,
                    args,
                    run: Rc::clone(run),
                    env: Rc::clone(&self.env),
                    span,
                });
                Ok(Value::Task(task))
            }
            ExprKind::Wait(inner) => match self.evaluate(inner)? {
                Value::Task(task) => self.wait_for(&task, span),
                other => Ok(other),
            },
        }
    }

    fn member_key(&mut self, property: &MemberKey) -> Result<Value, VineError> {
        match property {
            MemberKey::Named(ident) => Ok(Value::str(&ident.name)),
            MemberKey::Computed(expr) => self.evaluate(expr),
        }
    }

    fn call_method(
        &mut self,
        receiver: &Value,
        key: &Value,
        args: &[Value],
        span: Span,
    ) -> Result<Value, VineError> {
        let name = key.to_string();
        match receiver {
            Value::Module(module) => {
                let function = module.get(&name)?;
                return self.call_function(&function, args, span);
            }
            Value::Object(object) => {
                let field = object.borrow().get(&name).cloned();
                if let Some(function) = field.filter(Value::is_callable) {
                    return self.call_function(&function, args, span);
                }
            }
            Value::Array(elements) if matches!(name.as_str(), "map" | "filter" | "forEach") => {
                let snapshot = elements.borrow().clone();
                return self.array_callback(snapshot, &name, args, span);
            }
            // `fns[0](x)`
            Value::Array(_) if matches!(key, Value::Num(_)) => {
                let element = read_member(receiver, key, span)?;
                return self.call_function(&element, args, span);
            }
            _ => {}
        }
        call_native_method(receiver, &name, args).map_err(|m| VineError::runtime(m, span))
    }

    // map / filter / forEach call back into user code with (element, index)
    fn array_callback(
        &mut self,
        elements: Vec<Value>,
        method: &str,
        args: &[Value],
        span: Span,
    ) -> Result<Value, VineError> {
        let callback = args
            .first()
            .filter(|f| f.is_callable())
            .cloned()
            .ok_or_else(|| VineError::runtime(format!("{} expects a function", method), span))?;

        let mut collected = Vec::new();
        for (i, element) in elements.into_iter().enumerate() {
            let result =
                self.call_function(&callback, &[element.clone(), Value::Num(i as f64)], span)?;
            match method {
                "map" => collected.push(result),
                "filter" => match result {
                    Value::Bool(true) => collected.push(element),
                    Value::Bool(false) => {}
                    other => {
                        return Err(VineError::runtime(
                            format!("filter callback must return a boolean, got {}", other.tag()),
                            span,
                        ))
                    }
                },
                _ => {}
            }
        }
        Ok(if method == "forEach" {
            Value::Nil
        } else {
            Value::array(collected)
        })
    }

    fn call_function(
        &mut self,
        callee: &Value,
        args: &[Value],
        span: Span,
    ) -> Result<Value, VineError> {
        match callee {
            Value::Fn(fun) => {
                let env = Rc::new(Environment::new_with_enclosing(Rc::clone(&fun.closure)));
                // a lone array argument is spread over several parameters
                let spread;
                let args = match args {
                    [Value::Array(items)] if fun.params.len() > 1 => {
                        spread = items.borrow().clone();
                        &spread[..]
                    }
                    _ => args,
                };
                for (param, arg) in fun.params.iter().zip(args) {
                    env.declare(param, arg.clone(), false)?;
                }
                Ok(self.execute_block(&fun.body, env)?.into_value())
            }
            Value::NativeFn(native) => {
                if let Some(min) = native.arity {
                    if args.len() < min {
                        return Err(VineError::runtime(
                            format!(
                                "'{}' expects at least {} argument(s), got {}",
                                native.name,
                                min,
                                args.len()
                            ),
                            span,
                        ));
                    }
                }
                let mut ctx = HostContext {
                    file_path: self.env.file_path(),
                    out: &mut *self.out,
                };
                (native.func)(&mut ctx, args).map_err(|m| VineError::runtime(m, span))
            }
            other => Err(VineError::runtime(
                format!("'{}' is not callable", other),
                span,
            )),
        }
    }

    // ── tasks ────────────────────────────────────────────────────────────────

    fn wait_for(&mut self, task: &TaskHandle, span: Span) -> Result<Value, VineError> {
        loop {
            if let Some(value) = task.result() {
                return Ok(value);
            }
            match self.tasks.pop() {
                Some(job) => self.execute_job(job)?,
                None => {
                    return Err(VineError::runtime(
                        "Awaited task can never resolve",
                        span,
                    ))
                }
            }
        }
    }

    fn drain_tasks(&mut self) -> Result<(), VineError> {
        while let Some(job) = self.tasks.pop() {
            self.execute_job(job)?;
        }
        Ok(())
    }

    fn execute_job(&mut self, job: Job) -> Result<(), VineError> {
        debug!(task = job.task.id(), "task started");
        let previous = std::mem::replace(&mut self.env, Rc::clone(&job.env));
        let result = self.run_pipeline(&job);
        self.env = previous;
        let value = result?;
        debug!(task = job.task.id(), value = %value, "task resolved");
        self.tasks.resolve(&job.task, value);
        Ok(())
    }

    fn run_pipeline(&mut self, job: &Job) -> Result<Value, VineError> {
        let mut result = self.call_function(&job.callee, &job.args, job.span)?;
        // a task that returns another task resolves to that task's value
        while let Value::Task(inner) = &result {
            let next = self.wait_for(inner, job.span)?;
            result = next;
        }

        let mut value = result.clone();
        for to in &job.run.continuations {
            let env = self.child_env();
            if let Some(param) = to.params.first() {
                env.declare(&param.name, result.clone(), false)?;
            }
            value = self
                .execute_block(&to.body, env)
                .map_err(|e| self.fail(e, to.span))?
                .into_value();
        }
        Ok(value)
    }
}

fn binary(operator: BinaryOp, left: &Value, right: &Value, span: Span) -> Result<Value, VineError> {
    let mismatch = || {
        VineError::runtime(
            format!(
                "Cannot apply '{}' to {} and {}",
                operator.symbol(),
                left.tag(),
                right.tag()
            ),
            span,
        )
    };

    // the left operand decides between concatenation and arithmetic
    if let (BinaryOp::Add, Value::Str(s)) = (operator, left) {
        return Ok(Value::str(format!("{}{}", s, right)));
    }
    if operator == BinaryOp::Add && !matches!(left, Value::Num(_) | Value::NaN) {
        return Err(mismatch());
    }

    let (Some(a), Some(b)) = (left.to_number(), right.to_number()) else {
        return Err(mismatch());
    };
    Ok(Value::num(match operator {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
    }))
}

fn compare(operator: CompareOp, left: &Value, right: &Value, span: Span) -> Result<Value, VineError> {
    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Num(_) | Value::NaN, Value::Num(_) | Value::NaN | Value::Str(_))
        | (Value::Str(_), Value::Num(_) | Value::NaN) => {
            let a = left.to_number().unwrap_or(f64::NAN);
            let b = right.to_number().unwrap_or(f64::NAN);
            a.partial_cmp(&b)
        }
        _ => {
            return Err(VineError::runtime(
                format!(
                    "Cannot compare {} with {} using '{}'",
                    left.tag(),
                    right.tag(),
                    operator.symbol()
                ),
                span,
            ))
        }
    };
    // NaN orders with nothing
    let result = ordering.is_some_and(|o| match operator {
        CompareOp::Less => o.is_lt(),
        CompareOp::LessEqual => o.is_le(),
        CompareOp::Greater => o.is_gt(),
        CompareOp::GreaterEqual => o.is_ge(),
    });
    Ok(Value::Bool(result))
}

fn read_member(receiver: &Value, key: &Value, span: Span) -> Result<Value, VineError> {
    match receiver {
        Value::Module(module) => module.get(&key.to_string()),
        _ => get_property(receiver, key).map_err(|m| VineError::runtime(m, span)),
    }
}

fn assign_member(receiver: &Value, key: &Value, value: Value, span: Span) -> Result<(), VineError> {
    match (receiver, key) {
        (Value::Object(object), key) => {
            object.borrow_mut().insert(key.to_string(), value);
            Ok(())
        }
        (Value::Array(elements), Value::Num(n)) if *n >= 0.0 && n.fract() == 0.0 => {
            let mut elements = elements.borrow_mut();
            let index = *n as usize;
            match index.cmp(&elements.len()) {
                std::cmp::Ordering::Less => elements[index] = value,
                std::cmp::Ordering::Equal => elements.push(value),
                std::cmp::Ordering::Greater => {
                    return Err(VineError::runtime(
                        format!(
                            "Index {} is out of bounds for an array of length {}",
                            index,
                            elements.len()
                        ),
                        span,
                    ))
                }
            }
            Ok(())
        }
        _ => Err(VineError::runtime(
            format!("Cannot set property '{}' on {}", key, receiver.tag()),
            span,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Num(n)
    }

    #[test]
    fn plus_follows_left_operand() {
        let span = Span::default();
        assert_eq!(
            binary(BinaryOp::Add, &Value::str("3"), &num(4.0), span).unwrap(),
            Value::str("34")
        );
        assert_eq!(
            binary(BinaryOp::Add, &num(3.0), &Value::str("4"), span).unwrap(),
            num(7.0)
        );
        assert!(binary(BinaryOp::Add, &Value::Bool(true), &num(1.0), span).is_err());
        assert!(binary(BinaryOp::Sub, &Value::Nil, &num(1.0), span).is_err());
    }

    #[test]
    fn non_numeric_strings_become_nan() {
        let span = Span::default();
        let result = binary(BinaryOp::Mul, &Value::str("abc"), &num(2.0), span).unwrap();
        assert_eq!(result.tag(), crate::interpreter::value::Tag::NaN);
    }

    #[test]
    fn compare_mixed_and_nan() {
        let span = Span::default();
        assert_eq!(
            compare(CompareOp::Less, &num(2.0), &Value::str("10"), span).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            compare(CompareOp::Less, &Value::str("b"), &Value::str("a"), span).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            compare(CompareOp::GreaterEqual, &Value::NaN, &num(1.0), span).unwrap(),
            Value::Bool(false)
        );
        assert!(compare(CompareOp::Less, &Value::Nil, &num(1.0), span).is_err());
    }

    #[test]
    fn array_assignment_appends_at_length() {
        let span = Span::default();
        let arr = Value::array(vec![num(1.0)]);
        assign_member(&arr, &num(1.0), num(2.0), span).unwrap();
        assign_member(&arr, &num(0.0), num(0.0), span).unwrap();
        assert_eq!(arr.to_string(), "[0, 2]");
        assert!(assign_member(&arr, &num(5.0), num(9.0), span).is_err());
    }
}

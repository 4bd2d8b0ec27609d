//! Canonical source printer. Output re-parses to the same tree, so printing twice is stable.

use crate::parser::ast::{
    Block, ElseBranch, Expr, ExprKind, FunctionDecl, Ident, Literal, MemberKey, Program, Stmt,
    StmtKind, UseDecl,
};

pub fn print_program(program: &Program) -> String {
    Printer::default().print(program)
}

pub struct Printer {
    indent: String,
}

impl Default for Printer {
    fn default() -> Self {
        Self::new("    ")
    }
}

// Binding strength of an expression's outermost operator; primaries bind tightest.
fn precedence(expr: &Expr) -> u8 {
    match expr.kind {
        ExprKind::Ternary { .. } | ExprKind::Assign { .. } => 1,
        ExprKind::Compare { .. } => 2,
        ExprKind::Equal { .. } => 3,
        ExprKind::Binary { .. } => 4,
        ExprKind::Range { .. } => 5,
        _ => 6,
    }
}

fn is_identifier_like(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn quote(text: &str) -> String {
    if text.contains('"') {
        format!("'{}'", text)
    } else {
        format!("\"{}\"", text)
    }
}

fn params(params: &[Ident]) -> String {
    params
        .iter()
        .map(|p| p.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn ends_in_return(block: &Block) -> bool {
    block
        .body
        .iter()
        .rev()
        .find(|s| !s.kind.is_trivia())
        .is_some_and(|s| matches!(s.kind, StmtKind::Return(_)))
}

impl Printer {
    pub fn new(indent: impl Into<String>) -> Self {
        Self {
            indent: indent.into(),
        }
    }

    pub fn print(&self, program: &Program) -> String {
        self.statements(&program.body, 0)
    }

    fn pad(&self, depth: usize) -> String {
        self.indent.repeat(depth)
    }

    fn statements(&self, body: &[Stmt], depth: usize) -> String {
        let mut out = String::new();
        for stmt in body {
            if !matches!(stmt.kind, StmtKind::EmptyLine) {
                out.push_str(&self.pad(depth));
                out.push_str(&self.stmt(stmt, depth));
            }
            out.push('\n');
        }
        out
    }

    fn block(&self, block: &Block, depth: usize) -> String {
        self.statements(&block.body, depth)
    }

    fn stmt(&self, stmt: &Stmt, depth: usize) -> String {
        match &stmt.kind {
            StmtKind::Use(decl) => self.use_decl(decl),
            StmtKind::Expose(inner) => format!("expose {}", self.stmt(inner, depth)),
            StmtKind::Task(decl) => format!("task {}", self.fn_decl(decl, depth)),
            StmtKind::Fn(decl) => self.fn_decl(decl, depth),
            StmtKind::Let {
                name,
                value,
                is_const,
            } => format!(
                "{} {} = {}",
                if *is_const { "const" } else { "let" },
                name.name,
                self.expr(value, depth)
            ),
            StmtKind::If { .. } => self.if_chain(stmt, depth),
            StmtKind::For {
                key,
                value,
                iterable,
                body,
            } => {
                let vars = match value {
                    Some(value) => format!("{}, {}", key.name, value.name),
                    None => key.name.clone(),
                };
                format!(
                    "for {} in {}:\n{}{}end",
                    vars,
                    self.expr(iterable, depth),
                    self.block(body, depth + 1),
                    self.pad(depth)
                )
            }
            StmtKind::Return(Some(value)) => format!("return {}", self.expr(value, depth)),
            StmtKind::Return(None) => "return".into(),
            StmtKind::Expression(expr) => self.expr(expr, depth),
            StmtKind::Comment(text) => text.clone(),
            StmtKind::EmptyLine => String::new(),
        }
    }

    fn use_decl(&self, decl: &UseDecl) -> String {
        let mut out = format!("use {}", quote(&decl.source));
        if let Some(namespace) = &decl.namespace {
            out.push_str(&format!(" as {}", namespace.name));
        }
        if !decl.picks.is_empty() {
            let picks: Vec<String> = decl
                .picks
                .iter()
                .map(|p| match &p.alias {
                    Some(alias) => format!("{} as {}", p.name.name, alias.name),
                    None => p.name.name.clone(),
                })
                .collect();
            out.push_str(&format!(" pick ({})", picks.join(", ")));
        }
        out
    }

    fn fn_decl(&self, decl: &FunctionDecl, depth: usize) -> String {
        format!(
            "fn {}({}):\n{}{}end",
            decl.name.name,
            params(&decl.params),
            self.block(&decl.body, depth + 1),
            self.pad(depth)
        )
    }

    fn if_chain(&self, stmt: &Stmt, depth: usize) -> String {
        let StmtKind::If {
            condition,
            then_branch,
            else_branch,
        } = &stmt.kind
        else {
            return self.stmt(stmt, depth);
        };

        let mut out = format!(
            "if {}:\n{}",
            self.expr(condition, depth),
            self.block(then_branch, depth + 1)
        );
        match else_branch {
            Some(ElseBranch::If(nested)) => {
                out.push_str(&format!("{}else {}", self.pad(depth), self.if_chain(nested, depth)));
            }
            Some(ElseBranch::Block(block)) => {
                out.push_str(&format!(
                    "{}else:\n{}{}end",
                    self.pad(depth),
                    self.block(block, depth + 1),
                    self.pad(depth)
                ));
            }
            None => out.push_str(&format!("{}end", self.pad(depth))),
        }
        out
    }

    // wraps `expr` in parentheses when it binds looser than its position requires
    fn operand(&self, expr: &Expr, min: u8, depth: usize) -> String {
        let text = self.expr(expr, depth);
        if precedence(expr) < min {
            format!("({})", text)
        } else {
            text
        }
    }

    fn list(&self, items: &[Expr], depth: usize) -> String {
        items
            .iter()
            .map(|e| self.expr(e, depth))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn expr(&self, expr: &Expr, depth: usize) -> String {
        match &expr.kind {
            ExprKind::Literal(literal) => match literal {
                Literal::Num(n) => format!("{}", n),
                Literal::Str(s) => quote(s),
                Literal::Bool(b) => b.to_string(),
                Literal::Nil => "nil".into(),
                Literal::NaN => "NaN".into(),
            },
            ExprKind::Identifier(name) => name.clone(),
            // raw text already carries the escapes and slots
            ExprKind::Template { raw, .. } => quote(raw),
            ExprKind::Array(elements) => format!("[{}]", self.list(elements, depth)),
            ExprKind::Object(properties) => {
                let props: Vec<String> = properties
                    .iter()
                    .map(|p| {
                        if p.shorthand {
                            p.key.clone()
                        } else if is_identifier_like(&p.key) {
                            format!("{}: {}", p.key, self.expr(&p.value, depth))
                        } else {
                            format!("{}: {}", quote(&p.key), self.expr(&p.value, depth))
                        }
                    })
                    .collect();
                format!("{{{}}}", props.join(", "))
            }
            ExprKind::Lambda(lambda) => format!(
                "fn({}):\n{}{}end",
                params(&lambda.params),
                self.block(&lambda.body, depth + 1),
                self.pad(depth)
            ),
            ExprKind::Negate(operand) => format!("-{}", self.operand(operand, 6, depth)),
            ExprKind::Binary {
                left,
                operator,
                right,
            } => format!(
                "{} {} {}",
                self.operand(left, 5, depth),
                operator.symbol(),
                self.operand(right, 4, depth)
            ),
            ExprKind::Compare {
                left,
                operator,
                right,
            } => format!(
                "{} {} {}",
                self.operand(left, 3, depth),
                operator.symbol(),
                self.operand(right, 2, depth)
            ),
            ExprKind::Equal {
                left,
                negated,
                right,
            } => format!(
                "{} {} {}",
                self.operand(left, 4, depth),
                if *negated { "!=" } else { "==" },
                self.operand(right, 3, depth)
            ),
            ExprKind::Assign { target, value } => format!(
                "{} = {}",
                self.operand(target, 6, depth),
                self.expr(value, depth)
            ),
            ExprKind::Ternary {
                condition,
                consequent,
                alternate,
            } => format!(
                "{} ? {} : {}",
                self.operand(condition, 2, depth),
                self.expr(consequent, depth),
                self.expr(alternate, depth)
            ),
            ExprKind::Range { start, end } => format!(
                "{}..{}",
                self.operand(start, 6, depth),
                self.operand(end, 6, depth)
            ),
            ExprKind::Call { callee, arguments } => format!(
                "{}({})",
                self.operand(callee, 6, depth),
                self.list(arguments, depth)
            ),
            ExprKind::Member { object, property } => match property {
                MemberKey::Named(name) => {
                    format!("{}.{}", self.operand(object, 6, depth), name.name)
                }
                MemberKey::Computed(key) => format!(
                    "{}[{}]",
                    self.operand(object, 6, depth),
                    self.expr(key, depth)
                ),
            },
            ExprKind::Switch(switch) => {
                let mut out = format!("switch {}:\n", self.expr(&switch.test, depth));
                for case in &switch.cases {
                    match &case.test {
                        Some(test) => out.push_str(&format!(
                            "{}case {}:\n",
                            self.pad(depth + 1),
                            self.expr(test, depth + 1)
                        )),
                        None => out.push_str(&format!("{}default:\n", self.pad(depth + 1))),
                    }
                    out.push_str(&self.block(&case.body, depth + 2));
                    if !ends_in_return(&case.body) {
                        out.push_str(&format!("{}break\n", self.pad(depth + 2)));
                    }
                }
                out.push_str(&format!("{}end", self.pad(depth)));
                out
            }
            ExprKind::Run(run) => {
                let mut out = format!("run {}", self.expr(&run.call, depth));
                if !run.continuations.is_empty() {
                    out.push('\n');
                    for to in &run.continuations {
                        out.push_str(&format!(
                            "{}to ({}):\n{}",
                            self.pad(depth),
                            params(&to.params),
                            self.block(&to.body, depth + 1)
                        ));
                    }
                    out.push_str(&format!("{}end", self.pad(depth)));
                }
                out
            }
            ExprKind::Wait(awaited) => format!("wait {}", self.operand(awaited, 6, depth)),
        }
    }
}

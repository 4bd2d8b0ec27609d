//! Parent side-table: maps every statement to the block (or program) that directly contains it.

use crate::parser::ast::{Block, ElseBranch, Expr, ExprKind, MemberKey, NodeId, Stmt, StmtKind, TemplatePart};
use crate::span::Span;
use std::collections::HashMap;

pub trait Visitor<'ast>: Sized {
    fn visit_expr(&mut self, expr: &'ast Expr) {
        walk_expr(self, expr);
    }
    fn visit_stmt(&mut self, stmt: &'ast Stmt) {
        walk_stmt(self, stmt);
    }
    fn visit_block(&mut self, block: &'ast Block) {
        walk_block(self, block);
    }
}

pub fn walk_block<'ast>(visitor: &mut impl Visitor<'ast>, block: &'ast Block) {
    for stmt in &block.body {
        visitor.visit_stmt(stmt);
    }
}

pub fn walk_stmt<'ast>(visitor: &mut impl Visitor<'ast>, stmt: &'ast Stmt) {
    match &stmt.kind {
        StmtKind::Use(_) | StmtKind::Comment(_) | StmtKind::EmptyLine => {}
        StmtKind::Expose(inner) => visitor.visit_stmt(inner),
        StmtKind::Task(decl) | StmtKind::Fn(decl) => visitor.visit_block(&decl.body),
        StmtKind::Let { value, .. } => visitor.visit_expr(value),
        StmtKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            visitor.visit_expr(condition);
            visitor.visit_block(then_branch);
            match else_branch {
                Some(ElseBranch::Block(block)) => visitor.visit_block(block),
                Some(ElseBranch::If(stmt)) => visitor.visit_stmt(stmt),
                None => {}
            }
        }
        StmtKind::For { iterable, body, .. } => {
            visitor.visit_expr(iterable);
            visitor.visit_block(body);
        }
        StmtKind::Return(value) => {
            if let Some(value) = value {
                visitor.visit_expr(value);
            }
        }
        StmtKind::Expression(expr) => visitor.visit_expr(expr),
    }
}

pub fn walk_expr<'ast>(visitor: &mut impl Visitor<'ast>, expr: &'ast Expr) {
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Identifier(_) => {}
        ExprKind::Template { parts, .. } => {
            for part in parts {
                if let TemplatePart::Expr(e) = part {
                    visitor.visit_expr(e);
                }
            }
        }
        ExprKind::Array(elements) => {
            for element in elements {
                visitor.visit_expr(element);
            }
        }
        ExprKind::Object(properties) => {
            for property in properties {
                visitor.visit_expr(&property.value);
            }
        }
        ExprKind::Lambda(lambda) => visitor.visit_block(&lambda.body),
        ExprKind::Negate(operand) | ExprKind::Wait(operand) => visitor.visit_expr(operand),
        ExprKind::Binary { left, right, .. }
        | ExprKind::Compare { left, right, .. }
        | ExprKind::Equal { left, right, .. } => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }
        ExprKind::Assign { target, value } => {
            visitor.visit_expr(target);
            visitor.visit_expr(value);
        }
        ExprKind::Ternary {
            condition,
            consequent,
            alternate,
        } => {
            visitor.visit_expr(condition);
            visitor.visit_expr(consequent);
            visitor.visit_expr(alternate);
        }
        ExprKind::Range { start, end } => {
            visitor.visit_expr(start);
            visitor.visit_expr(end);
        }
        ExprKind::Call { callee, arguments } => {
            visitor.visit_expr(callee);
            for arg in arguments {
                visitor.visit_expr(arg);
            }
        }
        ExprKind::Member { object, property } => {
            visitor.visit_expr(object);
            if let MemberKey::Computed(key) = property {
                visitor.visit_expr(key);
            }
        }
        ExprKind::Switch(switch) => {
            visitor.visit_expr(&switch.test);
            for case in &switch.cases {
                if let Some(test) = &case.test {
                    visitor.visit_expr(test);
                }
                visitor.visit_block(&case.body);
            }
        }
        ExprKind::Run(run) => {
            visitor.visit_expr(&run.call);
            for to in &run.continuations {
                visitor.visit_block(&to.body);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub id: NodeId,
    pub span: Span,
    pub parent: Option<NodeId>, // None for the program itself
}

/// Non-owning `NodeId -> NodeId` relation populated after parsing.
#[derive(Debug, Clone, Default)]
pub struct ParentTable {
    parents: HashMap<NodeId, NodeId>,
    blocks: HashMap<NodeId, BlockInfo>,
}

impl ParentTable {
    pub fn build(program_id: NodeId, body: &[Stmt]) -> Self {
        let mut builder = ParentBuilder {
            table: ParentTable::default(),
            stack: vec![program_id],
        };
        builder.table.blocks.insert(
            program_id,
            BlockInfo {
                id: program_id,
                span: Span::default(),
                parent: None,
            },
        );
        for stmt in body {
            builder.visit_stmt(stmt);
        }
        builder.table
    }

    /// The block or program directly containing `stmt`.
    pub fn parent(&self, stmt: NodeId) -> Option<NodeId> {
        self.parents.get(&stmt).copied()
    }

    pub fn enclosing_block(&self, stmt: NodeId) -> Option<&BlockInfo> {
        self.parent(stmt).and_then(|id| self.blocks.get(&id))
    }

    /// Number of blocks between `stmt` and the program; top-level statements have depth 0.
    pub fn depth(&self, stmt: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.enclosing_block(stmt);
        while let Some(info) = current {
            match info.parent {
                Some(parent) => {
                    depth += 1;
                    current = self.blocks.get(&parent);
                }
                None => break,
            }
        }
        depth
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

struct ParentBuilder {
    table: ParentTable,
    stack: Vec<NodeId>,
}

impl<'ast> Visitor<'ast> for ParentBuilder {
    fn visit_stmt(&mut self, stmt: &'ast Stmt) {
        if let Some(&parent) = self.stack.last() {
            self.table.parents.insert(stmt.id, parent);
        }
        walk_stmt(self, stmt);
    }

    fn visit_block(&mut self, block: &'ast Block) {
        self.table.blocks.insert(
            block.id,
            BlockInfo {
                id: block.id,
                span: block.span,
                parent: self.stack.last().copied(),
            },
        );
        self.stack.push(block.id);
        walk_block(self, block);
        self.stack.pop();
    }
}

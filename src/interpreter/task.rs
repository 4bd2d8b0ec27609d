//! Single-threaded deferred-call queue behind `run` / `wait`.

use crate::interpreter::environment::Environment;
use crate::interpreter::value::Value;
use crate::parser::ast::Run;
use crate::span::Span;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

pub type TaskId = usize;

#[derive(Debug, Clone)]
enum Slot {
    Pending,
    Resolved(Value),
}

/// The value side of a `run`. Lives as long as a `Value::Task` or its job refers to it.
#[derive(Debug)]
pub struct TaskHandle {
    id: TaskId,
    slot: RefCell<Slot>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// The resolved value, or `None` while the task is still pending.
    pub fn result(&self) -> Option<Value> {
        match &*self.slot.borrow() {
            Slot::Resolved(value) => Some(value.clone()),
            Slot::Pending => None,
        }
    }
}

/// A `run` whose callee and arguments were evaluated at the call site but not yet invoked.
pub struct Job {
    pub task: Rc<TaskHandle>,
    pub callee: Value,
    pub args: Vec<Value>,
    pub run: Rc<Run>, // for the `to` continuations
    pub env: Rc<Environment>, // where the `run` was written
    pub span: Span,
}

#[derive(Default)]
pub struct TaskQueue {
    jobs: VecDeque<Job>,
    next_id: TaskId,
    unresolved: usize,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the handle a job will resolve into. Pair with [`TaskQueue::push`].
    pub fn reserve(&mut self) -> Rc<TaskHandle> {
        let id = self.next_id;
        self.next_id += 1;
        self.unresolved += 1;
        Rc::new(TaskHandle {
            id,
            slot: RefCell::new(Slot::Pending),
        })
    }

    pub fn push(&mut self, job: Job) {
        self.jobs.push_back(job);
    }

    pub fn pop(&mut self) -> Option<Job> {
        self.jobs.pop_front()
    }

    pub fn resolve(&mut self, task: &TaskHandle, value: Value) {
        let mut slot = task.slot.borrow_mut();
        if matches!(*slot, Slot::Pending) {
            self.unresolved = self.unresolved.saturating_sub(1);
        }
        *slot = Slot::Resolved(value);
    }

    /// Drops every queued job. Handles still held elsewhere stay pending for good.
    pub fn clear(&mut self) {
        self.jobs.clear();
        self.unresolved = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.unresolved
    }
}

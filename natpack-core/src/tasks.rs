//! Named tasks with dependencies, run in dependency order.
//!
//! A task runs at most once per [`TaskGraph::run`], after every task it
//! depends on. The whole order is validated before anything runs, so an
//! unknown dependency or a cycle fails without side effects.

use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("unknown task `{0}`")]
    UnknownTask(String),

    #[error("task `{task}` depends on unknown task `{dependency}`")]
    UnknownDependency { task: String, dependency: String },

    #[error("task `{0}` is already registered")]
    DuplicateTask(String),

    #[error("dependency cycle: {}", .0.join(" -> "))]
    TaskCycle(Vec<String>),
}

type Action<'a, C, E> = Box<dyn FnMut(&mut C) -> Result<(), E> + 'a>;

struct Task<'a, C, E> {
    depends_on: Vec<String>,
    action: Action<'a, C, E>,
}

/// A set of named tasks over a shared context `C`.
pub struct TaskGraph<'a, C, E> {
    tasks: BTreeMap<String, Task<'a, C, E>>,
}

impl<C, E> Default for TaskGraph<'_, C, E> {
    fn default() -> Self {
        Self {
            tasks: BTreeMap::new(),
        }
    }
}

impl<'a, C, E> TaskGraph<'a, C, E>
where
    E: From<TaskError>,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, depends_on: &[&str], action: F) -> Result<(), TaskError>
    where
        F: FnMut(&mut C) -> Result<(), E> + 'a,
    {
        if self.tasks.contains_key(name) {
            return Err(TaskError::DuplicateTask(name.to_string()));
        }
        self.tasks.insert(
            name.to_string(),
            Task {
                depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
                action: Box::new(action),
            },
        );
        Ok(())
    }

    /// Dependencies first, `name` last. Each task appears once.
    pub fn execution_order(&self, name: &str) -> Result<Vec<String>, TaskError> {
        if !self.tasks.contains_key(name) {
            return Err(TaskError::UnknownTask(name.to_string()));
        }
        let mut order = Vec::new();
        let mut done = BTreeSet::new();
        let mut path = Vec::new();
        self.visit(name, &mut path, &mut done, &mut order)?;
        Ok(order)
    }

    fn visit(
        &self,
        name: &str,
        path: &mut Vec<String>,
        done: &mut BTreeSet<String>,
        order: &mut Vec<String>,
    ) -> Result<(), TaskError> {
        if done.contains(name) {
            return Ok(());
        }
        if let Some(start) = path.iter().position(|p| p == name) {
            let mut cycle = path[start..].to_vec();
            cycle.push(name.to_string());
            return Err(TaskError::TaskCycle(cycle));
        }

        let task = self
            .tasks
            .get(name)
            .ok_or_else(|| TaskError::UnknownTask(name.to_string()))?;

        path.push(name.to_string());
        for dep in &task.depends_on {
            if !self.tasks.contains_key(dep) {
                return Err(TaskError::UnknownDependency {
                    task: name.to_string(),
                    dependency: dep.clone(),
                });
            }
            self.visit(dep, path, done, order)?;
        }
        path.pop();

        done.insert(name.to_string());
        order.push(name.to_string());
        Ok(())
    }

    /// Run `name` and everything it depends on. Stops at the first failure.
    /// Returns the tasks that ran, in order.
    pub fn run(&mut self, name: &str, ctx: &mut C) -> Result<Vec<String>, E> {
        let order = self.execution_order(name)?;
        for task_name in &order {
            debug!(task = %task_name, "running task");
            let task = self
                .tasks
                .get_mut(task_name)
                .ok_or_else(|| TaskError::UnknownTask(task_name.clone()))?;
            (task.action)(ctx)?;
        }
        Ok(order)
    }
}

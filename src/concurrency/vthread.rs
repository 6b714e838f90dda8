use std::fmt;

use tracing::trace;

struct PendingTask<C: ?Sized> {
    name: &'static str,
    run: Box<dyn FnOnce(&mut C, &mut VThread<C>)>,
}

/// Outcome of running at most one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickResult {
    Progress,
    Idle,
}

/// Single-threaded cooperative task stack.
///
/// The most recently pushed task runs first, so work a task schedules while
/// it runs goes ahead of anything that was already waiting. Tasks receive the
/// host context and the stack itself, and may push further tasks.
pub struct VThread<C: ?Sized> {
    tasks: Vec<PendingTask<C>>,
    executed: u64,
}

impl<C: ?Sized> VThread<C> {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            executed: 0,
        }
    }

    pub fn push_task<F>(&mut self, name: &'static str, task: F)
    where
        F: FnOnce(&mut C, &mut VThread<C>) + 'static,
    {
        self.tasks.push(PendingTask {
            name,
            run: Box::new(task),
        });
    }

    /// Pops and runs the top task.
    pub fn step(&mut self, ctx: &mut C) -> TickResult {
        let Some(task) = self.tasks.pop() else {
            return TickResult::Idle;
        };
        trace!(task = task.name, waiting = self.tasks.len(), "running vthread task");
        (task.run)(ctx, self);
        self.executed += 1;
        TickResult::Progress
    }

    /// Runs tasks until none remain, returning how many ran.
    pub fn run_until_idle(&mut self, ctx: &mut C) -> usize {
        let mut ran = 0;
        while self.step(ctx) == TickResult::Progress {
            ran += 1;
        }
        ran
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Name of the task that would run next.
    pub fn peek_name(&self) -> Option<&'static str> {
        self.tasks.last().map(|task| task.name)
    }

    pub fn executed(&self) -> u64 {
        self.executed
    }
}

impl<C: ?Sized> Default for VThread<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> fmt::Debug for VThread<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VThread")
            .field(
                "tasks",
                &self.tasks.iter().map(|task| task.name).collect::<Vec<_>>(),
            )
            .field("executed", &self.executed)
            .finish()
    }
}

//! Per-message interpreter threads.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::host::{AttributeAccess, ObjectId, ObjectKind, ScriptHost, ScriptVThread};
use crate::integration::{ScriptDiagnostic, Severity, ThreadEvent};
use crate::message::MessageContext;
use crate::references::ReferenceTable;
use crate::value::DynamicValue;
use crate::vm::program::Program;
use crate::{MiniscriptError, MiniscriptResult, RuntimeConfig};

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(u64);

impl ThreadId {
    fn next() -> Self {
        ThreadId(NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn from_raw(raw: u64) -> Self {
        ThreadId(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadState {
    Ready,
    Running,
    Yielded,
    Completed,
    Failed,
}

impl ThreadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ThreadState::Completed | ThreadState::Failed)
    }
}

/// What an executed instruction asks of the thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionOutcome {
    Continue,
    /// Suspend; the next turn continues after this instruction.
    Yield,
    /// Suspend; the next turn runs this instruction again.
    YieldAndRetry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackEntryKind {
    RValue,
    /// Addressable object; variables are assigned through the host.
    LValue,
    /// Attribute path rooted at the object held in the entry's value.
    LValueAttrib,
    /// Payload slot of the triggering message.
    IncomingData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StackEntry {
    pub value: DynamicValue,
    pub kind: StackEntryKind,
    /// Non-empty only for [`StackEntryKind::LValueAttrib`].
    pub path: Vec<AttributeAccess>,
}

impl StackEntry {
    pub fn rvalue(value: DynamicValue) -> Self {
        Self {
            value,
            kind: StackEntryKind::RValue,
            path: Vec::new(),
        }
    }

    pub fn lvalue(value: DynamicValue) -> Self {
        Self {
            value,
            kind: StackEntryKind::LValue,
            path: Vec::new(),
        }
    }

    pub(crate) fn incoming_data() -> Self {
        Self {
            value: DynamicValue::Null,
            kind: StackEntryKind::IncomingData,
            path: Vec::new(),
        }
    }

    fn is_write_slot(&self) -> bool {
        matches!(
            self.kind,
            StackEntryKind::LValueAttrib | StackEntryKind::IncomingData
        )
    }
}

/// Object owning the running script, used for diagnostics and global lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOwner {
    pub object: ObjectId,
    pub guid: u32,
    pub name: String,
}

impl ScriptOwner {
    pub fn new(object: ObjectId, guid: u32, name: impl Into<String>) -> Self {
        Self {
            object,
            guid,
            name: name.into(),
        }
    }
}

pub type SharedThread = Rc<RefCell<MiniscriptThread>>;

/// Interpreter for one run of a program in response to one message.
///
/// The program and reference table are shared and never modified; the operand
/// stack and program counter belong to this thread alone.
#[derive(Debug)]
pub struct MiniscriptThread {
    id: ThreadId,
    program: Arc<Program>,
    references: Arc<ReferenceTable>,
    pub(crate) message: MessageContext,
    pub(crate) owner: ScriptOwner,
    config: RuntimeConfig,
    pub(crate) stack: Vec<StackEntry>,
    pub(crate) pc: usize,
    state: ThreadState,
    failure: Option<MiniscriptError>,
}

impl MiniscriptThread {
    pub fn new(
        program: Arc<Program>,
        references: Arc<ReferenceTable>,
        message: MessageContext,
        owner: ScriptOwner,
    ) -> Self {
        Self {
            id: ThreadId::next(),
            program,
            references,
            message,
            owner,
            config: RuntimeConfig::default(),
            stack: Vec::new(),
            pc: 0,
            state: ThreadState::Ready,
            failure: None,
        }
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn into_shared(self) -> SharedThread {
        Rc::new(RefCell::new(self))
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn stack(&self) -> &[StackEntry] {
        &self.stack
    }

    pub fn failure(&self) -> Option<&MiniscriptError> {
        self.failure.as_ref()
    }

    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    pub fn references(&self) -> &Arc<ReferenceTable> {
        &self.references
    }

    pub fn message(&self) -> &MessageContext {
        &self.message
    }

    pub fn owner(&self) -> &ScriptOwner {
        &self.owner
    }

    /// Schedules a resume of `thread` on `vthread`.
    pub fn run_on_vthread(thread: &SharedThread, vthread: &mut ScriptVThread) {
        let thread = Rc::clone(thread);
        vthread.push_task("MiniscriptThread::resume", move |host, vthread| {
            MiniscriptThread::resume(&thread, host, vthread);
        });
    }

    /// Runs the thread until it completes, fails or yields.
    ///
    /// Before executing anything the thread schedules its own continuation,
    /// so tasks pushed by the instructions of this turn run ahead of it.
    /// Resuming a completed or failed thread does nothing.
    pub fn resume(
        thread: &SharedThread,
        host: &mut dyn ScriptHost,
        vthread: &mut ScriptVThread,
    ) -> ThreadState {
        let Ok(mut this) = thread.try_borrow_mut() else {
            warn!("miniscript thread resumed while already running");
            return ThreadState::Running;
        };
        if this.state.is_terminal() {
            return this.state;
        }
        if this.pc >= this.program.len() {
            this.transition(ThreadState::Completed, host);
            return this.state;
        }

        Self::run_on_vthread(thread, vthread);
        this.transition(ThreadState::Running, host);
        this.run_batch(host, vthread)
    }

    fn run_batch(&mut self, host: &mut dyn ScriptHost, vthread: &mut ScriptVThread) -> ThreadState {
        let program = Arc::clone(&self.program);
        let limit = self.config.max_steps_per_resume.map(|limit| limit.max(1));
        let mut steps = 0u64;

        while let Some(instruction) = program.instruction(self.pc) {
            if limit.is_some_and(|limit| steps >= limit) {
                self.transition(ThreadState::Yielded, host);
                return self.state;
            }
            let index = self.pc;
            self.pc += 1;
            steps += 1;
            if self.config.trace_instructions {
                trace!(thread = self.id.0, pc = index, opcode = %instruction.opcode(), depth = self.stack.len(), "execute");
            }

            match self.execute(instruction, index, host, vthread) {
                Ok(InstructionOutcome::Continue) => {}
                Ok(InstructionOutcome::Yield) => {
                    self.transition(ThreadState::Yielded, host);
                    return self.state;
                }
                Ok(InstructionOutcome::YieldAndRetry) => {
                    self.pc = index;
                    self.transition(ThreadState::Yielded, host);
                    return self.state;
                }
                Err(err) => {
                    self.fail(err, host);
                    return self.state;
                }
            }
        }

        self.transition(ThreadState::Completed, host);
        self.state
    }

    /// Truth of the single value a condition script leaves on the stack.
    pub fn evaluate_truth_of_result(&mut self, host: &dyn ScriptHost) -> MiniscriptResult<bool> {
        if self.stack.len() != 1 {
            return Err(MiniscriptError::execution(
                "Miniscript program didn't return a result",
            ));
        }
        self.deref_rvalue(0, false, host).map_err(|_| {
            MiniscriptError::execution("Miniscript program result couldn't be dereferenced")
        })?;
        Ok(self.stack[0].value.is_truthy())
    }

    fn transition(&mut self, to: ThreadState, host: &dyn ScriptHost) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        debug!(thread = self.id.0, ?from, ?to, "miniscript thread state");
        if let Some(hooks) = host.hooks() {
            hooks.emit_thread_event(ThreadEvent {
                thread: self.id,
                from,
                to,
            });
        }
    }

    fn fail(&mut self, err: MiniscriptError, host: &dyn ScriptHost) {
        warn!(
            thread = self.id.0,
            guid = self.owner.guid,
            name = %self.owner.name,
            pc = self.pc,
            "miniscript error: {err}"
        );
        if let Some(hooks) = host.hooks() {
            hooks.emit_log(ScriptDiagnostic {
                severity: Severity::Error,
                thread: self.id,
                owner_guid: self.owner.guid,
                owner_name: self.owner.name.clone(),
                message: err.to_string(),
            });
        }
        self.failure = Some(err);
        self.transition(ThreadState::Failed, host);
    }

    pub(crate) fn warn(&self, message: &str, host: &dyn ScriptHost) {
        warn!(
            thread = self.id.0,
            guid = self.owner.guid,
            name = %self.owner.name,
            "{message}"
        );
        if let Some(hooks) = host.hooks() {
            hooks.emit_log(ScriptDiagnostic {
                severity: Severity::Warning,
                thread: self.id,
                owner_guid: self.owner.guid,
                owner_name: self.owner.name.clone(),
                message: message.to_string(),
            });
        }
    }

    pub(crate) fn require(&self, depth: usize) -> MiniscriptResult<()> {
        if self.stack.len() < depth {
            return Err(MiniscriptError::StackUnderflow);
        }
        Ok(())
    }

    pub(crate) fn push(&mut self, entry: StackEntry) {
        self.stack.push(entry);
    }

    pub(crate) fn pop(&mut self) -> MiniscriptResult<StackEntry> {
        self.stack.pop().ok_or(MiniscriptError::StackUnderflow)
    }

    pub(crate) fn top(&self, offset: usize) -> MiniscriptResult<&StackEntry> {
        let index = self.slot(offset)?;
        Ok(&self.stack[index])
    }

    pub(crate) fn top_mut(&mut self, offset: usize) -> MiniscriptResult<&mut StackEntry> {
        let index = self.slot(offset)?;
        Ok(&mut self.stack[index])
    }

    fn slot(&self, offset: usize) -> MiniscriptResult<usize> {
        self.stack
            .len()
            .checked_sub(offset + 1)
            .ok_or(MiniscriptError::StackUnderflow)
    }

    /// Turns the entry `offset` from the top into a plain value.
    ///
    /// Variables are replaced by their current value and, when `clone_lists`
    /// is set, lists get private storage. Write slots cannot be read.
    pub(crate) fn deref_rvalue(
        &mut self,
        offset: usize,
        clone_lists: bool,
        host: &dyn ScriptHost,
    ) -> MiniscriptResult<()> {
        let entry = self.top_mut(offset)?;
        if entry.is_write_slot() {
            return Err(MiniscriptError::execution(
                "Attempted to dereference an lvalue proxy",
            ));
        }
        if let DynamicValue::Object(object) = entry.value {
            if let Some((id, ObjectKind::Variable)) = host.resolve(object) {
                if let Some(value) = host.variable_value(id) {
                    entry.value = value;
                }
            }
        }
        if clone_lists {
            entry.value.detach_list();
        }
        entry.kind = StackEntryKind::RValue;
        Ok(())
    }
}

//! Script-carrying owners: plain script modifiers and conditional messengers.
//!
//! Owners keep one parsed [`Program`] for their whole lifetime and a
//! [`ReferenceTable`] linked against the scope they were placed in. Each
//! incoming message gets a fresh [`MiniscriptThread`].

use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::host::{ObjectRef, ScriptHost, ScriptVThread};
use crate::message::{Event, MessageContext, MessageDispatch, MessageFlags};
use crate::references::{LinkingScope, ReferenceTable};
use crate::value::DynamicValue;
use crate::vm::loader::{parse, ProgramSource};
use crate::vm::program::Program;
use crate::vm::thread::{MiniscriptThread, ScriptOwner, SharedThread, ThreadState};
use crate::{MiniscriptResult, RuntimeConfig};

/// A modifier that runs a script whenever an accepted message arrives.
#[derive(Debug, Clone)]
pub struct ScriptModifier {
    owner: ScriptOwner,
    program: Arc<Program>,
    references: Arc<ReferenceTable>,
    enable_when: Option<Event>,
    config: RuntimeConfig,
}

impl ScriptModifier {
    /// Parses `source` into a modifier owned by `owner`. Accepts every event.
    pub fn load(owner: ScriptOwner, source: &ProgramSource) -> MiniscriptResult<Self> {
        let (program, references) = parse(source)?;
        Ok(Self::from_parts(owner, program, references))
    }

    pub fn from_parts(owner: ScriptOwner, program: Arc<Program>, references: ReferenceTable) -> Self {
        Self {
            owner,
            program,
            references: Arc::new(references),
            enable_when: None,
            config: RuntimeConfig::default(),
        }
    }

    pub fn with_enable_when(mut self, event: Event) -> Self {
        self.enable_when = Some(event);
        self
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn owner(&self) -> &ScriptOwner {
        &self.owner
    }

    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    pub fn references(&self) -> &ReferenceTable {
        &self.references
    }

    /// Resolves the reference table against `scope`, returning how many entries resolved.
    ///
    /// Threads already running keep the table they started with.
    pub fn link(&mut self, scope: &dyn LinkingScope) -> usize {
        Arc::make_mut(&mut self.references).link(scope)
    }

    pub fn responds_to(&self, event: &Event) -> bool {
        self.enable_when.map_or(true, |wanted| wanted == *event)
    }

    /// Copy placed under a new owner; the program stays shared, references do not.
    pub fn clone_for(&self, owner: ScriptOwner) -> Self {
        Self {
            owner,
            program: Arc::clone(&self.program),
            references: Arc::new(self.references.as_ref().clone()),
            enable_when: self.enable_when,
            config: self.config.clone(),
        }
    }

    fn spawn(&self, message: MessageContext) -> SharedThread {
        MiniscriptThread::new(
            Arc::clone(&self.program),
            Arc::clone(&self.references),
            message,
            self.owner.clone(),
        )
        .with_config(self.config.clone())
        .into_shared()
    }

    /// Starts a thread for `message` if the modifier accepts its event.
    pub fn on_message(
        &self,
        message: MessageContext,
        vthread: &mut ScriptVThread,
    ) -> Option<SharedThread> {
        if !self.responds_to(&message.event) {
            return None;
        }
        let thread = self.spawn(message);
        MiniscriptThread::run_on_vthread(&thread, vthread);
        Some(thread)
    }
}

/// Message sent by a conditional messenger whose condition held.
#[derive(Debug, Clone, PartialEq)]
pub struct SendSpec {
    pub event: Event,
    pub destination: ObjectRef,
    /// Payload to send; `None` forwards the triggering message's payload.
    pub with: Option<DynamicValue>,
    pub flags: MessageFlags,
}

impl SendSpec {
    pub fn new(event: Event, destination: ObjectRef) -> Self {
        Self {
            event,
            destination,
            with: None,
            flags: MessageFlags::default(),
        }
    }

    fn send(
        &self,
        owner: &ScriptOwner,
        incoming: DynamicValue,
        host: &mut dyn ScriptHost,
        vthread: &mut ScriptVThread,
    ) {
        let Some((target, _)) = host.resolve(self.destination) else {
            warn!(guid = owner.guid, name = %owner.name, "messenger destination is invalid");
            return;
        };
        let payload = self.with.clone().unwrap_or(incoming);
        let dispatch = MessageDispatch {
            message: MessageContext::new(self.event, payload, ObjectRef::new(owner.object)),
            target,
            cascade: self.flags.cascade,
            relay: self.flags.relay,
        };
        if self.flags.immediate {
            host.send_message_on_vthread(dispatch, vthread);
        } else {
            host.queue_message(dispatch);
        }
    }
}

/// Runs a condition script and sends a message when its result is true.
#[derive(Debug, Clone)]
pub struct ConditionalMessenger {
    script: ScriptModifier,
    send: SendSpec,
}

impl ConditionalMessenger {
    pub fn new(script: ScriptModifier, send: SendSpec) -> Self {
        Self { script, send }
    }

    pub fn script(&self) -> &ScriptModifier {
        &self.script
    }

    pub fn script_mut(&mut self) -> &mut ScriptModifier {
        &mut self.script
    }

    pub fn send_spec(&self) -> &SendSpec {
        &self.send
    }

    /// Schedules the condition thread followed by the evaluation.
    ///
    /// The evaluation task is pushed first so that the thread, pushed on
    /// top of it, runs to completion before the result is read.
    pub fn on_message(
        &self,
        message: MessageContext,
        vthread: &mut ScriptVThread,
    ) -> Option<SharedThread> {
        if !self.script.responds_to(&message.event) {
            return None;
        }
        let incoming = message.payload.clone();
        let thread = self.script.spawn(message);

        let evaluated = Rc::clone(&thread);
        let send = self.send.clone();
        let owner = self.script.owner.clone();
        vthread.push_task("ConditionalMessenger::evaluate_and_send", move |host, vthread| {
            let condition = {
                let Ok(mut thread) = evaluated.try_borrow_mut() else {
                    warn!(guid = owner.guid, "condition thread is still running");
                    return;
                };
                if thread.state() != ThreadState::Completed {
                    debug!(guid = owner.guid, state = ?thread.state(), "condition thread did not complete");
                    return;
                }
                match thread.evaluate_truth_of_result(host) {
                    Ok(condition) => condition,
                    Err(err) => {
                        thread.warn(&err.to_string(), host);
                        return;
                    }
                }
            };
            if condition {
                send.send(&owner, incoming, host, vthread);
            }
        });

        MiniscriptThread::run_on_vthread(&thread, vthread);
        Some(thread)
    }
}

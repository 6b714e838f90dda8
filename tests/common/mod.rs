//===================================================
// Miniscript test host
//===================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: In-memory object graph and bytecode builder for integration tests
// Objective: Exercise the loader and interpreter without a title runtime
//===================================================

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use miniscript_core::bytecode::Opcode;
use miniscript_core::host::AttributeAccess;
use miniscript_core::value::list_index;
use miniscript_core::{
    parse, DynamicValue, Endianness, Event, LocalRef, MessageContext, MessageDispatch,
    MiniscriptThread, ObjectGraph, ObjectId, ObjectKind, ObjectRef, Point, ProgramSource,
    RuntimeConfig, RuntimeHooks, ScriptHost, ScriptOwner, ScriptVThread, SharedThread,
};

pub const LITERAL_NULL: u16 = 0x00;
pub const LITERAL_DOUBLE: u16 = 0x15;
pub const LITERAL_BOOL: u16 = 0x1a;
pub const LITERAL_LABEL: u16 = 0x1d;
pub const LITERAL_LOCAL_REF: u16 = 0x1f9;
pub const LITERAL_GLOBAL_REF: u16 = 0x1fa;

/// Send flags that defer delivery to the host queue.
pub const SEND_DEFERRED: u16 = 0x04;

/// Writes instruction records the way the authoring tool lays them out.
pub struct Builder {
    endianness: Endianness,
    bytes: Vec<u8>,
    count: usize,
    attributes: Vec<String>,
    local_refs: Vec<LocalRef>,
}

impl Builder {
    pub fn new(endianness: Endianness) -> Self {
        Self {
            endianness,
            bytes: Vec::new(),
            count: 0,
            attributes: Vec::new(),
            local_refs: Vec::new(),
        }
    }

    pub fn little() -> Self {
        Self::new(Endianness::Little)
    }

    pub fn u16(&self, value: u16) -> [u8; 2] {
        match self.endianness {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Big => value.to_be_bytes(),
        }
    }

    pub fn u32(&self, value: u32) -> [u8; 4] {
        match self.endianness {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Big => value.to_be_bytes(),
        }
    }

    pub fn f64(&self, value: f64) -> [u8; 8] {
        match self.endianness {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Big => value.to_be_bytes(),
        }
    }

    /// Appends one record with a correct size field.
    pub fn raw(mut self, opcode: u16, flags: u16, payload: &[u8]) -> Self {
        let size = u16::try_from(payload.len() + 6).expect("record size");
        let header = [self.u16(opcode), self.u16(flags), self.u16(size)].concat();
        self.bytes.extend_from_slice(&header);
        self.bytes.extend_from_slice(payload);
        self.count += 1;
        self
    }

    pub fn op(self, opcode: Opcode) -> Self {
        self.raw(opcode.code(), 0, &[])
    }

    pub fn push_null(self) -> Self {
        let payload = self.u16(LITERAL_NULL);
        self.raw(Opcode::PushValue.code(), 0, &payload)
    }

    pub fn push_double(self, value: f64) -> Self {
        let payload = [&self.u16(LITERAL_DOUBLE)[..], &self.f64(value)[..]].concat();
        self.raw(Opcode::PushValue.code(), 0, &payload)
    }

    pub fn push_bool(self, value: bool) -> Self {
        let payload = [&self.u16(LITERAL_BOOL)[..], &[u8::from(value)][..]].concat();
        self.raw(Opcode::PushValue.code(), 0, &payload)
    }

    pub fn push_label(self, super_group: u32, id: u32) -> Self {
        let payload = [
            &self.u16(LITERAL_LABEL)[..],
            &self.u32(super_group)[..],
            &self.u32(id)[..],
        ]
        .concat();
        self.raw(Opcode::PushValue.code(), 0, &payload)
    }

    pub fn push_local(self, index: u32, lvalue: bool) -> Self {
        let payload = [&self.u16(LITERAL_LOCAL_REF)[..], &self.u32(index)[..]].concat();
        self.raw(Opcode::PushValue.code(), u16::from(lvalue), &payload)
    }

    pub fn push_global_ref_literal(self, id: u32) -> Self {
        let payload = [&self.u16(LITERAL_GLOBAL_REF)[..], &self.u32(id)[..]].concat();
        self.raw(Opcode::PushValue.code(), 0, &payload)
    }

    pub fn push_global(self, id: u32, lvalue: bool) -> Self {
        let payload = self.u32(id);
        self.raw(Opcode::PushGlobal.code(), u16::from(lvalue), &payload)
    }

    pub fn push_string(self, text: &str) -> Self {
        let len = u16::try_from(text.len()).expect("string length");
        let payload = [&self.u16(len)[..], text.as_bytes(), &[0][..]].concat();
        self.raw(Opcode::PushString.code(), 0, &payload)
    }

    pub fn get_child(self, attribute: u32, lvalue: bool, indexed: bool) -> Self {
        let flags = u16::from(lvalue) | if indexed { 0x20 } else { 0 };
        let payload = self.u32(attribute);
        self.raw(Opcode::GetChild.code(), flags, &payload)
    }

    pub fn builtin(self, id: u32) -> Self {
        let payload = self.u32(id);
        self.raw(Opcode::BuiltinFunc.code(), 0, &payload)
    }

    pub fn send(self, event: Event, flags: u16) -> Self {
        let payload = [&self.u32(event.event_id)[..], &self.u32(event.event_info)[..]].concat();
        self.raw(Opcode::Send.code(), flags, &payload)
    }

    pub fn jump(self, offset: u32, conditional: bool) -> Self {
        let kind = if conditional { 2 } else { 1 };
        let payload = [&self.u32(kind)[..], &self.u32(0)[..], &self.u32(offset)[..]].concat();
        self.raw(Opcode::Jump.code(), 0, &payload)
    }

    pub fn attribute(mut self, name: &str) -> Self {
        self.attributes.push(name.to_string());
        self
    }

    pub fn local_ref(mut self, guid: u32, name: &str) -> Self {
        self.local_refs.push(LocalRef::new(guid, name));
        self
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn finish(self) -> ProgramSource {
        ProgramSource::new(self.bytes, self.count, self.endianness)
            .with_attributes(self.attributes)
            .with_local_refs(self.local_refs)
    }
}

pub struct TestObject {
    pub kind: ObjectKind,
    pub parent: Option<ObjectId>,
    pub name: String,
    pub attributes: HashMap<String, DynamicValue>,
    pub variable: Option<DynamicValue>,
}

/// Handles of the default scene graph built by [`TestHost::with_scene`].
#[derive(Debug, Clone, Copy)]
pub struct Scene {
    pub project: ObjectId,
    pub section: ObjectId,
    pub subsection: ObjectId,
    pub scene: ObjectId,
    pub element: ObjectId,
    pub modifier: ObjectId,
    pub variable: ObjectId,
}

#[derive(Default)]
pub struct TestHost {
    objects: HashMap<ObjectId, TestObject>,
    next_id: u64,
    pub immediate: Vec<MessageDispatch>,
    pub queued: Vec<MessageDispatch>,
    pub mouse: Point,
    pub play_time_ms: u64,
    pub shared_scene: Option<ObjectId>,
    pub main_scene: Option<ObjectId>,
    pub hooks: RuntimeHooks,
    /// Ordered record of task activity shared with scheduled delivery tasks.
    pub trace: Rc<RefCell<Vec<String>>>,
}

impl TestHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: ObjectKind, parent: Option<ObjectId>, name: &str) -> ObjectId {
        self.next_id += 1;
        let id = ObjectId(self.next_id);
        self.objects.insert(
            id,
            TestObject {
                kind,
                parent,
                name: name.to_string(),
                attributes: HashMap::new(),
                variable: None,
            },
        );
        id
    }

    pub fn add_variable(&mut self, parent: ObjectId, name: &str, value: DynamicValue) -> ObjectId {
        let id = self.add(ObjectKind::Variable, Some(parent), name);
        self.object_mut(id).variable = Some(value);
        id
    }

    pub fn with_scene() -> (Self, Scene) {
        let mut host = Self::new();
        let project = host.add(ObjectKind::Project, None, "project");
        let section = host.add(ObjectKind::Section, Some(project), "section");
        let subsection = host.add(ObjectKind::Subsection, Some(section), "subsection");
        let scene = host.add(ObjectKind::Element, Some(subsection), "scene");
        let element = host.add(ObjectKind::Element, Some(scene), "button");
        let modifier = host.add(ObjectKind::Modifier, Some(element), "on click");
        let variable = host.add_variable(element, "score", DynamicValue::Integer(0));
        host.main_scene = Some(scene);
        let handles = Scene {
            project,
            section,
            subsection,
            scene,
            element,
            modifier,
            variable,
        };
        (host, handles)
    }

    pub fn object(&self, id: ObjectId) -> &TestObject {
        self.objects.get(&id).expect("object exists")
    }

    pub fn object_mut(&mut self, id: ObjectId) -> &mut TestObject {
        self.objects.get_mut(&id).expect("object exists")
    }

    pub fn remove(&mut self, id: ObjectId) {
        self.objects.remove(&id);
    }

    pub fn set_attribute(&mut self, id: ObjectId, name: &str, value: DynamicValue) {
        self.object_mut(id)
            .attributes
            .insert(name.to_ascii_lowercase(), value);
    }

    pub fn attribute(&self, id: ObjectId, name: &str) -> Option<&DynamicValue> {
        self.object(id).attributes.get(&name.to_ascii_lowercase())
    }

    pub fn variable(&self, id: ObjectId) -> Option<&DynamicValue> {
        self.object(id).variable.as_ref()
    }

    pub fn run(&mut self, vthread: &mut ScriptVThread) -> usize {
        vthread.run_until_idle(self)
    }
}

impl ObjectGraph for TestHost {
    fn kind(&self, id: ObjectId) -> Option<ObjectKind> {
        self.objects.get(&id).map(|object| object.kind)
    }

    fn parent(&self, id: ObjectId) -> Option<ObjectId> {
        self.objects.get(&id).and_then(|object| object.parent)
    }

    fn read_attribute(&self, id: ObjectId, name: &str) -> Result<DynamicValue, String> {
        let object = self.objects.get(&id).ok_or("missing object")?;
        if name.eq_ignore_ascii_case("name") {
            return Ok(DynamicValue::String(object.name.clone()));
        }
        if name.eq_ignore_ascii_case("value") {
            if let Some(value) = &object.variable {
                return Ok(value.clone());
            }
        }
        object
            .attributes
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| format!("no attribute '{name}'"))
    }

    fn read_attribute_indexed(
        &self,
        id: ObjectId,
        name: &str,
        index: &DynamicValue,
    ) -> Result<DynamicValue, String> {
        match self.read_attribute(id, name)? {
            DynamicValue::List(items) => list_index(index)
                .and_then(|position| items.get(position).cloned())
                .ok_or_else(|| "index out of range".to_string()),
            other => Err(format!("'{name}' is a {} and cannot be indexed", other.type_name())),
        }
    }

    fn write_attribute(
        &mut self,
        id: ObjectId,
        path: &[AttributeAccess],
        value: DynamicValue,
    ) -> Result<(), String> {
        let [access] = path else {
            return Err(format!("unsupported attribute path of length {}", path.len()));
        };
        let key = access.name.to_ascii_lowercase();
        let object = self.objects.get_mut(&id).ok_or("missing object")?;
        match &access.index {
            None => {
                object.attributes.insert(key, value);
                Ok(())
            }
            Some(index) => {
                let position = list_index(index).ok_or("bad list index")?;
                let Some(DynamicValue::List(items)) = object.attributes.get_mut(&key) else {
                    return Err(format!("'{}' is not a list", access.name));
                };
                let items = Arc::make_mut(items);
                let slot = items.get_mut(position).ok_or("index out of range")?;
                *slot = value;
                Ok(())
            }
        }
    }

    fn variable_value(&self, id: ObjectId) -> Option<DynamicValue> {
        self.objects.get(&id).and_then(|object| object.variable.clone())
    }

    fn set_variable(&mut self, id: ObjectId, value: DynamicValue) -> Result<(), String> {
        let object = self.objects.get_mut(&id).ok_or("missing object")?;
        let mismatched = matches!(
            (&object.variable, &value),
            (Some(DynamicValue::Integer(_)), DynamicValue::String(_))
        );
        if mismatched {
            return Err("integer variables cannot hold strings".to_string());
        }
        object.variable = Some(value);
        Ok(())
    }
}

impl ScriptHost for TestHost {
    fn send_message_on_vthread(&mut self, dispatch: MessageDispatch, vthread: &mut ScriptVThread) {
        let trace = Rc::clone(&self.trace);
        let event = dispatch.message.event.event_id;
        trace.borrow_mut().push(format!("send {event}"));
        vthread.push_task("TestHost::deliver", move |_, _| {
            trace.borrow_mut().push(format!("deliver {event}"));
        });
        self.immediate.push(dispatch);
    }

    fn queue_message(&mut self, dispatch: MessageDispatch) {
        self.trace
            .borrow_mut()
            .push(format!("queue {}", dispatch.message.event.event_id));
        self.queued.push(dispatch);
    }

    fn mouse_position(&self) -> Point {
        self.mouse
    }

    fn play_time_ms(&self) -> u64 {
        self.play_time_ms
    }

    fn active_shared_scene(&self) -> Option<ObjectId> {
        self.shared_scene
    }

    fn active_main_scene(&self) -> Option<ObjectId> {
        self.main_scene
    }

    fn random_number(&mut self, max: u32) -> u32 {
        max
    }

    fn hooks(&self) -> Option<&RuntimeHooks> {
        Some(&self.hooks)
    }
}

pub fn owner(id: ObjectId) -> ScriptOwner {
    ScriptOwner::new(id, 0x1234, "test script")
}

/// Parses `source`, links local references by name against the host graph,
/// and wraps the result in a ready thread owned by `owner_id`.
pub fn thread_for(
    host: &TestHost,
    owner_id: ObjectId,
    source: &ProgramSource,
    message: MessageContext,
) -> SharedThread {
    let (program, mut references) = parse(source).expect("program parses");
    let mut scope = miniscript_core::ObjectLinkingScope::new();
    for (id, object) in &host.objects {
        scope.add_object(id.0 as u32, &object.name, *id);
    }
    references.link(&scope);
    MiniscriptThread::new(program, Arc::new(references), message, owner(owner_id))
        .with_config(RuntimeConfig::default())
        .into_shared()
}

/// Runs `source` to quiescence on a fresh scheduler.
pub fn run_script(host: &mut TestHost, owner_id: ObjectId, source: &ProgramSource) -> SharedThread {
    run_with_message(host, owner_id, source, MessageContext::default())
}

pub fn run_with_message(
    host: &mut TestHost,
    owner_id: ObjectId,
    source: &ProgramSource,
    message: MessageContext,
) -> SharedThread {
    let thread = thread_for(host, owner_id, source, message);
    let mut vthread = ScriptVThread::new();
    MiniscriptThread::run_on_vthread(&thread, &mut vthread);
    host.run(&mut vthread);
    thread
}

pub fn object_value(id: ObjectId) -> DynamicValue {
    DynamicValue::Object(ObjectRef::new(id))
}

//! Contracts the embedding runtime implements for scripts.
//!
//! The core never owns graph objects. It stores [`ObjectRef`] handles and asks
//! the host, through [`ObjectGraph`], whether the target still exists and what
//! it looks like each time a handle is used.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::concurrency::vthread::VThread;
use crate::integration::RuntimeHooks;
use crate::message::MessageDispatch;
use crate::value::{DynamicValue, Point};

/// Identity of an object in the host graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

/// Weak, possibly empty handle to a host object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ObjectRef(Option<ObjectId>);

impl ObjectRef {
    pub const fn empty() -> Self {
        Self(None)
    }

    pub const fn new(id: ObjectId) -> Self {
        Self(Some(id))
    }

    pub fn id(&self) -> Option<ObjectId> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

impl From<ObjectId> for ObjectRef {
    fn from(id: ObjectId) -> Self {
        ObjectRef::new(id)
    }
}

impl From<Option<ObjectId>> for ObjectRef {
    fn from(id: Option<ObjectId>) -> Self {
        Self(id)
    }
}

/// Classification of a live graph object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Project,
    Section,
    Subsection,
    Element,
    Modifier,
    /// A modifier holding a value; reads of it yield the value.
    Variable,
}

impl ObjectKind {
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            ObjectKind::Project | ObjectKind::Section | ObjectKind::Subsection | ObjectKind::Element
        )
    }
}

/// One step of an attribute path built by lvalue child access.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeAccess {
    /// Position of the name in the program's attribute list.
    pub attribute_index: u32,
    pub name: String,
    pub index: Option<DynamicValue>,
}

/// Read/write access to the host object graph.
///
/// `kind` returning `None` means the object no longer exists; every other
/// method is only called for live objects.
pub trait ObjectGraph {
    fn kind(&self, id: ObjectId) -> Option<ObjectKind>;

    /// Owning object: the parent structural object, or a modifier's owner.
    fn parent(&self, id: ObjectId) -> Option<ObjectId>;

    fn read_attribute(&self, id: ObjectId, name: &str) -> Result<DynamicValue, String>;

    fn read_attribute_indexed(
        &self,
        id: ObjectId,
        name: &str,
        index: &DynamicValue,
    ) -> Result<DynamicValue, String>;

    /// Writes `value` through `path`, the first step naming an attribute of `id`.
    fn write_attribute(
        &mut self,
        id: ObjectId,
        path: &[AttributeAccess],
        value: DynamicValue,
    ) -> Result<(), String>;

    /// Current value of a variable; `None` for objects that are not variables.
    fn variable_value(&self, id: ObjectId) -> Option<DynamicValue>;

    fn set_variable(&mut self, id: ObjectId, value: DynamicValue) -> Result<(), String>;

    fn is_alive(&self, id: ObjectId) -> bool {
        self.kind(id).is_some()
    }

    /// Kind of the object a handle points at, if it is still alive.
    fn resolve(&self, object: ObjectRef) -> Option<(ObjectId, ObjectKind)> {
        let id = object.id()?;
        self.kind(id).map(|kind| (id, kind))
    }
}

/// Task stack shared by every script thread of a host.
pub type ScriptVThread = VThread<dyn ScriptHost>;

/// Runtime services a script thread consumes besides the object graph.
pub trait ScriptHost: ObjectGraph {
    /// Dispatches a message now; the dispatch may push tasks onto `vthread`.
    fn send_message_on_vthread(&mut self, dispatch: MessageDispatch, vthread: &mut ScriptVThread);

    /// Queues a message for delivery after the current scheduler work.
    fn queue_message(&mut self, dispatch: MessageDispatch);

    fn mouse_position(&self) -> Point;

    /// Milliseconds since playback started.
    fn play_time_ms(&self) -> u64;

    fn active_shared_scene(&self) -> Option<ObjectId>;

    fn active_main_scene(&self) -> Option<ObjectId>;

    /// Uniform random integer in `0..=max`.
    fn random_number(&mut self, max: u32) -> u32 {
        rand::thread_rng().gen_range(0..=max)
    }

    /// Diagnostic sink for script errors.
    fn hooks(&self) -> Option<&RuntimeHooks> {
        None
    }
}

//! Symbolic object references and the linking pass that resolves them.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::host::{ObjectId, ObjectRef};

/// Reference declared alongside a program: a static guid plus the object's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRef {
    pub guid: u32,
    pub name: String,
}

impl LocalRef {
    pub fn new(guid: u32, name: impl Into<String>) -> Self {
        Self {
            guid,
            name: name.into(),
        }
    }
}

/// Lookup scope supplied by the host during linking.
pub trait LinkingScope {
    /// Case-insensitive name lookup.
    fn resolve_name(&self, name: &str) -> Option<ObjectId>;

    fn resolve_guid(&self, guid: u32) -> Option<ObjectId>;

    /// Name first, since guids in shipped content are occasionally stale.
    fn resolve(&self, guid: u32, name: &str) -> Option<ObjectId> {
        if !name.is_empty() {
            if let Some(id) = self.resolve_name(name) {
                return Some(id);
            }
        }
        if guid == 0 {
            return None;
        }
        self.resolve_guid(guid)
    }
}

/// Scope of named objects with an optional enclosing scope.
#[derive(Debug, Default, Clone)]
pub struct ObjectLinkingScope {
    by_guid: HashMap<u32, ObjectId>,
    by_name: HashMap<String, ObjectId>,
    parent: Option<Arc<ObjectLinkingScope>>,
}

impl ObjectLinkingScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: Arc<ObjectLinkingScope>) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }

    /// Registers an object; a later registration under the same key wins.
    pub fn add_object(&mut self, guid: u32, name: &str, object: ObjectId) {
        self.by_guid.insert(guid, object);
        if !name.is_empty() {
            self.by_name.insert(name.to_ascii_lowercase(), object);
        }
    }

    fn lookup_name(&self, folded: &str) -> Option<ObjectId> {
        match self.by_name.get(folded) {
            Some(id) => Some(*id),
            None => self.parent.as_ref()?.lookup_name(folded),
        }
    }
}

impl LinkingScope for ObjectLinkingScope {
    fn resolve_name(&self, name: &str) -> Option<ObjectId> {
        self.lookup_name(&name.to_ascii_lowercase())
    }

    fn resolve_guid(&self, guid: u32) -> Option<ObjectId> {
        if guid == 0 {
            return None;
        }
        match self.by_guid.get(&guid) {
            Some(id) => Some(*id),
            None => self.parent.as_ref()?.resolve_guid(guid),
        }
    }
}

/// A declared reference and the handle linking produced for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub guid: u32,
    pub name: String,
    pub resolution: ObjectRef,
}

/// Ordered references of one script owner.
///
/// Built unresolved by the loader. Owners clone the table to link it against
/// their own scope while sharing the program itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceTable {
    entries: Vec<ReferenceEntry>,
}

impl ReferenceTable {
    pub fn new(local_refs: Vec<LocalRef>) -> Self {
        let entries = local_refs
            .into_iter()
            .map(|local| ReferenceEntry {
                guid: local.guid,
                name: local.name,
                resolution: ObjectRef::empty(),
            })
            .collect();
        Self { entries }
    }

    /// Resolves every entry against `scope`, returning how many resolved.
    ///
    /// Entries that do not resolve are left empty; linking never fails.
    pub fn link(&mut self, scope: &dyn LinkingScope) -> usize {
        let mut resolved = 0;
        for entry in &mut self.entries {
            entry.resolution = ObjectRef::from(scope.resolve(entry.guid, &entry.name));
            if entry.resolution.is_empty() {
                warn!(guid = entry.guid, name = %entry.name, "couldn't resolve script reference");
            } else {
                resolved += 1;
            }
        }
        debug!(resolved, total = self.entries.len(), "linked script references");
        resolved
    }

    /// Handle for reference `index`; empty when out of range or unresolved.
    pub fn get_ref_by_index(&self, index: usize) -> ObjectRef {
        self.entries
            .get(index)
            .map(|entry| entry.resolution)
            .unwrap_or_default()
    }

    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|entry| entry.resolution.is_empty())
            .map(|entry| entry.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> ObjectLinkingScope {
        let mut scope = ObjectLinkingScope::new();
        scope.add_object(0x10, "Score", ObjectId(1));
        scope.add_object(0x20, "Door", ObjectId(2));
        scope
    }

    #[test]
    fn names_win_over_stale_guids() {
        let mut table = ReferenceTable::new(vec![LocalRef::new(0x20, "score")]);
        assert_eq!(table.link(&scope()), 1);
        assert_eq!(table.get_ref_by_index(0), ObjectRef::new(ObjectId(1)));
    }

    #[test]
    fn guid_is_the_fallback_and_zero_never_resolves() {
        let mut table = ReferenceTable::new(vec![
            LocalRef::new(0x20, "renamed"),
            LocalRef::new(0, "missing"),
        ]);
        assert_eq!(table.link(&scope()), 1);
        assert_eq!(table.get_ref_by_index(0), ObjectRef::new(ObjectId(2)));
        assert!(table.get_ref_by_index(1).is_empty());
        assert_eq!(table.unresolved().collect::<Vec<_>>(), vec!["missing"]);
    }

    #[test]
    fn parent_scopes_are_searched_after_local_misses() {
        let parent = Arc::new(scope());
        let mut child = ObjectLinkingScope::with_parent(parent);
        child.add_object(0x30, "door", ObjectId(3));
        assert_eq!(child.resolve_name("DOOR"), Some(ObjectId(3)));
        assert_eq!(child.resolve_name("score"), Some(ObjectId(1)));
        assert_eq!(child.resolve_guid(0x20), Some(ObjectId(2)));
        assert_eq!(child.resolve_guid(0), None);
    }

    #[test]
    fn linking_is_idempotent_and_out_of_range_is_empty() {
        let mut table = ReferenceTable::new(vec![LocalRef::new(0x10, "Score")]);
        let scope = scope();
        table.link(&scope);
        let first = table.clone();
        table.link(&scope);
        assert_eq!(table, first);
        assert!(table.get_ref_by_index(5).is_empty());
    }
}

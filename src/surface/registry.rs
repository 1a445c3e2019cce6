//! Entry tree and handle management for the control surface.

use crate::error::{Result, VdevError};
use crate::surface::entry::{parse_bool_text, AccessMode, RawBuffer};
use log::debug;
use std::collections::HashMap;

/// Opaque handle to a control-surface entry.
///
/// Handles index into the registry's entry table; they never dangle into
/// freed storage, a stale handle simply stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(u64);

#[derive(Debug)]
enum EntryKind {
    Directory { children: Vec<EntryId> },
    RawBuffer(RawBuffer),
    Boolean(bool),
}

#[derive(Debug)]
struct SurfaceEntry {
    name: String,
    mode: AccessMode,
    parent: Option<EntryId>,
    kind: EntryKind,
}

/// Registry of inspection/control entries forming a tree.
///
/// Every non-root entry has exactly one parent directory. The registry is
/// exclusively owned by whoever drives the module lifecycle; it is not
/// shared across threads.
#[derive(Debug, Default)]
pub struct ControlSurface {
    entries: HashMap<EntryId, SurfaceEntry>,
    roots: Vec<EntryId>,
    next_id: u64,
}

impl ControlSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&mut self) -> EntryId {
        self.next_id += 1;
        EntryId(self.next_id)
    }

    fn entry(&self, id: EntryId) -> Result<&SurfaceEntry> {
        self.entries
            .get(&id)
            .ok_or_else(|| VdevError::not_found(format!("surface entry {:?}", id)))
    }

    fn entry_mut(&mut self, id: EntryId) -> Result<&mut SurfaceEntry> {
        self.entries
            .get_mut(&id)
            .ok_or_else(|| VdevError::not_found(format!("surface entry {:?}", id)))
    }

    /// Create a root directory entry.
    pub fn create_root(&mut self, name: &str) -> Result<EntryId> {
        if name.is_empty() {
            return Err(VdevError::resource("root directory needs a name"));
        }
        if self
            .roots
            .iter()
            .any(|id| self.entries[id].name == name)
        {
            return Err(VdevError::resource(format!(
                "root directory '{}' already exists",
                name
            )));
        }

        let id = self.alloc_id();
        self.entries.insert(
            id,
            SurfaceEntry {
                name: name.to_string(),
                mode: AccessMode::ReadWrite,
                parent: None,
                kind: EntryKind::Directory {
                    children: Vec::new(),
                },
            },
        );
        self.roots.push(id);
        debug!("surface: created root '{}'", name);
        Ok(id)
    }

    fn attach(
        &mut self,
        dir: EntryId,
        name: &str,
        mode: AccessMode,
        kind: EntryKind,
    ) -> Result<EntryId> {
        if name.is_empty() {
            return Err(VdevError::resource("entry needs a name"));
        }

        // Validate the parent and sibling uniqueness before allocating.
        {
            let parent = self.entry(dir)?;
            let children = match &parent.kind {
                EntryKind::Directory { children } => children,
                _ => {
                    return Err(VdevError::invalid_input(format!(
                        "'{}' is not a directory",
                        parent.name
                    )))
                }
            };
            if children.iter().any(|c| self.entries[c].name == name) {
                return Err(VdevError::resource(format!(
                    "entry '{}' already attached",
                    name
                )));
            }
        }

        let id = self.alloc_id();
        self.entries.insert(
            id,
            SurfaceEntry {
                name: name.to_string(),
                mode,
                parent: Some(dir),
                kind,
            },
        );
        if let EntryKind::Directory { children } = &mut self.entry_mut(dir)?.kind {
            children.push(id);
        }
        debug!("surface: attached entry '{}'", name);
        Ok(id)
    }

    /// Attach a raw buffer entry of `capacity` bytes under `dir`.
    ///
    /// The entry is visible to listing as soon as this returns.
    pub fn attach_raw_buffer(
        &mut self,
        dir: EntryId,
        name: &str,
        mode: AccessMode,
        capacity: usize,
    ) -> Result<EntryId> {
        if capacity == 0 {
            return Err(VdevError::resource(format!(
                "entry '{}' needs a nonzero capacity",
                name
            )));
        }
        self.attach(dir, name, mode, EntryKind::RawBuffer(RawBuffer::new(capacity)))
    }

    /// Attach a boolean cell entry under `dir`. The cell starts false.
    pub fn attach_boolean(
        &mut self,
        dir: EntryId,
        name: &str,
        mode: AccessMode,
    ) -> Result<EntryId> {
        self.attach(dir, name, mode, EntryKind::Boolean(false))
    }

    /// Remove an entry.
    ///
    /// Teardown is leaf-before-root: removing a directory that still has
    /// children is refused so a caller cannot orphan part of the tree.
    // TODO: offer a recursive removal so callers do not have to walk leaves
    // by hand.
    pub fn remove(&mut self, id: EntryId) -> Result<()> {
        match &self.entry(id)?.kind {
            EntryKind::Directory { children } if !children.is_empty() => {
                return Err(VdevError::invalid_input(format!(
                    "directory '{}' still has {} children",
                    self.entries[&id].name,
                    children.len()
                )));
            }
            _ => {}
        }

        if let Some(entry) = self.entries.remove(&id) {
            match entry.parent {
                Some(parent) => {
                    if let Some(p) = self.entries.get_mut(&parent) {
                        if let EntryKind::Directory { children } = &mut p.kind {
                            children.retain(|c| *c != id);
                        }
                    }
                }
                None => self.roots.retain(|r| *r != id),
            }
            debug!("surface: removed entry '{}'", entry.name);
        }
        Ok(())
    }

    /// Names of the entries attached under `dir`, in attach order.
    pub fn list(&self, dir: EntryId) -> Result<Vec<String>> {
        match &self.entry(dir)?.kind {
            EntryKind::Directory { children } => Ok(children
                .iter()
                .map(|c| self.entries[c].name.clone())
                .collect()),
            _ => Err(VdevError::invalid_input("not a directory".to_string())),
        }
    }

    /// Number of live entries, roots included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Access mode of an entry.
    pub fn mode(&self, id: EntryId) -> Result<AccessMode> {
        Ok(self.entry(id)?.mode)
    }

    /// Read up to `len` bytes from a raw buffer entry starting at `offset`.
    /// Zero bytes once the offset reaches capacity; that is end-of-entry,
    /// not an error.
    pub fn read_raw(&self, id: EntryId, offset: usize, len: usize) -> Result<Vec<u8>> {
        match &self.entry(id)?.kind {
            EntryKind::RawBuffer(buf) => Ok(buf.read_at(offset, len)),
            _ => Err(VdevError::invalid_input("not a raw buffer entry".to_string())),
        }
    }

    /// Write into a raw buffer entry at `offset`, returning the clamped
    /// number of bytes stored.
    pub fn write_raw(&mut self, id: EntryId, offset: usize, data: &[u8]) -> Result<usize> {
        let entry = self.entry_mut(id)?;
        if !entry.mode.is_writable() {
            return Err(VdevError::PermissionDenied(format!(
                "entry '{}' is read-only",
                entry.name
            )));
        }
        match &mut entry.kind {
            EntryKind::RawBuffer(buf) => Ok(buf.write_at(offset, data)),
            _ => Err(VdevError::invalid_input("not a raw buffer entry".to_string())),
        }
    }

    /// Read a boolean cell entry.
    pub fn read_bool(&self, id: EntryId) -> Result<bool> {
        match &self.entry(id)?.kind {
            EntryKind::Boolean(value) => Ok(*value),
            _ => Err(VdevError::invalid_input("not a boolean entry".to_string())),
        }
    }

    /// Write a boolean cell entry.
    pub fn write_bool(&mut self, id: EntryId, value: bool) -> Result<()> {
        let entry = self.entry_mut(id)?;
        if !entry.mode.is_writable() {
            return Err(VdevError::PermissionDenied(format!(
                "entry '{}' is read-only",
                entry.name
            )));
        }
        match &mut entry.kind {
            EntryKind::Boolean(cell) => {
                *cell = value;
                Ok(())
            }
            _ => Err(VdevError::invalid_input("not a boolean entry".to_string())),
        }
    }

    /// Write a boolean cell from text. A non-parseable value is rejected
    /// before the cell is touched.
    pub fn write_bool_text(&mut self, id: EntryId, text: &str) -> Result<()> {
        let value = parse_bool_text(text)?;
        self.write_bool(id, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::entry::RAW_BUFFER_CAPACITY;

    fn surface_with_root() -> (ControlSurface, EntryId) {
        let mut surface = ControlSurface::new();
        let root = surface.create_root("e_device").unwrap();
        (surface, root)
    }

    #[test]
    fn entries_visible_once_attached() {
        let (mut surface, root) = surface_with_root();
        assert!(surface.list(root).unwrap().is_empty());

        surface
            .attach_raw_buffer(root, "custom_value", AccessMode::ReadWrite, RAW_BUFFER_CAPACITY)
            .unwrap();
        surface
            .attach_boolean(root, "boolval", AccessMode::ReadWrite)
            .unwrap();

        assert_eq!(surface.list(root).unwrap(), vec!["custom_value", "boolval"]);
    }

    #[test]
    fn empty_root_name_is_creation_error() {
        let mut surface = ControlSurface::new();
        let err = surface.create_root("").unwrap_err();
        assert!(matches!(err, VdevError::ResourceCreation(_)));
    }

    #[test]
    fn duplicate_sibling_name_is_creation_error() {
        let (mut surface, root) = surface_with_root();
        surface
            .attach_boolean(root, "boolval", AccessMode::ReadWrite)
            .unwrap();
        let err = surface
            .attach_boolean(root, "boolval", AccessMode::ReadWrite)
            .unwrap_err();
        assert!(matches!(err, VdevError::ResourceCreation(_)));
    }

    #[test]
    fn remove_refuses_nonempty_directory() {
        let (mut surface, root) = surface_with_root();
        let leaf = surface
            .attach_boolean(root, "boolval", AccessMode::ReadWrite)
            .unwrap();

        let err = surface.remove(root).unwrap_err();
        assert!(matches!(err, VdevError::InvalidInput(_)));

        // Leaf first, then the root goes.
        surface.remove(leaf).unwrap();
        surface.remove(root).unwrap();
        assert!(surface.is_empty());
    }

    #[test]
    fn remove_unknown_handle_is_not_found() {
        let (mut surface, root) = surface_with_root();
        let leaf = surface
            .attach_boolean(root, "boolval", AccessMode::ReadWrite)
            .unwrap();
        surface.remove(leaf).unwrap();
        assert!(matches!(
            surface.remove(leaf),
            Err(VdevError::NotFound(_))
        ));
    }

    #[test]
    fn raw_entry_bounded_io_through_registry() {
        let (mut surface, root) = surface_with_root();
        let entry = surface
            .attach_raw_buffer(root, "custom_value", AccessMode::ReadWrite, RAW_BUFFER_CAPACITY)
            .unwrap();

        let written = surface.write_raw(entry, 0, &[0x42u8; 40]).unwrap();
        assert_eq!(written, RAW_BUFFER_CAPACITY);
        assert_eq!(
            surface.read_raw(entry, 0, 64).unwrap(),
            vec![0x42u8; RAW_BUFFER_CAPACITY]
        );
        assert!(surface.read_raw(entry, 32, 8).unwrap().is_empty());
    }

    #[test]
    fn bool_entry_defaults_false_and_holds_writes() {
        let (mut surface, root) = surface_with_root();
        let entry = surface
            .attach_boolean(root, "boolval", AccessMode::ReadWrite)
            .unwrap();

        assert!(!surface.read_bool(entry).unwrap());
        surface.write_bool(entry, true).unwrap();
        assert!(surface.read_bool(entry).unwrap());
        surface.write_bool_text(entry, "0").unwrap();
        assert!(!surface.read_bool(entry).unwrap());
    }

    #[test]
    fn malformed_text_write_leaves_cell_unchanged() {
        let (mut surface, root) = surface_with_root();
        let entry = surface
            .attach_boolean(root, "boolval", AccessMode::ReadWrite)
            .unwrap();
        surface.write_bool(entry, true).unwrap();

        let err = surface.write_bool_text(entry, "maybe").unwrap_err();
        assert!(matches!(err, VdevError::InvalidInput(_)));
        assert!(surface.read_bool(entry).unwrap());
    }

    #[test]
    fn read_only_entry_refuses_writes() {
        let (mut surface, root) = surface_with_root();
        let entry = surface
            .attach_raw_buffer(root, "custom_value", AccessMode::ReadOnly, RAW_BUFFER_CAPACITY)
            .unwrap();

        let err = surface.write_raw(entry, 0, b"x").unwrap_err();
        assert!(matches!(err, VdevError::PermissionDenied(_)));
        assert_eq!(surface.read_raw(entry, 0, 4).unwrap(), vec![0u8; 4]);
    }

    #[test]
    fn kind_mismatch_is_invalid_input() {
        let (mut surface, root) = surface_with_root();
        let boolean = surface
            .attach_boolean(root, "boolval", AccessMode::ReadWrite)
            .unwrap();
        assert!(surface.read_raw(boolean, 0, 4).is_err());
        assert!(surface.read_bool(root).is_err());
    }
}

//! The object heap: an arena owning every allocated string, plus the
//! interning table that guarantees one allocation per distinct content.

use crate::{object::hash_string, ObjString, StrId, Table, Value};

/// Owns every heap object created by the compiler or the VM.
///
/// Objects are only ever appended while the interpreter runs; nothing is
/// freed until the whole heap is dropped at teardown. The intern table keeps
/// non-owning [`StrId`] handles into the arena, which is what lets string
/// equality collapse to handle identity everywhere else in the system.
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<ObjString>,
    strings: Table,
}

impl Heap {
    /// Intern the given character content, copying it into a fresh
    /// allocation if no equal string exists yet.
    pub fn intern(&mut self, chars: &str) -> StrId {
        let hash = hash_string(chars);
        if let Some(id) = self.strings.find_str(&self.objects, chars, hash) {
            return id;
        }
        self.allocate(chars.into(), hash)
    }

    /// Intern an already-owned buffer, taking ownership of it.
    ///
    /// Used by runtime concatenation so the freshly built string is not
    /// copied a second time. If an equal string is already interned the
    /// passed-in buffer is dropped here and the existing handle returned.
    pub fn intern_owned(&mut self, chars: String) -> StrId {
        let hash = hash_string(&chars);
        if let Some(id) = self.strings.find_str(&self.objects, &chars, hash) {
            drop(chars);
            return id;
        }
        self.allocate(chars.into_boxed_str(), hash)
    }

    /// Resolve a handle to the string content it points at.
    pub fn get_str(&self, id: StrId) -> &str {
        &self.objects[id.index()].chars
    }

    fn allocate(&mut self, chars: Box<str>, hash: u32) -> StrId {
        let id = StrId::new(self.objects.len());
        self.objects.push(ObjString { chars, hash });
        self.strings.set(&self.objects, id, Value::Nil);
        id
    }
}

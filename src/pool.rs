//! Constant pool model: tagged entries, byte-range views into the class
//! buffer, and the in-place rewrite of field references into resolved
//! layout slots.
use std::mem;

/// Log2 of the platform pointer size; reference-typed fields occupy one
/// pointer-sized cell in the instance field area.
pub const POINTER_LOG2: u8 = mem::size_of::<usize>().trailing_zeros() as u8;

/// A non-owning view of a byte range inside a class's backing buffer.
///
/// Spans stand in for borrowed strings everywhere the pool refers to UTF-8
/// data; two spans compare equal by content once resolved against their
/// buffers with [`Span::of`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    start: u32,
    len: u32,
}

impl Span {
    pub fn new(start: usize, len: usize) -> Self {
        Self {
            start: start as u32,
            len: len as u32,
        }
    }

    pub fn start(&self) -> usize {
        self.start as usize
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Resolves the span against the buffer it was created from.
    pub fn of<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.start as usize..(self.start + self.len) as usize]
    }
}

/// Semantic shape of a resolved field, derived from its descriptor.
///
/// The operand stack is tagged, so a field slot has to record how its raw
/// cell is to be decoded; punning the bits into a bare word would lose the
/// tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Float,
    Long,
    Double,
    Reference,
}

/// A field reference resolved to its instance layout: byte offset within
/// the field area and the log2 of the cell size.
///
/// Produced by the loader, which overwrites the pool's `FieldRef` slot so
/// that `getfield`/`putfield` read the offset directly with no lookup
/// structure in the hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedField {
    pub offset: u16,
    pub size_log2: u8,
    pub kind: FieldKind,
}

impl ResolvedField {
    /// Size in bytes of the field's cell.
    pub fn byte_len(&self) -> usize {
        1 << self.size_log2
    }
}

/// One constant-pool entry. Tag values follow the class-file format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    /// Index 0, and the trailing slot of each Long/Double entry.
    Unused,
    Utf8(Span),
    Integer(u32),
    Float(u32),
    Long(u64),
    Double(u64),
    Class {
        name_index: u16,
    },
    String {
        utf8_index: u16,
    },
    FieldRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    MethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    MethodHandle {
        reference_kind: u8,
        reference_index: u16,
    },
    MethodType {
        descriptor_index: u16,
    },
    InvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    /// A `FieldRef` rewritten after field resolution.
    Field(ResolvedField),
}

/// One-based collection of constants plus the byte offset at which each
/// entry started in the source buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantPool {
    entries: Vec<Constant>,
    offsets: Vec<u32>,
}

impl ConstantPool {
    pub(crate) fn new(entries: Vec<Constant>, offsets: Vec<u32>) -> Self {
        debug_assert_eq!(entries.len(), offsets.len());
        Self { entries, offsets }
    }

    /// Number of slots, including the unused slot 0.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: u16) -> Option<&Constant> {
        match self.entries.get(index as usize) {
            Some(Constant::Unused) | None => None,
            Some(entry) => Some(entry),
        }
    }

    /// Byte offsets of all entries, indexed like the pool itself.
    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    /// The UTF-8 span at `index`, if that slot is a Utf8 entry.
    pub fn utf8(&self, index: u16) -> Option<Span> {
        match self.get(index)? {
            Constant::Utf8(span) => Some(*span),
            _ => None,
        }
    }

    /// Name index of the Class entry at `index`.
    pub fn class_name_index(&self, index: u16) -> Option<u16> {
        match self.get(index)? {
            Constant::Class { name_index } => Some(*name_index),
            _ => None,
        }
    }

    /// `(name_index, descriptor_index)` of the NameAndType entry at `index`.
    pub fn name_and_type(&self, index: u16) -> Option<(u16, u16)> {
        match self.get(index)? {
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => Some((*name_index, *descriptor_index)),
            _ => None,
        }
    }

    /// `(class_index, name_and_type_index)` of a field, method, or
    /// interface-method reference at `index`.
    pub fn member_ref(&self, index: u16) -> Option<(u16, u16)> {
        match self.get(index)? {
            Constant::FieldRef {
                class_index,
                name_and_type_index,
            }
            | Constant::MethodRef {
                class_index,
                name_and_type_index,
            }
            | Constant::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => Some((*class_index, *name_and_type_index)),
            _ => None,
        }
    }

    /// `(class_index, name_and_type_index)` of the FieldRef at `index`.
    /// Unlike [`ConstantPool::member_ref`] this matches field references
    /// only; it drives the loader's substitution pass.
    pub fn field_ref(&self, index: u16) -> Option<(u16, u16)> {
        match self.get(index)? {
            Constant::FieldRef {
                class_index,
                name_and_type_index,
            } => Some((*class_index, *name_and_type_index)),
            _ => None,
        }
    }

    /// The resolved field slot at `index`, if the loader rewrote it.
    pub fn resolved_field(&self, index: u16) -> Option<ResolvedField> {
        match self.get(index)? {
            Constant::Field(field) => Some(*field),
            _ => None,
        }
    }

    /// Overwrites the slot at `index`; used by the loader when a
    /// `FieldRef` resolves to a layout slot of the class being loaded.
    pub(crate) fn rewrite(&mut self, index: u16, field: ResolvedField) {
        self.entries[index as usize] = Constant::Field(field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> ConstantPool {
        let entries = vec![
            Constant::Unused,
            Constant::Utf8(Span::new(10, 3)),
            Constant::Class { name_index: 1 },
            Constant::FieldRef {
                class_index: 2,
                name_and_type_index: 4,
            },
            Constant::NameAndType {
                name_index: 1,
                descriptor_index: 1,
            },
            Constant::Long(7),
            Constant::Unused,
        ];
        let offsets = vec![0, 10, 15, 18, 23, 28, 28];
        ConstantPool::new(entries, offsets)
    }

    #[test]
    fn typed_lookups() {
        let pool = pool();
        assert_eq!(pool.utf8(1), Some(Span::new(10, 3)));
        assert_eq!(pool.class_name_index(2), Some(1));
        assert_eq!(pool.member_ref(3), Some((2, 4)));
        assert_eq!(pool.name_and_type(4), Some((1, 1)));
        // Mismatched shapes resolve to nothing.
        assert_eq!(pool.utf8(2), None);
        assert_eq!(pool.class_name_index(1), None);
        assert_eq!(pool.resolved_field(3), None);
    }

    #[test]
    fn unused_slots_are_invisible() {
        let pool = pool();
        assert!(pool.get(0).is_none());
        assert!(pool.get(6).is_none());
        assert!(pool.get(40).is_none());
    }

    #[test]
    fn rewrite_replaces_field_ref() {
        let mut pool = pool();
        let field = ResolvedField {
            offset: 4,
            size_log2: 2,
            kind: FieldKind::Int,
        };
        pool.rewrite(3, field);
        assert_eq!(pool.resolved_field(3), Some(field));
        assert_eq!(pool.member_ref(3), None);
    }

    #[test]
    fn span_resolves_by_content() {
        let a = b"..abc...";
        let b = b"abc";
        assert_eq!(Span::new(2, 3).of(a), Span::new(0, 3).of(b));
    }
}

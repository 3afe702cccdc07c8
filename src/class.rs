//! In-memory representation of a parsed class: the backing byte buffer,
//! the constant pool, the method table, and the instance field layout.
use std::borrow::Cow;

use crate::pool::{ConstantPool, ResolvedField, Span};

/// An attribute kept as a raw byte range. Only `Code` (per method) and
/// `SourceFile` (per class) are interpreted; everything else is retained
/// here untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attribute {
    pub name_index: u16,
    pub data: Span,
}

/// The decoded `Code` attribute of a method.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Span,
}

/// One entry of the method table.
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    /// Decoded eagerly at load time; absent for abstract/native methods.
    pub code: Option<CodeAttribute>,
    pub attributes: Vec<Attribute>,
}

/// Field-layout summary: the highest-offset field of the class. The field
/// area is allocated by cumulative summation, so the area ends right after
/// this field's cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceLayout {
    pub offset: u16,
    pub size_log2: u8,
}

impl InstanceLayout {
    /// Total size in bytes of an instance's field area.
    pub fn area_size(&self) -> usize {
        self.offset as usize + (1 << self.size_log2)
    }
}

/// A parsed class. Owns the class-file bytes for its whole lifetime; pool
/// entries and attributes reference them as spans.
#[derive(Debug, PartialEq)]
pub struct Class {
    pub(crate) name: String,
    pub(crate) bytes: Box<[u8]>,
    pub(crate) pool: ConstantPool,
    pub(crate) minor_version: u16,
    pub(crate) major_version: u16,
    pub(crate) access_flags: u16,
    pub(crate) this_class: u16,
    pub(crate) super_class: u16,
    pub(crate) methods: Vec<Method>,
    pub(crate) layout: Option<InstanceLayout>,
    pub(crate) source_file: Option<Span>,
    pub(crate) attributes: Vec<Attribute>,
}

impl Class {
    /// The name the class was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn pool(&self) -> &ConstantPool {
        &self.pool
    }

    pub fn major_version(&self) -> u16 {
        self.major_version
    }

    pub fn minor_version(&self) -> u16 {
        self.minor_version
    }

    pub fn access_flags(&self) -> u16 {
        self.access_flags
    }

    pub fn super_class(&self) -> u16 {
        self.super_class
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn layout(&self) -> Option<InstanceLayout> {
        self.layout
    }

    /// The retained `SourceFile` name, if the class carried one.
    pub fn source_file(&self) -> Option<&[u8]> {
        self.source_file.map(|span| span.of(&self.bytes))
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Resolves the UTF-8 entry at `index` against the class buffer.
    pub fn utf8(&self, index: u16) -> Option<&[u8]> {
        self.pool.utf8(index).map(|span| span.of(&self.bytes))
    }

    /// Lossy string form of a UTF-8 entry, for diagnostics.
    pub fn utf8_lossy(&self, index: u16) -> Cow<'_, str> {
        match self.utf8(index) {
            Some(bytes) => String::from_utf8_lossy(bytes),
            None => Cow::Borrowed("<bad utf8 index>"),
        }
    }

    /// The name of the Class constant at `index`.
    pub fn class_name_at(&self, index: u16) -> Option<&[u8]> {
        self.utf8(self.pool.class_name_index(index)?)
    }

    /// Resolves a method or interface-method reference at `index` to
    /// `(class name, method name, descriptor)`.
    pub fn member_ref_at(&self, index: u16) -> Option<(&[u8], &[u8], &[u8])> {
        let (class_index, nat_index) = self.pool.member_ref(index)?;
        let class_name = self.class_name_at(class_index)?;
        let (name_index, descriptor_index) = self.pool.name_and_type(nat_index)?;
        Some((
            class_name,
            self.utf8(name_index)?,
            self.utf8(descriptor_index)?,
        ))
    }

    /// The resolved field slot at `index`, if the loader rewrote it.
    pub fn field_slot(&self, index: u16) -> Option<ResolvedField> {
        self.pool.resolved_field(index)
    }

    /// Linear lookup over the method table matching both name and
    /// descriptor by content.
    pub fn find_method(&self, name: &[u8], descriptor: &[u8]) -> Option<&Method> {
        self.methods.iter().find(|m| {
            self.utf8(m.name_index) == Some(name) && self.utf8(m.descriptor_index) == Some(descriptor)
        })
    }

    /// First method with the given name, any descriptor. Used by the host
    /// harness to locate an entry point.
    pub fn method_named(&self, name: &[u8]) -> Option<&Method> {
        self.methods
            .iter()
            .find(|m| self.utf8(m.name_index) == Some(name))
    }

    /// The method's name for diagnostics.
    pub fn method_name(&self, method: &Method) -> Cow<'_, str> {
        self.utf8_lossy(method.name_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_area_size() {
        // Two int fields at offsets 0 and 4: the area ends at byte 8.
        let layout = InstanceLayout {
            offset: 4,
            size_log2: 2,
        };
        assert_eq!(layout.area_size(), 8);

        // A lone pointer-sized field on a 64-bit host.
        let layout = InstanceLayout {
            offset: 0,
            size_log2: 3,
        };
        assert_eq!(layout.area_size(), 8);
    }
}

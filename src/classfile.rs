//! Class-file loader: parses the 0xCAFEBABE binary format into a [`Class`],
//! resolving this class's field references into layout slots along the way.
use std::error::Error;
use std::fmt;

use tracing::debug;

use crate::bytes::{self, Reader};
use crate::class::{Attribute, Class, CodeAttribute, InstanceLayout, Method};
use crate::pool::{Constant, ConstantPool, FieldKind, ResolvedField, Span, POINTER_LOG2};

/// Magic bytes opening every class file.
pub const CLASS_MAGIC: u32 = 0xCAFE_BABE;

/// Errors surfaced by the loader. All of them abort the parse; no class is
/// produced or registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassError {
    /// The buffer does not open with [`CLASS_MAGIC`].
    BadMagic { found: u32 },
    /// A read ran past the end of the buffer.
    Truncated { at: usize },
    /// A constant-pool entry carried a tag outside the recognized set.
    UnknownTag { tag: u8, index: u16 },
    /// The file uses a feature outside this subset.
    Unsupported(&'static str),
}

impl fmt::Display for ClassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic { found } => {
                write!(f, "bad class file magic {found:#010x}")
            }
            Self::Truncated { at } => {
                write!(f, "class file truncated at byte {at}")
            }
            Self::UnknownTag { tag, index } => {
                write!(f, "unknown constant tag {tag} at pool index {index}")
            }
            Self::Unsupported(what) => write!(f, "unsupported class file: {what}"),
        }
    }
}

impl Error for ClassError {}

impl From<usize> for ClassError {
    fn from(at: usize) -> Self {
        Self::Truncated { at }
    }
}

/// Parses `bytes` as a class file to be registered under `name`. The
/// returned [`Class`] takes ownership of the buffer; spans inside the class
/// reference it for the class's whole lifetime.
pub fn parse_class(name: &str, bytes: Vec<u8>) -> Result<Class, ClassError> {
    let mut r = Reader::new(&bytes);

    let magic = r.u32()?;
    if magic != CLASS_MAGIC {
        return Err(ClassError::BadMagic { found: magic });
    }
    let minor_version = r.u16()?;
    let major_version = r.u16()?;

    let constant_count = r.u16()?;
    let mut pool = parse_pool(&mut r, constant_count)?;

    let access_flags = r.u16()?;
    let this_class = r.u16()?;
    let super_class = r.u16()?;

    let interfaces_count = r.u16()?;
    if interfaces_count > 0 {
        return Err(ClassError::Unsupported("interfaces"));
    }

    let layout = parse_fields(&mut r, &mut pool, &bytes, name)?;

    let methods_count = r.u16()?;
    let mut methods = Vec::with_capacity(methods_count as usize);
    for _ in 0..methods_count {
        let access_flags = r.u16()?;
        let name_index = r.u16()?;
        let descriptor_index = r.u16()?;
        let attributes = parse_attributes(&mut r)?;
        let code = decode_code(&pool, &bytes, &attributes)?;
        methods.push(Method {
            access_flags,
            name_index,
            descriptor_index,
            code,
            attributes,
        });
    }

    let attributes = parse_attributes(&mut r)?;
    let source_file = decode_source_file(&pool, &bytes, &attributes)?;

    debug!(
        class = name,
        constants = pool.len(),
        methods = methods.len(),
        "loaded class"
    );

    Ok(Class {
        name: name.to_owned(),
        bytes: bytes.into_boxed_slice(),
        pool,
        minor_version,
        major_version,
        access_flags,
        this_class,
        super_class,
        methods,
        layout,
        source_file,
        attributes,
    })
}

/// Walks the `constant_count - 1` pool entries, recording each entry's
/// starting byte offset. Long and Double take two slots (the trailing one
/// stays `Unused` and repeats the owner's offset in the table).
fn parse_pool(r: &mut Reader<'_>, constant_count: u16) -> Result<ConstantPool, ClassError> {
    if constant_count == 0 {
        return Err(ClassError::Unsupported("constant pool count of zero"));
    }
    let slots = constant_count as usize;
    let mut entries = vec![Constant::Unused; slots];
    let mut offsets = vec![0u32; slots];

    let mut index = 1;
    while index < slots {
        offsets[index] = r.pos() as u32;
        let tag = r.u8()?;
        let entry = match tag {
            1 => {
                let len = r.u16()? as usize;
                let start = r.skip(len)?;
                Constant::Utf8(Span::new(start, len))
            }
            3 => Constant::Integer(r.u32()?),
            4 => Constant::Float(r.u32()?),
            5 => {
                let hi = r.u32()?;
                let lo = r.u32()?;
                Constant::Long(u64::from(hi) << 32 | u64::from(lo))
            }
            6 => {
                let hi = r.u32()?;
                let lo = r.u32()?;
                Constant::Double(u64::from(hi) << 32 | u64::from(lo))
            }
            7 => Constant::Class {
                name_index: r.u16()?,
            },
            8 => Constant::String {
                utf8_index: r.u16()?,
            },
            9 => Constant::FieldRef {
                class_index: r.u16()?,
                name_and_type_index: r.u16()?,
            },
            10 => Constant::MethodRef {
                class_index: r.u16()?,
                name_and_type_index: r.u16()?,
            },
            11 => Constant::InterfaceMethodRef {
                class_index: r.u16()?,
                name_and_type_index: r.u16()?,
            },
            12 => Constant::NameAndType {
                name_index: r.u16()?,
                descriptor_index: r.u16()?,
            },
            15 => Constant::MethodHandle {
                reference_kind: r.u8()?,
                reference_index: r.u16()?,
            },
            16 => Constant::MethodType {
                descriptor_index: r.u16()?,
            },
            18 => Constant::InvokeDynamic {
                bootstrap_method_attr_index: r.u16()?,
                name_and_type_index: r.u16()?,
            },
            tag => {
                return Err(ClassError::UnknownTag {
                    tag,
                    index: index as u16,
                })
            }
        };
        let wide = matches!(entry, Constant::Long(_) | Constant::Double(_));
        entries[index] = entry;
        index += 1;
        if wide && index < slots {
            offsets[index] = offsets[index - 1];
            index += 1;
        }
    }

    Ok(ConstantPool::new(entries, offsets))
}

/// Parses the fields section: assigns each field a byte offset by
/// cumulative summation, tracks the layout summary, and rewrites every
/// pool `FieldRef` naming `class_name` + a declared field into a
/// [`ResolvedField`] slot.
fn parse_fields(
    r: &mut Reader<'_>,
    pool: &mut ConstantPool,
    bytes: &[u8],
    class_name: &str,
) -> Result<Option<InstanceLayout>, ClassError> {
    let fields_count = r.u16()?;
    let mut next_offset: u32 = 0;
    let mut layout = None;
    let mut declared = Vec::with_capacity(fields_count as usize);

    for _ in 0..fields_count {
        let _access_flags = r.u16()?;
        let name_index = r.u16()?;
        let descriptor_index = r.u16()?;
        // Field attributes (ConstantValue and friends) are skipped.
        parse_attributes(r)?;

        let name = pool
            .utf8(name_index)
            .ok_or(ClassError::Unsupported("field name index"))?;
        let descriptor = pool
            .utf8(descriptor_index)
            .ok_or(ClassError::Unsupported("field descriptor index"))?;
        let (size_log2, kind) = field_shape(descriptor.of(bytes))?;

        let offset = u16::try_from(next_offset)
            .map_err(|_| ClassError::Unsupported("instance field area too large"))?;
        next_offset += 1u32 << size_log2;

        // Offsets grow monotonically, so the latest field carries the
        // maximum (offset, size-class) pair.
        layout = Some(InstanceLayout { offset, size_log2 });
        declared.push((
            name,
            ResolvedField {
                offset,
                size_log2,
                kind,
            },
        ));
    }

    for (name, field) in &declared {
        substitute_field_refs(pool, bytes, class_name, name.of(bytes), *field);
    }

    Ok(layout)
}

/// Overwrites every `FieldRef` slot that references `class_name` and
/// `field_name` with the resolved layout slot.
fn substitute_field_refs(
    pool: &mut ConstantPool,
    bytes: &[u8],
    class_name: &str,
    field_name: &[u8],
    field: ResolvedField,
) {
    for index in 1..pool.len() as u16 {
        let Some((class_index, nat_index)) = pool.field_ref(index) else {
            continue;
        };
        let class_matches = pool
            .class_name_index(class_index)
            .and_then(|name_index| pool.utf8(name_index))
            .map(|span| span.of(bytes) == class_name.as_bytes())
            .unwrap_or(false);
        let name_matches = pool
            .name_and_type(nat_index)
            .and_then(|(name_index, _)| pool.utf8(name_index))
            .map(|span| span.of(bytes) == field_name)
            .unwrap_or(false);
        if class_matches && name_matches {
            pool.rewrite(index, field);
        }
    }
}

/// Size-class log2 and semantic kind of a field descriptor. Integral types
/// of 32 bits or narrower share the 4-byte cell; references take one
/// pointer-sized cell.
fn field_shape(descriptor: &[u8]) -> Result<(u8, FieldKind), ClassError> {
    match descriptor.first() {
        Some(b'B' | b'C' | b'I' | b'S' | b'Z') => Ok((2, FieldKind::Int)),
        Some(b'F') => Ok((2, FieldKind::Float)),
        Some(b'J') => Ok((3, FieldKind::Long)),
        Some(b'D') => Ok((3, FieldKind::Double)),
        Some(b'L' | b'[') => Ok((POINTER_LOG2, FieldKind::Reference)),
        _ => Err(ClassError::Unsupported("field descriptor")),
    }
}

/// Reads an attribute table, retaining each attribute as a raw byte range.
fn parse_attributes(r: &mut Reader<'_>) -> Result<Vec<Attribute>, ClassError> {
    let count = r.u16()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_index = r.u16()?;
        let len = r.u32()? as usize;
        let start = r.skip(len)?;
        attributes.push(Attribute {
            name_index,
            data: Span::new(start, len),
        });
    }
    Ok(attributes)
}

/// Decodes the `Code` attribute if the method carries one. The exception
/// table and nested attributes after the bytecode are left unread.
fn decode_code(
    pool: &ConstantPool,
    bytes: &[u8],
    attributes: &[Attribute],
) -> Result<Option<CodeAttribute>, ClassError> {
    for attr in attributes {
        if !attribute_is(pool, bytes, attr, b"Code") {
            continue;
        }
        let data = attr.data.of(bytes);
        let malformed = ClassError::Unsupported("malformed Code attribute");
        let max_stack = bytes::u16_at(data, 0).ok_or(malformed.clone())?;
        let max_locals = bytes::u16_at(data, 2).ok_or(malformed.clone())?;
        let code_length = bytes::u32_at(data, 4).ok_or(malformed.clone())? as usize;
        if data.len() < 8 + code_length {
            return Err(malformed);
        }
        return Ok(Some(CodeAttribute {
            max_stack,
            max_locals,
            code: Span::new(attr.data.start() + 8, code_length),
        }));
    }
    Ok(None)
}

/// Recognizes the class-level `SourceFile` attribute and resolves the file
/// name it points at.
fn decode_source_file(
    pool: &ConstantPool,
    bytes: &[u8],
    attributes: &[Attribute],
) -> Result<Option<Span>, ClassError> {
    for attr in attributes {
        if !attribute_is(pool, bytes, attr, b"SourceFile") {
            continue;
        }
        let malformed = ClassError::Unsupported("malformed SourceFile attribute");
        let data = attr.data.of(bytes);
        if data.len() != 2 {
            return Err(malformed);
        }
        let index = bytes::u16_at(data, 0).ok_or(malformed.clone())?;
        return Ok(Some(pool.utf8(index).ok_or(malformed)?));
    }
    Ok(None)
}

fn attribute_is(pool: &ConstantPool, bytes: &[u8], attr: &Attribute, name: &[u8]) -> bool {
    pool.utf8(attr.name_index)
        .map(|span| span.of(bytes) == name)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::FieldKind;
    use crate::testutil::ClassImage;

    #[test]
    fn rejects_bad_magic() {
        let mut image = ClassImage::new();
        image.add_method("main", "()V", 0, 1, &[0xb1]);
        let mut bytes = image.build();
        bytes[..4].copy_from_slice(&0xDEAD_BEEFu32.to_be_bytes());
        assert_eq!(
            parse_class("Test", bytes),
            Err(ClassError::BadMagic {
                found: 0xDEAD_BEEF
            })
        );
    }

    #[test]
    fn rejects_truncated_input() {
        let mut image = ClassImage::new();
        image.add_method("main", "()V", 0, 1, &[0xb1]);
        let bytes = image.build();
        for len in [2, 9, bytes.len() - 1] {
            let result = parse_class("Test", bytes[..len].to_vec());
            assert!(
                matches!(result, Err(ClassError::Truncated { .. })),
                "prefix of {len} bytes parsed as {result:?}"
            );
        }
    }

    #[test]
    fn rejects_unknown_constant_tag() {
        let mut image = ClassImage::new();
        image.raw_constant(&[42, 0, 0], 1);
        let result = parse_class("Test", image.build());
        assert!(matches!(
            result,
            Err(ClassError::UnknownTag { tag: 42, .. })
        ));
    }

    #[test]
    fn rejects_interfaces() {
        let mut image = ClassImage::new();
        image.interfaces_count = 1;
        assert_eq!(
            parse_class("Test", image.build()),
            Err(ClassError::Unsupported("interfaces"))
        );
    }

    #[test]
    fn versions_are_retained_unchecked() {
        let image = ClassImage::new();
        let class = parse_class("Test", image.build()).unwrap();
        assert_eq!(class.major_version(), 52);
        assert_eq!(class.minor_version(), 0);
    }

    #[test]
    fn field_layout_by_cumulative_summation() {
        let mut image = ClassImage::new();
        image.add_field("a", "I");
        image.add_field("b", "F");
        image.add_field("c", "Ljava/lang/Object;");
        let class = parse_class("Test", image.build()).unwrap();
        let layout = class.layout().unwrap();
        // a at 0, b at 4, c at 8 with a pointer-sized cell.
        assert_eq!(layout.offset, 8);
        assert_eq!(layout.size_log2, POINTER_LOG2);
        assert_eq!(layout.area_size(), 8 + (1 << POINTER_LOG2));
    }

    #[test]
    fn field_refs_are_rewritten_in_place() {
        let mut image = ClassImage::new();
        image.add_field("x", "I");
        image.add_field("y", "F");
        let x_ref = image.field_ref("Test", "x", "I");
        let y_ref = image.field_ref("Test", "y", "F");
        let other = image.field_ref("Other", "x", "I");
        let class = parse_class("Test", image.build()).unwrap();

        let x = class.field_slot(x_ref).unwrap();
        assert_eq!((x.offset, x.size_log2, x.kind), (0, 2, FieldKind::Int));
        let y = class.field_slot(y_ref).unwrap();
        assert_eq!((y.offset, y.size_log2, y.kind), (4, 2, FieldKind::Float));
        // A reference to another class's field stays a FieldRef.
        assert_eq!(class.field_slot(other), None);
        assert!(class.pool().field_ref(other).is_some());
    }

    #[test]
    fn long_and_double_take_two_pool_slots() {
        let mut image = ClassImage::new();
        let long_index = image.long_constant(7);
        let marker = image.utf8("after");
        assert_eq!(marker, long_index + 2);
        let class = parse_class("Test", image.build()).unwrap();
        assert_eq!(class.pool().get(long_index + 1), None);
        assert_eq!(class.utf8(marker), Some(&b"after"[..]));
        // The phantom slot repeats the owning entry's offset.
        let offsets = class.pool().offsets();
        assert_eq!(
            offsets[long_index as usize],
            offsets[long_index as usize + 1]
        );
    }

    #[test]
    fn source_file_is_retained() {
        let mut image = ClassImage::new();
        image.source_file("Test.java");
        let class = parse_class("Test", image.build()).unwrap();
        assert_eq!(class.source_file(), Some(&b"Test.java"[..]));
    }

    #[test]
    fn unrecognized_attributes_are_kept() {
        let mut image = ClassImage::new();
        image.class_attribute("Deprecated", &[]);
        let class = parse_class("Test", image.build()).unwrap();
        assert_eq!(class.attributes().len(), 1);
        assert_eq!(class.source_file(), None);
    }

    #[test]
    fn pool_offsets_are_deterministic() {
        let mut image = ClassImage::new();
        image.add_field("x", "I");
        image.field_ref("Test", "x", "I");
        image.long_constant(1);
        image.add_method("main", "()V", 0, 1, &[0xb1]);
        let bytes = image.build();

        let first = parse_class("Test", bytes.clone()).unwrap();
        let second = parse_class("Test", bytes).unwrap();
        assert_eq!(first.pool().offsets(), second.pool().offsets());
    }
}

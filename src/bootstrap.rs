//! The manually prepared root class blob. The VM carries no standard
//! library; the one class every program ultimately inherits from is
//! hand-assembled here: `java/lang/Object` with a single empty `<init>()V`.
pub const ROOT_CLASS_NAME: &str = "java/lang/Object";

/// A complete, minimal class file for [`ROOT_CLASS_NAME`].
#[rustfmt::skip]
pub const ROOT_CLASS: &[u8] = &[
    0xCA, 0xFE, 0xBA, 0xBE, // magic
    0x00, 0x00, // minor_version 0
    0x00, 0x34, // major_version 52
    0x00, 0x06, // constant_count (5 entries)
    // #1 Utf8 "java/lang/Object"
    0x01, 0x00, 0x10,
    b'j', b'a', b'v', b'a', b'/', b'l', b'a', b'n', b'g', b'/',
    b'O', b'b', b'j', b'e', b'c', b't',
    // #2 Class -> #1
    0x07, 0x00, 0x01,
    // #3 Utf8 "<init>"
    0x01, 0x00, 0x06, b'<', b'i', b'n', b'i', b't', b'>',
    // #4 Utf8 "()V"
    0x01, 0x00, 0x03, b'(', b')', b'V',
    // #5 Utf8 "Code"
    0x01, 0x00, 0x04, b'C', b'o', b'd', b'e',
    0x00, 0x21, // access_flags ACC_PUBLIC | ACC_SUPER
    0x00, 0x02, // this_class -> #2
    0x00, 0x00, // super_class (none; this is the root)
    0x00, 0x00, // interfaces_count
    0x00, 0x00, // fields_count
    0x00, 0x01, // methods_count
    // <init>()V
    0x00, 0x01, // access_flags ACC_PUBLIC
    0x00, 0x03, // name_index -> #3
    0x00, 0x04, // descriptor_index -> #4
    0x00, 0x01, // attributes_count
    // Code attribute
    0x00, 0x05, // attribute_name_index -> #5
    0x00, 0x00, 0x00, 0x0D, // attribute_length
    0x00, 0x00, // max_stack
    0x00, 0x01, // max_locals
    0x00, 0x00, 0x00, 0x01, // code_length
    0xB1,       // return
    0x00, 0x00, // exception_table_length
    0x00, 0x00, // attributes_count
    0x00, 0x00, // class attributes_count
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::parse_class;

    #[test]
    fn root_blob_parses() {
        let class = parse_class(ROOT_CLASS_NAME, ROOT_CLASS.to_vec()).unwrap();
        assert_eq!(class.name(), ROOT_CLASS_NAME);
        assert_eq!(class.super_class(), 0);
        assert!(class.layout().is_none());

        let init = class
            .find_method(b"<init>", b"()V")
            .expect("root class should declare <init>()V");
        let code = init.code.expect("<init> should carry Code");
        assert_eq!(code.max_locals, 1);
        assert_eq!(code.code.of(class.bytes()), [0xB1]);
    }
}

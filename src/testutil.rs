//! Test-only assembler for class-file byte images. Keeps pool slot
//! accounting (Long/Double take two slots) so fixtures exercise the loader
//! the way real class files do.

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// Builder for a single class-file image.
pub(crate) struct ClassImage {
    constants: Vec<u8>,
    next_index: u16,
    pub(crate) access_flags: u16,
    pub(crate) this_class: u16,
    pub(crate) super_class: u16,
    pub(crate) interfaces_count: u16,
    fields: Vec<u8>,
    fields_count: u16,
    methods: Vec<u8>,
    methods_count: u16,
    attributes: Vec<u8>,
    attributes_count: u16,
}

impl ClassImage {
    pub(crate) fn new() -> Self {
        Self {
            constants: Vec::new(),
            next_index: 1,
            access_flags: 0x0021,
            this_class: 0,
            super_class: 0,
            interfaces_count: 0,
            fields: Vec::new(),
            fields_count: 0,
            methods: Vec::new(),
            methods_count: 0,
            attributes: Vec::new(),
            attributes_count: 0,
        }
    }

    /// Appends a pre-encoded constant occupying `slots` pool slots.
    pub(crate) fn raw_constant(&mut self, bytes: &[u8], slots: u16) -> u16 {
        let index = self.next_index;
        self.constants.extend_from_slice(bytes);
        self.next_index += slots;
        index
    }

    pub(crate) fn utf8(&mut self, s: &str) -> u16 {
        let mut entry = vec![1u8];
        push_u16(&mut entry, s.len() as u16);
        entry.extend_from_slice(s.as_bytes());
        self.raw_constant(&entry, 1)
    }

    pub(crate) fn integer_constant(&mut self, v: i32) -> u16 {
        let mut entry = vec![3u8];
        push_u32(&mut entry, v as u32);
        self.raw_constant(&entry, 1)
    }

    pub(crate) fn float_constant(&mut self, v: f32) -> u16 {
        let mut entry = vec![4u8];
        push_u32(&mut entry, v.to_bits());
        self.raw_constant(&entry, 1)
    }

    pub(crate) fn long_constant(&mut self, v: i64) -> u16 {
        let mut entry = vec![5u8];
        entry.extend_from_slice(&(v as u64).to_be_bytes());
        self.raw_constant(&entry, 2)
    }

    pub(crate) fn string_constant(&mut self, s: &str) -> u16 {
        let utf8 = self.utf8(s);
        let mut entry = vec![8u8];
        push_u16(&mut entry, utf8);
        self.raw_constant(&entry, 1)
    }

    pub(crate) fn class_constant(&mut self, name: &str) -> u16 {
        let utf8 = self.utf8(name);
        let mut entry = vec![7u8];
        push_u16(&mut entry, utf8);
        self.raw_constant(&entry, 1)
    }

    pub(crate) fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        let mut entry = vec![12u8];
        push_u16(&mut entry, name);
        push_u16(&mut entry, descriptor);
        self.raw_constant(&entry, 1)
    }

    fn member_ref(&mut self, tag: u8, class: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class_constant(class);
        let nat = self.name_and_type(name, descriptor);
        let mut entry = vec![tag];
        push_u16(&mut entry, class);
        push_u16(&mut entry, nat);
        self.raw_constant(&entry, 1)
    }

    pub(crate) fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(9, class, name, descriptor)
    }

    pub(crate) fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(10, class, name, descriptor)
    }

    pub(crate) fn add_field(&mut self, name: &str, descriptor: &str) {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        push_u16(&mut self.fields, 0x0002);
        push_u16(&mut self.fields, name);
        push_u16(&mut self.fields, descriptor);
        push_u16(&mut self.fields, 0); // attributes_count
        self.fields_count += 1;
    }

    pub(crate) fn add_method(
        &mut self,
        name: &str,
        descriptor: &str,
        max_stack: u16,
        max_locals: u16,
        code: &[u8],
    ) {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        let attr_name = self.utf8("Code");

        push_u16(&mut self.methods, 0x0001);
        push_u16(&mut self.methods, name);
        push_u16(&mut self.methods, descriptor);
        push_u16(&mut self.methods, 1); // attributes_count

        push_u16(&mut self.methods, attr_name);
        push_u32(&mut self.methods, 12 + code.len() as u32);
        push_u16(&mut self.methods, max_stack);
        push_u16(&mut self.methods, max_locals);
        push_u32(&mut self.methods, code.len() as u32);
        self.methods.extend_from_slice(code);
        push_u16(&mut self.methods, 0); // exception_table_length
        push_u16(&mut self.methods, 0); // attributes_count
        self.methods_count += 1;
    }

    /// A method with no attributes at all, i.e. no `Code` to execute.
    pub(crate) fn add_method_without_code(&mut self, name: &str, descriptor: &str) {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        push_u16(&mut self.methods, 0x0401); // ACC_PUBLIC | ACC_ABSTRACT
        push_u16(&mut self.methods, name);
        push_u16(&mut self.methods, descriptor);
        push_u16(&mut self.methods, 0); // attributes_count
        self.methods_count += 1;
    }

    pub(crate) fn class_attribute(&mut self, name: &str, data: &[u8]) {
        let name = self.utf8(name);
        push_u16(&mut self.attributes, name);
        push_u32(&mut self.attributes, data.len() as u32);
        self.attributes.extend_from_slice(data);
        self.attributes_count += 1;
    }

    pub(crate) fn source_file(&mut self, file: &str) {
        let file = self.utf8(file);
        self.class_attribute("SourceFile", &file.to_be_bytes());
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        push_u32(&mut out, 0xCAFE_BABE);
        push_u16(&mut out, 0); // minor_version
        push_u16(&mut out, 52); // major_version
        push_u16(&mut out, self.next_index); // constant_count
        out.extend_from_slice(&self.constants);
        push_u16(&mut out, self.access_flags);
        push_u16(&mut out, self.this_class);
        push_u16(&mut out, self.super_class);
        push_u16(&mut out, self.interfaces_count);
        push_u16(&mut out, self.fields_count);
        out.extend_from_slice(&self.fields);
        push_u16(&mut out, self.methods_count);
        out.extend_from_slice(&self.methods);
        push_u16(&mut out, self.attributes_count);
        out.extend_from_slice(&self.attributes);
        out
    }
}

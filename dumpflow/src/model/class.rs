use crate::types::Address;

/// Shape specific data of a class.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub enum ClassKind {
    Class,
    Array {
        leaf_class: Address,
        arity: u32,
        first_element_offset: u64,
        size_offset: u64,
        size_bytes: u64,
    },
}

#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct JavaField {
    pub name: String,
    pub signature: String,
    pub modifiers: u32,
    pub offset: u64,
}

#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct JavaStaticField {
    pub name: String,
    pub signature: String,
    pub modifiers: u32,
    /// Raw value of the slot, a reference for object typed fields.
    pub value: i64,
}

#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct JavaMethod {
    pub id: Address,
    pub name: String,
    pub signature: String,
    pub modifiers: u32,
}

/// A loaded class or array class.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct JavaClass {
    pub id: Address,
    pub kind: ClassKind,
    pub name: Option<String>,
    pub superclass: Address,
    pub loader: Address,
    /// Backing `java/lang/Class` instance.
    pub object: Address,
    pub instance_size: u64,
    pub modifiers: u32,
    pub source: Option<String>,
    /// Hashcode slot offset, 0 for runtimes built without the hashcode slot.
    pub hashcode_slot: u64,
    pub fields: Vec<JavaField>,
    pub statics: Vec<JavaStaticField>,
    pub methods: Vec<JavaMethod>,
    pub constant_pool: Vec<Address>,
}

impl JavaClass {
    pub fn new(id: Address, kind: ClassKind) -> Self {
        Self {
            id,
            kind,
            name: None,
            superclass: Address::NULL,
            loader: Address::NULL,
            object: Address::NULL,
            instance_size: 0,
            modifiers: 0,
            source: None,
            hashcode_slot: 0,
            fields: Vec::new(),
            statics: Vec::new(),
            methods: Vec::new(),
            constant_pool: Vec::new(),
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, ClassKind::Array { .. })
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

/// A class loader and the classes it knows about.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct JavaClassLoader {
    pub id: Address,
    /// Backing `java/lang/ClassLoader` instance.
    pub object: Address,
    /// Classes listed in the loader's class cache.
    pub cached_classes: Vec<Address>,
    /// Classes naming this loader as their defining loader.
    pub defined_classes: Vec<Address>,
}

impl JavaClassLoader {
    pub fn new(id: Address, object: Address) -> Self {
        Self {
            id,
            object,
            ..Default::default()
        }
    }
}

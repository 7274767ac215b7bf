//! Resolved class, field and method metadata referenced by a graph.
//!
//! The VM resolves metadata before compilation and hands it over in a
//! [`MetaTable`]. Nodes refer to entries through small copyable handles so
//! that node kinds stay hashable.

use rustc_hash::FxHashMap;
use strata_core::JavaKind;

use super::operators::Constant;

/// Handle to a [`ResolvedType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRef(pub u32);

/// Handle to a [`ResolvedField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldRef(pub u32);

/// Handle to a [`ResolvedMethod`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodRef(pub u32);

/// Opaque VM handle to a heap object known at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef(pub u64);

/// A resolved class or array type.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedType {
    /// Binary name.
    pub name: String,
    /// Array type.
    pub is_array: bool,
    /// Interface type.
    pub is_interface: bool,
    /// Component type of an array of references.
    pub component: Option<TypeRef>,
    /// `java.lang.Object`.
    pub is_java_lang_object: bool,
    /// A subclass of `java.lang.ref.Reference`.
    pub is_reference: bool,
    /// Static initializer has completed.
    pub is_initialized: bool,
    /// The `java.lang.Class` mirror holding static fields.
    pub mirror: Option<ObjectRef>,
    /// Instance fields in layout order.
    pub instance_fields: Vec<FieldRef>,
}

impl ResolvedType {
    /// A plain, initialized, non-array class.
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_array: false,
            is_interface: false,
            component: None,
            is_java_lang_object: false,
            is_reference: false,
            is_initialized: true,
            mirror: None,
            instance_fields: Vec::new(),
        }
    }

    /// An array type with the given reference component, if any.
    pub fn array(name: impl Into<String>, component: Option<TypeRef>) -> Self {
        Self {
            is_array: true,
            component,
            ..Self::class(name)
        }
    }
}

/// A resolved field.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    /// Simple name.
    pub name: String,
    /// Declaring class.
    pub holder: TypeRef,
    /// Declared kind.
    pub kind: JavaKind,
    /// Byte offset from the object (or mirror) start.
    pub offset: i32,
    /// `static` field.
    pub is_static: bool,
    /// `volatile` field.
    pub is_volatile: bool,
    /// `final` field.
    pub is_final: bool,
    /// Current value of a static final field, as seen by the VM.
    pub constant_value: Option<Constant>,
}

impl ResolvedField {
    /// A mutable instance field.
    pub fn instance(name: impl Into<String>, holder: TypeRef, kind: JavaKind, offset: i32) -> Self {
        Self {
            name: name.into(),
            holder,
            kind,
            offset,
            is_static: false,
            is_volatile: false,
            is_final: false,
            constant_value: None,
        }
    }
}

/// A resolved method.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMethod {
    /// Simple name.
    pub name: String,
    /// Declaring class.
    pub holder: TypeRef,
    /// `static` method.
    pub is_static: bool,
    /// Slot in the declaring class's virtual dispatch table.
    pub vtable_index: Option<u32>,
}

/// Metadata table owned by a graph.
#[derive(Debug, Clone, Default)]
pub struct MetaTable {
    types: Vec<ResolvedType>,
    fields: Vec<ResolvedField>,
    methods: Vec<ResolvedMethod>,
    array_lengths: FxHashMap<ObjectRef, i32>,
}

impl MetaTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type.
    pub fn add_type(&mut self, ty: ResolvedType) -> TypeRef {
        self.types.push(ty);
        TypeRef(self.types.len() as u32 - 1)
    }

    /// Register a field. Instance fields are appended to their holder's layout.
    pub fn add_field(&mut self, field: ResolvedField) -> FieldRef {
        let id = FieldRef(self.fields.len() as u32);
        if !field.is_static {
            if let Some(holder) = self.types.get_mut(field.holder.0 as usize) {
                holder.instance_fields.push(id);
            }
        }
        self.fields.push(field);
        id
    }

    /// Register a method.
    pub fn add_method(&mut self, method: ResolvedMethod) -> MethodRef {
        self.methods.push(method);
        MethodRef(self.methods.len() as u32 - 1)
    }

    /// Record the length of a constant array object.
    pub fn set_array_length(&mut self, object: ObjectRef, length: i32) {
        self.array_lengths.insert(object, length);
    }

    /// Look up a type.
    #[inline]
    pub fn ty(&self, id: TypeRef) -> &ResolvedType {
        &self.types[id.0 as usize]
    }

    /// Look up a field.
    #[inline]
    pub fn field(&self, id: FieldRef) -> &ResolvedField {
        &self.fields[id.0 as usize]
    }

    /// Look up a method.
    #[inline]
    pub fn method(&self, id: MethodRef) -> &ResolvedMethod {
        &self.methods[id.0 as usize]
    }

    /// Length of a constant array, if the VM reported one.
    pub fn array_length(&self, object: ObjectRef) -> Option<i32> {
        self.array_lengths.get(&object).copied()
    }

    /// Whether a field is `java.lang.ref.Reference.referent`.
    pub fn is_referent_field(&self, id: FieldRef) -> bool {
        let field = self.field(id);
        field.name == "referent" && self.ty(field.holder).is_reference
    }

    /// Whether any of the type's instance fields is `final`.
    pub fn has_final_fields(&self, id: TypeRef) -> bool {
        self.ty(id)
            .instance_fields
            .iter()
            .any(|f| self.field(*f).is_final)
    }
}

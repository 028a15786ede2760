//! Type descriptors and the type-information oracles.
//!
//! The assembler core does not own a type system. [`TypeDesc`] carries the
//! minimal facts the opcode selector and the coercion planner need (identity,
//! value/reference classification, by-ref qualification, primitive tag), and
//! everything else — assignability, well-known constructors — is asked of an
//! explicitly constructed [`TypeOracle`] rather than a process-wide cache.

use std::collections::{HashMap, HashSet};
use std::fmt;

/// Memory-model classification of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// The "no value" marker.
    Void,
    /// Instances are copied by value; boxing gives them a reference envelope.
    Value,
    /// Instances are accessed through a reference.
    Reference,
    /// Unmanaged pointer. Recognized so it can be refused explicitly.
    Pointer,
}

/// Primitive tag used to pick specialized element/indirect instruction forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// Pointer-sized integer.
    I,
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    U8,
    R4,
    R8,
}

/// The minimal type information the core needs; supplied by the external
/// type system. Identity and equality are structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeDesc {
    name: String,
    kind: TypeKind,
    by_ref: bool,
    primitive: Option<Primitive>,
}

impl TypeDesc {
    /// A named type of the given kind with no primitive tag.
    pub fn named(name: impl Into<String>, kind: TypeKind) -> Self {
        TypeDesc {
            name: name.into(),
            kind,
            by_ref: false,
            primitive: None,
        }
    }

    /// A named value type with a primitive tag.
    pub fn primitive(name: impl Into<String>, primitive: Primitive) -> Self {
        TypeDesc {
            name: name.into(),
            kind: TypeKind::Value,
            by_ref: false,
            primitive: Some(primitive),
        }
    }

    /// The "no value" marker.
    pub fn void() -> Self {
        TypeDesc::named("void", TypeKind::Void)
    }

    /// The universal reference envelope.
    pub fn object() -> Self {
        TypeDesc::named("object", TypeKind::Reference)
    }

    /// The immutable text reference type.
    pub fn string() -> Self {
        TypeDesc::named("string", TypeKind::Reference)
    }

    /// The base error type thrown values must derive from.
    pub fn exception() -> Self {
        TypeDesc::named("Exception", TypeKind::Reference)
    }

    pub fn boolean() -> Self {
        TypeDesc::primitive("bool", Primitive::U1)
    }

    pub fn int8() -> Self {
        TypeDesc::primitive("int8", Primitive::I1)
    }

    pub fn uint8() -> Self {
        TypeDesc::primitive("uint8", Primitive::U1)
    }

    pub fn int16() -> Self {
        TypeDesc::primitive("int16", Primitive::I2)
    }

    pub fn uint16() -> Self {
        TypeDesc::primitive("uint16", Primitive::U2)
    }

    pub fn int32() -> Self {
        TypeDesc::primitive("int32", Primitive::I4)
    }

    pub fn uint32() -> Self {
        TypeDesc::primitive("uint32", Primitive::U4)
    }

    pub fn int64() -> Self {
        TypeDesc::primitive("int64", Primitive::I8)
    }

    pub fn uint64() -> Self {
        TypeDesc::primitive("uint64", Primitive::U8)
    }

    pub fn native_int() -> Self {
        TypeDesc::primitive("native int", Primitive::I)
    }

    pub fn float32() -> Self {
        TypeDesc::primitive("float32", Primitive::R4)
    }

    pub fn float64() -> Self {
        TypeDesc::primitive("float64", Primitive::R8)
    }

    /// An unmanaged pointer to `self`. The coercion planner refuses these.
    pub fn unmanaged_pointer(pointee: &TypeDesc) -> Self {
        TypeDesc {
            name: format!("{}*", pointee.name),
            kind: TypeKind::Pointer,
            by_ref: false,
            primitive: None,
        }
    }

    /// The by-reference qualification of this type.
    pub fn by_ref(&self) -> Self {
        TypeDesc {
            name: self.name.clone(),
            kind: self.kind,
            by_ref: true,
            primitive: self.primitive,
        }
    }

    /// This type with any by-reference qualification removed.
    pub fn strip_by_ref(&self) -> Self {
        TypeDesc {
            name: self.name.clone(),
            kind: self.kind,
            by_ref: false,
            primitive: self.primitive,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_by_ref(&self) -> bool {
        self.by_ref
    }

    pub fn is_void(&self) -> bool {
        self.kind == TypeKind::Void
    }

    pub fn is_value_type(&self) -> bool {
        self.kind == TypeKind::Value
    }

    pub fn is_reference_type(&self) -> bool {
        self.kind == TypeKind::Reference
    }

    pub fn is_unmanaged_pointer(&self) -> bool {
        self.kind == TypeKind::Pointer
    }

    /// The primitive tag, if this is a tagged primitive value type.
    pub fn primitive_tag(&self) -> Option<Primitive> {
        self.primitive
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.by_ref {
            write!(f, "{}&", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// A field descriptor as resolved by the external metadata system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    /// Declaring type name.
    pub declaring: String,
    /// Field name.
    pub name: String,
    /// Field type.
    pub ty: TypeDesc,
    /// True for static fields; drives static/instance opcode dispatch.
    pub is_static: bool,
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.declaring, self.name)
    }
}

/// A method or constructor descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRef {
    /// Declaring type name.
    pub declaring: String,
    /// Method name; constructors use `.ctor`.
    pub name: String,
    /// Declared parameter types.
    pub params: Vec<TypeDesc>,
    /// Optional trailing variadic-call parameter types.
    pub varargs: Vec<TypeDesc>,
    /// Return type.
    pub return_ty: TypeDesc,
    pub is_static: bool,
}

impl MethodRef {
    /// A parameterless constructor for `declaring`.
    pub fn parameterless_ctor(declaring: impl Into<String>) -> Self {
        MethodRef {
            declaring: declaring.into(),
            name: ".ctor".to_string(),
            params: Vec::new(),
            varargs: Vec::new(),
            return_ty: TypeDesc::void(),
            is_static: false,
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.declaring, self.name)
    }
}

/// An argument-index operand. The assembling side knows only the index;
/// the disassembler fills in the parameter descriptor (including the
/// synthesized `this` at index 0 for instance routines).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgRef {
    pub index: u16,
    pub ty: Option<TypeDesc>,
}

impl ArgRef {
    /// An argument reference by index alone.
    pub fn index(index: u16) -> Self {
        ArgRef { index, ty: None }
    }

    /// An argument reference with its resolved parameter type.
    pub fn typed(index: u16, ty: TypeDesc) -> Self {
        ArgRef {
            index,
            ty: Some(ty),
        }
    }
}

/// One expected parameter for the params-array loading helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub ty: TypeDesc,
    /// Pass-by-reference parameters get their element address loaded.
    pub by_ref: bool,
}

/// Type-relation queries answered by the external type system.
pub trait TypeOracle {
    /// Whether a value of `from` is assignable to a location of `to`.
    fn is_assignable(&self, from: &TypeDesc, to: &TypeDesc) -> bool;

    /// The parameterless constructor of `ty`, if it has one.
    fn parameterless_ctor(&self, ty: &TypeDesc) -> Option<MethodRef>;
}

/// The well-known descriptors the emission helpers special-case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WellKnown {
    pub object: TypeDesc,
    pub void: TypeDesc,
    pub exception: TypeDesc,
}

impl Default for WellKnown {
    fn default() -> Self {
        WellKnown {
            object: TypeDesc::object(),
            void: TypeDesc::void(),
            exception: TypeDesc::exception(),
        }
    }
}

/// Constructed-once context passed into the emission surface and the
/// coercion planner. Owns the type oracle; no global lookup caches.
pub struct EmitContext {
    well_known: WellKnown,
    oracle: Box<dyn TypeOracle>,
}

impl EmitContext {
    pub fn new(oracle: Box<dyn TypeOracle>) -> Self {
        EmitContext {
            well_known: WellKnown::default(),
            oracle,
        }
    }

    pub fn with_well_known(oracle: Box<dyn TypeOracle>, well_known: WellKnown) -> Self {
        EmitContext { well_known, oracle }
    }

    pub fn object(&self) -> &TypeDesc {
        &self.well_known.object
    }

    pub fn void(&self) -> &TypeDesc {
        &self.well_known.void
    }

    pub fn exception(&self) -> &TypeDesc {
        &self.well_known.exception
    }

    /// Assignability, with identity always granted.
    pub fn is_assignable(&self, from: &TypeDesc, to: &TypeDesc) -> bool {
        from == to || self.oracle.is_assignable(from, to)
    }

    pub fn parameterless_ctor(&self, ty: &TypeDesc) -> Option<MethodRef> {
        self.oracle.parameterless_ctor(ty)
    }
}

impl fmt::Debug for EmitContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmitContext")
            .field("well_known", &self.well_known)
            .finish_non_exhaustive()
    }
}

/// An in-memory [`TypeOracle`] over explicit assignability edges.
///
/// Reflexive; everything is assignable to `object`; otherwise only the
/// registered direct edges hold. Suited to tests and self-contained type
/// universes.
#[derive(Debug, Default)]
pub struct TableOracle {
    edges: HashSet<(String, String)>,
    default_ctors: HashMap<String, MethodRef>,
}

impl TableOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `from` as assignable to `to`.
    pub fn add_assignable(&mut self, from: &TypeDesc, to: &TypeDesc) -> &mut Self {
        self.edges
            .insert((from.name().to_string(), to.name().to_string()));
        self
    }

    /// Register a parameterless constructor for `ty`.
    pub fn add_parameterless_ctor(&mut self, ty: &TypeDesc) -> &mut Self {
        self.default_ctors.insert(
            ty.name().to_string(),
            MethodRef::parameterless_ctor(ty.name()),
        );
        self
    }
}

impl TypeOracle for TableOracle {
    fn is_assignable(&self, from: &TypeDesc, to: &TypeDesc) -> bool {
        if from.strip_by_ref() == to.strip_by_ref() {
            return true;
        }
        if to.strip_by_ref() == TypeDesc::object() {
            return true;
        }
        self.edges
            .contains(&(from.name().to_string(), to.name().to_string()))
    }

    fn parameterless_ctor(&self, ty: &TypeDesc) -> Option<MethodRef> {
        self.default_ctors.get(ty.name()).cloned()
    }
}

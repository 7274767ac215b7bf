//! Node kinds for the lowering IR.
//!
//! The IR mixes two levels. *High-level* kinds express Java semantics
//! (field loads, indexed stores, virtual invokes, deferred allocations)
//! and are rewritten by the lowering engine. *Low-level* kinds are its
//! output: reads and writes through explicit addresses, guards, fences and
//! runtime calls. [`NodeKind::is_lowerable`] draws the line.
//!
//! Every payload is `Copy + Eq + Hash` so that pure nodes can be value
//! numbered by `(kind, stamp, inputs)`.

use bitflags::bitflags;
use strata_core::{DeoptAction, DeoptReason, JavaKind};
use strata_gc::{BarrierOp, BarrierType};

use super::meta::{FieldRef, MethodRef, ObjectRef, TypeRef};

// =============================================================================
// Memory Fences
// =============================================================================

bitflags! {
    /// Ordering constraints of a memory fence.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryBarriers: u8 {
        /// Loads before may not pass loads after.
        const LOAD_LOAD = 0x0001;
        /// Loads before may not pass stores after.
        const LOAD_STORE = 0x0002;
        /// Stores before may not pass loads after.
        const STORE_LOAD = 0x0004;
        /// Stores before may not pass stores after.
        const STORE_STORE = 0x0008;
    }
}

impl MemoryBarriers {
    /// Fence before a volatile read.
    pub const JMM_PRE_VOLATILE_READ: MemoryBarriers = MemoryBarriers::empty();
    /// Fence after a volatile read.
    pub const JMM_POST_VOLATILE_READ: MemoryBarriers =
        MemoryBarriers::LOAD_LOAD.union(MemoryBarriers::LOAD_STORE);
    /// Fence before a volatile write.
    pub const JMM_PRE_VOLATILE_WRITE: MemoryBarriers =
        MemoryBarriers::LOAD_STORE.union(MemoryBarriers::STORE_STORE);
    /// Fence after a volatile write.
    pub const JMM_POST_VOLATILE_WRITE: MemoryBarriers =
        MemoryBarriers::STORE_LOAD.union(MemoryBarriers::STORE_STORE);
}

// =============================================================================
// Location Identity
// =============================================================================

/// Aliasing class of a memory access.
///
/// Accesses with different identities never alias, except that `Any`
/// aliases everything. Lowering forwards identities; it does not invent
/// new classes beyond these predefined labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationIdentity {
    /// May alias any memory.
    Any,
    /// Initializing stores into fresh objects.
    Init,
    /// Memory that never changes once published.
    Final,
    /// The length word of an array.
    ArrayLength,
    /// The class-metadata word of an object header.
    Hub,
    /// One specific field.
    Field(FieldRef),
    /// Elements of arrays with this element kind.
    ArrayElement(JavaKind),
}

impl LocationIdentity {
    /// Whether the location is guaranteed not to change after initialization.
    pub const fn is_immutable(self) -> bool {
        matches!(self, LocationIdentity::Final | LocationIdentity::ArrayLength)
    }
}

// =============================================================================
// Payloads
// =============================================================================

/// A compile-time constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constant {
    /// `int` (and narrower) value.
    Int(i32),
    /// `long` value.
    Long(i64),
    /// `float` value, as raw bits.
    Float(u32),
    /// `double` value, as raw bits.
    Double(u64),
    /// The null reference.
    Null,
    /// A non-null heap object known to the VM.
    Object(ObjectRef),
    /// A raw machine word.
    Word(i64),
}

impl Constant {
    /// The kind of this constant.
    pub const fn kind(self) -> JavaKind {
        match self {
            Constant::Int(_) => JavaKind::Int,
            Constant::Long(_) => JavaKind::Long,
            Constant::Float(_) => JavaKind::Float,
            Constant::Double(_) => JavaKind::Double,
            Constant::Null | Constant::Object(_) => JavaKind::Object,
            Constant::Word(_) => JavaKind::Word,
        }
    }

    /// Whether this is the zero value of its kind.
    ///
    /// Negative zero is not a default value.
    pub const fn is_default_for_kind(self) -> bool {
        match self {
            Constant::Int(v) => v == 0,
            Constant::Long(v) | Constant::Word(v) => v == 0,
            Constant::Float(bits) => bits == 0,
            Constant::Double(bits) => bits == 0,
            Constant::Null => true,
            Constant::Object(_) => false,
        }
    }

    /// The integral value, if this is an integral constant.
    pub const fn as_i64(self) -> Option<i64> {
        match self {
            Constant::Int(v) => Some(v as i64),
            Constant::Long(v) | Constant::Word(v) => Some(v),
            _ => None,
        }
    }
}

/// Which compressed pointer family an encode/decode applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressTarget {
    /// Ordinary object pointers.
    Oop,
    /// Class-metadata pointers.
    Klass,
}

/// Parameters of a compressed pointer encoding: `full = base + (narrow << shift)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CompressEncoding {
    /// Heap base added after shifting.
    pub base: u64,
    /// Left shift applied to the narrow value.
    pub shift: u8,
}

/// How a call site dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    /// `invokestatic`.
    Static,
    /// `invokespecial` (constructors, private, super).
    Special,
    /// `invokevirtual`.
    Virtual,
    /// `invokeinterface`.
    Interface,
}

impl InvokeKind {
    /// Whether the call has a receiver argument.
    pub const fn has_receiver(self) -> bool {
        !matches!(self, InvokeKind::Static)
    }

    /// Whether the target depends on the receiver's dynamic type.
    pub const fn is_indirect(self) -> bool {
        matches!(self, InvokeKind::Virtual | InvokeKind::Interface)
    }
}

/// Implicit exceptions raised by bytecodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BytecodeExceptionKind {
    /// `NullPointerException`.
    NullPointer,
    /// `ArrayIndexOutOfBoundsException`.
    OutOfBounds,
}

/// Runtime entry points called from compiled code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForeignCallDescriptor {
    /// Free the OSR buffer once the frame has migrated.
    OsrMigrationEnd,
    /// Allocate a `NullPointerException` with a stack trace.
    CreateNullPointerException,
    /// Allocate an `ArrayIndexOutOfBoundsException` with a stack trace.
    CreateOutOfBoundsException,
    /// A named runtime stub, used for template slow paths.
    Stub(&'static str),
}

impl ForeignCallDescriptor {
    /// Get the stub's symbol name.
    pub const fn name(self) -> &'static str {
        match self {
            ForeignCallDescriptor::OsrMigrationEnd => "OSR_migration_end",
            ForeignCallDescriptor::CreateNullPointerException => "createNullPointerException",
            ForeignCallDescriptor::CreateOutOfBoundsException => "createOutOfBoundsException",
            ForeignCallDescriptor::Stub(name) => name,
        }
    }
}

/// Identity of a monitor (lock) slot in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonitorId(pub u32);

/// Handle to the side data of an allocation commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommitRef(pub u32);

/// Template families that materialize node kinds as pre-built subgraphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateFamily {
    /// `instanceof` and checked casts.
    TypeCheck,
    /// Allocation fast paths.
    NewObject,
    /// Monitor enter/exit fast paths.
    Monitor,
    /// Collector barrier code.
    WriteBarrier,
    /// Boxing and unboxing caches.
    Boxing,
    /// Loading the pending exception.
    ExceptionObject,
    /// Unsafe loads that may need a referent barrier.
    UnsafeLoad,
    /// `System.arraycopy`.
    ArrayCopy,
}

impl TemplateFamily {
    /// Get a human-readable name.
    pub const fn as_str(self) -> &'static str {
        match self {
            TemplateFamily::TypeCheck => "TypeCheck",
            TemplateFamily::NewObject => "NewObject",
            TemplateFamily::Monitor => "Monitor",
            TemplateFamily::WriteBarrier => "WriteBarrier",
            TemplateFamily::Boxing => "Boxing",
            TemplateFamily::ExceptionObject => "ExceptionObject",
            TemplateFamily::UnsafeLoad => "UnsafeLoad",
            TemplateFamily::ArrayCopy => "ArrayCopy",
        }
    }
}

// =============================================================================
// Node Kind
// =============================================================================

/// The operation a node performs.
///
/// Input layouts are documented per variant as `[a, b, ...]`; `?` marks
/// an optional trailing input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    // -------------------------------------------------------------------------
    // Control
    // -------------------------------------------------------------------------
    /// Graph entry.
    Start,
    /// Entry of an on-stack-replacement graph, replaced during lowering.
    OsrStart,
    /// Anchor point that floating nodes may be pinned to.
    Begin,
    /// `[value?]`
    Return,
    /// Unconditional deoptimization.
    Deoptimize {
        /// Deopt reason.
        reason: DeoptReason,
        /// Deopt action.
        action: DeoptAction,
    },
    /// `[exception]` rethrow to the caller.
    Unwind,

    // -------------------------------------------------------------------------
    // Floating values
    // -------------------------------------------------------------------------
    /// A compile-time constant.
    Constant(Constant),
    /// Incoming argument.
    Parameter(u32),
    /// `[locals...]` interpreter state at a bytecode index.
    FrameState {
        /// Bytecode index.
        bci: i32,
    },
    /// `[x, y]` integer addition.
    IntegerAdd,
    /// `[x, shift]` integer left shift.
    LeftShift,
    /// `[x, y]` unsigned `x < y`.
    IntegerBelow,
    /// `[object]` null test.
    IsNull,
    /// `[value]` sign extension.
    SignExtend {
        /// Input width.
        from: u8,
        /// Result width.
        to: u8,
    },
    /// `[value]` zero extension.
    ZeroExtend {
        /// Input width.
        from: u8,
        /// Result width.
        to: u8,
    },
    /// `[value]` truncation.
    Narrow {
        /// Result width.
        to: u8,
    },
    /// `[pointer]` encode to a narrow pointer.
    Compress {
        /// Pointer family.
        target: CompressTarget,
        /// Encoding parameters.
        encoding: CompressEncoding,
    },
    /// `[narrow]` decode to a full pointer.
    Uncompress {
        /// Pointer family.
        target: CompressTarget,
        /// Encoding parameters.
        encoding: CompressEncoding,
    },
    /// `[base, index?]` resolved address `base + displacement + index * scale`.
    Address {
        /// Constant byte displacement.
        displacement: i64,
        /// Index scale, one of 1, 2, 4, 8.
        scale: u8,
    },
    /// `[condition, anchor]` floating deoptimizing guard.
    Guard {
        /// Deopt reason.
        reason: DeoptReason,
        /// Deopt action.
        action: DeoptAction,
        /// Deoptimize when the condition is true instead of false.
        negated: bool,
    },
    /// `[address, anchor?]` read that may float within its guard's scope.
    FloatingRead {
        /// Accessed kind.
        kind: JavaKind,
        /// Aliasing class.
        identity: LocationIdentity,
    },
    /// Deferred allocation of an instance.
    VirtualInstance {
        /// Instance type.
        ty: TypeRef,
    },
    /// Deferred allocation of an array.
    VirtualArray {
        /// Array type.
        ty: TypeRef,
        /// Element kind.
        element: JavaKind,
        /// Element count.
        length: u32,
    },
    /// `[virtual, commit]` the object produced by an allocation commit.
    AllocatedObject,
    /// Interpreter local passed into an OSR entry.
    OsrLocal {
        /// Local slot index.
        index: u32,
        /// Value kind.
        kind: JavaKind,
    },
    /// `[object]` class-metadata pointer of an object (high level).
    LoadHub,
    /// `[args...]` unresolved call target.
    MethodCallTarget {
        /// Target method.
        method: MethodRef,
        /// Dispatch kind.
        invoke: InvokeKind,
    },
    /// `[args...]` call to a statically bound or runtime-resolved entry.
    DirectCallTarget {
        /// Target method.
        method: MethodRef,
        /// Dispatch kind.
        invoke: InvokeKind,
    },
    /// `[method, entry, args...]` call through a loaded entry address.
    IndirectCallTarget {
        /// Target method.
        method: MethodRef,
    },

    // -------------------------------------------------------------------------
    // Fixed, high level
    // -------------------------------------------------------------------------
    /// `[object?]` field load; static fields have no object input.
    LoadField {
        /// Field.
        field: FieldRef,
    },
    /// `[object?, value]` field store; static fields have no object input.
    StoreField {
        /// Field.
        field: FieldRef,
    },
    /// `[array, index]`
    LoadIndexed {
        /// Element kind.
        element: JavaKind,
    },
    /// `[array, index, value]`
    StoreIndexed {
        /// Element kind.
        element: JavaKind,
    },
    /// `[array]`
    ArrayLength,
    /// `[object, offset, expected, new]`
    CompareAndSwap {
        /// Value kind.
        kind: JavaKind,
        /// Aliasing class.
        identity: LocationIdentity,
        /// Constant added to the offset.
        displacement: i64,
    },
    /// `[object, offset, new]`
    AtomicReadAndWrite {
        /// Value kind.
        kind: JavaKind,
        /// Aliasing class.
        identity: LocationIdentity,
    },
    /// `[object, offset, condition?]`
    UnsafeLoad {
        /// Accessed kind.
        kind: JavaKind,
        /// Aliasing class.
        identity: LocationIdentity,
    },
    /// `[object, offset, value]`
    UnsafeStore {
        /// Accessed kind.
        kind: JavaKind,
        /// Aliasing class.
        identity: LocationIdentity,
    },
    /// `[object]` read with a precomputed location and barrier.
    JavaRead {
        /// Accessed kind.
        kind: JavaKind,
        /// Aliasing class.
        identity: LocationIdentity,
        /// Byte displacement.
        displacement: i64,
        /// Barrier descriptor.
        barrier: BarrierType,
        /// Object values are stored compressed.
        compressible: bool,
    },
    /// `[object, value]` write with a precomputed location and barrier.
    JavaWrite {
        /// Accessed kind.
        kind: JavaKind,
        /// Aliasing class.
        identity: LocationIdentity,
        /// Byte displacement.
        displacement: i64,
        /// Barrier descriptor.
        barrier: BarrierType,
        /// Object values are stored compressed.
        compressible: bool,
        /// Initializing store.
        init: bool,
    },
    /// `[hub]` load a method pointer from the hub's dispatch table.
    LoadMethod {
        /// Method whose slot is loaded.
        method: MethodRef,
    },
    /// `[object, hub]` write an object's class-metadata pointer.
    StoreHub,
    /// `[virtuals..., values...]` materialize a set of deferred allocations.
    CommitAllocation {
        /// Side data (object count, locks).
        commit: CommitRef,
    },
    /// `[args...]` construct an implicit exception.
    BytecodeException {
        /// Exception class.
        exception: BytecodeExceptionKind,
    },
    /// `[call_target]` call site.
    Invoke {
        /// Bytecode index.
        bci: i32,
        /// Profiling saw more than one receiver type.
        polymorphic: bool,
    },
    /// Allocate an instance.
    NewInstance {
        /// Instance type.
        ty: TypeRef,
        /// Zero the fields.
        fill_contents: bool,
    },
    /// `[length]` allocate an array.
    NewArray {
        /// Array type.
        ty: TypeRef,
        /// Element kind.
        element: JavaKind,
        /// Zero the elements.
        fill_contents: bool,
    },
    /// `[class]` allocate an instance of a dynamic class.
    DynamicNewInstance,
    /// `[element_class, length]` allocate an array of a dynamic element class.
    DynamicNewArray,
    /// `[dimensions...]`
    NewMultiArray {
        /// Array type.
        ty: TypeRef,
    },
    /// `[object]`
    MonitorEnter {
        /// Lock slot.
        lock: MonitorId,
    },
    /// `[object]`
    MonitorExit {
        /// Lock slot.
        lock: MonitorId,
    },
    /// Fetch and clear the pending exception at a handler entry.
    LoadExceptionObject,
    /// `[object]` type test producing a boolean.
    InstanceOf {
        /// Tested type.
        ty: TypeRef,
    },
    /// `[hub, object]` type test against a runtime class.
    InstanceOfDynamic,
    /// `[object]` checked cast.
    CheckCast {
        /// Target type.
        ty: TypeRef,
        /// Part of an array store check (throws `ArrayStoreException`).
        for_store_check: bool,
    },
    /// `[hub, object]` checked cast against a runtime class.
    CheckCastDynamic {
        /// Part of an array store check.
        for_store_check: bool,
    },
    /// `[value]`
    Box {
        /// Primitive kind.
        kind: JavaKind,
    },
    /// `[object]`
    Unbox {
        /// Primitive kind.
        kind: JavaKind,
    },
    /// `[src, src_pos, dest, dest_pos, length]`
    ArrayCopy {
        /// Element kind.
        element: JavaKind,
    },
    /// `[x, y]` signed division; traps are handled by the signal handler.
    IntegerDiv,
    /// `[x, y]` signed remainder.
    IntegerRem,
    /// `[address, value?]` collector barrier, expanded by templates.
    WriteBarrier(BarrierOp),

    // -------------------------------------------------------------------------
    // Fixed, low level
    // -------------------------------------------------------------------------
    /// `[address]` memory read.
    Read {
        /// Accessed kind.
        kind: JavaKind,
        /// Aliasing class.
        identity: LocationIdentity,
        /// Barrier descriptor.
        barrier: BarrierType,
    },
    /// `[address, value]` memory write.
    Write {
        /// Accessed kind.
        kind: JavaKind,
        /// Aliasing class.
        identity: LocationIdentity,
        /// Barrier descriptor.
        barrier: BarrierType,
        /// Initializing store into a fresh object.
        init: bool,
    },
    /// `[address, expected, new]`
    LoweredCompareAndSwap {
        /// Value kind.
        kind: JavaKind,
        /// Aliasing class.
        identity: LocationIdentity,
        /// Barrier descriptor.
        barrier: BarrierType,
    },
    /// `[address, new]`
    LoweredAtomicReadAndWrite {
        /// Value kind.
        kind: JavaKind,
        /// Aliasing class.
        identity: LocationIdentity,
        /// Barrier descriptor.
        barrier: BarrierType,
    },
    /// Memory fence.
    Membar(MemoryBarriers),
    /// `[condition]` guard pinned in the control flow.
    FixedGuard {
        /// Deopt reason.
        reason: DeoptReason,
        /// Deopt action.
        action: DeoptAction,
        /// Deoptimize when the condition is true instead of false.
        negated: bool,
    },
    /// `[condition]` pins reads that depend on a condition.
    ConditionAnchor,
    /// `[value]` pins a value at this control point.
    FixedValueAnchor,
    /// `[args...]` call into the runtime.
    ForeignCall(ForeignCallDescriptor),
}

impl NodeKind {
    /// Whether the node takes part in the control chain.
    pub const fn is_fixed(&self) -> bool {
        !matches!(
            self,
            NodeKind::Constant(_)
                | NodeKind::Parameter(_)
                | NodeKind::FrameState { .. }
                | NodeKind::IntegerAdd
                | NodeKind::LeftShift
                | NodeKind::IntegerBelow
                | NodeKind::IsNull
                | NodeKind::SignExtend { .. }
                | NodeKind::ZeroExtend { .. }
                | NodeKind::Narrow { .. }
                | NodeKind::Compress { .. }
                | NodeKind::Uncompress { .. }
                | NodeKind::Address { .. }
                | NodeKind::Guard { .. }
                | NodeKind::FloatingRead { .. }
                | NodeKind::VirtualInstance { .. }
                | NodeKind::VirtualArray { .. }
                | NodeKind::AllocatedObject
                | NodeKind::OsrLocal { .. }
                | NodeKind::LoadHub
                | NodeKind::MethodCallTarget { .. }
                | NodeKind::DirectCallTarget { .. }
                | NodeKind::IndirectCallTarget { .. }
        )
    }

    /// Whether control may not continue past this node.
    pub const fn is_control_sink(&self) -> bool {
        matches!(
            self,
            NodeKind::Return | NodeKind::Deoptimize { .. } | NodeKind::Unwind
        )
    }

    /// Whether the node is a valid anchor for floating nodes.
    pub const fn is_begin(&self) -> bool {
        matches!(self, NodeKind::Start | NodeKind::OsrStart | NodeKind::Begin)
    }

    /// Whether two nodes with this kind, equal stamps and equal inputs are
    /// interchangeable.
    pub const fn is_value_numberable(&self) -> bool {
        matches!(
            self,
            NodeKind::Constant(_)
                | NodeKind::Parameter(_)
                | NodeKind::IntegerAdd
                | NodeKind::LeftShift
                | NodeKind::IntegerBelow
                | NodeKind::IsNull
                | NodeKind::SignExtend { .. }
                | NodeKind::ZeroExtend { .. }
                | NodeKind::Narrow { .. }
                | NodeKind::Compress { .. }
                | NodeKind::Uncompress { .. }
                | NodeKind::Guard { .. }
        )
    }

    /// Whether the lowering dispatcher has a handler for this kind.
    ///
    /// Everything else is already low level; handing it to the dispatcher
    /// is an internal error.
    pub const fn is_lowerable(&self) -> bool {
        matches!(
            self,
            NodeKind::OsrStart
                | NodeKind::Deoptimize { .. }
                | NodeKind::Unwind
                | NodeKind::LoadHub
                | NodeKind::LoadField { .. }
                | NodeKind::StoreField { .. }
                | NodeKind::LoadIndexed { .. }
                | NodeKind::StoreIndexed { .. }
                | NodeKind::ArrayLength
                | NodeKind::CompareAndSwap { .. }
                | NodeKind::AtomicReadAndWrite { .. }
                | NodeKind::UnsafeLoad { .. }
                | NodeKind::UnsafeStore { .. }
                | NodeKind::JavaRead { .. }
                | NodeKind::JavaWrite { .. }
                | NodeKind::LoadMethod { .. }
                | NodeKind::StoreHub
                | NodeKind::CommitAllocation { .. }
                | NodeKind::BytecodeException { .. }
                | NodeKind::Invoke { .. }
                | NodeKind::NewInstance { .. }
                | NodeKind::NewArray { .. }
                | NodeKind::DynamicNewInstance
                | NodeKind::DynamicNewArray
                | NodeKind::NewMultiArray { .. }
                | NodeKind::MonitorEnter { .. }
                | NodeKind::MonitorExit { .. }
                | NodeKind::LoadExceptionObject
                | NodeKind::InstanceOf { .. }
                | NodeKind::InstanceOfDynamic
                | NodeKind::CheckCast { .. }
                | NodeKind::CheckCastDynamic { .. }
                | NodeKind::Box { .. }
                | NodeKind::Unbox { .. }
                | NodeKind::ArrayCopy { .. }
                | NodeKind::IntegerDiv
                | NodeKind::IntegerRem
                | NodeKind::WriteBarrier(_)
        )
    }

    /// The template family that materializes this kind, if any.
    pub const fn template_family(&self) -> Option<TemplateFamily> {
        match self {
            NodeKind::InstanceOf { .. }
            | NodeKind::InstanceOfDynamic
            | NodeKind::CheckCast { .. }
            | NodeKind::CheckCastDynamic { .. } => Some(TemplateFamily::TypeCheck),
            NodeKind::NewInstance { .. }
            | NodeKind::NewArray { .. }
            | NodeKind::DynamicNewInstance
            | NodeKind::DynamicNewArray
            | NodeKind::NewMultiArray { .. } => Some(TemplateFamily::NewObject),
            NodeKind::MonitorEnter { .. } | NodeKind::MonitorExit { .. } => {
                Some(TemplateFamily::Monitor)
            }
            NodeKind::WriteBarrier(_) => Some(TemplateFamily::WriteBarrier),
            NodeKind::Box { .. } | NodeKind::Unbox { .. } => Some(TemplateFamily::Boxing),
            NodeKind::LoadExceptionObject => Some(TemplateFamily::ExceptionObject),
            NodeKind::ArrayCopy { .. } => Some(TemplateFamily::ArrayCopy),
            _ => None,
        }
    }

    /// Whether this is a memory access produced by lowering.
    pub const fn is_lowered_access(&self) -> bool {
        matches!(
            self,
            NodeKind::Read { .. }
                | NodeKind::Write { .. }
                | NodeKind::FloatingRead { .. }
                | NodeKind::LoweredCompareAndSwap { .. }
                | NodeKind::LoweredAtomicReadAndWrite { .. }
        )
    }

    /// Short name of the variant, for diagnostics.
    pub fn name(&self) -> String {
        let debug = format!("{self:?}");
        match debug.find(|c: char| c == ' ' || c == '(' || c == '{') {
            Some(end) => debug[..end].to_string(),
            None => debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volatile_fence_sets() {
        assert!(MemoryBarriers::JMM_PRE_VOLATILE_READ.is_empty());
        assert!(MemoryBarriers::JMM_POST_VOLATILE_READ.contains(MemoryBarriers::LOAD_LOAD));
        assert!(MemoryBarriers::JMM_PRE_VOLATILE_WRITE.contains(MemoryBarriers::STORE_STORE));
        assert!(MemoryBarriers::JMM_POST_VOLATILE_WRITE.contains(MemoryBarriers::STORE_LOAD));
    }

    #[test]
    fn test_constant_defaults() {
        assert!(Constant::Int(0).is_default_for_kind());
        assert!(Constant::Null.is_default_for_kind());
        assert!(!Constant::Long(1).is_default_for_kind());
        assert!(!Constant::Double((-0.0f64).to_bits()).is_default_for_kind());
        assert!(!Constant::Object(ObjectRef(1)).is_default_for_kind());
    }

    #[test]
    fn test_low_level_kinds_are_not_lowerable() {
        let read = NodeKind::Read {
            kind: JavaKind::Int,
            identity: LocationIdentity::Any,
            barrier: BarrierType::None,
        };
        assert!(!read.is_lowerable());
        assert!(read.is_fixed());
        assert!(!NodeKind::Constant(Constant::Int(1)).is_lowerable());
        assert!(NodeKind::ArrayLength.is_lowerable());
    }

    #[test]
    fn test_floating_kinds() {
        assert!(!NodeKind::IsNull.is_fixed());
        assert!(!NodeKind::LoadHub.is_fixed());
        assert!(NodeKind::LoadHub.is_lowerable());
        assert!(NodeKind::Begin.is_begin());
    }

    #[test]
    fn test_template_family_routing() {
        assert_eq!(
            NodeKind::MonitorEnter { lock: MonitorId(0) }.template_family(),
            Some(TemplateFamily::Monitor)
        );
        assert_eq!(
            NodeKind::WriteBarrier(BarrierOp::G1Pre).template_family(),
            Some(TemplateFamily::WriteBarrier)
        );
        assert_eq!(NodeKind::ArrayLength.template_family(), None);
    }

    #[test]
    fn test_kind_name() {
        assert_eq!(NodeKind::ArrayLength.name(), "ArrayLength");
        assert_eq!(NodeKind::Parameter(3).name(), "Parameter");
        assert_eq!(NodeKind::Invoke { bci: 1, polymorphic: false }.name(), "Invoke");
    }
}

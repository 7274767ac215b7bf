//! VM layout constants and lowering options.
//!
//! [`VmConfig`] is a read-only snapshot of the running VM's object layout
//! and flags. It is built once and shared between concurrent compilations
//! behind an `Arc`; nothing in the lowering engine mutates it.

use strata_core::JavaKind;
use strata_gc::{BarrierSet, CollectorKind};

use crate::ir::{CompressEncoding, ObjectRef};

/// Object layout and VM flags relevant to lowering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    /// Machine word size in bytes.
    pub word_size: u32,
    /// Offset of the class-metadata pointer in an object header.
    pub hub_offset: i32,
    /// Offset of the length field in an array header.
    pub array_length_offset: i32,
    /// Offset of the element class pointer in an object-array class.
    pub array_class_element_offset: i32,
    /// Offset of the first dispatch-table entry in a class.
    pub vtable_start_offset: i32,
    /// Size of a dispatch-table entry.
    pub vtable_entry_size: i32,
    /// Offset of the method pointer inside a dispatch-table entry.
    pub vtable_entry_method_offset: i32,
    /// Offset of the compiled entry point in a method.
    pub method_compiled_entry_offset: i32,
    /// Object pointers in the heap are compressed.
    pub use_compressed_oops: bool,
    /// Encoding of compressed object pointers.
    pub oop_encoding: CompressEncoding,
    /// Class-metadata pointers in headers are compressed.
    pub use_compressed_class_pointers: bool,
    /// Encoding of compressed class pointers.
    pub klass_encoding: CompressEncoding,
    /// Active collector.
    pub collector: CollectorKind,
    /// Card marks for initializing stores are issued by the allocation path.
    pub use_deferred_init_barriers: bool,
    /// Monitors use the inline fast-locking protocol.
    pub use_fast_locking: bool,
    /// Preallocated `NullPointerException` without stack trace.
    pub cached_null_pointer_exception: ObjectRef,
    /// Preallocated `ArrayIndexOutOfBoundsException` without stack trace.
    pub cached_out_of_bounds_exception: ObjectRef,
}

impl Default for VmConfig {
    /// 64-bit layout with compressed oops and class pointers under G1.
    fn default() -> Self {
        Self {
            word_size: 8,
            hub_offset: 8,
            array_length_offset: 12,
            array_class_element_offset: 0xb8,
            vtable_start_offset: 0x1b8,
            vtable_entry_size: 8,
            vtable_entry_method_offset: 0,
            method_compiled_entry_offset: 0x38,
            use_compressed_oops: true,
            oop_encoding: CompressEncoding { base: 0, shift: 3 },
            use_compressed_class_pointers: true,
            klass_encoding: CompressEncoding {
                base: 0x8_0000_0000,
                shift: 0,
            },
            collector: CollectorKind::G1,
            use_deferred_init_barriers: false,
            use_fast_locking: true,
            cached_null_pointer_exception: ObjectRef(0x1000),
            cached_out_of_bounds_exception: ObjectRef(0x1008),
        }
    }
}

impl VmConfig {
    /// Set the collector.
    pub fn with_collector(mut self, collector: CollectorKind) -> Self {
        self.collector = collector;
        self
    }

    /// Enable or disable compressed object pointers.
    pub fn with_compressed_oops(mut self, enabled: bool) -> Self {
        self.use_compressed_oops = enabled;
        self
    }

    /// Enable or disable compressed class pointers.
    ///
    /// Moves the array length field to keep the header layout consistent.
    pub fn with_compressed_class_pointers(mut self, enabled: bool) -> Self {
        self.use_compressed_class_pointers = enabled;
        self.array_length_offset = if enabled { 12 } else { 16 };
        self
    }

    /// Enable or disable deferred initializing barriers.
    pub fn with_deferred_init_barriers(mut self, enabled: bool) -> Self {
        self.use_deferred_init_barriers = enabled;
        self
    }

    /// Enable or disable inline fast locking.
    pub fn with_fast_locking(mut self, enabled: bool) -> Self {
        self.use_fast_locking = enabled;
        self
    }

    /// Machine word width in bits.
    #[inline]
    pub fn word_bits(&self) -> u8 {
        (self.word_size * 8) as u8
    }

    /// Offset of element 0 in an array of `kind`.
    pub fn array_base_offset(&self, kind: JavaKind) -> i32 {
        let header = self.array_length_offset + 4;
        let align = self.array_index_scale(kind).max(4);
        (header + align - 1) / align * align
    }

    /// Distance between consecutive elements of an array of `kind`.
    pub fn array_index_scale(&self, kind: JavaKind) -> i32 {
        if kind.is_object() && self.use_compressed_oops {
            4
        } else {
            kind.byte_size(self.word_size) as i32
        }
    }

    /// Offset of the method pointer for dispatch-table slot `index`.
    pub fn vtable_entry_offset(&self, index: u32) -> i32 {
        self.vtable_start_offset + index as i32 * self.vtable_entry_size
            + self.vtable_entry_method_offset
    }

    /// Barrier requirements of the configured collector.
    pub fn barrier_set(&self) -> BarrierSet {
        BarrierSet::new(self.collector).with_deferred_init_barriers(self.use_deferred_init_barriers)
    }
}

/// Compiler options that steer lowering decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoweringOptions {
    /// Expand virtual calls into an inline dispatch-table lookup.
    pub inline_vtable_stubs: bool,
    /// Expand even when profiling saw a single receiver type.
    pub always_inline_vtable_stubs: bool,
    /// Throw preallocated exceptions without stack traces from hot paths.
    pub omit_hot_exception_stacktrace: bool,
    /// Fold static final fields that still hold their default value.
    pub trust_final_default_fields: bool,
}

impl Default for LoweringOptions {
    fn default() -> Self {
        Self {
            inline_vtable_stubs: true,
            always_inline_vtable_stubs: false,
            omit_hot_exception_stacktrace: false,
            trust_final_default_fields: false,
        }
    }
}

impl LoweringOptions {
    /// Enable or disable inline dispatch-table lookups.
    pub fn with_inline_vtable_stubs(mut self, enabled: bool) -> Self {
        self.inline_vtable_stubs = enabled;
        self
    }

    /// Expand monomorphic sites too.
    pub fn with_always_inline_vtable_stubs(mut self, enabled: bool) -> Self {
        self.always_inline_vtable_stubs = enabled;
        self
    }

    /// Use cached exceptions for implicit exceptions.
    pub fn with_omit_hot_exception_stacktrace(mut self, enabled: bool) -> Self {
        self.omit_hot_exception_stacktrace = enabled;
        self
    }

    /// Fold static finals holding default values.
    pub fn with_trust_final_default_fields(mut self, enabled: bool) -> Self {
        self.trust_final_default_fields = enabled;
        self
    }
}

//! Implicit conversions between memory and stack representations.
//!
//! Sub-word values are widened to 32 bits on load and truncated on store;
//! object references are decoded on load and encoded on store when the
//! heap uses compressed pointers. Class-metadata pointers follow the same
//! scheme with their own encoding.

use strata_core::JavaKind;

use crate::config::VmConfig;
use crate::ir::{CompressTarget, Graph, NodeId, NodeKind, ObjectStamp, Stamp};

/// Stamp of the raw value a read of `kind` produces.
///
/// Object facts of `declared` (the high-level node's stamp) are kept.
pub fn load_stamp(config: &VmConfig, kind: JavaKind, compressible: bool, declared: Stamp) -> Stamp {
    if !kind.is_object() {
        return Stamp::for_memory_kind(kind);
    }
    let facts = declared.object_stamp().unwrap_or_else(ObjectStamp::unknown);
    if compressible && config.use_compressed_oops {
        Stamp::NarrowOop(facts)
    } else {
        Stamp::Object(facts)
    }
}

/// Widen or decode a value just read from memory.
pub fn implicit_load_convert(
    graph: &mut Graph,
    config: &VmConfig,
    kind: JavaKind,
    value: NodeId,
    compressible: bool,
) -> NodeId {
    match kind {
        JavaKind::Byte | JavaKind::Short => {
            let from = kind.bits(config.word_bits());
            graph.unique(
                NodeKind::SignExtend { from, to: 32 },
                Stamp::int(32),
                &[value],
            )
        }
        JavaKind::Boolean | JavaKind::Char => {
            let from = kind.bits(config.word_bits());
            let stamp = Stamp::for_memory_kind(kind);
            let (lower, upper) = stamp.int_range().unwrap_or((0, 1));
            graph.unique(
                NodeKind::ZeroExtend { from, to: 32 },
                Stamp::Integer {
                    bits: 32,
                    lower,
                    upper,
                },
                &[value],
            )
        }
        JavaKind::Object if compressible && config.use_compressed_oops => {
            let facts = graph.stamp(value).object_stamp().unwrap_or_default();
            graph.unique(
                NodeKind::Uncompress {
                    target: CompressTarget::Oop,
                    encoding: config.oop_encoding,
                },
                Stamp::Object(facts),
                &[value],
            )
        }
        _ => value,
    }
}

/// Truncate or encode a value about to be written to memory.
pub fn implicit_store_convert(
    graph: &mut Graph,
    config: &VmConfig,
    kind: JavaKind,
    value: NodeId,
    compressible: bool,
) -> NodeId {
    match kind {
        JavaKind::Boolean | JavaKind::Byte | JavaKind::Short | JavaKind::Char => {
            let to = kind.bits(config.word_bits());
            graph.unique(
                NodeKind::Narrow { to },
                Stamp::for_memory_kind(kind),
                &[value],
            )
        }
        JavaKind::Object if compressible && config.use_compressed_oops => {
            let facts = graph.stamp(value).object_stamp().unwrap_or_default();
            graph.unique(
                NodeKind::Compress {
                    target: CompressTarget::Oop,
                    encoding: config.oop_encoding,
                },
                Stamp::NarrowOop(facts),
                &[value],
            )
        }
        _ => value,
    }
}

/// Decode a class-metadata pointer read from an object header.
pub fn uncompress_klass(graph: &mut Graph, config: &VmConfig, value: NodeId) -> NodeId {
    if !config.use_compressed_class_pointers {
        return value;
    }
    graph.unique(
        NodeKind::Uncompress {
            target: CompressTarget::Klass,
            encoding: config.klass_encoding,
        },
        Stamp::Word,
        &[value],
    )
}

/// Encode a class-metadata pointer before writing it into an object header.
pub fn compress_klass(graph: &mut Graph, config: &VmConfig, value: NodeId) -> NodeId {
    if !config.use_compressed_class_pointers {
        return value;
    }
    graph.unique(
        NodeKind::Compress {
            target: CompressTarget::Klass,
            encoding: config.klass_encoding,
        },
        Stamp::NarrowKlass,
        &[value],
    )
}

/// Stamp of a raw header read.
pub fn hub_stamp(config: &VmConfig) -> Stamp {
    if config.use_compressed_class_pointers {
        Stamp::NarrowKlass
    } else {
        Stamp::Word
    }
}

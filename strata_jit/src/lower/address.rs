//! Address formation.
//!
//! Every lowered memory access goes through a dedicated `Address` node of
//! the form `base + displacement + index * scale`. Raw offsets coming from
//! unsafe accesses are decomposed by a small peephole so the backend can
//! fold constant terms and shifts into the addressing mode:
//!
//! ```text
//! SignExtend32to64( IntegerAdd( LeftShift(x, k), c ) )
//!   => displacement = c, scale = 1 << k, index = SignExtend32to64(x)
//! ```
//!
//! Only this pattern set is recognized. Anything else becomes the index
//! with scale 1.

use strata_core::JavaKind;

use crate::config::VmConfig;
use crate::ir::{Graph, NodeId, NodeKind, Stamp};

/// The components of `displacement + index * scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressParts {
    /// Constant byte displacement.
    pub displacement: i64,
    /// Scaled index, if any.
    pub index: Option<NodeId>,
    /// Index scale: 1, 2, 4 or 8.
    pub scale: u8,
}

impl AddressParts {
    /// A pure constant displacement.
    pub const fn displacement(displacement: i64) -> Self {
        Self {
            displacement,
            index: None,
            scale: 1,
        }
    }
}

fn constant_value(graph: &Graph, id: NodeId) -> Option<i64> {
    graph.as_constant(id).and_then(|c| c.as_i64())
}

fn is_sign_extend_to_word(kind: NodeKind) -> bool {
    matches!(kind, NodeKind::SignExtend { from: 32, to: 64 })
}

/// Decompose a raw byte offset into address parts.
pub fn decompose_offset(graph: &mut Graph, offset: NodeId) -> AddressParts {
    if let Some(value) = constant_value(graph, offset) {
        return AddressParts::displacement(value);
    }

    let mut index = offset;
    let mut sign_extended = false;
    if is_sign_extend_to_word(graph.kind(index)) {
        if let Some(inner) = graph.input(index, 0) {
            index = inner;
            sign_extended = true;
        }
    }

    let mut displacement = 0;
    if graph.kind(index) == NodeKind::IntegerAdd {
        if let (Some(x), Some(y)) = (graph.input(index, 0), graph.input(index, 1)) {
            if let Some(c) = constant_value(graph, y) {
                displacement = c;
                index = x;
            }
        }
    }

    let mut scale = 1u8;
    if graph.kind(index) == NodeKind::LeftShift {
        if let (Some(x), Some(y)) = (graph.input(index, 0), graph.input(index, 1)) {
            if let Some(shift @ 1..=3) = constant_value(graph, y) {
                scale = 1 << shift;
                index = x;
            }
        }
    }

    if sign_extended {
        index = graph.unique(
            NodeKind::SignExtend { from: 32, to: 64 },
            Stamp::int(64),
            &[index],
        );
    }

    AddressParts {
        displacement,
        index: Some(index),
        scale,
    }
}

/// Rebuild the offset expression that [`decompose_offset`] would take apart.
///
/// Decomposing the result yields `parts` again.
pub fn materialize_offset(graph: &mut Graph, parts: AddressParts) -> NodeId {
    let Some(index) = parts.index else {
        return graph.const_long(parts.displacement);
    };
    let (mut expr, sign_extend) = match graph.kind(index) {
        kind if is_sign_extend_to_word(kind) => match graph.input(index, 0) {
            Some(inner) => (inner, true),
            None => (index, false),
        },
        _ => (index, false),
    };
    let bits = graph.stamp(expr).int_bits().unwrap_or(64);
    if parts.scale > 1 {
        let shift = graph.const_int(parts.scale.trailing_zeros() as i32);
        expr = graph.unique(NodeKind::LeftShift, Stamp::int(bits), &[expr, shift]);
    }
    if parts.displacement != 0 {
        let c = if bits == 64 {
            graph.const_long(parts.displacement)
        } else {
            graph.const_int(parts.displacement as i32)
        };
        expr = graph.unique(NodeKind::IntegerAdd, Stamp::int(bits), &[expr, c]);
    }
    if sign_extend {
        expr = graph.unique(
            NodeKind::SignExtend { from: 32, to: 64 },
            Stamp::int(64),
            &[expr],
        );
    }
    expr
}

/// Create a fresh address node over `base`.
pub fn create_address(graph: &mut Graph, base: NodeId, parts: AddressParts) -> NodeId {
    let kind = NodeKind::Address {
        displacement: parts.displacement,
        scale: parts.scale,
    };
    match parts.index {
        Some(index) => graph.add_node(kind, Stamp::Word, &[base, index]),
        None => graph.add_node(kind, Stamp::Word, &[base]),
    }
}

/// The parts of an existing address node.
pub fn address_parts(graph: &Graph, address: NodeId) -> Option<AddressParts> {
    match graph.kind(address) {
        NodeKind::Address {
            displacement,
            scale,
        } => Some(AddressParts {
            displacement,
            index: graph.input(address, 1),
            scale,
        }),
        _ => None,
    }
}

/// Duplicate an address node, for a second consumer of the same location.
pub fn clone_address(graph: &mut Graph, address: NodeId) -> Option<NodeId> {
    let parts = address_parts(graph, address)?;
    let base = graph.input(address, 0)?;
    Some(create_address(graph, base, parts))
}

/// Address of a field at `offset` in `object`.
pub fn field_address(graph: &mut Graph, object: NodeId, offset: i32) -> NodeId {
    create_address(graph, object, AddressParts::displacement(offset as i64))
}

/// Address of element `index` of an array of `kind`.
///
/// Constant indices fold into the displacement; other indices are widened
/// to the word size.
pub fn array_address(
    graph: &mut Graph,
    config: &VmConfig,
    array: NodeId,
    kind: JavaKind,
    index: NodeId,
) -> NodeId {
    let base = config.array_base_offset(kind) as i64;
    let scale = config.array_index_scale(kind);
    if let Some(i) = constant_value(graph, index) {
        let parts = AddressParts::displacement(base + i * scale as i64);
        return create_address(graph, array, parts);
    }
    let index = if config.word_size == 8 && graph.stamp(index).int_bits() != Some(64) {
        graph.unique(
            NodeKind::SignExtend { from: 32, to: 64 },
            Stamp::int(64),
            &[index],
        )
    } else {
        index
    };
    create_address(
        graph,
        array,
        AddressParts {
            displacement: base,
            index: Some(index),
            scale: scale as u8,
        },
    )
}

/// Recover the `int` element index addressed by an array element address.
pub fn reconstruct_array_index(
    graph: &mut Graph,
    config: &VmConfig,
    kind: JavaKind,
    address: NodeId,
) -> Option<NodeId> {
    let parts = address_parts(graph, address)?;
    let base = config.array_base_offset(kind) as i64;
    let scale = config.array_index_scale(kind) as i64;
    let delta = parts.displacement - base;
    if delta % scale != 0 {
        return None;
    }
    let element_delta = delta / scale;
    let Some(index) = parts.index else {
        return Some(graph.const_int(element_delta as i32));
    };
    if parts.scale as i64 != scale {
        return None;
    }
    let index = match graph.kind(index) {
        kind if is_sign_extend_to_word(kind) => graph.input(index, 0)?,
        _ => index,
    };
    if element_delta == 0 {
        return Some(index);
    }
    let c = graph.const_int(element_delta as i32);
    Some(graph.unique(NodeKind::IntegerAdd, Stamp::int(32), &[index, c]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{GraphBuilder, GraphMethod, MetaTable, ObjectStamp};
    use proptest::prelude::*;

    fn builder() -> GraphBuilder {
        GraphBuilder::new(GraphMethod::default(), MetaTable::new())
    }

    #[test]
    fn test_constant_offset_is_pure_displacement() {
        let mut b = builder();
        let graph = b.graph_mut();
        let off = graph.const_long(24);
        assert_eq!(decompose_offset(graph, off), AddressParts::displacement(24));
    }

    #[test]
    fn test_full_pattern() {
        let mut b = builder();
        let x = b.int_parameter();
        let graph = b.graph_mut();
        let two = graph.const_int(2);
        let shl = graph.unique(NodeKind::LeftShift, Stamp::int(32), &[x, two]);
        let c = graph.const_int(16);
        let add = graph.unique(NodeKind::IntegerAdd, Stamp::int(32), &[shl, c]);
        let ext = graph.unique(NodeKind::SignExtend { from: 32, to: 64 }, Stamp::int(64), &[add]);

        let parts = decompose_offset(graph, ext);
        assert_eq!(parts.displacement, 16);
        assert_eq!(parts.scale, 4);
        let index = parts.index.unwrap();
        assert_eq!(graph.kind(index), NodeKind::SignExtend { from: 32, to: 64 });
        assert_eq!(graph.inputs(index), &[x]);
    }

    #[test]
    fn test_operand_missing_from_add_or_shift_is_kept_whole() {
        let mut b = builder();
        let x = b.long_parameter();
        let graph = b.graph_mut();
        let add = graph.unique(NodeKind::IntegerAdd, Stamp::int(64), &[x]);
        let parts = decompose_offset(graph, add);
        assert_eq!(parts.displacement, 0);
        assert_eq!(parts.scale, 1);
        assert_eq!(parts.index, Some(add));

        let shl = graph.unique(NodeKind::LeftShift, Stamp::int(64), &[x]);
        let parts = decompose_offset(graph, shl);
        assert_eq!(parts.scale, 1);
        assert_eq!(parts.index, Some(shl));
    }

    #[test]
    fn test_large_shift_is_not_a_scale() {
        let mut b = builder();
        let x = b.long_parameter();
        let graph = b.graph_mut();
        let four = graph.const_int(4);
        let shl = graph.unique(NodeKind::LeftShift, Stamp::int(64), &[x, four]);
        let parts = decompose_offset(graph, shl);
        assert_eq!(parts.scale, 1);
        assert_eq!(parts.index, Some(shl));
    }

    #[test]
    fn test_array_address_folds_constant_index() {
        let config = VmConfig::default();
        let mut b = builder();
        let arr = b.object_parameter(ObjectStamp::unknown());
        let graph = b.graph_mut();
        let three = graph.const_int(3);
        let addr = array_address(graph, &config, arr, JavaKind::Int, three);
        assert_eq!(
            graph.kind(addr),
            NodeKind::Address {
                displacement: 16 + 12,
                scale: 1
            }
        );
        let index = reconstruct_array_index(graph, &config, JavaKind::Int, addr).unwrap();
        assert_eq!(graph.as_constant(index), Some(crate::ir::Constant::Int(3)));
    }

    #[test]
    fn test_reconstruct_variable_index() {
        let config = VmConfig::default();
        let mut b = builder();
        let arr = b.object_parameter(ObjectStamp::unknown());
        let i = b.int_parameter();
        let graph = b.graph_mut();
        let addr = array_address(graph, &config, arr, JavaKind::Long, i);
        assert_eq!(
            address_parts(graph, addr).map(|p| (p.displacement, p.scale)),
            Some((16, 8))
        );
        assert_eq!(reconstruct_array_index(graph, &config, JavaKind::Long, addr), Some(i));
    }

    #[test]
    fn test_clone_address_is_independent() {
        let mut b = builder();
        let obj = b.object_parameter(ObjectStamp::unknown());
        let graph = b.graph_mut();
        let a = field_address(graph, obj, 12);
        let copy = clone_address(graph, a).unwrap();
        assert_ne!(a, copy);
        assert_eq!(graph.kind(a), graph.kind(copy));
        assert_eq!(graph.inputs(copy), &[obj]);
    }

    fn shaped_offset() -> impl Strategy<Value = (bool, Option<u8>, Option<i32>)> {
        (
            any::<bool>(),
            prop::option::of(1u8..=3),
            prop::option::of(-4096i32..4096),
        )
    }

    proptest! {
        #[test]
        fn prop_decomposition_is_idempotent((extend, shift, add) in shaped_offset()) {
            let mut b = builder();
            let x = b.int_parameter();
            let graph = b.graph_mut();
            let mut expr = x;
            if let Some(k) = shift {
                let k = graph.const_int(k as i32);
                expr = graph.unique(NodeKind::LeftShift, Stamp::int(32), &[expr, k]);
            }
            if let Some(c) = add.filter(|c| *c != 0) {
                let c = graph.const_int(c);
                expr = graph.unique(NodeKind::IntegerAdd, Stamp::int(32), &[expr, c]);
            }
            if extend {
                expr = graph.unique(NodeKind::SignExtend { from: 32, to: 64 }, Stamp::int(64), &[expr]);
            }

            let first = decompose_offset(graph, expr);
            let rebuilt = materialize_offset(graph, first);
            let second = decompose_offset(graph, rebuilt);
            prop_assert_eq!(first, second);
            prop_assert!(matches!(first.scale, 1 | 2 | 4 | 8));
        }
    }
}

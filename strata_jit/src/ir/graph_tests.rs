use super::*;
use crate::ir::builder::GraphBuilder;
use crate::ir::meta::{ResolvedField, ResolvedType};
use strata_core::JavaKind;

fn empty() -> GraphBuilder {
    GraphBuilder::new(GraphMethod::new("Test.run", 2), MetaTable::new())
}

#[test]
fn test_new_graph_has_start() {
    let graph = Graph::new(GraphMethod::default(), MetaTable::new());
    assert_eq!(graph.len(), 1);
    assert_eq!(graph.kind(graph.start()), NodeKind::Start);
    assert_eq!(graph.stage(), LoweringStage::GuardsFloating);
}

#[test]
fn test_add_node_registers_uses() {
    let mut b = empty();
    let x = b.int_parameter();
    let y = b.const_int(4);
    let add = b.floating(NodeKind::IntegerAdd, Stamp::int(32), &[x, y]);
    let graph = b.finish();
    assert_eq!(graph.uses(x).as_slice(), &[add]);
    assert_eq!(graph.uses(y).as_slice(), &[add]);
    assert!(graph.verify().is_ok());
}

#[test]
fn test_unique_reuses_equal_nodes() {
    let mut b = empty();
    let x = b.int_parameter();
    let graph = b.graph_mut();
    let a = graph.unique(NodeKind::IsNull, Stamp::Condition, &[x]);
    let c = graph.unique(NodeKind::IsNull, Stamp::Condition, &[x]);
    assert_eq!(a, c);
    assert_eq!(graph.const_int(7), graph.const_int(7));
    assert_ne!(graph.const_int(7), graph.const_long(7));
}

#[test]
fn test_unique_ignores_stale_entries() {
    let mut b = empty();
    let x = b.int_parameter();
    let y = b.int_parameter();
    let graph = b.graph_mut();
    let a = graph.unique(NodeKind::IsNull, Stamp::Condition, &[x]);
    graph.set_input(a, 0, y);
    let c = graph.unique(NodeKind::IsNull, Stamp::Condition, &[x]);
    assert_ne!(a, c);
    assert!(graph.verify().is_ok());
}

#[test]
fn test_replace_all_uses_moves_every_edge() {
    let mut b = empty();
    let x = b.int_parameter();
    let y = b.int_parameter();
    let add = b.floating(NodeKind::IntegerAdd, Stamp::int(32), &[x, x]);
    let mut graph = b.finish();
    graph.replace_all_uses(x, y);
    assert_eq!(graph.inputs(add), &[y, y]);
    assert_eq!(graph.use_count(x), 0);
    assert_eq!(graph.use_count(y), 2);
    assert!(graph.verify().is_ok());
}

#[test]
fn test_add_before_and_after_fixed() {
    let mut b = empty();
    let ret = b.return_value(None);
    let mut graph = b.finish();
    let start = graph.start();
    let before = graph.add_node(NodeKind::Begin, Stamp::Void, &[]);
    graph.add_before_fixed(ret, before);
    let after = graph.add_node(NodeKind::Begin, Stamp::Void, &[]);
    graph.add_after_fixed(start, after);
    assert_eq!(graph.fixed_chain(), vec![start, after, before, ret]);
    assert!(graph.verify().is_ok());
}

#[test]
fn test_replace_fixed_with_floating() {
    let mut meta = MetaTable::new();
    let ty = meta.add_type(ResolvedType::class("P"));
    let f = meta.add_field(ResolvedField::instance("x", ty, JavaKind::Int, 12));
    let mut b = GraphBuilder::new(GraphMethod::default(), meta);
    let obj = b.object_parameter(ObjectStamp::unknown());
    let load = b.load_field(Some(obj), f);
    let ret = b.return_value(Some(load));
    let mut graph = b.finish();
    let c = graph.const_int(3);
    graph.replace_fixed_with_floating(load, c);
    assert!(!graph.is_alive(load));
    assert_eq!(graph.inputs(ret), &[c]);
    assert_eq!(graph.fixed_chain(), vec![graph.start(), ret]);
    assert_eq!(graph.use_count(obj), 0);
    assert!(graph.verify().is_ok());
}

#[test]
fn test_remove_fixed_rejects_used_node() {
    let mut b = empty();
    let arr = b.object_parameter(ObjectStamp::unknown());
    let len = b.array_length(arr);
    b.return_value(Some(len));
    let mut graph = b.finish();
    let err = graph.remove_fixed(len).unwrap_err();
    assert!(matches!(err, CompileError::InvalidGraph { .. }));
}

#[test]
fn test_prev_begin() {
    let mut b = empty();
    let begin = b.begin();
    let ret = b.return_value(None);
    let graph = b.finish();
    assert_eq!(graph.prev_begin(ret), Some(begin));
    assert_eq!(graph.prev_begin(begin), Some(begin));
}

#[test]
fn test_kill_with_unused_floating_inputs() {
    let mut b = empty();
    let x = b.int_parameter();
    let one = b.const_int(1);
    let add = b.floating(NodeKind::IntegerAdd, Stamp::int(32), &[x, one]);
    let neg = b.floating(NodeKind::IntegerAdd, Stamp::int(32), &[add, add]);
    let mut graph = b.finish();
    graph.kill_with_unused_floating_inputs(neg);
    assert!(!graph.is_alive(add));
    assert!(!graph.is_alive(x));
    assert!(graph.verify().is_ok());
}

#[test]
fn test_stage_cannot_regress() {
    let mut graph = Graph::new(GraphMethod::default(), MetaTable::new());
    graph.advance_stage(LoweringStage::GuardsFixed).unwrap();
    assert!(graph.advance_stage(LoweringStage::GuardsFloating).is_err());
    assert_eq!(graph.stage(), LoweringStage::GuardsFixed);
}

#[test]
fn test_verify_rejects_shared_address() {
    let mut b = empty();
    let base = b.object_parameter(ObjectStamp::unknown());
    let addr = b.floating(
        NodeKind::Address {
            displacement: 8,
            scale: 1,
        },
        Stamp::Word,
        &[base],
    );
    b.floating(NodeKind::IsNull, Stamp::Condition, &[addr]);
    b.floating(NodeKind::IsNull, Stamp::Condition, &[addr]);
    assert!(b.graph().verify().is_err());
}

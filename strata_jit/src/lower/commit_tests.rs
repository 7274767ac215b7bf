use super::*;
use crate::config::{LoweringOptions, VmConfig};
use crate::ir::{GraphBuilder, GraphMethod, MetaTable, ResolvedField, ResolvedType};
use crate::lower::stage::LoweringStage;

struct Pair {
    meta: MetaTable,
    a: TypeRef,
    b: TypeRef,
}

/// `class A { Object b; int x; }` and `class B { Object a; }`.
fn pair() -> Pair {
    let mut meta = MetaTable::new();
    let a = meta.add_type(ResolvedType::class("A"));
    let b = meta.add_type(ResolvedType::class("B"));
    meta.add_field(ResolvedField::instance("b", a, JavaKind::Object, 12));
    meta.add_field(ResolvedField::instance("x", a, JavaKind::Int, 16));
    meta.add_field(ResolvedField::instance("a", b, JavaKind::Object, 12));
    Pair { meta, a, b }
}

fn ready(graph: &mut Graph) {
    graph
        .advance_stage(LoweringStage::FrameStatesAssigned)
        .unwrap();
}

fn write_displacement(graph: &Graph, write: NodeId) -> i64 {
    let address = graph.input(write, 0).unwrap();
    match graph.kind(address) {
        NodeKind::Address { displacement, .. } => displacement,
        other => panic!("expected address, got {other:?}"),
    }
}

#[test]
fn test_deferred_before_frame_states() {
    let config = VmConfig::default();
    let options = LoweringOptions::default();
    let tool = LoweringTool::new(&config, &options);
    let Pair { meta, a, .. } = pair();
    let mut b = GraphBuilder::new(GraphMethod::default(), meta);
    let va = b.virtual_instance(a);
    let null = b.null();
    let zero = b.const_int(0);
    let (commit, _) = b.commit(&[va], &[null, zero], Vec::new());
    let mut graph = b.finish();
    let NodeKind::CommitAllocation { commit: r } = graph.kind(commit) else {
        unreachable!()
    };

    let outcome = lower_commit_allocation(&mut graph, &tool, commit, r).unwrap();
    assert_eq!(outcome, LowerOutcome::Deferred);
    assert!(graph.is_alive(commit));
}

#[test]
fn test_cycle_is_closed_with_deferred_write() {
    let config = VmConfig::default();
    let options = LoweringOptions::default();
    let tool = LoweringTool::new(&config, &options);
    let Pair { meta, a, b: bt } = pair();
    let mut b = GraphBuilder::new(GraphMethod::default(), meta);
    let va = b.virtual_instance(a);
    let vb = b.virtual_instance(bt);
    let zero = b.const_int(0);
    let (commit, allocated) = b.commit(&[va, vb], &[vb, zero, va], Vec::new());
    let ret = b.return_value(Some(allocated[0]));
    let mut graph = b.finish();
    ready(&mut graph);
    let NodeKind::CommitAllocation { commit: r } = graph.kind(commit) else {
        unreachable!()
    };

    let outcome = lower_commit_allocation(&mut graph, &tool, commit, r).unwrap();
    assert_eq!(outcome, LowerOutcome::Lowered);
    assert!(!graph.is_alive(commit));
    assert!(!graph.is_alive(va));
    assert!(!graph.is_alive(vb));

    let chain = graph.fixed_chain();
    let kinds: Vec<String> = chain.iter().map(|id| graph.kind(*id).name()).collect();
    assert_eq!(
        kinds,
        [
            "Start",
            "NewInstance",
            "NewInstance",
            "Write",
            "Write",
            "FixedValueAnchor",
            "FixedValueAnchor",
            "Membar",
            "Return",
        ]
    );
    let (new_a, new_b) = (chain[1], chain[2]);

    // B.a = A is written right after B is allocated.
    let backward = chain[3];
    assert_eq!(graph.input(graph.input(backward, 0).unwrap(), 0), Some(new_b));
    assert_eq!(write_displacement(&graph, backward), 12);
    assert!(matches!(
        graph.kind(backward),
        NodeKind::Write {
            barrier: BarrierType::Imprecise,
            init: true,
            ..
        }
    ));

    // A.b = B waits until B exists.
    let forward = chain[4];
    assert_eq!(graph.input(graph.input(forward, 0).unwrap(), 0), Some(new_a));
    assert_eq!(write_displacement(&graph, forward), 12);

    assert_eq!(graph.input(ret, 0), Some(chain[5]));
    assert_eq!(graph.input(chain[5], 0), Some(new_a));
    assert_eq!(
        graph.kind(chain[7]),
        NodeKind::Membar(MemoryBarriers::STORE_STORE)
    );
    graph.verify().unwrap();
}

#[test]
fn test_default_entries_are_skipped() {
    let config = VmConfig::default();
    let options = LoweringOptions::default();
    let tool = LoweringTool::new(&config, &options);
    let Pair { meta, a, .. } = pair();
    let mut b = GraphBuilder::new(GraphMethod::default(), meta);
    let va = b.virtual_instance(a);
    let null = b.null();
    let seven = b.const_int(7);
    let (commit, _) = b.commit(&[va], &[null, seven], Vec::new());
    b.return_value(None);
    let mut graph = b.finish();
    ready(&mut graph);
    let NodeKind::CommitAllocation { commit: r } = graph.kind(commit) else {
        unreachable!()
    };

    lower_commit_allocation(&mut graph, &tool, commit, r).unwrap();
    let writes: Vec<NodeId> = graph
        .fixed_chain()
        .into_iter()
        .filter(|id| matches!(graph.kind(*id), NodeKind::Write { .. }))
        .collect();
    assert_eq!(writes.len(), 1);
    assert_eq!(write_displacement(&graph, writes[0]), 16);
    assert!(matches!(
        graph.kind(writes[0]),
        NodeKind::Write {
            kind: JavaKind::Int,
            barrier: BarrierType::None,
            ..
        }
    ));
}

#[test]
fn test_array_entries_use_element_layout() {
    let config = VmConfig::default();
    let options = LoweringOptions::default();
    let tool = LoweringTool::new(&config, &options);
    let mut meta = MetaTable::new();
    let int_array = meta.add_type(ResolvedType::array("int[]", None));
    let mut b = GraphBuilder::new(GraphMethod::default(), meta);
    let va = b.virtual_array(int_array, JavaKind::Int, 3);
    let zero = b.const_int(0);
    let one = b.const_int(1);
    let two = b.const_int(2);
    let (commit, _) = b.commit(&[va], &[zero, one, two], Vec::new());
    b.return_value(None);
    let mut graph = b.finish();
    ready(&mut graph);
    let NodeKind::CommitAllocation { commit: r } = graph.kind(commit) else {
        unreachable!()
    };

    lower_commit_allocation(&mut graph, &tool, commit, r).unwrap();
    let chain = graph.fixed_chain();
    let new_array = chain[1];
    assert!(matches!(graph.kind(new_array), NodeKind::NewArray { .. }));
    assert_eq!(
        graph.as_constant(graph.input(new_array, 0).unwrap()),
        Some(crate::ir::Constant::Int(3))
    );
    let mut displacements: Vec<i64> = chain
        .iter()
        .filter(|id| matches!(graph.kind(**id), NodeKind::Write { .. }))
        .map(|id| write_displacement(&graph, *id))
        .collect();
    displacements.sort_unstable();
    assert_eq!(displacements, [20, 24]);
}

#[test]
fn test_locks_are_replayed_and_final_fields_fence() {
    let config = VmConfig::default();
    let options = LoweringOptions::default();
    let tool = LoweringTool::new(&config, &options);
    let mut meta = MetaTable::new();
    let ty = meta.add_type(ResolvedType::class("Point"));
    meta.add_field(ResolvedField {
        is_final: true,
        ..ResolvedField::instance("x", ty, JavaKind::Int, 12)
    });
    let mut b = GraphBuilder::new(GraphMethod::default(), meta);
    let v = b.virtual_instance(ty);
    let zero = b.const_int(0);
    let (commit, _) = b.commit(&[v], &[zero], vec![smallvec::smallvec![MonitorId(0)]]);
    b.return_value(None);
    let mut graph = b.finish();
    ready(&mut graph);
    let NodeKind::CommitAllocation { commit: r } = graph.kind(commit) else {
        unreachable!()
    };

    lower_commit_allocation(&mut graph, &tool, commit, r).unwrap();
    let chain = graph.fixed_chain();
    let enter = chain
        .iter()
        .copied()
        .find(|id| matches!(graph.kind(*id), NodeKind::MonitorEnter { .. }))
        .unwrap();
    assert_eq!(graph.kind(graph.input(enter, 0).unwrap()), NodeKind::FixedValueAnchor);
    let fence = chain
        .iter()
        .copied()
        .find(|id| matches!(graph.kind(*id), NodeKind::Membar(_)))
        .unwrap();
    assert_eq!(
        graph.kind(fence),
        NodeKind::Membar(MemoryBarriers::STORE_STORE | MemoryBarriers::LOAD_STORE)
    );
}

#[test]
fn test_value_count_mismatch_is_rejected() {
    let config = VmConfig::default();
    let options = LoweringOptions::default();
    let tool = LoweringTool::new(&config, &options);
    let Pair { meta, a, .. } = pair();
    let mut b = GraphBuilder::new(GraphMethod::default(), meta);
    let va = b.virtual_instance(a);
    let (commit, _) = b.commit(&[va], &[], Vec::new());
    let mut graph = b.finish();
    ready(&mut graph);
    let NodeKind::CommitAllocation { commit: r } = graph.kind(commit) else {
        unreachable!()
    };

    let err = lower_commit_allocation(&mut graph, &tool, commit, r).unwrap_err();
    assert!(matches!(err, CompileError::InvalidGraph { .. }));
}

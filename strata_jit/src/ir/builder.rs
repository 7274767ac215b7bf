//! Incremental graph construction.
//!
//! The builder appends fixed nodes to a single control chain and exposes
//! shorthands for the high-level nodes the lowering engine consumes.

use smallvec::SmallVec;
use strata_core::JavaKind;

use super::graph::{CommitInfo, Graph, GraphMethod};
use super::meta::{FieldRef, MetaTable, MethodRef, ObjectRef, TypeRef};
use super::node::NodeId;
use super::operators::{InvokeKind, MonitorId, NodeKind};
use super::stamp::{ObjectStamp, Stamp};

/// Builds a straight-line graph.
#[derive(Debug)]
pub struct GraphBuilder {
    graph: Graph,
    last: NodeId,
    next_parameter: u32,
}

impl GraphBuilder {
    /// Start a graph entered through `Start`.
    pub fn new(method: GraphMethod, meta: MetaTable) -> Self {
        Self::from_graph(Graph::new(method, meta))
    }

    /// Start an OSR graph entered through `OsrStart`.
    pub fn new_osr(method: GraphMethod, meta: MetaTable) -> Self {
        Self::from_graph(Graph::new_osr(method, meta))
    }

    fn from_graph(graph: Graph) -> Self {
        let last = graph.start();
        Self {
            graph,
            last,
            next_parameter: 0,
        }
    }

    /// The graph under construction.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The graph under construction, for direct edits.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// The last appended fixed node.
    pub fn last(&self) -> NodeId {
        self.last
    }

    /// Finish construction.
    pub fn finish(self) -> Graph {
        self.graph
    }

    // =========================================================================
    // Values
    // =========================================================================

    /// Next incoming parameter.
    pub fn parameter(&mut self, stamp: Stamp) -> NodeId {
        let index = self.next_parameter;
        self.next_parameter += 1;
        self.graph.add_node(NodeKind::Parameter(index), stamp, &[])
    }

    /// Object parameter with the given facts.
    pub fn object_parameter(&mut self, stamp: ObjectStamp) -> NodeId {
        self.parameter(Stamp::Object(stamp))
    }

    /// `int` parameter.
    pub fn int_parameter(&mut self) -> NodeId {
        self.parameter(Stamp::int(32))
    }

    /// `long` parameter.
    pub fn long_parameter(&mut self) -> NodeId {
        self.parameter(Stamp::int(64))
    }

    /// `int` constant.
    pub fn const_int(&mut self, value: i32) -> NodeId {
        self.graph.const_int(value)
    }

    /// `long` constant.
    pub fn const_long(&mut self, value: i64) -> NodeId {
        self.graph.const_long(value)
    }

    /// `null`.
    pub fn null(&mut self) -> NodeId {
        self.graph.constant(super::operators::Constant::Null)
    }

    /// Heap object constant.
    pub fn const_object(&mut self, object: ObjectRef, stamp: ObjectStamp) -> NodeId {
        self.graph.const_object(object, stamp)
    }

    /// Floating node.
    pub fn floating(&mut self, kind: NodeKind, stamp: Stamp, inputs: &[NodeId]) -> NodeId {
        self.graph.add_node(kind, stamp, inputs)
    }

    /// Frame state.
    pub fn frame_state(&mut self, bci: i32, locals: &[NodeId]) -> NodeId {
        self.graph
            .add_node(NodeKind::FrameState { bci }, Stamp::Void, locals)
    }

    /// Interpreter local passed to an OSR entry.
    pub fn osr_local(&mut self, index: u32, kind: JavaKind) -> NodeId {
        self.graph
            .add_node(NodeKind::OsrLocal { index, kind }, Stamp::for_kind(kind), &[])
    }

    // =========================================================================
    // Fixed Nodes
    // =========================================================================

    /// Append a fixed node to the control chain.
    pub fn append(&mut self, kind: NodeKind, stamp: Stamp, inputs: &[NodeId]) -> NodeId {
        let id = self.graph.add_node(kind, stamp, inputs);
        self.graph.set_next(self.last, Some(id));
        self.last = id;
        id
    }

    /// Append a begin node.
    pub fn begin(&mut self) -> NodeId {
        self.append(NodeKind::Begin, Stamp::Void, &[])
    }

    /// Append a field load.
    pub fn load_field(&mut self, object: Option<NodeId>, field: FieldRef) -> NodeId {
        let kind = self.graph.meta().field(field).kind;
        let inputs: SmallVec<[NodeId; 1]> = object.into_iter().collect();
        self.append(NodeKind::LoadField { field }, Stamp::for_kind(kind), &inputs)
    }

    /// Append a field store.
    pub fn store_field(&mut self, object: Option<NodeId>, field: FieldRef, value: NodeId) -> NodeId {
        let mut inputs: SmallVec<[NodeId; 2]> = object.into_iter().collect();
        inputs.push(value);
        self.append(NodeKind::StoreField { field }, Stamp::Void, &inputs)
    }

    /// Append an array element load.
    pub fn load_indexed(&mut self, array: NodeId, index: NodeId, element: JavaKind) -> NodeId {
        self.append(
            NodeKind::LoadIndexed { element },
            Stamp::for_kind(element),
            &[array, index],
        )
    }

    /// Append an array element store.
    pub fn store_indexed(
        &mut self,
        array: NodeId,
        index: NodeId,
        element: JavaKind,
        value: NodeId,
    ) -> NodeId {
        self.append(
            NodeKind::StoreIndexed { element },
            Stamp::Void,
            &[array, index, value],
        )
    }

    /// Append an array length read.
    pub fn array_length(&mut self, array: NodeId) -> NodeId {
        self.append(NodeKind::ArrayLength, Stamp::positive_int(), &[array])
    }

    /// Append a call. The call target floats; the invoke is fixed.
    pub fn invoke(
        &mut self,
        method: MethodRef,
        invoke: InvokeKind,
        args: &[NodeId],
        polymorphic: bool,
    ) -> NodeId {
        let target = self.graph.add_node(
            NodeKind::MethodCallTarget { method, invoke },
            Stamp::Void,
            args,
        );
        self.append(
            NodeKind::Invoke {
                bci: 0,
                polymorphic,
            },
            Stamp::object(),
            &[target],
        )
    }

    /// Deferred instance allocation.
    pub fn virtual_instance(&mut self, ty: TypeRef) -> NodeId {
        self.graph.add_node(
            NodeKind::VirtualInstance { ty },
            Stamp::Object(ObjectStamp::exact_non_null(ty)),
            &[],
        )
    }

    /// Deferred array allocation.
    pub fn virtual_array(&mut self, ty: TypeRef, element: JavaKind, length: u32) -> NodeId {
        self.graph.add_node(
            NodeKind::VirtualArray {
                ty,
                element,
                length,
            },
            Stamp::Object(ObjectStamp::exact_non_null(ty)),
            &[],
        )
    }

    /// Append an allocation commit and one `AllocatedObject` per virtual.
    ///
    /// `values` holds every entry of every virtual, in order.
    pub fn commit(
        &mut self,
        virtuals: &[NodeId],
        values: &[NodeId],
        locks: Vec<SmallVec<[MonitorId; 1]>>,
    ) -> (NodeId, Vec<NodeId>) {
        let mut locks = locks;
        locks.resize(virtuals.len(), SmallVec::new());
        let commit = self.graph.add_commit(CommitInfo {
            object_count: virtuals.len(),
            locks,
        });
        let inputs: Vec<NodeId> = virtuals.iter().chain(values).copied().collect();
        let node = self.append(NodeKind::CommitAllocation { commit }, Stamp::Void, &inputs);
        let allocated = virtuals
            .iter()
            .map(|&v| {
                let stamp = self.graph.stamp(v);
                self.graph
                    .add_node(NodeKind::AllocatedObject, stamp, &[v, node])
            })
            .collect();
        (node, allocated)
    }

    /// Append a return.
    pub fn return_value(&mut self, value: Option<NodeId>) -> NodeId {
        let inputs: SmallVec<[NodeId; 1]> = value.into_iter().collect();
        self.append(NodeKind::Return, Stamp::Void, &inputs)
    }
}

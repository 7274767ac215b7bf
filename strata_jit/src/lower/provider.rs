//! Node dispatch.
//!
//! [`HotSpotLoweringProvider`] routes every lowerable node kind to exactly
//! one handler. The match is exhaustive: adding a node kind without
//! deciding how it lowers does not compile. Kinds that are already low
//! level are rejected with [`CompileError::UnhandledNode`].

use std::sync::Arc;

use strata_core::{CompileError, CompileResult};
use tracing::{debug, trace};

use super::commit::lower_commit_allocation;
use super::exception::lower_bytecode_exception;
use super::invoke::lower_invoke;
use super::memory::{
    lower_array_length, lower_atomic_read_and_write, lower_compare_and_swap, lower_java_read,
    lower_java_write, lower_load_field, lower_load_hub, lower_load_indexed, lower_load_method,
    lower_store_field, lower_store_hub, lower_store_indexed, lower_unsafe_load,
    lower_unsafe_store, unsafe_load_needs_referent_barrier,
};
use super::osr::lower_osr_start;
use super::stage::LoweringStage;
use super::templates::Templates;
use super::tool::LoweringTool;
use super::LowerOutcome;
use crate::config::{LoweringOptions, VmConfig};
use crate::ir::{Graph, NodeId, NodeKind};

/// Lowers nodes for a HotSpot-style VM.
///
/// Holds no per-graph state; one provider can serve many compilations
/// concurrently.
#[derive(Debug, Clone)]
pub struct HotSpotLoweringProvider {
    config: Arc<VmConfig>,
    options: LoweringOptions,
    templates: Templates,
}

impl HotSpotLoweringProvider {
    /// Create a provider with runtime-call templates.
    pub fn new(config: Arc<VmConfig>, options: LoweringOptions) -> Self {
        Self {
            config,
            options,
            templates: Templates::default(),
        }
    }

    /// Use VM-supplied template families.
    pub fn with_templates(mut self, templates: Templates) -> Self {
        self.templates = templates;
        self
    }

    /// VM configuration snapshot.
    pub fn config(&self) -> &Arc<VmConfig> {
        &self.config
    }

    /// Compiler options.
    pub fn options(&self) -> &LoweringOptions {
        &self.options
    }

    /// Lower one node.
    ///
    /// Returns [`LowerOutcome::Deferred`] when the graph has not reached the
    /// stage the node needs; the node is left untouched.
    pub fn lower(&self, graph: &mut Graph, node: NodeId) -> CompileResult<LowerOutcome> {
        let tool = LoweringTool::new(&self.config, &self.options);
        let kind = graph.kind(node);
        let outcome = match kind {
            NodeKind::OsrStart => lower_osr_start(graph, &tool, node)?,
            NodeKind::Deoptimize { .. } | NodeKind::Unwind => LowerOutcome::Unchanged,
            NodeKind::IntegerDiv | NodeKind::IntegerRem => LowerOutcome::Unchanged,

            NodeKind::LoadField { field } => lower_load_field(graph, &tool, node, field)?,
            NodeKind::StoreField { field } => lower_store_field(graph, &tool, node, field)?,
            NodeKind::LoadIndexed { element } => lower_load_indexed(graph, &tool, node, element)?,
            NodeKind::StoreIndexed { element } => {
                lower_store_indexed(graph, &tool, node, element)?
            }
            NodeKind::ArrayLength => lower_array_length(graph, &tool, node)?,
            NodeKind::CompareAndSwap {
                kind,
                identity,
                displacement,
            } => lower_compare_and_swap(graph, &tool, node, kind, identity, displacement)?,
            NodeKind::AtomicReadAndWrite { kind, identity } => {
                lower_atomic_read_and_write(graph, &tool, node, kind, identity)?
            }
            NodeKind::UnsafeLoad { kind, identity } => {
                if unsafe_load_needs_referent_barrier(graph, &tool, node, kind) {
                    self.templates.unsafe_load.lower_unsafe_load(graph, &tool, node)?;
                    LowerOutcome::Lowered
                } else {
                    lower_unsafe_load(graph, &tool, node, kind, identity)?
                }
            }
            NodeKind::UnsafeStore { kind, identity } => {
                lower_unsafe_store(graph, &tool, node, kind, identity)?
            }
            NodeKind::JavaRead { .. } => lower_java_read(graph, &tool, node)?,
            NodeKind::JavaWrite { .. } => lower_java_write(graph, &tool, node)?,
            NodeKind::LoadHub => lower_load_hub(graph, &tool, node)?,
            NodeKind::StoreHub => lower_store_hub(graph, &tool, node)?,
            NodeKind::LoadMethod { method } => lower_load_method(graph, &tool, node, method)?,

            NodeKind::Invoke { polymorphic, .. } => lower_invoke(graph, &tool, node, polymorphic)?,
            NodeKind::CommitAllocation { commit } => {
                lower_commit_allocation(graph, &tool, node, commit)?
            }
            NodeKind::BytecodeException { exception } => {
                lower_bytecode_exception(graph, &tool, node, exception)?
            }

            NodeKind::InstanceOf { .. }
            | NodeKind::InstanceOfDynamic
            | NodeKind::CheckCast { .. }
            | NodeKind::CheckCastDynamic { .. } => {
                if !graph.stage().satisfies(LoweringStage::GuardsFixed) {
                    LowerOutcome::Deferred
                } else {
                    self.templates.type_check.lower_type_check(graph, &tool, node)?;
                    LowerOutcome::Lowered
                }
            }
            NodeKind::NewInstance { .. }
            | NodeKind::NewArray { .. }
            | NodeKind::DynamicNewInstance
            | NodeKind::DynamicNewArray
            | NodeKind::NewMultiArray { .. } => {
                if !graph.stage().satisfies(LoweringStage::FrameStatesAssigned) {
                    LowerOutcome::Deferred
                } else {
                    self.templates.new_object.lower_new_object(graph, &tool, node)?;
                    LowerOutcome::Lowered
                }
            }
            NodeKind::MonitorEnter { .. } | NodeKind::MonitorExit { .. } => {
                if !graph.stage().satisfies(LoweringStage::FrameStatesAssigned) {
                    LowerOutcome::Deferred
                } else {
                    self.templates.monitor.lower_monitor(graph, &tool, node)?;
                    LowerOutcome::Lowered
                }
            }
            NodeKind::WriteBarrier(_) => {
                self.templates.write_barrier.lower_write_barrier(graph, &tool, node)?;
                LowerOutcome::Lowered
            }
            NodeKind::Box { .. } | NodeKind::Unbox { .. } => {
                self.templates.boxing.lower_boxing(graph, &tool, node)?;
                LowerOutcome::Lowered
            }
            NodeKind::LoadExceptionObject => {
                self.templates
                    .exception_object
                    .lower_exception_object(graph, &tool, node)?;
                LowerOutcome::Lowered
            }
            NodeKind::ArrayCopy { .. } => {
                self.templates.array_copy.lower_array_copy(graph, &tool, node)?;
                LowerOutcome::Lowered
            }

            NodeKind::Start
            | NodeKind::Begin
            | NodeKind::Return
            | NodeKind::Constant(_)
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
            | NodeKind::MethodCallTarget { .. }
            | NodeKind::DirectCallTarget { .. }
            | NodeKind::IndirectCallTarget { .. }
            | NodeKind::Read { .. }
            | NodeKind::Write { .. }
            | NodeKind::LoweredCompareAndSwap { .. }
            | NodeKind::LoweredAtomicReadAndWrite { .. }
            | NodeKind::Membar(_)
            | NodeKind::FixedGuard { .. }
            | NodeKind::ConditionAnchor
            | NodeKind::FixedValueAnchor
            | NodeKind::ForeignCall(_) => {
                return Err(CompileError::unhandled(kind.name(), node.index()));
            }
        };

        match outcome {
            LowerOutcome::Lowered => debug!(%node, kind = %kind.name(), "lowered"),
            LowerOutcome::Deferred => {
                trace!(%node, kind = %kind.name(), stage = %graph.stage(), "deferred")
            }
            LowerOutcome::Unchanged => {}
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{GraphBuilder, GraphMethod, MetaTable, ObjectStamp, ResolvedType, Stamp};
    use strata_core::JavaKind;

    fn provider() -> HotSpotLoweringProvider {
        HotSpotLoweringProvider::new(Arc::new(VmConfig::default()), LoweringOptions::default())
    }

    #[test]
    fn test_low_level_node_is_unhandled() {
        let mut b = GraphBuilder::new(GraphMethod::default(), MetaTable::new());
        let p = b.int_parameter();
        let mut graph = b.finish();

        let err = provider().lower(&mut graph, p).unwrap_err();
        assert_eq!(err, CompileError::unhandled("Parameter", p.index()));
        assert!(err.is_internal());
    }

    #[test]
    fn test_division_is_left_alone() {
        let mut b = GraphBuilder::new(GraphMethod::default(), MetaTable::new());
        let x = b.int_parameter();
        let y = b.int_parameter();
        let div = b.append(NodeKind::IntegerDiv, Stamp::int(32), &[x, y]);
        b.return_value(Some(div));
        let mut graph = b.finish();

        let outcome = provider().lower(&mut graph, div).unwrap();
        assert_eq!(outcome, LowerOutcome::Unchanged);
        assert!(graph.is_alive(div));
    }

    #[test]
    fn test_type_check_waits_for_fixed_guards() {
        let mut meta = MetaTable::new();
        let ty = meta.add_type(ResolvedType::class("Shape"));
        let mut b = GraphBuilder::new(GraphMethod::default(), meta);
        let obj = b.object_parameter(ObjectStamp::unknown());
        let check = b.append(NodeKind::InstanceOf { ty }, Stamp::Condition, &[obj]);
        b.return_value(None);
        let mut graph = b.finish();
        let provider = provider();

        assert_eq!(
            provider.lower(&mut graph, check).unwrap(),
            LowerOutcome::Deferred
        );
        graph.advance_stage(LoweringStage::GuardsFixed).unwrap();
        assert_eq!(
            provider.lower(&mut graph, check).unwrap(),
            LowerOutcome::Lowered
        );
        assert!(!graph.is_alive(check));
    }

    #[test]
    fn test_allocation_waits_for_frame_states() {
        let mut meta = MetaTable::new();
        let ty = meta.add_type(ResolvedType::class("Shape"));
        let mut b = GraphBuilder::new(GraphMethod::default(), meta);
        let new = b.append(
            NodeKind::NewInstance {
                ty,
                fill_contents: true,
            },
            Stamp::Object(ObjectStamp::exact_non_null(ty)),
            &[],
        );
        b.return_value(Some(new));
        let mut graph = b.finish();
        let provider = provider();

        graph.advance_stage(LoweringStage::GuardsFixed).unwrap();
        assert_eq!(
            provider.lower(&mut graph, new).unwrap(),
            LowerOutcome::Deferred
        );
        graph
            .advance_stage(LoweringStage::FrameStatesAssigned)
            .unwrap();
        assert_eq!(
            provider.lower(&mut graph, new).unwrap(),
            LowerOutcome::Lowered
        );
    }

    #[test]
    fn test_referent_unsafe_load_goes_to_template() {
        let mut meta = MetaTable::new();
        let ty = meta.add_type(ResolvedType::class("Holder"));
        let mut b = GraphBuilder::new(GraphMethod::default(), meta);
        let obj = b.object_parameter(ObjectStamp::exact_non_null(ty));
        let offset = b.long_parameter();
        let load = b.append(
            NodeKind::UnsafeLoad {
                kind: JavaKind::Object,
                identity: crate::ir::LocationIdentity::Any,
            },
            Stamp::object(),
            &[obj, offset],
        );
        let ret = b.return_value(Some(load));
        let mut graph = b.finish();
        graph.advance_stage(LoweringStage::GuardsFixed).unwrap();

        provider().lower(&mut graph, load).unwrap();
        let call = graph.input(ret, 0).unwrap();
        assert_eq!(
            graph.kind(call),
            NodeKind::ForeignCall(crate::ir::ForeignCallDescriptor::Stub("unsafe_load_referent"))
        );
    }
}

//! Template families.
//!
//! Some node kinds are materialized as precompiled subgraphs supplied by
//! the VM. Lowering only decides *which* family handles a node and *when*;
//! the expansion itself is behind one trait per family.
//!
//! [`RuntimeCallTemplates`] is the portable fallback: every templated node
//! becomes a call to the matching runtime stub.

use std::sync::Arc;

use strata_core::{CompileError, CompileResult};
use tracing::trace;

use super::tool::LoweringTool;
use crate::ir::{ForeignCallDescriptor, Graph, NodeId, NodeKind, TemplateFamily};

/// Type checks: `InstanceOf`, `CheckCast` and their dynamic forms.
pub trait TypeCheckTemplates: Send + Sync {
    /// Expand a type check.
    fn lower_type_check(
        &self,
        graph: &mut Graph,
        tool: &LoweringTool<'_>,
        node: NodeId,
    ) -> CompileResult<()>;
}

/// Allocation fast paths.
pub trait NewObjectTemplates: Send + Sync {
    /// Expand an allocation.
    fn lower_new_object(
        &self,
        graph: &mut Graph,
        tool: &LoweringTool<'_>,
        node: NodeId,
    ) -> CompileResult<()>;
}

/// Monitor enter and exit.
pub trait MonitorTemplates: Send + Sync {
    /// Expand a monitor operation.
    fn lower_monitor(
        &self,
        graph: &mut Graph,
        tool: &LoweringTool<'_>,
        node: NodeId,
    ) -> CompileResult<()>;
}

/// Collector barriers.
pub trait WriteBarrierTemplates: Send + Sync {
    /// Expand a barrier operation.
    fn lower_write_barrier(
        &self,
        graph: &mut Graph,
        tool: &LoweringTool<'_>,
        node: NodeId,
    ) -> CompileResult<()>;
}

/// Primitive boxing and unboxing.
pub trait BoxingTemplates: Send + Sync {
    /// Expand a box or unbox.
    fn lower_boxing(
        &self,
        graph: &mut Graph,
        tool: &LoweringTool<'_>,
        node: NodeId,
    ) -> CompileResult<()>;
}

/// Exception handler entry.
pub trait ExceptionObjectTemplates: Send + Sync {
    /// Expand the pending-exception fetch.
    fn lower_exception_object(
        &self,
        graph: &mut Graph,
        tool: &LoweringTool<'_>,
        node: NodeId,
    ) -> CompileResult<()>;
}

/// Unsafe loads that may read `Reference.referent`.
pub trait UnsafeLoadTemplates: Send + Sync {
    /// Expand an unsafe load with a conditional referent barrier.
    fn lower_unsafe_load(
        &self,
        graph: &mut Graph,
        tool: &LoweringTool<'_>,
        node: NodeId,
    ) -> CompileResult<()>;
}

/// Array copies.
pub trait ArrayCopyTemplates: Send + Sync {
    /// Expand an array copy.
    fn lower_array_copy(
        &self,
        graph: &mut Graph,
        tool: &LoweringTool<'_>,
        node: NodeId,
    ) -> CompileResult<()>;
}

// =============================================================================
// Runtime Call Fallback
// =============================================================================

/// Expands every family into a runtime stub call.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeCallTemplates;

impl RuntimeCallTemplates {
    fn stub_name(tool: &LoweringTool<'_>, kind: NodeKind) -> Option<&'static str> {
        let name = match kind {
            NodeKind::InstanceOf { .. } => "instanceof",
            NodeKind::InstanceOfDynamic => "instanceof_dynamic",
            NodeKind::CheckCast {
                for_store_check: true,
                ..
            } => "store_check",
            NodeKind::CheckCast { .. } => "checkcast",
            NodeKind::CheckCastDynamic {
                for_store_check: true,
            } => "store_check_dynamic",
            NodeKind::CheckCastDynamic { .. } => "checkcast_dynamic",
            NodeKind::NewInstance { .. } => "new_instance",
            NodeKind::NewArray { .. } => "new_array",
            NodeKind::DynamicNewInstance => "dynamic_new_instance",
            NodeKind::DynamicNewArray => "dynamic_new_array",
            NodeKind::NewMultiArray { .. } => "new_multi_array",
            NodeKind::MonitorEnter { .. } if tool.config.use_fast_locking => "monitorenter_fast",
            NodeKind::MonitorEnter { .. } => "monitorenter",
            NodeKind::MonitorExit { .. } if tool.config.use_fast_locking => "monitorexit_fast",
            NodeKind::MonitorExit { .. } => "monitorexit",
            NodeKind::WriteBarrier(op) => op.as_str(),
            NodeKind::Box { .. } => "box",
            NodeKind::Unbox { .. } => "unbox",
            NodeKind::LoadExceptionObject => "load_exception_object",
            NodeKind::UnsafeLoad { .. } => "unsafe_load_referent",
            NodeKind::ArrayCopy { .. } => "arraycopy",
            _ => return None,
        };
        Some(name)
    }

    fn replace_with_stub(
        family: TemplateFamily,
        graph: &mut Graph,
        tool: &LoweringTool<'_>,
        node: NodeId,
    ) -> CompileResult<()> {
        let kind = graph.kind(node);
        let Some(name) = Self::stub_name(tool, kind) else {
            return Err(CompileError::template(
                family.as_str(),
                format!("no stub for {} {node}", kind.name()),
            ));
        };
        let args = graph.inputs(node).to_vec();
        let call = graph.add_node(
            NodeKind::ForeignCall(ForeignCallDescriptor::Stub(name)),
            graph.stamp(node),
            &args,
        );
        graph.set_guard(call, graph.guard(node));
        graph.set_state_after(call, graph.state_after(node));
        graph.replace_fixed_with_fixed(node, call);
        trace!(%node, %call, stub = name, family = family.as_str(), "template");
        Ok(())
    }
}

impl TypeCheckTemplates for RuntimeCallTemplates {
    fn lower_type_check(
        &self,
        graph: &mut Graph,
        tool: &LoweringTool<'_>,
        node: NodeId,
    ) -> CompileResult<()> {
        Self::replace_with_stub(TemplateFamily::TypeCheck, graph, tool, node)
    }
}

impl NewObjectTemplates for RuntimeCallTemplates {
    fn lower_new_object(
        &self,
        graph: &mut Graph,
        tool: &LoweringTool<'_>,
        node: NodeId,
    ) -> CompileResult<()> {
        Self::replace_with_stub(TemplateFamily::NewObject, graph, tool, node)
    }
}

impl MonitorTemplates for RuntimeCallTemplates {
    fn lower_monitor(
        &self,
        graph: &mut Graph,
        tool: &LoweringTool<'_>,
        node: NodeId,
    ) -> CompileResult<()> {
        Self::replace_with_stub(TemplateFamily::Monitor, graph, tool, node)
    }
}

impl WriteBarrierTemplates for RuntimeCallTemplates {
    fn lower_write_barrier(
        &self,
        graph: &mut Graph,
        tool: &LoweringTool<'_>,
        node: NodeId,
    ) -> CompileResult<()> {
        Self::replace_with_stub(TemplateFamily::WriteBarrier, graph, tool, node)
    }
}

impl BoxingTemplates for RuntimeCallTemplates {
    fn lower_boxing(
        &self,
        graph: &mut Graph,
        tool: &LoweringTool<'_>,
        node: NodeId,
    ) -> CompileResult<()> {
        Self::replace_with_stub(TemplateFamily::Boxing, graph, tool, node)
    }
}

impl ExceptionObjectTemplates for RuntimeCallTemplates {
    fn lower_exception_object(
        &self,
        graph: &mut Graph,
        tool: &LoweringTool<'_>,
        node: NodeId,
    ) -> CompileResult<()> {
        Self::replace_with_stub(TemplateFamily::ExceptionObject, graph, tool, node)
    }
}

impl UnsafeLoadTemplates for RuntimeCallTemplates {
    fn lower_unsafe_load(
        &self,
        graph: &mut Graph,
        tool: &LoweringTool<'_>,
        node: NodeId,
    ) -> CompileResult<()> {
        Self::replace_with_stub(TemplateFamily::UnsafeLoad, graph, tool, node)
    }
}

impl ArrayCopyTemplates for RuntimeCallTemplates {
    fn lower_array_copy(
        &self,
        graph: &mut Graph,
        tool: &LoweringTool<'_>,
        node: NodeId,
    ) -> CompileResult<()> {
        Self::replace_with_stub(TemplateFamily::ArrayCopy, graph, tool, node)
    }
}

// =============================================================================
// Bundle
// =============================================================================

/// The template families a lowering provider dispatches to.
#[derive(Clone)]
pub struct Templates {
    /// Type checks.
    pub type_check: Arc<dyn TypeCheckTemplates>,
    /// Allocation.
    pub new_object: Arc<dyn NewObjectTemplates>,
    /// Monitors.
    pub monitor: Arc<dyn MonitorTemplates>,
    /// Collector barriers.
    pub write_barrier: Arc<dyn WriteBarrierTemplates>,
    /// Boxing.
    pub boxing: Arc<dyn BoxingTemplates>,
    /// Exception handler entry.
    pub exception_object: Arc<dyn ExceptionObjectTemplates>,
    /// Referent-aware unsafe loads.
    pub unsafe_load: Arc<dyn UnsafeLoadTemplates>,
    /// Array copies.
    pub array_copy: Arc<dyn ArrayCopyTemplates>,
}

impl Templates {
    /// Every family expanded as a runtime call.
    pub fn runtime_calls() -> Self {
        let stubs = Arc::new(RuntimeCallTemplates);
        Self {
            type_check: stubs.clone(),
            new_object: stubs.clone(),
            monitor: stubs.clone(),
            write_barrier: stubs.clone(),
            boxing: stubs.clone(),
            exception_object: stubs.clone(),
            unsafe_load: stubs.clone(),
            array_copy: stubs,
        }
    }
}

impl Default for Templates {
    fn default() -> Self {
        Self::runtime_calls()
    }
}

impl std::fmt::Debug for Templates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Templates").finish_non_exhaustive()
    }
}

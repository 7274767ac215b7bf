//! Tests for barrier selection.

use super::*;
use proptest::prelude::*;

const COLLECTORS: [CollectorKind; 4] = [
    CollectorKind::Serial,
    CollectorKind::Parallel,
    CollectorKind::G1,
    CollectorKind::Epsilon,
];

fn any_collector() -> impl Strategy<Value = CollectorKind> {
    prop::sample::select(COLLECTORS.to_vec())
}

fn any_primitive_kind() -> impl Strategy<Value = JavaKind> {
    prop::sample::select(
        JavaKind::ARRAY_ELEMENT_KINDS
            .iter()
            .copied()
            .filter(|k| !k.is_object())
            .collect::<Vec<_>>(),
    )
}

fn any_shape() -> impl Strategy<Value = AccessShape> {
    prop_oneof![
        any::<bool>().prop_map(|referent| AccessShape::Field { referent }),
        Just(AccessShape::ArrayElement),
        Just(AccessShape::Atomic(ReceiverShape::Instance)),
        Just(AccessShape::Atomic(ReceiverShape::ArrayOrUnknown)),
        Just(AccessShape::Unsafe(ReceiverShape::Instance)),
        Just(AccessShape::Unsafe(ReceiverShape::ArrayOrUnknown)),
        any::<bool>().prop_map(|array| AccessShape::Init { array }),
    ]
}

// =============================================================================
// Stores
// =============================================================================

#[test]
fn test_object_field_store_is_imprecise() {
    for collector in [CollectorKind::Serial, CollectorKind::Parallel, CollectorKind::G1] {
        assert_eq!(
            select(
                AccessShape::Field { referent: false },
                JavaKind::Object,
                AccessOp::Store,
                collector
            ),
            BarrierType::Imprecise
        );
    }
}

#[test]
fn test_object_array_store_is_precise() {
    assert_eq!(
        select(
            AccessShape::ArrayElement,
            JavaKind::Object,
            AccessOp::Store,
            CollectorKind::G1
        ),
        BarrierType::Precise
    );
}

#[test]
fn test_atomic_on_instance_is_imprecise() {
    assert_eq!(
        select(
            AccessShape::Atomic(ReceiverShape::Instance),
            JavaKind::Object,
            AccessOp::Store,
            CollectorKind::Serial
        ),
        BarrierType::Imprecise
    );
}

#[test]
fn test_atomic_on_unknown_is_conservatively_precise() {
    assert_eq!(
        select(
            AccessShape::Atomic(ReceiverShape::from_type(None)),
            JavaKind::Object,
            AccessOp::Store,
            CollectorKind::Serial
        ),
        BarrierType::Precise
    );
    assert_eq!(
        select(
            AccessShape::Unsafe(ReceiverShape::from_type(Some(true))),
            JavaKind::Object,
            AccessOp::Store,
            CollectorKind::Serial
        ),
        BarrierType::Precise
    );
}

#[test]
fn test_epsilon_needs_no_store_barrier() {
    assert_eq!(
        select(
            AccessShape::ArrayElement,
            JavaKind::Object,
            AccessOp::Store,
            CollectorKind::Epsilon
        ),
        BarrierType::None
    );
}

#[test]
fn test_init_store_barriers() {
    let set = BarrierSet::new(CollectorKind::Serial);
    assert_eq!(
        set.select(AccessShape::Init { array: false }, JavaKind::Object, AccessOp::Store),
        BarrierType::Imprecise
    );
    assert_eq!(
        set.select(AccessShape::Init { array: true }, JavaKind::Object, AccessOp::Store),
        BarrierType::Precise
    );

    let deferred = set.with_deferred_init_barriers(true);
    assert_eq!(
        deferred.select(AccessShape::Init { array: true }, JavaKind::Object, AccessOp::Store),
        BarrierType::None
    );
    // Deferral only applies to initializing stores.
    assert_eq!(
        deferred.select(AccessShape::ArrayElement, JavaKind::Object, AccessOp::Store),
        BarrierType::Precise
    );
}

#[test]
fn test_null_store_drops_barrier() {
    assert_eq!(BarrierType::Precise.unless_null(true), BarrierType::None);
    assert_eq!(BarrierType::Imprecise.unless_null(false), BarrierType::Imprecise);
}

// =============================================================================
// Loads
// =============================================================================

#[test]
fn test_referent_load_under_g1_has_read_barrier() {
    assert_eq!(
        select(
            AccessShape::Field { referent: true },
            JavaKind::Object,
            AccessOp::Load,
            CollectorKind::G1
        ),
        BarrierType::Precise
    );
}

#[test]
fn test_referent_load_under_serial_has_no_barrier() {
    assert_eq!(
        select(
            AccessShape::Field { referent: true },
            JavaKind::Object,
            AccessOp::Load,
            CollectorKind::Serial
        ),
        BarrierType::None
    );
}

#[test]
fn test_ordinary_object_load_has_no_barrier() {
    assert_eq!(
        select(
            AccessShape::Field { referent: false },
            JavaKind::Object,
            AccessOp::Load,
            CollectorKind::G1
        ),
        BarrierType::None
    );
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_primitive_accesses_never_need_barriers(
        shape in any_shape(),
        kind in any_primitive_kind(),
        collector in any_collector(),
        store in any::<bool>(),
    ) {
        let op = if store { AccessOp::Store } else { AccessOp::Load };
        prop_assert_eq!(select(shape, kind, op, collector), BarrierType::None);
    }

    #[test]
    fn prop_object_stores_are_barriered_when_collector_requires(
        shape in any_shape(),
        collector in any_collector(),
    ) {
        let barrier = select(shape, JavaKind::Object, AccessOp::Store, collector);
        prop_assert_eq!(barrier.is_some(), collector.needs_write_barrier());
    }
}

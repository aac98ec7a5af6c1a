use ptir_lower::backend::spec::{DType, Operation, ReshapeDim};
use ptir_lower::ops::functional::{
    expand, squeeze_all_trivial_dims, squeeze_trivial_dim, unsqueeze, view,
};
use ptir_lower::{GraphBuilder, LoweringError, LoweringOptions};

fn builder() -> GraphBuilder {
    GraphBuilder::with_options(LoweringOptions::default())
}

#[test]
fn view_resolves_wildcard_into_single_reshape() {
    let mut gb = builder();
    let x = gb.parameter(DType::F32, &[2, 3, 4]);
    let y = view(&mut gb, x, &[ReshapeDim::Infer, ReshapeDim::Explicit(4)])
        .expect("view should succeed");

    assert_eq!(gb.dims(y).expect("dims"), vec![6, 4]);
    assert_eq!(gb.instruction_count(), 1);
    match &gb.instructions()[0].op {
        Operation::Reshape(spec) => assert_eq!(spec.new_shape.dims(), &[6, 4]),
        other => panic!("expected reshape, got {other:?}"),
    }
}

#[test]
fn view_reports_ambiguous_wildcards_without_emitting() {
    let mut gb = builder();
    let x = gb.parameter(DType::F32, &[12]);
    let err = view(&mut gb, x, &[ReshapeDim::Infer, ReshapeDim::Infer])
        .expect_err("two wildcards are ambiguous");
    assert_eq!(err, LoweringError::AmbiguousShape { first: 0, second: 1 });
    assert_eq!(gb.instruction_count(), 0);
}

#[test]
fn view_reports_ambiguity_before_counting_elements() {
    let mut gb = builder();
    let huge = gb.parameter(DType::F32, &[usize::MAX, 2]);
    let err = view(&mut gb, huge, &[ReshapeDim::Infer, ReshapeDim::Infer])
        .expect_err("two wildcards are ambiguous");
    assert_eq!(err, LoweringError::AmbiguousShape { first: 0, second: 1 });

    let x = gb.parameter(DType::F32, &[4]);
    let requested = [
        ReshapeDim::Explicit(usize::MAX),
        ReshapeDim::Explicit(2),
        ReshapeDim::Infer,
        ReshapeDim::Infer,
    ];
    let err = view(&mut gb, x, &requested).expect_err("two wildcards are ambiguous");
    assert_eq!(err, LoweringError::AmbiguousShape { first: 2, second: 3 });
    assert_eq!(gb.instruction_count(), 0);
}

#[test]
fn view_rejects_mismatched_element_count() {
    let mut gb = builder();
    let x = gb.parameter(DType::F32, &[2, 3]);
    assert!(matches!(
        view(&mut gb, x, &[ReshapeDim::Explicit(4), ReshapeDim::Explicit(2)]),
        Err(LoweringError::ShapeMismatch { op: "view", .. })
    ));
}

#[test]
fn squeeze_trivial_dim_drops_size_one_axis() {
    let mut gb = builder();
    let x = gb.parameter(DType::F32, &[2, 1, 3]);
    let y = squeeze_trivial_dim(&mut gb, x, 1).expect("squeeze");
    assert_eq!(gb.dims(y).expect("dims"), vec![2, 3]);
}

#[test]
fn squeeze_trivial_dim_is_noop_on_wide_axis() {
    let mut gb = builder();
    let x = gb.parameter(DType::F32, &[2, 1, 3]);
    let y = squeeze_trivial_dim(&mut gb, x, 2).expect("squeeze probe");
    assert_eq!(y, x);
    assert_eq!(gb.instruction_count(), 0);
}

#[test]
fn squeeze_trivial_dim_rejects_out_of_range_axis() {
    let mut gb = builder();
    let x = gb.parameter(DType::F32, &[2, 1]);
    assert!(matches!(
        squeeze_trivial_dim(&mut gb, x, 2),
        Err(LoweringError::InvalidDimension { dim: 2, .. })
    ));
}

#[test]
fn squeeze_all_trivial_dims_keeps_axis_order() {
    let mut gb = builder();
    let x = gb.parameter(DType::F32, &[1, 4, 1, 5, 1]);
    let y = squeeze_all_trivial_dims(&mut gb, x).expect("squeeze all");
    assert_eq!(gb.dims(y).expect("dims"), vec![4, 5]);

    let ones = gb.parameter(DType::F32, &[1, 1]);
    let scalar = squeeze_all_trivial_dims(&mut gb, ones).expect("squeeze to scalar");
    assert_eq!(gb.rank(scalar).expect("rank"), 0);
}

#[test]
fn unsqueeze_accepts_inclusive_rank() {
    let mut gb = builder();
    let x = gb.parameter(DType::F32, &[2, 3]);
    let front = unsqueeze(&mut gb, x, 0).expect("front");
    let back = unsqueeze(&mut gb, x, 2).expect("back");
    assert_eq!(gb.dims(front).expect("dims"), vec![1, 2, 3]);
    assert_eq!(gb.dims(back).expect("dims"), vec![2, 3, 1]);
    assert!(matches!(
        unsqueeze(&mut gb, x, 3),
        Err(LoweringError::InvalidDimension { op: "unsqueeze", dim: 3, .. })
    ));
}

#[test]
fn expand_aligns_trailing_axes_and_broadcasts() {
    let mut gb = builder();
    let x = gb.parameter(DType::F32, &[3]);
    let y = expand(&mut gb, x, &[4, 3]).expect("expand");
    assert_eq!(gb.dims(y).expect("dims"), vec![4, 3]);

    let ops: Vec<&Operation> = gb.instructions().iter().map(|inst| &inst.op).collect();
    match ops.as_slice() {
        [Operation::Reshape(reshape), Operation::BroadcastTo(broadcast)] => {
            assert_eq!(reshape.new_shape.dims(), &[1, 3]);
            assert_eq!(broadcast.broadcast_dims, vec![0, 1]);
        }
        other => panic!("expected reshape + broadcast, got {other:?}"),
    }
}

#[test]
fn expand_rejects_lower_output_rank() {
    let mut gb = builder();
    let x = gb.parameter(DType::F32, &[2, 3]);
    assert!(matches!(
        expand(&mut gb, x, &[3]),
        Err(LoweringError::RankMismatch { op: "expand", actual: 1, .. })
    ));
}

#[test]
fn expand_surfaces_broadcast_conflict() {
    let mut gb = builder();
    let x = gb.parameter(DType::F32, &[2, 3]);
    assert_eq!(
        expand(&mut gb, x, &[2, 4]),
        Err(LoweringError::IncompatibleBroadcast {
            axis: 1,
            operand: 3,
            result: 4,
        })
    );
}

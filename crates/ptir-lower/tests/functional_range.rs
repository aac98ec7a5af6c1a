use ptir_lower::backend::spec::{DType, Literal, Operation};
use ptir_lower::ops::functional::{resize, slice, split, split_count};
use ptir_lower::{GraphBuilder, LoweringError, LoweringOptions};

fn builder() -> GraphBuilder {
    GraphBuilder::with_options(LoweringOptions::default())
}

#[test]
fn split_count_stops_at_first_overflow() {
    assert_eq!(split_count(10, &[3, 3, 3]), 3);
    assert_eq!(split_count(10, &[4, 4, 4]), 2);
    assert_eq!(split_count(10, &[11, 1]), 0);
    assert_eq!(split_count(10, &[5, 6, 1]), 1);
    assert_eq!(split_count(0, &[0, 0]), 2);
    assert_eq!(split_count(7, &[]), 0);
}

#[test]
fn split_emits_contiguous_pieces() {
    let mut gb = builder();
    let x = gb.parameter(DType::F32, &[3, 10]);
    let pieces = split(&mut gb, x, &[4, 4, 4], 1).expect("split");
    assert_eq!(pieces.len(), 2);
    for piece in &pieces {
        assert_eq!(gb.dims(*piece).expect("dims"), vec![3, 4]);
    }

    let bounds: Vec<(Vec<usize>, Vec<usize>)> = gb
        .instructions()
        .iter()
        .map(|inst| match &inst.op {
            Operation::Slice(spec) => {
                assert_eq!(spec.strides, vec![1, 1]);
                (spec.starts.clone(), spec.limits.clone())
            }
            other => panic!("expected slice, got {other:?}"),
        })
        .collect();
    assert_eq!(
        bounds,
        vec![(vec![0, 0], vec![3, 4]), (vec![0, 4], vec![3, 8])]
    );
}

#[test]
fn split_rejects_missing_axis() {
    let mut gb = builder();
    let x = gb.parameter(DType::F32, &[3, 10]);
    assert!(matches!(
        split(&mut gb, x, &[1], 2),
        Err(LoweringError::InvalidDimension { op: "split", dim: 2, .. })
    ));
}

#[test]
fn slice_converts_sizes_to_limits() {
    let mut gb = builder();
    let x = gb.parameter(DType::F32, &[5, 6]);
    let y = slice(&mut gb, x, &[1, 2], &[2, 3]).expect("slice");
    assert_eq!(gb.dims(y).expect("dims"), vec![2, 3]);
    match &gb.instructions()[0].op {
        Operation::Slice(spec) => {
            assert_eq!(spec.starts, vec![1, 2]);
            assert_eq!(spec.limits, vec![3, 5]);
            assert_eq!(spec.strides, vec![1, 1]);
        }
        other => panic!("expected slice, got {other:?}"),
    }
}

#[test]
fn slice_rejects_list_length_mismatch_and_overrun() {
    let mut gb = builder();
    let x = gb.parameter(DType::F32, &[5]);
    assert!(matches!(
        slice(&mut gb, x, &[1, 0], &[2]),
        Err(LoweringError::DimensionCountMismatch { op: "slice", left: 2, right: 1 })
    ));
    assert!(matches!(
        slice(&mut gb, x, &[4], &[2]),
        Err(LoweringError::IndexOutOfBounds { limit: 6, size: 5, .. })
    ));
}

#[test]
fn resize_grows_with_trailing_zero_padding() {
    let mut gb = builder();
    let x = gb.parameter(DType::F32, &[2, 3]);
    let y = resize(&mut gb, x, &[2, 5]).expect("resize");
    assert_eq!(gb.dims(y).expect("dims"), vec![2, 5]);

    let ops: Vec<&Operation> = gb.instructions().iter().map(|inst| &inst.op).collect();
    match ops.as_slice() {
        [Operation::Reshape(flat), Operation::Pad(pad), Operation::Reshape(out)] => {
            assert_eq!(flat.new_shape.dims(), &[6]);
            assert_eq!(pad.padding.len(), 1);
            assert_eq!((pad.padding[0].low, pad.padding[0].high), (0, 4));
            assert_eq!(pad.pad_value, Literal::Float(0.0));
            assert_eq!(out.new_shape.dims(), &[2, 5]);
        }
        other => panic!("unexpected resize lowering: {other:?}"),
    }
}

#[test]
fn resize_shrinks_by_truncating_flat_elements() {
    let mut gb = builder();
    let x = gb.parameter(DType::Si32, &[3, 3]);
    let y = resize(&mut gb, x, &[2, 2]).expect("resize");
    assert_eq!(gb.dims(y).expect("dims"), vec![2, 2]);
    assert_eq!(gb.dtype(y).expect("dtype"), DType::Si32);
    match &gb.instructions()[1].op {
        Operation::Slice(spec) => {
            assert_eq!(spec.starts, vec![0]);
            assert_eq!(spec.limits, vec![4]);
        }
        other => panic!("expected flat slice, got {other:?}"),
    }
}

#[test]
fn resize_with_equal_count_is_a_reshape() {
    let mut gb = builder();
    let x = gb.parameter(DType::F32, &[2, 3]);
    let y = resize(&mut gb, x, &[3, 2]).expect("resize");
    assert_eq!(gb.dims(y).expect("dims"), vec![3, 2]);
    assert_eq!(gb.instruction_count(), 1);
}

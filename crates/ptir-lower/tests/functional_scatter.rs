use ptir_lower::backend::spec::{DType, Literal, Operation, PaddingSpec};
use ptir_lower::ops::functional::{unselect, update_slice};
use ptir_lower::{GraphBuilder, LoweringError, LoweringOptions};

fn builder() -> GraphBuilder {
    GraphBuilder::with_options(LoweringOptions::default())
}

#[test]
fn update_slice_aligns_source_rank_and_emits_index_scalars() {
    let mut gb = builder();
    let target = gb.parameter(DType::F32, &[4, 6]);
    let source = gb.parameter(DType::F32, &[3]);
    let out = update_slice(&mut gb, target, source, &[1, 2]).expect("update_slice");
    assert_eq!(gb.dims(out).expect("dims"), vec![4, 6]);

    let body = gb.instructions();
    assert_eq!(body.len(), 4);
    match &body[0].op {
        Operation::Reshape(spec) => assert_eq!(spec.new_shape.dims(), &[1, 3]),
        other => panic!("expected reshape, got {other:?}"),
    }
    for inst in &body[1..3] {
        match &inst.op {
            Operation::Constant(literal) => {
                assert_eq!(literal.spec.dtype, DType::Si32);
                assert_eq!(literal.spec.rank(), 0);
            }
            other => panic!("expected index constant, got {other:?}"),
        }
    }
    match &body[3].op {
        Operation::DynamicUpdateSlice(spec) => assert_eq!(spec.sizes, vec![1, 3]),
        other => panic!("expected dynamic_update_slice, got {other:?}"),
    }
    assert_eq!(body[3].operands.len(), 4);
}

#[test]
fn update_slice_honours_configured_index_dtype() {
    let options = LoweringOptions::default().with_index_dtype(DType::Si64);
    let mut gb = GraphBuilder::with_options(options);
    let target = gb.parameter(DType::F32, &[4]);
    let source = gb.parameter(DType::F32, &[2]);
    update_slice(&mut gb, target, source, &[2]).expect("update_slice");
    match &gb.instructions()[1].op {
        Operation::Constant(literal) => {
            assert_eq!(literal.spec.dtype, DType::Si64);
            assert_eq!(literal.bytes.as_ref(), &2i64.to_le_bytes()[..]);
        }
        other => panic!("expected index constant, got {other:?}"),
    }
}

#[test]
fn update_slice_rejects_higher_rank_source() {
    let mut gb = builder();
    let target = gb.parameter(DType::F32, &[4]);
    let source = gb.parameter(DType::F32, &[1, 4]);
    assert!(matches!(
        update_slice(&mut gb, target, source, &[0]),
        Err(LoweringError::RankMismatch { op: "update_slice", actual: 2, .. })
    ));
    assert_eq!(gb.instruction_count(), 0);
}

#[test]
fn update_slice_rejects_offsets_outside_index_dtype() {
    let mut gb = builder();
    let target = gb.parameter(DType::F32, &[8]);
    let source = gb.parameter(DType::F32, &[2]);
    let too_wide = i32::MAX as usize + 1;
    match update_slice(&mut gb, target, source, &[too_wide]) {
        Err(LoweringError::InvalidAttribute { op: "update_slice", detail }) => {
            assert!(detail.contains("Si32"), "{detail}");
        }
        other => panic!("expected invalid offset, got {other:?}"),
    }
    assert_eq!(gb.instruction_count(), 0);

    let options = LoweringOptions::default().with_index_dtype(DType::Si64);
    let mut gb = GraphBuilder::with_options(options);
    let target = gb.parameter(DType::F32, &[8]);
    let source = gb.parameter(DType::F32, &[2]);
    update_slice(&mut gb, target, source, &[too_wide]).expect("offset fits si64");
    match &gb.instructions()[1].op {
        Operation::Constant(literal) => {
            assert_eq!(literal.bytes.as_ref(), &(too_wide as i64).to_le_bytes()[..]);
        }
        other => panic!("expected index constant, got {other:?}"),
    }
}

#[test]
fn update_slice_rejects_non_integer_index_dtype() {
    let options = LoweringOptions::default().with_index_dtype(DType::F32);
    let mut gb = GraphBuilder::with_options(options);
    let target = gb.parameter(DType::F32, &[4]);
    let source = gb.parameter(DType::F32, &[2]);
    assert!(matches!(
        update_slice(&mut gb, target, source, &[0]),
        Err(LoweringError::InvalidAttribute { op: "update_slice", .. })
    ));
    assert_eq!(gb.instruction_count(), 0);
}

#[test]
fn unselect_fast_path_returns_source() {
    let mut gb = builder();
    let target = gb.parameter(DType::F32, &[5]);
    let source = gb.parameter(DType::F32, &[5]);
    let out = unselect(&mut gb, target, source, 0, 0, 5, 1).expect("full-axis unselect");
    assert_eq!(out, source);
    assert_eq!(gb.instruction_count(), 0);
}

#[test]
fn unselect_fast_path_rejects_partial_geometry() {
    let mut gb = builder();
    let target = gb.parameter(DType::F32, &[5]);
    let source = gb.parameter(DType::F32, &[5]);
    for (start, end, stride) in [(1, 5, 1), (0, 5, 2), (0, 4, 1)] {
        assert!(matches!(
            unselect(&mut gb, target, source, 0, start, end, stride),
            Err(LoweringError::ShapeMismatch { op: "unselect", .. })
        ));
    }
    assert_eq!(gb.instruction_count(), 0);
}

#[test]
fn unselect_general_path_pads_source_and_mask() {
    let mut gb = builder();
    let target = gb.parameter(DType::F32, &[3, 5]);
    let source = gb.parameter(DType::F32, &[3, 2]);
    let out = unselect(&mut gb, target, source, 1, 1, 5, 2).expect("strided unselect");
    assert_eq!(gb.dims(out).expect("dims"), vec![3, 5]);

    let expected = vec![PaddingSpec::none(), PaddingSpec::new(1, 1, 1)];
    let pads: Vec<(&Vec<PaddingSpec>, Literal)> = gb
        .instructions()
        .iter()
        .filter_map(|inst| match &inst.op {
            Operation::Pad(spec) => Some((&spec.padding, spec.pad_value)),
            _ => None,
        })
        .collect();
    assert_eq!(pads.len(), 2);
    assert_eq!(pads[0], (&expected, Literal::Float(0.0)));
    assert_eq!(pads[1], (&expected, Literal::I1(false)));

    let last = gb.instructions().last().expect("instruction");
    assert!(matches!(last.op, Operation::Select));
    assert_eq!(gb.dtype(out).expect("dtype"), DType::F32);
}

#[test]
fn unselect_validates_before_emitting() {
    let mut gb = builder();
    let target = gb.parameter(DType::F32, &[3, 5]);
    let source = gb.parameter(DType::F32, &[3, 2]);
    let wrong_rank = gb.parameter(DType::F32, &[2]);
    let wrong_other = gb.parameter(DType::F32, &[2, 2]);
    let wrong_dtype = gb.parameter(DType::Si32, &[3, 2]);

    assert!(matches!(
        unselect(&mut gb, target, source, 2, 0, 5, 1),
        Err(LoweringError::InvalidDimension { op: "unselect", dim: 2, .. })
    ));
    assert!(matches!(
        unselect(&mut gb, target, wrong_rank, 0, 0, 3, 1),
        Err(LoweringError::RankMismatch { op: "unselect", .. })
    ));
    assert!(matches!(
        unselect(&mut gb, target, source, 1, 0, 5, 0),
        Err(LoweringError::InvalidAttribute { op: "unselect", .. })
    ));
    assert!(matches!(
        unselect(&mut gb, target, wrong_other, 1, 0, 5, 2),
        Err(LoweringError::ShapeMismatch { op: "unselect", .. })
    ));
    // Two elements from 2 with stride 3 need slots 2 and 5 on an axis of 5.
    assert!(matches!(
        unselect(&mut gb, target, source, 1, 2, 5, 3),
        Err(LoweringError::ShapeMismatch { op: "unselect", .. })
    ));
    assert!(matches!(
        unselect(&mut gb, target, wrong_dtype, 1, 0, 5, 2),
        Err(LoweringError::ShapeMismatch { op: "unselect", .. })
    ));
    assert_eq!(gb.instruction_count(), 0);
}

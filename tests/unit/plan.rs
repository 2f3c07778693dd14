use super::*;

fn comp(duration: u64) -> CompositionSpec {
    CompositionSpec {
        width: 1920,
        height: 1080,
        fps: 30.0,
        duration_in_frames: duration,
    }
}

fn numbers(plan: &RenderPlan) -> Vec<u64> {
    plan.frames().iter().map(|f| f.0).collect()
}

#[test]
fn stride_renumbers_from_zero() {
    let plan = RenderPlan::build(&comp(20), None, 5).unwrap();
    assert_eq!(numbers(&plan), vec![0, 5, 10, 15]);
    assert_eq!(plan.numbering_mode(), NumberingMode::FromZero);
    assert_eq!(plan.output_indices().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    assert_eq!(plan.pad_width(), 1);
    assert_eq!(plan.first_output_index(), 0);
    assert_eq!(plan.naming_template(ImageFormat::Png), "element-%01d.png");
}

#[test]
fn unit_stride_keeps_actual_frame_numbers() {
    let plan = RenderPlan::build(&comp(20), Some(FrameRange::Span([0, 19])), 1).unwrap();
    assert_eq!(plan.len(), 20);
    assert_eq!(plan.numbering_mode(), NumberingMode::ActualFrameNumbers);
    assert_eq!(
        plan.output_indices().collect::<Vec<_>>(),
        numbers(&plan)
    );
    assert_eq!(plan.pad_width(), 2);
    assert_eq!(plan.file_name(7, ImageFormat::Jpeg), "element-07.jpeg");
}

#[test]
fn stride_starts_at_first_in_range_frame() {
    let plan = RenderPlan::build(&comp(100), Some(FrameRange::Span([3, 20])), 4).unwrap();
    assert_eq!(numbers(&plan), vec![3, 7, 11, 15, 19]);
    assert_eq!(plan.first_output_index(), 0);
}

#[test]
fn sub_range_with_unit_stride_starts_at_range_start() {
    let plan = RenderPlan::build(&comp(200), Some(FrameRange::Span([95, 104])), 1).unwrap();
    assert_eq!(plan.first_output_index(), 95);
    assert_eq!(plan.pad_width(), 3);
    assert_eq!(plan.file_name(95, ImageFormat::Png), "element-095.png");
}

#[test]
fn single_frame_range() {
    let plan = RenderPlan::build(&comp(30), Some(FrameRange::Single(12)), 1).unwrap();
    assert_eq!(numbers(&plan), vec![12]);
    assert_eq!(plan.output_index(0), 12);
}

#[test]
fn invalid_inputs_are_configuration_errors() {
    let cases = [
        RenderPlan::build(&comp(20), None, 0),
        RenderPlan::build(&comp(0), None, 1),
        RenderPlan::build(&comp(20), Some(FrameRange::Span([5, 2])), 1),
        RenderPlan::build(&comp(20), Some(FrameRange::Span([0, 20])), 1),
        RenderPlan::build(&comp(20), Some(FrameRange::Single(20)), 1),
    ];
    for case in cases {
        assert!(matches!(case, Err(FramecastError::Configuration(_))));
    }

    let mut bad = comp(20);
    bad.fps = 0.0;
    assert!(RenderPlan::build(&bad, None, 1).is_err());
    bad = comp(20);
    bad.width = 0;
    assert!(RenderPlan::build(&bad, None, 1).is_err());
}

#[test]
fn frame_range_deserializes_from_number_or_pair() {
    let single: FrameRange = serde_json::from_str("4").unwrap();
    assert_eq!(single, FrameRange::Single(4));
    let span: FrameRange = serde_json::from_str("[1, 9]").unwrap();
    assert_eq!(span, FrameRange::Span([1, 9]));
}

use crate::layers::{
    zeros_nchw, AdaptiveAvgPool2d, AvgPool2d, BatchNorm2d, Conv2d, Conv2dBuilder, Dropout,
    DropoutKind, Layer, Linear, MaxPool2d, PRelu, Relu,
};
use ndarray::{Array2, Array4};
use crate::model::{Module, Residual};
use crate::profiler::{format_count, measure_model, ComplexityReport, Profiler};
use crate::sequential;

fn small_cnn() -> Module {
    sequential![
        Conv2d::new(3, 8, (3, 3), (1, 1), (1, 1)),
        BatchNorm2d::new(8),
        Relu::new(),
        MaxPool2d::new((2, 2), None),
        Residual::new(sequential![
            Conv2d::new(8, 8, (3, 3), (1, 1), (1, 1)),
            PRelu::new(8, 0.25),
        ]),
        AvgPool2d::new(2, None, 0),
        Dropout::new(DropoutKind::Dropout2d, 0.2).unwrap(),
        AdaptiveAvgPool2d::global(),
        Layer::Flatten,
        Linear::new(8, 10),
    ]
    .into()
}

#[test]
fn test_single_conv_matches_formula() {
    let conv = Conv2dBuilder::new()
        .in_channels(3)
        .out_channels(1)
        .kernel_size((3, 3))
        .build()
        .unwrap();
    let model: Module = conv.into();
    assert_eq!(measure_model(&model, 5, 5).unwrap(), (243, 27 + 1));
}

#[test]
fn test_adaptive_pool_alone() {
    let model: Module = AdaptiveAvgPool2d::new((3, 3)).into();
    assert_eq!(measure_model(&model, 5, 5).unwrap(), (75, 0));
}

#[test]
fn test_avg_pool_on_non_square_input() {
    let model: Module = AvgPool2d::new(2, None, 0).into();
    assert_eq!(measure_model(&model, 8, 6).unwrap(), (3 * 4 * 4 * 4, 0));
}

#[test]
fn test_small_cnn_breakdown() {
    let report = Profiler::new().profile(&small_cnn(), 16, 16).unwrap();

    let conv1 = 3 * 8 * 9 * 16 * 16;
    let bn = 16;
    let relu = 8 * 16 * 16;
    let conv2 = 8 * 8 * 9 * 8 * 8;
    let prelu = 8 * 8 * 8;
    let avg = 8 * 4 * 4 * 4;
    let gap = 8 * 4 * 4;
    let fc = 8 * 10 + 10;
    assert_eq!(report.ops, (conv1 + bn + relu + conv2 + prelu + avg + gap + fc) as u64);

    let params = (3 * 8 * 9 + 8) + 16 + (8 * 8 * 9 + 8) + 8 + (8 * 10 + 10);
    assert_eq!(report.params, params as u64);
    assert_eq!(report.params, small_cnn().num_parameters() as u64);

    let paths: Vec<&str> = report.layers.iter().map(|l| l.path.as_str()).collect();
    assert_eq!(paths, vec!["0", "1", "2", "3", "4.body.0", "4.body.1", "5", "6", "7", "8", "9"]);
    assert_eq!(report.layers[4].input_shape, vec![1, 8, 8, 8]);
    assert_eq!(report.layers[3].ops, 0);
    assert!(report.layers.iter().all(|l| !l.pruned));
}

#[test]
fn test_masked_layers_are_measured_at_full_size() {
    let conv = Conv2d::new(3, 4, (3, 3), (1, 1), (1, 1));
    let conv = conv.with_mask(Array4::zeros((4, 3, 3, 3))).unwrap();
    let linear = Linear::new(4, 2).with_mask(Array2::zeros((2, 4))).unwrap();
    let model: Module = sequential![
        conv,
        AdaptiveAvgPool2d::global(),
        Layer::Flatten,
        linear,
    ]
    .into();

    let report = Profiler::new().profile(&model, 6, 6).unwrap();
    let pruned: Vec<&str> = report
        .layers
        .iter()
        .filter(|l| l.pruned)
        .map(|l| l.path.as_str())
        .collect();
    assert_eq!(pruned, vec!["0", "3"]);
    assert_eq!(report.layers.len(), 4);

    assert_eq!(report.layers[0].kind, "Conv2d");
    assert_eq!(report.layers[0].params, 4 * 3 * 9 + 4);
    assert_eq!(report.layers[0].ops, 3 * 4 * 9 * 6 * 6);
    assert_eq!(report.layers[3].kind, "Linear");
    assert_eq!(report.layers[3].params, 2 * 4 + 2);
    assert_eq!(report.layers[3].ops, 2 * 4 + 2);
    assert_eq!(report.params, (4 * 3 * 9 + 4) + (2 * 4 + 2));

    assert!(report.to_string().contains("Conv2d (pruned)"));
}

#[test]
fn test_totals_are_running_sums() {
    let report = Profiler::new().profile(&small_cnn(), 16, 16).unwrap();
    let ops: u64 = report.layers.iter().map(|l| l.ops).sum();
    let params: u64 = report.layers.iter().map(|l| l.params).sum();
    assert_eq!(report.totals(), (ops, params));
}

#[test]
fn test_profiling_is_idempotent_and_transparent() {
    let model = small_cnn();
    let input = zeros_nchw(1, 3, 16, 16) + 0.5;
    let before = model.forward(&input).unwrap();

    let first = measure_model(&model, 16, 16).unwrap();
    let second = measure_model(&model, 16, 16).unwrap();
    let after = model.forward(&input).unwrap();

    assert_eq!(first, second);
    assert_eq!(before, after);
}

#[test]
fn test_report_json_and_display() {
    let report = Profiler::new().profile(&small_cnn(), 8, 8).unwrap();
    let json = report.to_json().unwrap();
    assert_eq!(ComplexityReport::from_json(&json).unwrap(), report);

    let table = report.to_string();
    assert!(table.contains("4.body.0"));
    assert!(table.contains("Total"));
}

#[test]
fn test_format_count() {
    assert_eq!(format_count(999), "999");
    assert_eq!(format_count(1_500), "1.50K");
    assert_eq!(format_count(2_340_000), "2.34M");
    assert_eq!(format_count(7_000_000_000), "7.00G");
}

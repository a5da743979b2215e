use nnmeter::{
    layers::{
        AdaptiveAvgPool2d, BatchNorm2d, Conv2d, Conv2dBuilder, ConvTranspose2d, Dropout,
        DropoutKind, Layer, Linear, Relu,
    },
    model::{Module, Residual},
    optimizer::{get_scheduler, SchedulePolicy, SchedulerConfig, SGD},
    profiler::{measure_model, Profiler},
    sequential,
};

fn basic_block(channels: usize) -> Residual {
    Residual::new(sequential![
        Conv2d::new(channels, channels, (3, 3), (1, 1), (1, 1)),
        BatchNorm2d::new(channels),
        Relu::new(),
        Conv2d::new(channels, channels, (3, 3), (1, 1), (1, 1)),
        BatchNorm2d::new(channels),
    ])
}

fn downsample_block(in_channels: usize, out_channels: usize) -> Residual {
    let projection = Conv2dBuilder::new()
        .in_channels(in_channels)
        .out_channels(out_channels)
        .kernel_size((1, 1))
        .stride((2, 2))
        .bias(false)
        .build()
        .unwrap();

    Residual::new(sequential![
        Conv2d::new(in_channels, out_channels, (3, 3), (2, 2), (1, 1)),
        BatchNorm2d::new(out_channels),
        Relu::new(),
    ])
    .with_shortcut(projection)
}

fn tiny_resnet() -> Module {
    nnmeter::model::Sequential::new()
        .add_named("stem", sequential![
            Conv2d::new(3, 8, (3, 3), (1, 1), (1, 1)),
            BatchNorm2d::new(8),
            Relu::new(),
        ])
        .add_named("layer1", basic_block(8))
        .add_named("layer2", downsample_block(8, 16))
        .add_named("head", sequential![
            AdaptiveAvgPool2d::global(),
            Layer::Flatten,
            Dropout::new(DropoutKind::Dropout, 0.5).unwrap(),
            Linear::new(16, 10),
        ])
        .into()
}

#[test]
fn test_end_to_end_profile() {
    let model = tiny_resnet();
    let report = Profiler::new().profile(&model, 32, 32).unwrap();

    assert_eq!(report.params, model.num_parameters() as u64);
    assert!(report.layers.iter().any(|l| l.path == "layer2.shortcut"));

    let shortcut = report.layers.iter().find(|l| l.path == "layer2.shortcut").unwrap();
    // 1x1 stride-2 projection on 32x32
    assert_eq!(shortcut.ops, 8 * 16 * 16 * 16);
    assert_eq!(shortcut.input_shape, vec![1, 8, 32, 32]);

    let head = report.layers.iter().find(|l| l.path == "head.3").unwrap();
    assert_eq!(head.kind, "Linear");
    assert_eq!(head.ops, 16 * 10 + 10);
}

#[test]
fn test_profile_scales_with_resolution() {
    let model = tiny_resnet();
    let (small_ops, small_params) = measure_model(&model, 16, 16).unwrap();
    let (large_ops, large_params) = measure_model(&model, 32, 32).unwrap();

    assert_eq!(small_params, large_params);
    assert!(large_ops > 3 * small_ops);
}

#[test]
fn test_upsampling_decoder() {
    let model: Module = sequential![
        Conv2d::new(3, 4, (3, 3), (2, 2), (1, 1)),
        Relu::new(),
        ConvTranspose2d::new(4, 3, (2, 2), (2, 2), (0, 0)),
    ]
    .into();

    let output = model.forward(&nnmeter::layers::zeros_nchw(1, 3, 8, 8)).unwrap();
    assert_eq!(output.shape(), &[1, 3, 8, 8]);

    let report = Profiler::new().profile(&model, 8, 8).unwrap();
    // The transposed conv is counted with the forward-conv output size: (4 - 2) / 2 + 1
    assert_eq!(report.layers[2].ops, 4 * 3 * 4 * 2 * 2);
}

#[test]
fn test_schedule_drives_optimizer_over_training() {
    let config = SchedulerConfig::new(SchedulePolicy::WarmPolyCycle, 40, 0.1);
    let mut scheduler = get_scheduler(&config).unwrap();
    let mut optimizer = SGD::new(0.1);

    let mut rates = Vec::new();
    for epoch in 0..40 {
        rates.push(scheduler.apply(epoch, &mut optimizer).unwrap());
    }

    // restart_cycle = 20, warmup_cycle = 1
    assert!((rates[0] - 0.1).abs() < 1e-6);
    assert!(rates[19] < rates[1]);
    assert!(rates[20] > rates[19]);
    assert!(rates.iter().all(|&lr| lr >= 0.0));
    assert_eq!(optimizer.learning_rate, rates[39]);
}

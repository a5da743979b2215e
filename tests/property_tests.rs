#[cfg(test)]
mod property_tests {
    use proptest::prelude::*;
    use nnmeter::layers::{zeros_nchw, AdaptiveAvgPool2d, Conv2dBuilder, Relu};
    use nnmeter::model::Module;
    use nnmeter::optimizer::{WarmupPoly, WarmupPolyCycle};
    use nnmeter::profiler::{measure_model, Profiler};
    use nnmeter::sequential;

    // Strategy for generating valid conv configurations
    fn conv_strategy() -> impl Strategy<Value = (usize, usize, usize, usize, usize)> {
        (1usize..=4, 1usize..=4, 1usize..=3, 1usize..=2, 0usize..=1)
            .prop_map(|(groups, per_group, kernel, stride, padding)| {
                (groups, per_group, kernel * 2 - 1, stride, padding)
            })
    }

    proptest! {
        #[test]
        fn test_conv_ops_match_closed_form(
            (groups, per_group, kernel, stride, padding) in conv_strategy(),
            size in 5usize..12,
        ) {
            let channels = groups * per_group;
            let conv = Conv2dBuilder::new()
                .in_channels(channels)
                .out_channels(channels)
                .kernel_size((kernel, kernel))
                .stride((stride, stride))
                .padding((padding, padding))
                .groups(groups)
                .build()
                .unwrap();
            let model: Module = conv.into();

            let report = Profiler::new().with_channels(channels).profile(&model, size, size).unwrap();
            let out = (size + 2 * padding - kernel) / stride + 1;
            let expected = channels * channels * kernel * kernel * out * out / groups;
            prop_assert_eq!(report.ops, expected as u64);

            // The measured output size is the real one
            let output = model.forward(&zeros_nchw(1, channels, size, size)).unwrap();
            prop_assert_eq!(output.shape(), &[1, channels, out, out][..]);
        }

        #[test]
        fn test_profile_is_repeatable(height in 3usize..20, width in 3usize..20) {
            let model: Module = sequential![
                Conv2dBuilder::new().in_channels(3).out_channels(4).kernel_size((3, 3)).padding((1, 1)).build().unwrap(),
                Relu::new(),
                AdaptiveAvgPool2d::new((2, 2)),
            ].into();

            let first = measure_model(&model, height, width).unwrap();
            let second = measure_model(&model, height, width).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn test_warmup_poly_non_negative(
            total in 1usize..300,
            warmup_ratio in 0.0f64..0.9,
            epoch_frac in 0.0f64..1.0,
        ) {
            let scheduler = WarmupPoly::new(0.1, total, warmup_ratio, 0.9);
            let epoch = (epoch_frac * total as f64) as usize;
            let lr = scheduler.get_lr(epoch).unwrap();
            prop_assert!(lr >= 0.0 && lr <= 0.1 + 1e-6);
        }

        #[test]
        fn test_cycle_boundaries_stay_ordered(
            total in 4usize..200,
            warmup_ratio in 0.0f64..1.0,
            restart_ratio in 0.25f64..1.0,
        ) {
            let mut scheduler = WarmupPolyCycle::new(0.1, total, warmup_ratio, 0.9, restart_ratio);
            prop_assume!(scheduler.restart_cycle() > scheduler.warmup_cycle());

            for epoch in 0..total {
                let lr = scheduler.get_lr(epoch).unwrap();
                prop_assert!(scheduler.warmup_ep() <= scheduler.restart_ep());
                prop_assert!(lr >= 0.0);
                prop_assert_eq!(lr, scheduler.lr_at(epoch).unwrap());
            }
        }
    }
}

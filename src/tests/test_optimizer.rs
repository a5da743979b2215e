use crate::optimizer::{
    get_scheduler, LrScheduler, Optimizer, SchedulePolicy, Scheduler, SchedulerConfig, SGD,
};

#[test]
fn test_factory_builds_every_policy() {
    for policy in [
        SchedulePolicy::MultiStep,
        SchedulePolicy::Step,
        SchedulePolicy::Poly,
        SchedulePolicy::WarmPoly,
        SchedulePolicy::WarmPolyCycle,
    ] {
        let config = SchedulerConfig::new(policy, 30, 0.1);
        let mut scheduler = get_scheduler(&config).unwrap();
        for epoch in 0..30 {
            let lr = scheduler.lr_for_epoch(epoch).unwrap();
            assert!(lr >= 0.0 && lr.is_finite(), "{} gave {} at {}", policy, lr, epoch);
        }
    }
}

#[test]
fn test_multistep_factory_milestones() {
    let config = SchedulerConfig::new(SchedulePolicy::MultiStep, 12, 0.1);
    match get_scheduler(&config).unwrap() {
        Scheduler::MultiStep(s) => assert_eq!(s.milestones(), &[6, 10]),
        other => panic!("unexpected scheduler {:?}", other),
    }
}

#[test]
fn test_step_factory_with_nine_epochs() {
    let config = SchedulerConfig::new(SchedulePolicy::Step, 9, 0.1);
    let mut scheduler = get_scheduler(&config).unwrap();
    let rates: Vec<f32> = (0..9).map(|e| scheduler.lr_for_epoch(e).unwrap()).collect();

    assert_eq!(rates[2], rates[0]);
    assert!(rates[3] < rates[2]);
    assert_eq!(rates[5], rates[3]);
    assert!(rates[6] < rates[5]);
    assert!((rates[8] - 0.025).abs() < 1e-6);
}

#[test]
fn test_step_factory_rejects_short_runs() {
    let config = SchedulerConfig::new(SchedulePolicy::Step, 2, 0.1);
    assert!(get_scheduler(&config).is_err());
}

#[test]
fn test_stepped_scheduler_does_not_rewind() {
    let config = SchedulerConfig::new(SchedulePolicy::Step, 9, 0.1);
    let mut scheduler = get_scheduler(&config).unwrap();
    let late = scheduler.lr_for_epoch(7).unwrap();
    assert_eq!(scheduler.lr_for_epoch(1).unwrap(), late);
}

#[test]
fn test_apply_sets_optimizer_rate() {
    let config = SchedulerConfig::new(SchedulePolicy::WarmPoly, 100, 0.1);
    let mut scheduler = get_scheduler(&config).unwrap();
    let mut sgd = SGD::new(0.0);

    let lr = scheduler.apply(0, &mut sgd).unwrap();
    assert_eq!(sgd.learning_rate(), lr);
    assert!((lr - 0.1 * 0.2f32.powf(0.9)).abs() < 1e-6);
}

#[test]
fn test_trait_apply() {
    let config = SchedulerConfig::new(SchedulePolicy::Poly, 10, 0.1);
    if let Scheduler::Poly(mut poly) = get_scheduler(&config).unwrap() {
        poly.step();
        let mut sgd = SGD::new(0.0);
        poly.apply(&mut sgd);
        assert!((sgd.learning_rate() - 0.1).abs() < 1e-7);
    } else {
        panic!("expected poly scheduler");
    }
}

#[test]
fn test_config_from_json_defaults() {
    let config = SchedulerConfig::from_json(
        r#"{ "policy": "warmpolycycle", "epochs": 100, "init_lr": 0.01 }"#,
    )
    .unwrap();
    assert_eq!(config.policy, SchedulePolicy::WarmPolyCycle);
    assert_eq!(config.restart_ratio, 0.5);
    assert_eq!(config.warmup_ratio, 0.05);
    assert_eq!(config.poly_pow, 0.9);

    let round_trip = SchedulerConfig::from_json(&config.to_json().unwrap()).unwrap();
    assert_eq!(round_trip, config);
}

#[test]
fn test_config_rejects_unknown_policy() {
    let result = SchedulerConfig::from_json(r#"{ "policy": "cosine", "epochs": 10, "init_lr": 0.1 }"#);
    assert!(result.is_err());
}

#[test]
fn test_cycle_factory_uses_restart_ratio() {
    let config = SchedulerConfig::new(SchedulePolicy::WarmPolyCycle, 100, 0.1).with_restart_ratio(0.25);
    match get_scheduler(&config).unwrap() {
        Scheduler::WarmupPolyCycle(s) => {
            assert_eq!(s.restart_cycle(), 25);
            assert_eq!(s.warmup_cycle(), 1);
        }
        other => panic!("unexpected scheduler {:?}", other),
    }
}

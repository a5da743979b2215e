//! Learning rate schedules driven by the epoch number
//!
//! Two families live here:
//!
//! - step-protocol schedules ([`MultiStepLr`], [`StepLr`], [`PolyLr`]) that
//!   the training loop advances with [`LrScheduler::step`] once per epoch;
//! - epoch-driven schedules ([`WarmupPoly`], [`WarmupPolyCycle`]) queried
//!   with `get_lr(epoch)`.
//!
//! [`get_scheduler`] builds any of them from a [`SchedulerConfig`], and
//! [`Scheduler`] drives them all through one epoch-indexed interface.

use std::fmt;
use std::str::FromStr;
use log::{info, warn};
use serde::{Serialize, Deserialize};
use crate::error::{Error, Result};
use super::Optimizer;

/// Schedules advanced by an external stepping loop
pub trait LrScheduler {
    /// Learning rate for the current epoch
    fn get_lr(&self) -> f32;

    /// Advance by one epoch
    fn step(&mut self);

    /// Epoch the scheduler currently sits at (0 right after construction)
    fn last_epoch(&self) -> usize;

    /// Write the current learning rate into `optimizer`
    fn apply<O: Optimizer>(&self, optimizer: &mut O)
    where
        Self: Sized,
    {
        optimizer.set_learning_rate(self.get_lr());
    }
}

/// Multiply the rate by `gamma` each time a milestone epoch is reached
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MultiStepLr {
    milestones: Vec<usize>,
    gamma: f32,
    last_epoch: usize,
    lr: f32,
}

impl MultiStepLr {
    pub fn new(base_lr: f32, milestones: Vec<usize>, gamma: f32) -> Self {
        let mut scheduler = MultiStepLr {
            milestones,
            gamma,
            last_epoch: 0,
            lr: base_lr,
        };
        // A milestone at epoch 0 already applies at construction
        scheduler.decay_at_milestone();
        scheduler
    }

    pub fn milestones(&self) -> &[usize] {
        &self.milestones
    }

    fn decay_at_milestone(&mut self) {
        let hits = self.milestones.iter().filter(|&&m| m == self.last_epoch).count();
        if hits > 0 {
            self.lr *= self.gamma.powi(hits as i32);
        }
    }
}

impl LrScheduler for MultiStepLr {
    fn get_lr(&self) -> f32 {
        self.lr
    }

    fn step(&mut self) {
        self.last_epoch += 1;
        self.decay_at_milestone();
    }

    fn last_epoch(&self) -> usize {
        self.last_epoch
    }
}

/// Step decay: `base_lr * gamma^(epoch / step_size)`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepLr {
    base_lr: f32,
    step_size: usize,
    gamma: f32,
    last_epoch: usize,
}

impl StepLr {
    pub fn new(base_lr: f32, step_size: usize, gamma: f32) -> Result<Self> {
        if step_size == 0 {
            return Err(Error::invalid_parameter("step_size", "step size must be positive"));
        }
        Ok(StepLr {
            base_lr,
            step_size,
            gamma,
            last_epoch: 0,
        })
    }

    pub fn step_size(&self) -> usize {
        self.step_size
    }
}

impl LrScheduler for StepLr {
    fn get_lr(&self) -> f32 {
        let num_decays = (self.last_epoch / self.step_size) as i32;
        self.base_lr * self.gamma.powi(num_decays)
    }

    fn step(&mut self) {
        self.last_epoch += 1;
    }

    fn last_epoch(&self) -> usize {
        self.last_epoch
    }
}

/// Polynomial decay: `base_lr * (1 - (epoch - 1) / epochs)^power`
///
/// The factor is above 1 at epoch 0, exactly 1 at epoch 1 and reaches 0 at
/// `epochs + 1`; it stays at 0 afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolyLr {
    base_lr: f32,
    epochs: usize,
    power: f64,
    last_epoch: usize,
}

impl PolyLr {
    pub fn new(base_lr: f32, epochs: usize, power: f64) -> Result<Self> {
        if epochs == 0 {
            return Err(Error::invalid_parameter("epochs", "epoch count must be positive"));
        }
        Ok(PolyLr {
            base_lr,
            epochs,
            power,
            last_epoch: 0,
        })
    }
}

impl LrScheduler for PolyLr {
    fn get_lr(&self) -> f32 {
        let progress = (self.last_epoch as f64 - 1.0) / self.epochs as f64;
        let factor = (1.0 - progress).max(0.0).powf(self.power);
        (f64::from(self.base_lr) * factor) as f32
    }

    fn step(&mut self) {
        self.last_epoch += 1;
    }

    fn last_epoch(&self) -> usize {
        self.last_epoch
    }
}

// `int(ratio * count)`
fn scaled_epochs(ratio: f64, count: usize) -> usize {
    (ratio * count as f64) as usize
}

// Shared warmup/decay shape: power ramp below `warmup_ep`, polynomial decay
// from `warmup_ep` to `end_ep`.
fn warmup_poly_lr(init_lr: f32, poly_pow: f64, epoch: usize, warmup_ep: usize, end_ep: usize) -> Result<f32> {
    let factor = if epoch < warmup_ep {
        ((epoch + 1) as f64 / warmup_ep as f64).powf(poly_pow)
    } else {
        let span = end_ep
            .checked_sub(warmup_ep)
            .filter(|&span| span > 0)
            .ok_or_else(|| {
                Error::NumericalError(format!(
                    "empty decay span: warmup ends at {} and decay at {}",
                    warmup_ep, end_ep
                ))
            })?;
        let progress = (epoch - warmup_ep) as f64 / span as f64;
        (1.0 - progress).max(0.0).powf(poly_pow)
    };
    Ok((f64::from(init_lr) * factor) as f32)
}

/// Warmup for `warmup_ratio * total_ep` epochs, then polynomial decay to zero
/// at `total_ep`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WarmupPoly {
    init_lr: f32,
    total_ep: usize,
    warmup_ep: usize,
    poly_pow: f64,
}

impl WarmupPoly {
    pub fn new(init_lr: f32, total_ep: usize, warmup_ratio: f64, poly_pow: f64) -> Self {
        let warmup_ep = scaled_epochs(warmup_ratio, total_ep);
        info!("warm up learning rate until {}", warmup_ep);
        WarmupPoly {
            init_lr,
            total_ep,
            warmup_ep,
            poly_pow,
        }
    }

    pub fn warmup_ep(&self) -> usize {
        self.warmup_ep
    }

    /// Learning rate for `epoch`; fails when the decay span is empty
    pub fn get_lr(&self, epoch: usize) -> Result<f32> {
        warmup_poly_lr(self.init_lr, self.poly_pow, epoch, self.warmup_ep, self.total_ep)
    }
}

/// [`WarmupPoly`] restarted every `restart_ratio * total_ep` epochs.
///
/// [`get_lr`](WarmupPolyCycle::get_lr) keeps the current cycle's boundaries as
/// state and moves them forward when called with exactly the restart epoch.
/// Calls must therefore come in non-decreasing epoch order without skipping a
/// restart epoch; an earlier epoch queried later is computed against the
/// advanced boundaries. [`lr_at`](WarmupPolyCycle::lr_at) derives the
/// boundaries from the epoch instead and agrees with `get_lr` for an
/// in-order sweep.
///
/// The warmup ramp is `((epoch + 1) / warmup_ep)^poly_pow` with absolute
/// epochs, so warmups after the first cycle start close to `init_lr`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WarmupPolyCycle {
    init_lr: f32,
    total_ep: usize,
    poly_pow: f64,
    restart_cycle: usize,
    warmup_cycle: usize,
    restart_ep: usize,
    warmup_ep: usize,
}

impl WarmupPolyCycle {
    pub fn new(init_lr: f32, total_ep: usize, warmup_ratio: f64, poly_pow: f64, restart_ratio: f64) -> Self {
        let restart_cycle = scaled_epochs(restart_ratio, total_ep);
        let warmup_cycle = scaled_epochs(warmup_ratio, restart_cycle);
        info!("restart warmup learning rate from {}", restart_cycle);
        info!("warm up learning rate until {}", warmup_cycle);

        WarmupPolyCycle {
            init_lr,
            total_ep,
            poly_pow,
            restart_cycle,
            warmup_cycle,
            restart_ep: restart_cycle,
            warmup_ep: warmup_cycle,
        }
    }

    pub fn total_ep(&self) -> usize {
        self.total_ep
    }

    pub fn restart_cycle(&self) -> usize {
        self.restart_cycle
    }

    pub fn warmup_cycle(&self) -> usize {
        self.warmup_cycle
    }

    /// End of the current cycle
    pub fn restart_ep(&self) -> usize {
        self.restart_ep
    }

    /// End of the current cycle's warmup
    pub fn warmup_ep(&self) -> usize {
        self.warmup_ep
    }

    /// Learning rate for `epoch`, advancing the cycle when `epoch` is the
    /// restart boundary
    pub fn get_lr(&mut self, epoch: usize) -> Result<f32> {
        if epoch == self.restart_ep {
            self.warmup_ep = self.restart_ep + self.warmup_cycle;
            self.restart_ep += self.restart_cycle;
            info!("restart warmup learning rate from {}", self.restart_ep);
            info!("warm up learning rate until {}", self.warmup_ep);
        }
        warmup_poly_lr(self.init_lr, self.poly_pow, epoch, self.warmup_ep, self.restart_ep)
    }

    /// Learning rate for `epoch` with the cycle derived from the epoch itself
    pub fn lr_at(&self, epoch: usize) -> Result<f32> {
        if self.restart_cycle == 0 {
            return Err(Error::NumericalError("restart cycle is zero epochs long".to_string()));
        }
        let cycle_start = epoch / self.restart_cycle * self.restart_cycle;
        warmup_poly_lr(
            self.init_lr,
            self.poly_pow,
            epoch,
            cycle_start + self.warmup_cycle,
            cycle_start + self.restart_cycle,
        )
    }
}

/// Schedule selector, named as in training configs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulePolicy {
    MultiStep,
    Step,
    Poly,
    WarmPoly,
    WarmPolyCycle,
}

impl SchedulePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulePolicy::MultiStep => "multistep",
            SchedulePolicy::Step => "step",
            SchedulePolicy::Poly => "poly",
            SchedulePolicy::WarmPoly => "warmpoly",
            SchedulePolicy::WarmPolyCycle => "warmpolycycle",
        }
    }
}

impl fmt::Display for SchedulePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchedulePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "multistep" => Ok(SchedulePolicy::MultiStep),
            "step" => Ok(SchedulePolicy::Step),
            "poly" => Ok(SchedulePolicy::Poly),
            "warmpoly" => Ok(SchedulePolicy::WarmPoly),
            "warmpolycycle" => Ok(SchedulePolicy::WarmPolyCycle),
            other => Err(Error::invalid_parameter(
                "lr schedule".to_string(),
                format!("unknown schedule '{}'", other),
            )),
        }
    }
}

fn default_restart_ratio() -> f64 {
    0.5
}

fn default_warmup_ratio() -> f64 {
    0.05
}

fn default_poly_pow() -> f64 {
    0.9
}

/// Everything [`get_scheduler`] needs
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub policy: SchedulePolicy,
    pub epochs: usize,
    pub init_lr: f32,
    #[serde(default = "default_restart_ratio")]
    pub restart_ratio: f64,
    #[serde(default = "default_warmup_ratio")]
    pub warmup_ratio: f64,
    #[serde(default = "default_poly_pow")]
    pub poly_pow: f64,
}

impl SchedulerConfig {
    pub fn new(policy: SchedulePolicy, epochs: usize, init_lr: f32) -> Self {
        SchedulerConfig {
            policy,
            epochs,
            init_lr,
            restart_ratio: default_restart_ratio(),
            warmup_ratio: default_warmup_ratio(),
            poly_pow: default_poly_pow(),
        }
    }

    pub fn with_restart_ratio(mut self, restart_ratio: f64) -> Self {
        self.restart_ratio = restart_ratio;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Any schedule, driven by epoch index
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Scheduler {
    MultiStep(MultiStepLr),
    Step(StepLr),
    Poly(PolyLr),
    WarmupPoly(WarmupPoly),
    WarmupPolyCycle(WarmupPolyCycle),
}

impl Scheduler {
    /// Learning rate for `epoch`.
    ///
    /// Step-protocol schedules are stepped forward until they reach `epoch`;
    /// they cannot rewind, so an earlier epoch yields the current rate.
    pub fn lr_for_epoch(&mut self, epoch: usize) -> Result<f32> {
        fn advance<S: LrScheduler>(scheduler: &mut S, epoch: usize) -> f32 {
            if epoch < scheduler.last_epoch() {
                warn!(
                    "scheduler is at epoch {}, cannot rewind to {}",
                    scheduler.last_epoch(),
                    epoch
                );
            }
            while scheduler.last_epoch() < epoch {
                scheduler.step();
            }
            scheduler.get_lr()
        }

        match self {
            Scheduler::MultiStep(s) => Ok(advance(s, epoch)),
            Scheduler::Step(s) => Ok(advance(s, epoch)),
            Scheduler::Poly(s) => Ok(advance(s, epoch)),
            Scheduler::WarmupPoly(s) => s.get_lr(epoch),
            Scheduler::WarmupPolyCycle(s) => s.get_lr(epoch),
        }
    }

    /// Compute the rate for `epoch` and write it into `optimizer`
    pub fn apply<O: Optimizer>(&mut self, epoch: usize, optimizer: &mut O) -> Result<f32> {
        let lr = self.lr_for_epoch(epoch)?;
        optimizer.set_learning_rate(lr);
        Ok(lr)
    }
}

/// Build the schedule named by `config.policy`.
///
/// - `multistep`: halve at `epochs / 2` and `epochs - epochs / 6`
/// - `step`: halve every `epochs / 3`
/// - `poly`: [`PolyLr`] over `epochs`
/// - `warmpoly` / `warmpolycycle`: warmup ratio and power from the config
pub fn get_scheduler(config: &SchedulerConfig) -> Result<Scheduler> {
    let epochs = config.epochs;
    let scheduler = match config.policy {
        SchedulePolicy::MultiStep => {
            let milestones = vec![epochs / 2, epochs - epochs / 6];
            Scheduler::MultiStep(MultiStepLr::new(config.init_lr, milestones, 0.5))
        }
        SchedulePolicy::Step => Scheduler::Step(StepLr::new(config.init_lr, epochs / 3, 0.5)?),
        SchedulePolicy::Poly => Scheduler::Poly(PolyLr::new(config.init_lr, epochs, config.poly_pow)?),
        SchedulePolicy::WarmPoly => Scheduler::WarmupPoly(WarmupPoly::new(
            config.init_lr,
            epochs,
            config.warmup_ratio,
            config.poly_pow,
        )),
        SchedulePolicy::WarmPolyCycle => Scheduler::WarmupPolyCycle(WarmupPolyCycle::new(
            config.init_lr,
            epochs,
            config.warmup_ratio,
            config.poly_pow,
            config.restart_ratio,
        )),
    };
    Ok(scheduler)
}

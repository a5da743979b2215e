pub mod lr_scheduler;

use serde::{Serialize, Deserialize};

pub use lr_scheduler::{
    get_scheduler, LrScheduler, MultiStepLr, PolyLr, SchedulePolicy, Scheduler, SchedulerConfig,
    StepLr, WarmupPoly, WarmupPolyCycle,
};

/// The part of an optimizer a learning-rate schedule talks to
pub trait Optimizer {
    fn learning_rate(&self) -> f32;
    fn set_learning_rate(&mut self, learning_rate: f32);
}

/// Plain stochastic gradient descent, holding the rate a schedule drives
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SGD {
    pub learning_rate: f32,
}

impl SGD {
    pub fn new(learning_rate: f32) -> SGD {
        SGD { learning_rate }
    }
}

impl Optimizer for SGD {
    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }
}

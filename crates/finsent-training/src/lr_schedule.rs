//! Per-step learning rate scheduling.
//!
//! The fine-tuning schedule ramps linearly from 0 to the base rate over the
//! warmup steps, then decays linearly back to 0 at the last step.

use serde::{Deserialize, Serialize};

/// Learning rate scheduler type
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub enum SchedulerType {
    /// Constant learning rate (no scheduling)
    #[default]
    Constant,

    /// Linear warmup to the base rate, then linear decay to 0
    LinearWarmup {
        warmup_steps: usize,
        total_steps: usize,
    },
}

impl SchedulerType {
    /// Linear warmup over `floor(warmup_fraction * total_steps)` steps.
    pub fn linear_warmup(total_steps: usize, warmup_fraction: f64) -> Self {
        Self::LinearWarmup {
            warmup_steps: (warmup_fraction * total_steps as f64).floor() as usize,
            total_steps,
        }
    }
}

/// Learning rate as a function of the optimizer step index
#[derive(Debug, Clone)]
pub struct LearningRateScheduler {
    scheduler_type: SchedulerType,
    base_lr: f64,
}

impl LearningRateScheduler {
    pub fn new(scheduler_type: SchedulerType, base_lr: f64) -> Self {
        Self {
            scheduler_type,
            base_lr,
        }
    }

    /// Learning rate used by the optimizer step with 0-based index `step`.
    pub fn lr_at(&self, step: usize) -> f64 {
        match self.scheduler_type {
            SchedulerType::Constant => self.base_lr,
            SchedulerType::LinearWarmup {
                warmup_steps,
                total_steps,
            } => {
                if step < warmup_steps {
                    self.base_lr * step as f64 / warmup_steps.max(1) as f64
                } else {
                    let remaining = total_steps.saturating_sub(step) as f64;
                    let decay_steps = total_steps.saturating_sub(warmup_steps).max(1) as f64;
                    self.base_lr * (remaining / decay_steps).max(0.0)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_scheduler() {
        let scheduler = LearningRateScheduler::new(SchedulerType::Constant, 0.001);
        assert_eq!(scheduler.lr_at(0), 0.001);
        assert_eq!(scheduler.lr_at(1000), 0.001);
    }

    #[test]
    fn test_warmup_steps_are_floored() {
        assert_eq!(
            SchedulerType::linear_warmup(95, 0.1),
            SchedulerType::LinearWarmup {
                warmup_steps: 9,
                total_steps: 95
            }
        );
    }

    #[test]
    fn test_linear_warmup_shape() {
        let scheduler = LearningRateScheduler::new(SchedulerType::linear_warmup(100, 0.1), 2e-5);

        assert_eq!(scheduler.lr_at(0), 0.0);
        assert!((scheduler.lr_at(5) - 1e-5).abs() < 1e-12);
        // peak at the end of warmup
        assert!((scheduler.lr_at(10) - 2e-5).abs() < 1e-12);
        assert!((scheduler.lr_at(55) - 1e-5).abs() < 1e-12);
        assert_eq!(scheduler.lr_at(100), 0.0);
        assert_eq!(scheduler.lr_at(150), 0.0);
    }

    #[test]
    fn test_lr_is_monotonic_per_phase() {
        let scheduler = LearningRateScheduler::new(SchedulerType::linear_warmup(40, 0.25), 1.0);
        for step in 1..10 {
            assert!(scheduler.lr_at(step) > scheduler.lr_at(step - 1));
        }
        for step in 11..=40 {
            assert!(scheduler.lr_at(step) < scheduler.lr_at(step - 1));
        }
    }

    #[test]
    fn test_zero_warmup() {
        let scheduler = LearningRateScheduler::new(SchedulerType::linear_warmup(5, 0.1), 1.0);
        assert_eq!(scheduler.lr_at(0), 1.0);
        assert!((scheduler.lr_at(1) - 0.8).abs() < 1e-12);
    }
}

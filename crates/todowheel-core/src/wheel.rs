//! The spin-the-wheel picker.
//!
//! A spin is a uniform draw over the visible tasks. The rotation reported
//! alongside it is derived from the same draw, so an animation landing on
//! `rotation_degrees` stops on the selected segment.

use rand::Rng;

use crate::task::{Task, TaskId};

/// Minimum rotation of a spin: four full turns.
pub const BASE_ROTATION_DEGREES: f64 = 1440.0;

#[derive(Debug, Clone, PartialEq)]
pub struct WheelSpin {
    pub index: usize,
    pub task_id: TaskId,
    pub rotation_degrees: f64,
    pub segment_degrees: f64,
}

/// Holds the result currently on display. Each spin replaces it.
#[derive(Debug, Clone, Default)]
pub struct Wheel {
    last: Option<WheelSpin>,
}

impl Wheel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_spin(tasks: &[&Task]) -> bool {
        !tasks.is_empty()
    }

    pub fn last(&self) -> Option<&WheelSpin> {
        self.last.as_ref()
    }

    pub fn spin<R: Rng>(&mut self, tasks: &[&Task], rng: &mut R) -> Option<&WheelSpin> {
        let fraction = rng.gen_range(0.0..1.0);
        self.spin_with_fraction(tasks, fraction)
    }

    /// Spins using a caller-supplied fraction in `[0, 1)`.
    pub fn spin_with_fraction(&mut self, tasks: &[&Task], fraction: f64) -> Option<&WheelSpin> {
        self.last = None;
        if !Self::can_spin(tasks) {
            return None;
        }

        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let len = tasks.len();
        let index = ((fraction * len as f64).floor() as usize).min(len - 1);

        self.last = Some(WheelSpin {
            index,
            task_id: tasks[index].id,
            rotation_degrees: BASE_ROTATION_DEGREES + fraction * 360.0,
            segment_degrees: 360.0 / len as f64,
        });
        self.last.as_ref()
    }

    pub fn clear(&mut self) {
        self.last = None;
    }
}

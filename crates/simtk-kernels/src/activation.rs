//! Logistic sigmoid, one thread per element.

use simtk_core::{Block, DeviceBuffer, Executor, Kernel, LaunchConfig, LaunchStats, Result, SimtError};

use crate::geometry::elementwise_config;

/// `1 / (1 + e^-x)`, evaluated directly. Large negative `x` overflows the
/// exponential to infinity and yields 0.
#[inline]
pub fn sigmoid_f32(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

pub struct SigmoidKernel<'a> {
    pub input: &'a DeviceBuffer<f32>,
    pub output: &'a DeviceBuffer<f32>,
}

impl Kernel for SigmoidKernel<'_> {
    type Shared = ();
    type Regs = ();

    fn name(&self) -> &'static str {
        "sigmoid"
    }

    fn geometry(&self) -> Result<LaunchConfig> {
        if self.output.len() < self.input.len() {
            return Err(SimtError::BufferTooSmall {
                name: "output",
                len: self.output.len(),
                needed: self.input.len(),
            });
        }
        elementwise_config(self.name(), self.input.len())
    }

    fn run_block(&self, block: &mut Block<(), ()>) {
        block.phase(|t, _, _| {
            let i = t.global_x();
            self.output.store(i, sigmoid_f32(self.input.load(i)));
        });
    }
}

pub fn sigmoid(exec: &Executor, input: &DeviceBuffer<f32>, output: &DeviceBuffer<f32>) -> Result<LaunchStats> {
    exec.launch(&SigmoidKernel { input, output })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid_values() {
        assert_eq!(sigmoid_f32(0.0), 0.5);
        assert_eq!(sigmoid_f32(-100.0), 0.0);
        assert_eq!(sigmoid_f32(100.0), 1.0);
        assert!((sigmoid_f32(1.0) - 0.731_058_6).abs() < 1e-6);
    }

    #[test]
    fn test_sigmoid_kernel() {
        let exec = Executor::default();
        let xs = [-3.0f32, -0.5, 0.0, 0.5, 3.0];
        let input = DeviceBuffer::from_host(&xs);
        let output = DeviceBuffer::zeros(xs.len());
        sigmoid(&exec, &input, &output).unwrap();
        let out = output.to_host();
        assert_eq!(out[2], 0.5);
        for (x, y) in xs.iter().zip(&out) {
            assert_eq!(*y, sigmoid_f32(*x));
        }
        assert!(out.windows(2).all(|w| w[0] < w[1]));
    }
}

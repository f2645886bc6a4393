//! Element-wise binary arithmetic: `c[i] = a[i] op b[i]`.

use simtk_core::{Block, DeviceBuffer, Executor, Kernel, LaunchConfig, LaunchStats, Result, SimtError};

use crate::geometry::elementwise_config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
}

impl BinaryOp {
    #[inline]
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
        }
    }

    pub fn kernel_name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
        }
    }
}

/// One thread per element, no bounds check.
pub struct ElementwiseKernel<'a> {
    pub op: BinaryOp,
    pub a: &'a DeviceBuffer<f32>,
    pub b: &'a DeviceBuffer<f32>,
    pub c: &'a DeviceBuffer<f32>,
}

impl Kernel for ElementwiseKernel<'_> {
    type Shared = ();
    type Regs = ();

    fn name(&self) -> &'static str {
        self.op.kernel_name()
    }

    fn geometry(&self) -> Result<LaunchConfig> {
        if self.a.len() != self.b.len() {
            return Err(SimtError::LengthMismatch {
                left: "a",
                left_len: self.a.len(),
                right: "b",
                right_len: self.b.len(),
            });
        }
        if self.c.len() < self.a.len() {
            return Err(SimtError::BufferTooSmall {
                name: "c",
                len: self.c.len(),
                needed: self.a.len(),
            });
        }
        elementwise_config(self.name(), self.a.len())
    }

    fn run_block(&self, block: &mut Block<(), ()>) {
        block.phase(|t, _, _| {
            let i = t.global_x();
            self.c.store(i, self.op.apply(self.a.load(i), self.b.load(i)));
        });
    }
}

pub fn binary(
    exec: &Executor,
    op: BinaryOp,
    a: &DeviceBuffer<f32>,
    b: &DeviceBuffer<f32>,
    c: &DeviceBuffer<f32>,
) -> Result<LaunchStats> {
    exec.launch(&ElementwiseKernel { op, a, b, c })
}

pub fn add(exec: &Executor, a: &DeviceBuffer<f32>, b: &DeviceBuffer<f32>, c: &DeviceBuffer<f32>) -> Result<LaunchStats> {
    binary(exec, BinaryOp::Add, a, b, c)
}

pub fn sub(exec: &Executor, a: &DeviceBuffer<f32>, b: &DeviceBuffer<f32>, c: &DeviceBuffer<f32>) -> Result<LaunchStats> {
    binary(exec, BinaryOp::Sub, a, b, c)
}

pub fn mul(exec: &Executor, a: &DeviceBuffer<f32>, b: &DeviceBuffer<f32>, c: &DeviceBuffer<f32>) -> Result<LaunchStats> {
    binary(exec, BinaryOp::Mul, a, b, c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(op: BinaryOp, a: &[f32], b: &[f32]) -> Vec<f32> {
        let exec = Executor::default();
        let (da, db) = (DeviceBuffer::from_host(a), DeviceBuffer::from_host(b));
        let dc = DeviceBuffer::zeros(a.len());
        binary(&exec, op, &da, &db, &dc).unwrap();
        dc.to_host()
    }

    #[test]
    fn test_add_sub_mul() {
        let a = [1.0, 2.0, 3.0, -4.0];
        let b = [0.5, -2.0, 3.0, 2.0];
        assert_eq!(run(BinaryOp::Add, &a, &b), vec![1.5, 0.0, 6.0, -2.0]);
        assert_eq!(run(BinaryOp::Sub, &a, &b), vec![0.5, 4.0, 0.0, -6.0]);
        assert_eq!(run(BinaryOp::Mul, &a, &b), vec![0.5, -4.0, 9.0, -8.0]);
    }

    #[test]
    fn test_odd_length_covers_every_element() {
        let n = 1001;
        let a: Vec<f32> = (0..n).map(|i| i as f32).collect();
        let b = vec![1.0; n];
        let out = run(BinaryOp::Add, &a, &b);
        assert!(out.iter().enumerate().all(|(i, &v)| v == i as f32 + 1.0));
    }

    #[test]
    fn test_one_thread_per_element() {
        let exec = Executor::default();
        let a = DeviceBuffer::from_host(&vec![1.0f32; 4096]);
        let c = DeviceBuffer::zeros(4096);
        let stats = mul(&exec, &a, &a, &c).unwrap();
        assert_eq!(stats.blocks * stats.threads_per_block, 4096);
        assert_eq!(stats.barriers_per_block, 0);
    }

    #[test]
    fn test_contract_violations() {
        let exec = Executor::default();
        let a = DeviceBuffer::<f32>::zeros(4);
        let b = DeviceBuffer::<f32>::zeros(3);
        let c = DeviceBuffer::<f32>::zeros(4);
        assert!(matches!(add(&exec, &a, &b, &c), Err(SimtError::LengthMismatch { .. })));

        let small = DeviceBuffer::<f32>::zeros(2);
        assert!(matches!(
            sub(&exec, &a, &a, &small),
            Err(SimtError::BufferTooSmall { name: "c", len: 2, needed: 4 })
        ));

        let empty = DeviceBuffer::<f32>::zeros(0);
        assert!(matches!(add(&exec, &empty, &empty, &empty), Err(SimtError::EmptyLaunch { .. })));
    }

    #[test]
    fn test_oversized_output_untouched_past_n() {
        let exec = Executor::default();
        let a = DeviceBuffer::from_host(&[1.0f32, 2.0]);
        let c = DeviceBuffer::from_host(&[9.0f32; 4]);
        add(&exec, &a, &a, &c).unwrap();
        assert_eq!(c.to_host(), vec![2.0, 4.0, 9.0, 9.0]);
    }
}

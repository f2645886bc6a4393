//! Scalar-broadcast arithmetic.
//!
//! The scalar lives in device memory at index 0 of its own buffer and is
//! re-read by every thread.

use simtk_core::{Block, DeviceBuffer, Executor, Kernel, LaunchConfig, LaunchStats, Result, SimtError};

use crate::geometry::elementwise_config;

/// A scalar kernel argument held in a device buffer.
///
/// Kept apart from array buffers so a scalar cannot be passed where a
/// full-length operand is expected.
#[derive(Debug)]
pub struct ScalarOperand {
    buf: DeviceBuffer<f32>,
}

impl ScalarOperand {
    pub fn new(value: f32) -> Self {
        Self { buf: DeviceBuffer::scalar(value) }
    }

    /// Wrap an existing buffer whose element 0 holds the scalar.
    pub fn from_buffer(buf: DeviceBuffer<f32>) -> Result<Self> {
        if buf.is_empty() {
            return Err(SimtError::BufferTooSmall { name: "scalar", len: 0, needed: 1 });
        }
        Ok(Self { buf })
    }

    pub fn buffer(&self) -> &DeviceBuffer<f32> {
        &self.buf
    }

    pub fn value(&self) -> f32 {
        self.buf.load(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarOp {
    /// `c[i] = a[i] * s`
    MulByScalar,
    /// `c[i] = s - a[i]`
    ScalarMinusArray,
    /// `c[i] = a[i] - s`
    ArrayMinusScalar,
}

impl ScalarOp {
    #[inline]
    pub fn apply(self, x: f32, s: f32) -> f32 {
        match self {
            ScalarOp::MulByScalar => x * s,
            ScalarOp::ScalarMinusArray => s - x,
            ScalarOp::ArrayMinusScalar => x - s,
        }
    }

    pub fn kernel_name(self) -> &'static str {
        match self {
            ScalarOp::MulByScalar => "mul_scalar",
            ScalarOp::ScalarMinusArray => "scalar_sub",
            ScalarOp::ArrayMinusScalar => "sub_scalar",
        }
    }
}

pub struct ScalarKernel<'a> {
    pub op: ScalarOp,
    pub array: &'a DeviceBuffer<f32>,
    pub scalar: &'a ScalarOperand,
    pub out: &'a DeviceBuffer<f32>,
}

impl Kernel for ScalarKernel<'_> {
    type Shared = ();
    type Regs = ();

    fn name(&self) -> &'static str {
        self.op.kernel_name()
    }

    fn geometry(&self) -> Result<LaunchConfig> {
        if self.out.len() < self.array.len() {
            return Err(SimtError::BufferTooSmall {
                name: "out",
                len: self.out.len(),
                needed: self.array.len(),
            });
        }
        elementwise_config(self.name(), self.array.len())
    }

    fn run_block(&self, block: &mut Block<(), ()>) {
        block.phase(|t, _, _| {
            let i = t.global_x();
            let s = self.scalar.buffer().load(0);
            self.out.store(i, self.op.apply(self.array.load(i), s));
        });
    }
}

fn scalar_op(
    exec: &Executor,
    op: ScalarOp,
    array: &DeviceBuffer<f32>,
    scalar: &ScalarOperand,
    out: &DeviceBuffer<f32>,
) -> Result<LaunchStats> {
    exec.launch(&ScalarKernel { op, array, scalar, out })
}

/// `out[i] = a[i] * s`
pub fn mul_scalar(exec: &Executor, a: &DeviceBuffer<f32>, s: &ScalarOperand, out: &DeviceBuffer<f32>) -> Result<LaunchStats> {
    scalar_op(exec, ScalarOp::MulByScalar, a, s, out)
}

/// `out[i] = s - b[i]`
pub fn scalar_sub(exec: &Executor, s: &ScalarOperand, b: &DeviceBuffer<f32>, out: &DeviceBuffer<f32>) -> Result<LaunchStats> {
    scalar_op(exec, ScalarOp::ScalarMinusArray, b, s, out)
}

/// `out[i] = a[i] - s`
pub fn sub_scalar(exec: &Executor, a: &DeviceBuffer<f32>, s: &ScalarOperand, out: &DeviceBuffer<f32>) -> Result<LaunchStats> {
    scalar_op(exec, ScalarOp::ArrayMinusScalar, a, s, out)
}

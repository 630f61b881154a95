//! Compute runtime: AOT module loading, ndarrays and kernel launches.
//!
//! Backends implement [`ComputeRuntime`]; everything above it (module
//! metadata, argument checking, compute graphs, the fractal module wrapper)
//! is backend independent.

pub mod cpu;
pub mod fractal;
pub mod module;
#[cfg(feature = "vulkano")]
pub mod vulkano;

use serde::{Deserialize, Serialize};

use crate::error::{CrateResult, GraphitError};
pub use module::{AotModule, ComputeGraph, Kernel, LaunchPlan};

/// Element type of an ndarray or scalar argument
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    F32,
    I32,
    U32,
}

impl DataType {
    pub fn size_in_bytes(self) -> usize {
        4
    }
}

/// Kind of a kernel argument
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArgKind {
    Scalar,
    NdArray,
}

/// Maximum rank an ndarray argument may have
pub const MAX_RANK: usize = 3;

/// Rank and extents of an ndarray
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shape {
    extents: Vec<u32>,
}

impl Shape {
    pub fn new(extents: &[u32]) -> CrateResult<Self> {
        if extents.is_empty() || extents.len() > MAX_RANK || extents.contains(&0) {
            return Err(GraphitError::InvalidShape(extents.to_vec()));
        }
        Ok(Self {
            extents: extents.to_vec(),
        })
    }

    pub fn rank(&self) -> usize {
        self.extents.len()
    }

    pub fn extents(&self) -> &[u32] {
        &self.extents
    }

    pub fn num_elements(&self) -> usize {
        self.extents.iter().map(|&e| e as usize).product()
    }
}

/// A device allocation tagged with a shape the runtime understands.
///
/// `M` is the backend's memory handle.
pub struct NdArray<M> {
    shape: Shape,
    dtype: DataType,
    memory: M,
}

impl<M> NdArray<M> {
    pub fn new(shape: Shape, dtype: DataType, memory: M) -> Self {
        Self {
            shape,
            dtype,
            memory,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn size_in_bytes(&self) -> CrateResult<usize> {
        let elem = self.dtype.size_in_bytes();
        self.shape
            .num_elements()
            .checked_mul(elem)
            .ok_or(GraphitError::BufferSizeOverflow(self.shape.num_elements(), elem))
    }
}

/// Scalar kernel argument
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Scalar {
    F32(f32),
    I32(i32),
    U32(u32),
}

impl Scalar {
    pub fn dtype(&self) -> DataType {
        match self {
            Scalar::F32(_) => DataType::F32,
            Scalar::I32(_) => DataType::I32,
            Scalar::U32(_) => DataType::U32,
        }
    }

    /// The 32-bit word this scalar occupies in the push constant block
    pub fn to_word(self) -> u32 {
        match self {
            Scalar::F32(v) => v.to_bits(),
            Scalar::I32(v) => v as u32,
            Scalar::U32(v) => v,
        }
    }
}

/// One launch argument
pub enum Arg<'a, M> {
    Scalar(Scalar),
    NdArray(&'a NdArray<M>),
}

impl<M> Clone for Arg<'_, M> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<M> Copy for Arg<'_, M> {}

impl<M> Arg<'_, M> {
    pub fn kind(&self) -> ArgKind {
        match self {
            Arg::Scalar(_) => ArgKind::Scalar,
            Arg::NdArray(_) => ArgKind::NdArray,
        }
    }
}

/// A compute backend.
///
/// Kernel launches are recorded by [`dispatch`](ComputeRuntime::dispatch)
/// and handed to the device by [`flush`](ComputeRuntime::flush);
/// [`wait`](ComputeRuntime::wait) blocks until the device is idle.
pub trait ComputeRuntime {
    /// Backend memory behind an ndarray
    type Memory;
    /// A kernel instantiated on this backend
    type Kernel;
    /// Cross-API view of an ndarray's memory
    type Exported;

    fn allocate_ndarray(&mut self, dtype: DataType, shape: Shape) -> CrateResult<NdArray<Self::Memory>>;

    /// Instantiate kernel `decl` of `module` on this backend
    fn create_kernel(
        &mut self,
        module: &AotModule,
        decl: &module::KernelDecl,
    ) -> CrateResult<Self::Kernel>;

    /// Record one kernel launch
    fn dispatch(
        &mut self,
        kernel: &Self::Kernel,
        plan: &LaunchPlan<'_, Self::Memory>,
    ) -> CrateResult<()>;

    /// Submit recorded launches. Returns once submitted, not once complete.
    fn flush(&mut self) -> CrateResult<()>;

    /// Block until the device has completed all prior work
    fn wait(&mut self) -> CrateResult<()>;

    /// Expose an ndarray's memory to the graphics side without copying
    fn export_memory(&self, array: &NdArray<Self::Memory>) -> CrateResult<Self::Exported>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_rejects_degenerate_extents() {
        assert!(Shape::new(&[]).is_err());
        assert!(Shape::new(&[640, 0]).is_err());
        assert!(Shape::new(&[1, 1, 1, 1]).is_err());
        let shape = Shape::new(&[640, 320]).unwrap();
        assert_eq!(shape.rank(), 2);
        assert_eq!(shape.num_elements(), 640 * 320);
    }

    #[test]
    fn scalar_words() {
        assert_eq!(Scalar::F32(1.0).to_word(), 0x3f80_0000);
        assert_eq!(Scalar::I32(-1).to_word(), u32::MAX);
        assert_eq!(Scalar::U32(7).to_word(), 7);
        assert_eq!(Scalar::I32(3).dtype(), DataType::I32);
    }

    #[test]
    fn ndarray_size_in_bytes() {
        let array = NdArray::new(Shape::new(&[4, 2]).unwrap(), DataType::F32, ());
        assert_eq!(array.size_in_bytes().unwrap(), 32);
    }
}

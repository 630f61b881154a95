//! Host execution of the compute kernels.
//!
//! Kernel bodies come from the `kernel` crate, the same code the shaders are
//! built from. Launches are recorded by `dispatch` and run on the rayon pool
//! at `flush`, which keeps the submit/wait split of a real device.

use std::{path::Path, sync::Arc};

use log::debug;
use parking_lot::RwLock;
use rayon::prelude::*;
use shared::FractalArgs;

use crate::{
    config::{BLIT_SHADER_FILE, GRAPH_BUNDLE, KERNEL_BUNDLE},
    error::{CrateResult, GraphitError},
    runtime::{
        fractal::{graph_bundle_metadata, kernel_bundle_metadata},
        module::{write_bundle, KernelDecl, SPIRV_MAGIC},
        AotModule, ComputeRuntime, DataType, LaunchPlan, NdArray, Shape,
    },
};

/// Host memory behind an ndarray, one 32-bit word per element
pub type HostMemory = Arc<RwLock<Vec<u32>>>;

/// Kernels the host backend can run, keyed by SPIR-V entry point name
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HostKernel {
    Fractal,
}

impl HostKernel {
    pub fn from_entry_point(name: &str) -> Option<Self> {
        match name {
            "fractal" => Some(HostKernel::Fractal),
            _ => None,
        }
    }
}

/// View of an ndarray handed to the presenter
#[derive(Clone)]
pub struct CpuExport {
    pub memory: HostMemory,
    pub size: usize,
}

/// Work counters, for checking how often each stage ran
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CpuStats {
    pub launches: u64,
    pub flushes: u64,
    pub waits: u64,
}

struct PendingLaunch {
    kernel: HostKernel,
    push_words: Vec<u32>,
    arrays: Vec<(HostMemory, Shape)>,
}

#[derive(Default)]
pub struct CpuRuntime {
    pending: Vec<PendingLaunch>,
    stats: CpuStats,
}

impl CpuRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> CpuStats {
        self.stats
    }

    /// Copy of an f32 array's contents
    pub fn read_f32(&self, array: &NdArray<HostMemory>) -> Vec<f32> {
        array
            .memory()
            .read()
            .iter()
            .map(|&word| f32::from_bits(word))
            .collect()
    }

    fn run(launch: &PendingLaunch) -> CrateResult<()> {
        match launch.kernel {
            HostKernel::Fractal => {
                let args: FractalArgs = bytemuck::pod_read_unaligned(bytemuck::cast_slice(
                    launch
                        .push_words
                        .get(..3)
                        .ok_or_else(|| GraphitError::Other("fractal needs 3 push words".into()))?,
                ));
                let (memory, shape) = launch
                    .arrays
                    .first()
                    .ok_or_else(|| GraphitError::Other("fractal needs a canvas".into()))?;
                let row_len = *shape
                    .extents()
                    .get(1)
                    .ok_or_else(|| GraphitError::InvalidShape(shape.extents().to_vec()))?
                    as usize;

                let mut words = memory.write();
                let canvas: &mut [f32] = bytemuck::cast_slice_mut(words.as_mut_slice());
                canvas
                    .par_chunks_mut(row_len)
                    .enumerate()
                    .for_each(|(i, row)| {
                        for (j, value) in row.iter_mut().enumerate() {
                            *value = kernel::fractal::fractal_value(
                                i as u32,
                                j as u32,
                                args.t,
                                args.canvas_shape[1],
                            );
                        }
                    });
                Ok(())
            }
        }
    }
}

impl ComputeRuntime for CpuRuntime {
    type Memory = HostMemory;
    type Kernel = HostKernel;
    type Exported = CpuExport;

    fn allocate_ndarray(&mut self, dtype: DataType, shape: Shape) -> CrateResult<NdArray<HostMemory>> {
        let memory = Arc::new(RwLock::new(vec![0u32; shape.num_elements()]));
        let array = NdArray::new(shape, dtype, memory);
        debug!(
            "allocated host ndarray {:?} {:?} ({} bytes)",
            array.shape().extents(),
            dtype,
            array.size_in_bytes()?
        );
        Ok(array)
    }

    fn create_kernel(&mut self, module: &AotModule, decl: &KernelDecl) -> CrateResult<HostKernel> {
        let kernel = HostKernel::from_entry_point(&decl.entry_point)
            .ok_or_else(|| GraphitError::EntryPointNotFound(decl.entry_point.clone()))?;
        debug!(
            "host kernel '{}' for {} from {}",
            decl.entry_point,
            decl.name,
            module.path().display()
        );
        Ok(kernel)
    }

    fn dispatch(&mut self, kernel: &HostKernel, plan: &LaunchPlan<'_, HostMemory>) -> CrateResult<()> {
        self.pending.push(PendingLaunch {
            kernel: *kernel,
            push_words: plan.push_words().to_vec(),
            arrays: plan
                .arrays()
                .iter()
                .map(|array| (array.memory().clone(), array.shape().clone()))
                .collect(),
        });
        self.stats.launches += 1;
        Ok(())
    }

    fn flush(&mut self) -> CrateResult<()> {
        for launch in self.pending.drain(..) {
            Self::run(&launch)?;
        }
        self.stats.flushes += 1;
        Ok(())
    }

    fn wait(&mut self) -> CrateResult<()> {
        // flush ran everything to completion already
        self.stats.waits += 1;
        Ok(())
    }

    fn export_memory(&self, array: &NdArray<HostMemory>) -> CrateResult<CpuExport> {
        Ok(CpuExport {
            memory: array.memory().clone(),
            size: array.size_in_bytes()?,
        })
    }
}

/// SPIR-V header with no instructions. The host backend never reads past it.
fn empty_spirv() -> Vec<u8> {
    [SPIRV_MAGIC, 0x0001_0500, 0, 1, 0]
        .iter()
        .flat_map(|word| word.to_le_bytes())
        .collect()
}

/// Write both fractal bundles and the blit shader into `dir` for host runs.
/// The SPIR-V they carry is empty; only the metadata matters here.
pub fn write_host_assets(dir: &Path) -> CrateResult<()> {
    let spirv = empty_spirv();
    write_bundle(&dir.join(KERNEL_BUNDLE), &kernel_bundle_metadata(), &spirv)?;
    write_bundle(&dir.join(GRAPH_BUNDLE), &graph_bundle_metadata(), &spirv)?;
    std::fs::write(dir.join(BLIT_SHADER_FILE), &spirv)?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_bundles() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_host_assets(dir.path()).unwrap();
    dir
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{module::MODULE_FORMAT_VERSION, Arg, Scalar};

    #[test]
    fn launches_run_at_flush() {
        let dir = test_bundles();
        let module = AotModule::load(dir.path().join(KERNEL_BUNDLE)).unwrap();
        let mut runtime = CpuRuntime::new();
        let kernel = module.get_kernel(&mut runtime, "fractal").unwrap();
        let canvas = runtime
            .allocate_ndarray(DataType::F32, Shape::new(&[16, 8]).unwrap())
            .unwrap();

        kernel
            .launch(&mut runtime, &[Arg::Scalar(Scalar::F32(0.0)), Arg::NdArray(&canvas)])
            .unwrap();
        assert!(runtime.read_f32(&canvas).iter().all(|&v| v == 0.0));

        runtime.flush().unwrap();
        let values = runtime.read_f32(&canvas);
        assert_eq!(values[3 * 8 + 5], kernel::fractal::fractal_value(3, 5, 0.0, 8));
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(
            runtime.stats(),
            CpuStats {
                launches: 1,
                flushes: 1,
                waits: 0
            }
        );
    }

    #[test]
    fn unknown_entry_point_is_rejected() {
        let dir = test_bundles();
        let mut metadata = kernel_bundle_metadata();
        metadata.kernels[0].entry_point = "mandelbrot".into();
        assert_eq!(metadata.version, MODULE_FORMAT_VERSION);
        write_bundle(&dir.path().join("other"), &metadata, &empty_spirv()).unwrap();

        let module = AotModule::load(dir.path().join("other")).unwrap();
        let result = module.get_kernel(&mut CpuRuntime::new(), "fractal");
        assert!(matches!(result, Err(GraphitError::EntryPointNotFound(name)) if name == "mandelbrot"));
    }

    #[test]
    fn export_shares_memory() {
        let mut runtime = CpuRuntime::new();
        let canvas = runtime
            .allocate_ndarray(DataType::F32, Shape::new(&[4, 4]).unwrap())
            .unwrap();
        let export = runtime.export_memory(&canvas).unwrap();
        assert_eq!(export.size, 64);
        canvas.memory().write()[0] = 1.0f32.to_bits();
        assert_eq!(export.memory.read()[0], 1.0f32.to_bits());
    }
}

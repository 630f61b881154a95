//! The fractal module: loads the configured bundle and launches its entry
//! point with `(t, canvas)`.

use log::{debug, info};

use crate::{
    config::{AppConfig, EntryStyle, ENTRY_NAME},
    error::CrateResult,
    runtime::{
        module::{
            ArgDecl, GraphDecl, GraphNodeDecl, KernelDecl, ModuleMetadata, NamedArgs,
            MODULE_FORMAT_VERSION, MODULE_SPIRV_FILE,
        },
        AotModule, Arg, ComputeGraph, ComputeRuntime, DataType, Kernel, NdArray, Scalar,
    },
};

/// Name of the time argument
pub const ARG_TIME: &str = "t";
/// Name of the output array argument
pub const ARG_CANVAS: &str = "canvas";

/// Resolved fractal entry point
pub enum FractalEntry<R: ComputeRuntime> {
    Kernel(Kernel<R>),
    Graph(ComputeGraph<R>),
}

/// A loaded fractal bundle and its resolved entry point
pub struct FractalModule<R: ComputeRuntime> {
    entry: FractalEntry<R>,
}

impl<R: ComputeRuntime> FractalModule<R> {
    /// Load the bundle for `config.entry_style` and resolve `fractal` in it
    pub fn load(runtime: &mut R, config: &AppConfig) -> CrateResult<Self> {
        let path = config.module_path();
        info!("Loading fractal module from {}", path.display());
        let module = AotModule::load(&path)?;

        let entry = match config.entry_style {
            EntryStyle::Kernel => FractalEntry::Kernel(module.get_kernel(runtime, ENTRY_NAME)?),
            EntryStyle::Graph => FractalEntry::Graph(module.get_graph(runtime, ENTRY_NAME)?),
        };
        debug!("resolved '{ENTRY_NAME}' as {:?}", config.entry_style);

        Ok(Self { entry })
    }

    pub fn entry(&self) -> &FractalEntry<R> {
        &self.entry
    }

    /// Launch the fractal for time `t` into `canvas`
    pub fn execute(&self, runtime: &mut R, t: f32, canvas: &NdArray<R::Memory>) -> CrateResult<()> {
        match &self.entry {
            FractalEntry::Kernel(kernel) => {
                kernel.launch(runtime, &[Arg::Scalar(Scalar::F32(t)), Arg::NdArray(canvas)])
            }
            FractalEntry::Graph(graph) => {
                let args = NamedArgs::new()
                    .with(ARG_TIME, Arg::Scalar(Scalar::F32(t)))
                    .with(ARG_CANVAS, Arg::NdArray(canvas));
                graph.launch(runtime, &args)
            }
        }
    }
}

fn fractal_args() -> Vec<ArgDecl> {
    vec![
        ArgDecl::Scalar {
            name: ARG_TIME.into(),
            dtype: DataType::F32,
        },
        ArgDecl::Ndarray {
            name: ARG_CANVAS.into(),
            dtype: DataType::F32,
            rank: 2,
        },
    ]
}

pub fn fractal_kernel_decl() -> KernelDecl {
    KernelDecl {
        name: ENTRY_NAME.into(),
        entry_point: ENTRY_NAME.into(),
        local_size: shared::FRACTAL_LOCAL_SIZE,
        args: fractal_args(),
    }
}

/// Metadata of the kernel-form bundle (`<module-dir>/fractal`)
pub fn kernel_bundle_metadata() -> ModuleMetadata {
    ModuleMetadata {
        version: MODULE_FORMAT_VERSION,
        spirv: MODULE_SPIRV_FILE.into(),
        kernels: vec![fractal_kernel_decl()],
        graphs: Vec::new(),
    }
}

/// Metadata of the graph-form bundle (`<module-dir>/fractal.cgraph`)
pub fn graph_bundle_metadata() -> ModuleMetadata {
    ModuleMetadata {
        graphs: vec![GraphDecl {
            name: ENTRY_NAME.into(),
            args: fractal_args(),
            nodes: vec![GraphNodeDecl {
                kernel: ENTRY_NAME.into(),
                args: vec![ARG_TIME.into(), ARG_CANVAS.into()],
            }],
        }],
        ..kernel_bundle_metadata()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::GraphitError,
        runtime::{
            cpu::{test_bundles, CpuRuntime},
            Shape,
        },
    };

    #[test]
    fn kernel_and_graph_produce_the_same_canvas() {
        let dir = test_bundles();
        let mut runtime = CpuRuntime::new();
        let shape = Shape::new(&[64, 32]).unwrap();
        let a = runtime.allocate_ndarray(DataType::F32, shape.clone()).unwrap();
        let b = runtime.allocate_ndarray(DataType::F32, shape).unwrap();

        let kernel =
            FractalModule::load(&mut runtime, &AppConfig::new(dir.path(), EntryStyle::Kernel))
                .unwrap();
        let graph =
            FractalModule::load(&mut runtime, &AppConfig::new(dir.path(), EntryStyle::Graph))
                .unwrap();
        assert!(matches!(kernel.entry(), FractalEntry::Kernel(_)));
        assert!(matches!(graph.entry(), FractalEntry::Graph(_)));

        kernel.execute(&mut runtime, 0.3, &a).unwrap();
        graph.execute(&mut runtime, 0.3, &b).unwrap();
        runtime.flush().unwrap();
        runtime.wait().unwrap();

        assert_eq!(runtime.read_f32(&a), runtime.read_f32(&b));
        assert_eq!(runtime.stats().launches, 2);
    }

    #[test]
    fn wrong_canvas_rank_is_rejected() {
        let dir = test_bundles();
        let mut runtime = CpuRuntime::new();
        let module =
            FractalModule::load(&mut runtime, &AppConfig::new(dir.path(), EntryStyle::Graph))
                .unwrap();
        let flat = runtime
            .allocate_ndarray(DataType::F32, Shape::new(&[64]).unwrap())
            .unwrap();
        assert!(matches!(
            module.execute(&mut runtime, 0.0, &flat),
            Err(GraphitError::ArgumentRank { .. })
        ));
        assert_eq!(runtime.stats().launches, 0);
    }

    #[test]
    fn graph_bundle_also_declares_the_kernel() {
        let metadata = graph_bundle_metadata();
        assert_eq!(metadata.kernels, vec![fractal_kernel_decl()]);
        assert_eq!(metadata.graphs[0].nodes[0].kernel, ENTRY_NAME);
        assert!(kernel_bundle_metadata().graphs.is_empty());
    }
}

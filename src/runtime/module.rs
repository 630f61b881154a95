//! AOT module bundles.
//!
//! A bundle is a directory with a `metadata.json` describing the kernels and
//! compute graphs it contains and one SPIR-V binary holding their entry
//! points. Kernels take positional arguments; graphs take named arguments
//! and run a fixed list of kernel launches.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    error::{CrateResult, GraphitError},
    runtime::{Arg, ArgKind, ComputeRuntime, DataType, NdArray, Shape},
};

pub const MODULE_METADATA_FILE: &str = "metadata.json";
pub const MODULE_SPIRV_FILE: &str = "module.spv";
pub const MODULE_FORMAT_VERSION: u32 = 1;
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Size of the push constant block every kernel launch fills, in 32-bit words
pub const MAX_PUSH_WORDS: usize = 16;
pub type PushWords = [u32; MAX_PUSH_WORDS];

/// Declared kernel or graph argument
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArgDecl {
    Scalar {
        name: String,
        dtype: DataType,
    },
    Ndarray {
        name: String,
        dtype: DataType,
        rank: usize,
    },
}

impl ArgDecl {
    pub fn name(&self) -> &str {
        match self {
            ArgDecl::Scalar { name, .. } | ArgDecl::Ndarray { name, .. } => name,
        }
    }

    pub fn kind(&self) -> ArgKind {
        match self {
            ArgDecl::Scalar { .. } => ArgKind::Scalar,
            ArgDecl::Ndarray { .. } => ArgKind::NdArray,
        }
    }

    /// Same kind, dtype and rank, names aside
    fn same_type(&self, other: &ArgDecl) -> bool {
        match (self, other) {
            (ArgDecl::Scalar { dtype: a, .. }, ArgDecl::Scalar { dtype: b, .. }) => a == b,
            (
                ArgDecl::Ndarray {
                    dtype: a, rank: ra, ..
                },
                ArgDecl::Ndarray {
                    dtype: b, rank: rb, ..
                },
            ) => a == b && ra == rb,
            _ => false,
        }
    }

    /// Check a launch argument against this declaration
    pub fn check<M>(&self, arg: &Arg<'_, M>) -> CrateResult<()> {
        if self.kind() != arg.kind() {
            return Err(GraphitError::ArgumentKind {
                name: self.name().to_string(),
                expected: self.kind(),
                got: arg.kind(),
            });
        }
        match (self, arg) {
            (ArgDecl::Scalar { name, dtype }, Arg::Scalar(value)) if value.dtype() != *dtype => {
                Err(GraphitError::ArgumentType {
                    name: name.clone(),
                    expected: *dtype,
                    got: value.dtype(),
                })
            }
            (ArgDecl::Ndarray { name, dtype, rank }, Arg::NdArray(array)) => {
                if array.dtype() != *dtype {
                    Err(GraphitError::ArgumentType {
                        name: name.clone(),
                        expected: *dtype,
                        got: array.dtype(),
                    })
                } else if array.shape().rank() != *rank {
                    Err(GraphitError::ArgumentRank {
                        name: name.clone(),
                        expected: *rank,
                        got: array.shape().rank(),
                    })
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelDecl {
    pub name: String,
    /// Entry point in the bundle's SPIR-V
    pub entry_point: String,
    pub local_size: [u32; 3],
    pub args: Vec<ArgDecl>,
}

/// One kernel launch inside a compute graph, binding graph arguments by name
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNodeDecl {
    pub kernel: String,
    pub args: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDecl {
    pub name: String,
    pub args: Vec<ArgDecl>,
    pub nodes: Vec<GraphNodeDecl>,
}

/// Contents of `metadata.json`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    pub version: u32,
    /// SPIR-V file name, relative to the bundle directory
    pub spirv: String,
    #[serde(default)]
    pub kernels: Vec<KernelDecl>,
    #[serde(default)]
    pub graphs: Vec<GraphDecl>,
}

/// Arguments, push constants and grid size of one kernel launch
pub struct LaunchPlan<'a, M> {
    push_words: PushWords,
    push_len: usize,
    arrays: Vec<&'a NdArray<M>>,
    workgroups: [u32; 3],
}

impl<'a, M> LaunchPlan<'a, M> {
    /// Words actually used by the launch
    pub fn push_words(&self) -> &[u32] {
        &self.push_words[..self.push_len]
    }

    /// The whole push constant block, zero padded
    pub fn push_block(&self) -> &PushWords {
        &self.push_words
    }

    /// Ndarray arguments in binding order
    pub fn arrays(&self) -> &[&'a NdArray<M>] {
        &self.arrays
    }

    pub fn workgroups(&self) -> [u32; 3] {
        self.workgroups
    }
}

/// Workgroups covering `shape` with `local_size` invocations per group
pub fn workgroups_for(shape: &Shape, local_size: [u32; 3]) -> [u32; 3] {
    let mut groups = [1u32; 3];
    for (d, group) in groups.iter_mut().enumerate() {
        let extent = shape.extents().get(d).copied().unwrap_or(1);
        *group = shared::div_ceil_u32(extent, local_size[d]);
    }
    groups
}

impl KernelDecl {
    /// Check `args` against the declaration and lay them out for launch
    pub fn plan<'a, M>(&self, args: &[Arg<'a, M>]) -> CrateResult<LaunchPlan<'a, M>> {
        if args.len() != self.args.len() {
            return Err(GraphitError::ArgumentCount {
                callee: self.name.clone(),
                expected: self.args.len(),
                got: args.len(),
            });
        }

        let mut words = Vec::with_capacity(MAX_PUSH_WORDS);
        let mut arrays = Vec::new();
        for (decl, arg) in self.args.iter().zip(args) {
            decl.check(arg)?;
            match arg {
                Arg::Scalar(value) => words.push(value.to_word()),
                Arg::NdArray(array) => arrays.push(*array),
            }
        }
        for array in &arrays {
            words.extend_from_slice(array.shape().extents());
        }
        if words.len() > MAX_PUSH_WORDS {
            return Err(GraphitError::PushConstantOverflow(
                words.len(),
                MAX_PUSH_WORDS,
            ));
        }

        let mut push_words = [0u32; MAX_PUSH_WORDS];
        push_words[..words.len()].copy_from_slice(&words);
        let workgroups = arrays
            .first()
            .map(|array| workgroups_for(array.shape(), self.local_size))
            .unwrap_or([1, 1, 1]);

        Ok(LaunchPlan {
            push_words,
            push_len: words.len(),
            arrays,
            workgroups,
        })
    }
}

/// A loaded bundle
pub struct AotModule {
    path: PathBuf,
    metadata: ModuleMetadata,
    spirv: Vec<u32>,
}

fn invalid(path: &Path, reason: impl Into<String>) -> GraphitError {
    GraphitError::InvalidModule {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Validate a SPIR-V binary and convert it to words
pub fn spirv_words(bytes: &[u8], path: &Path) -> CrateResult<Vec<u32>> {
    let invalid_spirv = |reason: &str| GraphitError::InvalidSpirv {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err(invalid_spirv("length is not a non-zero multiple of 4"));
    }
    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    if words[0] != SPIRV_MAGIC {
        return Err(invalid_spirv("missing SPIR-V magic number"));
    }
    Ok(words)
}

/// Read and validate a SPIR-V file
pub fn read_spirv(path: &Path) -> CrateResult<Vec<u32>> {
    let bytes = fs::read(path).map_err(|e| GraphitError::InvalidSpirv {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    spirv_words(&bytes, path)
}

/// Write a bundle directory: `metadata.json` plus the SPIR-V binary it names
pub fn write_bundle(dir: &Path, metadata: &ModuleMetadata, spirv: &[u8]) -> CrateResult<()> {
    fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(metadata)?;
    fs::write(dir.join(MODULE_METADATA_FILE), json)?;
    fs::write(dir.join(&metadata.spirv), spirv)?;
    Ok(())
}

impl AotModule {
    /// Load the bundle at `path`. Fails without side effects if the directory,
    /// its metadata or its SPIR-V is missing or malformed.
    pub fn load(path: impl AsRef<Path>) -> CrateResult<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(GraphitError::ModuleNotFound(path.to_path_buf()));
        }

        let metadata_path = path.join(MODULE_METADATA_FILE);
        let json = fs::read_to_string(&metadata_path)
            .map_err(|e| invalid(path, format!("cannot read {MODULE_METADATA_FILE}: {e}")))?;
        let metadata: ModuleMetadata = serde_json::from_str(&json)
            .map_err(|e| invalid(path, format!("malformed {MODULE_METADATA_FILE}: {e}")))?;

        if metadata.version != MODULE_FORMAT_VERSION {
            return Err(invalid(
                path,
                format!(
                    "format version {} is not supported (expected {MODULE_FORMAT_VERSION})",
                    metadata.version
                ),
            ));
        }
        if let Some(kernel) = metadata
            .kernels
            .iter()
            .find(|k| k.local_size.contains(&0))
        {
            return Err(invalid(
                path,
                format!("kernel '{}' has an empty local size", kernel.name),
            ));
        }

        let spirv = read_spirv(&path.join(&metadata.spirv))?;

        debug!(
            "loaded module {} ({} kernels, {} graphs, {} SPIR-V words)",
            path.display(),
            metadata.kernels.len(),
            metadata.graphs.len(),
            spirv.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            metadata,
            spirv,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> &ModuleMetadata {
        &self.metadata
    }

    pub fn spirv_words(&self) -> &[u32] {
        &self.spirv
    }

    pub fn kernel_decl(&self, name: &str) -> CrateResult<&KernelDecl> {
        self.metadata
            .kernels
            .iter()
            .find(|k| k.name == name)
            .ok_or_else(|| GraphitError::KernelNotFound(name.to_string()))
    }

    pub fn graph_decl(&self, name: &str) -> CrateResult<&GraphDecl> {
        self.metadata
            .graphs
            .iter()
            .find(|g| g.name == name)
            .ok_or_else(|| GraphitError::GraphNotFound(name.to_string()))
    }

    /// Resolve kernel `name` and instantiate it on `runtime`
    pub fn get_kernel<R: ComputeRuntime>(
        &self,
        runtime: &mut R,
        name: &str,
    ) -> CrateResult<Kernel<R>> {
        let decl = self.kernel_decl(name)?.clone();
        let handle = runtime.create_kernel(self, &decl)?;
        Ok(Kernel { decl, handle })
    }

    /// Resolve graph `name`, check every node against its kernel, and
    /// instantiate the kernels on `runtime`
    pub fn get_graph<R: ComputeRuntime>(
        &self,
        runtime: &mut R,
        name: &str,
    ) -> CrateResult<ComputeGraph<R>> {
        let decl = self.graph_decl(name)?.clone();

        let mut nodes = Vec::with_capacity(decl.nodes.len());
        for node in &decl.nodes {
            let kernel_decl = self.kernel_decl(&node.kernel)?;
            if node.args.len() != kernel_decl.args.len() {
                return Err(GraphitError::ArgumentCount {
                    callee: node.kernel.clone(),
                    expected: kernel_decl.args.len(),
                    got: node.args.len(),
                });
            }
            for (arg_name, kernel_arg) in node.args.iter().zip(&kernel_decl.args) {
                let graph_arg = decl
                    .args
                    .iter()
                    .find(|a| a.name() == arg_name)
                    .ok_or_else(|| {
                        invalid(
                            &self.path,
                            format!(
                                "graph '{}' binds undeclared argument '{arg_name}'",
                                decl.name
                            ),
                        )
                    })?;
                if !graph_arg.same_type(kernel_arg) {
                    return Err(invalid(
                        &self.path,
                        format!(
                            "graph '{}' passes '{arg_name}' as {:?} to '{}' which expects {:?}",
                            decl.name, graph_arg, node.kernel, kernel_arg
                        ),
                    ));
                }
            }
            nodes.push(GraphNode {
                kernel: self.get_kernel(runtime, &node.kernel)?,
                args: node.args.clone(),
            });
        }

        Ok(ComputeGraph { decl, nodes })
    }
}

/// A kernel resolved from a module and instantiated on a runtime
pub struct Kernel<R: ComputeRuntime> {
    decl: KernelDecl,
    handle: R::Kernel,
}

impl<R: ComputeRuntime> Kernel<R> {
    pub fn decl(&self) -> &KernelDecl {
        &self.decl
    }

    /// Launch with positional arguments
    pub fn launch(&self, runtime: &mut R, args: &[Arg<'_, R::Memory>]) -> CrateResult<()> {
        let plan = self.decl.plan(args)?;
        runtime.dispatch(&self.handle, &plan)
    }
}

/// Named launch arguments of a compute graph
pub struct NamedArgs<'a, M> {
    args: HashMap<String, Arg<'a, M>>,
}

impl<'a, M> Default for NamedArgs<'a, M> {
    fn default() -> Self {
        Self {
            args: HashMap::new(),
        }
    }
}

impl<'a, M> NamedArgs<'a, M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, arg: Arg<'a, M>) -> Self {
        self.args.insert(name.to_string(), arg);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arg<'a, M>> {
        self.args.get(name).copied()
    }
}

struct GraphNode<R: ComputeRuntime> {
    kernel: Kernel<R>,
    args: Vec<String>,
}

/// A compute graph resolved from a module; launches its nodes in order
pub struct ComputeGraph<R: ComputeRuntime> {
    decl: GraphDecl,
    nodes: Vec<GraphNode<R>>,
}

impl<R: ComputeRuntime> ComputeGraph<R> {
    pub fn decl(&self) -> &GraphDecl {
        &self.decl
    }

    /// Launch with named arguments
    pub fn launch(&self, runtime: &mut R, args: &NamedArgs<'_, R::Memory>) -> CrateResult<()> {
        for decl in &self.decl.args {
            let arg = args
                .get(decl.name())
                .ok_or_else(|| GraphitError::MissingArgument(decl.name().to_string()))?;
            decl.check(&arg)?;
        }
        for node in &self.nodes {
            let positional = node
                .args
                .iter()
                .map(|name| {
                    args.get(name)
                        .ok_or_else(|| GraphitError::MissingArgument(name.clone()))
                })
                .collect::<CrateResult<Vec<_>>>()?;
            node.kernel.launch(runtime, &positional)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Scalar;

    fn fractal_decl() -> KernelDecl {
        KernelDecl {
            name: "fractal".into(),
            entry_point: "fractal".into(),
            local_size: [8, 8, 1],
            args: vec![
                ArgDecl::Scalar {
                    name: "t".into(),
                    dtype: DataType::F32,
                },
                ArgDecl::Ndarray {
                    name: "canvas".into(),
                    dtype: DataType::F32,
                    rank: 2,
                },
            ],
        }
    }

    fn canvas(extents: &[u32], dtype: DataType) -> NdArray<()> {
        NdArray::new(Shape::new(extents).unwrap(), dtype, ())
    }

    #[test]
    fn plan_packs_scalars_then_extents() {
        let canvas = canvas(&[640, 320], DataType::F32);
        let plan = fractal_decl()
            .plan(&[Arg::Scalar(Scalar::F32(0.5)), Arg::NdArray(&canvas)])
            .unwrap();
        assert_eq!(plan.push_words(), &[0.5f32.to_bits(), 640, 320]);
        assert_eq!(plan.push_block()[3..], [0u32; MAX_PUSH_WORDS - 3]);
        assert_eq!(plan.arrays().len(), 1);
        assert_eq!(plan.workgroups(), [80, 40, 1]);

        let args: shared::FractalArgs =
            bytemuck::pod_read_unaligned(bytemuck::cast_slice(&plan.push_words()[..3]));
        assert_eq!(args.t, 0.5);
        assert_eq!(args.canvas_shape, [640, 320]);
    }

    #[test]
    fn plan_rejects_mismatched_arguments() {
        let decl = fractal_decl();
        let good = canvas(&[640, 320], DataType::F32);
        let flat = canvas(&[640], DataType::F32);
        let ints = canvas(&[640, 320], DataType::I32);

        assert!(matches!(
            decl.plan::<()>(&[Arg::Scalar(Scalar::F32(0.0))]),
            Err(GraphitError::ArgumentCount { expected: 2, got: 1, .. })
        ));
        assert!(matches!(
            decl.plan(&[Arg::NdArray(&good), Arg::NdArray(&good)]),
            Err(GraphitError::ArgumentKind { .. })
        ));
        assert!(matches!(
            decl.plan(&[Arg::Scalar(Scalar::U32(0)), Arg::NdArray(&good)]),
            Err(GraphitError::ArgumentType { .. })
        ));
        assert!(matches!(
            decl.plan(&[Arg::Scalar(Scalar::F32(0.0)), Arg::NdArray(&flat)]),
            Err(GraphitError::ArgumentRank { expected: 2, got: 1, .. })
        ));
        assert!(matches!(
            decl.plan(&[Arg::Scalar(Scalar::F32(0.0)), Arg::NdArray(&ints)]),
            Err(GraphitError::ArgumentType { .. })
        ));
    }

    #[test]
    fn plan_rejects_push_constant_overflow() {
        let decl = KernelDecl {
            name: "wide".into(),
            entry_point: "wide".into(),
            local_size: [64, 1, 1],
            args: (0..17)
                .map(|i| ArgDecl::Scalar {
                    name: format!("s{i}"),
                    dtype: DataType::U32,
                })
                .collect(),
        };
        let args: Vec<Arg<'_, ()>> = (0..17).map(|i| Arg::Scalar(Scalar::U32(i))).collect();
        assert!(matches!(
            decl.plan(&args),
            Err(GraphitError::PushConstantOverflow(17, MAX_PUSH_WORDS))
        ));
    }

    #[test]
    fn workgroups_round_up_per_dimension() {
        let shape = Shape::new(&[100]).unwrap();
        assert_eq!(workgroups_for(&shape, [64, 1, 1]), [2, 1, 1]);
        let shape = Shape::new(&[9, 17, 3]).unwrap();
        assert_eq!(workgroups_for(&shape, [8, 8, 1]), [2, 3, 3]);
    }

    #[test]
    fn spirv_needs_magic_and_word_alignment() {
        let path = Path::new("test.spv");
        assert!(spirv_words(&[], path).is_err());
        assert!(spirv_words(&[3, 2, 35, 7, 0], path).is_err());
        assert!(spirv_words(&[0, 0, 0, 0], path).is_err());
        let words = spirv_words(&SPIRV_MAGIC.to_le_bytes(), path).unwrap();
        assert_eq!(words, vec![SPIRV_MAGIC]);
    }

    #[test]
    fn metadata_json_uses_tagged_args() {
        let json = r#"{
            "version": 1,
            "spirv": "module.spv",
            "kernels": [{
                "name": "fractal",
                "entry_point": "fractal",
                "local_size": [8, 8, 1],
                "args": [
                    { "kind": "scalar", "name": "t", "dtype": "f32" },
                    { "kind": "ndarray", "name": "canvas", "dtype": "f32", "rank": 2 }
                ]
            }]
        }"#;
        let metadata: ModuleMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.kernels, vec![fractal_decl()]);
        assert!(metadata.graphs.is_empty());
    }
}

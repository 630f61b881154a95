// Module loading failures surface from construction, before any frame runs

use std::fs;

use graphit_template::{
    config::{AppConfig, EntryStyle, GRAPH_BUNDLE, KERNEL_BUNDLE},
    error::GraphitError,
    runtime::{
        cpu::{write_host_assets, CpuRuntime},
        fractal::{graph_bundle_metadata, FractalModule},
        module::{write_bundle, MODULE_METADATA_FILE},
    },
};

fn assets() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_host_assets(dir.path()).unwrap();
    dir
}

fn load(dir: &std::path::Path, style: EntryStyle) -> Result<(), GraphitError> {
    let mut runtime = CpuRuntime::new();
    FractalModule::load(&mut runtime, &AppConfig::new(dir, style)).map(|_| ())
}

#[test]
fn valid_bundles_load() {
    let dir = assets();
    load(dir.path(), EntryStyle::Kernel).unwrap();
    load(dir.path(), EntryStyle::Graph).unwrap();
}

#[test]
fn missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load(dir.path(), EntryStyle::Graph),
        Err(GraphitError::ModuleNotFound(_))
    ));
}

#[test]
fn malformed_metadata() {
    let dir = assets();
    fs::write(
        dir.path().join(KERNEL_BUNDLE).join(MODULE_METADATA_FILE),
        "{ not json",
    )
    .unwrap();
    assert!(matches!(
        load(dir.path(), EntryStyle::Kernel),
        Err(GraphitError::InvalidModule { .. })
    ));
}

#[test]
fn truncated_spirv() {
    let dir = assets();
    fs::write(dir.path().join(GRAPH_BUNDLE).join("module.spv"), [3u8, 2, 35]).unwrap();
    assert!(matches!(
        load(dir.path(), EntryStyle::Graph),
        Err(GraphitError::InvalidSpirv { .. })
    ));
}

#[test]
fn kernel_bundle_has_no_graph() {
    let dir = assets();
    // the graph bundle path, holding only the kernel
    fs::remove_dir_all(dir.path().join(GRAPH_BUNDLE)).unwrap();
    fs::rename(dir.path().join(KERNEL_BUNDLE), dir.path().join(GRAPH_BUNDLE)).unwrap();
    assert!(matches!(
        load(dir.path(), EntryStyle::Graph),
        Err(GraphitError::GraphNotFound(name)) if name == "fractal"
    ));
}

#[test]
fn graph_node_with_undeclared_argument() {
    let dir = assets();
    let mut metadata = graph_bundle_metadata();
    metadata.graphs[0].nodes[0].args[1] = "image".into();
    let spirv = fs::read(dir.path().join(GRAPH_BUNDLE).join("module.spv")).unwrap();
    write_bundle(&dir.path().join(GRAPH_BUNDLE), &metadata, &spirv).unwrap();
    assert!(matches!(
        load(dir.path(), EntryStyle::Graph),
        Err(GraphitError::InvalidModule { .. })
    ));
}

#[test]
fn graph_missing_named_argument_fails_launch() {
    use graphit_template::runtime::{
        module::{AotModule, NamedArgs},
        Arg, Scalar,
    };

    let dir = assets();
    let module = AotModule::load(dir.path().join(GRAPH_BUNDLE)).unwrap();
    let mut runtime = CpuRuntime::new();
    let graph = module.get_graph(&mut runtime, "fractal").unwrap();
    let args = NamedArgs::new().with("t", Arg::Scalar(Scalar::F32(0.0)));
    assert!(matches!(
        graph.launch(&mut runtime, &args),
        Err(GraphitError::MissingArgument(name)) if name == "canvas"
    ));
    assert_eq!(runtime.stats().launches, 0);
}

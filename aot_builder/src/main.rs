//! Builds `shaders` with rust-gpu and writes the module bundles the
//! application loads:
//!
//! ```text
//! <out>/fractal/{metadata.json, module.spv}
//! <out>/fractal.cgraph/{metadata.json, module.spv}
//! <out>/blit.spv
//! ```

use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use graphit_template::{
    config::{BLIT_SHADER_FILE, GRAPH_BUNDLE, KERNEL_BUNDLE},
    logging,
    runtime::{
        fractal::{graph_bundle_metadata, kernel_bundle_metadata},
        module::{spirv_words, write_bundle},
    },
};
use log::{debug, info};
use spirv_builder::{Capability, MetadataPrintout, SpirvBuilder};

const TARGET: &str = "spirv-unknown-vulkan1.2";
const REQUIRED_ENTRY_POINTS: [&str; 2] = ["fractal", "blit"];

#[derive(Parser, Debug)]
#[command(about = "Build the GraphiT-Template module bundles")]
struct Args {
    /// Output directory (the application's --module-dir).
    #[arg(short, long, default_value = "assets")]
    out_dir: PathBuf,

    /// Path to the shaders crate.
    #[arg(long, default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/../shaders"))]
    shaders: PathBuf,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    info!("Building {} for {TARGET}", args.shaders.display());
    let result = SpirvBuilder::new(&args.shaders, TARGET)
        .scalar_block_layout(true)
        .capability(Capability::StorageImageWriteWithoutFormat)
        .print_metadata(MetadataPrintout::None)
        .build()
        .context("failed to build SPIR-V module")?;

    for entry in REQUIRED_ENTRY_POINTS {
        if !result.entry_points.iter().any(|e| e == entry) {
            bail!("entry point '{entry}' missing from {:?}", result.entry_points);
        }
    }
    debug!("entry points: {:?}", result.entry_points);

    let spv_path = result.module.unwrap_single();
    let spirv = fs::read(spv_path).with_context(|| format!("reading {}", spv_path.display()))?;
    spirv_words(&spirv, spv_path)?;

    let out = &args.out_dir;
    write_bundle(&out.join(KERNEL_BUNDLE), &kernel_bundle_metadata(), &spirv)?;
    write_bundle(&out.join(GRAPH_BUNDLE), &graph_bundle_metadata(), &spirv)?;
    fs::write(out.join(BLIT_SHADER_FILE), &spirv)?;

    info!(
        "Wrote {KERNEL_BUNDLE}, {GRAPH_BUNDLE} and {BLIT_SHADER_FILE} to {} ({} bytes of SPIR-V)",
        out.display(),
        spirv.len()
    );
    Ok(())
}

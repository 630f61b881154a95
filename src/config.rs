//! Command line interface and the immutable application configuration built from it

use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};

pub const APP_NAME: &str = "GraphiT-Template";
pub const APP_DESC: &str = "GraphiT project template.";

/// Extents of the kernel output array, `(2n, n)` with `n = 320`
pub const CANVAS_SHAPE: [u32; 2] = [640, 320];
/// Kernel time advanced per frame
pub const TIME_STEP: f32 = 0.03;

pub const KERNEL_BUNDLE: &str = "fractal";
pub const GRAPH_BUNDLE: &str = "fractal.cgraph";
pub const BLIT_SHADER_FILE: &str = "blit.spv";
/// Name of the entry (kernel or graph) resolved from the bundle
pub const ENTRY_NAME: &str = "fractal";

/// Which backend drives compute and presentation
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Vulkan device shared between compute and a window swapchain
    Vulkan,
    /// Host execution into an in-memory swapchain, no window
    Cpu,
}

#[cfg(feature = "vulkano")]
const DEFAULT_BACKEND: Backend = Backend::Vulkan;
#[cfg(not(feature = "vulkano"))]
const DEFAULT_BACKEND: Backend = Backend::Cpu;

/// How the fractal entry point is invoked
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EntryStyle {
    /// Positional launch of a single kernel
    Kernel,
    /// Named-argument launch of a compute graph
    Graph,
}

#[derive(Parser, Debug)]
#[command(name = "graphit-template", about = APP_DESC)]
pub struct Cli {
    /// Produce extra amount of logs for debugging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to the directory holding the precompiled modules.
    #[arg(short, long, default_value = "assets")]
    pub module_dir: PathBuf,

    /// Launch the fractal as a single kernel instead of a compute graph.
    #[arg(short, long)]
    pub kernel: bool,

    /// Backend used for compute and presentation.
    #[arg(long, value_enum, default_value_t = DEFAULT_BACKEND)]
    pub backend: Backend,

    /// Stop after this many frames (runs until closed otherwise).
    #[arg(long)]
    pub max_frames: Option<u64>,
}

/// Immutable configuration, built once from the command line and passed by
/// reference to every component that needs it.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub verbose: bool,
    pub module_dir: PathBuf,
    pub entry_style: EntryStyle,
    pub backend: Backend,
    pub max_frames: Option<u64>,
    pub canvas_shape: [u32; 2],
    pub time_step: f32,
    pub window_title: String,
}

impl From<Cli> for AppConfig {
    fn from(cli: Cli) -> Self {
        Self {
            verbose: cli.verbose,
            module_dir: cli.module_dir,
            entry_style: if cli.kernel {
                EntryStyle::Kernel
            } else {
                EntryStyle::Graph
            },
            backend: cli.backend,
            max_frames: cli.max_frames,
            canvas_shape: CANVAS_SHAPE,
            time_step: TIME_STEP,
            window_title: APP_NAME.to_string(),
        }
    }
}

impl AppConfig {
    /// Configuration with defaults for everything but the module directory
    pub fn new(module_dir: impl AsRef<Path>, entry_style: EntryStyle) -> Self {
        Self {
            verbose: false,
            module_dir: module_dir.as_ref().to_path_buf(),
            entry_style,
            backend: DEFAULT_BACKEND,
            max_frames: None,
            canvas_shape: CANVAS_SHAPE,
            time_step: TIME_STEP,
            window_title: APP_NAME.to_string(),
        }
    }

    /// Bundle directory for the configured entry style
    pub fn module_path(&self) -> PathBuf {
        match self.entry_style {
            EntryStyle::Kernel => self.module_dir.join(KERNEL_BUNDLE),
            EntryStyle::Graph => self.module_dir.join(GRAPH_BUNDLE),
        }
    }

    pub fn blit_shader_path(&self) -> PathBuf {
        self.module_dir.join(BLIT_SHADER_FILE)
    }

    /// Whether `frames_done` frames reach the configured limit
    pub fn frame_limit_reached(&self, frames_done: u64) -> bool {
        self.max_frames.is_some_and(|max| frames_done >= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_onto_config() {
        let cli = Cli::parse_from(["graphit-template", "-v", "-m", "/tmp/mods", "-k"]);
        let config = AppConfig::from(cli);
        assert!(config.verbose);
        assert_eq!(config.entry_style, EntryStyle::Kernel);
        assert_eq!(config.module_path(), PathBuf::from("/tmp/mods/fractal"));
        assert_eq!(config.blit_shader_path(), PathBuf::from("/tmp/mods/blit.spv"));
    }

    #[test]
    fn graph_is_the_default_entry_style() {
        let config = AppConfig::from(Cli::parse_from(["graphit-template"]));
        assert!(!config.verbose);
        assert_eq!(config.entry_style, EntryStyle::Graph);
        assert_eq!(config.module_path(), PathBuf::from("assets/fractal.cgraph"));
        assert_eq!(config.canvas_shape, [640, 320]);
        assert_eq!(config.window_title, APP_NAME);
    }

    #[test]
    fn long_flags_and_backend() {
        let cli = Cli::parse_from([
            "graphit-template",
            "--verbose",
            "--module-dir",
            "mods",
            "--kernel",
            "--backend",
            "cpu",
            "--max-frames",
            "3",
        ]);
        let config = AppConfig::from(cli);
        assert_eq!(config.backend, Backend::Cpu);
        assert!(!config.frame_limit_reached(2));
        assert!(config.frame_limit_reached(3));
    }

    #[test]
    fn unbounded_without_max_frames() {
        let config = AppConfig::new("assets", EntryStyle::Graph);
        assert!(!config.frame_limit_reached(u64::MAX));
    }
}

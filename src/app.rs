//! Application entry: picks the backend and drives the frame loop.

#[cfg(feature = "vulkano")]
pub mod window;

use log::info;

use crate::{
    config::{AppConfig, Backend},
    error::CrateResult,
    frame::FrameDriver,
    graphics::headless::CpuPresenter,
    runtime::cpu::CpuRuntime,
};

pub fn run(config: &AppConfig) -> CrateResult<()> {
    info!(
        "{} starting ({:?} backend, {:?} entry)",
        config.window_title, config.backend, config.entry_style
    );
    match config.backend {
        Backend::Cpu => run_headless(config).map(|_| ()),
        #[cfg(feature = "vulkano")]
        Backend::Vulkan => window::run(config),
        #[cfg(not(feature = "vulkano"))]
        Backend::Vulkan => Err(crate::error::GraphitError::BackendUnavailable("vulkan")),
    }
}

/// Run the frame loop on the host until the frame limit (or forever).
/// Returns the driver so callers can inspect what ran.
pub fn run_headless(config: &AppConfig) -> CrateResult<FrameDriver<CpuRuntime, CpuPresenter>> {
    let presenter = CpuPresenter::new(config.canvas_shape);
    let mut driver = FrameDriver::new(CpuRuntime::new(), presenter, config)?;
    while !config.frame_limit_reached(driver.frame_index()) {
        driver.run_frame()?;
    }
    info!("Presented {} frames", driver.frame_index());
    Ok(driver)
}

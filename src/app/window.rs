//! Windowed run on the vulkano backend

use std::sync::Arc;

use log::{debug, error, info};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

use crate::{
    config::AppConfig,
    error::{CrateResult, GraphitError},
    frame::FrameDriver,
    graphics::{blit::VulkanoPresenter, context::GraphicsContext, drawable_extent},
    runtime::vulkano::VulkanoRuntime,
};

type VulkanoDriver = FrameDriver<VulkanoRuntime, VulkanoPresenter>;

struct App<'a> {
    config: &'a AppConfig,
    window: Option<Arc<Window>>,
    driver: Option<VulkanoDriver>,
    /// First error hit inside the event loop, returned once it exits
    error: Option<GraphitError>,
}

impl App<'_> {
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: GraphitError) {
        error!("{err}");
        self.error.get_or_insert(err);
        event_loop.exit();
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> CrateResult<()> {
        let [width, height] = self.config.canvas_shape;
        let window = Arc::new(
            event_loop.create_window(
                Window::default_attributes()
                    .with_title(self.config.window_title.clone())
                    .with_inner_size(PhysicalSize::new(width, height))
                    .with_resizable(false),
            )?,
        );

        let context = GraphicsContext::new(event_loop, window.clone())?;
        let runtime = VulkanoRuntime::from_context(&context);
        let presenter = VulkanoPresenter::new(context);
        let driver = FrameDriver::new(runtime, presenter, self.config)?;
        info!("Setup complete, starting frame loop");

        window.request_redraw();
        self.window = Some(window);
        self.driver = Some(driver);
        Ok(())
    }
}

impl ApplicationHandler for App<'_> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let (Some(window), Some(driver)) = (self.window.clone(), self.driver.as_mut()) else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                info!("Window closed after {} frames", driver.frame_index());
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if drawable_extent([size.width, size.height]).is_none() {
                    debug!("window minimized, frames paused");
                    return;
                }
                driver
                    .presenter_mut()
                    .request_recreate([size.width, size.height]);
                window.request_redraw();
            }
            WindowEvent::RedrawRequested => {
                // resumed by the next non-zero resize
                if !driver.presenter().drawable() {
                    return;
                }
                if let Err(err) = driver.run_frame() {
                    self.fail(event_loop, err);
                    return;
                }
                if self.config.frame_limit_reached(driver.frame_index()) {
                    info!("Frame limit reached after {} frames", driver.frame_index());
                    event_loop.exit();
                    return;
                }
                window.request_redraw();
            }
            _ => {}
        }
    }
}

pub fn run(config: &AppConfig) -> CrateResult<()> {
    let event_loop = EventLoop::new()?;
    let mut app = App {
        config,
        window: None,
        driver: None,
        error: None,
    };
    event_loop.run_app(&mut app)?;

    // the device has to be idle before the runtime and swapchain drop
    if let Some(driver) = app.driver.as_ref() {
        unsafe { driver.runtime().device().wait_idle()? };
    }
    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

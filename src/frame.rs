//! One frame: fractal launch, export, blit, present.

use glam::Vec4;
use log::debug;
use shared::BlitUniforms;

use crate::{
    config::AppConfig,
    error::CrateResult,
    graphics::{BlitInvocation, CopyTaskDesc, PresentableImage, Presenter},
    runtime::{fractal::FractalModule, ComputeRuntime, DataType, NdArray, Shape},
};

/// Tint at the start of the 100 frame cycle
pub const COLOR_START: [f32; 4] = [0.0, 0.5, 1.0, 1.0];
/// Tint halfway through the cycle
pub const COLOR_END: [f32; 4] = [1.0, 0.5, 0.0, 1.0];
/// Frames in one tint cycle
pub const COLOR_PERIOD: u64 = 100;

/// Tint blend factor for frame `index`: a triangle wave over `[0, 1]` with a
/// period of 100 frames
pub fn alpha(index: u64) -> f32 {
    let pos = (index % COLOR_PERIOD) as f32;
    if pos < 50.0 {
        pos / 50.0
    } else {
        2.0 - pos / 50.0
    }
}

pub fn frame_color(index: u64) -> [f32; 4] {
    Vec4::from_array(COLOR_START)
        .lerp(Vec4::from_array(COLOR_END), alpha(index))
        .to_array()
}

pub fn frame_uniforms(index: u64, width: u32, height: u32) -> BlitUniforms {
    BlitUniforms {
        color: frame_color(index),
        size: [width as i32, height as i32],
    }
}

pub fn blit_workgroups(width: u32, height: u32) -> [u32; 3] {
    shared::num_workgroups_2d(width, height, shared::BLIT_LOCAL_SIZE)
}

/// Owns everything the frame loop touches and runs it one frame at a time
pub struct FrameDriver<R, P>
where
    R: ComputeRuntime,
    P: Presenter<Storage = R::Exported>,
{
    runtime: R,
    presenter: P,
    module: FractalModule<R>,
    canvas: NdArray<R::Memory>,
    task: P::Task,
    time_step: f32,
    frame_index: u64,
}

impl<R, P> FrameDriver<R, P>
where
    R: ComputeRuntime,
    P: Presenter<Storage = R::Exported>,
{
    /// Load the fractal module, allocate the canvas and build the copy task
    pub fn new(mut runtime: R, mut presenter: P, config: &AppConfig) -> CrateResult<Self> {
        let module = FractalModule::load(&mut runtime, config)?;
        let canvas = runtime.allocate_ndarray(DataType::F32, Shape::new(&config.canvas_shape)?)?;
        let task = presenter.build_task(&CopyTaskDesc::blit(config))?;

        Ok(Self {
            runtime,
            presenter,
            module,
            canvas,
            task,
            time_step: config.time_step,
            frame_index: 0,
        })
    }

    pub fn run_frame(&mut self) -> CrateResult<()> {
        let t = self.frame_index as f32 * self.time_step;
        self.module.execute(&mut self.runtime, t, &self.canvas)?;
        self.runtime.flush()?;
        let storage = self.runtime.export_memory(&self.canvas)?;

        let image = self.presenter.acquire_next_image()?;
        let (width, height) = (image.width(), image.height());
        let uniform = self
            .presenter
            .upload_uniform(frame_uniforms(self.frame_index, width, height))?;

        // the blit reads the canvas, so compute has to be done
        self.runtime.wait()?;

        self.presenter.submit_and_present(BlitInvocation {
            task: &self.task,
            uniform,
            storage,
            image,
            workgroups: blit_workgroups(width, height),
        })?;

        debug!("frame {} presented (t = {t:.2})", self.frame_index);
        self.frame_index += 1;
        Ok(())
    }

    /// Frames presented so far
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn canvas(&self) -> &NdArray<R::Memory> {
        &self.canvas
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_is_a_triangle_wave() {
        assert_eq!(alpha(0), 0.0);
        assert_eq!(alpha(25), 0.5);
        assert_eq!(alpha(50), 1.0);
        assert_eq!(alpha(75), 0.5);
        assert!((alpha(99) - 0.02).abs() < 1e-6);
        assert_eq!(alpha(100), 0.0);
        assert_eq!(alpha(1_000_050), 1.0);
        assert!((0..1000).all(|i| (0.0..=1.0).contains(&alpha(i))));
    }

    #[test]
    fn colour_runs_from_start_to_end() {
        assert_eq!(frame_color(0), COLOR_START);
        assert_eq!(frame_color(50), COLOR_END);
        assert_eq!(frame_color(25), [0.5, 0.5, 0.5, 1.0]);
    }

    #[test]
    fn uniforms_carry_image_size() {
        let uniforms = frame_uniforms(10, 640, 320);
        assert_eq!(uniforms.size, [640, 320]);
        assert_eq!(uniforms.color, frame_color(10));
    }

    #[test]
    fn workgroups_round_up() {
        assert_eq!(blit_workgroups(640, 320), [80, 40, 1]);
        assert_eq!(blit_workgroups(641, 321), [81, 41, 1]);
        assert_eq!(blit_workgroups(1, 1), [1, 1, 1]);
    }
}

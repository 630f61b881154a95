//! In-memory swapchain for running without a window.
//!
//! The blit runs on the host through the same `kernel::blit` code the shader
//! is built from.

use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;
use shared::BlitUniforms;

use crate::{
    error::CrateResult,
    graphics::{
        copy_task::BLIT_BINDINGS, BlitInvocation, CopyTaskDesc, PresentableImage, Presenter,
    },
    runtime::{cpu::CpuExport, module::read_spirv},
};

pub type Texels = Arc<RwLock<Vec<[f32; 4]>>>;

/// Number of images in the in-memory swapchain
pub const HEADLESS_IMAGE_COUNT: usize = 3;

pub struct CpuBlitTask {
    pub local_size: [u32; 3],
}

pub struct CpuImage {
    index: usize,
    extent: [u32; 2],
    texels: Texels,
}

impl CpuImage {
    pub fn index(&self) -> usize {
        self.index
    }
}

impl PresentableImage for CpuImage {
    fn width(&self) -> u32 {
        self.extent[0]
    }

    fn height(&self) -> u32 {
        self.extent[1]
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PresentStats {
    pub acquires: u64,
    pub uploads: u64,
    pub submits: u64,
}

pub struct CpuPresenter {
    extent: [u32; 2],
    images: Vec<Texels>,
    next_image: usize,
    last_presented: Option<usize>,
    stats: PresentStats,
}

impl CpuPresenter {
    pub fn new(extent: [u32; 2]) -> Self {
        let texel_count = extent[0] as usize * extent[1] as usize;
        Self {
            extent,
            images: (0..HEADLESS_IMAGE_COUNT)
                .map(|_| Arc::new(RwLock::new(vec![[0.0; 4]; texel_count])))
                .collect(),
            next_image: 0,
            last_presented: None,
            stats: PresentStats::default(),
        }
    }

    pub fn stats(&self) -> PresentStats {
        self.stats
    }

    /// Texels of the most recently presented image, row-major
    pub fn last_presented(&self) -> Option<Vec<[f32; 4]>> {
        self.last_presented
            .map(|index| self.images[index].read().clone())
    }
}

impl Presenter for CpuPresenter {
    type Task = CpuBlitTask;
    type Image = CpuImage;
    type Uniform = BlitUniforms;
    type Storage = CpuExport;

    fn build_task(&mut self, desc: &CopyTaskDesc) -> CrateResult<CpuBlitTask> {
        desc.expect_bindings(&BLIT_BINDINGS)?;
        let words = read_spirv(&desc.spirv_path)?;
        debug!(
            "host copy task '{}' from {} ({} SPIR-V words)",
            desc.entry_point,
            desc.spirv_path.display(),
            words.len()
        );
        Ok(CpuBlitTask {
            local_size: desc.local_size,
        })
    }

    fn acquire_next_image(&mut self) -> CrateResult<CpuImage> {
        let index = self.next_image;
        self.next_image = (self.next_image + 1) % self.images.len();
        self.stats.acquires += 1;
        Ok(CpuImage {
            index,
            extent: self.extent,
            texels: self.images[index].clone(),
        })
    }

    fn upload_uniform(&mut self, uniforms: BlitUniforms) -> CrateResult<BlitUniforms> {
        self.stats.uploads += 1;
        Ok(uniforms)
    }

    fn submit_and_present(&mut self, invocation: BlitInvocation<'_, Self>) -> CrateResult<()> {
        let BlitInvocation {
            task,
            uniform,
            storage,
            image,
            workgroups,
        } = invocation;

        let words = storage.memory.read();
        let src: &[f32] = bytemuck::cast_slice(words.as_slice());
        let mut texels = image.texels.write();

        let grid_x = workgroups[0] * task.local_size[0];
        let grid_y = workgroups[1] * task.local_size[1];
        for y in 0..grid_y {
            for x in 0..grid_x {
                let Some(texel) = kernel::blit::blit_texel(x, y, &uniform, src) else {
                    continue;
                };
                // out-of-extent writes are dropped like on the device
                if x < image.extent[0] && y < image.extent[1] {
                    texels[(y * image.extent[0] + x) as usize] = texel;
                }
            }
        }

        self.last_presented = Some(image.index);
        self.stats.submits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{AppConfig, EntryStyle},
        runtime::{cpu::CpuRuntime, ComputeRuntime, DataType, Shape},
    };

    #[test]
    fn images_rotate() {
        let mut presenter = CpuPresenter::new([4, 2]);
        let indices: Vec<usize> = (0..4)
            .map(|_| presenter.acquire_next_image().unwrap().index())
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 0]);
    }

    #[test]
    fn missing_blit_shader_fails_task_build() {
        let dir = tempfile::tempdir().unwrap();
        let desc = CopyTaskDesc::blit(&AppConfig::new(dir.path(), EntryStyle::Graph));
        assert!(CpuPresenter::new([4, 2]).build_task(&desc).is_err());
    }

    #[test]
    fn blit_modulates_colour_by_source() {
        let dir = crate::runtime::cpu::test_bundles();
        let desc = CopyTaskDesc::blit(&AppConfig::new(dir.path(), EntryStyle::Graph));
        let mut presenter = CpuPresenter::new([4, 2]);
        let task = presenter.build_task(&desc).unwrap();

        let mut runtime = CpuRuntime::new();
        let canvas = runtime
            .allocate_ndarray(DataType::F32, Shape::new(&[2, 4]).unwrap())
            .unwrap();
        for (i, word) in canvas.memory().write().iter_mut().enumerate() {
            *word = (i as f32 / 8.0).to_bits();
        }

        let image = presenter.acquire_next_image().unwrap();
        let uniform = presenter
            .upload_uniform(BlitUniforms {
                color: [1.0, 0.5, 0.0, 1.0],
                size: [4, 2],
            })
            .unwrap();
        presenter
            .submit_and_present(BlitInvocation {
                task: &task,
                uniform,
                storage: runtime.export_memory(&canvas).unwrap(),
                image,
                workgroups: [1, 1, 1],
            })
            .unwrap();

        let texels = presenter.last_presented().unwrap();
        assert_eq!(texels[0], [0.0, 0.0, 0.0, 0.0]);
        assert_eq!(texels[5], [5.0 / 8.0, 2.5 / 8.0, 0.0, 5.0 / 8.0]);
        assert_eq!(presenter.stats().submits, 1);
    }
}

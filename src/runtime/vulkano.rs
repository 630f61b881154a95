//! Vulkan compute backend on the device and queue of a [`GraphicsContext`].
//!
//! Launches are recorded into one primary command buffer; `flush` submits it
//! and keeps the fence, `wait` blocks on that fence and then on the device.

pub mod buffer;
pub mod dispatch;
pub mod pipeline;

use std::{mem::size_of, sync::Arc};

use log::debug;
use vulkano::{
    buffer::{BufferUsage, Subbuffer},
    command_buffer::{
        allocator::StandardCommandBufferAllocator, AutoCommandBufferBuilder, CommandBufferExecFuture,
        CommandBufferUsage, PrimaryAutoCommandBuffer,
    },
    descriptor_set::{
        allocator::StandardDescriptorSetAllocator, layout::DescriptorType, DescriptorSet,
        WriteDescriptorSet,
    },
    device::{Device, Queue},
    memory::allocator::StandardMemoryAllocator,
    pipeline::{ComputePipeline, Pipeline},
    sync::{
        self,
        future::{FenceSignalFuture, NowFuture},
        GpuFuture,
    },
    DeviceSize,
};

use crate::{
    error::{CrateResult, GraphitError},
    graphics::{context::GraphicsContext, error::GraphicsError},
    runtime::{
        module::{ArgDecl, KernelDecl, PushWords},
        AotModule, ComputeRuntime, DataType, LaunchPlan, NdArray, Shape,
    },
};

use self::{
    buffer::build_storage_buffer,
    dispatch::bind_and_dispatch,
    pipeline::{build_pipeline, descriptor_set_layout, entry_point, shader_module},
};

/// Kernel compiled into a compute pipeline
pub struct VulkanoKernel {
    name: String,
    pipeline: Arc<ComputePipeline>,
}

/// Ndarray memory exported to the presentation side, no copy involved
#[derive(Clone)]
pub struct VulkanoExport {
    pub buffer: Subbuffer<[f32]>,
    pub size: DeviceSize,
    pub usage: BufferUsage,
}

type InFlight = FenceSignalFuture<CommandBufferExecFuture<NowFuture>>;

pub struct VulkanoRuntime {
    device: Arc<Device>,
    queue: Arc<Queue>,
    memory_allocator: Arc<StandardMemoryAllocator>,
    descriptor_set_allocator: Arc<StandardDescriptorSetAllocator>,
    command_buffer_allocator: Arc<StandardCommandBufferAllocator>,
    recording: Option<AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>>,
    in_flight: Option<InFlight>,
}

impl VulkanoRuntime {
    /// Compute runtime sharing the device, queue and allocators of `context`
    pub fn from_context(context: &GraphicsContext) -> Self {
        Self {
            device: context.device().clone(),
            queue: context.queue().clone(),
            memory_allocator: context.memory_allocator().clone(),
            descriptor_set_allocator: context.descriptor_set_allocator().clone(),
            command_buffer_allocator: context.command_buffer_allocator().clone(),
            recording: None,
            in_flight: None,
        }
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    fn recording(&mut self) -> CrateResult<&mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>> {
        if self.recording.is_none() {
            self.recording = Some(AutoCommandBufferBuilder::primary(
                self.command_buffer_allocator.clone(),
                self.queue.queue_family_index(),
                CommandBufferUsage::OneTimeSubmit,
            )?);
        }
        self.recording
            .as_mut()
            .ok_or_else(|| GraphitError::Other("command buffer recording not started".into()))
    }
}

impl ComputeRuntime for VulkanoRuntime {
    type Memory = Subbuffer<[u32]>;
    type Kernel = VulkanoKernel;
    type Exported = VulkanoExport;

    fn allocate_ndarray(
        &mut self,
        dtype: DataType,
        shape: Shape,
    ) -> CrateResult<NdArray<Subbuffer<[u32]>>> {
        let len = shape.num_elements() as DeviceSize;
        let buffer = build_storage_buffer::<u32>(self.memory_allocator.clone(), len)?;
        let array = NdArray::new(shape, dtype, buffer);
        debug!(
            "allocated device ndarray {:?} {:?} ({} bytes)",
            array.shape().extents(),
            dtype,
            array.size_in_bytes()?
        );
        Ok(array)
    }

    fn create_kernel(&mut self, module: &AotModule, decl: &KernelDecl) -> CrateResult<VulkanoKernel> {
        let shader = shader_module(self.device.clone(), module.spirv_words())?;
        let entry = entry_point(&shader, &decl.entry_point)?;

        let storage_bindings: Vec<DescriptorType> = decl
            .args
            .iter()
            .filter(|arg| matches!(arg, ArgDecl::Ndarray { .. }))
            .map(|_| DescriptorType::StorageBuffer)
            .collect();
        let set_layout = descriptor_set_layout(self.device.clone(), &storage_bindings)?;
        let pipeline = build_pipeline(
            self.device.clone(),
            set_layout,
            entry,
            size_of::<PushWords>() as u32,
        )?;

        debug!(
            "compute pipeline for '{}' ({} storage bindings)",
            decl.entry_point,
            storage_bindings.len()
        );
        Ok(VulkanoKernel {
            name: decl.name.clone(),
            pipeline,
        })
    }

    fn dispatch(
        &mut self,
        kernel: &VulkanoKernel,
        plan: &LaunchPlan<'_, Subbuffer<[u32]>>,
    ) -> CrateResult<()> {
        let descriptor_set = if plan.arrays().is_empty() {
            None
        } else {
            let layout = kernel
                .pipeline
                .layout()
                .set_layouts()
                .first()
                .ok_or(GraphicsError::NoDescriptorSetLayout(0))?;
            let writes = plan
                .arrays()
                .iter()
                .enumerate()
                .map(|(binding, array)| WriteDescriptorSet::buffer(binding as u32, array.memory().clone()));
            Some(DescriptorSet::new(
                self.descriptor_set_allocator.clone(),
                layout.clone(),
                writes,
                [],
            )?)
        };

        let pipeline = kernel.pipeline.clone();
        let push_words = *plan.push_block();
        let workgroups = plan.workgroups();
        let builder = self.recording()?;
        bind_and_dispatch(builder, pipeline, Some(&push_words), descriptor_set, workgroups)?;
        debug!("recorded '{}' over {:?} workgroups", kernel.name, workgroups);
        Ok(())
    }

    fn flush(&mut self) -> CrateResult<()> {
        let Some(builder) = self.recording.take() else {
            return Ok(());
        };
        let command_buffer = builder.build()?;

        // Only one submission is ever outstanding
        if let Some(previous) = self.in_flight.take() {
            previous.wait(None)?;
        }
        let future = sync::now(self.device.clone())
            .then_execute(self.queue.clone(), command_buffer)?
            .then_signal_fence_and_flush()?;
        self.in_flight = Some(future);
        Ok(())
    }

    fn wait(&mut self) -> CrateResult<()> {
        if let Some(future) = self.in_flight.take() {
            future.wait(None)?;
        }
        unsafe { self.device.wait_idle()? };
        Ok(())
    }

    fn export_memory(&self, array: &NdArray<Subbuffer<[u32]>>) -> CrateResult<VulkanoExport> {
        let buffer = array.memory().clone();
        Ok(VulkanoExport {
            size: buffer.size(),
            usage: buffer.buffer().usage(),
            buffer: buffer.reinterpret::<[f32]>(),
        })
    }
}

use std::sync::Arc;

use vulkano::{
    command_buffer::{AutoCommandBufferBuilder, PrimaryAutoCommandBuffer},
    descriptor_set::DescriptorSet,
    pipeline::{ComputePipeline, Pipeline, PipelineBindPoint},
};

use crate::{error::CrateResult, runtime::module::PushWords};

/// Bind the pipeline, its push constants and descriptor set, and dispatch
/// `num_wg` groups
/// This is basically like:
/// * providing arguments (the descriptor set)
/// * to a function/function pointer (the pipeline)
/// * then calling it (dispatch)
pub fn bind_and_dispatch(
    builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
    pipeline: Arc<ComputePipeline>,
    push_words: Option<&PushWords>,
    descriptor_set: Option<Arc<DescriptorSet>>,
    num_wg: [u32; 3],
) -> CrateResult<()> {
    builder.bind_pipeline_compute(pipeline.clone())?;
    if let Some(words) = push_words {
        builder.push_constants(pipeline.layout().clone(), 0, *words)?;
    }
    if let Some(descriptor_set) = descriptor_set {
        builder.bind_descriptor_sets(
            PipelineBindPoint::Compute,
            pipeline.layout().clone(),
            0,
            descriptor_set,
        )?;
    }
    unsafe {
        builder.dispatch(num_wg)?;
    }
    Ok(())
}

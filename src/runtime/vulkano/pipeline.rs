use std::{collections::BTreeMap, sync::Arc};

use vulkano::{
    descriptor_set::layout::{
        DescriptorSetLayout, DescriptorSetLayoutBinding, DescriptorSetLayoutCreateInfo,
        DescriptorType,
    },
    device::Device,
    pipeline::{
        compute::{ComputePipeline, ComputePipelineCreateInfo},
        layout::{PipelineLayout, PipelineLayoutCreateInfo, PushConstantRange},
        PipelineShaderStageCreateInfo,
    },
    shader::{EntryPoint, ShaderModule, ShaderModuleCreateInfo, ShaderStages},
};

use crate::{
    error::{CrateResult, GraphitError},
    graphics::error::GraphicsError,
};

pub fn shader_module(device: Arc<Device>, words: &[u32]) -> CrateResult<Arc<ShaderModule>> {
    // SAFETY: the words were checked for the SPIR-V magic on load and come
    // from the offline shader build
    unsafe { ShaderModule::new(device, ShaderModuleCreateInfo::new(words)) }
        .map_err(|e| GraphicsError::ShaderModule(format!("{e:?}")).into())
}

pub fn entry_point(module: &Arc<ShaderModule>, name: &str) -> CrateResult<EntryPoint> {
    module
        .entry_point(name)
        .ok_or_else(|| GraphitError::EntryPointNotFound(name.to_string()))
}

/// Set 0 layout with binding `i` of type `types[i]`, visible to compute
pub fn descriptor_set_layout(
    device: Arc<Device>,
    types: &[DescriptorType],
) -> CrateResult<Arc<DescriptorSetLayout>> {
    let mut bindings = BTreeMap::new();
    for (binding, ty) in types.iter().enumerate() {
        let mut binding_desc = DescriptorSetLayoutBinding::descriptor_type(*ty);
        binding_desc.stages = ShaderStages::COMPUTE;
        binding_desc.descriptor_count = 1;
        bindings.insert(binding as u32, binding_desc);
    }

    let layout = DescriptorSetLayout::new(
        device,
        DescriptorSetLayoutCreateInfo {
            bindings,
            ..Default::default()
        },
    )?;
    Ok(layout)
}

/// Compute pipeline over one descriptor set, with `push_constant_size` bytes
/// of push constants (none when 0)
pub fn build_pipeline(
    device: Arc<Device>,
    descriptor_set_layout: Arc<DescriptorSetLayout>,
    entry_point: EntryPoint,
    push_constant_size: u32,
) -> CrateResult<Arc<ComputePipeline>> {
    let push_constant_ranges = if push_constant_size > 0 {
        vec![PushConstantRange {
            stages: ShaderStages::COMPUTE,
            offset: 0,
            size: push_constant_size,
        }]
    } else {
        Vec::new()
    };

    let pipeline_layout = PipelineLayout::new(
        device.clone(),
        PipelineLayoutCreateInfo {
            set_layouts: vec![descriptor_set_layout],
            push_constant_ranges,
            ..Default::default()
        },
    )?;

    let stage = PipelineShaderStageCreateInfo::new(entry_point);
    let pipeline_info = ComputePipelineCreateInfo::stage_layout(stage, pipeline_layout);
    let pipeline = ComputePipeline::new(device, None, pipeline_info)?;
    Ok(pipeline)
}

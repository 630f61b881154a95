//! Device and queue setup shared by compute and presentation
//!
//! One queue family has to do both: the fractal launches and the blit are
//! compute work, and the blit result is presented from the same queue.

use std::sync::Arc;

use log::info;
use vulkano::{
    device::{
        physical::{PhysicalDevice, PhysicalDeviceType},
        Device, DeviceCreateInfo, DeviceExtensions, DeviceFeatures, Queue, QueueCreateInfo,
        QueueFlags,
    },
    instance::{Instance, InstanceCreateFlags, InstanceCreateInfo, InstanceExtensions},
    swapchain::Surface,
    VulkanLibrary,
};

use crate::{
    error::{CrateResult, GraphitError},
    graphics::error::GraphicsError,
};

pub fn required_extensions() -> DeviceExtensions {
    DeviceExtensions {
        khr_swapchain: true,
        ..DeviceExtensions::empty()
    }
}

/// Features the rust-gpu shaders rely on: the Vulkan memory model, scalar
/// block layout for the uniform and push blocks, and storage image writes
/// without a declared format.
pub fn required_features() -> DeviceFeatures {
    let mut features = DeviceFeatures::empty();
    features.vulkan_memory_model = true;
    features.scalar_block_layout = true;
    features.shader_storage_image_write_without_format = true;
    features
}

/// Find a physical device and queue family for compute + presentation
///
/// This function filters devices by:
/// 1. Support for the swapchain extension and the shader features
/// 2. A queue family that supports COMPUTE and GRAPHICS and presents to `surface`
/// 3. Preference for discrete GPUs over integrated/virtual/CPU devices
pub fn select_physical_device(
    instance: &Arc<Instance>,
    surface: &Arc<Surface>,
    device_extensions: &DeviceExtensions,
    device_features: &DeviceFeatures,
) -> CrateResult<(Arc<PhysicalDevice>, u32)> {
    let devices: Vec<_> = instance.enumerate_physical_devices()?.collect();
    if devices.is_empty() {
        return Err(GraphitError::NoVulkanDevice(0));
    }

    devices
        .into_iter()
        .filter(|p| p.supported_extensions().contains(device_extensions))
        .filter(|p| p.supported_features().contains(device_features))
        .filter_map(|p| {
            p.queue_family_properties()
                .iter()
                .enumerate()
                .position(|(i, q)| {
                    q.queue_flags
                        .contains(QueueFlags::GRAPHICS | QueueFlags::COMPUTE)
                        && p.surface_support(i as u32, surface).unwrap_or(false)
                })
                .map(|q| (p, q as u32))
        })
        .min_by_key(|(p, _)| match p.properties().device_type {
            PhysicalDeviceType::DiscreteGpu => 0,
            PhysicalDeviceType::IntegratedGpu => 1,
            PhysicalDeviceType::VirtualGpu => 2,
            PhysicalDeviceType::Cpu => 3,
            _ => 4,
        })
        .ok_or(GraphicsError::NoSuitableDevice.into())
}

/// Create a Vulkan instance with extensions required for windowing
pub fn create_instance_for_windowing(
    required_extensions: InstanceExtensions,
) -> CrateResult<Arc<Instance>> {
    let library = VulkanLibrary::new()?;
    let instance = Instance::new(
        library,
        InstanceCreateInfo {
            flags: InstanceCreateFlags::ENUMERATE_PORTABILITY,
            enabled_extensions: required_extensions,
            ..Default::default()
        },
    )?;
    Ok(instance)
}

/// Logical device and its single compute + present queue
pub fn create_device(
    instance: &Arc<Instance>,
    surface: &Arc<Surface>,
) -> CrateResult<(Arc<Device>, Arc<Queue>)> {
    let extensions = required_extensions();
    let features = required_features();
    let (physical, queue_family_index) =
        select_physical_device(instance, surface, &extensions, &features)?;

    info!(
        "Using device: {} (type: {:?})",
        physical.properties().device_name,
        physical.properties().device_type
    );

    let (device, mut queues) = Device::new(
        physical,
        DeviceCreateInfo {
            queue_create_infos: vec![QueueCreateInfo {
                queue_family_index,
                ..Default::default()
            }],
            enabled_extensions: extensions,
            enabled_features: features,
            ..Default::default()
        },
    )?;

    let queue = queues
        .next()
        .ok_or_else(|| GraphitError::Other("No queue available".to_string()))?;

    Ok((device, queue))
}

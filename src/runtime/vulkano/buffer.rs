use std::sync::Arc;

use vulkano::{
    buffer::{Buffer, BufferContents, BufferCreateInfo, BufferUsage, Subbuffer},
    memory::allocator::{AllocationCreateInfo, MemoryTypeFilter, StandardMemoryAllocator},
    DeviceSize,
};

use crate::error::CrateResult;

/// Usage of ndarray buffers: bound as storage by kernels and by the blit
pub fn ndarray_usage() -> BufferUsage {
    BufferUsage::STORAGE_BUFFER | BufferUsage::TRANSFER_SRC | BufferUsage::TRANSFER_DST
}

/// Device-local storage buffer of `len` elements, contents undefined
pub fn build_storage_buffer<T: BufferContents>(
    memory_allocator: Arc<StandardMemoryAllocator>,
    len: DeviceSize,
) -> CrateResult<Subbuffer<[T]>> {
    let buffer = Buffer::new_slice::<T>(
        memory_allocator,
        BufferCreateInfo {
            usage: ndarray_usage(),
            ..Default::default()
        },
        AllocationCreateInfo {
            memory_type_filter: MemoryTypeFilter::PREFER_DEVICE,
            ..Default::default()
        },
        len,
    )?;
    Ok(buffer)
}

/// Host-written uniform buffer holding `data`
pub fn build_uniform_buffer<T: BufferContents>(
    memory_allocator: Arc<StandardMemoryAllocator>,
    data: T,
) -> CrateResult<Subbuffer<T>> {
    let buffer = Buffer::from_data(
        memory_allocator,
        BufferCreateInfo {
            usage: BufferUsage::UNIFORM_BUFFER,
            ..Default::default()
        },
        AllocationCreateInfo {
            memory_type_filter: MemoryTypeFilter::PREFER_DEVICE
                | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
            ..Default::default()
        },
        data,
    )?;
    Ok(buffer)
}

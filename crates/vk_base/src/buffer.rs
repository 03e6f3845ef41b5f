//! Buffer allocation support for frame delegates
//!
//! Host-visible buffer helpers built on the crate's memory type selection,
//! so drawing scenarios can upload vertex, index, and uniform data without
//! re-implementing allocation. Geometry content itself is the delegate's
//! business; this module only moves bytes.

use ash::{vk, Device};
use std::mem;

use crate::context::{VulkanError, VulkanResult};
use crate::memory;

/// Buffer plus its backing memory, with RAII cleanup
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a buffer and bind freshly allocated memory to it
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device
                .create_buffer(&buffer_info, None)
                .map_err(VulkanError::Api)?
        };

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_type_index = memory::find_memory_type(
            requirements.memory_type_bits,
            properties,
            memory_properties,
        )?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe {
            device
                .allocate_memory(&alloc_info, None)
                .map_err(VulkanError::Api)?
        };

        unsafe {
            device
                .bind_buffer_memory(buffer, memory, 0)
                .map_err(VulkanError::Api)?;
        }

        Ok(Self {
            device,
            buffer,
            memory,
            size,
        })
    }

    /// Copy a slice into the buffer through a map/unmap pair
    pub fn write_data<T: Copy>(&self, data: &[T]) -> VulkanResult<()> {
        let byte_len = mem::size_of_val(data);
        if byte_len as vk::DeviceSize > self.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!("write of {byte_len} bytes into {}-byte buffer", self.size),
            });
        }

        unsafe {
            let mapped = self
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?;
            std::ptr::copy_nonoverlapping(data.as_ptr().cast(), mapped, byte_len);
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Allocated size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Host-visible vertex buffer
pub struct VertexBuffer {
    buffer: Buffer,
}

impl VertexBuffer {
    /// Create and fill a vertex buffer
    pub fn new<T: Copy>(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        vertices: &[T],
    ) -> VulkanResult<Self> {
        let size = mem::size_of_val(vertices) as vk::DeviceSize;
        let buffer = Buffer::new(
            device,
            memory_properties,
            size,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        buffer.write_data(vertices)?;
        Ok(Self { buffer })
    }

    /// Buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }
}

/// Host-visible index buffer
pub struct IndexBuffer {
    buffer: Buffer,
    index_count: u32,
}

impl IndexBuffer {
    /// Create and fill an index buffer
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        indices: &[u32],
    ) -> VulkanResult<Self> {
        let size = mem::size_of_val(indices) as vk::DeviceSize;
        let buffer = Buffer::new(
            device,
            memory_properties,
            size,
            vk::BufferUsageFlags::INDEX_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        buffer.write_data(indices)?;
        Ok(Self {
            buffer,
            index_count: indices.len() as u32,
        })
    }

    /// Buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Number of indices
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// Host-visible uniform buffer for one `T`.
///
/// Delegates typically keep one copy per swapchain image and pick the copy
/// matching the frame index passed to `record_frame`.
pub struct UniformBuffer<T> {
    buffer: Buffer,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Copy> UniformBuffer<T> {
    /// Create an uninitialized uniform buffer sized for `T`
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
    ) -> VulkanResult<Self> {
        let buffer = Buffer::new(
            device,
            memory_properties,
            mem::size_of::<T>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        Ok(Self {
            buffer,
            _marker: std::marker::PhantomData,
        })
    }

    /// Overwrite the uniform contents
    pub fn update(&self, data: &T) -> VulkanResult<()> {
        self.buffer.write_data(std::slice::from_ref(data))
    }

    /// Buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }
}

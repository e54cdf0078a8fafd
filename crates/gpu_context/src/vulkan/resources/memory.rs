//! Device memory allocation and mapped transfers
//!
//! One allocation backs exactly one image or buffer; there is no
//! sub-allocation. Memory type selection is a first-fit scan over the
//! physical device's type table.

use ash::vk;
use std::ptr::NonNull;

use crate::vulkan::error::{CheckNative, VulkanError, VulkanResult};
use crate::vulkan::handle::Memory;
use crate::vulkan::initialization::device::Device;

/// Find the first memory type allowed by `type_bits` whose flags contain `flags`
pub fn select_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    flags: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    let count = properties.memory_type_count.min(vk::MAX_MEMORY_TYPES as u32);

    (0..count)
        .find(|&index| {
            type_bits & (1 << index) != 0
                && properties.memory_types[index as usize]
                    .property_flags
                    .contains(flags)
        })
        .ok_or_else(|| {
            VulkanError::exhausted(format!(
                "no memory type matches bits {type_bits:#b} with flags {flags:?}"
            ))
        })
}

/// Device memory with the size it was allocated with
pub struct Allocation {
    memory: Memory,
    size: vk::DeviceSize,
}

impl Allocation {
    /// Raw memory handle
    pub fn handle(&self) -> vk::DeviceMemory {
        self.memory.handle()
    }
}

/// Allocate memory satisfying `requirements` from the first suitable type
pub fn allocate(
    device: &Device,
    requirements: vk::MemoryRequirements,
    flags: vk::MemoryPropertyFlags,
) -> VulkanResult<Allocation> {
    let memory_type_index = select_memory_type(
        &device.physical().memory_properties,
        requirements.memory_type_bits,
        flags,
    )?;

    let info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);

    let handle = unsafe { device.raw().allocate_memory(&info, None) }.check()?;
    Ok(Allocation {
        memory: unsafe { Memory::from_raw(device.raw().clone(), handle) },
        size: requirements.size,
    })
}

/// Host access to a mappable allocation
///
/// # Safety
/// `size` must not exceed the mappable length. A successful `map` of a range
/// inside `size` must return a pointer valid for reads and writes of the
/// range until the matching `unmap`.
pub unsafe trait MemoryMapping {
    /// Mappable length in bytes
    fn size(&self) -> vk::DeviceSize;

    /// Map `size` bytes starting at `offset`
    fn map(&self, offset: vk::DeviceSize, size: vk::DeviceSize) -> VulkanResult<NonNull<u8>>;

    /// Release the current mapping
    fn unmap(&self);

    /// Make device writes in the range visible to the host
    fn invalidate(&self, offset: vk::DeviceSize, size: vk::DeviceSize) -> VulkanResult<()>;

    /// Make host writes in the range visible to the device
    fn flush(&self, offset: vk::DeviceSize, size: vk::DeviceSize) -> VulkanResult<()>;
}

/// Fail with `Validation` unless `offset..offset + len` lies within `size`
pub fn check_range(offset: vk::DeviceSize, len: vk::DeviceSize, size: vk::DeviceSize) -> VulkanResult<()> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(VulkanError::validation(format!(
            "range {offset}+{len} exceeds allocation of {size} bytes"
        ))),
    }
}

// The whole allocation is mapped, and flushes cover all of it, so ranges never
// need aligning to `nonCoherentAtomSize`.
unsafe impl MemoryMapping for Allocation {
    fn size(&self) -> vk::DeviceSize {
        self.size
    }

    fn map(&self, offset: vk::DeviceSize, size: vk::DeviceSize) -> VulkanResult<NonNull<u8>> {
        check_range(offset, size, self.size)?;
        let offset = usize::try_from(offset)
            .map_err(|_| VulkanError::validation(format!("offset {offset} exceeds the address space")))?;

        let pointer = unsafe {
            self.memory.parent().map_memory(
                self.memory.handle(),
                0,
                vk::WHOLE_SIZE,
                vk::MemoryMapFlags::empty(),
            )
        }
        .check()?;

        match NonNull::new(pointer.cast::<u8>()) {
            Some(base) => Ok(unsafe { NonNull::new_unchecked(base.as_ptr().add(offset)) }),
            None => {
                self.unmap();
                Err(VulkanError::native(vk::Result::ERROR_MEMORY_MAP_FAILED))
            }
        }
    }

    fn unmap(&self) {
        unsafe { self.memory.parent().unmap_memory(self.memory.handle()) };
    }

    fn invalidate(&self, _offset: vk::DeviceSize, _size: vk::DeviceSize) -> VulkanResult<()> {
        let range = whole_range(self.memory.handle());
        unsafe { self.memory.parent().invalidate_mapped_memory_ranges(&[range]) }.check()
    }

    fn flush(&self, _offset: vk::DeviceSize, _size: vk::DeviceSize) -> VulkanResult<()> {
        let range = whole_range(self.memory.handle());
        unsafe { self.memory.parent().flush_mapped_memory_ranges(&[range]) }.check()
    }
}

fn whole_range(memory: vk::DeviceMemory) -> vk::MappedMemoryRange {
    vk::MappedMemoryRange::builder()
        .memory(memory)
        .offset(0)
        .size(vk::WHOLE_SIZE)
        .build()
}

/// Live mapping, unmapped on drop
struct MappedRange<'a, M: MemoryMapping + ?Sized> {
    memory: &'a M,
    pointer: NonNull<u8>,
    len: usize,
}

impl<'a, M: MemoryMapping + ?Sized> MappedRange<'a, M> {
    fn new(memory: &'a M, offset: vk::DeviceSize, len: usize) -> VulkanResult<Self> {
        let size = byte_size(len)?;
        check_range(offset, size, memory.size())?;
        let pointer = memory.map(offset, size)?;
        Ok(Self {
            memory,
            pointer,
            len,
        })
    }

    fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.pointer.as_ptr(), self.len) }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.pointer.as_ptr(), self.len) }
    }
}

impl<M: MemoryMapping + ?Sized> Drop for MappedRange<'_, M> {
    fn drop(&mut self) {
        self.memory.unmap();
    }
}

fn byte_size(len: usize) -> VulkanResult<vk::DeviceSize> {
    vk::DeviceSize::try_from(len)
        .map_err(|_| VulkanError::validation(format!("{len} bytes do not fit a device size")))
}

/// Read `bytes.len()` bytes at `offset`, invalidating before the copy
pub fn read<M: MemoryMapping + ?Sized>(
    memory: &M,
    offset: vk::DeviceSize,
    bytes: &mut [u8],
) -> VulkanResult<()> {
    if bytes.is_empty() {
        return Ok(());
    }

    let mapping = MappedRange::new(memory, offset, bytes.len())?;
    memory.invalidate(offset, byte_size(bytes.len())?)?;
    bytes.copy_from_slice(mapping.bytes());
    Ok(())
}

/// Write `bytes` at `offset`, flushing after the copy
pub fn write<M: MemoryMapping + ?Sized>(
    memory: &M,
    offset: vk::DeviceSize,
    bytes: &[u8],
) -> VulkanResult<()> {
    if bytes.is_empty() {
        return Ok(());
    }

    let mut mapping = MappedRange::new(memory, offset, bytes.len())?;
    mapping.bytes_mut().copy_from_slice(bytes);
    memory.flush(offset, byte_size(bytes.len())?)
}

/// Typed variant of [`read`]
pub fn read_pod<M: MemoryMapping + ?Sized, T: bytemuck::Pod>(
    memory: &M,
    offset: vk::DeviceSize,
    values: &mut [T],
) -> VulkanResult<()> {
    read(memory, offset, bytemuck::cast_slice_mut(values))
}

/// Typed variant of [`write`]
pub fn write_pod<M: MemoryMapping + ?Sized, T: bytemuck::Pod>(
    memory: &M,
    offset: vk::DeviceSize,
    values: &[T],
) -> VulkanResult<()> {
    write(memory, offset, bytemuck::cast_slice(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// Host-side stand-in for a non-coherent allocation
    ///
    /// Mapped writes land in a staging copy and only reach `device` on flush;
    /// invalidate refreshes the staging copy from `device`.
    #[derive(Default)]
    struct HostMemory {
        device: RefCell<Vec<u8>>,
        staging: RefCell<Vec<u8>>,
        mapped: Cell<Option<(u64, u64)>>,
        unmaps: Cell<u32>,
        fail_flush: bool,
        fail_invalidate: bool,
    }

    impl HostMemory {
        fn with_size(size: usize) -> Self {
            Self {
                device: RefCell::new(vec![0; size]),
                staging: RefCell::new(vec![0; size]),
                ..Self::default()
            }
        }
    }

    unsafe impl MemoryMapping for HostMemory {
        fn size(&self) -> u64 {
            self.staging.borrow().len() as u64
        }

        fn map(&self, offset: u64, size: u64) -> VulkanResult<NonNull<u8>> {
            if self.mapped.get().is_some() {
                return Err(VulkanError::native(vk::Result::ERROR_MEMORY_MAP_FAILED));
            }
            let end = offset + size;
            if end > self.staging.borrow().len() as u64 {
                return Err(VulkanError::native(vk::Result::ERROR_MEMORY_MAP_FAILED));
            }
            self.mapped.set(Some((offset, size)));
            let base = self.staging.borrow_mut().as_mut_ptr();
            Ok(NonNull::new(unsafe { base.add(offset as usize) }).unwrap())
        }

        fn unmap(&self) {
            assert!(self.mapped.take().is_some(), "unmap without map");
            self.unmaps.set(self.unmaps.get() + 1);
        }

        fn invalidate(&self, offset: u64, size: u64) -> VulkanResult<()> {
            assert!(self.mapped.get().is_some());
            if self.fail_invalidate {
                return Err(VulkanError::native(vk::Result::ERROR_OUT_OF_HOST_MEMORY));
            }
            let range = offset as usize..(offset + size) as usize;
            self.staging.borrow_mut()[range.clone()]
                .copy_from_slice(&self.device.borrow()[range]);
            Ok(())
        }

        fn flush(&self, offset: u64, size: u64) -> VulkanResult<()> {
            assert!(self.mapped.get().is_some());
            if self.fail_flush {
                return Err(VulkanError::native(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
            }
            let range = offset as usize..(offset + size) as usize;
            self.device.borrow_mut()[range.clone()]
                .copy_from_slice(&self.staging.borrow()[range]);
            Ok(())
        }
    }

    fn memory_table(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties::default();
        properties.memory_type_count = flags.len() as u32;
        for (slot, &property_flags) in properties.memory_types.iter_mut().zip(flags) {
            slot.property_flags = property_flags;
        }
        properties
    }

    #[test]
    fn test_select_memory_type_first_fit_subset() {
        let table = memory_table(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);

        let index =
            select_memory_type(&table, 0b11, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn test_select_memory_type_zero_mask_exhausted() {
        let table = memory_table(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
        ]);

        let error = select_memory_type(&table, 0, vk::MemoryPropertyFlags::empty()).unwrap_err();
        assert!(matches!(error, VulkanError::ResourceExhausted { .. }));
    }

    #[test]
    fn test_select_memory_type_respects_mask() {
        let table = memory_table(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
        ]);

        let index =
            select_memory_type(&table, 0b10, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn test_select_memory_type_ignores_bits_past_type_count() {
        let table = memory_table(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);

        let result = select_memory_type(&table, 0b10, vk::MemoryPropertyFlags::empty());
        assert!(result.is_err());
    }

    #[test]
    fn test_write_then_read_round_trip() {
        const SIZE: usize = 64;
        let memory = HostMemory::with_size(SIZE);
        let mut transfers = 0;

        for offset in 0..SIZE {
            for len in 1..=SIZE - offset {
                let data: Vec<u8> = (0..len).map(|i| (i * 7 + offset + len) as u8).collect();
                write(&memory, offset as u64, &data).unwrap();

                let mut back = vec![0u8; len];
                read(&memory, offset as u64, &mut back).unwrap();
                assert_eq!(back, data, "offset {offset}, len {len}");
                transfers += 2;
            }
        }
        assert_eq!(memory.unmaps.get(), transfers);
    }

    #[test]
    fn test_out_of_range_transfer_is_validation() {
        let memory = HostMemory::with_size(16);

        let error = write(&memory, 1 << 20, &[0; 64]).unwrap_err();
        assert!(matches!(error, VulkanError::Validation { .. }));

        let mut out = [0u8; 4];
        assert!(matches!(read(&memory, 14, &mut out), Err(VulkanError::Validation { .. })));
        assert!(matches!(write(&memory, u64::MAX, &[1]), Err(VulkanError::Validation { .. })));

        assert!(memory.mapped.get().is_none());
        assert_eq!(memory.unmaps.get(), 0);
    }

    #[test]
    fn test_check_range_bounds() {
        assert!(check_range(0, 16, 16).is_ok());
        assert!(check_range(16, 0, 16).is_ok());
        assert!(check_range(15, 2, 16).is_err());
        assert!(check_range(u64::MAX, 1, 16).is_err());
    }

    #[test]
    fn test_pod_round_trip() {
        let memory = HostMemory::with_size(32);
        write_pod(&memory, 8, &[1.5f32, -2.0, 4.25]).unwrap();

        let mut back = [0f32; 3];
        read_pod(&memory, 8, &mut back).unwrap();
        assert_eq!(back, [1.5, -2.0, 4.25]);
    }

    #[test]
    fn test_flush_failure_still_unmaps() {
        let memory = HostMemory {
            fail_flush: true,
            ..HostMemory::with_size(16)
        };

        let error = write(&memory, 0, &[1, 2, 3]).unwrap_err();
        assert_eq!(error.code(), Some(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        assert_eq!(memory.unmaps.get(), 1);
        assert!(memory.mapped.get().is_none());
    }

    #[test]
    fn test_invalidate_failure_still_unmaps() {
        let memory = HostMemory {
            fail_invalidate: true,
            ..HostMemory::with_size(16)
        };

        let mut out = [0u8; 4];
        assert!(read(&memory, 4, &mut out).is_err());
        assert_eq!(memory.unmaps.get(), 1);
    }

    #[test]
    fn test_map_failure_does_not_unmap() {
        let memory = HostMemory::with_size(8);
        memory.mapped.set(Some((0, 8)));

        let error = write(&memory, 0, &[0; 4]).unwrap_err();
        assert_eq!(error.code(), Some(vk::Result::ERROR_MEMORY_MAP_FAILED));
        assert_eq!(memory.unmaps.get(), 0);
    }

    #[test]
    fn test_empty_transfer_is_noop() {
        let memory = HostMemory::with_size(4);
        write(&memory, 0, &[]).unwrap();
        read(&memory, 0, &mut []).unwrap();
        assert_eq!(memory.unmaps.get(), 0);
    }
}

//! CUDA device and stream-ordered memory resource.
//!
//! Loads the CUDA driver at runtime (no link-time dependency). Falls back
//! gracefully if CUDA is not available: `CudaDevice::try_new()` returns `Err`
//! and the device selector moves on to the host-emulated device.

use std::sync::Arc;

use gpuscalar_core::{Error, MemoryKind, Result};

use crate::device::{Device, RawStream};
use crate::ptr::DevicePtr;
use crate::resource::DeviceMemoryResource;
use crate::stream::Stream;
use ffi::{CUstream, CudaApi, CUDA_ERROR_OUT_OF_MEMORY};

pub mod dl;
pub mod ffi;

fn raw_to_cu(stream: RawStream) -> CUstream {
    stream as usize as CUstream
}

/// CUDA device 0 driven through the driver API.
pub struct CudaDevice {
    api: Arc<CudaApi>,
}

impl CudaDevice {
    /// Load the driver and create a context on device 0.
    pub fn try_new() -> Result<Self> {
        let api = Arc::new(CudaApi::load()?);
        tracing::info!(target: "gpuscalar::cuda", "Created CUDA context on device 0");
        Ok(Self { api })
    }

    /// Shared driver handle, used to build resources on this device.
    pub fn api(&self) -> &Arc<CudaApi> {
        &self.api
    }
}

impl Device for CudaDevice {
    fn name(&self) -> &'static str {
        "cuda"
    }

    fn memory_kind(&self) -> MemoryKind {
        MemoryKind::Cuda
    }

    fn create_stream(&self) -> Result<RawStream> {
        self.api.make_current()?;
        let stream = self.api.stream_create()?;
        Ok(stream as usize as RawStream)
    }

    fn destroy_stream(&self, stream: RawStream) -> Result<()> {
        self.api.make_current()?;
        self.api.stream_destroy(raw_to_cu(stream))
    }

    unsafe fn memset_async(
        &self,
        dst: DevicePtr,
        value: u8,
        bytes: usize,
        stream: RawStream,
    ) -> Result<()> {
        if bytes == 0 {
            return Ok(());
        }
        self.api.make_current()?;
        self.api.memset_d8_async(dst.addr(), value, bytes, raw_to_cu(stream))
    }

    unsafe fn copy_host_to_device_async(
        &self,
        dst: DevicePtr,
        src: &[u8],
        stream: RawStream,
    ) -> Result<()> {
        if src.is_empty() {
            return Ok(());
        }
        self.api.make_current()?;
        self.api.memcpy_h_to_d_async(dst.addr(), src, raw_to_cu(stream))
    }

    unsafe fn copy_device_to_device_async(
        &self,
        dst: DevicePtr,
        src: DevicePtr,
        bytes: usize,
        stream: RawStream,
    ) -> Result<()> {
        if bytes == 0 {
            return Ok(());
        }
        self.api.make_current()?;
        self.api
            .memcpy_d_to_d_async(dst.addr(), src.addr(), bytes, raw_to_cu(stream))
    }

    unsafe fn copy_device_to_host(
        &self,
        dst: &mut [u8],
        src: DevicePtr,
        stream: RawStream,
    ) -> Result<()> {
        self.api.make_current()?;
        self.api.stream_synchronize(raw_to_cu(stream))?;
        if dst.is_empty() {
            return Ok(());
        }
        self.api.memcpy_d_to_h(dst, src.addr())
    }

    fn synchronize(&self, stream: RawStream) -> Result<()> {
        self.api.make_current()?;
        self.api.stream_synchronize(raw_to_cu(stream))
    }
}

/// Stream-ordered resource over `cuMemAllocAsync` / `cuMemFreeAsync`.
pub struct CudaAsyncMemoryResource {
    api: Arc<CudaApi>,
}

impl CudaAsyncMemoryResource {
    /// Allocate from `device`'s default memory pool.
    pub fn new(device: &CudaDevice) -> Self {
        Self {
            api: Arc::clone(device.api()),
        }
    }
}

impl DeviceMemoryResource for CudaAsyncMemoryResource {
    fn allocate(&self, bytes: usize, stream: &Stream) -> Result<DevicePtr> {
        if bytes == 0 {
            return Ok(DevicePtr::NULL);
        }
        self.api.make_current()?;
        match self.api.mem_alloc_async(bytes, raw_to_cu(stream.raw())) {
            Ok(dptr) => {
                tracing::debug!(target: "gpuscalar::cuda", ptr = dptr, bytes, stream = %stream.id(), "cuMemAllocAsync");
                Ok(DevicePtr::new(dptr))
            }
            Err(CUDA_ERROR_OUT_OF_MEMORY) => Err(Error::out_of_memory(
                bytes,
                self.name(),
                "CUDA_ERROR_OUT_OF_MEMORY",
            )),
            Err(rc) => Err(Error::device(format!(
                "cuMemAllocAsync failed with CUDA error code {}",
                rc
            ))),
        }
    }

    fn deallocate(&self, ptr: DevicePtr, bytes: usize, stream: &Stream) -> Result<()> {
        if ptr.is_null() {
            return Ok(());
        }
        self.api.make_current()?;
        self.api.mem_free_async(ptr.addr(), raw_to_cu(stream.raw()))?;
        tracing::debug!(target: "gpuscalar::cuda", %ptr, bytes, stream = %stream.id(), "cuMemFreeAsync");
        Ok(())
    }

    fn memory_kind(&self) -> MemoryKind {
        MemoryKind::Cuda
    }

    fn name(&self) -> &'static str {
        "cuda_async"
    }
}

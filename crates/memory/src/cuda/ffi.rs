//! CUDA Driver API bindings loaded at runtime.
//!
//! Only the calls needed for stream-ordered allocation, fills and copies are
//! resolved. Function pointers are looked up once in `CudaApi::load()` and
//! cached for the lifetime of the process.

use std::ffi::CStr;
use std::os::raw::c_void;

use gpuscalar_core::{Error, Result};

use super::dl::SharedLibrary;

// ---------------------------------------------------------------------------
// CUDA Driver API types
// ---------------------------------------------------------------------------

/// CUDA error code.
pub type CUresult = i32;
/// CUDA device ordinal.
pub type CUdevice = i32;
/// Opaque CUDA context handle.
pub type CUcontext = *mut c_void;
/// Device pointer (64-bit address on the GPU).
pub type CUdeviceptr = u64;
/// Opaque CUDA stream handle.
pub type CUstream = *mut c_void;

/// Successful CUDA API call.
pub const CUDA_SUCCESS: CUresult = 0;
/// The device could not satisfy an allocation.
pub const CUDA_ERROR_OUT_OF_MEMORY: CUresult = 2;

type FnCuInit = unsafe extern "C" fn(flags: u32) -> CUresult;
type FnCuDeviceGetCount = unsafe extern "C" fn(count: *mut i32) -> CUresult;
type FnCuDeviceGet = unsafe extern "C" fn(device: *mut CUdevice, ordinal: i32) -> CUresult;
type FnCuCtxCreate = unsafe extern "C" fn(ctx: *mut CUcontext, flags: u32, dev: CUdevice) -> CUresult;
type FnCuCtxDestroy = unsafe extern "C" fn(ctx: CUcontext) -> CUresult;
type FnCuCtxSetCurrent = unsafe extern "C" fn(ctx: CUcontext) -> CUresult;
type FnCuMemAllocAsync =
    unsafe extern "C" fn(dptr: *mut CUdeviceptr, bytesize: usize, stream: CUstream) -> CUresult;
type FnCuMemFreeAsync = unsafe extern "C" fn(dptr: CUdeviceptr, stream: CUstream) -> CUresult;
type FnCuMemsetD8Async =
    unsafe extern "C" fn(dptr: CUdeviceptr, value: u8, count: usize, stream: CUstream) -> CUresult;
type FnCuMemcpyHtoDAsync = unsafe extern "C" fn(
    dst: CUdeviceptr,
    src: *const c_void,
    bytesize: usize,
    stream: CUstream,
) -> CUresult;
type FnCuMemcpyDtoDAsync = unsafe extern "C" fn(
    dst: CUdeviceptr,
    src: CUdeviceptr,
    bytesize: usize,
    stream: CUstream,
) -> CUresult;
type FnCuMemcpyDtoH =
    unsafe extern "C" fn(dst: *mut c_void, src: CUdeviceptr, bytesize: usize) -> CUresult;
type FnCuStreamCreate = unsafe extern "C" fn(stream: *mut CUstream, flags: u32) -> CUresult;
type FnCuStreamSynchronize = unsafe extern "C" fn(stream: CUstream) -> CUresult;
type FnCuStreamDestroy = unsafe extern "C" fn(stream: CUstream) -> CUresult;

/// The dynamically loaded driver library and its resolved entry points.
pub struct CudaApi {
    _lib: SharedLibrary,
    /// Context created on device 0.
    pub ctx: CUcontext,

    cu_ctx_destroy: FnCuCtxDestroy,
    cu_ctx_set_current: FnCuCtxSetCurrent,
    cu_mem_alloc_async: FnCuMemAllocAsync,
    cu_mem_free_async: FnCuMemFreeAsync,
    cu_memset_d8_async: FnCuMemsetD8Async,
    cu_memcpy_h_to_d_async: FnCuMemcpyHtoDAsync,
    cu_memcpy_d_to_d_async: FnCuMemcpyDtoDAsync,
    cu_memcpy_d_to_h: FnCuMemcpyDtoH,
    cu_stream_create: FnCuStreamCreate,
    cu_stream_synchronize: FnCuStreamSynchronize,
    cu_stream_destroy: FnCuStreamDestroy,
}

// SAFETY: The driver API is thread-safe; the context is bound to the calling
// thread before each call.
unsafe impl Send for CudaApi {}
unsafe impl Sync for CudaApi {}

macro_rules! load_sym {
    ($lib:expr, $name:expr) => {{
        // SAFETY: the target type is the documented driver signature.
        unsafe { std::mem::transmute::<*mut c_void, _>($lib.symbol($name)?) }
    }};
}

#[cfg(unix)]
const DRIVER_LIBRARIES: &[&CStr] = &[c"libcuda.so.1", c"libcuda.so"];
#[cfg(windows)]
const DRIVER_LIBRARIES: &[&CStr] = &[c"nvcuda.dll"];
#[cfg(not(any(unix, windows)))]
const DRIVER_LIBRARIES: &[&CStr] = &[];

impl CudaApi {
    /// Load the driver, initialize it and create a context on device 0.
    pub fn load() -> Result<Self> {
        let lib = SharedLibrary::open_any(DRIVER_LIBRARIES)?;

        let cu_init: FnCuInit = load_sym!(lib, c"cuInit");
        let cu_device_get_count: FnCuDeviceGetCount = load_sym!(lib, c"cuDeviceGetCount");
        let cu_device_get: FnCuDeviceGet = load_sym!(lib, c"cuDeviceGet");
        let cu_ctx_create: FnCuCtxCreate = load_sym!(lib, c"cuCtxCreate_v2");
        let cu_ctx_destroy: FnCuCtxDestroy = load_sym!(lib, c"cuCtxDestroy_v2");
        let cu_ctx_set_current: FnCuCtxSetCurrent = load_sym!(lib, c"cuCtxSetCurrent");
        let cu_mem_alloc_async: FnCuMemAllocAsync = load_sym!(lib, c"cuMemAllocAsync");
        let cu_mem_free_async: FnCuMemFreeAsync = load_sym!(lib, c"cuMemFreeAsync");
        let cu_memset_d8_async: FnCuMemsetD8Async = load_sym!(lib, c"cuMemsetD8Async");
        let cu_memcpy_h_to_d_async: FnCuMemcpyHtoDAsync = load_sym!(lib, c"cuMemcpyHtoDAsync_v2");
        let cu_memcpy_d_to_d_async: FnCuMemcpyDtoDAsync = load_sym!(lib, c"cuMemcpyDtoDAsync_v2");
        let cu_memcpy_d_to_h: FnCuMemcpyDtoH = load_sym!(lib, c"cuMemcpyDtoH_v2");
        let cu_stream_create: FnCuStreamCreate = load_sym!(lib, c"cuStreamCreate");
        let cu_stream_synchronize: FnCuStreamSynchronize = load_sym!(lib, c"cuStreamSynchronize");
        let cu_stream_destroy: FnCuStreamDestroy = load_sym!(lib, c"cuStreamDestroy_v2");

        check(unsafe { cu_init(0) }, "cuInit")?;

        let mut count: i32 = 0;
        check(unsafe { cu_device_get_count(&mut count) }, "cuDeviceGetCount")?;
        if count < 1 {
            return Err(Error::device("no CUDA devices found"));
        }

        let mut device: CUdevice = 0;
        check(unsafe { cu_device_get(&mut device, 0) }, "cuDeviceGet")?;

        let mut ctx: CUcontext = std::ptr::null_mut();
        check(unsafe { cu_ctx_create(&mut ctx, 0, device) }, "cuCtxCreate")?;

        Ok(Self {
            _lib: lib,
            ctx,
            cu_ctx_destroy,
            cu_ctx_set_current,
            cu_mem_alloc_async,
            cu_mem_free_async,
            cu_memset_d8_async,
            cu_memcpy_h_to_d_async,
            cu_memcpy_d_to_d_async,
            cu_memcpy_d_to_h,
            cu_stream_create,
            cu_stream_synchronize,
            cu_stream_destroy,
        })
    }

    /// Bind this API's context to the calling thread.
    pub fn make_current(&self) -> Result<()> {
        check(unsafe { (self.cu_ctx_set_current)(self.ctx) }, "cuCtxSetCurrent")
    }

    /// Stream-ordered allocation of `bytesize` bytes.
    pub fn mem_alloc_async(&self, bytesize: usize, stream: CUstream) -> std::result::Result<CUdeviceptr, CUresult> {
        let mut dptr: CUdeviceptr = 0;
        let rc = unsafe { (self.cu_mem_alloc_async)(&mut dptr, bytesize, stream) };
        if rc == CUDA_SUCCESS {
            Ok(dptr)
        } else {
            Err(rc)
        }
    }

    /// Stream-ordered release.
    pub fn mem_free_async(&self, dptr: CUdeviceptr, stream: CUstream) -> Result<()> {
        check(unsafe { (self.cu_mem_free_async)(dptr, stream) }, "cuMemFreeAsync")
    }

    /// Fill `count` bytes at `dptr` with `value`.
    ///
    /// # Safety
    ///
    /// The range must be live device memory.
    pub unsafe fn memset_d8_async(
        &self,
        dptr: CUdeviceptr,
        value: u8,
        count: usize,
        stream: CUstream,
    ) -> Result<()> {
        check((self.cu_memset_d8_async)(dptr, value, count, stream), "cuMemsetD8Async")
    }

    /// Copy host bytes to the device.
    ///
    /// # Safety
    ///
    /// The destination range must be live device memory.
    pub unsafe fn memcpy_h_to_d_async(
        &self,
        dst: CUdeviceptr,
        src: &[u8],
        stream: CUstream,
    ) -> Result<()> {
        check(
            (self.cu_memcpy_h_to_d_async)(dst, src.as_ptr() as *const c_void, src.len(), stream),
            "cuMemcpyHtoDAsync",
        )
    }

    /// Copy between device ranges.
    ///
    /// # Safety
    ///
    /// Both ranges must be live device memory.
    pub unsafe fn memcpy_d_to_d_async(
        &self,
        dst: CUdeviceptr,
        src: CUdeviceptr,
        bytesize: usize,
        stream: CUstream,
    ) -> Result<()> {
        check(
            (self.cu_memcpy_d_to_d_async)(dst, src, bytesize, stream),
            "cuMemcpyDtoDAsync",
        )
    }

    /// Blocking copy from the device to the host.
    ///
    /// # Safety
    ///
    /// The source range must be live device memory.
    pub unsafe fn memcpy_d_to_h(&self, dst: &mut [u8], src: CUdeviceptr) -> Result<()> {
        check(
            (self.cu_memcpy_d_to_h)(dst.as_mut_ptr() as *mut c_void, src, dst.len()),
            "cuMemcpyDtoH",
        )
    }

    /// Create a new stream.
    pub fn stream_create(&self) -> Result<CUstream> {
        let mut stream: CUstream = std::ptr::null_mut();
        check(unsafe { (self.cu_stream_create)(&mut stream, 0) }, "cuStreamCreate")?;
        Ok(stream)
    }

    /// Block until all work on `stream` is complete.
    pub fn stream_synchronize(&self, stream: CUstream) -> Result<()> {
        check(unsafe { (self.cu_stream_synchronize)(stream) }, "cuStreamSynchronize")
    }

    /// Destroy a stream.
    pub fn stream_destroy(&self, stream: CUstream) -> Result<()> {
        check(unsafe { (self.cu_stream_destroy)(stream) }, "cuStreamDestroy")
    }
}

impl Drop for CudaApi {
    fn drop(&mut self) {
        if !self.ctx.is_null() {
            let rc = unsafe { (self.cu_ctx_destroy)(self.ctx) };
            if rc != CUDA_SUCCESS {
                tracing::warn!(target: "gpuscalar::cuda", code = rc, "cuCtxDestroy failed");
            }
        }
    }
}

fn check(rc: CUresult, fn_name: &str) -> Result<()> {
    if rc == CUDA_SUCCESS {
        Ok(())
    } else {
        Err(Error::device(format!("{} failed with CUDA error code {}", fn_name, rc)))
    }
}

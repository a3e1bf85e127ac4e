//! The native calls the launcher makes, behind a trait.
//!
//! `OpenClApi` is the production implementation. Tests substitute a
//! recording runtime so binding and launch logic runs without a GPU.

use std::ffi::c_void;
use std::ptr;

use crate::error::{check_cl, ClError, Result};
use crate::ffi::{
    self, ClCommandQueue, ClInt, ClKernel, ClMem, ClUint, OpenClApi, CL_KERNEL_FUNCTION_NAME,
    CL_MEM_OBJECT_BUFFER, CL_MEM_OBJECT_IMAGE2D, CL_MEM_TYPE,
};
use crate::ndrange::NDRange;

/// A value handed to `clSetKernelArg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelArg<'a> {
    /// Argument bytes, copied by the runtime during the call.
    Bytes(&'a [u8]),
    /// `__local` memory of the given size; no value is passed.
    Local(usize),
}

impl KernelArg<'_> {
    pub fn size(&self) -> usize {
        match self {
            Self::Bytes(b) => b.len(),
            Self::Local(n) => *n,
        }
    }
}

/// Result of a `CL_MEM_TYPE` query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemObjectType {
    Buffer,
    Image2D,
    Other(ClUint),
}

impl MemObjectType {
    pub fn from_raw(raw: ClUint) -> Self {
        match raw {
            CL_MEM_OBJECT_BUFFER => Self::Buffer,
            CL_MEM_OBJECT_IMAGE2D => Self::Image2D,
            other => Self::Other(other),
        }
    }
}

/// OpenCL entry points used for argument binding and dispatch.
pub trait ClRuntime {
    /// `clSetKernelArg`. Returns the raw status code.
    fn set_kernel_arg(&self, kernel: ClKernel, index: u32, arg: KernelArg<'_>) -> ClInt;

    /// `clEnqueueNDRangeKernel` with no offset and no events. An unspecified
    /// `local` lets the runtime choose the work-group size.
    fn enqueue_nd_range_kernel(
        &self,
        queue: ClCommandQueue,
        kernel: ClKernel,
        global: &NDRange,
        local: &NDRange,
    ) -> ClInt;

    /// `clGetMemObjectInfo(CL_MEM_TYPE)`.
    fn mem_object_type(&self, mem: ClMem) -> Result<MemObjectType>;

    /// `clGetKernelInfo(CL_KERNEL_FUNCTION_NAME)`, for diagnostics.
    fn kernel_function_name(&self, kernel: ClKernel) -> Option<String>;
}

impl ClRuntime for OpenClApi {
    fn set_kernel_arg(&self, kernel: ClKernel, index: u32, arg: KernelArg<'_>) -> ClInt {
        let value = match arg {
            KernelArg::Bytes(b) => b.as_ptr() as *const c_void,
            KernelArg::Local(_) => ptr::null(),
        };
        unsafe { (self.cl_set_kernel_arg)(kernel.as_raw(), index, arg.size(), value) }
    }

    fn enqueue_nd_range_kernel(
        &self,
        queue: ClCommandQueue,
        kernel: ClKernel,
        global: &NDRange,
        local: &NDRange,
    ) -> ClInt {
        unsafe {
            (self.cl_enqueue_nd_range_kernel)(
                queue.as_raw(),
                kernel.as_raw(),
                global.size() as ClUint,
                ptr::null(),
                global.as_ptr(),
                local.as_ptr(),
                0,
                ptr::null(),
                ptr::null_mut(),
            )
        }
    }

    fn mem_object_type(&self, mem: ClMem) -> Result<MemObjectType> {
        let mut raw: ClUint = 0;
        let rc = unsafe {
            (self.cl_get_mem_object_info)(
                mem.as_raw(),
                CL_MEM_TYPE,
                std::mem::size_of::<ClUint>(),
                &mut raw as *mut ClUint as *mut c_void,
                ptr::null_mut(),
            )
        };
        check_cl(rc, "clGetMemObjectInfo(CL_MEM_TYPE)")?;
        Ok(MemObjectType::from_raw(raw))
    }

    fn kernel_function_name(&self, kernel: ClKernel) -> Option<String> {
        ffi::kernel_info_string(self, kernel, CL_KERNEL_FUNCTION_NAME)
    }
}

/// The process-wide OpenCL runtime.
pub fn default_runtime() -> Result<&'static OpenClApi> {
    ffi::opencl_api().ok_or(ClError::NotAvailable)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_arg_size() {
        assert_eq!(KernelArg::Bytes(&[0u8; 12]).size(), 12);
        assert_eq!(KernelArg::Local(4096).size(), 4096);
    }

    #[test]
    fn test_mem_object_type_from_raw() {
        assert_eq!(MemObjectType::from_raw(0x10F0), MemObjectType::Buffer);
        assert_eq!(MemObjectType::from_raw(0x10F1), MemObjectType::Image2D);
        assert_eq!(MemObjectType::from_raw(0x10F2), MemObjectType::Other(0x10F2));
    }

    #[test]
    fn test_default_runtime_matches_availability() {
        assert_eq!(default_runtime().is_ok(), ffi::is_opencl_available());
    }
}

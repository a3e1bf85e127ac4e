//! Runtime-loaded OpenCL function pointers via dlopen.
//!
//! Only the handful of entry points the launcher needs are resolved. The ICD
//! loader is opened lazily, so builds never link against a specific OpenCL
//! SDK and hosts without a GPU simply see `opencl_api() == None`.

use std::ffi::{c_char, c_void};
use std::fmt;
use std::sync::OnceLock;

use libloading::Library;

use crate::config::RuntimeConfig;
use crate::error::ClError;

// ---------------------------------------------------------------------------
// Scalar types and constants
// ---------------------------------------------------------------------------

pub type ClInt = i32;
pub type ClUint = u32;

pub const CL_SUCCESS: ClInt = 0;

// cl_mem_info / cl_kernel_info selectors
pub const CL_MEM_TYPE: ClUint = 0x1100;
pub const CL_KERNEL_FUNCTION_NAME: ClUint = 0x1190;

// cl_mem_object_type values
pub const CL_MEM_OBJECT_BUFFER: ClUint = 0x10F0;
pub const CL_MEM_OBJECT_IMAGE2D: ClUint = 0x10F1;

// ---------------------------------------------------------------------------
// Opaque handles
// ---------------------------------------------------------------------------

macro_rules! cl_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(transparent)]
        pub struct $name(*mut c_void);

        impl $name {
            /// Wrap a raw handle obtained from the OpenCL runtime.
            pub const fn from_raw(raw: *mut c_void) -> Self {
                Self(raw)
            }

            /// The raw handle, for passing back into OpenCL.
            pub const fn as_raw(self) -> *mut c_void {
                self.0
            }

            pub fn is_null(self) -> bool {
                self.0.is_null()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:p})"), self.0)
            }
        }

        // OpenCL objects are reference-counted and usable from any thread.
        unsafe impl Send for $name {}
        unsafe impl Sync for $name {}
    };
}

cl_handle!(
    /// `cl_kernel`. Argument bindings live on this object, so two launchers
    /// over the same kernel must not run concurrently (see `SharedKernel`).
    ClKernel
);
cl_handle!(
    /// `cl_mem`, either a linear buffer or an image2d.
    ClMem
);
cl_handle!(
    /// `cl_command_queue`.
    ClCommandQueue
);

// ---------------------------------------------------------------------------
// OpenCL API function signatures
// ---------------------------------------------------------------------------

type FnClSetKernelArg = unsafe extern "C" fn(
    *mut c_void, // kernel
    ClUint,      // arg_index
    usize,       // arg_size
    *const c_void,
) -> ClInt;
type FnClEnqueueNDRangeKernel = unsafe extern "C" fn(
    *mut c_void,        // command_queue
    *mut c_void,        // kernel
    ClUint,             // work_dim
    *const usize,       // global_work_offset
    *const usize,       // global_work_size
    *const usize,       // local_work_size (null = runtime picks)
    ClUint,             // num_events_in_wait_list
    *const *mut c_void, // event_wait_list
    *mut *mut c_void,   // event
) -> ClInt;
type FnClGetMemObjectInfo = unsafe extern "C" fn(
    *mut c_void, ClUint, usize, *mut c_void, *mut usize,
) -> ClInt;
type FnClGetKernelInfo = unsafe extern "C" fn(
    *mut c_void, ClUint, usize, *mut c_void, *mut usize,
) -> ClInt;

// ---------------------------------------------------------------------------
// Loaded API struct
// ---------------------------------------------------------------------------

pub struct OpenClApi {
    _lib: Library,
    pub cl_set_kernel_arg: FnClSetKernelArg,
    pub cl_enqueue_nd_range_kernel: FnClEnqueueNDRangeKernel,
    pub cl_get_mem_object_info: FnClGetMemObjectInfo,
    pub cl_get_kernel_info: FnClGetKernelInfo,
}

// Safety: the ICD dispatches to thread-safe entry points; the only call with
// per-object ordering requirements is clSetKernelArg, which callers serialize.
unsafe impl Send for OpenClApi {}
unsafe impl Sync for OpenClApi {}

static OPENCL_API: OnceLock<Option<OpenClApi>> = OnceLock::new();

impl OpenClApi {
    /// Load the OpenCL ICD loader from the first candidate path that opens
    /// and exports every required symbol.
    pub fn load(config: &RuntimeConfig) -> Result<Self, ClError> {
        for path in &config.library_paths {
            let lib = match unsafe { Library::new(path) } {
                Ok(lib) => lib,
                Err(e) => {
                    tracing::trace!("OpenCL library {} not loadable: {}", path.display(), e);
                    continue;
                }
            };
            if let Some(api) = Self::resolve(lib) {
                tracing::debug!("loaded OpenCL from {}", path.display());
                return Ok(api);
            }
            tracing::warn!("{} is missing required OpenCL symbols", path.display());
        }
        Err(ClError::NotAvailable)
    }

    fn resolve(lib: Library) -> Option<Self> {
        unsafe {
            let api = OpenClApi {
                cl_set_kernel_arg: *lib.get::<FnClSetKernelArg>(b"clSetKernelArg\0").ok()?,
                cl_enqueue_nd_range_kernel: *lib
                    .get::<FnClEnqueueNDRangeKernel>(b"clEnqueueNDRangeKernel\0")
                    .ok()?,
                cl_get_mem_object_info: *lib
                    .get::<FnClGetMemObjectInfo>(b"clGetMemObjectInfo\0")
                    .ok()?,
                cl_get_kernel_info: *lib.get::<FnClGetKernelInfo>(b"clGetKernelInfo\0").ok()?,
                _lib: lib,
            };
            Some(api)
        }
    }
}

/// Get the process-wide OpenCL API, loading it on first use with
/// [`RuntimeConfig::from_env`]. Returns `None` if no ICD loader was found.
pub fn opencl_api() -> Option<&'static OpenClApi> {
    OPENCL_API
        .get_or_init(|| OpenClApi::load(&RuntimeConfig::from_env()).ok())
        .as_ref()
}

/// Whether an OpenCL ICD loader could be opened on this host.
pub fn is_opencl_available() -> bool {
    opencl_api().is_some()
}

/// Read a NUL-terminated string-valued `clGetKernelInfo` query.
pub(crate) fn kernel_info_string(api: &OpenClApi, kernel: ClKernel, param: ClUint) -> Option<String> {
    let mut size = 0usize;
    let rc = unsafe {
        (api.cl_get_kernel_info)(kernel.as_raw(), param, 0, std::ptr::null_mut(), &mut size)
    };
    if rc != CL_SUCCESS || size == 0 {
        return None;
    }
    let mut buf = vec![0u8; size];
    let rc = unsafe {
        (api.cl_get_kernel_info)(
            kernel.as_raw(),
            param,
            buf.len(),
            buf.as_mut_ptr() as *mut c_char as *mut c_void,
            std::ptr::null_mut(),
        )
    };
    if rc != CL_SUCCESS {
        return None;
    }
    while buf.last() == Some(&0) {
        buf.pop();
    }
    Some(String::from_utf8_lossy(&buf).into_owned())
}

// ---------------------------------------------------------------------------
// Status code names
// ---------------------------------------------------------------------------

/// Symbolic name of an OpenCL status code.
pub fn error_string(code: ClInt) -> &'static str {
    match code {
        0 => "CL_SUCCESS",
        -1 => "CL_DEVICE_NOT_FOUND",
        -2 => "CL_DEVICE_NOT_AVAILABLE",
        -3 => "CL_COMPILER_NOT_AVAILABLE",
        -4 => "CL_MEM_OBJECT_ALLOCATION_FAILURE",
        -5 => "CL_OUT_OF_RESOURCES",
        -6 => "CL_OUT_OF_HOST_MEMORY",
        -7 => "CL_PROFILING_INFO_NOT_AVAILABLE",
        -8 => "CL_MEM_COPY_OVERLAP",
        -9 => "CL_IMAGE_FORMAT_MISMATCH",
        -10 => "CL_IMAGE_FORMAT_NOT_SUPPORTED",
        -11 => "CL_BUILD_PROGRAM_FAILURE",
        -12 => "CL_MAP_FAILURE",
        -13 => "CL_MISALIGNED_SUB_BUFFER_OFFSET",
        -14 => "CL_EXEC_STATUS_ERROR_FOR_EVENTS_IN_WAIT_LIST",
        -15 => "CL_COMPILE_PROGRAM_FAILURE",
        -16 => "CL_LINKER_NOT_AVAILABLE",
        -17 => "CL_LINK_PROGRAM_FAILURE",
        -18 => "CL_DEVICE_PARTITION_FAILED",
        -19 => "CL_KERNEL_ARG_INFO_NOT_AVAILABLE",
        -30 => "CL_INVALID_VALUE",
        -31 => "CL_INVALID_DEVICE_TYPE",
        -32 => "CL_INVALID_PLATFORM",
        -33 => "CL_INVALID_DEVICE",
        -34 => "CL_INVALID_CONTEXT",
        -35 => "CL_INVALID_QUEUE_PROPERTIES",
        -36 => "CL_INVALID_COMMAND_QUEUE",
        -37 => "CL_INVALID_HOST_PTR",
        -38 => "CL_INVALID_MEM_OBJECT",
        -39 => "CL_INVALID_IMAGE_FORMAT_DESCRIPTOR",
        -40 => "CL_INVALID_IMAGE_SIZE",
        -41 => "CL_INVALID_SAMPLER",
        -42 => "CL_INVALID_BINARY",
        -43 => "CL_INVALID_BUILD_OPTIONS",
        -44 => "CL_INVALID_PROGRAM",
        -45 => "CL_INVALID_PROGRAM_EXECUTABLE",
        -46 => "CL_INVALID_KERNEL_NAME",
        -47 => "CL_INVALID_KERNEL_DEFINITION",
        -48 => "CL_INVALID_KERNEL",
        -49 => "CL_INVALID_ARG_INDEX",
        -50 => "CL_INVALID_ARG_VALUE",
        -51 => "CL_INVALID_ARG_SIZE",
        -52 => "CL_INVALID_KERNEL_ARGS",
        -53 => "CL_INVALID_WORK_DIMENSION",
        -54 => "CL_INVALID_WORK_GROUP_SIZE",
        -55 => "CL_INVALID_WORK_ITEM_SIZE",
        -56 => "CL_INVALID_GLOBAL_OFFSET",
        -57 => "CL_INVALID_EVENT_WAIT_LIST",
        -58 => "CL_INVALID_EVENT",
        -59 => "CL_INVALID_OPERATION",
        -60 => "CL_INVALID_GL_OBJECT",
        -61 => "CL_INVALID_BUFFER_SIZE",
        -62 => "CL_INVALID_MIP_LEVEL",
        -63 => "CL_INVALID_GLOBAL_WORK_SIZE",
        -64 => "CL_INVALID_PROPERTY",
        -65 => "CL_INVALID_IMAGE_DESCRIPTOR",
        -66 => "CL_INVALID_COMPILER_OPTIONS",
        -67 => "CL_INVALID_LINKER_OPTIONS",
        -68 => "CL_INVALID_DEVICE_PARTITION_COUNT",
        -69 => "CL_INVALID_PIPE_SIZE",
        -70 => "CL_INVALID_DEVICE_QUEUE",
        -71 => "CL_INVALID_SPEC_ID",
        -72 => "CL_MAX_SIZE_RESTRICTION_EXCEEDED",
        -1000 => "CL_INVALID_GL_SHAREGROUP_REFERENCE_KHR",
        -1001 => "CL_PLATFORM_NOT_FOUND_KHR",
        -1002 => "CL_INVALID_D3D10_DEVICE_KHR",
        -1003 => "CL_INVALID_D3D10_RESOURCE_KHR",
        -1004 => "CL_D3D10_RESOURCE_ALREADY_ACQUIRED_KHR",
        -1005 => "CL_D3D10_RESOURCE_NOT_ACQUIRED_KHR",
        _ => "UNKNOWN_ERROR",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_string_known_codes() {
        assert_eq!(error_string(CL_SUCCESS), "CL_SUCCESS");
        assert_eq!(error_string(-5), "CL_OUT_OF_RESOURCES");
        assert_eq!(error_string(-49), "CL_INVALID_ARG_INDEX");
        assert_eq!(error_string(-54), "CL_INVALID_WORK_GROUP_SIZE");
        assert_eq!(error_string(-1001), "CL_PLATFORM_NOT_FOUND_KHR");
    }

    #[test]
    fn test_error_string_unknown() {
        assert_eq!(error_string(-20), "UNKNOWN_ERROR");
        assert_eq!(error_string(1), "UNKNOWN_ERROR");
        assert_eq!(error_string(i32::MIN), "UNKNOWN_ERROR");
    }

    #[test]
    fn test_handle_roundtrip() {
        let raw = 0x1000 as *mut c_void;
        let mem = ClMem::from_raw(raw);
        assert_eq!(mem.as_raw(), raw);
        assert!(!mem.is_null());
        assert!(ClKernel::from_raw(std::ptr::null_mut()).is_null());
        assert!(format!("{:?}", mem).starts_with("ClMem(0x"));
    }

    #[test]
    fn test_load_missing_library_is_not_available() {
        let config = RuntimeConfig::with_paths(vec!["/nonexistent/libOpenCL.so".into()]);
        assert!(matches!(OpenClApi::load(&config), Err(ClError::NotAvailable)));
    }

    #[test]
    fn test_availability_probe_does_not_panic() {
        let _ = is_opencl_available();
    }
}

//! Kernel argument binding and NDRange dispatch.
//!
//! ```ignore
//! let rt = kore_opencl::default_runtime()?;
//! KernelLauncher::new(rt, kernel)
//!     .set_image2d(&input)
//!     .set_image2d(&output)
//!     .set_int2([width, height])
//!     .launch(queue, &Image2DDesc::pack_from_tensor(output.shape()).as_nd_range())?;
//! ```

use parking_lot::Mutex;

use crate::error::{ClError, Result};
use crate::ffi::{ClCommandQueue, ClInt, ClKernel, ClMem, CL_SUCCESS};
use crate::memory::MemArg;
use crate::ndrange::NDRange;
use crate::runtime::{ClRuntime, KernelArg};

/// Integer types accepted by the `set_intN` setters; values are narrowed to
/// `cl_int`. Debug builds reject values outside the `cl_int` range.
pub trait ClIntArg: Copy {
    fn to_cl_int(self) -> ClInt;
}

macro_rules! impl_cl_int_arg {
    ($($t:ty),*) => {
        $(
            impl ClIntArg for $t {
                #[inline]
                #[track_caller]
                fn to_cl_int(self) -> ClInt {
                    debug_assert!(
                        ClInt::try_from(self).is_ok(),
                        "int vector lane {} does not fit in cl_int",
                        self
                    );
                    self as ClInt
                }
            }
        )*
    };
}

impl_cl_int_arg!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

/// The first argument slot that failed to bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindFailure {
    pub index: u32,
    pub code: ClInt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindState {
    /// Nothing bound yet.
    Idle,
    /// At least one argument bound, all succeeded.
    BoundOk,
    /// At least one bind failed.
    BoundWithError,
}

/// Binds kernel arguments in positional order, then enqueues the kernel.
///
/// Every setter consumes slot `next_index()` and advances it, even when the
/// native call fails, so later arguments still land in their intended slots.
/// Only the first failure is kept; `launch` reports it instead of enqueueing.
///
/// Bindings are stored on the `cl_kernel` itself, so launchers over the same
/// kernel must not run concurrently. Use [`SharedKernel`] when a kernel is
/// shared between threads.
pub struct KernelLauncher<'r> {
    runtime: &'r dyn ClRuntime,
    kernel: ClKernel,
    index: u32,
    first_error: Option<BindFailure>,
}

impl<'r> KernelLauncher<'r> {
    pub fn new(runtime: &'r dyn ClRuntime, kernel: ClKernel) -> Self {
        Self { runtime, kernel, index: 0, first_error: None }
    }

    pub fn kernel(&self) -> ClKernel {
        self.kernel
    }

    /// Slot the next setter binds to.
    pub fn next_index(&self) -> u32 {
        self.index
    }

    pub fn first_error(&self) -> Option<BindFailure> {
        self.first_error
    }

    pub fn state(&self) -> BindState {
        if self.first_error.is_some() {
            BindState::BoundWithError
        } else if self.index == 0 {
            BindState::Idle
        } else {
            BindState::BoundOk
        }
    }

    fn bind(mut self, arg: KernelArg<'_>) -> Self {
        let code = self.runtime.set_kernel_arg(self.kernel, self.index, arg);
        if code != CL_SUCCESS && self.first_error.is_none() {
            tracing::warn!(
                "clSetKernelArg failed for {:?} slot {}: {}",
                self.kernel,
                self.index,
                crate::ffi::error_string(code)
            );
            self.first_error = Some(BindFailure { index: self.index, code });
        }
        self.index += 1;
        self
    }

    /// Bind a plain-data value by its bytes.
    pub fn set_arg<T: bytemuck::Pod>(self, value: &T) -> Self {
        self.bind(KernelArg::Bytes(bytemuck::bytes_of(value)))
    }

    /// Reserve `bytes` of `__local` memory.
    pub fn set_shmem(self, bytes: usize) -> Self {
        self.bind(KernelArg::Local(bytes))
    }

    pub fn set_int2<T: ClIntArg>(self, v: [T; 2]) -> Self {
        let lanes: [ClInt; 2] = [v[0].to_cl_int(), v[1].to_cl_int()];
        self.set_arg(&lanes)
    }

    /// `int3` occupies 16 bytes; the fourth lane is zero.
    pub fn set_int3<T: ClIntArg>(self, v: [T; 3]) -> Self {
        let lanes: [ClInt; 4] = [v[0].to_cl_int(), v[1].to_cl_int(), v[2].to_cl_int(), 0];
        self.set_arg(&lanes)
    }

    pub fn set_int4<T: ClIntArg>(self, v: [T; 4]) -> Self {
        let lanes: [ClInt; 4] = [
            v[0].to_cl_int(),
            v[1].to_cl_int(),
            v[2].to_cl_int(),
            v[3].to_cl_int(),
        ];
        self.set_arg(&lanes)
    }

    fn bind_mem(self, mem: ClMem) -> Self {
        let handle = (mem.as_raw() as usize).to_ne_bytes();
        self.bind(KernelArg::Bytes(&handle))
    }

    /// Bind a linear buffer.
    #[track_caller]
    pub fn set_buffer<A: MemArg + ?Sized>(self, arg: &A) -> Self {
        let mem = arg.buffer_mem(self.runtime);
        self.bind_mem(mem)
    }

    /// Bind an image2d.
    #[track_caller]
    pub fn set_image2d<A: MemArg + ?Sized>(self, arg: &A) -> Self {
        let mem = arg.image2d_mem(self.runtime);
        self.bind_mem(mem)
    }

    /// Bind several buffers into consecutive slots.
    #[track_caller]
    pub fn set_buffers(self, args: &[&dyn MemArg]) -> Self {
        args.iter().fold(self, |l, arg| l.set_buffer(*arg))
    }

    #[track_caller]
    pub fn set_image2ds(self, args: &[&dyn MemArg]) -> Self {
        args.iter().fold(self, |l, arg| l.set_image2d(*arg))
    }

    fn kernel_name(&self) -> String {
        self.runtime
            .kernel_function_name(self.kernel)
            .unwrap_or_else(|| format!("{:?}", self.kernel))
    }

    /// Enqueue over `global`, letting the runtime choose the local size.
    pub fn launch(self, queue: ClCommandQueue, global: &NDRange) -> Result<()> {
        self.launch_with_local(queue, global, &NDRange::unspecified())
    }

    /// Enqueue over `global` with an explicit work-group size. If any bind
    /// failed, nothing is enqueued and the first failure is returned.
    pub fn launch_with_local(
        self,
        queue: ClCommandQueue,
        global: &NDRange,
        local: &NDRange,
    ) -> Result<()> {
        if let Some(failure) = self.first_error {
            return Err(ClError::ArgumentBinding {
                kernel: self.kernel_name(),
                index: failure.index,
                code: failure.code,
            });
        }
        enqueue_kernel(self.runtime, queue, self.kernel, global, local)
    }
}

/// Enqueue an already-bound kernel.
pub fn enqueue_kernel(
    runtime: &dyn ClRuntime,
    queue: ClCommandQueue,
    kernel: ClKernel,
    global: &NDRange,
    local: &NDRange,
) -> Result<()> {
    let code = runtime.enqueue_nd_range_kernel(queue, kernel, global, local);
    let name = || {
        runtime
            .kernel_function_name(kernel)
            .unwrap_or_else(|| format!("{:?}", kernel))
    };
    if code != CL_SUCCESS {
        let kernel = name();
        tracing::warn!(
            "clEnqueueNDRangeKernel failed for {}: {}",
            kernel,
            crate::ffi::error_string(code)
        );
        return Err(ClError::Launch {
            kernel,
            code,
            global: global.to_string(),
            local: local.to_string(),
        });
    }
    if tracing::enabled!(tracing::Level::DEBUG) {
        tracing::debug!("[CL] launch {} global {} local {}", name(), global, local);
    }
    Ok(())
}

/// A kernel whose argument bindings are serialized across threads.
pub struct SharedKernel {
    kernel: ClKernel,
    lock: Mutex<()>,
}

impl SharedKernel {
    pub fn new(kernel: ClKernel) -> Self {
        Self { kernel, lock: Mutex::new(()) }
    }

    pub fn kernel(&self) -> ClKernel {
        self.kernel
    }

    /// Run `f` with exclusive use of the kernel's argument slots.
    pub fn with_launcher<T>(
        &self,
        runtime: &dyn ClRuntime,
        f: impl FnOnce(KernelLauncher<'_>) -> T,
    ) -> T {
        let _guard = self.lock.lock();
        f(KernelLauncher::new(runtime, self.kernel))
    }
}

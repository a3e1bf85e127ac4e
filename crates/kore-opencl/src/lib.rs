//! # kore-opencl
//!
//! OpenCL kernel dispatch for Kore.
//!
//! Provides:
//! - Runtime-loaded OpenCL entry points (no build-time OpenCL SDK)
//! - Image2D packing rules for 1D/2D/NCHW/NCHWc tensors and conv weights
//! - `NDRange` work sizes
//! - `KernelLauncher`: positional argument binding with first-error
//!   tracking, followed by `clEnqueueNDRangeKernel`
//!
//! Device, context, queue and program lifetimes belong to the caller; this
//! crate only binds arguments to a compiled `cl_kernel` and enqueues it.

pub mod config;
pub mod error;
pub mod ffi;
pub mod image2d;
pub mod launcher;
pub mod memory;
pub mod ndrange;
pub mod runtime;
pub mod shape;

pub use config::RuntimeConfig;
pub use error::{check_cl, enforce_cl, ClError, Result};
pub use ffi::{error_string, is_opencl_available, ClCommandQueue, ClInt, ClKernel, ClMem, OpenClApi};
pub use image2d::{ceil_div, round_to_multiple, Image2DDesc};
pub use launcher::{enqueue_kernel, BindFailure, BindState, KernelLauncher, SharedKernel};
pub use memory::{DeviceTensor, MemArg, MemoryKind};
pub use ndrange::NDRange;
pub use runtime::{default_runtime, ClRuntime, KernelArg, MemObjectType};
pub use shape::TensorShape;

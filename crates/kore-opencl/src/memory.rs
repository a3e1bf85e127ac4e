//! Device memory kinds and the buffer/image2d handles passed to kernels.

use std::fmt;

use crate::error::{enforce_cl, ClError};
use crate::ffi::ClMem;
use crate::image2d::Image2DDesc;
use crate::runtime::{ClRuntime, MemObjectType};
use crate::shape::TensorShape;

/// Whether buffer/image2d arguments are checked against the actual memory
/// object type before binding. On in debug builds or with `checked-cast`.
pub const CHECKED_CASTS: bool = cfg!(any(debug_assertions, feature = "checked-cast"));

/// How a tensor is stored on the device.
///
/// The discriminants are the engine's device-memory tags.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryKind {
    Buffer = 5,
    Image2D = 0,
}

impl MemoryKind {
    pub const fn device_mem_type(self) -> u8 {
        self as u8
    }

    /// Image2D when the shape has an image layout, otherwise Buffer.
    pub fn preferred_for(shape: &TensorShape) -> Self {
        if Image2DDesc::pack_from_tensor(shape).is_packable() {
            Self::Image2D
        } else {
            Self::Buffer
        }
    }

    fn expected_object_type(self) -> MemObjectType {
        match self {
            Self::Buffer => MemObjectType::Buffer,
            Self::Image2D => MemObjectType::Image2D,
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffer => write!(f, "Buffer"),
            Self::Image2D => write!(f, "Image2D"),
        }
    }
}

/// A tensor that lives in an OpenCL memory object.
pub trait DeviceTensor {
    fn shape(&self) -> &TensorShape;
    fn device_mem(&self) -> ClMem;
    fn memory_kind(&self) -> MemoryKind;
}

/// Anything that can be bound as a buffer or image2d kernel argument.
///
/// Raw `ClMem` handles are passed through untouched; tensors are checked
/// against the requested kind when `CHECKED_CASTS` is on.
pub trait MemArg {
    fn buffer_mem(&self, runtime: &dyn ClRuntime) -> ClMem;
    fn image2d_mem(&self, runtime: &dyn ClRuntime) -> ClMem;
}

impl MemArg for ClMem {
    fn buffer_mem(&self, _runtime: &dyn ClRuntime) -> ClMem {
        *self
    }

    fn image2d_mem(&self, _runtime: &dyn ClRuntime) -> ClMem {
        *self
    }
}

impl<T: DeviceTensor> MemArg for T {
    #[track_caller]
    fn buffer_mem(&self, runtime: &dyn ClRuntime) -> ClMem {
        buffer_from_tensor(runtime, self)
    }

    #[track_caller]
    fn image2d_mem(&self, runtime: &dyn ClRuntime) -> ClMem {
        image2d_from_tensor(runtime, self)
    }
}

/// The tensor's memory object, asserted to be a linear buffer.
#[track_caller]
pub fn buffer_from_tensor<T: DeviceTensor + ?Sized>(runtime: &dyn ClRuntime, tensor: &T) -> ClMem {
    let mem = tensor.device_mem();
    if CHECKED_CASTS && !mem.is_null() {
        check_mem_object(runtime, mem, tensor.memory_kind(), MemoryKind::Buffer);
    }
    trace_buffer("bind", tensor);
    mem
}

/// The tensor's memory object, asserted to be an image2d.
#[track_caller]
pub fn image2d_from_tensor<T: DeviceTensor + ?Sized>(runtime: &dyn ClRuntime, tensor: &T) -> ClMem {
    let mem = tensor.device_mem();
    if CHECKED_CASTS && !mem.is_null() {
        check_mem_object(runtime, mem, tensor.memory_kind(), MemoryKind::Image2D);
    }
    trace_image2d("bind", tensor);
    mem
}

/// Both the native object type and the tensor's own tag must match the
/// accessor being bound.
#[track_caller]
fn check_mem_object(runtime: &dyn ClRuntime, mem: ClMem, tagged: MemoryKind, expected: MemoryKind) {
    let actual = match runtime.mem_object_type(mem) {
        Ok(actual) => actual,
        Err(ClError::Api { code, context }) => {
            enforce_cl(code, &context);
            return;
        }
        Err(e) => panic!("{mem:?}: {e}"),
    };
    assert!(
        actual == expected.expected_object_type(),
        "{mem:?} is not {expected} (found {actual:?})"
    );
    assert!(
        tagged == expected,
        "{mem:?} is tagged {tagged} but bound as {expected}"
    );
}

/// Log a tensor's buffer handle under a short label.
pub fn trace_buffer<T: DeviceTensor + ?Sized>(desc: &str, tensor: &T) {
    tracing::debug!("[CL]  {:>9} shape {} Buffer({:?})", desc, tensor.shape(), tensor.device_mem().as_raw());
}

pub fn trace_image2d<T: DeviceTensor + ?Sized>(desc: &str, tensor: &T) {
    tracing::debug!("[CL]  {:>9} shape {} Image2D({:?})", desc, tensor.shape(), tensor.device_mem().as_raw());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::fake::FakeRuntime;

    struct Tensor {
        shape: TensorShape,
        mem: ClMem,
        kind: MemoryKind,
    }

    impl DeviceTensor for Tensor {
        fn shape(&self) -> &TensorShape {
            &self.shape
        }
        fn device_mem(&self) -> ClMem {
            self.mem
        }
        fn memory_kind(&self) -> MemoryKind {
            self.kind
        }
    }

    fn tensor(raw: usize, kind: MemoryKind) -> Tensor {
        Tensor {
            shape: TensorShape::from([1, 4, 8, 8]),
            mem: ClMem::from_raw(raw as *mut _),
            kind,
        }
    }

    fn runtime() -> FakeRuntime {
        let mut rt = FakeRuntime::default();
        rt.mem_types.insert(0x100, MemObjectType::Buffer);
        rt.mem_types.insert(0x200, MemObjectType::Image2D);
        rt
    }

    #[test]
    fn test_device_mem_type_tags() {
        assert_eq!(MemoryKind::Buffer.device_mem_type(), 5);
        assert_eq!(MemoryKind::Image2D.device_mem_type(), 0);
        assert_eq!(MemoryKind::Image2D.to_string(), "Image2D");
    }

    #[test]
    fn test_preferred_for() {
        assert_eq!(MemoryKind::preferred_for(&TensorShape::from([1, 3, 8, 8])), MemoryKind::Image2D);
        assert_eq!(MemoryKind::preferred_for(&TensorShape::from([2, 3, 4])), MemoryKind::Buffer);
        assert_eq!(MemoryKind::preferred_for(&TensorShape::default()), MemoryKind::Buffer);
    }

    #[test]
    fn test_matching_kinds_pass() {
        let rt = runtime();
        let buf = tensor(0x100, MemoryKind::Buffer);
        let img = tensor(0x200, MemoryKind::Image2D);
        assert_eq!(buf.buffer_mem(&rt).as_raw() as usize, 0x100);
        assert_eq!(img.image2d_mem(&rt).as_raw() as usize, 0x200);
    }

    #[test]
    fn test_null_handle_skips_check() {
        let rt = runtime();
        let t = tensor(0, MemoryKind::Image2D);
        assert!(t.buffer_mem(&rt).is_null());
    }

    #[test]
    fn test_raw_mem_is_not_checked() {
        let rt = runtime();
        let raw = ClMem::from_raw(0x200 as *mut _);
        assert_eq!(raw.buffer_mem(&rt), raw);
    }

    #[test]
    fn test_trace_helpers_accept_any_tensor() {
        let t = tensor(0x100, MemoryKind::Buffer);
        trace_buffer("input", &t);
        trace_image2d("output", &t);
        assert_eq!(t.memory_kind(), MemoryKind::Buffer);
    }

    #[cfg(any(debug_assertions, feature = "checked-cast"))]
    #[test]
    #[should_panic(expected = "is not Buffer")]
    fn test_image_bound_as_buffer_panics() {
        let rt = runtime();
        let _ = tensor(0x200, MemoryKind::Image2D).buffer_mem(&rt);
    }

    #[cfg(any(debug_assertions, feature = "checked-cast"))]
    #[test]
    #[should_panic(expected = "is not Image2D")]
    fn test_buffer_bound_as_image_panics() {
        let rt = runtime();
        let _ = tensor(0x100, MemoryKind::Buffer).image2d_mem(&rt);
    }

    #[test]
    fn test_checked_casts_follow_build_profile() {
        assert_eq!(CHECKED_CASTS, cfg!(any(debug_assertions, feature = "checked-cast")));
    }

    #[cfg(any(debug_assertions, feature = "checked-cast"))]
    #[test]
    fn test_checked_build_queries_object_type() {
        let rt = runtime();
        let _ = tensor(0x100, MemoryKind::Buffer).buffer_mem(&rt);
        assert_eq!(rt.mem_queries.get(), 1);
    }

    #[cfg(not(any(debug_assertions, feature = "checked-cast")))]
    #[test]
    fn test_unchecked_build_trusts_handles() {
        let rt = runtime();
        let bias = tensor(0x100, MemoryKind::Buffer);
        assert_eq!(bias.image2d_mem(&rt).as_raw() as usize, 0x100);
        let unknown = tensor(0x300, MemoryKind::Image2D);
        assert_eq!(unknown.buffer_mem(&rt).as_raw() as usize, 0x300);
        assert_eq!(rt.mem_queries.get(), 0);
    }

    #[cfg(any(debug_assertions, feature = "checked-cast"))]
    #[test]
    #[should_panic(expected = "is tagged Image2D but bound as Buffer")]
    fn test_tag_must_match_accessor() {
        // Native object is a buffer, but the tensor claims to be an image.
        let rt = runtime();
        let _ = tensor(0x100, MemoryKind::Image2D).buffer_mem(&rt);
    }

    #[cfg(any(debug_assertions, feature = "checked-cast"))]
    #[test]
    #[should_panic(expected = "OpenCL not available")]
    fn test_query_without_library_reports_unavailable() {
        let rt = FakeRuntime { unavailable: true, ..runtime() };
        let _ = tensor(0x100, MemoryKind::Buffer).buffer_mem(&rt);
    }

    #[cfg(any(debug_assertions, feature = "checked-cast"))]
    #[test]
    #[should_panic(expected = "CL_INVALID_MEM_OBJECT")]
    fn test_unknown_mem_object_panics() {
        let rt = runtime();
        let _ = tensor(0x300, MemoryKind::Buffer).buffer_mem(&rt);
    }
}

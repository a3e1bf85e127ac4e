//! Global/local work sizes for `clEnqueueNDRangeKernel`.

use std::fmt;

/// Integer types accepted as a work-size extent.
pub trait WorkExtent: Copy + fmt::Display {
    fn to_extent(self) -> usize;
}

macro_rules! impl_work_extent {
    ($($t:ty),*) => {
        $(
            impl WorkExtent for $t {
                #[track_caller]
                fn to_extent(self) -> usize {
                    match usize::try_from(self) {
                        Ok(v) => v,
                        Err(_) => panic!("work size extent {} does not fit in usize", self),
                    }
                }
            }
        )*
    };
}

impl_work_extent!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

/// A 0–3 dimensional work size.
///
/// Dimensionality is explicit: `NDRange::d1(4)` and `NDRange::d2(4, 0)` are
/// different ranges. A 0-dimensional range means "unspecified" and, used as a
/// local size, lets the runtime pick the work-group size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NDRange {
    size: u8,
    values: [usize; 3],
}

impl NDRange {
    /// The unspecified range.
    pub const fn unspecified() -> Self {
        Self { size: 0, values: [0; 3] }
    }

    #[track_caller]
    pub fn d1(x: impl WorkExtent) -> Self {
        Self { size: 1, values: [x.to_extent(), 0, 0] }
    }

    #[track_caller]
    pub fn d2(x: impl WorkExtent, y: impl WorkExtent) -> Self {
        Self { size: 2, values: [x.to_extent(), y.to_extent(), 0] }
    }

    #[track_caller]
    pub fn d3(x: impl WorkExtent, y: impl WorkExtent, z: impl WorkExtent) -> Self {
        Self { size: 3, values: [x.to_extent(), y.to_extent(), z.to_extent()] }
    }

    /// Dimensionality (0–3).
    pub fn size(&self) -> u8 {
        self.size
    }

    pub fn is_unspecified(&self) -> bool {
        self.size == 0
    }

    /// The extents; empty when unspecified.
    pub fn as_slice(&self) -> &[usize] {
        &self.values[..self.size as usize]
    }

    /// Extent along `axis`, or `None` past the dimensionality.
    pub fn get(&self, axis: usize) -> Option<usize> {
        self.as_slice().get(axis).copied()
    }

    /// Pointer for the OpenCL API: null when unspecified.
    pub fn as_ptr(&self) -> *const usize {
        if self.size == 0 {
            std::ptr::null()
        } else {
            self.values.as_ptr()
        }
    }

    /// Total number of work items (1 when unspecified).
    pub fn num_items(&self) -> usize {
        self.as_slice().iter().product()
    }
}

impl From<[usize; 1]> for NDRange {
    fn from(v: [usize; 1]) -> Self {
        Self::d1(v[0])
    }
}

impl From<[usize; 2]> for NDRange {
    fn from(v: [usize; 2]) -> Self {
        Self::d2(v[0], v[1])
    }
}

impl From<[usize; 3]> for NDRange {
    fn from(v: [usize; 3]) -> Self {
        Self::d3(v[0], v[1], v[2])
    }
}

impl fmt::Display for NDRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.size == 0 {
            return write!(f, "[<unspecified>]");
        }
        write!(f, "[")?;
        for (i, v) in self.as_slice().iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, "]")
    }
}

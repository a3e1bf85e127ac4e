use smallvec::SmallVec;
use std::fmt;
use std::ops::Index;

/// Shape of a device tensor as seen by kernel launch code.
///
/// Dimensions are signed 64-bit like the engine's shape type, so packing
/// arithmetic stays in the same integer width as the surrounding kernels.
/// Up to 5 dimensions (NCHWc) are stored inline.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct TensorShape {
    dims: SmallVec<[i64; 5]>,
}

impl TensorShape {
    pub fn new(dims: &[i64]) -> Self {
        Self { dims: SmallVec::from_slice(dims) }
    }

    /// Number of dimensions (rank).
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[i64] {
        &self.dims
    }

    /// Total number of elements; 1 for a scalar.
    pub fn numel(&self) -> i64 {
        self.dims.iter().product()
    }
}

impl Index<usize> for TensorShape {
    type Output = i64;

    fn index(&self, axis: usize) -> &i64 {
        &self.dims[axis]
    }
}

impl From<&[i64]> for TensorShape {
    fn from(dims: &[i64]) -> Self {
        Self::new(dims)
    }
}

impl<const N: usize> From<[i64; N]> for TensorShape {
    fn from(dims: [i64; N]) -> Self {
        Self::new(&dims)
    }
}

impl From<Vec<i64>> for TensorShape {
    fn from(dims: Vec<i64>) -> Self {
        Self { dims: SmallVec::from_vec(dims) }
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "}}")
    }
}

impl fmt::Debug for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TensorShape({self})")
    }
}

//! Image2D packing: how a tensor shape maps onto a 2D RGBA image surface.
//!
//! Each texel holds 4 channels, so the channel-like axis of every layout is
//! folded by 4:
//!
//! | layout                    | width               | height            |
//! |---------------------------|---------------------|-------------------|
//! | `[L]`                     | 1024                | ceil(L / 4096)    |
//! | `[R, C]`                  | ceil(R / 4)         | C                 |
//! | `[N, C, H, W]`            | ceil(C / 4) * W     | N * H             |
//! | `[N, Cc, H, W, 4]`        | Cc * W              | N * H             |
//! | conv weight `[O,I,Kh,Kw]` | I                   | ceil(O/4) * Kh*Kw |
//! | depthwise `[O,I,Kh,Kw]`   | Kh * Kw * I         | ceil(O / 4)       |
//! | winograd `[O,I,_,_]`      | ceil(I / 4) * 4     | 16 * ceil(O / 4)  |
//!
//! Any other rank, or a shape with a zero-sized dim, packs to `(0, 0)`, which
//! callers treat as "use a buffer". The explicit packers expect positive dims.

use std::hash::{Hash, Hasher};

use crate::ndrange::NDRange;
use crate::shape::TensorShape;

/// Channels per RGBA texel.
pub const TEXEL_CHANNELS: i64 = 4;

/// Fixed image width for rank-1 tensors.
pub const RANK1_IMAGE_WIDTH: i64 = 1024;

const WINOGRAD_TILE: i64 = 4;

/// `ceil(a / b)` for positive `a`, `b`.
#[inline]
pub fn ceil_div(a: i64, b: i64) -> i64 {
    (a - 1) / b + 1
}

/// Round `a` up to the next multiple of `b`.
#[inline]
pub fn round_to_multiple(a: i64, b: i64) -> i64 {
    ceil_div(a, b) * b
}

#[inline]
fn hash_combine(a: u64, b: u64) -> u64 {
    b ^ b
        .wrapping_add(0x9e37_79b9)
        .wrapping_add(a << 6)
        .wrapping_add(a >> 2)
}

/// Extent of the image2d a tensor is packed into.
///
/// Two descriptors are equal when their extents are equal, regardless of
/// which shape or packing rule produced them; the same holds for hashing, so
/// the descriptor can key an image cache directly.
#[derive(Debug, Clone, Copy, Eq)]
pub struct Image2DDesc {
    width: i64,
    height: i64,
}

impl Image2DDesc {
    pub const fn new(width: i64, height: i64) -> Self {
        Self { width, height }
    }

    /// The `(0, 0)` descriptor for shapes with no image layout.
    pub const fn unpackable() -> Self {
        Self { width: 0, height: 0 }
    }

    /// Pack a tensor by rank: 1, 2, 4 (NCHW) or 5 (NCHWc).
    pub fn pack_from_tensor(shape: &TensorShape) -> Self {
        if shape.numel() == 0 {
            return Self::unpackable();
        }
        match shape.ndim() {
            1 => Self::pack_from_tensor_1d(shape),
            2 => Self::pack_from_tensor_2d(shape),
            4 => Self::pack_from_tensor_nchw(shape),
            5 => Self::pack_from_tensor_nchwc(shape),
            _ => Self::unpackable(),
        }
    }

    #[track_caller]
    pub fn pack_from_tensor_1d(shape: &TensorShape) -> Self {
        assert_rank(shape, 1, "pack_from_tensor_1d");
        Self::new(
            RANK1_IMAGE_WIDTH,
            ceil_div(shape[0], RANK1_IMAGE_WIDTH * TEXEL_CHANNELS),
        )
    }

    #[track_caller]
    pub fn pack_from_tensor_2d(shape: &TensorShape) -> Self {
        assert_rank(shape, 2, "pack_from_tensor_2d");
        Self::new(ceil_div(shape[0], TEXEL_CHANNELS), shape[1])
    }

    #[track_caller]
    pub fn pack_from_tensor_nchw(shape: &TensorShape) -> Self {
        assert_rank(shape, 4, "pack_from_tensor_nchw");
        let (n, c, h, w) = (shape[0], shape[1], shape[2], shape[3]);
        Self::new(ceil_div(c, TEXEL_CHANNELS) * w, n * h)
    }

    /// `[N, Cc, H, W, c]` with the inner block `c` fixed at 4.
    #[track_caller]
    pub fn pack_from_tensor_nchwc(shape: &TensorShape) -> Self {
        assert_rank(shape, 5, "pack_from_tensor_nchwc");
        assert_eq!(shape[4], TEXEL_CHANNELS, "inner channel block must be 4");
        let (n, cc, h, w) = (shape[0], shape[1], shape[2], shape[3]);
        Self::new(cc * w, n * h)
    }

    #[track_caller]
    pub fn pack_from_conv2d_weight(shape: &TensorShape) -> Self {
        assert_rank(shape, 4, "pack_from_conv2d_weight");
        let (o, i, kh, kw) = (shape[0], shape[1], shape[2], shape[3]);
        Self::new(i, ceil_div(o, TEXEL_CHANNELS) * kh * kw)
    }

    #[track_caller]
    pub fn pack_from_depthwise_conv2d_weight(shape: &TensorShape) -> Self {
        assert_rank(shape, 4, "pack_from_depthwise_conv2d_weight");
        let (o, i, kh, kw) = (shape[0], shape[1], shape[2], shape[3]);
        Self::new(kh * kw * i, ceil_div(o, TEXEL_CHANNELS))
    }

    /// Winograd F(2x2, 3x3) transformed weights: 16 tiles of 4x4 per output
    /// channel block. The spatial kernel dims are not used.
    #[track_caller]
    pub fn pack_from_winograd_transform(shape: &TensorShape) -> Self {
        assert_rank(shape, 4, "pack_from_winograd_transform");
        let (o, i) = (shape[0], shape[1]);
        Self::new(
            round_to_multiple(i, TEXEL_CHANNELS),
            WINOGRAD_TILE * WINOGRAD_TILE * ceil_div(o, TEXEL_CHANNELS),
        )
    }

    pub fn width(&self) -> i64 {
        self.width
    }

    pub fn height(&self) -> i64 {
        self.height
    }

    /// Width as an unsigned extent; 0 if negative.
    pub fn uwidth(&self) -> usize {
        usize::try_from(self.width).unwrap_or(0)
    }

    pub fn uheight(&self) -> usize {
        usize::try_from(self.height).unwrap_or(0)
    }

    pub fn is_packable(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Whether the image fits a device's `CL_DEVICE_IMAGE2D_MAX_{WIDTH,HEIGHT}`.
    pub fn fits(&self, max_width: usize, max_height: usize) -> bool {
        self.is_packable() && self.uwidth() <= max_width && self.uheight() <= max_height
    }

    /// One work item per texel.
    #[track_caller]
    pub fn as_nd_range(&self) -> NDRange {
        assert!(
            self.is_packable(),
            "as_nd_range: ({}, {}) is not a packed image",
            self.width,
            self.height
        );
        NDRange::d2(self.uwidth(), self.uheight())
    }

    pub fn cache_key(&self) -> u64 {
        hash_combine(self.width as u64, self.height as u64)
    }
}

impl PartialEq for Image2DDesc {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height
    }
}

impl Hash for Image2DDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.cache_key());
    }
}

#[track_caller]
fn assert_rank(shape: &TensorShape, expected: usize, packer: &str) {
    assert!(
        shape.ndim() == expected,
        "{packer}: expected a rank-{expected} shape, got rank {} ({shape})",
        shape.ndim()
    );
}

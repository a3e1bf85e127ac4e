use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use kore_opencl::{ceil_div, Image2DDesc, MemoryKind, TensorShape};
use proptest::prelude::*;

fn dim() -> impl Strategy<Value = i64> {
    1i64..=512
}

fn packable_shape() -> impl Strategy<Value = TensorShape> {
    prop_oneof![
        (1i64..=100_000).prop_map(|l| TensorShape::from([l])),
        (dim(), dim()).prop_map(|(r, c)| TensorShape::from([r, c])),
        (1i64..=4, dim(), 1i64..=64, 1i64..=64)
            .prop_map(|(n, c, h, w)| TensorShape::from([n, c, h, w])),
        (1i64..=4, 1i64..=64, 1i64..=64, 1i64..=64)
            .prop_map(|(n, cc, h, w)| TensorShape::from([n, cc, h, w, 4])),
    ]
}

fn hash_of(desc: &Image2DDesc) -> u64 {
    let mut h = DefaultHasher::new();
    desc.hash(&mut h);
    h.finish()
}

proptest! {
    #[test]
    fn packed_extent_is_positive(shape in packable_shape()) {
        let desc = Image2DDesc::pack_from_tensor(&shape);
        prop_assert!(desc.is_packable(), "{shape} -> {desc:?}");
        prop_assert_eq!(MemoryKind::preferred_for(&shape), MemoryKind::Image2D);
    }

    #[test]
    fn packing_is_idempotent(shape in packable_shape()) {
        prop_assert_eq!(
            Image2DDesc::pack_from_tensor(&shape),
            Image2DDesc::pack_from_tensor(&shape.clone())
        );
    }

    #[test]
    fn image_holds_every_element(shape in packable_shape()) {
        let desc = Image2DDesc::pack_from_tensor(&shape);
        prop_assert!(desc.width() * desc.height() * 4 >= shape.numel());
    }

    #[test]
    fn nchwc_matches_blocked_nchw(n in 1i64..=4, c in dim(), h in 1i64..=64, w in 1i64..=64) {
        let nchw = Image2DDesc::pack_from_tensor(&TensorShape::from([n, c, h, w]));
        let nchwc = Image2DDesc::pack_from_tensor(&TensorShape::from([n, ceil_div(c, 4), h, w, 4]));
        prop_assert_eq!(nchw, nchwc);
    }

    #[test]
    fn equality_and_hash_follow_extent(w in 1i64..=4096, h in 1i64..=4096) {
        let a = Image2DDesc::new(w, h);
        let b = Image2DDesc::new(w, h);
        prop_assert_eq!(a, b);
        prop_assert_eq!(a.cache_key(), b.cache_key());
        prop_assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn matrix_and_nchw_share_cache_key(r in dim(), c in dim()) {
        let matrix = Image2DDesc::pack_from_tensor(&TensorShape::from([r, c]));
        let nchw = Image2DDesc::pack_from_tensor(&TensorShape::from([1, r, c, 1]));
        prop_assert_eq!(matrix, nchw);
        prop_assert_eq!(hash_of(&matrix), hash_of(&nchw));
    }

    #[test]
    fn unsupported_ranks_fall_back_to_buffer(a in dim(), b in dim(), c in dim()) {
        let shape = TensorShape::from([a, b, c]);
        prop_assert_eq!(Image2DDesc::pack_from_tensor(&shape), Image2DDesc::unpackable());
        prop_assert_eq!(MemoryKind::preferred_for(&shape), MemoryKind::Buffer);
    }
}

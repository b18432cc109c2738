use std::fmt::Debug;

use half::f16;

use crate::dtype::DType;

/// Numeric element type for score buffers.
///
/// The decoding loop, the logits processors, and the selectors are written
/// once, generic over `Element`, instead of duplicating control flow per
/// precision. Arithmetic goes through f32 so half-precision scores share
/// the exact same comparison and accumulation behavior.
pub trait Element: Copy + PartialOrd + Debug + Send + Sync + 'static {
    /// The dtype tag for tensors holding this element.
    const DTYPE: DType;

    fn from_f32(v: f32) -> Self;
    fn to_f32(self) -> f32;

    /// The "never selectable" score used by masking processors.
    fn neg_infinity() -> Self;
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    fn from_f32(v: f32) -> Self {
        v
    }

    fn to_f32(self) -> f32 {
        self
    }

    fn neg_infinity() -> Self {
        f32::NEG_INFINITY
    }
}

impl Element for f16 {
    const DTYPE: DType = DType::F16;

    fn from_f32(v: f32) -> Self {
        f16::from_f32(v)
    }

    fn to_f32(self) -> f32 {
        f16::to_f32(self)
    }

    fn neg_infinity() -> Self {
        f16::NEG_INFINITY
    }
}

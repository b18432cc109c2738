//! `dec-tensor` - Shapes, dtypes, device placement, and feed/fetch tensors
//! for decoding-runtime.
//!
//! This crate provides:
//! - A `Tensor` type backed by CPU storage, tagged with a declared device
//! - Shape utilities including scalar detection for run-input validation
//! - Data type definitions (F32, F16, U32)
//! - An `Element` trait so score math can be written once for f32 and f16

pub mod device;
pub mod dtype;
pub mod element;
pub mod error;
pub mod shape;
pub mod storage;
pub mod tensor;

// Re-export primary types at the crate root for convenience.
pub use device::{CopyDirection, Device};
pub use dtype::DType;
pub use element::Element;
pub use error::{Result, TensorError};
pub use shape::Shape;
pub use storage::CpuStorage;
pub use tensor::Tensor;

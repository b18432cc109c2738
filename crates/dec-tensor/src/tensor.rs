use half::f16;

use crate::device::Device;
use crate::dtype::DType;
use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::storage::CpuStorage;

/// A tensor exchanged between the decoding loop, the device adapter, and
/// the external subgraph.
///
/// Holds contiguous, row-major data with an associated shape, dtype, and
/// declared device. The declared device tells the adapter which transfer
/// path a copy takes; storage itself always lives host-side in this crate,
/// which is what the CPU adapter needs. Device-backed adapters wrap their
/// own handles and use the same declaration.
#[derive(Debug, Clone)]
pub struct Tensor {
    storage: CpuStorage,
    shape: Shape,
    device: Device,
}

impl Tensor {
    /// Create a new f32 tensor from data and a shape.
    ///
    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn from_f32(data: Vec<f32>, shape: Shape) -> Self {
        assert_eq!(
            data.len(),
            shape.numel(),
            "data length {} does not match shape {} (numel={})",
            data.len(),
            shape,
            shape.numel()
        );
        Tensor {
            storage: CpuStorage::from_f32_vec(data),
            shape,
            device: Device::Cpu,
        }
    }

    /// Create a new f16 tensor from data and a shape.
    ///
    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn from_f16(data: Vec<f16>, shape: Shape) -> Self {
        assert_eq!(
            data.len(),
            shape.numel(),
            "data length {} does not match shape {} (numel={})",
            data.len(),
            shape,
            shape.numel()
        );
        Tensor {
            storage: CpuStorage::from_f16_vec(data),
            shape,
            device: Device::Cpu,
        }
    }

    /// Create a new u32 tensor from data and a shape.
    ///
    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn from_u32(data: Vec<u32>, shape: Shape) -> Self {
        assert_eq!(
            data.len(),
            shape.numel(),
            "data length {} does not match shape {} (numel={})",
            data.len(),
            shape,
            shape.numel()
        );
        Tensor {
            storage: CpuStorage::from_u32_vec(data),
            shape,
            device: Device::Cpu,
        }
    }

    /// Create a rank-0 u32 tensor, the form scalar run inputs arrive in.
    pub fn scalar_u32(value: u32) -> Self {
        Tensor {
            storage: CpuStorage::from_u32_vec(vec![value]),
            shape: Shape::scalar(),
            device: Device::Cpu,
        }
    }

    /// Create a zero-filled tensor with the given dtype and shape.
    pub fn zeros(dtype: DType, shape: Shape) -> Self {
        let n = shape.numel();
        Tensor {
            storage: CpuStorage::zeros(dtype, n),
            shape,
            device: Device::Cpu,
        }
    }

    /// Re-declare the device this tensor belongs to.
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Returns a reference to the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the tensor's data type.
    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    /// Returns the tensor's declared device.
    pub fn device(&self) -> Device {
        self.device
    }

    /// Returns the underlying data as an f32 slice.
    pub fn data_f32(&self) -> Result<&[f32]> {
        self.storage.as_f32_slice()
    }

    /// Returns the underlying data as an f16 slice.
    pub fn data_f16(&self) -> Result<&[f16]> {
        self.storage.as_f16_slice()
    }

    /// Returns the underlying data as a u32 slice.
    pub fn data_u32(&self) -> Result<&[u32]> {
        self.storage.as_u32_slice()
    }

    /// Reads the value of a rank-0 u32 tensor.
    ///
    /// # Errors
    /// Fails if the tensor is not a u32 scalar.
    pub fn scalar_value_u32(&self) -> Result<u32> {
        if !self.shape.is_scalar() {
            return Err(TensorError::ShapeMismatch {
                expected: vec![],
                got: self.shape.dims().to_vec(),
            });
        }
        Ok(self.storage.as_u32_slice()?[0])
    }

    /// Overwrite this tensor's contents with another tensor's.
    ///
    /// This is the memory-level duplication a same-device copy degenerates
    /// to. Shape and dtype must match exactly.
    pub fn copy_from(&mut self, src: &Tensor) -> Result<()> {
        if self.shape != src.shape {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape.dims().to_vec(),
                got: src.shape.dims().to_vec(),
            });
        }
        if self.dtype() != src.dtype() {
            return Err(TensorError::DTypeMismatch {
                expected: self.dtype().to_string(),
                got: src.dtype().to_string(),
            });
        }
        self.storage = src.storage.clone();
        Ok(())
    }
}

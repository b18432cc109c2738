use std::fmt;

/// Declared placement of a tensor's data.
///
/// The decoding loop never branches on the device itself; it only hands
/// tensors to a device adapter, which chooses transfer and compute paths
/// from the declared device of its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    Cpu,
    Cuda,
    WasmGpu,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda => write!(f, "cuda"),
            Device::WasmGpu => write!(f, "wasm-gpu"),
        }
    }
}

/// Direction of a host/device buffer transfer.
///
/// A copy between two buffers on the same device degenerates to a direct
/// memory copy regardless of the declared direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyDirection {
    HostToDevice,
    DeviceToHost,
}

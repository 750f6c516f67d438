//! Backend selection for the Burn framework.
//!
//! NdArray (CPU) is the default. The `wgpu` and `cuda` features switch the
//! inference backend; training always wraps it in `Autodiff`.

use burn::backend::Autodiff;
use burn::tensor::backend::Backend;

#[cfg(feature = "cuda")]
pub type DefaultBackend = burn::backend::CudaJit;

#[cfg(all(feature = "wgpu", not(feature = "cuda")))]
pub type DefaultBackend = burn::backend::Wgpu;

#[cfg(not(any(feature = "wgpu", feature = "cuda")))]
pub type DefaultBackend = burn::backend::NdArray<f32>;

/// The default autodiff backend for training
pub type TrainingBackend = Autodiff<DefaultBackend>;

/// Device of the default backend
pub type DefaultDevice = <DefaultBackend as Backend>::Device;

/// Get the default device of the selected backend
pub fn default_device() -> DefaultDevice {
    DefaultDevice::default()
}

/// Get a human-readable name for the current backend
pub fn backend_name() -> &'static str {
    #[cfg(feature = "cuda")]
    {
        "cuda"
    }
    #[cfg(all(feature = "wgpu", not(feature = "cuda")))]
    {
        "wgpu"
    }
    #[cfg(not(any(feature = "wgpu", feature = "cuda")))]
    {
        "cpu"
    }
}

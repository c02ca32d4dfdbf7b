//! Model slots, adapters and the hybrid decision engine

pub mod detector;
pub mod fusion;
pub mod inference;
pub mod loader;
pub mod onnx;

pub use detector::{Detector, ModelSlot};
pub use inference::{DetectorMode, HybridEngine};
pub use loader::ModelLoader;

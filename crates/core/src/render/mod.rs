//! Frame loop: clock, per-frame plan and its execution on the GPU.

pub mod clock;
pub mod context;
pub mod driver;
pub mod fallback;
pub mod gpu;
pub mod renderer;

pub use clock::{FrameClock, MAX_FRAME_DELTA};
pub use context::RenderContext;
pub use driver::{DrawCommand, FrameDriver, FramePlan};
pub use fallback::StaticFallback;
pub use gpu::{probe_adapter, GpuContext, BACKDROP_COLOR, DEPTH_FORMAT};
pub use renderer::Renderer;

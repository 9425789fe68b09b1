//! Core library for the Timeline Tunnel viewer.
//!
//! A snapshot of historical events is laid out as crystals on a spiral inside
//! an endless tunnel. Each crystal carries a shader-driven particle emitter
//! whose motion reflects the event category. The camera flies down the
//! tunnel on its own, or follows the device orientation when a sensor is
//! available. Each module owns one subsystem (quality tiers, orientation,
//! particles, scene, audio, camera, frame loop) and is usable without a
//! window so that the application and the tests drive the same code.

pub mod audio;
pub mod camera;
pub mod config;
pub mod error;
pub mod event;
pub mod orientation;
pub mod particles;
pub mod quality;
pub mod render;
pub mod scene;

pub use audio::{AudioSink, EchoKind, Tone, ToneSpec, ToneSynth};
pub use camera::{CameraState, RotationSource};
pub use config::{AppConfig, AudioConfig, CameraConfig, OrientationConfig, QualityConfig, SceneConfig};
pub use error::{Result, TunnelError};
pub use event::{Event, EventCategory, EventSnapshot};
pub use orientation::{
    OrientationAdapter, OrientationCapability, OrientationSample, OrientationStatus,
    PermissionState, Rotation,
};
pub use particles::{Emitter, EmitterSpec, HeadlessCompiler, ParticleBuffer, ProgramCompiler};
pub use quality::{DeviceProbe, QualityController, QualityProfile, QualityTier};
pub use render::{DrawCommand, FrameDriver, FramePlan, RenderContext, StaticFallback};
pub use scene::{Scene, SceneLayout, SelectionListener};

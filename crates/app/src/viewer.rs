use std::{sync::Arc, time::Instant};

use glam::Vec2;
use timeline_tunnel_core::{
    particles::GpuEmitterProgram,
    render::{GpuContext, Renderer},
    AppConfig, DeviceProbe, EventSnapshot, FrameDriver, OrientationAdapter, OrientationCapability,
    OrientationSample, QualityController, QualityProfile, QualityTier, RenderContext, Result,
    Scene, StaticFallback, ToneSynth, TunnelError,
};
use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::audio::CpalSink;

/// Sensor angles produced by the mouse at the window edge, in degrees.
const SIMULATED_YAW: f32 = 45.0;
const SIMULATED_PITCH: f32 = 30.0;

pub struct ViewerOptions {
    pub snapshot: EventSnapshot,
    pub config: AppConfig,
    pub quality: Option<QualityTier>,
    pub simulate_orientation: bool,
}

enum ViewState {
    Live {
        driver: FrameDriver<GpuEmitterProgram>,
        renderer: Renderer,
        gpu: GpuContext,
    },
    Fallback {
        fallback: StaticFallback,
        gpu: Option<GpuContext>,
    },
}

struct Viewer {
    options: ViewerOptions,
    synth: ToneSynth,
    window: Option<Arc<Window>>,
    state: Option<ViewState>,
    last_frame: Option<Instant>,
    cursor: Option<PhysicalPosition<f64>>,
}

pub fn run(options: ViewerOptions) -> Result<()> {
    let synth = open_synth(&options.config);
    let event_loop = EventLoop::new().map_err(|err| TunnelError::msg(err.to_string()))?;
    let mut viewer = Viewer {
        options,
        synth,
        window: None,
        state: None,
        last_frame: None,
        cursor: None,
    };
    event_loop
        .run_app(&mut viewer)
        .map_err(|err| TunnelError::msg(err.to_string()))
}

fn open_synth(config: &AppConfig) -> ToneSynth {
    let mut audio = config.audio.clone();
    if !audio.enabled {
        return ToneSynth::muted(audio);
    }
    match CpalSink::open() {
        Some(sink) => {
            audio.sample_rate = sink.sample_rate();
            ToneSynth::new(audio, Box::new(sink))
        }
        None => {
            tracing::warn!("no audio output, interaction tones muted");
            ToneSynth::muted(audio)
        }
    }
}

impl Viewer {
    fn start(&self, window: &Arc<Window>) -> ViewState {
        let size = window.inner_size();
        let mut gpu = match GpuContext::new(Arc::clone(window), size.width, size.height) {
            Ok(gpu) => gpu,
            Err(err) => {
                return ViewState::Fallback {
                    fallback: StaticFallback::new(&err),
                    gpu: None,
                }
            }
        };
        match self.build_live(&mut gpu, window) {
            Ok((renderer, driver)) => ViewState::Live {
                driver,
                renderer,
                gpu,
            },
            Err(err) => ViewState::Fallback {
                fallback: StaticFallback::new(&err),
                gpu: Some(gpu),
            },
        }
    }

    fn build_live(
        &self,
        gpu: &mut GpuContext,
        window: &Window,
    ) -> Result<(Renderer, FrameDriver<GpuEmitterProgram>)> {
        let options = &self.options;
        let scale_factor = window.scale_factor() as f32;

        let mut quality = options.config.quality.clone();
        if options.quality.is_some() {
            quality.force_tier = options.quality;
        }
        let probe = DeviceProbe::from_adapter_info(&gpu.adapter_info(), scale_factor, None);
        let profile = QualityController::new(quality).classify(&probe);

        let mut renderer = Renderer::new(gpu)?;
        let (width, height) = render_size(window.inner_size(), scale_factor, &profile);
        renderer.resize(gpu, width, height);

        let scene = {
            let mut compiler = renderer.compiler(gpu);
            Scene::mount(&options.snapshot, &profile, &options.config.scene, &mut compiler)
        };
        renderer.prepare_scene(gpu, &scene);

        let capability = if options.simulate_orientation {
            OrientationCapability {
                supported: true,
                requires_permission: true,
            }
        } else {
            OrientationCapability::UNSUPPORTED
        };
        let mut orientation = OrientationAdapter::new(capability, options.config.orientation.clone());
        orientation.request_permission(0.0);
        // The simulated sensor has nothing to ask; consent is immediate.
        orientation.resolve_permission(options.simulate_orientation);

        let driver = FrameDriver::new(
            RenderContext::new(profile, &options.snapshot),
            scene,
            orientation,
            options.config.camera.clone(),
            options.config.scene.point_size,
            gpu.aspect(),
        );
        Ok((renderer, driver))
    }

    fn cursor_ndc(&self) -> Option<Vec2> {
        let window = self.window.as_ref()?;
        let cursor = self.cursor?;
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return None;
        }
        Some(Vec2::new(
            (cursor.x as f32 / size.width as f32) * 2.0 - 1.0,
            1.0 - (cursor.y as f32 / size.height as f32) * 2.0,
        ))
    }

    fn on_cursor_moved(&mut self) {
        let Some(ndc) = self.cursor_ndc() else {
            return;
        };
        let simulate = self.options.simulate_orientation;
        if let Some(ViewState::Live { driver, .. }) = self.state.as_mut() {
            if simulate {
                driver.orientation_mut().push_sample(OrientationSample::new(
                    -ndc.x * SIMULATED_YAW,
                    ndc.y * SIMULATED_PITCH,
                    0.0,
                ));
            }
            driver.hover_at(ndc, &mut self.synth);
        }
    }

    fn on_click(&mut self) {
        let Some(ndc) = self.cursor_ndc() else {
            return;
        };
        if let Some(ViewState::Live { driver, .. }) = self.state.as_mut() {
            let mut listener = |event_id: &str| tracing::info!(event_id, "crystal selected");
            driver.select_at(ndc, &mut self.synth, &mut listener);
        }
    }

    fn on_resize(&mut self, size: PhysicalSize<u32>) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        let scale_factor = window.scale_factor() as f32;
        match self.state.as_mut() {
            Some(ViewState::Live {
                driver,
                renderer,
                gpu,
            }) => {
                let (width, height) = render_size(size, scale_factor, driver.context().profile());
                renderer.resize(gpu, width, height);
                driver.resize(gpu.aspect());
            }
            Some(ViewState::Fallback { gpu: Some(gpu), .. }) => gpu.resize(size.width, size.height),
            _ => {}
        }
    }

    fn redraw(&mut self) {
        let now = Instant::now();
        let delta = self
            .last_frame
            .map(|last| now.duration_since(last).as_secs_f32())
            .unwrap_or(0.0);
        self.last_frame = Some(now);

        let outcome = match self.state.as_mut() {
            Some(ViewState::Live {
                driver,
                renderer,
                gpu,
            }) => {
                driver.tick(delta);
                renderer.render(gpu, driver)
            }
            Some(ViewState::Fallback { fallback, gpu }) => fallback.render(gpu.as_ref()),
            None => Ok(()),
        };
        if let Err(err) = outcome {
            tracing::warn!(%err, "frame skipped");
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(ViewState::Live { driver, renderer, .. }) = self.state.as_mut() {
            driver.teardown();
            renderer.release_scene();
        }
        self.state = None;
        event_loop.exit();
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title("Timeline Tunnel")
            .with_inner_size(PhysicalSize::new(1280, 720));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                tracing::error!(%err, "failed to create window");
                event_loop.exit();
                return;
            }
        };

        self.state = Some(self.start(&window));
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if self.window.as_ref().map(|w| w.id()) != Some(window_id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::Resized(size) => self.on_resize(size),
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Some(position);
                self.on_cursor_moved();
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => self.on_click(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key,
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => match logical_key {
                Key::Named(NamedKey::Escape) => self.shutdown(event_loop),
                Key::Character(c) if c.eq_ignore_ascii_case("r") => {
                    if let Some(ViewState::Live { driver, .. }) = self.state.as_mut() {
                        driver.orientation_mut().calibrate();
                    }
                }
                _ => {}
            },
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

/// Surface size for a window, with the pixel ratio capped by the quality
/// tier.
fn render_size(size: PhysicalSize<u32>, scale_factor: f32, profile: &QualityProfile) -> (u32, u32) {
    let scale_factor = if scale_factor > 0.0 { scale_factor } else { 1.0 };
    let ratio = profile.pixel_ratio(scale_factor) / scale_factor;
    (
        ((size.width as f32 * ratio).round() as u32).max(1),
        ((size.height as f32 * ratio).round() as u32).max(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_size_respects_pixel_ratio_cap() {
        let window = PhysicalSize::new(3000, 2000);
        let low = QualityTier::Low.profile();
        let high = QualityTier::High.profile();

        assert_eq!(render_size(window, 3.0, &low), (1000, 667));
        assert_eq!(render_size(window, 3.0, &high), (2000, 1333));
        assert_eq!(render_size(window, 1.0, &high), (3000, 2000));
    }
}

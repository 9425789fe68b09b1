use glam::Vec2;

use super::{FrameClock, RenderContext};
use crate::{
    audio::ToneSynth,
    camera::{CameraState, RotationSource},
    config::CameraConfig,
    orientation::OrientationAdapter,
    particles::FrameUniforms,
    scene::{pick, Scene, SelectionListener},
};

const TINT_STRENGTH: f32 = 0.6;
/// Crystal bounding radius relative to its size.
const PICK_RADIUS: f32 = 1.6;

/// One draw in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCommand {
    Backdrop,
    /// `dirty` is set when the emitter's uniforms must be uploaded first.
    Particles { emitter: usize, dirty: bool },
    Crystals,
}

/// Everything the renderer needs for one frame.
#[derive(Debug, Clone)]
pub struct FramePlan {
    pub frame: FrameUniforms,
    pub camera: Option<CameraState>,
    /// Placement whose colour tints the tunnel.
    pub nearest: Option<usize>,
    pub draws: Vec<DrawCommand>,
}

impl FramePlan {
    pub fn rotation_source(&self) -> Option<RotationSource> {
        self.camera.map(|camera| camera.source)
    }
}

/// Runs the per-frame update: clock, orientation, camera, uniforms and draw
/// list. All per-frame storage is allocated when the driver is built.
#[derive(Debug)]
pub struct FrameDriver<P> {
    context: RenderContext,
    scene: Option<Scene<P>>,
    orientation: OrientationAdapter,
    clock: FrameClock,
    camera_config: CameraConfig,
    point_size: f32,
    aspect: f32,
    plan: FramePlan,
    ticked: bool,
    depth_scratch: Vec<(f32, usize, bool)>,
}

impl<P> FrameDriver<P> {
    pub fn new(
        context: RenderContext,
        scene: Scene<P>,
        orientation: OrientationAdapter,
        camera_config: CameraConfig,
        point_size: f32,
        aspect: f32,
    ) -> Self {
        let emitters = scene.emitters().len();
        Self {
            context,
            scene: Some(scene),
            orientation,
            clock: FrameClock::default(),
            camera_config,
            point_size,
            aspect,
            plan: FramePlan {
                frame: FrameUniforms::default(),
                camera: None,
                nearest: None,
                draws: Vec::with_capacity(emitters + 2),
            },
            ticked: false,
            depth_scratch: Vec::with_capacity(emitters),
        }
    }

    /// Advances one frame. Returns `None` once the driver has been torn down.
    pub fn tick(&mut self, delta: f32) -> Option<&FramePlan> {
        let scene = self.scene.as_mut()?;

        let elapsed = self.clock.advance(delta);
        let rotation = self.orientation.tick(elapsed);
        let layout = scene.layout();
        let camera = CameraState::derive(
            rotation,
            elapsed,
            &self.camera_config,
            layout.camera_path(),
            self.aspect,
        );

        let nearest = layout.nearest(camera.position.z);
        let tint = nearest
            .and_then(|i| layout.placements().get(i))
            .map(|placement| {
                let offset = (placement.position.z - camera.position.z).abs();
                let strength = (1.0 - offset / layout.spacing()).clamp(0.0, 1.0) * TINT_STRENGTH;
                let [r, g, b] = placement.color;
                [r, g, b, strength]
            })
            .unwrap_or([0.0; 4]);

        let scale = self.context.profile().scale;
        let position = camera.position;
        let right = camera.right();
        let up = camera.up();
        self.plan.frame = FrameUniforms {
            view_proj: camera.view_proj().to_cols_array_2d(),
            camera_position: [position.x, position.y, position.z, 1.0],
            camera_right: [right.x, right.y, right.z, 0.0],
            camera_up: [up.x, up.y, up.z, 0.0],
            tint,
            params: [elapsed, scale, layout.tunnel_length(), 0.0],
        };

        self.depth_scratch.clear();
        for (index, emitter) in scene.emitters_mut() {
            let dirty = emitter.update(elapsed, self.point_size, scale);
            let distance = emitter.spec().origin.distance_squared(position);
            self.depth_scratch.push((distance, index, dirty));
        }
        self.depth_scratch.sort_unstable_by(|a, b| b.0.total_cmp(&a.0));

        let draws = &mut self.plan.draws;
        draws.clear();
        draws.push(DrawCommand::Backdrop);
        draws.extend(
            self.depth_scratch
                .iter()
                .map(|&(_, emitter, dirty)| DrawCommand::Particles { emitter, dirty }),
        );
        draws.push(DrawCommand::Crystals);

        self.plan.camera = Some(camera);
        self.plan.nearest = nearest;
        self.ticked = true;
        Some(&self.plan)
    }

    /// The plan built by the last tick, if the driver is live.
    pub fn plan(&self) -> Option<&FramePlan> {
        (self.scene.is_some() && self.ticked).then_some(&self.plan)
    }

    /// Crystal under a point in normalised device coordinates, using the
    /// camera of the last tick.
    pub fn pick_at(&self, ndc: Vec2) -> Option<usize> {
        let scene = self.scene.as_ref()?;
        let camera = self.plan()?.camera?;
        pick(scene.layout(), &camera.ray_through(ndc), scene.crystal_size() * PICK_RADIUS)
    }

    pub fn hover_at(&mut self, ndc: Vec2, synth: &mut ToneSynth) -> bool {
        let target = self.pick_at(ndc);
        match self.scene.as_mut() {
            Some(scene) => scene.hover(target, synth),
            None => false,
        }
    }

    pub fn select_at(
        &mut self,
        ndc: Vec2,
        synth: &mut ToneSynth,
        listener: &mut dyn SelectionListener,
    ) -> Option<usize> {
        let target = self.pick_at(ndc);
        let scene = self.scene.as_mut()?;
        let selected = scene.select(target, synth, listener);
        let event_id = selected
            .and_then(|i| scene.layout().placements().get(i))
            .map(|p| p.event_id.clone());
        self.context.set_selected_event(event_id);
        selected
    }

    /// Stops all drawing and releases the scene. Later ticks return `None`.
    pub fn teardown(&mut self) {
        if let Some(scene) = self.scene.take() {
            scene.unmount();
        }
        self.plan.draws.clear();
        self.plan.camera = None;
        self.ticked = false;
        tracing::info!(frames = self.clock.frame, "frame driver torn down");
    }

    pub fn is_live(&self) -> bool {
        self.scene.is_some()
    }

    pub fn resize(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    pub fn elapsed(&self) -> f32 {
        self.clock.time_seconds
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    pub fn orientation(&self) -> &OrientationAdapter {
        &self.orientation
    }

    pub fn orientation_mut(&mut self) -> &mut OrientationAdapter {
        &mut self.orientation
    }

    pub fn scene(&self) -> Option<&Scene<P>> {
        self.scene.as_ref()
    }

    pub fn scene_mut(&mut self) -> Option<&mut Scene<P>> {
        self.scene.as_mut()
    }

    /// Capacity of the draw list. Stays constant for the life of a mount.
    pub fn draw_capacity(&self) -> usize {
        self.plan.draws.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{AudioConfig, OrientationConfig, SceneConfig},
        orientation::{OrientationCapability, OrientationSample},
        particles::HeadlessCompiler,
        Event, EventCategory, EventSnapshot, QualityTier,
    };

    fn driver(count: usize, capability: OrientationCapability) -> FrameDriver<()> {
        let events = (0..count)
            .map(|i| Event::new(format!("ev{i}"), EventCategory::ALL[i % 4], i as i64))
            .collect();
        let snapshot = EventSnapshot::new(events).unwrap();
        let profile = QualityTier::Medium.profile();
        let scene = Scene::mount(&snapshot, &profile, &SceneConfig::default(), &mut HeadlessCompiler);
        FrameDriver::new(
            RenderContext::new(profile, &snapshot),
            scene,
            OrientationAdapter::new(capability, OrientationConfig::default()),
            CameraConfig::default(),
            1.0,
            16.0 / 9.0,
        )
    }

    #[test]
    fn draws_backdrop_then_particles_far_to_near_then_crystals() {
        let mut driver = driver(5, OrientationCapability::UNSUPPORTED);
        let plan = driver.tick(0.016).unwrap();

        assert_eq!(plan.draws.len(), 7);
        assert_eq!(plan.draws[0], DrawCommand::Backdrop);
        assert_eq!(plan.draws[6], DrawCommand::Crystals);
        // The camera starts in front of event 0, so the last event is farthest.
        assert_eq!(plan.draws[1], DrawCommand::Particles { emitter: 4, dirty: true });
        assert_eq!(plan.draws[5], DrawCommand::Particles { emitter: 0, dirty: true });
    }

    fn dirty_emitters(plan: &FramePlan) -> Vec<usize> {
        plan.draws
            .iter()
            .filter_map(|draw| match *draw {
                DrawCommand::Particles { emitter, dirty: true } => Some(emitter),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn only_changed_uniforms_are_marked_for_upload() {
        let mut driver = driver(4, OrientationCapability::UNSUPPORTED);

        let first = driver.tick(0.0).unwrap();
        assert_eq!(dirty_emitters(first).len(), 4);

        let still = driver.tick(0.0).unwrap();
        assert!(dirty_emitters(still).is_empty());
        assert_eq!(still.draws.len(), 6);

        let moved = driver.tick(0.016).unwrap();
        assert_eq!(dirty_emitters(moved).len(), 4);
    }

    #[test]
    fn storage_is_reused_across_ticks() {
        let mut driver = driver(8, OrientationCapability::UNSUPPORTED);
        let capacity = driver.draw_capacity();
        for _ in 0..120 {
            driver.tick(1.0 / 60.0);
        }
        assert_eq!(driver.draw_capacity(), capacity);
    }

    #[test]
    fn uniforms_track_time_and_quality() {
        let mut driver = driver(3, OrientationCapability::UNSUPPORTED);
        driver.tick(0.1);
        let plan = driver.tick(0.1).unwrap();
        assert!((plan.frame.params[0] - 0.2).abs() < 1e-6);
        assert_eq!(plan.frame.params[1], QualityTier::Medium.scale());

        let scene = driver.scene().unwrap();
        for emitter in scene.emitters().iter().flatten() {
            assert!((emitter.uniforms().time - 0.2).abs() < 1e-6);
        }
    }

    #[test]
    fn granted_sensor_drives_the_camera() {
        let capability = OrientationCapability {
            supported: true,
            requires_permission: false,
        };
        let mut driver = driver(2, capability);
        driver.orientation_mut().push_sample(OrientationSample::new(10.0, 20.0, 0.0));
        let plan = driver.tick(0.016).unwrap();
        assert_eq!(plan.rotation_source(), Some(RotationSource::Sensor));
    }

    #[test]
    fn selection_is_reflected_in_context() {
        let mut driver = driver(3, OrientationCapability::UNSUPPORTED);
        let mut synth = ToneSynth::muted(AudioConfig::default());
        let mut listener = |_: &str| {};

        driver.tick(0.0);
        let camera = driver.plan().unwrap().camera.unwrap();
        let target = driver.scene().unwrap().layout().placements()[0].position;
        let clip = camera.view_proj().project_point3(target);
        let ndc = Vec2::new(clip.x, clip.y);

        assert_eq!(driver.pick_at(ndc), Some(0));
        assert_eq!(driver.select_at(ndc, &mut synth, &mut listener), Some(0));
        assert_eq!(driver.context().selected_event(), Some("ev0"));
        assert!(driver.scene().unwrap().interaction().is_active(0));
    }

    #[test]
    fn teardown_stops_frames() {
        let mut driver = driver(2, OrientationCapability::UNSUPPORTED);
        assert!(driver.tick(0.016).is_some());
        driver.teardown();
        assert!(driver.tick(0.016).is_none());
        assert!(driver.plan().is_none());
        assert!(!driver.is_live());
    }
}

use timeline_tunnel_core::{
    particles::{EmitterSpec, ParticleBuffer},
    AppConfig, DeviceProbe, DrawCommand, Event, EventCategory, EventSnapshot, FrameDriver, HeadlessCompiler,
    OrientationAdapter, OrientationCapability, OrientationSample, PermissionState,
    ProgramCompiler, QualityConfig, QualityController, QualityTier, RenderContext, Result, RotationSource, Scene,
    SceneLayout, TunnelError,
};

fn snapshot(count: usize) -> EventSnapshot {
    let events = (0..count)
        .map(|i| {
            Event::new(
                format!("event-{i:02}"),
                EventCategory::ALL[i % EventCategory::ALL.len()],
                1_800 + i as i64 * 10,
            )
        })
        .collect();
    EventSnapshot::new(events).unwrap()
}

fn driver<C>(
    snapshot: &EventSnapshot,
    tier: QualityTier,
    capability: OrientationCapability,
    compiler: &mut C,
) -> FrameDriver<C::Program>
where
    C: ProgramCompiler,
{
    let config = AppConfig::default();
    let profile = tier.profile();
    let scene = Scene::mount(snapshot, &profile, &config.scene, compiler);
    FrameDriver::new(
        RenderContext::new(profile, snapshot),
        scene,
        OrientationAdapter::new(capability, config.orientation.clone()),
        config.camera.clone(),
        config.scene.point_size,
        16.0 / 9.0,
    )
}

/// Rejects the program for one event id.
struct RejectEvent(&'static str);

impl ProgramCompiler for RejectEvent {
    type Program = ();

    fn compile(&mut self, label: &str, _spec: &EmitterSpec, _buffer: &ParticleBuffer) -> Result<()> {
        if label.ends_with(self.0) {
            return Err(TunnelError::ShaderCompilation {
                label: label.to_string(),
                message: "injected failure".into(),
            });
        }
        Ok(())
    }
}

#[test]
fn high_tier_mounts_full_scene() {
    let snapshot = snapshot(12);
    let config = AppConfig {
        quality: QualityConfig {
            force_tier: Some(QualityTier::High),
            ..Default::default()
        },
        ..AppConfig::default()
    };
    let probe = DeviceProbe {
        memory_gb: None,
        pixel_ratio: 1.0,
        gpu_renderer: None,
    };
    let profile = QualityController::new(config.quality.clone()).classify(&probe);
    assert_eq!(profile.tier, QualityTier::High);

    let scene = Scene::mount(&snapshot, &profile, &config.scene, &mut HeadlessCompiler);
    assert_eq!(scene.layout().len(), 12);
    assert_eq!(scene.active_emitter_count(), 12);
    for emitter in scene.emitters().iter().flatten() {
        assert_eq!(emitter.particle_count(), config.scene.base_particle_count as usize);
    }
}

#[test]
fn denied_permission_keeps_autonomous_camera() {
    let snapshot = snapshot(4);
    let capability = OrientationCapability {
        supported: true,
        requires_permission: true,
    };
    let mut sensor = driver(&snapshot, QualityTier::Medium, capability, &mut HeadlessCompiler);
    let mut reference = driver(
        &snapshot,
        QualityTier::Medium,
        OrientationCapability::UNSUPPORTED,
        &mut HeadlessCompiler,
    );

    sensor.orientation_mut().request_permission(0.0);
    sensor.orientation_mut().resolve_permission(false);
    let status = sensor.orientation().status();
    assert!(status.supported);
    assert_eq!(status.permission, PermissionState::Denied);

    for frame in 0..30 {
        sensor
            .orientation_mut()
            .push_sample(OrientationSample::new(frame as f32 * 7.0, 40.0, -20.0));
        let expected = reference.tick(1.0 / 60.0).unwrap().camera;
        let actual = sensor.tick(1.0 / 60.0).unwrap();
        assert_eq!(actual.rotation_source(), Some(RotationSource::Autonomous));
        assert_eq!(actual.camera, expected);
    }
}

#[test]
fn pending_permission_times_out_to_autonomous() {
    let snapshot = snapshot(2);
    let capability = OrientationCapability {
        supported: true,
        requires_permission: true,
    };
    let mut driver = driver(&snapshot, QualityTier::Low, capability, &mut HeadlessCompiler);
    driver.orientation_mut().request_permission(0.0);

    let timeout = AppConfig::default().orientation.permission_timeout_seconds;
    let mut elapsed = 0.0;
    while elapsed < timeout + 0.5 {
        driver.tick(0.2);
        elapsed += 0.2;
    }
    assert_eq!(driver.orientation().status().permission, PermissionState::Denied);
    assert_eq!(
        driver.tick(0.2).unwrap().rotation_source(),
        Some(RotationSource::Autonomous)
    );
}

#[test]
fn failed_emitter_leaves_rest_of_frame_intact() {
    let snapshot = snapshot(12);
    let mut driver = driver(
        &snapshot,
        QualityTier::Medium,
        OrientationCapability::UNSUPPORTED,
        &mut RejectEvent("event-05"),
    );

    assert_eq!(driver.scene().unwrap().active_emitter_count(), 11);
    let plan = driver.tick(0.016).unwrap();

    assert_eq!(plan.draws.first(), Some(&DrawCommand::Backdrop));
    assert_eq!(plan.draws.last(), Some(&DrawCommand::Crystals));
    let particles: Vec<usize> = plan
        .draws
        .iter()
        .filter_map(|draw| match draw {
            DrawCommand::Particles { emitter, .. } => Some(*emitter),
            _ => None,
        })
        .collect();
    assert_eq!(particles.len(), 11);
    assert!(!particles.contains(&5));
}

#[test]
fn remount_reproduces_layout_and_counts() {
    let snapshot = snapshot(9);
    let config = AppConfig::default();
    let profile = QualityTier::Low.profile();

    let first = Scene::mount(&snapshot, &profile, &config.scene, &mut HeadlessCompiler);
    let layout: SceneLayout = first.layout().clone();
    let records: Vec<_> = first
        .emitters()
        .iter()
        .flatten()
        .map(|e| e.buffer().records().to_vec())
        .collect();
    first.unmount();

    let second = Scene::mount(&snapshot, &profile, &config.scene, &mut HeadlessCompiler);
    assert_eq!(second.layout(), &layout);
    assert_eq!(second.active_emitter_count(), 9);
    let again: Vec<_> = second
        .emitters()
        .iter()
        .flatten()
        .map(|e| e.buffer().records().to_vec())
        .collect();
    assert_eq!(again, records);
}

#[test]
fn particle_counts_scale_with_tier() {
    let snapshot = snapshot(3);
    let config = AppConfig::default();
    let base = config.scene.base_particle_count;

    let counts: Vec<usize> = [QualityTier::Low, QualityTier::Medium, QualityTier::High]
        .into_iter()
        .map(|tier| {
            let scene = Scene::mount(&snapshot, &tier.profile(), &config.scene, &mut HeadlessCompiler);
            scene.emitters()[0].as_ref().unwrap().particle_count()
        })
        .collect();

    assert_eq!(counts[0], (base as f32 * 0.3).round() as usize);
    assert_eq!(counts[1], (base as f32 * 0.6).round() as usize);
    assert_eq!(counts[2], base as usize);
}

#[test]
fn teardown_stops_drawing() {
    let snapshot = snapshot(5);
    let mut driver = driver(
        &snapshot,
        QualityTier::High,
        OrientationCapability::UNSUPPORTED,
        &mut HeadlessCompiler,
    );
    for _ in 0..10 {
        assert!(driver.tick(0.016).is_some());
    }
    driver.teardown();
    assert!(driver.tick(0.016).is_none());
    assert!(driver.scene().is_none());
}

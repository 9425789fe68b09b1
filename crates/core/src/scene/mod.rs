//! Scene composition: crystal placements, per-event emitters, the tunnel
//! backdrop and hover/selection state.

pub mod crystal;
pub mod interaction;
pub mod layout;
pub mod tunnel;

pub use crystal::{crystal_vertices, CrystalInstance, CrystalVertex, CRYSTAL_SHADER};
pub use interaction::{pick, InteractionState, Ray, SelectionListener};
pub use layout::{CameraPath, CrystalPlacement, SceneLayout};
pub use tunnel::{TunnelMesh, TunnelVertex, TUNNEL_SHADER};

use crate::{
    audio::ToneSynth,
    config::SceneConfig,
    particles::{Emitter, ProgramCompiler},
    EventSnapshot, QualityProfile,
};

/// Everything drawn for one event snapshot. Built by [`Scene::mount`],
/// released by [`Scene::unmount`] or drop.
#[derive(Debug)]
pub struct Scene<P> {
    layout: SceneLayout,
    emitters: Vec<Option<Emitter<P>>>,
    tunnel: TunnelMesh,
    crystals: Vec<CrystalInstance>,
    interaction: InteractionState,
    crystal_size: f32,
    crystal_generation: u64,
}

impl<P> Scene<P> {
    pub fn mount<C>(
        snapshot: &EventSnapshot,
        profile: &QualityProfile,
        config: &SceneConfig,
        compiler: &mut C,
    ) -> Self
    where
        C: ProgramCompiler<Program = P>,
    {
        let layout = SceneLayout::compose(snapshot, profile, config);

        let emitters: Vec<Option<Emitter<P>>> = layout
            .placements()
            .iter()
            .map(|placement| {
                let label = format!("emitter.{}", placement.event_id);
                match Emitter::new(label, placement.emitter.clone(), &mut *compiler) {
                    Ok(emitter) => Some(emitter),
                    Err(err) => {
                        tracing::warn!(
                            index = placement.index,
                            event = %placement.event_id,
                            %err,
                            "particle emitter disabled"
                        );
                        None
                    }
                }
            })
            .collect();

        let tunnel = TunnelMesh::cylinder(
            config.tunnel_radius,
            layout.camera_path().start_z + config.tunnel_padding * 0.5,
            layout.tunnel_length(),
            config.tunnel_radial_segments,
            config.tunnel_length_segments,
        );

        let crystals = layout
            .placements()
            .iter()
            .map(|p| CrystalInstance::from_placement(p, config.crystal_size, false))
            .collect();

        let scene = Self {
            layout,
            emitters,
            tunnel,
            crystals,
            interaction: InteractionState::default(),
            crystal_size: config.crystal_size,
            crystal_generation: 0,
        };

        tracing::info!(
            tier = %profile.tier,
            events = scene.layout.len(),
            emitters = scene.active_emitter_count(),
            particles_per_emitter = profile.particle_count(config.base_particle_count),
            "scene mounted"
        );
        scene
    }

    /// Drops every emitter and its GPU resources.
    pub fn unmount(self) {
        tracing::info!(events = self.layout.len(), "scene unmounted");
    }

    pub fn layout(&self) -> &SceneLayout {
        &self.layout
    }

    /// One slot per placement; `None` where the emitter failed to build.
    pub fn emitters(&self) -> &[Option<Emitter<P>>] {
        &self.emitters
    }

    pub fn emitters_mut(&mut self) -> impl Iterator<Item = (usize, &mut Emitter<P>)> {
        self.emitters
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|e| (i, e)))
    }

    pub fn active_emitter_count(&self) -> usize {
        self.emitters.iter().filter(|e| e.is_some()).count()
    }

    pub fn tunnel(&self) -> &TunnelMesh {
        &self.tunnel
    }

    pub fn crystals(&self) -> &[CrystalInstance] {
        &self.crystals
    }

    /// Bumped every time the crystal instances are rebuilt.
    pub fn crystal_generation(&self) -> u64 {
        self.crystal_generation
    }

    pub fn crystal_size(&self) -> f32 {
        self.crystal_size
    }

    pub fn interaction(&self) -> &InteractionState {
        &self.interaction
    }

    pub fn hover(&mut self, target: Option<usize>, synth: &mut ToneSynth) -> bool {
        let changed = self.interaction.hover(target, &self.layout, synth);
        self.refresh_crystals();
        changed
    }

    pub fn select(
        &mut self,
        target: Option<usize>,
        synth: &mut ToneSynth,
        listener: &mut dyn SelectionListener,
    ) -> Option<usize> {
        let selected = self.interaction.select(target, &self.layout, synth, listener);
        self.refresh_crystals();
        selected
    }

    /// Rebuilds crystal instances after a hover or selection change. Returns
    /// whether anything was rebuilt.
    pub fn refresh_crystals(&mut self) -> bool {
        if !self.interaction.take_dirty() {
            return false;
        }
        for (i, (instance, placement)) in self
            .crystals
            .iter_mut()
            .zip(self.layout.placements())
            .enumerate()
        {
            *instance = CrystalInstance::from_placement(
                placement,
                self.crystal_size,
                self.interaction.is_active(i),
            );
        }
        self.crystal_generation += 1;
        true
    }
}

//! Immutable 2D noise fields shared read-only across generation workers.

use noise::{Constant, Fbm, MultiFractal, NoiseFn, Perlin};

use super::config::{NoiseFieldConfig, NoiseKind};

enum Source {
    Fbm(Fbm<Perlin>),
    Constant(Constant),
}

/// Deterministic function of world (x, z) returning a value in [-1, 1].
pub struct NoiseField {
    config: NoiseFieldConfig,
    source: Source,
}

impl NoiseField {
    /// Build the field. Octave count is clamped to at least one.
    pub fn new(config: NoiseFieldConfig) -> Self {
        let source = match config.kind {
            NoiseKind::Perlin => Source::Fbm(
                Fbm::<Perlin>::new(config.seed)
                    .set_octaves(config.octaves.max(1) as usize)
                    .set_frequency(config.frequency)
                    .set_lacunarity(2.0)
                    .set_persistence(0.5),
            ),
            NoiseKind::Constant { value } => Source::Constant(Constant::new(value)),
        };
        Self { config, source }
    }

    pub fn config(&self) -> &NoiseFieldConfig {
        &self.config
    }

    /// Sample at world position, clamped to [-1, 1].
    pub fn sample(&self, x: f32, z: f32) -> f32 {
        let point = [x as f64, z as f64];
        let value = match &self.source {
            Source::Fbm(fbm) => fbm.get(point),
            Source::Constant(constant) => constant.get(point),
        };
        (value as f32).clamp(-1.0, 1.0)
    }
}

impl std::fmt::Debug for NoiseField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseField")
            .field("config", &self.config)
            .finish()
    }
}

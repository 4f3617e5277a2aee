//! Threshold-table biome classification.

use log::warn;

use crate::core::types::Color;
use super::config::BiomeDefinition;

/// Ascending threshold lookup built from named biome definitions.
///
/// `thresholds[i]` is the exclusive upper bound of biome `i`; the last biome
/// has no stored threshold and catches everything above.
#[derive(Clone, Debug)]
pub struct BiomeClassifier {
    names: Vec<String>,
    colors: Vec<Color>,
    thresholds: Vec<f32>,
}

impl BiomeClassifier {
    /// Sort `biomes` by threshold (stable) and build the parallel tables.
    ///
    /// An empty list falls back to a single biome covering the whole range.
    pub fn build(biomes: &[BiomeDefinition]) -> Self {
        if biomes.is_empty() {
            warn!("No biome definitions configured, using a single default biome");
            return Self {
                names: vec!["default".to_string()],
                colors: vec![Color::rgb(0.447, 0.569, 0.267)],
                thresholds: Vec::new(),
            };
        }

        let mut sorted: Vec<&BiomeDefinition> = biomes.iter().collect();
        sorted.sort_by(|a, b| a.threshold.total_cmp(&b.threshold));

        let thresholds = sorted[..sorted.len() - 1]
            .iter()
            .map(|b| b.threshold)
            .collect();

        Self {
            names: sorted.iter().map(|b| b.name.clone()).collect(),
            colors: sorted.iter().map(|b| b.color).collect(),
            thresholds,
        }
    }

    /// Smallest `i` with `value < thresholds[i]`, or the last index.
    pub fn classify(&self, value: f32) -> usize {
        self.thresholds
            .iter()
            .position(|&t| value < t)
            .unwrap_or(self.thresholds.len())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn color(&self, index: usize) -> Color {
        self.colors.get(index).copied().unwrap_or(Color::WHITE)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn thresholds(&self) -> &[f32] {
        &self.thresholds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::config::default_biomes;

    fn biome(name: &str, threshold: f32) -> BiomeDefinition {
        BiomeDefinition::new(name, Color::WHITE, threshold)
    }

    #[test]
    fn test_build_sorts_ascending() {
        let classifier = BiomeClassifier::build(&[biome("c", 1.0), biome("a", -0.5), biome("b", 0.2)]);
        assert_eq!(classifier.len(), 3);
        assert_eq!(classifier.name(0), Some("a"));
        assert_eq!(classifier.name(2), Some("c"));
        assert_eq!(classifier.thresholds(), &[-0.5, 0.2]);
    }

    #[test]
    fn test_threshold_equality_goes_to_next_biome() {
        let classifier = BiomeClassifier::build(&default_biomes());
        assert_eq!(classifier.classify(-0.7), 0);
        assert_eq!(classifier.classify(-0.6), 1);
        assert_eq!(classifier.classify(-0.3), 2);
        assert_eq!(classifier.classify(-0.1), 3);
        assert_eq!(classifier.classify(-0.30001), 1);
        assert_eq!(classifier.classify(-0.29999), 2);
    }

    #[test]
    fn test_last_biome_is_catch_all() {
        let classifier = BiomeClassifier::build(&default_biomes());
        assert_eq!(classifier.classify(0.7), 7);
        assert_eq!(classifier.classify(1.0), 7);
        assert_eq!(classifier.classify(50.0), 7);
    }

    #[test]
    fn test_two_biomes_single_threshold() {
        let classifier = BiomeClassifier::build(&[biome("low", 0.0), biome("high", 1.0)]);
        assert_eq!(classifier.classify(-0.5), 0);
        assert_eq!(classifier.classify(0.0), 1);
        assert_eq!(classifier.classify(0.5), 1);
    }

    #[test]
    fn test_empty_falls_back_to_default() {
        let classifier = BiomeClassifier::build(&[]);
        assert_eq!(classifier.len(), 1);
        assert_eq!(classifier.classify(-1.0), 0);
        assert_eq!(classifier.classify(1.0), 0);
    }

    #[test]
    fn test_lookup_by_name() {
        let classifier = BiomeClassifier::build(&default_biomes());
        assert_eq!(classifier.index_of("forest"), Some(1));
        assert_eq!(classifier.index_of("tundra"), None);
        assert_eq!(classifier.color(99), Color::WHITE);
    }
}

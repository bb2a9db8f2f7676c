//! Cultural bias matrix analysis
//!
//! Scores content-feature vectors against a reference taxonomy of cultural
//! and demographic categories. Categories count as represented when their
//! presence score clears a per-category threshold; designated category
//! pairs carry intersectionality weights so compounded representation (or
//! its absence) is scored jointly rather than independently summed.
//!
//! Stateless per content item: no cross-request memory, trivially
//! parallelizable.

use crate::error::EngineError;
use crate::types::{AgeBand, ContentFeatures, CulturalBiasAnalysis, CulturalContext};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// One category of the reference taxonomy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyCategory {
    /// Key matched against `ContentFeatures::category_presence`
    pub name: String,
    /// Human-readable perspective label used in analysis output
    pub label: String,
    /// Minimum presence score for the category to count as represented
    pub presence_threshold: f64,
    /// Audience age bands for which absence is demographically significant
    pub significant_for: Vec<AgeBand>,
}

/// Intersectionality weight for a designated category pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntersectionWeight {
    pub a: String,
    pub b: String,
    /// Joint weight; above 1.0 amplifies the pair beyond independent summing
    pub weight: f64,
}

/// Reference taxonomy plus intersectionality matrix and cultural marker lists.
///
/// Part of the startup configuration surface: validated before any request
/// is served.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasTaxonomy {
    pub categories: Vec<TaxonomyCategory>,
    pub intersections: Vec<IntersectionWeight>,
}

impl Default for BiasTaxonomy {
    fn default() -> Self {
        let all_bands = vec![
            AgeBand::EarlyChildhood,
            AgeBand::MiddleChildhood,
            AgeBand::Adolescence,
            AgeBand::LateAdolescence,
        ];
        let older_bands = vec![AgeBand::Adolescence, AgeBand::LateAdolescence];

        let category = |name: &str, label: &str, bands: &[AgeBand]| TaxonomyCategory {
            name: name.to_string(),
            label: label.to_string(),
            presence_threshold: 0.2,
            significant_for: bands.to_vec(),
        };

        Self {
            categories: vec![
                category("gender", "diverse gender perspectives", &all_bands),
                category("racial", "racial and ethnic diversity", &all_bands),
                category(
                    "socioeconomic",
                    "socioeconomic perspectives",
                    &older_bands,
                ),
                category("ability", "disability representation", &all_bands),
                category("age", "intergenerational perspectives", &older_bands),
                category("religious", "religious diversity", &older_bands),
                category(
                    "cultural_origin",
                    "non-dominant cultural origins",
                    &all_bands,
                ),
            ],
            intersections: vec![
                IntersectionWeight {
                    a: "gender".to_string(),
                    b: "racial".to_string(),
                    weight: 1.5,
                },
                IntersectionWeight {
                    a: "racial".to_string(),
                    b: "socioeconomic".to_string(),
                    weight: 1.4,
                },
                IntersectionWeight {
                    a: "gender".to_string(),
                    b: "ability".to_string(),
                    weight: 1.3,
                },
                IntersectionWeight {
                    a: "age".to_string(),
                    b: "ability".to_string(),
                    weight: 1.2,
                },
                IntersectionWeight {
                    a: "religious".to_string(),
                    b: "racial".to_string(),
                    weight: 1.4,
                },
            ],
        }
    }
}

impl BiasTaxonomy {
    /// Validate category thresholds and intersection references
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.categories.is_empty() {
            return Err(EngineError::Configuration(
                "bias taxonomy must declare at least one category".to_string(),
            ));
        }
        for cat in &self.categories {
            if !(0.0..=1.0).contains(&cat.presence_threshold) {
                return Err(EngineError::Configuration(format!(
                    "presence threshold for '{}' must be in [0,1]",
                    cat.name
                )));
            }
        }
        for pair in &self.intersections {
            if pair.weight <= 0.0 || !pair.weight.is_finite() {
                return Err(EngineError::Configuration(format!(
                    "intersection weight for ({}, {}) must be positive",
                    pair.a, pair.b
                )));
            }
            for name in [&pair.a, &pair.b] {
                if !self.categories.iter().any(|c| &c.name == name) {
                    return Err(EngineError::Configuration(format!(
                        "intersection references unknown category '{}'",
                        name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Cultural marker vocabulary for a context, matched against content tags
fn context_markers(context: CulturalContext) -> &'static [&'static str] {
    match context {
        CulturalContext::Western => &[
            "individualism",
            "innovation",
            "democracy",
            "freedom",
            "progress",
            "efficiency",
            "competition",
        ],
        CulturalContext::Eastern => &[
            "harmony",
            "respect",
            "tradition",
            "collective good",
            "balance",
            "wisdom",
        ],
        CulturalContext::Indigenous => &[
            "nature connection",
            "ancestral wisdom",
            "sustainability",
            "community bonds",
            "spiritual practices",
        ],
        CulturalContext::GlobalSouth => &[
            "community resilience",
            "informal economies",
            "migration",
            "postcolonial identity",
        ],
        CulturalContext::Unclassified => &[],
    }
}

/// Stateless analyzer computing [`CulturalBiasAnalysis`] records
pub struct BiasAnalyzer {
    taxonomy: BiasTaxonomy,
}

impl Default for BiasAnalyzer {
    fn default() -> Self {
        Self {
            taxonomy: BiasTaxonomy::default(),
        }
    }
}

impl BiasAnalyzer {
    /// Build an analyzer over a validated taxonomy
    pub fn new(taxonomy: BiasTaxonomy) -> Result<Self, EngineError> {
        taxonomy.validate()?;
        Ok(Self { taxonomy })
    }

    /// Analyze one content item.
    ///
    /// `representation_score` is the intersectionality-weighted fraction of
    /// the taxonomy represented above threshold; `overall_bias_score` is its
    /// complement. Raising any presence score can never decrease
    /// representation.
    pub fn analyze(
        &self,
        content_id: &str,
        cultural_context: CulturalContext,
        features: &ContentFeatures,
    ) -> Result<CulturalBiasAnalysis, EngineError> {
        if content_id.trim().is_empty() {
            return Err(EngineError::InvalidInput("content_id is empty".to_string()));
        }

        let present: Vec<bool> = self
            .taxonomy
            .categories
            .iter()
            .map(|cat| {
                features
                    .category_presence
                    .get(&cat.name)
                    .map(|p| *p >= cat.presence_threshold)
                    .unwrap_or(false)
            })
            .collect();

        let representation_score = self.weighted_coverage(&present);

        let missing_perspectives: Vec<String> = self
            .taxonomy
            .categories
            .iter()
            .zip(&present)
            .filter(|(_, p)| !**p)
            .map(|(cat, _)| cat.label.clone())
            .collect();

        let underrepresented_groups: Vec<String> = self
            .taxonomy
            .categories
            .iter()
            .zip(&present)
            .filter(|(cat, p)| !**p && cat.significant_for.contains(&features.audience))
            .map(|(cat, _)| cat.label.clone())
            .collect();

        let markers = context_markers(cultural_context);
        let cultural_markers: Vec<String> = features
            .tags
            .iter()
            .filter(|tag| {
                let tag = tag.to_lowercase();
                markers.iter().any(|m| tag.contains(m))
            })
            .cloned()
            .collect();

        Ok(CulturalBiasAnalysis {
            content_id: content_id.to_string(),
            cultural_context,
            representation_score,
            cultural_markers,
            missing_perspectives,
            underrepresented_groups,
            overall_bias_score: 1.0 - representation_score,
            created_at: Utc::now(),
        })
    }

    /// Coverage with pairwise intersectionality bonuses:
    ///
    /// ```text
    /// (Σ present_i + Σ w_ab · present_a · present_b) / (N + Σ w_ab)
    /// ```
    ///
    /// Full presence yields 1.0, zero presence yields 0.0, and each pair's
    /// joint term only counts when both members are represented.
    fn weighted_coverage(&self, present: &[bool]) -> f64 {
        let base: f64 = present.iter().filter(|p| **p).count() as f64;
        let mut joint = 0.0;
        let mut joint_max = 0.0;

        for pair in &self.taxonomy.intersections {
            joint_max += pair.weight;
            let a_present = self
                .index_of(&pair.a)
                .map(|i| present[i])
                .unwrap_or(false);
            let b_present = self
                .index_of(&pair.b)
                .map(|i| present[i])
                .unwrap_or(false);
            if a_present && b_present {
                joint += pair.weight;
            }
        }

        let denominator = present.len() as f64 + joint_max;
        if denominator <= 0.0 {
            return 0.0;
        }
        ((base + joint) / denominator).clamp(0.0, 1.0)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.taxonomy.categories.iter().position(|c| c.name == name)
    }

    /// The configured taxonomy (for diagnostics)
    pub fn taxonomy(&self) -> &BiasTaxonomy {
        &self.taxonomy
    }
}

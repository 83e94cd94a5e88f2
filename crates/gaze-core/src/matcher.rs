//! Nearest-sample identification against the registered gallery.

use crate::types::{Embedding, IdentityRecord};

/// Strategy for identifying a probe embedding against a gallery of
/// registered identities.
pub trait Matcher {
    fn identify(
        &self,
        probe: &Embedding,
        gallery: &[IdentityRecord],
        threshold: f32,
    ) -> MatchResult;
}

/// Outcome of identifying one probe embedding.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub matched: bool,
    /// Best distance found across the whole gallery. 0.0 when the gallery
    /// was empty. Reported even for non-matches, for diagnostics.
    pub distance: f32,
    pub record_id: Option<String>,
    pub name: Option<String>,
}

impl MatchResult {
    pub fn no_match() -> Self {
        Self {
            matched: false,
            distance: 0.0,
            record_id: None,
            name: None,
        }
    }

    /// Confidence of the match: `1 - distance`, clamped to [0, 1].
    ///
    /// Distance over L2-normalized embeddings ranges up to 2, so the clamp
    /// keeps the reported value well-formed. 0.0 for non-matches.
    pub fn confidence(&self) -> f32 {
        if self.matched {
            (1.0 - self.distance).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Matcher that represents each identity by the minimum distance over all
/// of its raw sample embeddings, not the stored mean.
///
/// Comparing against individual samples is more robust for identities with
/// high intra-class variance (glasses on/off, expression changes).
pub struct NearestSampleMatcher;

impl Matcher for NearestSampleMatcher {
    fn identify(
        &self,
        probe: &Embedding,
        gallery: &[IdentityRecord],
        threshold: f32,
    ) -> MatchResult {
        if gallery.is_empty() {
            return MatchResult::no_match();
        }

        let mut best_distance = f32::INFINITY;
        let mut best_idx: Option<usize> = None;

        for (i, record) in gallery.iter().enumerate() {
            for sample in &record.samples {
                let d = probe.euclidean_distance(sample);
                // Strict `<`: ties keep the earliest-registered record.
                if d < best_distance {
                    best_distance = d;
                    best_idx = Some(i);
                }
            }
        }

        match best_idx {
            Some(idx) if best_distance <= threshold => MatchResult {
                matched: true,
                distance: best_distance,
                record_id: Some(gallery[idx].id.clone()),
                name: Some(gallery[idx].name.clone()),
            },
            Some(_) => MatchResult {
                matched: false,
                distance: best_distance,
                record_id: None,
                name: None,
            },
            None => MatchResult::no_match(),
        }
    }
}

//! Spatial classification of ranked chunks by their spread across a
//! document: concentrated runs, wide scatter, or something in between.

use crate::types::ScoredChunk;

/// Default spread (stddev of chunk positions) below which a topic's
/// matches count as concentrated.
const DEFAULT_CONCENTRATED_BELOW: f32 = 10.0;

/// Default spread above which matches count as spread out.
const DEFAULT_SPREAD_ABOVE: f32 = 50.0;

/// Spatial classification cutoffs. The defaults come from the shipped
/// behavior; both are tunable.
#[derive(Debug, Clone)]
pub struct SpatialConfig {
    /// Spread below this classifies as concentrated.
    pub concentrated_below: f32,
    /// Spread above this classifies as spread.
    pub spread_above: f32,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            concentrated_below: DEFAULT_CONCENTRATED_BELOW,
            spread_above: DEFAULT_SPREAD_ABOVE,
        }
    }
}

/// User-selected spatial filter mode for a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpatialMode {
    /// Pass everything through.
    #[default]
    Auto,
    /// Keep results only when they cluster tightly.
    Concentrated,
    /// Keep results only when they scatter widely.
    Spread,
}

/// Observed distribution of a topic's matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpatialPattern {
    /// No chunks matched.
    None,
    /// Exactly one chunk matched.
    Single,
    /// Matches cluster within a tight run of chunk positions.
    Concentrated,
    /// Matches scatter across the document.
    Spread,
    /// Neither tight nor scattered.
    Moderate,
}

/// Classify ranked chunks by the standard deviation of their positions.
pub fn classify(chunks: &[ScoredChunk], config: &SpatialConfig) -> SpatialPattern {
    match chunks.len() {
        0 => return SpatialPattern::None,
        1 => return SpatialPattern::Single,
        _ => {}
    }

    let spread = position_stddev(chunks);
    if spread < config.concentrated_below {
        SpatialPattern::Concentrated
    } else if spread > config.spread_above {
        SpatialPattern::Spread
    } else {
        SpatialPattern::Moderate
    }
}

/// Apply the user-selected mode: auto passes through, the other modes keep
/// the topic's chunks only when the observed pattern matches.
pub fn apply_mode(
    chunks: Vec<ScoredChunk>,
    mode: SpatialMode,
    config: &SpatialConfig,
) -> (Vec<ScoredChunk>, SpatialPattern) {
    let pattern = classify(&chunks, config);
    let keep = match mode {
        SpatialMode::Auto => true,
        SpatialMode::Concentrated => pattern == SpatialPattern::Concentrated,
        SpatialMode::Spread => pattern == SpatialPattern::Spread,
    };
    if keep {
        (chunks, pattern)
    } else {
        (Vec::new(), pattern)
    }
}

/// Standard deviation of chunk positions.
fn position_stddev(chunks: &[ScoredChunk]) -> f32 {
    let n = chunks.len() as f64;
    let mean: f64 = chunks
        .iter()
        .map(|s| s.chunk.chunk_number as f64)
        .sum::<f64>()
        / n;
    let variance: f64 = chunks
        .iter()
        .map(|s| {
            let d = s.chunk.chunk_number as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    variance.sqrt() as f32
}

//! Intent scoring — how strongly a handler claims a message.
//!
//! The router only sees the [`IntentScorer`] trait. The built-in handlers use
//! [`KeywordTiers`]: an ordered list of keyword tiers evaluated top-down, where
//! the first tier with any case-insensitive substring hit decides the score.

/// Scores free text for one handler. Must be pure and return a value in `[0, 1]`.
pub trait IntentScorer: Send + Sync {
    fn score(&self, text: &str) -> f32;
}

impl<F> IntentScorer for F
where
    F: Fn(&str) -> f32 + Send + Sync,
{
    fn score(&self, text: &str) -> f32 {
        self(text).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone)]
struct Tier {
    score: f32,
    keywords: Vec<String>,
}

/// Layered keyword matcher.
#[derive(Debug, Clone)]
pub struct KeywordTiers {
    tiers: Vec<Tier>,
    fallback: f32,
}

impl KeywordTiers {
    /// A matcher with no tiers that always returns `fallback`.
    pub fn new(fallback: f32) -> Self {
        Self {
            tiers: Vec::new(),
            fallback: fallback.clamp(0.0, 1.0),
        }
    }

    /// Append a tier. Tiers are checked in insertion order.
    pub fn tier(mut self, score: f32, keywords: &[&str]) -> Self {
        self.tiers.push(Tier {
            score: score.clamp(0.0, 1.0),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        });
        self
    }

    pub fn fallback(&self) -> f32 {
        self.fallback
    }

    /// The first keyword that matched, with its tier score.
    pub fn matched<'a>(&'a self, text: &str) -> Option<(&'a str, f32)> {
        let lowered = text.to_lowercase();
        self.tiers.iter().find_map(|tier| {
            tier.keywords
                .iter()
                .find(|k| lowered.contains(k.as_str()))
                .map(|k| (k.as_str(), tier.score))
        })
    }
}

impl IntentScorer for KeywordTiers {
    fn score(&self, text: &str) -> f32 {
        self.matched(text)
            .map(|(_, score)| score)
            .unwrap_or(self.fallback)
    }
}

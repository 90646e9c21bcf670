//! Session context — product/brand facts that personalize every persona.
//!
//! A context is plain data. It is passed explicitly into routing and
//! generation calls; no handler stores it.

use serde::{Deserialize, Serialize};

/// Tone the generated copy should take.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrandVoice {
    #[default]
    Casual,
    Professional,
    Playful,
}

impl BrandVoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Casual => "casual",
            Self::Professional => "professional",
            Self::Playful => "playful",
        }
    }

    /// Lenient parse used for stored records; unknown values fall back to casual.
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "professional" => Self::Professional,
            "playful" => Self::Playful,
            _ => Self::Casual,
        }
    }
}

impl std::fmt::Display for BrandVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product/brand facts attached to persona construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Product name (required)
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,

    /// Key features in display order
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "null_as_empty"
    )]
    pub key_features: Vec<String>,

    /// Unset means "not specified"; the effective voice is then casual.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_voice: Option<BrandVoice>,
}

impl SessionContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tagline: None,
            target_audience: None,
            key_features: Vec::new(),
            brand_voice: None,
        }
    }

    pub fn with_tagline(mut self, tagline: impl Into<String>) -> Self {
        self.tagline = Some(tagline.into());
        self
    }

    pub fn with_target_audience(mut self, audience: impl Into<String>) -> Self {
        self.target_audience = Some(audience.into());
        self
    }

    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_features = features.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_brand_voice(mut self, voice: BrandVoice) -> Self {
        self.brand_voice = Some(voice);
        self
    }

    pub fn effective_voice(&self) -> BrandVoice {
        self.brand_voice.unwrap_or_default()
    }

    /// Render the context block appended to a persona.
    ///
    /// Field order is fixed: name, tagline, audience, features, brand voice.
    /// Absent optional fields are omitted.
    pub fn render(&self) -> String {
        let mut lines = vec![format!("Product Name: {}", self.name)];

        if let Some(tagline) = non_blank(&self.tagline) {
            lines.push(format!("Tagline: {tagline}"));
        }
        if let Some(audience) = non_blank(&self.target_audience) {
            lines.push(format!("Target Audience: {audience}"));
        }
        if !self.key_features.is_empty() {
            lines.push(format!("Key Features: {}", self.key_features.join(", ")));
        }
        if let Some(voice) = self.brand_voice {
            lines.push(format!("Brand Voice: {voice}"));
        }

        lines.join("\n")
    }
}

/// Clients send `"key_features": null` for "no features".
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::hasher::perceptual::Fingerprint;

/// Raised when a label does not name any variant of a closed enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabel(pub String);

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown label: {:?}", self.0)
    }
}

impl std::error::Error for UnknownLabel {}

/// How the provider is asked to pull the drawing back on model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorrectionMode {
    /// Mode A: redistribute feature proportions globally, scaled by strength.
    Proportion,
    /// Mode B: anchor unmasked content, deviation scaled by line preservation and scope.
    Conditioned,
}

impl CorrectionMode {
    pub const ALL: [CorrectionMode; 2] = [CorrectionMode::Proportion, CorrectionMode::Conditioned];

    pub fn label(self) -> &'static str {
        match self {
            CorrectionMode::Proportion => "Proportion",
            CorrectionMode::Conditioned => "Conditioned",
        }
    }
}

impl fmt::Display for CorrectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CorrectionMode {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Proportion" | "Proportion (Mode A)" => Ok(CorrectionMode::Proportion),
            "Conditioned" | "Conditioned (Mode B)" => Ok(CorrectionMode::Conditioned),
            other => Err(UnknownLabel(other.to_string())),
        }
    }
}

/// Camera/viewing angle of a pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AngleTag {
    Front,
    #[serde(rename = "3/4 View")]
    ThreeQuarter,
    Profile,
    Upshot,
    Downshot,
    Generic,
}

impl AngleTag {
    pub const ALL: [AngleTag; 6] = [
        AngleTag::Front,
        AngleTag::ThreeQuarter,
        AngleTag::Profile,
        AngleTag::Upshot,
        AngleTag::Downshot,
        AngleTag::Generic,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AngleTag::Front => "Front",
            AngleTag::ThreeQuarter => "3/4 View",
            AngleTag::Profile => "Profile",
            AngleTag::Upshot => "Upshot",
            AngleTag::Downshot => "Downshot",
            AngleTag::Generic => "Generic",
        }
    }

    /// The angle judged close enough to stand in for this one.
    /// Adjacency is symmetric: every angle is the neighbour of its neighbour.
    pub fn adjacent(self) -> AngleTag {
        match self {
            AngleTag::Front => AngleTag::Generic,
            AngleTag::Generic => AngleTag::Front,
            AngleTag::Upshot => AngleTag::Downshot,
            AngleTag::Downshot => AngleTag::Upshot,
            AngleTag::Profile => AngleTag::ThreeQuarter,
            AngleTag::ThreeQuarter => AngleTag::Profile,
        }
    }
}

impl fmt::Display for AngleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AngleTag {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AngleTag::ALL
            .into_iter()
            .find(|tag| tag.label() == s)
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

/// Which part of the figure the correction concentrates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CorrectionScope {
    #[default]
    #[serde(rename = "Full Image")]
    FullImage,
    #[serde(rename = "Face Priority")]
    FacePriority,
    #[serde(rename = "Clothing Priority")]
    ClothingPriority,
    #[serde(rename = "Hands Priority")]
    HandsPriority,
}

impl CorrectionScope {
    pub const ALL: [CorrectionScope; 4] = [
        CorrectionScope::FullImage,
        CorrectionScope::FacePriority,
        CorrectionScope::ClothingPriority,
        CorrectionScope::HandsPriority,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CorrectionScope::FullImage => "Full Image",
            CorrectionScope::FacePriority => "Face Priority",
            CorrectionScope::ClothingPriority => "Clothing Priority",
            CorrectionScope::HandsPriority => "Hands Priority",
        }
    }
}

impl fmt::Display for CorrectionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CorrectionScope {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CorrectionScope::ALL
            .into_iter()
            .find(|scope| scope.label() == s)
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

/// Validated parameters for one correction. Only produced by `settings::normalize`
/// and friends, so the numeric ranges always hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionSettings {
    pub mode: CorrectionMode,
    pub scope: CorrectionScope,
    pub angle_tag: AngleTag,
    /// Percentage in 1..=100.
    pub strength: u8,
    /// Percentage in 0..=100.
    pub line_preservation: u8,
    pub absolute_line_fidelity: bool,
}

impl Default for CorrectionSettings {
    fn default() -> Self {
        Self {
            mode: CorrectionMode::Proportion,
            scope: CorrectionScope::FullImage,
            angle_tag: AngleTag::ThreeQuarter,
            strength: 50,
            line_preservation: 85,
            absolute_line_fidelity: true,
        }
    }
}

/// Encoded image bytes, cheap to clone. Serialized as base64.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData(Arc<[u8]>);

impl ImageData {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Arc::from(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for ImageData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for ImageData {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Arc::from(bytes))
    }
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageData({} bytes)", self.0.len())
    }
}

impl Serialize for ImageData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for ImageData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map(ImageData::from)
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// Read the pixel size from the image header without a full decode.
    /// Fails for bytes that are not a supported image format.
    pub fn probe(bytes: &[u8]) -> crate::error::Result<Self> {
        let (width, height) = image::ImageReader::new(std::io::Cursor::new(bytes))
            .with_guessed_format()?
            .into_dimensions()?;
        Ok(Self { width, height })
    }
}

/// One reference asset inside a pack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceImage {
    pub id: String,
    pub pack_id: String,
    pub data: ImageData,
    /// Angle labels (see [`AngleTag::label`]) and free-form feature labels.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// SHA-256 of `data`, used to refuse duplicate imports into the same pack.
    #[serde(default)]
    pub sha256: Option<String>,
    /// Cached perceptual fingerprint; recomputed when absent.
    #[serde(default)]
    pub fingerprint: Option<Fingerprint>,
    /// Combined retrieval score. Set only by `retrieval::rank`, never persisted.
    #[serde(skip)]
    pub similarity: Option<f64>,
}

impl ReferenceImage {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// A named, curated collection of reference images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePack {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub images: Vec<ReferenceImage>,
    pub created_at: DateTime<Utc>,
}

/// Numbers reported by the provider for one correction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawMetrics {
    pub mask_coverage: f64,
    pub denoise_used: f64,
    pub diff_in_mask: f64,
    pub diff_outside_mask: f64,
}

/// Provider metrics interpreted against the settings that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionMetrics {
    pub mask_coverage: f64,
    pub denoise_used: f64,
    pub diff_in_mask: f64,
    pub diff_outside_mask: f64,
    /// Whether line fidelity was achieved, not whether it was requested.
    pub absolute_line_fidelity: bool,
}

/// One completed correction. Never modified after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    pub id: String,
    pub original: ImageData,
    pub result: ImageData,
    pub settings: CorrectionSettings,
    pub timestamp: DateTime<Utc>,
    pub metrics: CorrectionMetrics,
}

/// How the source/result pair is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Before,
    After,
    Overlay,
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewMode::Before => write!(f, "Before"),
            ViewMode::After => write!(f, "After"),
            ViewMode::Overlay => write!(f, "Overlay"),
        }
    }
}

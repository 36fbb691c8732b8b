use std::collections::{BTreeSet, HashSet};

use chrono::Utc;

use crate::domain::{Dimensions, ImageData, ReferenceImage, ReferencePack};
use crate::error::{Error, Result};
use crate::hasher::{self, perceptual};

pub const SEED_TURNAROUNDS_ID: &str = "seed-turnarounds";
pub const SEED_DETAILS_ID: &str = "seed-details";

/// Owns every reference pack and the set of packs enabled for retrieval.
#[derive(Debug, Clone)]
pub struct ReferenceCatalog {
    packs: Vec<ReferencePack>,
    enabled: BTreeSet<String>,
}

impl Default for ReferenceCatalog {
    fn default() -> Self {
        Self::seeded()
    }
}

impl ReferenceCatalog {
    /// The built-in catalog: both seed packs, all enabled.
    pub fn seeded() -> Self {
        Self::from_parts(seed_packs(), None)
    }

    /// Build a catalog from loaded records, repairing what a stale or
    /// hand-edited record may have broken:
    /// - a pack id seen twice keeps its first occurrence
    /// - images are re-homed to the pack that holds them
    /// - unknown ids are dropped from the selection
    /// - a missing selection, or one naming no loaded pack, enables every
    ///   pack; an explicitly empty selection stays empty
    pub fn from_parts(packs: Vec<ReferencePack>, selection: Option<BTreeSet<String>>) -> Self {
        let mut seen: HashSet<String> = HashSet::new();
        let mut repaired = Vec::with_capacity(packs.len());
        for mut pack in packs {
            if !seen.insert(pack.id.clone()) {
                tracing::warn!(pack_id = %pack.id, "dropping pack with duplicate id");
                continue;
            }
            for image in &mut pack.images {
                if image.pack_id != pack.id {
                    tracing::warn!(image_id = %image.id, pack_id = %pack.id, "re-homing reference image");
                    image.pack_id = pack.id.clone();
                }
                image.similarity = None;
            }
            repaired.push(pack);
        }

        let all: BTreeSet<String> = repaired.iter().map(|p| p.id.clone()).collect();
        let enabled = match selection {
            Some(ids) if ids.is_empty() => ids,
            Some(ids) => {
                let known: BTreeSet<String> = ids.into_iter().filter(|id| all.contains(id)).collect();
                if known.is_empty() {
                    tracing::warn!("stored pack selection matches no pack, enabling all packs");
                    all
                } else {
                    known
                }
            }
            None => all,
        };

        Self {
            packs: repaired,
            enabled,
        }
    }

    pub fn packs(&self) -> &[ReferencePack] {
        &self.packs
    }

    pub fn pack(&self, id: &str) -> Option<&ReferencePack> {
        self.packs.iter().find(|p| p.id == id)
    }

    pub fn enabled_ids(&self) -> &BTreeSet<String> {
        &self.enabled
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.enabled.contains(id)
    }

    /// Enabled packs, in catalog order.
    pub fn enabled_packs(&self) -> Vec<&ReferencePack> {
        self.packs
            .iter()
            .filter(|p| self.enabled.contains(&p.id))
            .collect()
    }

    /// Create an empty pack. New packs start enabled.
    pub fn create_pack(&mut self, name: &str, description: &str) -> Result<&ReferencePack> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::EmptyPackName);
        }
        let pack = ReferencePack {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.trim().to_string(),
            images: Vec::new(),
            created_at: Utc::now(),
        };
        tracing::info!(pack_id = %pack.id, name = %pack.name, "created reference pack");
        self.enabled.insert(pack.id.clone());
        self.packs.push(pack);
        Ok(&self.packs[self.packs.len() - 1])
    }

    /// Remove a pack with its images, and drop it from the enabled set.
    pub fn delete_pack(&mut self, id: &str) -> Result<ReferencePack> {
        let idx = self.pack_index(id)?;
        self.enabled.remove(id);
        let pack = self.packs.remove(idx);
        tracing::info!(pack_id = %pack.id, images = pack.images.len(), "deleted reference pack");
        Ok(pack)
    }

    /// Add an image to a pack. The bytes must be a readable image; the same
    /// bytes cannot be added to one pack twice.
    pub fn add_image(
        &mut self,
        pack_id: &str,
        data: ImageData,
        tags: BTreeSet<String>,
    ) -> Result<&ReferenceImage> {
        let idx = self.pack_index(pack_id)?;
        Dimensions::probe(&data)?;

        let sha256 = hasher::compute_sha256(&data);
        let pack = &mut self.packs[idx];
        let duplicate = pack.images.iter().find(|img| {
            img.sha256
                .clone()
                .unwrap_or_else(|| hasher::compute_sha256(&img.data))
                == sha256
        });
        if let Some(existing) = duplicate {
            return Err(Error::DuplicateReference {
                pack_id: pack.id.clone(),
                image_id: existing.id.clone(),
            });
        }

        let fingerprint = perceptual::compute_fingerprint(&data);
        if fingerprint.is_none() {
            tracing::debug!(pack_id, "reference image has no fingerprint, ranking on tags only");
        }

        let image = ReferenceImage {
            id: uuid::Uuid::new_v4().to_string(),
            pack_id: pack.id.clone(),
            data,
            tags: clean_tags(tags),
            sha256: Some(sha256),
            fingerprint,
            similarity: None,
        };
        tracing::info!(pack_id, image_id = %image.id, "added reference image");
        pack.images.push(image);
        Ok(&pack.images[pack.images.len() - 1])
    }

    pub fn remove_image(&mut self, pack_id: &str, image_id: &str) -> Result<ReferenceImage> {
        let idx = self.pack_index(pack_id)?;
        let pack = &mut self.packs[idx];
        let pos = pack
            .images
            .iter()
            .position(|img| img.id == image_id)
            .ok_or_else(|| Error::ImageNotFound(image_id.to_string()))?;
        Ok(pack.images.remove(pos))
    }

    pub fn set_image_tags(&mut self, pack_id: &str, image_id: &str, tags: BTreeSet<String>) -> Result<()> {
        let idx = self.pack_index(pack_id)?;
        let image = self.packs[idx]
            .images
            .iter_mut()
            .find(|img| img.id == image_id)
            .ok_or_else(|| Error::ImageNotFound(image_id.to_string()))?;
        image.tags = clean_tags(tags);
        Ok(())
    }

    /// Enable or disable a pack for retrieval. Returns whether anything changed.
    pub fn set_enabled(&mut self, pack_id: &str, enabled: bool) -> Result<bool> {
        self.pack_index(pack_id)?;
        let changed = if enabled {
            self.enabled.insert(pack_id.to_string())
        } else {
            self.enabled.remove(pack_id)
        };
        Ok(changed)
    }

    pub fn image_count(&self) -> usize {
        self.packs.iter().map(|p| p.images.len()).sum()
    }

    fn pack_index(&self, id: &str) -> Result<usize> {
        self.packs
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| Error::PackNotFound(id.to_string()))
    }
}

/// The two packs every fresh install starts with.
pub fn seed_packs() -> Vec<ReferencePack> {
    let now = Utc::now();
    vec![
        ReferencePack {
            id: SEED_TURNAROUNDS_ID.to_string(),
            name: "Character Turnarounds".to_string(),
            description: "Front, 3/4, profile and back views of the canonical design".to_string(),
            images: Vec::new(),
            created_at: now,
        },
        ReferencePack {
            id: SEED_DETAILS_ID.to_string(),
            name: "Hands & Details".to_string(),
            description: "Hands, faces and costume details drawn on model".to_string(),
            images: Vec::new(),
            created_at: now,
        },
    ]
}

fn clean_tags(tags: BTreeSet<String>) -> BTreeSet<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

pub mod signals;

use std::collections::HashSet;

use rayon::prelude::*;

use crate::domain::{AngleTag, ReferenceImage, ReferencePack};
use crate::hasher::perceptual::{compute_fingerprint, Fingerprint};

/// Number of references handed to the provider unless the caller asks otherwise.
pub const DEFAULT_RANK_LIMIT: usize = 8;

/// A candidate with its score, before truncation.
struct Scored<'a> {
    image: &'a ReferenceImage,
    score: f64,
}

/// Rank reference images by relevance to `source` and the requested angle.
///
/// Only images from `enabled_packs` are considered. The result is sorted by
/// combined score (descending), ties broken by image id (ascending), truncated
/// to `limit`, and each returned image carries its score in `similarity`.
/// Identical inputs always produce identical output.
pub fn rank(
    source: &[u8],
    enabled_packs: &[&ReferencePack],
    angle: AngleTag,
    limit: usize,
) -> Vec<ReferenceImage> {
    rank_fingerprinted(compute_fingerprint(source), enabled_packs, angle, limit)
}

/// Same as [`rank`], for callers that already hold the source fingerprint.
/// A missing fingerprint (undecodable source) contributes zero content similarity.
pub fn rank_fingerprinted(
    source: Option<Fingerprint>,
    enabled_packs: &[&ReferencePack],
    angle: AngleTag,
    limit: usize,
) -> Vec<ReferenceImage> {
    let candidates = collect_candidates(enabled_packs);
    if candidates.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut scored: Vec<Scored<'_>> = candidates
        .par_iter()
        .map(|image| Scored {
            image,
            score: score_candidate(source.as_ref(), image, angle),
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.image.id.cmp(&b.image.id))
    });
    scored.truncate(limit);

    tracing::debug!(
        angle = %angle,
        candidates = candidates.len(),
        returned = scored.len(),
        "ranked references"
    );

    scored
        .into_iter()
        .map(|s| {
            let mut image = s.image.clone();
            image.similarity = Some(s.score);
            image
        })
        .collect()
}

/// Union of images across the enabled packs. An image reachable twice
/// (same pack listed twice) is counted once.
fn collect_candidates<'a>(enabled_packs: &[&'a ReferencePack]) -> Vec<&'a ReferenceImage> {
    let mut seen: HashSet<&str> = HashSet::new();
    enabled_packs
        .iter()
        .flat_map(|pack| pack.images.iter())
        .filter(|image| seen.insert(image.id.as_str()))
        .collect()
}

fn score_candidate(source: Option<&Fingerprint>, image: &ReferenceImage, angle: AngleTag) -> f64 {
    let tag_score = signals::tag_match(image, angle);
    let content = match (source, candidate_fingerprint(image)) {
        (Some(a), Some(b)) => a.similarity(&b),
        _ => 0.0,
    };
    signals::combine(tag_score, content)
}

fn candidate_fingerprint(image: &ReferenceImage) -> Option<Fingerprint> {
    image.fingerprint.or_else(|| {
        let fp = compute_fingerprint(&image.data);
        if fp.is_none() {
            tracing::debug!(image_id = %image.id, "reference image could not be fingerprinted");
        }
        fp
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::io::Cursor;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::domain::ImageData;

    fn png(img: &image::RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn gradient_png() -> Vec<u8> {
        png(&image::RgbImage::from_fn(32, 32, |x, _| {
            image::Rgb([(x * 8) as u8, 0, 0])
        }))
    }

    fn reversed_png() -> Vec<u8> {
        png(&image::RgbImage::from_fn(32, 32, |x, _| {
            image::Rgb([(255 - x * 8) as u8, 0, 0])
        }))
    }

    fn image(id: &str, pack_id: &str, data: Vec<u8>, tags: &[&str]) -> ReferenceImage {
        ReferenceImage {
            id: id.into(),
            pack_id: pack_id.into(),
            data: ImageData::new(data),
            tags: tags.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
            sha256: None,
            fingerprint: None,
            similarity: None,
        }
    }

    fn pack(id: &str, images: Vec<ReferenceImage>) -> ReferencePack {
        ReferencePack {
            id: id.into(),
            name: id.to_uppercase(),
            description: String::new(),
            images,
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_no_enabled_packs_yields_empty() {
        for angle in AngleTag::ALL {
            assert!(rank(&gradient_png(), &[], angle, DEFAULT_RANK_LIMIT).is_empty());
        }
    }

    #[test]
    fn test_enabled_pack_without_images_yields_empty() {
        let empty = pack("a", Vec::new());
        assert!(rank(&gradient_png(), &[&empty], AngleTag::Front, 8).is_empty());
    }

    #[test]
    fn test_exact_tag_outranks_adjacent_and_unrelated() {
        let data = gradient_png();
        let p = pack(
            "a",
            vec![
                image("1", "a", data.clone(), &["Upshot"]),
                image("2", "a", data.clone(), &["3/4 View"]),
                image("3", "a", data.clone(), &["Profile"]),
            ],
        );
        let ranked = rank(&data, &[&p], AngleTag::Profile, 8);
        let ids: Vec<&str> = ranked.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2", "1"]);
        // Same content everywhere: content similarity is 1.0 for all.
        assert!((ranked[0].similarity.unwrap() - 1.0).abs() < 1e-12);
        assert!((ranked[1].similarity.unwrap() - 0.7).abs() < 1e-12);
        assert!((ranked[2].similarity.unwrap() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_ties_broken_by_ascending_id() {
        let data = gradient_png();
        let p = pack(
            "a",
            vec![
                image("c", "a", data.clone(), &["Front"]),
                image("a", "a", data.clone(), &["Front"]),
                image("b", "a", data.clone(), &["Front"]),
            ],
        );
        let ranked = rank(&data, &[&p], AngleTag::Front, 8);
        let ids: Vec<&str> = ranked.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_content_similarity_breaks_tag_ties() {
        let source = gradient_png();
        let p = pack(
            "a",
            vec![
                image("a-reversed", "a", reversed_png(), &["Front"]),
                image("z-gradient", "a", gradient_png(), &["Front"]),
            ],
        );
        let ranked = rank(&source, &[&p], AngleTag::Front, 8);
        assert_eq!(ranked[0].id, "z-gradient");
        assert!(ranked[0].similarity > ranked[1].similarity);
    }

    #[test]
    fn test_disabled_packs_are_excluded() {
        let data = gradient_png();
        let enabled = pack("a", vec![image("1", "a", data.clone(), &["Generic"])]);
        let _disabled = pack("b", vec![image("2", "b", data.clone(), &["Front"])]);
        let ranked = rank(&data, &[&enabled], AngleTag::Front, 8);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].pack_id, "a");
    }

    #[test]
    fn test_truncates_to_limit() {
        let data = gradient_png();
        let images = (0..12)
            .map(|i| image(&format!("img-{i:02}"), "a", data.clone(), &["Front"]))
            .collect();
        let p = pack("a", images);
        assert_eq!(rank(&data, &[&p], AngleTag::Front, DEFAULT_RANK_LIMIT).len(), 8);
        assert_eq!(rank(&data, &[&p], AngleTag::Front, 3).len(), 3);
        assert!(rank(&data, &[&p], AngleTag::Front, 0).is_empty());
    }

    #[test]
    fn test_rank_is_deterministic() {
        let source = gradient_png();
        let a = pack(
            "a",
            vec![
                image("1", "a", reversed_png(), &["Front"]),
                image("2", "a", gradient_png(), &["Generic"]),
            ],
        );
        let b = pack("b", vec![image("3", "b", reversed_png(), &["Upshot"])]);
        let first = rank(&source, &[&a, &b], AngleTag::Front, 8);
        let second = rank(&source, &[&a, &b], AngleTag::Front, 8);
        assert_eq!(first, second);
        let bits = |v: &[ReferenceImage]| -> Vec<u64> {
            v.iter().map(|r| r.similarity.unwrap().to_bits()).collect()
        };
        assert_eq!(bits(&first), bits(&second));
    }

    #[test]
    fn test_undecodable_source_ranks_on_tags_only() {
        let p = pack(
            "a",
            vec![
                image("1", "a", gradient_png(), &["Downshot"]),
                image("2", "a", gradient_png(), &["Upshot"]),
            ],
        );
        let ranked = rank(b"not an image", &[&p], AngleTag::Upshot, 8);
        assert_eq!(ranked[0].id, "2");
        assert!((ranked[0].similarity.unwrap() - 0.6).abs() < 1e-12);
        assert!((ranked[1].similarity.unwrap() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_same_pack_listed_twice_counts_once() {
        let data = gradient_png();
        let p = pack("a", vec![image("1", "a", data.clone(), &["Front"])]);
        assert_eq!(rank(&data, &[&p, &p], AngleTag::Front, 8).len(), 1);
    }

    #[test]
    fn test_cached_fingerprint_is_used() {
        let source = compute_fingerprint(&gradient_png()).unwrap();
        let mut img = image("1", "a", b"garbage".to_vec(), &[]);
        img.fingerprint = Some(source);
        let p = pack("a", vec![img]);
        let ranked = rank_fingerprinted(Some(source), &[&p], AngleTag::Front, 8);
        assert!((ranked[0].similarity.unwrap() - 0.4).abs() < 1e-12);
    }
}

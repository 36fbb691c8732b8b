use crate::domain::{AngleTag, ReferenceImage};

/// Weight of the tag-match signal in the combined score.
pub const TAG_WEIGHT: f64 = 0.6;
/// Weight of the content-similarity signal in the combined score.
pub const CONTENT_WEIGHT: f64 = 0.4;

pub const EXACT_TAG_SCORE: f64 = 1.0;
pub const ADJACENT_TAG_SCORE: f64 = 0.5;

/// Score how well an image's tags match the requested angle.
/// Exact match wins over adjacency; anything else scores zero.
pub fn tag_match(image: &ReferenceImage, angle: AngleTag) -> f64 {
    if image.has_tag(angle.label()) {
        EXACT_TAG_SCORE
    } else if image.has_tag(angle.adjacent().label()) {
        ADJACENT_TAG_SCORE
    } else {
        0.0
    }
}

/// Combine both signals into the final retrieval score.
pub fn combine(tag_score: f64, content_similarity: f64) -> f64 {
    TAG_WEIGHT * tag_score + CONTENT_WEIGHT * content_similarity.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::domain::ImageData;

    fn tagged(tags: &[&str]) -> ReferenceImage {
        ReferenceImage {
            id: "img".into(),
            pack_id: "pack".into(),
            data: ImageData::new(Vec::new()),
            tags: tags.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
            sha256: None,
            fingerprint: None,
            similarity: None,
        }
    }

    #[test]
    fn test_exact_match_scores_one() {
        for angle in AngleTag::ALL {
            assert_eq!(tag_match(&tagged(&[angle.label()]), angle), 1.0);
        }
    }

    #[test]
    fn test_adjacent_pairs_score_half() {
        let pairs = [
            (AngleTag::Front, "Generic"),
            (AngleTag::Generic, "Front"),
            (AngleTag::Upshot, "Downshot"),
            (AngleTag::Downshot, "Upshot"),
            (AngleTag::Profile, "3/4 View"),
            (AngleTag::ThreeQuarter, "Profile"),
        ];
        for (angle, tag) in pairs {
            assert_eq!(tag_match(&tagged(&[tag]), angle), 0.5, "{angle} vs {tag}");
        }
    }

    #[test]
    fn test_exact_beats_adjacent() {
        let image = tagged(&["Profile", "3/4 View"]);
        assert_eq!(tag_match(&image, AngleTag::Profile), 1.0);
    }

    #[test]
    fn test_unrelated_tags_score_zero() {
        assert_eq!(tag_match(&tagged(&["Upshot", "hands"]), AngleTag::Front), 0.0);
        assert_eq!(tag_match(&tagged(&[]), AngleTag::Generic), 0.0);
        // Labels are matched exactly
        assert_eq!(tag_match(&tagged(&["profile"]), AngleTag::Profile), 0.0);
    }

    #[test]
    fn test_combine_weights() {
        assert!((combine(1.0, 1.0) - 1.0).abs() < 1e-12);
        assert!((combine(1.0, 0.0) - 0.6).abs() < 1e-12);
        assert!((combine(0.0, 1.0) - 0.4).abs() < 1e-12);
        assert!((combine(0.5, 0.5) - 0.5).abs() < 1e-12);
    }
}

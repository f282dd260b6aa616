//! Top-k lookalike ranking and reference photo resolution.

use crate::types::{GalleryItem, RankedMatch};
use image::{Rgb, RgbImage};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Number of lookalikes returned per request.
pub const TOP_K: usize = 5;

pub const PLACEHOLDER_SIZE: u32 = 224;
pub const PLACEHOLDER_GRAY: Rgb<u8> = Rgb([128, 128, 128]);
pub const MISSING_SUFFIX: &str = " (Image Missing)";

const REFERENCE_EXTENSION: &str = "jpg";

#[derive(Error, Debug)]
pub enum RankError {
    #[error("class index {index} outside vocabulary of {len}")]
    LabelOutOfRange { index: usize, len: usize },
    #[error("cannot load reference image {path}: {source}")]
    Asset {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

/// Maps class labels to reference photos under a gallery root.
///
/// Photos are named exactly `<label>.jpg`; lookups are case sensitive.
#[derive(Debug, Clone)]
pub struct AssetIndex {
    root: PathBuf,
}

impl AssetIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Expected location of the reference photo for `label`.
    pub fn path_for(&self, label: &str) -> PathBuf {
        self.root.join(format!("{label}.{REFERENCE_EXTENSION}"))
    }

    /// Reference photo for `label`, if one exists on disk.
    pub fn resolve(&self, label: &str) -> Option<PathBuf> {
        let path = self.path_for(label);
        path.is_file().then_some(path)
    }
}

/// Indices of the `k` highest scores, best first.
///
/// The sort is stable, so equal scores keep their class order. NaN scores
/// rank below every real score.
pub fn top_k(scores: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut indexed: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| descending(a.1, b.1));
    indexed.truncate(k);
    indexed
}

fn descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Rank classes by probability and attach their reference photos.
pub fn rank(
    probabilities: &[f32],
    vocab: &[String],
    assets: &AssetIndex,
    k: usize,
) -> Result<Vec<RankedMatch>, RankError> {
    top_k(probabilities, k)
        .into_iter()
        .map(|(index, score)| {
            let label = vocab.get(index).ok_or(RankError::LabelOutOfRange {
                index,
                len: vocab.len(),
            })?;
            Ok(RankedMatch {
                label: label.clone(),
                score,
                image_path: assets.resolve(label),
            })
        })
        .collect()
}

/// Caption shown under a match, e.g. `"Brad_Pitt (70.0%)"`.
pub fn caption(label: &str, score: f32) -> String {
    format!("{label} ({:.1}%)", f64::from(score) * 100.0)
}

/// Uniform gray stand-in for a missing reference photo.
pub fn placeholder() -> RgbImage {
    RgbImage::from_pixel(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, PLACEHOLDER_GRAY)
}

/// Load each match's photo, substituting the placeholder when it is missing.
///
/// Output order and length always equal the input's.
pub fn into_gallery(matches: Vec<RankedMatch>) -> Result<Vec<GalleryItem>, RankError> {
    matches
        .into_iter()
        .map(|m| {
            let caption = caption(&m.label, m.score);
            match m.image_path {
                Some(path) => {
                    let image = image::open(&path).map_err(|source| RankError::Asset {
                        path: path.display().to_string(),
                        source,
                    })?;
                    Ok(GalleryItem {
                        image: image.into_rgb8(),
                        caption,
                    })
                }
                None => {
                    tracing::debug!(label = %m.label, "reference image missing");
                    Ok(GalleryItem {
                        image: placeholder(),
                        caption: format!("{caption}{MISSING_SUFFIX}"),
                    })
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn write_jpeg(dir: &Path, label: &str, color: [u8; 3]) {
        RgbImage::from_pixel(16, 16, Rgb(color))
            .save(dir.join(format!("{label}.jpg")))
            .unwrap();
    }

    #[test]
    fn test_top_k_stable_ties() {
        let ranked = top_k(&[0.1, 0.7, 0.05, 0.1, 0.05], 5);
        let order: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![1, 0, 3, 2, 4]);
    }

    #[test]
    fn test_top_k_truncates_and_never_pads() {
        assert_eq!(top_k(&[0.2, 0.3, 0.5], 5).len(), 3);
        let ranked = top_k(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7], 5);
        assert_eq!(ranked.len(), 5);
        assert_eq!(ranked[0], (6, 0.7));
        assert_eq!(ranked[4], (2, 0.3));
        assert!(top_k(&[], 5).is_empty());
    }

    #[test]
    fn test_top_k_nan_last() {
        let ranked = top_k(&[f32::NAN, 0.2, 0.8], 3);
        let order: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![2, 1, 0]);
    }

    #[test]
    fn test_rank_orders_labels() {
        let dir = tempfile::tempdir().unwrap();
        let assets = AssetIndex::new(dir.path());
        let matches = rank(
            &[0.1, 0.7, 0.05, 0.1, 0.05],
            &vocab(&["A", "B", "C", "D", "E"]),
            &assets,
            TOP_K,
        )
        .unwrap();
        let labels: Vec<&str> = matches.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["B", "A", "D", "C", "E"]);
        assert!(matches.iter().all(|m| m.image_path.is_none()));
    }

    #[test]
    fn test_rank_label_out_of_range() {
        let assets = AssetIndex::new(".");
        let err = rank(&[0.4, 0.6], &vocab(&["only"]), &assets, TOP_K).unwrap_err();
        assert!(matches!(err, RankError::LabelOutOfRange { index: 1, len: 1 }));
    }

    #[test]
    fn test_resolve_is_case_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        write_jpeg(dir.path(), "Brad_Pitt", [10, 10, 10]);
        let assets = AssetIndex::new(dir.path());
        assert_eq!(
            assets.resolve("Brad_Pitt"),
            Some(dir.path().join("Brad_Pitt.jpg"))
        );
        assert_eq!(assets.resolve("brad_pitt"), None);
    }

    #[test]
    fn test_resolve_ignores_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Cher.jpg")).unwrap();
        assert_eq!(AssetIndex::new(dir.path()).resolve("Cher"), None);
    }

    #[test]
    fn test_caption_format() {
        assert_eq!(caption("Brad_Pitt", 0.7), "Brad_Pitt (70.0%)");
        assert_eq!(caption("Cher", 0.12345), "Cher (12.3%)");
    }

    #[test]
    fn test_gallery_substitutes_missing_in_place() {
        let dir = tempfile::tempdir().unwrap();
        write_jpeg(dir.path(), "A", [200, 30, 30]);
        write_jpeg(dir.path(), "D", [30, 30, 200]);
        let assets = AssetIndex::new(dir.path());

        let matches = rank(
            &[0.1, 0.7, 0.05, 0.1, 0.05],
            &vocab(&["A", "B", "C", "D", "E"]),
            &assets,
            TOP_K,
        )
        .unwrap();
        let gallery = into_gallery(matches).unwrap();

        assert_eq!(gallery.len(), 5);
        assert_eq!(gallery[0].caption, "B (70.0%) (Image Missing)");
        assert_eq!(gallery[0].image.dimensions(), (224, 224));
        assert!(gallery[0].image.pixels().all(|p| *p == PLACEHOLDER_GRAY));

        assert_eq!(gallery[1].caption, "A (10.0%)");
        assert_eq!(gallery[1].image.dimensions(), (16, 16));
        assert_eq!(gallery[2].caption, "D (10.0%)");
        assert!(gallery[3].caption.ends_with(MISSING_SUFFIX));
        assert!(gallery[4].caption.starts_with("E (5.0%)"));
    }

    #[test]
    fn test_gallery_unreadable_asset_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("A.jpg"), b"not a jpeg").unwrap();
        let assets = AssetIndex::new(dir.path());
        let matches = rank(&[1.0], &vocab(&["A"]), &assets, TOP_K).unwrap();
        assert!(matches!(
            into_gallery(matches).unwrap_err(),
            RankError::Asset { .. }
        ));
    }
}

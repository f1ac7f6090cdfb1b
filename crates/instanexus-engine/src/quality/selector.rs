use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, warn};

use super::grid::split_grid;
use super::metrics::{score_bytes, score_image};
use crate::remote::AssetFetcher;

/// One scored grid cell.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub index: usize,
    pub image: DynamicImage,
    pub score: f64,
}

/// Winning index plus every candidate's score, in candidate order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub index: usize,
    pub score: f64,
    pub scores: Vec<f64>,
}

/// Index and value of the first maximum. Empty input yields `(0, 0.0)`.
pub fn best_index(scores: &[f64]) -> (usize, f64) {
    let mut best = (0, 0.0);
    for (index, &score) in scores.iter().enumerate() {
        if index == 0 || score > best.1 {
            best = (index, score);
        }
    }
    best
}

/// Splits `grid` into four cells, scores each and picks the first maximum.
pub fn select_best(grid: &DynamicImage) -> Selection {
    let candidates: Vec<Candidate> = split_grid(grid)
        .into_iter()
        .enumerate()
        .map(|(index, image)| {
            let score = score_image(&image);
            Candidate {
                index,
                image,
                score,
            }
        })
        .collect();
    let scores: Vec<f64> = candidates.iter().map(|candidate| candidate.score).collect();
    let (index, score) = best_index(&scores);
    debug!(index, score, ?scores, "selected grid cell");
    Selection {
        index,
        score,
        scores,
    }
}

/// Decodes an encoded grid and selects from it. An undecodable grid selects
/// index 0 with every score at 0.0.
pub fn select_best_bytes(bytes: &[u8]) -> Selection {
    match image::load_from_memory(bytes) {
        Ok(grid) => select_best(&grid),
        Err(err) => {
            warn!(error = %err, "grid decode failed, defaulting to first cell");
            Selection {
                index: 0,
                score: 0.0,
                scores: vec![0.0; super::GRID_CELLS],
            }
        }
    }
}

/// Downloads and scores independently hosted candidates. A download failure
/// counts as 0.0 for that candidate.
pub async fn select_best_from_urls(fetcher: &dyn AssetFetcher, urls: &[String]) -> (usize, f64) {
    let mut scores = Vec::with_capacity(urls.len());
    for url in urls {
        let score = match fetcher.fetch(url).await {
            Ok(bytes) => tokio::task::spawn_blocking(move || score_bytes(&bytes))
                .await
                .unwrap_or(0.0),
            Err(err) => {
                warn!(url = %url, error = %err, "candidate download failed");
                0.0
            }
        };
        scores.push(score);
    }
    best_index(&scores)
}

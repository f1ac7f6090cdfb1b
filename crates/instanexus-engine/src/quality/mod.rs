//! Image quality scoring and best-cell selection for 2x2 preview grids.

mod grid;
mod metrics;
mod selector;

pub use grid::{split_grid, GRID_CELLS};
pub use metrics::{
    score_bytes, score_image, NormalizedMetrics, QualityMetrics, CONTRAST_WEIGHT, DETAIL_WEIGHT,
    NOISE_WEIGHT, SHARPNESS_WEIGHT,
};
pub use selector::{
    best_index, select_best, select_best_bytes, select_best_from_urls, Candidate, Selection,
};

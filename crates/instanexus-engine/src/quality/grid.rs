use image::DynamicImage;

pub const GRID_CELLS: usize = 4;

/// Splits a 2x2 preview grid into its four cells, row-major:
/// top-left, top-right, bottom-left, bottom-right.
///
/// Odd dimensions drop the last row or column so every cell has the same size.
pub fn split_grid(grid: &DynamicImage) -> [DynamicImage; GRID_CELLS] {
    let cell_width = grid.width() / 2;
    let cell_height = grid.height() / 2;
    [(0, 0), (1, 0), (0, 1), (1, 1)].map(|(column, row)| {
        grid.crop_imm(
            column * cell_width,
            row * cell_height,
            cell_width,
            cell_height,
        )
    })
}

//! Ecualización adaptativa de histograma limitada por contraste (CLAHE)
//! sobre la luminancia. La crominancia se conserva tal cual.

use image::Rgb;

use crate::domain::frame::PixelGrid;
use crate::domain::model::Preprocess;

pub const CLIP_LIMIT: f32 = 2.0;
pub const TILE_GRID: u32 = 8;

const BINS: usize = 256;

impl Preprocess {
    pub fn apply(self, grid: &PixelGrid) -> Option<PixelGrid> {
        match self {
            Preprocess::None => None,
            Preprocess::Clahe => Some(enhance(grid)),
        }
    }
}

/// CLAHE con los parámetros fijos (`CLIP_LIMIT`, rejilla `TILE_GRID`x`TILE_GRID`).
pub fn enhance(grid: &PixelGrid) -> PixelGrid {
    let (w, h) = grid.dimensions();
    if w == 0 || h == 0 {
        return grid.clone();
    }

    // Separación en luminancia + crominancia (YCbCr BT.601, rango completo)
    let mut luma = Vec::with_capacity((w * h) as usize);
    let mut chroma = Vec::with_capacity((w * h) as usize);
    for p in grid.pixels() {
        let (r, g, b) = (p[0] as f32, p[1] as f32, p[2] as f32);
        let y = 0.299 * r + 0.587 * g + 0.114 * b;
        let cb = -0.168736 * r - 0.331264 * g + 0.5 * b;
        let cr = 0.5 * r - 0.418688 * g - 0.081312 * b;
        luma.push(y.round().clamp(0.0, 255.0) as u8);
        chroma.push((cb, cr));
    }

    let equalized = clahe_channel(&luma, w as usize, h as usize, CLIP_LIMIT, TILE_GRID as usize);

    let mut out = PixelGrid::new(w, h);
    for (i, pixel) in out.pixels_mut().enumerate() {
        let y = equalized[i] as f32;
        let (cb, cr) = chroma[i];
        let r = (y + 1.402 * cr).round().clamp(0.0, 255.0) as u8;
        let g = (y - 0.344136 * cb - 0.714136 * cr).round().clamp(0.0, 255.0) as u8;
        let b = (y + 1.772 * cb).round().clamp(0.0, 255.0) as u8;
        *pixel = Rgb([r, g, b]);
    }
    out
}

/// Disposición de la rejilla en un eje: tamaño de tesela y número de teselas no vacías.
fn grid_axis(len: usize, tiles: usize) -> (usize, usize) {
    let tiles = tiles.clamp(1, len);
    let size = len.div_ceil(tiles);
    (size, len.div_ceil(size))
}

fn clahe_channel(src: &[u8], w: usize, h: usize, clip: f32, tiles: usize) -> Vec<u8> {
    let (tile_w, grid_x) = grid_axis(w, tiles);
    let (tile_h, grid_y) = grid_axis(h, tiles);

    let mut luts = vec![[0u8; BINS]; grid_x * grid_y];
    for ty in 0..grid_y {
        for tx in 0..grid_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(w);
            let y1 = (y0 + tile_h).min(h);

            let mut hist = [0u32; BINS];
            for y in y0..y1 {
                for &v in &src[y * w + x0..y * w + x1] {
                    hist[v as usize] += 1;
                }
            }
            let area = ((x1 - x0) * (y1 - y0)) as u32;
            luts[ty * grid_x + tx] = tile_lut(&mut hist, area, clip);
        }
    }

    let mut out = vec![0u8; w * h];
    for y in 0..h {
        let (ty1, ty2, fy) = neighbours(y, tile_h, grid_y);
        for x in 0..w {
            let (tx1, tx2, fx) = neighbours(x, tile_w, grid_x);
            let v = src[y * w + x] as usize;
            let top = luts[ty1 * grid_x + tx1][v] as f32 * (1.0 - fx) + luts[ty1 * grid_x + tx2][v] as f32 * fx;
            let bottom = luts[ty2 * grid_x + tx1][v] as f32 * (1.0 - fx) + luts[ty2 * grid_x + tx2][v] as f32 * fx;
            out[y * w + x] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Teselas vecinas de una coordenada y peso de interpolación hacia la segunda.
fn neighbours(pos: usize, tile: usize, grid: usize) -> (usize, usize, f32) {
    let t = (pos as f32 + 0.5) / tile as f32 - 0.5;
    if t <= 0.0 {
        return (0, 0, 0.0);
    }
    let lo = t.floor() as usize;
    if lo + 1 >= grid {
        return (grid - 1, grid - 1, 0.0);
    }
    (lo, lo + 1, t - lo as f32)
}

fn tile_lut(hist: &mut [u32; BINS], area: u32, clip: f32) -> [u8; BINS] {
    let mut lut = [0u8; BINS];
    if area == 0 {
        return lut;
    }

    let limit = ((clip * area as f32) / BINS as f32).max(1.0) as u32;
    let mut clipped = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            clipped += *bin - limit;
            *bin = limit;
        }
    }

    // Reparto del exceso: a partes iguales y el resto con paso uniforme
    let batch = clipped / BINS as u32;
    let residual = (clipped % BINS as u32) as usize;
    for bin in hist.iter_mut() {
        *bin += batch;
    }
    if residual > 0 {
        let step = (BINS / residual).max(1);
        for bin in hist.iter_mut().step_by(step).take(residual) {
            *bin += 1;
        }
    }

    let scale = 255.0 / area as f32;
    let mut sum = 0u32;
    for (i, &count) in hist.iter().enumerate() {
        sum += count;
        lut[i] = (sum as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::application::ports::RawBox;
use crate::domain::frame::PixelGrid;

const PALETTE: [[u8; 3]; 12] = [
    [255, 0, 0],
    [0, 255, 0],
    [0, 0, 255],
    [255, 255, 0],
    [255, 0, 255],
    [0, 255, 255],
    [255, 128, 0],
    [255, 0, 128],
    [128, 255, 0],
    [0, 128, 255],
    [255, 255, 255],
    [128, 0, 255],
];

const THICKNESS: i32 = 2;

pub fn color_for(class_id: usize) -> Rgb<u8> {
    Rgb(PALETTE[class_id % PALETTE.len()])
}

/// Copia de la imagen con un rectángulo por detección.
pub fn draw_boxes(grid: &PixelGrid, boxes: &[RawBox]) -> PixelGrid {
    let mut img = grid.clone();
    for b in boxes {
        let [x1, y1, x2, y2] = b.xyxy;
        let color = color_for(b.class_id);
        for t in 0..THICKNESS {
            let w = (x2 - x1) as i32 - 2 * t;
            let h = (y2 - y1) as i32 - 2 * t;
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(x1 as i32 + t, y1 as i32 + t).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(&mut img, rect, color);
        }
    }
    img
}

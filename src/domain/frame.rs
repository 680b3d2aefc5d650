use image::RgbImage;

/// Buffer de píxeles en memoria: 3 canales de 8 bits, orden RGB.
pub type PixelGrid = RgbImage;

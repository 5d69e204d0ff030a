//! Pixel-level operators on `RgbImage` used by the pipeline stages and by
//! RandAugment. Geometry ops take an explicit fill color for uncovered pixels.
use image::{imageops, Rgb, RgbImage};

/// Crop `width` x `height` starting at (`left`, `top`).
pub fn crop(img: &RgbImage, left: u32, top: u32, width: u32, height: u32) -> RgbImage {
    imageops::crop_imm(img, left, top, width, height).to_image()
}

/// Pad every side by `padding` pixels.
pub fn pad(img: &RgbImage, padding: u32, fill: Rgb<u8>) -> RgbImage {
    let mut out = RgbImage::from_pixel(
        img.width() + 2 * padding,
        img.height() + 2 * padding,
        fill,
    );
    imageops::replace(&mut out, img, padding as i64, padding as i64);
    out
}

/// Resize so that the shorter side equals `size`, keeping the aspect ratio.
pub fn resize_shorter(img: &RgbImage, size: u32, filter: imageops::FilterType) -> RgbImage {
    let (w, h) = img.dimensions();
    let (new_w, new_h) = if w <= h {
        (size, (size as u64 * h as u64 / w.max(1) as u64) as u32)
    } else {
        ((size as u64 * w as u64 / h.max(1) as u64) as u32, size)
    };
    if (new_w, new_h) == (w, h) {
        return img.clone();
    }
    imageops::resize(img, new_w, new_h, filter)
}

/// Crop a centered `size` x `size` window, zero-padding first when the
/// image is smaller than the window.
pub fn center_crop(img: &RgbImage, size: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    let padded;
    let img = if w < size || h < size {
        let (pw, ph) = (w.max(size), h.max(size));
        let mut canvas = RgbImage::new(pw, ph);
        imageops::replace(&mut canvas, img, ((pw - w) / 2) as i64, ((ph - h) / 2) as i64);
        padded = canvas;
        &padded
    } else {
        img
    };
    let (w, h) = img.dimensions();
    // Half-pixel offsets round to even.
    let top = ((h - size) as f64 / 2.0).round_ties_even() as u32;
    let left = ((w - size) as f64 / 2.0).round_ties_even() as u32;
    crop(img, left, top, size, size)
}

pub fn luma(p: &Rgb<u8>) -> f32 {
    0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32
}

/// `degenerate + factor * (img - degenerate)`, clamped to the u8 range.
pub fn blend(degenerate: &RgbImage, img: &RgbImage, factor: f32) -> RgbImage {
    let mut out = img.clone();
    for (o, (d, s)) in out.pixels_mut().zip(degenerate.pixels().zip(img.pixels())) {
        for c in 0..3 {
            let v = d[c] as f32 + factor * (s[c] as f32 - d[c] as f32);
            o[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

pub fn adjust_brightness(img: &RgbImage, factor: f32) -> RgbImage {
    let black = RgbImage::new(img.width(), img.height());
    blend(&black, img, factor)
}

pub fn adjust_saturation(img: &RgbImage, factor: f32) -> RgbImage {
    let mut gray = img.clone();
    for p in gray.pixels_mut() {
        let l = luma(p).round().clamp(0.0, 255.0) as u8;
        *p = Rgb([l, l, l]);
    }
    blend(&gray, img, factor)
}

pub fn adjust_contrast(img: &RgbImage, factor: f32) -> RgbImage {
    let n = (img.width() as f64 * img.height() as f64).max(1.0);
    let mean = img.pixels().map(|p| luma(p).round() as f64).sum::<f64>() / n;
    let m = (mean + 0.5).clamp(0.0, 255.0) as u8;
    let degenerate = RgbImage::from_pixel(img.width(), img.height(), Rgb([m, m, m]));
    blend(&degenerate, img, factor)
}

/// Sharpness relative to a 3x3 smoothed copy; border pixels stay untouched.
pub fn adjust_sharpness(img: &RgbImage, factor: f32) -> RgbImage {
    let (w, h) = img.dimensions();
    let mut smooth: RgbImage =
        imageops::filter3x3(img, &[1.0, 1.0, 1.0, 1.0, 5.0, 1.0, 1.0, 1.0, 1.0]);
    for y in 0..h {
        for x in 0..w {
            if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
                smooth.put_pixel(x, y, *img.get_pixel(x, y));
            }
        }
    }
    blend(&smooth, img, factor)
}

/// Stretch each channel to the full 0..=255 range.
pub fn autocontrast(img: &RgbImage) -> RgbImage {
    let mut out = img.clone();
    for c in 0..3 {
        let (lo, hi) = img
            .pixels()
            .fold((255u8, 0u8), |(lo, hi), p| (lo.min(p[c]), hi.max(p[c])));
        if hi <= lo {
            continue;
        }
        let scale = 255.0 / (hi - lo) as f32;
        for p in out.pixels_mut() {
            p[c] = ((p[c] - lo) as f32 * scale).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Per-channel histogram equalization.
pub fn equalize(img: &RgbImage) -> RgbImage {
    let mut out = img.clone();
    for c in 0..3 {
        let mut hist = [0usize; 256];
        for p in img.pixels() {
            hist[p[c] as usize] += 1;
        }
        let last = hist.iter().rev().find(|&&v| v > 0).copied().unwrap_or(0);
        let step = (hist.iter().sum::<usize>() - last) / 255;
        if step == 0 {
            continue;
        }
        let mut lut = [0u8; 256];
        let mut n = step / 2;
        for (i, entry) in lut.iter_mut().enumerate() {
            *entry = (n / step).min(255) as u8;
            n += hist[i];
        }
        for p in out.pixels_mut() {
            p[c] = lut[p[c] as usize];
        }
    }
    out
}

pub fn invert(img: &RgbImage) -> RgbImage {
    let mut out = img.clone();
    imageops::invert(&mut out);
    out
}

/// Keep the `bits` most significant bits of every channel.
pub fn posterize(img: &RgbImage, bits: u8) -> RgbImage {
    if bits >= 8 {
        return img.clone();
    }
    let mask = !((1u16 << (8 - bits)) - 1) as u8;
    let mut out = img.clone();
    for p in out.pixels_mut() {
        for c in 0..3 {
            p[c] &= mask;
        }
    }
    out
}

/// Invert every channel value at or above `threshold`.
pub fn solarize(img: &RgbImage, threshold: u16) -> RgbImage {
    let mut out = img.clone();
    for p in out.pixels_mut() {
        for c in 0..3 {
            if p[c] as u16 >= threshold {
                p[c] = 255 - p[c];
            }
        }
    }
    out
}

/// Add `add` to every channel value below `threshold`.
pub fn solarize_add(img: &RgbImage, add: u8, threshold: u8) -> RgbImage {
    let mut out = img.clone();
    for p in out.pixels_mut() {
        for c in 0..3 {
            if p[c] < threshold {
                p[c] = p[c].saturating_add(add);
            }
        }
    }
    out
}

/// Inverse-mapped affine warp: output pixel (x, y) samples the input at
/// `(a*x + b*y + c, d*x + e*y + f)`, nearest neighbour.
pub fn affine(img: &RgbImage, matrix: [f64; 6], fill: Rgb<u8>) -> RgbImage {
    let [a, b, c, d, e, f] = matrix;
    let (w, h) = img.dimensions();
    RgbImage::from_fn(w, h, |x, y| {
        let (xo, yo) = (x as f64 + 0.5, y as f64 + 0.5);
        let xi = (a * xo + b * yo + c).floor();
        let yi = (d * xo + e * yo + f).floor();
        if xi < 0.0 || yi < 0.0 || xi >= w as f64 || yi >= h as f64 {
            fill
        } else {
            *img.get_pixel(xi as u32, yi as u32)
        }
    })
}

/// Counter-clockwise rotation about the image center.
pub fn rotate(img: &RgbImage, degrees: f64, fill: Rgb<u8>) -> RgbImage {
    let angle = -degrees.to_radians();
    let (cx, cy) = (img.width() as f64 / 2.0, img.height() as f64 / 2.0);
    let (a, b, d, e) = (angle.cos(), angle.sin(), -angle.sin(), angle.cos());
    let c = a * -cx + b * -cy + cx;
    let f = d * -cx + e * -cy + cy;
    affine(img, [a, b, c, d, e, f], fill)
}

pub fn shear_x(img: &RgbImage, factor: f64, fill: Rgb<u8>) -> RgbImage {
    affine(img, [1.0, factor, 0.0, 0.0, 1.0, 0.0], fill)
}

pub fn shear_y(img: &RgbImage, factor: f64, fill: Rgb<u8>) -> RgbImage {
    affine(img, [1.0, 0.0, 0.0, factor, 1.0, 0.0], fill)
}

pub fn translate(img: &RgbImage, dx: f64, dy: f64, fill: Rgb<u8>) -> RgbImage {
    affine(img, [1.0, 0.0, dx, 0.0, 1.0, dy], fill)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x * 10) as u8, (y * 10) as u8, 128]))
    }

    #[test]
    fn resize_shorter_keeps_aspect() {
        let img = gradient(20, 10);
        let out = resize_shorter(&img, 5, imageops::FilterType::Triangle);
        assert_eq!(out.dimensions(), (10, 5));
    }

    #[test]
    fn center_crop_takes_middle_and_pads_small_inputs() {
        let img = gradient(10, 10);
        let out = center_crop(&img, 4);
        assert_eq!(out.dimensions(), (4, 4));
        assert_eq!(out.get_pixel(0, 0), img.get_pixel(3, 3));

        let odd = center_crop(&gradient(5, 4), 4);
        assert_eq!(odd.get_pixel(0, 0), gradient(5, 4).get_pixel(0, 0));
        let odd = center_crop(&gradient(7, 4), 4);
        assert_eq!(odd.get_pixel(0, 0), gradient(7, 4).get_pixel(2, 0));

        let small = center_crop(&gradient(2, 2), 4);
        assert_eq!(small.dimensions(), (4, 4));
        assert_eq!(small.get_pixel(0, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn pad_surrounds_with_fill() {
        let out = pad(&gradient(3, 3), 4, Rgb([0, 0, 0]));
        assert_eq!(out.dimensions(), (11, 11));
        assert_eq!(out.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(5, 5), &Rgb([10, 10, 128]));
    }

    #[test]
    fn posterize_and_solarize() {
        let img = RgbImage::from_pixel(1, 1, Rgb([0b1011_0111, 200, 10]));
        assert_eq!(posterize(&img, 2).get_pixel(0, 0), &Rgb([0b1000_0000, 192, 0]));
        assert_eq!(posterize(&img, 8), img);
        assert_eq!(solarize(&img, 128).get_pixel(0, 0), &Rgb([72, 55, 10]));
        assert_eq!(solarize_add(&img, 50, 128).get_pixel(0, 0), &Rgb([183, 200, 60]));
    }

    #[test]
    fn enhance_factor_one_is_identity() {
        let img = gradient(6, 4);
        assert_eq!(adjust_brightness(&img, 1.0), img);
        assert_eq!(adjust_saturation(&img, 1.0), img);
        assert_eq!(adjust_contrast(&img, 1.0), img);
        assert_eq!(adjust_sharpness(&img, 1.0), img);
        assert_eq!(adjust_brightness(&img, 0.0), RgbImage::new(6, 4));
    }

    #[test]
    fn autocontrast_stretches_channels() {
        let img = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([50, 50, 50]) } else { Rgb([100, 100, 100]) });
        let out = autocontrast(&img);
        assert_eq!(out.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(1, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn zero_warps_are_identity() {
        let img = gradient(7, 5);
        let fill = Rgb([1, 2, 3]);
        assert_eq!(rotate(&img, 0.0, fill), img);
        assert_eq!(shear_x(&img, 0.0, fill), img);
        assert_eq!(translate(&img, 0.0, 0.0, fill), img);
        let shifted = translate(&img, 2.0, 0.0, fill);
        assert_eq!(shifted.get_pixel(0, 0), img.get_pixel(2, 0));
        assert_eq!(shifted.get_pixel(6, 0), &fill);
    }
}

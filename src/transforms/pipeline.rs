use super::erasing::RandomErasing;
use super::ops;
use super::rand_augment::RandAugment;
use anyhow::bail;
use candle_core::{DType, Device, Tensor};
use clap::ValueEnum;
use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Interpolation {
    Nearest,
    Bilinear,
    Bicubic,
    Lanczos,
    /// bilinear or bicubic, drawn per application
    Random,
}

impl Interpolation {
    pub fn filter<R: Rng + ?Sized>(&self, rng: &mut R) -> FilterType {
        match self {
            Interpolation::Nearest => FilterType::Nearest,
            Interpolation::Bilinear => FilterType::Triangle,
            Interpolation::Bicubic => FilterType::CatmullRom,
            Interpolation::Lanczos => FilterType::Lanczos3,
            Interpolation::Random => {
                if rng.gen_bool(0.5) {
                    FilterType::Triangle
                } else {
                    FilterType::CatmullRom
                }
            }
        }
    }
}

/// One step of a [`Pipeline`]. Image stages run before `ToTensor`, tensor
/// stages after it.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    RandomResizedCrop {
        size: u32,
        scale: (f64, f64),
        ratio: (f64, f64),
        interpolation: Interpolation,
    },
    RandomCrop {
        size: u32,
        padding: u32,
    },
    RandomHorizontalFlip(f64),
    ColorJitter {
        brightness: f32,
        contrast: f32,
        saturation: f32,
    },
    RandAugment(RandAugment),
    Resize {
        size: u32,
        interpolation: Interpolation,
    },
    CenterCrop(u32),
    ToTensor,
    Normalize {
        mean: [f32; 3],
        std: [f32; 3],
    },
    RandomErasing(RandomErasing),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::RandomResizedCrop { .. } => "random_resized_crop",
            Stage::RandomCrop { .. } => "random_crop",
            Stage::RandomHorizontalFlip(_) => "random_horizontal_flip",
            Stage::ColorJitter { .. } => "color_jitter",
            Stage::RandAugment(_) => "rand_augment",
            Stage::Resize { .. } => "resize",
            Stage::CenterCrop(_) => "center_crop",
            Stage::ToTensor => "to_tensor",
            Stage::Normalize { .. } => "normalize",
            Stage::RandomErasing(_) => "random_erasing",
        }
    }

    fn apply<R: Rng + ?Sized>(&self, frame: Frame, rng: &mut R) -> anyhow::Result<Frame> {
        let frame = match (self, frame) {
            (Stage::ToTensor, Frame::Image(img)) => Frame::Tensor(to_tensor(&img)?),
            (Stage::Normalize { mean, std }, Frame::Tensor(t)) => {
                Frame::Tensor(normalize(&t, *mean, *std)?)
            }
            (Stage::RandomErasing(re), Frame::Tensor(t)) => Frame::Tensor(re.apply(t, rng)?),
            (stage, Frame::Image(img)) => Frame::Image(stage.apply_image(img, rng)?),
            (stage, Frame::Tensor(_)) => {
                bail!("stage {} expects an image but received a tensor", stage.name())
            }
        };
        Ok(frame)
    }

    fn apply_image<R: Rng + ?Sized>(&self, img: RgbImage, rng: &mut R) -> anyhow::Result<RgbImage> {
        let out = match self {
            Stage::RandomResizedCrop {
                size,
                scale,
                ratio,
                interpolation,
            } => {
                let (left, top, w, h) = random_resized_crop_params(&img, *scale, *ratio, rng);
                let cropped = ops::crop(&img, left, top, w, h);
                image::imageops::resize(&cropped, *size, *size, interpolation.filter(rng))
            }
            Stage::RandomCrop { size, padding } => {
                let padded = ops::pad(&img, *padding, Rgb([0, 0, 0]));
                let (w, h) = padded.dimensions();
                if w < *size || h < *size {
                    bail!("random crop of {size} does not fit a padded {w}x{h} image");
                }
                let top = rng.gen_range(0..=h - size);
                let left = rng.gen_range(0..=w - size);
                ops::crop(&padded, left, top, *size, *size)
            }
            Stage::RandomHorizontalFlip(p) => {
                if rng.gen_bool(p.clamp(0.0, 1.0)) {
                    image::imageops::flip_horizontal(&img)
                } else {
                    img
                }
            }
            Stage::ColorJitter {
                brightness,
                contrast,
                saturation,
            } => {
                let mut order = [0usize, 1, 2];
                order.shuffle(rng);
                let mut img = img;
                for which in order {
                    img = match which {
                        0 if *brightness > 0.0 => {
                            ops::adjust_brightness(&img, jitter_factor(*brightness, rng))
                        }
                        1 if *contrast > 0.0 => {
                            ops::adjust_contrast(&img, jitter_factor(*contrast, rng))
                        }
                        2 if *saturation > 0.0 => {
                            ops::adjust_saturation(&img, jitter_factor(*saturation, rng))
                        }
                        _ => img,
                    };
                }
                img
            }
            Stage::RandAugment(ra) => ra.apply(img, rng),
            Stage::Resize {
                size,
                interpolation,
            } => ops::resize_shorter(&img, *size, interpolation.filter(rng)),
            Stage::CenterCrop(size) => ops::center_crop(&img, *size),
            Stage::ToTensor | Stage::Normalize { .. } | Stage::RandomErasing(_) => {
                bail!("stage {} expects a tensor but received an image", self.name())
            }
        };
        Ok(out)
    }
}

enum Frame {
    Image(RgbImage),
    Tensor(Tensor),
}

/// An ordered list of stages turning a decoded RGB image into a `(3, H, W)`
/// f32 tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(Stage::name).collect()
    }

    /// Replace stage `index`, used to swap the leading crop for small inputs.
    pub fn replace_stage(&mut self, index: usize, stage: Stage) {
        self.stages[index] = stage;
    }

    /// Run every stage in order. An image still left after the last stage is
    /// converted to a tensor.
    pub fn apply<R: Rng + ?Sized>(&self, img: RgbImage, rng: &mut R) -> anyhow::Result<Tensor> {
        let mut frame = Frame::Image(img);
        for stage in &self.stages {
            frame = stage.apply(frame, rng)?;
        }
        match frame {
            Frame::Image(img) => Ok(to_tensor(&img)?),
            Frame::Tensor(t) => Ok(t),
        }
    }
}

/// HWC u8 image to CHW f32 tensor in `[0, 1]`.
pub fn to_tensor(img: &RgbImage) -> candle_core::Result<Tensor> {
    let (w, h) = img.dimensions();
    Tensor::from_vec(img.as_raw().clone(), (h as usize, w as usize, 3), &Device::Cpu)?
        .permute((2, 0, 1))?
        .to_dtype(DType::F32)?
        .affine(1. / 255., 0.)
}

pub fn normalize(t: &Tensor, mean: [f32; 3], std: [f32; 3]) -> candle_core::Result<Tensor> {
    let mean = Tensor::new(&mean, t.device())?.reshape((3, 1, 1))?;
    let std = Tensor::new(&std, t.device())?.reshape((3, 1, 1))?;
    t.broadcast_sub(&mean)?.broadcast_div(&std)
}

fn jitter_factor<R: Rng + ?Sized>(strength: f32, rng: &mut R) -> f32 {
    rng.gen_range((1.0 - strength).max(0.0)..=1.0 + strength)
}

/// Crop box `(left, top, width, height)` covering a random area fraction in
/// `scale` with an aspect ratio in `ratio`; falls back to a central crop.
fn random_resized_crop_params<R: Rng + ?Sized>(
    img: &RgbImage,
    scale: (f64, f64),
    ratio: (f64, f64),
    rng: &mut R,
) -> (u32, u32, u32, u32) {
    let (w, h) = img.dimensions();
    let area = w as f64 * h as f64;
    let (log_lo, log_hi) = (ratio.0.ln(), ratio.1.ln());
    for _ in 0..10 {
        let target_area = area * rng.gen_range(scale.0..=scale.1);
        let aspect = rng.gen_range(log_lo..=log_hi).exp();
        let cw = (target_area * aspect).sqrt().round() as u32;
        let ch = (target_area / aspect).sqrt().round() as u32;
        if cw > 0 && ch > 0 && cw <= w && ch <= h {
            let top = rng.gen_range(0..=h - ch);
            let left = rng.gen_range(0..=w - cw);
            return (left, top, cw, ch);
        }
    }
    let in_ratio = w as f64 / h.max(1) as f64;
    let (cw, ch) = if in_ratio < ratio.0 {
        (w, ((w as f64 / ratio.0).round() as u32).min(h))
    } else if in_ratio > ratio.1 {
        (((h as f64 * ratio.1).round() as u32).min(w), h)
    } else {
        (w, h)
    };
    ((w - cw) / 2, (h - ch) / 2, cw, ch)
}

//! RandAugment configured from policy strings such as
//! `rand-m9-mstd0.5-inc1`.
use super::ops;
use anyhow::{bail, Context};
use image::{Rgb, RgbImage};
use rand::Rng;
use rand_distr::{Distribution, Normal};

const LEVEL_DENOM: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AugmentOp {
    AutoContrast,
    Equalize,
    Invert,
    Rotate,
    Posterize,
    Solarize,
    SolarizeAdd,
    Color,
    Contrast,
    Brightness,
    Sharpness,
    ShearX,
    ShearY,
    TranslateXRel,
    TranslateYRel,
}

pub const RAND_OPS: [AugmentOp; 15] = [
    AugmentOp::AutoContrast,
    AugmentOp::Equalize,
    AugmentOp::Invert,
    AugmentOp::Rotate,
    AugmentOp::Posterize,
    AugmentOp::Solarize,
    AugmentOp::SolarizeAdd,
    AugmentOp::Color,
    AugmentOp::Contrast,
    AugmentOp::Brightness,
    AugmentOp::Sharpness,
    AugmentOp::ShearX,
    AugmentOp::ShearY,
    AugmentOp::TranslateXRel,
    AugmentOp::TranslateYRel,
];

#[derive(Debug, Clone, PartialEq)]
pub struct RandAugment {
    pub magnitude: f32,
    /// 0 keeps the magnitude fixed, infinity samples it uniformly in `[0, magnitude]`.
    pub magnitude_std: f32,
    pub magnitude_max: f32,
    pub num_layers: usize,
    pub prob: f32,
    /// Use the variants whose strength grows with the magnitude.
    pub increasing: bool,
    pub translate_pct: f64,
    pub fill: Rgb<u8>,
}

impl Default for RandAugment {
    fn default() -> Self {
        Self {
            magnitude: LEVEL_DENOM,
            magnitude_std: 0.0,
            magnitude_max: LEVEL_DENOM,
            num_layers: 2,
            prob: 0.5,
            increasing: false,
            translate_pct: 0.45,
            fill: Rgb([128, 128, 128]),
        }
    }
}

impl RandAugment {
    /// Parse a `rand-<opt>-<opt>...` policy. Options: `m` magnitude, `n`
    /// layers, `mstd` magnitude std (values above 100 mean uniform), `mmax`
    /// magnitude upper bound, `p` per-op probability, `inc` increasing ops.
    pub fn from_policy(policy: &str, fill: Rgb<u8>) -> anyhow::Result<Self> {
        let mut parts = policy.split('-');
        if parts.next() != Some("rand") {
            bail!("unsupported auto-augment policy {policy:?}, expected rand-<options>");
        }
        let mut ra = Self {
            fill,
            ..Self::default()
        };
        for part in parts {
            let split = part
                .find(|c: char| !c.is_ascii_alphabetic())
                .unwrap_or(part.len());
            let (key, value) = part.split_at(split);
            let parse = || {
                value
                    .parse::<f32>()
                    .with_context(|| format!("bad value {value:?} for {key:?} in policy {policy:?}"))
            };
            match key {
                "m" => ra.magnitude = parse()?,
                "mstd" => {
                    let std = parse()?;
                    ra.magnitude_std = if std > 100.0 { f32::INFINITY } else { std };
                }
                "mmax" => ra.magnitude_max = parse()?,
                "n" => ra.num_layers = parse()? as usize,
                "p" => ra.prob = parse()?,
                "inc" => ra.increasing = parse()? != 0.0,
                _ => bail!("unknown option {part:?} in auto-augment policy {policy:?}"),
            }
        }
        Ok(ra)
    }

    pub fn apply<R: Rng + ?Sized>(&self, mut img: RgbImage, rng: &mut R) -> RgbImage {
        for _ in 0..self.num_layers {
            let op = RAND_OPS[rng.gen_range(0..RAND_OPS.len())];
            if self.prob < 1.0 && rng.gen::<f32>() > self.prob {
                continue;
            }
            let magnitude = self.sample_magnitude(rng);
            img = self.apply_op(op, &img, magnitude / LEVEL_DENOM, rng);
        }
        img
    }

    fn sample_magnitude<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        let mut m = self.magnitude;
        if self.magnitude_std.is_infinite() {
            m = rng.gen_range(0.0..=m.max(0.0));
        } else if self.magnitude_std > 0.0 {
            if let Ok(normal) = Normal::new(m, self.magnitude_std) {
                m = normal.sample(rng);
            }
        }
        m.clamp(0.0, self.magnitude_max)
    }

    fn apply_op<R: Rng + ?Sized>(
        &self,
        op: AugmentOp,
        img: &RgbImage,
        level: f32,
        rng: &mut R,
    ) -> RgbImage {
        let mut negate = |v: f64| if rng.gen::<f32>() > 0.5 { -v } else { v };
        let enhance = |negate: &mut dyn FnMut(f64) -> f64| {
            if self.increasing {
                increasing_enhance_factor(negate(level as f64 * 0.9))
            } else {
                level * 1.8 + 0.1
            }
        };
        let (w, h) = (img.width() as f64, img.height() as f64);
        match op {
            AugmentOp::AutoContrast => ops::autocontrast(img),
            AugmentOp::Equalize => ops::equalize(img),
            AugmentOp::Invert => ops::invert(img),
            AugmentOp::Rotate => ops::rotate(img, negate(level as f64 * 30.0), self.fill),
            AugmentOp::Posterize => {
                let bits = (level * 4.0) as u8;
                ops::posterize(img, if self.increasing { 4 - bits.min(4) } else { bits })
            }
            AugmentOp::Solarize => {
                let threshold = ((level * 256.0) as u16).min(256);
                ops::solarize(img, if self.increasing { 256 - threshold } else { threshold })
            }
            AugmentOp::SolarizeAdd => ops::solarize_add(img, (level * 110.0) as u8, 128),
            AugmentOp::Color => ops::adjust_saturation(img, enhance(&mut negate)),
            AugmentOp::Contrast => ops::adjust_contrast(img, enhance(&mut negate)),
            AugmentOp::Brightness => ops::adjust_brightness(img, enhance(&mut negate)),
            AugmentOp::Sharpness => ops::adjust_sharpness(img, enhance(&mut negate)),
            AugmentOp::ShearX => ops::shear_x(img, negate(level as f64 * 0.3), self.fill),
            AugmentOp::ShearY => ops::shear_y(img, negate(level as f64 * 0.3), self.fill),
            AugmentOp::TranslateXRel => {
                let dx = negate(level as f64 * self.translate_pct) * w;
                ops::translate(img, dx, 0.0, self.fill)
            }
            AugmentOp::TranslateYRel => {
                let dy = negate(level as f64 * self.translate_pct) * h;
                ops::translate(img, 0.0, dy, self.fill)
            }
        }
    }
}

/// `1 + delta`, floored at 0.1.
fn increasing_enhance_factor(delta: f64) -> f32 {
    (1.0 + delta).max(0.1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn parses_deit_default_policy() {
        let ra = RandAugment::from_policy("rand-m9-mstd0.5-inc1", Rgb([1, 2, 3])).unwrap();
        assert_eq!(ra.magnitude, 9.0);
        assert_eq!(ra.magnitude_std, 0.5);
        assert!(ra.increasing);
        assert_eq!(ra.num_layers, 2);
        assert_eq!(ra.fill, Rgb([1, 2, 3]));
    }

    #[test]
    fn parses_layers_and_uniform_std() {
        let ra = RandAugment::from_policy("rand-n3-m5-mstd101-p1", Rgb([0, 0, 0])).unwrap();
        assert_eq!(ra.num_layers, 3);
        assert_eq!(ra.magnitude, 5.0);
        assert!(ra.magnitude_std.is_infinite());
        assert_eq!(ra.prob, 1.0);
    }

    #[test]
    fn rejects_unknown_policies() {
        assert!(RandAugment::from_policy("v0", Rgb([0, 0, 0])).is_err());
        assert!(RandAugment::from_policy("rand-q4", Rgb([0, 0, 0])).is_err());
        assert!(RandAugment::from_policy("rand-mx", Rgb([0, 0, 0])).is_err());
    }

    #[test]
    fn increasing_enhance_factor_never_drops_below_a_tenth() {
        assert_eq!(increasing_enhance_factor(0.0), 1.0);
        assert!((increasing_enhance_factor(0.45) - 1.45).abs() < 1e-6);
        assert_eq!(increasing_enhance_factor(-0.9), 0.1);
        assert_eq!(increasing_enhance_factor(-1.8), 0.1);
    }

    #[test]
    fn magnitude_stays_in_bounds() {
        let ra = RandAugment::from_policy("rand-m9-mstd5", Rgb([0, 0, 0])).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..200 {
            let m = ra.sample_magnitude(&mut rng);
            assert!((0.0..=10.0).contains(&m));
        }
    }

    #[test]
    fn apply_preserves_dimensions() {
        let ra = RandAugment::from_policy("rand-m9-mstd0.5-inc1-p1-n4", Rgb([124, 116, 104])).unwrap();
        let img = RgbImage::from_fn(12, 9, |x, y| Rgb([x as u8 * 20, y as u8 * 25, 90]));
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..20 {
            assert_eq!(ra.apply(img.clone(), &mut rng).dimensions(), (12, 9));
        }
    }
}

use candle_core::Tensor;
use clap::ValueEnum;
use rand::Rng;
use rand_distr::StandardNormal;

/// What the erased rectangle is filled with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EraseMode {
    /// zeros
    Const,
    /// one normal sample per channel
    Rand,
    /// one normal sample per pixel
    Pixel,
}

/// Random erasing on a normalized `(C, H, W)` tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomErasing {
    pub probability: f32,
    pub mode: EraseMode,
    pub min_count: usize,
    pub max_count: usize,
    pub min_area: f64,
    pub max_area: f64,
    pub log_aspect_ratio: (f64, f64),
}

impl RandomErasing {
    pub fn new(probability: f32, mode: EraseMode, max_count: usize) -> Self {
        let min_aspect: f64 = 0.3;
        Self {
            probability,
            mode,
            min_count: 1,
            max_count: max_count.max(1),
            min_area: 0.02,
            max_area: 1.0 / 3.0,
            log_aspect_ratio: (min_aspect.ln(), (1.0 / min_aspect).ln()),
        }
    }

    pub fn apply<R: Rng + ?Sized>(&self, tensor: Tensor, rng: &mut R) -> candle_core::Result<Tensor> {
        if rng.gen::<f32>() > self.probability {
            return Ok(tensor);
        }
        let (c, h, w) = tensor.dims3()?;
        let mut data = tensor.flatten_all()?.to_vec1::<f32>()?;
        self.erase(&mut data, (c, h, w), rng);
        Tensor::from_vec(data, (c, h, w), tensor.device())
    }

    fn erase<R: Rng + ?Sized>(&self, data: &mut [f32], (c, h, w): (usize, usize, usize), rng: &mut R) {
        let area = (h * w) as f64;
        let count = if self.min_count == self.max_count {
            self.min_count
        } else {
            rng.gen_range(self.min_count..=self.max_count)
        };
        for _ in 0..count {
            for _attempt in 0..10 {
                let target_area = rng.gen_range(self.min_area..=self.max_area) * area / count as f64;
                let aspect = rng
                    .gen_range(self.log_aspect_ratio.0..=self.log_aspect_ratio.1)
                    .exp();
                let eh = (target_area * aspect).sqrt().round() as usize;
                let ew = (target_area / aspect).sqrt().round() as usize;
                if ew >= w || eh >= h || ew == 0 || eh == 0 {
                    continue;
                }
                let top = rng.gen_range(0..=h - eh);
                let left = rng.gen_range(0..=w - ew);
                for ch in 0..c {
                    let channel_value: f32 = match self.mode {
                        EraseMode::Rand => rng.sample(StandardNormal),
                        _ => 0.0,
                    };
                    for y in top..top + eh {
                        for x in left..left + ew {
                            data[ch * h * w + y * w + x] = match self.mode {
                                EraseMode::Pixel => rng.sample(StandardNormal),
                                _ => channel_value,
                            };
                        }
                    }
                }
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn zero_probability_is_identity() {
        let t = Tensor::ones((3, 8, 8), candle_core::DType::F32, &Device::Cpu).unwrap();
        let re = RandomErasing::new(0.0, EraseMode::Pixel, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let out = re.apply(t, &mut rng).unwrap();
        assert_eq!(out.sum_all().unwrap().to_vec0::<f32>().unwrap(), 192.0);
    }

    #[test]
    fn const_mode_zeroes_a_patch() {
        let t = Tensor::ones((3, 16, 16), candle_core::DType::F32, &Device::Cpu).unwrap();
        let re = RandomErasing::new(1.0, EraseMode::Const, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let out = re.apply(t, &mut rng).unwrap();
        assert_eq!(out.dims(), &[3, 16, 16]);
        let data = out.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        let zeros = data.iter().filter(|v| **v == 0.0).count();
        assert!(zeros > 0 && zeros % 3 == 0);
        assert!(zeros < data.len() / 2);
    }
}

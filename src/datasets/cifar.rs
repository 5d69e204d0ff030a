//! CIFAR-100, binary distribution.
//!
//! <https://www.cs.toronto.edu/~kriz/cifar.html>: `cifar-100-binary/train.bin`
//! and `test.bin`, each record being one coarse label byte, one fine label
//! byte and 3072 planar RGB bytes of a 32x32 image.
use super::{render, Split};
use crate::transforms::Pipeline;
use anyhow::{bail, Context};
use candle_core::Tensor;
use image::{Rgb, RgbImage};
use rand::Rng;
use std::path::{Path, PathBuf};

const W: usize = 32;
const H: usize = 32;
const PIXELS: usize = W * H;
const BYTES_PER_RECORD: usize = 2 + 3 * PIXELS;
pub const NB_CLASSES: usize = 100;

pub const FINE_CLASSES: [&str; NB_CLASSES] = [
    "apple", "aquarium_fish", "baby", "bear", "beaver", "bed", "bee", "beetle", "bicycle",
    "bottle", "bowl", "boy", "bridge", "bus", "butterfly", "camel", "can", "castle",
    "caterpillar", "cattle", "chair", "chimpanzee", "clock", "cloud", "cockroach", "couch",
    "crab", "crocodile", "cup", "dinosaur", "dolphin", "elephant", "flatfish", "forest", "fox",
    "girl", "hamster", "house", "kangaroo", "keyboard", "lamp", "lawn_mower", "leopard", "lion",
    "lizard", "lobster", "man", "maple_tree", "motorcycle", "mountain", "mouse", "mushroom",
    "oak_tree", "orange", "orchid", "otter", "palm_tree", "pear", "pickup_truck", "pine_tree",
    "plain", "plate", "poppy", "porcupine", "possum", "rabbit", "raccoon", "ray", "road",
    "rocket", "rose", "sea", "seal", "shark", "shrew", "skunk", "skyscraper", "snail", "snake",
    "spider", "squirrel", "streetcar", "sunflower", "sweet_pepper", "table", "tank",
    "telephone", "television", "tiger", "tractor", "train", "trout", "tulip", "turtle",
    "wardrobe", "whale", "willow_tree", "wolf", "woman", "worm",
];

pub fn split_file(root: &Path, split: Split) -> PathBuf {
    let name = if split.is_train() { "train.bin" } else { "test.bin" };
    root.join("cifar-100-binary").join(name)
}

#[derive(Debug)]
pub struct Cifar100 {
    data: Vec<u8>,
    classes: Vec<String>,
    transform: Option<Pipeline>,
}

impl Cifar100 {
    pub fn new(root: &Path, split: Split) -> anyhow::Result<Self> {
        let path = split_file(root, split);
        let data = std::fs::read(&path)
            .with_context(|| format!("failed to read CIFAR-100 batch {}", path.display()))?;
        if data.is_empty() || data.len() % BYTES_PER_RECORD != 0 {
            bail!(
                "{} holds {} bytes, not a whole number of {BYTES_PER_RECORD}-byte records",
                path.display(),
                data.len()
            );
        }
        if let Some(i) = data
            .chunks_exact(BYTES_PER_RECORD)
            .position(|record| record[1] as usize >= NB_CLASSES)
        {
            bail!("record {i} of {} has fine label {}", path.display(), data[i * BYTES_PER_RECORD + 1]);
        }
        log::info!(
            "Load {} CIFAR-100 images from {}",
            data.len() / BYTES_PER_RECORD,
            path.display()
        );
        Ok(Self {
            data,
            classes: FINE_CLASSES.iter().map(|c| c.to_string()).collect(),
            transform: None,
        })
    }

    pub fn with_transform(mut self, transform: Pipeline) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn len(&self) -> usize {
        self.data.len() / BYTES_PER_RECORD
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    fn record(&self, index: usize) -> anyhow::Result<&[u8]> {
        if index >= self.len() {
            bail!("index {index} out of range for {} images", self.len());
        }
        Ok(&self.data[index * BYTES_PER_RECORD..(index + 1) * BYTES_PER_RECORD])
    }

    /// The 32x32 image and fine label of record `index`.
    pub fn sample(&self, index: usize) -> anyhow::Result<(RgbImage, usize)> {
        let record = self.record(index)?;
        let label = record[1] as usize;
        let planes = &record[2..];
        let image = RgbImage::from_fn(W as u32, H as u32, |x, y| {
            let i = y as usize * W + x as usize;
            Rgb([planes[i], planes[PIXELS + i], planes[2 * PIXELS + i]])
        });
        Ok((image, label))
    }

    pub fn get_with_rng<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> anyhow::Result<(Tensor, usize)> {
        let (image, label) = self.sample(index)?;
        Ok((render(self.transform.as_ref(), image, rng)?, label))
    }
}

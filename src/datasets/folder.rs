use super::{render, ClassIndex, ImageLoader};
use crate::transforms::Pipeline;
use anyhow::{bail, Context};
use candle_core::Tensor;
use rand::Rng;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "ppm", "bmp", "pgm", "tif", "tiff", "webp"];

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// `root/<class>/**/<image>` layout; classes are the sorted sub-directory names.
#[derive(Debug)]
pub struct ImageFolder {
    samples: Vec<(PathBuf, usize)>,
    index: ClassIndex,
    transform: Option<Pipeline>,
    loader: ImageLoader,
}

impl ImageFolder {
    pub fn new(root: &Path) -> anyhow::Result<Self> {
        if !root.is_dir() {
            bail!("{} is not a directory", root.display());
        }
        let mut class_dirs = Vec::new();
        for entry in WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry.with_context(|| format!("failed to scan {}", root.display()))?;
            if entry.file_type().is_dir() {
                class_dirs.push((entry.file_name().to_string_lossy().into_owned(), entry.into_path()));
            }
        }
        if class_dirs.is_empty() {
            bail!("no class directories found in {}", root.display());
        }
        let index = ClassIndex::sorted(class_dirs.iter().map(|(name, _)| name.as_str()));

        let mut samples = Vec::new();
        let mut empty = Vec::new();
        for (name, dir) in &class_dirs {
            let target = index
                .get(name)
                .with_context(|| format!("class {name:?} has no index"))?;
            let before = samples.len();
            for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
                let entry = entry.with_context(|| format!("failed to scan {}", dir.display()))?;
                if entry.file_type().is_file() && is_image(entry.path()) {
                    samples.push((entry.into_path(), target));
                }
            }
            log::debug!("{name}: {} images", samples.len() - before);
            if samples.len() == before {
                empty.push(name.as_str());
            }
        }
        if !empty.is_empty() {
            bail!(
                "no valid image for classes {empty:?} in {}, supported extensions: {EXTENSIONS:?}",
                root.display()
            );
        }
        log::info!(
            "Load {} images, {} classes from {}",
            samples.len(),
            index.len(),
            root.display()
        );
        Ok(Self {
            samples,
            index,
            transform: None,
            loader: ImageLoader::File,
        })
    }

    pub fn with_transform(mut self, transform: Pipeline) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_loader(mut self, loader: ImageLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn classes(&self) -> &[String] {
        self.index.classes()
    }

    pub fn nb_classes(&self) -> usize {
        self.index.len()
    }

    pub fn sample(&self, index: usize) -> anyhow::Result<&(PathBuf, usize)> {
        self.samples
            .get(index)
            .with_context(|| format!("index {index} out of range for {} images", self.len()))
    }

    pub fn get_with_rng<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> anyhow::Result<(Tensor, usize)> {
        let (path, target) = self.sample(index)?;
        let image = self.loader.load(path)?;
        Ok((render(self.transform.as_ref(), image, rng)?, *target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn save(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(5, 4, Rgb([1, 2, 3])).save(path).unwrap();
    }

    #[test]
    fn scans_sorted_classes_recursively() {
        let dir = tempfile::tempdir().unwrap();
        save(&dir.path().join("n02/b.png"));
        save(&dir.path().join("n02/a.png"));
        save(&dir.path().join("n01/nested/c.png"));
        std::fs::write(dir.path().join("n01/readme.txt"), "skip").unwrap();

        let ds = ImageFolder::new(dir.path()).unwrap();
        assert_eq!(ds.classes(), ["n01", "n02"]);
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.sample(0).unwrap(), &(dir.path().join("n01/nested/c.png"), 0));
        assert_eq!(ds.sample(1).unwrap(), &(dir.path().join("n02/a.png"), 1));

        let ds = ds.with_loader(ImageLoader::InMemory);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (t, label) = ds.get_with_rng(2, &mut rng).unwrap();
        assert_eq!((t.dims(), label), (&[3usize, 4, 5][..], 1));
    }

    #[test]
    fn empty_layouts_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ImageFolder::new(dir.path()).is_err());
        std::fs::create_dir_all(dir.path().join("cls")).unwrap();
        assert!(ImageFolder::new(dir.path()).is_err());
        assert!(ImageFolder::new(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn every_class_needs_an_image() {
        let dir = tempfile::tempdir().unwrap();
        save(&dir.path().join("n01/a.pgm"));
        save(&dir.path().join("n03/b.ppm"));
        std::fs::create_dir_all(dir.path().join("n02")).unwrap();
        std::fs::write(dir.path().join("n02/c.gif"), "not scanned").unwrap();
        let err = ImageFolder::new(dir.path()).unwrap_err();
        assert!(err.to_string().contains("\"n02\""));

        std::fs::remove_dir_all(dir.path().join("n02")).unwrap();
        let ds = ImageFolder::new(dir.path()).unwrap();
        assert_eq!(ds.classes(), ["n01", "n03"]);
        assert_eq!(ds.len(), 2);
    }
}

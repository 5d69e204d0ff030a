use super::{render, ClassIndex, ImageLoader};
use crate::transforms::Pipeline;
use anyhow::{bail, Context};
use candle_core::Tensor;
use rand::Rng;
use std::path::{Path, PathBuf};

pub const DEFAULT_PATH_COLUMN: &str = "Image_Path";
pub const DEFAULT_LABEL_COLUMN: &str = "Food_Label";

/// Images listed in a CSV file with a path column and a class-name column.
/// Classes are indexed in sorted name order.
#[derive(Debug)]
pub struct FoodDataset {
    root_dir: PathBuf,
    rows: Vec<(PathBuf, String)>,
    index: ClassIndex,
    transform: Option<Pipeline>,
    loader: ImageLoader,
}

impl FoodDataset {
    pub fn with_columns(
        csv_file: &Path,
        root_dir: &Path,
        path_column: &str,
        label_column: &str,
    ) -> anyhow::Result<Self> {
        let mut reader = csv::Reader::from_path(csv_file)
            .with_context(|| format!("failed to open label file {}", csv_file.display()))?;
        let headers = reader
            .headers()
            .with_context(|| format!("failed to read header of {}", csv_file.display()))?
            .clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .with_context(|| format!("column {name:?} not found in {}", csv_file.display()))
        };
        let (path_col, label_col) = (column(path_column)?, column(label_column)?);

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record
                .with_context(|| format!("bad record {} in {}", line + 1, csv_file.display()))?;
            match (record.get(path_col), record.get(label_col)) {
                (Some(path), Some(label)) => rows.push((PathBuf::from(path), label.to_string())),
                _ => bail!("record {} in {} is missing columns", line + 1, csv_file.display()),
            }
        }
        let index = ClassIndex::sorted(rows.iter().map(|(_, label)| label.as_str()));
        log::info!(
            "Load {} rows, {} classes from {}",
            rows.len(),
            index.len(),
            csv_file.display()
        );
        Ok(Self {
            root_dir: root_dir.to_path_buf(),
            rows,
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
        self.rows.len()
    }

    pub fn classes(&self) -> &[String] {
        self.index.classes()
    }

    pub fn nb_classes(&self) -> usize {
        self.index.len()
    }

    /// Resolved image path and class index of row `index`.
    pub fn sample(&self, index: usize) -> anyhow::Result<(PathBuf, usize)> {
        let (path, label) = self
            .rows
            .get(index)
            .with_context(|| format!("index {index} out of range for {} rows", self.len()))?;
        let target = self
            .index
            .get(label)
            .with_context(|| format!("label {label:?} has no class index"))?;
        Ok((self.root_dir.join(path), target))
    }

    pub fn get_with_rng<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> anyhow::Result<(Tensor, usize)> {
        let (path, target) = self.sample(index)?;
        let image = self.loader.load(&path)?;
        Ok((render(self.transform.as_ref(), image, rng)?, target))
    }
}

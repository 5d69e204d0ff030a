//! iNaturalist 2018/2019 layout.
//!
//! ```text
//! root/
//!   train2018.json    {"images": [{"file_name": ...}], "annotations": [{"category_id": ...}]}
//!   val2018.json
//!   categories.json   [{"name": ..., "kingdom": ..., "genus": ...}, ...]  (position = id)
//!   train_val2018/<super>/<category id>/<image>.jpg
//! ```
//!
//! Class indices always come from the *training* annotations, in the order a
//! name is first met, so both splits agree on them.
use super::{render, ClassIndex, ImageLoader, Split};
use crate::transforms::Pipeline;
use anyhow::{bail, Context};
use candle_core::Tensor;
use clap::ValueEnum;
use rand::Rng;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Category field used as the class name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Granularity {
    Kingdom,
    Phylum,
    Class,
    Order,
    Supercategory,
    Family,
    Genus,
    Name,
    /// numeric category id, stringified
    Id,
}

impl Granularity {
    pub fn field(&self) -> &'static str {
        match self {
            Granularity::Kingdom => "kingdom",
            Granularity::Phylum => "phylum",
            Granularity::Class => "class",
            Granularity::Order => "order",
            Granularity::Supercategory => "supercategory",
            Granularity::Family => "family",
            Granularity::Genus => "genus",
            Granularity::Name => "name",
            Granularity::Id => "id",
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnnotationFile {
    images: Vec<ImageRecord>,
    #[serde(default)]
    annotations: Vec<AnnotationRecord>,
}

#[derive(Debug, Deserialize)]
struct ImageRecord {
    file_name: String,
}

#[derive(Debug, Deserialize)]
struct AnnotationRecord {
    category_id: CategoryId,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CategoryId {
    Number(u64),
    Float(f64),
    Text(String),
}

impl CategoryId {
    fn index(&self) -> anyhow::Result<usize> {
        match self {
            CategoryId::Number(n) => Ok(*n as usize),
            CategoryId::Float(f) if *f >= 0.0 && f.fract() == 0.0 => Ok(*f as usize),
            CategoryId::Float(f) => bail!("category id {f} is not a whole number"),
            CategoryId::Text(s) => s
                .trim()
                .parse()
                .with_context(|| format!("category id {s:?} is not a number")),
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("failed to parse {}", path.display()))
}

/// Class name of category `id` at the requested granularity.
fn category_name(
    categories: &[Map<String, Value>],
    id: usize,
    granularity: Granularity,
) -> anyhow::Result<String> {
    let category = categories.get(id).with_context(|| {
        format!("category id {id} out of range for {} categories", categories.len())
    })?;
    match category.get(granularity.field()) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => bail!("category {id} field {:?} is not a name: {other}", granularity.field()),
        None => bail!("category {id} has no {:?} field", granularity.field()),
    }
}

/// `<super>/<super>/<id>/<file>` file name to (`root/seg0/seg2/seg3`, id).
fn resolve_file_name(root: &Path, file_name: &str) -> anyhow::Result<(PathBuf, usize)> {
    let cut: Vec<&str> = file_name.split('/').collect();
    if cut.len() < 4 {
        bail!("file_name {file_name:?} has {} path segments, expected at least 4", cut.len());
    }
    let id = cut[2]
        .parse()
        .with_context(|| format!("segment {:?} of {file_name:?} is not a category id", cut[2]))?;
    Ok((root.join(cut[0]).join(cut[2]).join(cut[3]), id))
}

pub struct INatDataset {
    samples: Vec<(PathBuf, usize)>,
    targeter: ClassIndex,
    year: u16,
    transform: Option<Pipeline>,
    target_transform: Option<fn(usize) -> usize>,
    loader: ImageLoader,
}

impl std::fmt::Debug for INatDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("INatDataset")
            .field("year", &self.year)
            .field("samples", &self.samples.len())
            .field("nb_classes", &self.targeter.len())
            .finish()
    }
}

impl INatDataset {
    pub fn new(root: &Path, split: Split, year: u16, granularity: Granularity) -> anyhow::Result<Self> {
        let data: AnnotationFile = read_json(&root.join(format!("{}{year}.json", split.as_str())))?;
        let categories: Vec<Map<String, Value>> = read_json(&root.join("categories.json"))?;

        let targeter_path = root.join(format!("train{year}.json"));
        let data_for_targeter: AnnotationFile = read_json(&targeter_path)?;
        let names = data_for_targeter
            .annotations
            .iter()
            .map(|elem| category_name(&categories, elem.category_id.index()?, granularity))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let targeter = ClassIndex::first_seen(names);
        log::info!(
            "{} {:?} classes from {} annotations in {}",
            targeter.len(),
            granularity.field(),
            data_for_targeter.annotations.len(),
            targeter_path.display()
        );

        let mut samples = Vec::with_capacity(data.images.len());
        for elem in &data.images {
            let (path, id) = resolve_file_name(root, &elem.file_name)?;
            let name = category_name(&categories, id, granularity)?;
            let target = targeter.get(&name).with_context(|| {
                format!("category {name:?} of {} never occurs in {}", elem.file_name, targeter_path.display())
            })?;
            samples.push((path, target));
        }
        log::info!("Load {} iNaturalist {year} {split:?} images", samples.len());

        Ok(Self {
            samples,
            targeter,
            year,
            transform: None,
            target_transform: None,
            loader: ImageLoader::File,
        })
    }

    pub fn with_transform(mut self, transform: Pipeline) -> Self {
        self.transform = Some(transform);
        self
    }

    #[cfg(test)]
    pub fn with_target_transform(mut self, target_transform: fn(usize) -> usize) -> Self {
        self.target_transform = Some(target_transform);
        self
    }

    pub fn with_loader(mut self, loader: ImageLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn nb_classes(&self) -> usize {
        self.targeter.len()
    }

    pub fn classes(&self) -> &[String] {
        self.targeter.classes()
    }

    pub fn sample(&self, index: usize) -> anyhow::Result<&(PathBuf, usize)> {
        self.samples
            .get(index)
            .with_context(|| format!("index {index} out of range for {} images", self.len()))
    }

    pub fn get_with_rng<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> anyhow::Result<(Tensor, usize)> {
        let (path, target) = self.sample(index)?;
        let image = self.loader.load(path)?;
        let target = match self.target_transform {
            Some(f) => f(*target),
            None => *target,
        };
        Ok((render(self.transform.as_ref(), image, rng)?, target))
    }
}

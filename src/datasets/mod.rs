mod cifar;
mod classes;
mod folder;
mod food;
mod inat;
mod loader;
use crate::core::Learner;
use crate::transforms::{build_transform, to_tensor, Pipeline};
use anyhow::Context;
use candle_core::Tensor;
use clap::ValueEnum;
use image::RgbImage;
use rand::Rng;
pub use cifar::Cifar100;
pub use classes::ClassIndex;
pub use folder::ImageFolder;
pub use food::{FoodDataset, DEFAULT_LABEL_COLUMN, DEFAULT_PATH_COLUMN};
pub use inat::{Granularity, INatDataset};
pub use loader::ImageLoader;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DatasetKind {
    /// images + labels listed in a csv file
    Food,
    /// CIFAR-100 binary batches
    Cifar,
    /// ImageNet-style class folders
    Imnet,
    /// iNaturalist 2018
    Inat,
    /// iNaturalist 2019
    #[value(name = "inat19")]
    Inat19,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Split {
    Train,
    Val,
}

impl Split {
    pub fn is_train(self) -> bool {
        matches!(self, Split::Train)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
        }
    }
}

/// Apply `transform`, or convert the bare image when there is none.
pub(crate) fn render<R: Rng + ?Sized>(
    transform: Option<&Pipeline>,
    image: RgbImage,
    rng: &mut R,
) -> anyhow::Result<Tensor> {
    match transform {
        Some(pipeline) => pipeline.apply(image, rng),
        None => Ok(to_tensor(&image)?),
    }
}

/// One adapter per dataset kind, all answering `(image tensor, class index)`
/// queries by position.
#[derive(Debug)]
pub enum ClassificationDataset {
    Food(FoodDataset),
    Cifar100(Cifar100),
    ImageFolder(ImageFolder),
    INat(INatDataset),
}

impl ClassificationDataset {
    pub fn len(&self) -> usize {
        match self {
            ClassificationDataset::Food(ds) => ds.len(),
            ClassificationDataset::Cifar100(ds) => ds.len(),
            ClassificationDataset::ImageFolder(ds) => ds.len(),
            ClassificationDataset::INat(ds) => ds.len(),
        }
    }

    pub fn classes(&self) -> &[String] {
        match self {
            ClassificationDataset::Food(ds) => ds.classes(),
            ClassificationDataset::Cifar100(ds) => ds.classes(),
            ClassificationDataset::ImageFolder(ds) => ds.classes(),
            ClassificationDataset::INat(ds) => ds.classes(),
        }
    }

    pub fn get_with_rng<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> anyhow::Result<(Tensor, usize)> {
        match self {
            ClassificationDataset::Food(ds) => ds.get_with_rng(index, rng),
            ClassificationDataset::Cifar100(ds) => ds.get_with_rng(index, rng),
            ClassificationDataset::ImageFolder(ds) => ds.get_with_rng(index, rng),
            ClassificationDataset::INat(ds) => ds.get_with_rng(index, rng),
        }
    }

    pub fn get(&self, index: usize) -> anyhow::Result<(Tensor, usize)> {
        self.get_with_rng(index, &mut rand::thread_rng())
    }
}

/// Build the transform for `split`, then the adapter selected by
/// `lnr.data_set`. Returns the dataset and its class count.
pub fn build_dataset(split: Split, lnr: &Learner) -> anyhow::Result<(ClassificationDataset, usize)> {
    let transform = build_transform(split, lnr)?;
    let loader = if lnr.use_mcloader {
        ImageLoader::InMemory
    } else {
        ImageLoader::File
    };
    log::info!("Load dataset: {:?} ({})", lnr.data_set, split.as_str());

    let (dataset, nb_classes) = match lnr.data_set {
        DatasetKind::Food => {
            let csv_file = if split.is_train() { &lnr.train_csv } else { &lnr.val_csv };
            let csv_file = csv_file.as_ref().with_context(|| {
                format!("--{}-csv is required for the food dataset", split.as_str())
            })?;
            let dataset = FoodDataset::with_columns(
                csv_file,
                &lnr.data_path,
                &lnr.path_column,
                &lnr.label_column,
            )?
            .with_loader(loader)
            .with_transform(transform);
            let nb_classes = dataset.nb_classes();
            (ClassificationDataset::Food(dataset), nb_classes)
        }
        DatasetKind::Cifar => {
            let dataset = Cifar100::new(&lnr.data_path, split)?.with_transform(transform);
            (ClassificationDataset::Cifar100(dataset), cifar::NB_CLASSES)
        }
        DatasetKind::Imnet => {
            let root = lnr.data_path.join(split.as_str());
            let dataset = ImageFolder::new(&root)?
                .with_loader(loader)
                .with_transform(transform);
            if dataset.nb_classes() != 1000 {
                log::warn!(
                    "{} holds {} classes, the ImageNet head has 1000",
                    root.display(),
                    dataset.nb_classes()
                );
            }
            (ClassificationDataset::ImageFolder(dataset), 1000)
        }
        DatasetKind::Inat | DatasetKind::Inat19 => {
            let year = if lnr.data_set == DatasetKind::Inat { 2018 } else { 2019 };
            let dataset = INatDataset::new(&lnr.data_path, split, year, lnr.inat_category)?
                .with_loader(loader)
                .with_transform(transform);
            let nb_classes = dataset.nb_classes();
            (ClassificationDataset::INat(dataset), nb_classes)
        }
    };
    Ok((dataset, nb_classes))
}

use crate::datasets::{DatasetKind, Granularity, DEFAULT_LABEL_COLUMN, DEFAULT_PATH_COLUMN};
use crate::transforms::{EraseMode, Interpolation};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "Dataset pipelines for image classification")]
#[command(author = "Antodyn <antodyn@163.com>")]
#[command(version = "0.1")]
#[command(about = "Build and probe image-classification datasets", long_about = None)]
pub struct Learner {
    /// Name of this run
    #[arg(short, long)]
    pub name: String,

    /// specify which dataset to build
    #[arg(short, long, value_enum, default_value_t = DatasetKind::Food)]
    pub data_set: DatasetKind,

    /// dataset root
    #[arg(short = 'p', long, default_value = "data")]
    pub data_path: PathBuf,

    /// label csv for the training split (food)
    #[arg(long)]
    pub train_csv: Option<PathBuf>,

    /// label csv for the validation split (food)
    #[arg(long)]
    pub val_csv: Option<PathBuf>,

    /// csv column holding image paths relative to the data path
    #[arg(long, default_value = DEFAULT_PATH_COLUMN)]
    pub path_column: String,

    /// csv column holding class names
    #[arg(long, default_value = DEFAULT_LABEL_COLUMN)]
    pub label_column: String,

    /// images input size
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..), default_value_t = 224)]
    pub input_size: u32,

    /// color jitter factor, used when no auto augment policy is set
    #[arg(long, default_value_t = 0.4)]
    pub color_jitter: f32,

    /// auto augment policy, e.g. rand-m9-mstd0.5-inc1 ("none" to disable)
    #[arg(long, default_value = "rand-m9-mstd0.5-inc1")]
    pub aa: Option<String>,

    /// training interpolation
    #[arg(long, value_enum, default_value_t = Interpolation::Bicubic)]
    pub train_interpolation: Interpolation,

    /// random erase prob
    #[arg(long, default_value_t = 0.25)]
    pub reprob: f32,

    /// random erase mode
    #[arg(long, value_enum, default_value_t = EraseMode::Pixel)]
    pub remode: EraseMode,

    /// random erase count
    #[arg(long, default_value_t = 1)]
    pub recount: usize,

    /// decode images from in-memory buffers
    #[arg(long, default_value_t = false)]
    pub use_mcloader: bool,

    /// semantic granularity of inat classes
    #[arg(long, value_enum, default_value_t = Granularity::Name)]
    pub inat_category: Granularity,

    /// seed of the probe rngs, the thread rng is used when unset
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// number of samples decoded per split by the probe run
    #[arg(long, default_value_t = 8)]
    pub probe: usize,

    /// recoder home path
    #[arg(short, long, default_value_t = String::from("tmp"))]
    pub recoder_home: String,

    /// show debug logs on stderr
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_training_recipe() {
        let lnr = Learner::try_parse_from(["probe", "-n", "run"]).unwrap();
        assert_eq!(lnr.data_set, DatasetKind::Food);
        assert_eq!(lnr.input_size, 224);
        assert_eq!(lnr.aa.as_deref(), Some("rand-m9-mstd0.5-inc1"));
        assert_eq!(lnr.remode, EraseMode::Pixel);
        assert_eq!(lnr.inat_category, Granularity::Name);
        assert!(!lnr.use_mcloader);
        assert_eq!(lnr.seed, None);
    }

    #[test]
    fn every_granularity_parses() {
        for (tag, granularity) in [("genus", Granularity::Genus), ("id", Granularity::Id)] {
            let lnr = Learner::try_parse_from(["probe", "-n", "run", "--inat-category", tag]).unwrap();
            assert_eq!(lnr.inat_category, granularity);
        }
    }

    #[test]
    fn unknown_dataset_tag_is_rejected() {
        let err = Learner::try_parse_from(["probe", "-n", "run", "--data-set", "mnist"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn dataset_tags_parse() {
        for (tag, kind) in [
            ("food", DatasetKind::Food),
            ("cifar", DatasetKind::Cifar),
            ("imnet", DatasetKind::Imnet),
            ("inat", DatasetKind::Inat),
            ("inat19", DatasetKind::Inat19),
        ] {
            let lnr = Learner::try_parse_from(["probe", "-n", "run", "-d", tag]).unwrap();
            assert_eq!(lnr.data_set, kind);
        }
    }
}

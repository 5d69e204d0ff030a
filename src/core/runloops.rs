use crate::core::Learner;
use crate::datasets::{build_dataset, ClassificationDataset, Split};
use anyhow::ensure;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::time::Instant;

pub fn run(lnr: &Learner) -> anyhow::Result<()> {
    for split in [Split::Train, Split::Val] {
        let loop_time = Instant::now();
        let (dataset, nb_classes) = build_dataset(split, lnr)?;
        log::info!(
            "{split:?} -> {} samples, {nb_classes} classes, build time: {:5.2?}",
            dataset.len(),
            loop_time.elapsed()
        );

        let probe_time = Instant::now();
        let probed = probe(&dataset, nb_classes, lnr)?;
        log::info!(
            "{split:?} -> decoded {probed} samples, probe time: {:5.2?}",
            probe_time.elapsed()
        );
    }
    Ok(())
}

/// Decode the first `lnr.probe` samples in parallel, checking every label
/// against the class count. With `--seed`, sample `i` draws from a ChaCha8
/// rng seeded with `seed + i`.
pub fn probe(dataset: &ClassificationDataset, nb_classes: usize, lnr: &Learner) -> anyhow::Result<usize> {
    let count = lnr.probe.min(dataset.len());
    let samples = (0..count)
        .into_par_iter()
        .map(|index| -> anyhow::Result<(usize, Vec<usize>, usize)> {
            let (image, label) = match lnr.seed {
                Some(seed) => {
                    let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(index as u64));
                    dataset.get_with_rng(index, &mut rng)?
                }
                None => dataset.get(index)?,
            };
            ensure!(
                label < nb_classes,
                "sample {index} has label {label}, outside [0, {nb_classes})"
            );
            Ok((index, image.dims().to_vec(), label))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    for (index, dims, label) in &samples {
        let name = dataset.classes().get(*label).map(String::as_str).unwrap_or("?");
        log::debug!("[{index}] image: {dims:?}, label: {label} ({name})");
    }
    Ok(samples.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use image::{Rgb, RgbImage};

    #[test]
    fn probes_both_food_splits() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for i in 0..3u8 {
            RgbImage::from_pixel(64, 48, Rgb([i * 60, 30, 90]))
                .save(root.join(format!("{i}.png")))
                .unwrap();
        }
        let csv = "Image_Path,Food_Label\n0.png,apple\n1.png,banana\n2.png,apple\n";
        std::fs::write(root.join("train.csv"), csv).unwrap();
        std::fs::write(root.join("val.csv"), csv).unwrap();

        let root_str = root.to_str().unwrap();
        let train_csv = root.join("train.csv");
        let val_csv = root.join("val.csv");
        let lnr = Learner::try_parse_from([
            "probe",
            "-n",
            "food",
            "-p",
            root_str,
            "--train-csv",
            train_csv.to_str().unwrap(),
            "--val-csv",
            val_csv.to_str().unwrap(),
            "--input-size",
            "40",
            "--probe",
            "5",
            "--seed",
            "7",
        ])
        .unwrap();

        run(&lnr).unwrap();
        let (dataset, nb_classes) = build_dataset(Split::Train, &lnr).unwrap();
        assert_eq!(probe(&dataset, nb_classes, &lnr).unwrap(), 3);
    }

    #[test]
    fn probe_surfaces_decode_failures() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("train.csv"), "Image_Path,Food_Label\nmissing.png,tea\n").unwrap();
        let train_csv = root.join("train.csv");
        let lnr = Learner::try_parse_from([
            "probe",
            "-n",
            "food",
            "-p",
            root.to_str().unwrap(),
            "--train-csv",
            train_csv.to_str().unwrap(),
        ])
        .unwrap();
        let (dataset, nb_classes) = build_dataset(Split::Train, &lnr).unwrap();
        assert!(probe(&dataset, nb_classes, &lnr).is_err());
    }
}

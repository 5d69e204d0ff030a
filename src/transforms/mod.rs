mod erasing;
mod ops;
mod pipeline;
mod rand_augment;
use crate::core::Learner;
use crate::datasets::Split;
use image::Rgb;
pub use erasing::{EraseMode, RandomErasing};
pub use pipeline::{to_tensor, Interpolation, Pipeline, Stage};
pub use rand_augment::RandAugment;

pub const IMAGENET_DEFAULT_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_DEFAULT_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Inputs at or below this size are cropped with padding rather than resized.
const SMALL_INPUT: u32 = 32;

pub fn build_transform(split: Split, lnr: &Learner) -> anyhow::Result<Pipeline> {
    let resize_im = lnr.input_size > SMALL_INPUT;
    let pipeline = if split.is_train() {
        let mut pipeline = train_pipeline(lnr)?;
        if !resize_im {
            pipeline.replace_stage(
                0,
                Stage::RandomCrop {
                    size: lnr.input_size,
                    padding: 4,
                },
            );
        }
        pipeline
    } else {
        let mut t = Vec::new();
        if resize_im {
            let size = ((256. / 224.) * lnr.input_size as f64) as u32;
            t.push(Stage::Resize {
                size,
                interpolation: Interpolation::Bicubic,
            });
            t.push(Stage::CenterCrop(lnr.input_size));
        }
        t.push(Stage::ToTensor);
        t.push(Stage::Normalize {
            mean: IMAGENET_DEFAULT_MEAN,
            std: IMAGENET_DEFAULT_STD,
        });
        Pipeline::new(t)
    };
    log::info!("{split:?} transform: {:?}", pipeline.stage_names());
    log::debug!("{split:?} transform stages: {:?}", pipeline.stages());
    Ok(pipeline)
}

/// Crop/flip, then either RandAugment or color jitter, then tensor
/// conversion, normalization and optional random erasing.
fn train_pipeline(lnr: &Learner) -> anyhow::Result<Pipeline> {
    let mut t = vec![
        Stage::RandomResizedCrop {
            size: lnr.input_size,
            scale: (0.08, 1.0),
            ratio: (3. / 4., 4. / 3.),
            interpolation: lnr.train_interpolation,
        },
        Stage::RandomHorizontalFlip(0.5),
    ];
    match lnr.aa.as_deref() {
        Some(policy) if !policy.is_empty() && policy != "none" => {
            let fill = IMAGENET_DEFAULT_MEAN.map(|x| (255. * x).round().min(255.) as u8);
            t.push(Stage::RandAugment(RandAugment::from_policy(policy, Rgb(fill))?));
        }
        _ if lnr.color_jitter > 0.0 => t.push(Stage::ColorJitter {
            brightness: lnr.color_jitter,
            contrast: lnr.color_jitter,
            saturation: lnr.color_jitter,
        }),
        _ => {}
    }
    t.push(Stage::ToTensor);
    t.push(Stage::Normalize {
        mean: IMAGENET_DEFAULT_MEAN,
        std: IMAGENET_DEFAULT_STD,
    });
    if lnr.reprob > 0.0 {
        t.push(Stage::RandomErasing(RandomErasing::new(
            lnr.reprob,
            lnr.remode,
            lnr.recount,
        )));
    }
    Ok(Pipeline::new(t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use image::RgbImage;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn learner(extra: &[&str]) -> Learner {
        let mut args = vec!["probe", "--name", "test"];
        args.extend_from_slice(extra);
        Learner::try_parse_from(args).unwrap()
    }

    #[test]
    fn small_train_input_starts_with_padded_crop() {
        let pipeline = build_transform(Split::Train, &learner(&["--input-size", "32"])).unwrap();
        assert_eq!(
            pipeline.stages()[0],
            Stage::RandomCrop {
                size: 32,
                padding: 4
            }
        );
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let img = RgbImage::from_pixel(32, 32, Rgb([200, 100, 50]));
        assert_eq!(pipeline.apply(img, &mut rng).unwrap().dims(), &[3, 32, 32]);
    }

    #[test]
    fn default_train_pipeline_matches_deit_recipe() {
        let pipeline = build_transform(Split::Train, &learner(&[])).unwrap();
        assert_eq!(
            pipeline.stage_names(),
            vec![
                "random_resized_crop",
                "random_horizontal_flip",
                "rand_augment",
                "to_tensor",
                "normalize",
                "random_erasing"
            ]
        );
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let img = RgbImage::from_fn(300, 260, |x, y| Rgb([x as u8, y as u8, 7]));
        assert_eq!(pipeline.apply(img, &mut rng).unwrap().dims(), &[3, 224, 224]);
    }

    #[test]
    fn color_jitter_replaces_disabled_auto_augment() {
        let pipeline = build_transform(
            Split::Train,
            &learner(&["--aa", "none", "--reprob", "0"]),
        )
        .unwrap();
        assert_eq!(
            pipeline.stage_names(),
            vec![
                "random_resized_crop",
                "random_horizontal_flip",
                "color_jitter",
                "to_tensor",
                "normalize"
            ]
        );
    }

    #[test]
    fn unknown_policy_is_a_config_error() {
        assert!(build_transform(Split::Train, &learner(&["--aa", "augmix-m5"])).is_err());
    }

    #[test]
    fn eval_pipeline_resizes_then_crops() {
        let pipeline = build_transform(Split::Val, &learner(&["--input-size", "224"])).unwrap();
        assert_eq!(
            pipeline.stage_names(),
            vec!["resize", "center_crop", "to_tensor", "normalize"]
        );
        assert_eq!(
            pipeline.stages()[0],
            Stage::Resize {
                size: 256,
                interpolation: Interpolation::Bicubic
            }
        );
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let img = RgbImage::from_pixel(400, 300, Rgb([10, 20, 30]));
        assert_eq!(pipeline.apply(img, &mut rng).unwrap().dims(), &[3, 224, 224]);
    }

    #[test]
    fn small_eval_input_skips_resize_and_crop() {
        let pipeline = build_transform(Split::Val, &learner(&["--input-size", "32"])).unwrap();
        assert_eq!(pipeline.stage_names(), vec!["to_tensor", "normalize"]);
    }
}

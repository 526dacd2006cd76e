use std::path::PathBuf;

use burn::backend::NdArray;
use burn::backend::ndarray::NdArrayDevice;
use clap::Parser;

use weightmap::{
    WeightMapExtractor, WeightMapNode,
    burnops::{image_to_mask_tensor, mask_tensor_to_image, preview_tensor_to_image},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The binary mask or semantic id map to convert
    image: PathBuf,

    /// Semantic class to extract; -1 treats any non-zero pixel as the mask
    #[arg(short, long, default_value_t = -1)]
    class_id: i32,

    /// Gaussian sigma controlling how far the mask edges are softened
    #[arg(short, long, default_value_t = 2.0)]
    sigma: f32,

    /// Invert the resulting weight map
    #[arg(short, long, default_value_t = false)]
    invert: bool,

    /// Skip the gaussian edge softening pass
    #[arg(long, default_value_t = false)]
    no_soften: bool,

    /// The directory to save the weight mask and preview to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,
}

fn main() -> weightmap::Result<()> {
    env_logger::init();
    let args = Args::parse();

    log::info!("Converting {:?} into a weight map", args.image);

    let device = NdArrayDevice::default();
    let image = image::open(&args.image)?;
    let mask_image = image_to_mask_tensor::<NdArray>(&image, &device);

    let extractor = WeightMapExtractor {
        class_id: args.class_id,
        sigma: args.sigma,
        invert: args.invert,
        edge_soften: !args.no_soften,
    };
    let weight_map = extractor.make_weight_map(mask_image)?;

    let mask_path = args.output_dir.join("weight_mask.png");
    mask_tensor_to_image(weight_map.mask)?.save(&mask_path)?;
    log::info!("Saved weight mask to {:?}", mask_path);

    let preview_path = args.output_dir.join("weight_preview.png");
    preview_tensor_to_image(weight_map.preview)?.save(&preview_path)?;
    log::info!("Saved weight preview to {:?}", preview_path);

    Ok(())
}

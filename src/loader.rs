use std::path::Path;

use image::imageops::FilterType;
use image::io::Reader;
use image::DynamicImage;

use crate::errors::DedupeError;
use crate::fingerprint::{self, Algorithm};

///A rectangular grid of grayscale samples, row-major. This is the only
///shape the fingerprint functions ever see; decoding and resizing stay on
///this side of the boundary.
pub struct IntensityGrid {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl IntensityGrid {
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[(y * self.width + x) as usize]
    }
}

//Open an image from the given path
//Tries to guess the format if it's not known
fn load_image_from_file(image_path: &Path) -> Result<DynamicImage, DedupeError> {
    let img = match Reader::open(image_path) {
        Ok(image) => image,
        Err(_) => {
            return Err(DedupeError::FileError(format!(
                "Error: Failed to read image file: {}",
                image_path.display()
            )));
        }
    };

    let format_guessed = match img.with_guessed_format() {
        Ok(format_guessed) => format_guessed,
        Err(_) => {
            return Err(DedupeError::DecodeFail(format!(
                "Error: Failed to identify image file format: {}",
                image_path.display()
            )));
        }
    };

    match format_guessed.decode() {
        Ok(decoded_img) => Ok(decoded_img),
        Err(_) => Err(DedupeError::DecodeFail(format!(
            "Error: Failed to correctly decode image: {}",
            image_path.display()
        ))),
    }
}

//Scale down to the algorithm's fixed grid and flatten to grayscale.
//Triangle (bilinear) filtering; the fingerprints only care about coarse
//structure, not resampling quality.
pub fn to_grid(img: &DynamicImage, width: u32, height: u32) -> IntensityGrid {
    let luma = img
        .resize_exact(width, height, FilterType::Triangle)
        .to_luma8();
    IntensityGrid {
        width,
        height,
        data: luma.into_raw(),
    }
}

///Decode one file and reduce it to a fingerprint with the chosen algorithm.
///One failing file reports its own error and never takes the run down.
pub fn fingerprint_file(path: &Path, algo: Algorithm) -> Result<u64, DedupeError> {
    let img = load_image_from_file(path)?;
    let (w, h) = algo.grid_size();
    let grid = to_grid(&img, w, h);
    Ok(fingerprint::compute_fingerprint(algo, &grid))
}

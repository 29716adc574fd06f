use image::{DynamicImage, ImageFormat};

use crate::grib::packing::simple::SimpleDecoderIterator;
use crate::grib::packing::{malformed, SimplePacking};
use crate::grib::RecordError;

/// Template 5.41: the packed integers are the samples of a PNG image, grey
/// for 1 to 16 bits, RGB or RGBA channels concatenated for 24 and 32 bits.
pub(crate) fn decode(
    payload: &[u8],
    packing: &SimplePacking,
    count: usize,
) -> Result<Vec<f64>, RecordError> {
    if packing.num_bits == 0 {
        return Ok(vec![packing.constant(); count]);
    }

    let image = image::load_from_memory_with_format(payload, ImageFormat::Png)
        .map_err(malformed("PNG code stream"))?;

    let samples: Vec<u32> = match (packing.num_bits, image) {
        (bits @ (1 | 2 | 4), DynamicImage::ImageLuma8(img)) => {
            // grey below 8 bits comes out scaled to the full octet
            let scale = 255 / ((1u32 << bits) - 1);
            img.into_raw().into_iter().map(|v| u32::from(v) / scale).collect()
        }
        (8, DynamicImage::ImageLuma8(img)) => img.into_raw().into_iter().map(u32::from).collect(),
        (16, DynamicImage::ImageLuma16(img)) => img.into_raw().into_iter().map(u32::from).collect(),
        (24, DynamicImage::ImageRgb8(img)) => pack_channels(&img.into_raw(), 3),
        (32, DynamicImage::ImageRgba8(img)) => pack_channels(&img.into_raw(), 4),
        (bits, image) => {
            return Err(RecordError::UnsupportedTemplate {
                section: 5,
                template: 41,
                reason: format!("{} bit values in a {:?} PNG", bits, image.color()),
            })
        }
    };

    if samples.len() < count {
        return Err(RecordError::MalformedPacking(format!(
            "PNG image holds {} samples, {} expected",
            samples.len(),
            count
        )));
    }

    Ok(SimpleDecoderIterator::new(samples.into_iter().take(count), packing).collect())
}

fn pack_channels(raw: &[u8], channels: usize) -> Vec<u32> {
    raw.chunks_exact(channels)
        .map(|px| px.iter().fold(0u32, |acc, &c| (acc << 8) | c as u32))
        .collect()
}

use crate::grib::packing::simple::SimpleDecoderIterator;
use crate::grib::packing::SimplePacking;
use crate::grib::RecordError;

/// JPEG 2000 code stream decoder supplied by the caller for template 5.40.
pub trait Jpeg2000Codec: Send + Sync {
    /// Decodes `codestream` into its raw integer samples, in data order.
    fn decode(&self, codestream: &[u8], num_values: usize) -> Result<Vec<u32>, RecordError>;
}

pub(crate) fn decode(
    codestream: &[u8],
    packing: &SimplePacking,
    count: usize,
    codec: Option<&dyn Jpeg2000Codec>,
) -> Result<Vec<f64>, RecordError> {
    if packing.num_bits == 0 {
        return Ok(vec![packing.constant(); count]);
    }

    let codec = codec.ok_or_else(|| RecordError::UnsupportedTemplate {
        section: 5,
        template: 40,
        reason: String::from("no JPEG 2000 codec configured"),
    })?;

    let samples = codec.decode(codestream, count)?;
    if samples.len() != count {
        return Err(RecordError::MalformedPacking(format!(
            "JPEG 2000 code stream holds {} samples, {} expected",
            samples.len(),
            count
        )));
    }

    Ok(SimpleDecoderIterator::new(samples.into_iter(), packing).collect())
}

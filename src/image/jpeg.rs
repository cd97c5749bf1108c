use anyhow::bail;
use image::ImageBuffer;
use zune_jpeg::zune_core::{colorspace::ColorSpace, options::DecoderOptions};

use crate::config::{self, JpegBackend};

use super::Image;

pub(super) fn decode_jpeg(data: &[u8]) -> anyhow::Result<Image> {
    let buf = match config::jpeg_backend() {
        JpegBackend::JpegDecoder => {
            image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)?.to_rgba8()
        }
        JpegBackend::ZuneJpeg => {
            let mut decomp = zune_jpeg::JpegDecoder::new_with_options(
                DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::RGBA),
                data,
            );
            decomp.decode_headers()?;
            match decomp.get_output_colorspace() {
                Some(ColorSpace::RGBA) => {}
                other => bail!("unsupported colorspace {other:?} (expected RGBA)"),
            }

            let (Some(size), Some((width, height))) =
                (decomp.output_buffer_size(), decomp.dimensions())
            else {
                bail!("JPEG decoder did not report the image size");
            };
            let mut buf = vec![0; size];
            decomp.decode_into(&mut buf)?;
            match ImageBuffer::from_raw(width.into(), height.into(), buf) {
                Some(buf) => buf,
                None => bail!("decoded JPEG does not match its reported size {width}x{height}"),
            }
        }
    };

    Ok(Image { buf })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_is_an_error() {
        assert!(decode_jpeg(&[]).is_err());
        assert!(decode_jpeg(b"definitely not a jpeg").is_err());
    }
}

//! Default texture converter writing uncompressed KTX 1.1 files.

use bytemuck::{Pod, Zeroable};
use image::imageops::FilterType;

use oven_core::profile_function;

use crate::converter::{ConversionRequest, TextureConverter};
use crate::error::TextureError;

const KTX_IDENTIFIER: [u8; 12] = [
    0xAB, 0x4B, 0x54, 0x58, 0x20, 0x31, 0x31, 0xBB, 0x0D, 0x0A, 0x1A, 0x0A,
];
const KTX_ENDIANNESS: u32 = 0x0403_0201;

const GL_UNSIGNED_BYTE: u32 = 0x1401;
const GL_RED: u32 = 0x1903;
const GL_RGBA: u32 = 0x1908;
const GL_R8: u32 = 0x8229;
const GL_RGBA8: u32 = 0x8058;

/// KTX 1.1 header following the file identifier.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct KtxHeader {
    endianness: u32,
    gl_type: u32,
    gl_type_size: u32,
    gl_format: u32,
    gl_internal_format: u32,
    gl_base_internal_format: u32,
    pixel_width: u32,
    pixel_height: u32,
    pixel_depth: u32,
    number_of_array_elements: u32,
    number_of_faces: u32,
    number_of_mipmap_levels: u32,
    bytes_of_key_value_data: u32,
}

/// One mip level of tightly packed pixels.
struct MipLevel {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

/// Converts any image the `image` crate can decode into an RGBA8 (or R8 for
/// single-channel usages) KTX file, optionally with a full mip chain.
#[derive(Debug, Clone, Copy)]
pub struct KtxTextureConverter {
    mip_levels: bool,
}

impl KtxTextureConverter {
    /// Create a converter; `mip_levels` enables mip chain generation.
    pub fn new(mip_levels: bool) -> Self {
        Self { mip_levels }
    }
}

impl Default for KtxTextureConverter {
    fn default() -> Self {
        Self::new(true)
    }
}

fn build_mips<P>(
    base: image::ImageBuffer<P, Vec<u8>>,
    with_mips: bool,
    request: &ConversionRequest<'_>,
) -> Result<Vec<MipLevel>, TextureError>
where
    P: image::Pixel<Subpixel = u8> + 'static,
{
    let mut levels = Vec::new();
    let (mut width, mut height) = base.dimensions();
    let mut current = base;
    loop {
        request.cancel.checkpoint()?;
        let next_size = ((width / 2).max(1), (height / 2).max(1));
        let done = !with_mips || (width == 1 && height == 1);
        let next = (!done).then(|| {
            image::imageops::resize(&current, next_size.0, next_size.1, FilterType::Triangle)
        });
        levels.push(MipLevel {
            width,
            height,
            pixels: current.into_raw(),
        });
        match next {
            Some(image) => {
                current = image;
                (width, height) = next_size;
            }
            None => break,
        }
    }
    Ok(levels)
}

fn write_ktx(levels: &[MipLevel], channels: u32, grayscale: bool) -> Result<Vec<u8>, TextureError> {
    let Some(base) = levels.first() else {
        return Err(TextureError::Encode("no mip levels".into()));
    };
    let (format, internal_format) = if grayscale {
        (GL_RED, GL_R8)
    } else {
        (GL_RGBA, GL_RGBA8)
    };
    let header = KtxHeader {
        endianness: KTX_ENDIANNESS,
        gl_type: GL_UNSIGNED_BYTE,
        gl_type_size: 1,
        gl_format: format,
        gl_internal_format: internal_format,
        gl_base_internal_format: format,
        pixel_width: base.width,
        pixel_height: base.height,
        pixel_depth: 0,
        number_of_array_elements: 0,
        number_of_faces: 1,
        number_of_mipmap_levels: levels.len() as u32,
        bytes_of_key_value_data: 0,
    };

    let mut out = Vec::new();
    out.extend_from_slice(&KTX_IDENTIFIER);
    out.extend_from_slice(bytemuck::bytes_of(&header));

    for level in levels {
        let row_bytes = (level.width * channels) as usize;
        let padded_row = row_bytes.next_multiple_of(4);
        let image_size = u32::try_from(padded_row * level.height as usize)
            .map_err(|_| TextureError::Encode("mip level too large".into()))?;
        out.extend_from_slice(&image_size.to_ne_bytes());
        for row in level.pixels.chunks_exact(row_bytes) {
            out.extend_from_slice(row);
            out.resize(out.len() + padded_row - row_bytes, 0);
        }
    }
    Ok(out)
}

impl TextureConverter for KtxTextureConverter {
    fn convert(&self, request: ConversionRequest<'_>) -> Result<Vec<u8>, TextureError> {
        profile_function!();
        request.cancel.checkpoint()?;

        let image = image::load_from_memory(request.source)?;
        if image.width() == 0 || image.height() == 0 {
            return Err(TextureError::Encode(format!("{} has no pixels", request.url)));
        }

        let grayscale = request.usage.is_grayscale();
        let levels = if grayscale {
            build_mips(image.to_luma8(), self.mip_levels, &request)?
        } else {
            build_mips(image.to_rgba8(), self.mip_levels, &request)?
        };
        log::debug!(
            "Converted {} to {}x{} with {} mip levels",
            request.url,
            image.width(),
            image.height(),
            levels.len()
        );
        write_ktx(&levels, if grayscale { 1 } else { 4 }, grayscale)
    }
}

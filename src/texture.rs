use std::{fs, path::{Path, PathBuf}};

#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("unable to open {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unable to decode {path:?}: {source}")]
    Decode {
        path: PathBuf,
        source: png::DecodingError,
    },
    #[error("{path:?} has unsupported pixel layout {color_type:?}/{bit_depth:?}")]
    Layout {
        path: PathBuf,
        color_type: png::ColorType,
        bit_depth: png::BitDepth,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

/// Decoded RGBA8 pixels of a 2D texture.
#[derive(Debug)]
pub struct Texture {
    pub name: String,
    pub extent: Extent,
    pub pixels: Vec<u8>,
}

impl Texture {
    #[cfg(test)]
    pub(crate) fn texel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = 4 * (y as usize * self.extent.width as usize + x as usize);
        let mut texel = [0; 4];
        texel.copy_from_slice(&self.pixels[offset..offset + 4]);
        texel
    }

    pub fn load_png(path: &Path) -> Result<Self, TextureError> {
        profiling::scope!("Decode PNG");
        let file = fs::File::open(path).map_err(|source| TextureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let decode_error = |source| TextureError::Decode {
            path: path.to_path_buf(),
            source,
        };
        let mut decoder = png::Decoder::new(file);
        decoder.set_transformations(png::Transformations::EXPAND);
        let mut reader = decoder.read_info().map_err(decode_error)?;
        let mut buf = vec![0u8; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).map_err(decode_error)?;
        let bytes = &buf[..info.buffer_size()];

        if info.bit_depth != png::BitDepth::Eight {
            return Err(TextureError::Layout {
                path: path.to_path_buf(),
                color_type: info.color_type,
                bit_depth: info.bit_depth,
            });
        }
        let pixels = match info.color_type {
            png::ColorType::Rgba => bytes.to_vec(),
            png::ColorType::Rgb => bytes
                .chunks_exact(3)
                .flat_map(|c| [c[0], c[1], c[2], 0xFF])
                .collect(),
            png::ColorType::GrayscaleAlpha => bytes
                .chunks_exact(2)
                .flat_map(|c| [c[0], c[0], c[0], c[1]])
                .collect(),
            png::ColorType::Grayscale => bytes.iter().flat_map(|&g| [g, g, g, 0xFF]).collect(),
            png::ColorType::Indexed => {
                return Err(TextureError::Layout {
                    path: path.to_path_buf(),
                    color_type: info.color_type,
                    bit_depth: info.bit_depth,
                })
            }
        };

        log::info!(
            "Loaded texture {:?}: {}x{}",
            path,
            info.width,
            info.height
        );
        Ok(Self {
            name: path
                .file_stem()
                .map_or_else(String::new, |stem| stem.to_string_lossy().into_owned()),
            extent: Extent {
                width: info.width,
                height: info.height,
            },
            pixels,
        })
    }
}

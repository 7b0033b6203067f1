use std::path::{Path, PathBuf};
use std::process::Command;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, Stream};
use tracing::debug;

use crate::error::ExtractError;
use crate::geometry::BBox;
use crate::model::{Page, XObjectKind, XObjectRef};
use crate::options::{ExtractOptions, RenderBackend};

const POINTS_PER_INCH: f64 = 72.0;

/// One image region to turn into pixels.
#[derive(Debug, Clone, Copy)]
pub struct RasterRequest<'a> {
    pub document: &'a Document,
    pub path: &'a Path,
    pub page: &'a Page,
    pub bbox: BBox,
    pub xobject: &'a XObjectRef,
}

/// Produces a bitmap for an image element. `Ok(None)` means the backend cannot
/// handle this element and another one may be tried.
pub trait Rasterizer {
    fn rasterize(&self, request: &RasterRequest<'_>) -> Result<Option<DynamicImage>, ExtractError>;
}

/// Decodes image XObjects straight from the PDF stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedImageRasterizer;

fn filter_names(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

fn dimension(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    dict.get(key)
        .ok()
        .and_then(|value| value.as_i64().ok())
        .and_then(|value| u32::try_from(value).ok())
        .filter(|value| *value > 0)
}

/// Number of colour components, following one level of `ICCBased` indirection.
fn color_components(document: &Document, dict: &Dictionary) -> Option<usize> {
    let color_space = match dict.get(b"ColorSpace").ok()? {
        Object::Reference(id) => document.get_object(*id).ok()?,
        other => other,
    };

    match color_space {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Some(1),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Some(3),
            b"DeviceCMYK" | b"CMYK" => Some(4),
            _ => None,
        },
        Object::Array(items) => {
            let family = items.first()?.as_name().ok()?;
            if family != b"ICCBased" {
                return None;
            }
            let profile = match items.get(1)? {
                Object::Reference(id) => document.get_object(*id).ok()?,
                other => other,
            };
            let n = profile.as_stream().ok()?.dict.get(b"N").ok()?.as_i64().ok()?;
            usize::try_from(n).ok()
        }
        _ => None,
    }
}

fn cmyk_to_rgb(samples: &[u8]) -> Vec<u8> {
    samples
        .chunks_exact(4)
        .flat_map(|pixel| {
            let k = 255 - u16::from(pixel[3]);
            pixel[..3].iter().map(move |&channel| {
                u8::try_from((255 - u16::from(channel)) * k / 255).unwrap_or(0)
            })
        })
        .collect()
}

fn expand_one_bit(samples: &[u8], width: u32, height: u32) -> Vec<u8> {
    let row_bytes = width.div_ceil(8) as usize;
    let mut out = Vec::with_capacity(width as usize * height as usize);
    for row in samples.chunks(row_bytes).take(height as usize) {
        for x in 0..width as usize {
            let bit = row.get(x / 8).map_or(0, |byte| (byte >> (7 - x % 8)) & 1);
            out.push(if bit == 1 { 255 } else { 0 });
        }
    }
    out
}

fn decode_raw(document: &Document, stream: &Stream) -> Result<Option<DynamicImage>, ExtractError> {
    let dict = &stream.dict;
    let (Some(width), Some(height)) = (dimension(dict, b"Width"), dimension(dict, b"Height")) else {
        return Ok(None);
    };
    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|value| value.as_i64().ok())
        .unwrap_or(8);
    let is_mask = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));

    let samples = if dict.has(b"Filter") {
        stream
            .decompressed_content()
            .map_err(|err| ExtractError::Render(format!("cannot decompress image: {err}")))?
    } else {
        stream.content.clone()
    };

    if bits == 1 || is_mask {
        let gray = expand_one_bit(&samples, width, height);
        return Ok(GrayImage::from_raw(width, height, gray).map(DynamicImage::ImageLuma8));
    }
    if bits != 8 {
        return Ok(None);
    }

    let image = match color_components(document, dict) {
        Some(1) => GrayImage::from_raw(width, height, samples).map(DynamicImage::ImageLuma8),
        Some(3) => RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8),
        Some(4) => {
            RgbImage::from_raw(width, height, cmyk_to_rgb(&samples)).map(DynamicImage::ImageRgb8)
        }
        _ => None,
    };
    Ok(image)
}

impl Rasterizer for EmbeddedImageRasterizer {
    fn rasterize(&self, request: &RasterRequest<'_>) -> Result<Option<DynamicImage>, ExtractError> {
        if request.xobject.kind != XObjectKind::Image {
            return Ok(None);
        }
        let Some(id) = request.xobject.id else {
            return Ok(None);
        };
        let Ok(stream) = request
            .document
            .get_object(id)
            .and_then(Object::as_stream)
        else {
            return Ok(None);
        };

        let filters = filter_names(&stream.dict);
        match filters.last().map(Vec::as_slice) {
            Some(b"DCTDecode") if filters.len() == 1 => {
                let image =
                    image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)?;
                Ok(Some(image))
            }
            None | Some(b"FlateDecode" | b"LZWDecode" | b"ASCIIHexDecode" | b"ASCII85Decode") => {
                decode_raw(request.document, stream)
            }
            Some(other) => {
                debug!(
                    filter = %String::from_utf8_lossy(other),
                    "embedded image filter not decodable in memory"
                );
                Ok(None)
            }
        }
    }
}

/// Crop-renders the element's region with poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    command: PathBuf,
    dpi: u32,
}

impl PdftoppmRasterizer {
    #[must_use]
    pub fn new(command: impl Into<PathBuf>, dpi: u32) -> Self {
        Self {
            command: command.into(),
            dpi,
        }
    }

    /// Pixel rectangle `(x, y, width, height)` of `bbox` in a render of the
    /// page at this DPI, top-left origin.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn crop_window(&self, page: &BBox, bbox: &BBox) -> Option<(u32, u32, u32, u32)> {
        let scale = f64::from(self.dpi) / POINTS_PER_INCH;
        let x0 = bbox.x0.max(page.x0);
        let x1 = bbox.x1.min(page.x1);
        let y0 = bbox.y0.max(page.y0);
        let y1 = bbox.y1.min(page.y1);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        let to_pixels = |value: f64| {
            let pixels = (value * scale).round();
            if pixels.is_finite() && pixels >= 0.0 && pixels <= f64::from(u32::MAX) {
                Some(pixels as u32)
            } else {
                None
            }
        };

        let x = to_pixels(x0 - page.x0)?;
        let y = to_pixels(page.y1 - y1)?;
        let width = to_pixels(x1 - x0)?.max(1);
        let height = to_pixels(y1 - y0)?.max(1);
        Some((x, y, width, height))
    }
}

impl Rasterizer for PdftoppmRasterizer {
    fn rasterize(&self, request: &RasterRequest<'_>) -> Result<Option<DynamicImage>, ExtractError> {
        let Some((x, y, width, height)) = self.crop_window(&request.page.media_box, &request.bbox)
        else {
            return Ok(None);
        };

        let workdir = tempfile::tempdir()?;
        let prefix = workdir.path().join("crop");
        let page = request.page.page_number.to_string();
        let output = Command::new(&self.command)
            .arg("-f")
            .arg(&page)
            .arg("-l")
            .arg(&page)
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-x")
            .arg(x.to_string())
            .arg("-y")
            .arg(y.to_string())
            .arg("-W")
            .arg(width.to_string())
            .arg("-H")
            .arg(height.to_string())
            .arg("-png")
            .arg("-singlefile")
            .arg(request.path)
            .arg(&prefix)
            .output()
            .map_err(|err| {
                ExtractError::Render(format!("failed to run {}: {err}", self.command.display()))
            })?;

        if !output.status.success() {
            return Err(ExtractError::Render(format!(
                "{} exited with {}: {}",
                self.command.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let image = image::open(prefix.with_extension("png"))?;
        Ok(Some(image))
    }
}

/// Tries each backend in turn and returns the first bitmap produced.
pub struct RasterChain {
    backends: Vec<Box<dyn Rasterizer>>,
}

impl RasterChain {
    #[must_use]
    pub fn new(backends: Vec<Box<dyn Rasterizer>>) -> Self {
        Self { backends }
    }

    #[must_use]
    pub fn from_options(options: &ExtractOptions) -> Self {
        let embedded = || Box::new(EmbeddedImageRasterizer) as Box<dyn Rasterizer>;
        let pdftoppm = || {
            Box::new(PdftoppmRasterizer::new(&options.pdftoppm_cmd, options.dpi))
                as Box<dyn Rasterizer>
        };

        let backends = match options.render_backend {
            RenderBackend::Auto => vec![embedded(), pdftoppm()],
            RenderBackend::Embedded => vec![embedded()],
            RenderBackend::Pdftoppm => vec![pdftoppm()],
        };
        Self::new(backends)
    }
}

impl Rasterizer for RasterChain {
    fn rasterize(&self, request: &RasterRequest<'_>) -> Result<Option<DynamicImage>, ExtractError> {
        let mut last_error = None;
        for backend in &self.backends {
            match backend.rasterize(request) {
                Ok(Some(image)) => return Ok(Some(image)),
                Ok(None) => {}
                Err(err) => {
                    debug!(error = %err, "raster backend failed, trying next");
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }
}

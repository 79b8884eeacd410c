//! PDF text layer and page images using lopdf and pdf-extract.

use image::{DynamicImage, ImageBuffer, Rgba};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, trace};

use super::SelectableTextExtractor;
use crate::error::{PdfError, Result};

/// Stateless PDF reader; every call parses the bytes it is given.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

/// A parsed document plus the bytes pdf-extract should read.
struct LoadedPdf {
    document: Document,
    /// Decrypted copy when the input used an empty password.
    data: Vec<u8>,
}

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }

    fn load(&self, data: &[u8]) -> std::result::Result<LoadedPdf, PdfError> {
        let mut document = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        let data = if document.is_encrypted() {
            if document.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            let mut decrypted = Vec::new();
            document
                .save_to(&mut decrypted)
                .map_err(|e| PdfError::Parse(format!("failed to save decrypted PDF: {}", e)))?;
            decrypted
        } else {
            data.to_vec()
        };

        if document.get_pages().is_empty() {
            return Err(PdfError::NoPages);
        }

        Ok(LoadedPdf { document, data })
    }

    /// Images drawn on one page, from its XObject resources.
    fn page_xobject_images(&self, doc: &Document, page_id: ObjectId) -> Vec<DynamicImage> {
        let mut images = Vec::new();
        let Some(resources) = page_resources(doc, page_id) else {
            return images;
        };
        let Ok(xobjects) = resources.get(b"XObject") else {
            return images;
        };
        if let Ok((_, Object::Dictionary(xobj_dict))) = doc.dereference(xobjects) {
            for (_name, obj_ref) in xobj_dict.iter() {
                if let Ok((_, obj)) = doc.dereference(obj_ref) {
                    if let Some(img) = image_from_object(doc, obj) {
                        images.push(img);
                    }
                }
            }
        }
        images
    }

    /// Every decodable image object in the document.
    fn all_images(&self, doc: &Document) -> Vec<DynamicImage> {
        let images: Vec<DynamicImage> = doc
            .objects
            .values()
            .filter_map(|object| image_from_object(doc, object))
            .collect();
        debug!("Found {} images in document", images.len());
        images
    }
}

impl SelectableTextExtractor for PdfExtractor {
    fn extract_text(&self, data: &[u8]) -> Result<String> {
        let pdf = self.load(data)?;
        let text = pdf_extract::extract_text_from_mem(&pdf.data)
            .map_err(|e| PdfError::TextExtraction(e.to_string()))?;
        debug!(
            "Text layer: {} chars over {} pages",
            text.len(),
            pdf.document.get_pages().len()
        );
        Ok(text)
    }

    fn page_images(&self, data: &[u8], max_pages: usize) -> Result<Vec<DynamicImage>> {
        let pdf = self.load(data)?;
        let doc = &pdf.document;
        let pages = doc.get_pages();
        let limit = if max_pages == 0 { pages.len() } else { max_pages.min(pages.len()) };

        let mut images = Vec::new();
        for (number, page_id) in pages.iter().take(limit) {
            let page = self.page_xobject_images(doc, *page_id);
            trace!("Page {}: {} images", number, page.len());
            images.extend(page);
        }

        // Some scanners write images outside the page resources.
        if images.is_empty() {
            debug!("No XObject images on pages, scanning all objects");
            images = self.all_images(doc);
            images.truncate(limit);
        }

        if images.is_empty() {
            return Err(PdfError::ImageExtraction("no images found in PDF".to_string()).into());
        }
        Ok(images)
    }
}

/// Resources of a page, following `Parent` inheritance.
fn page_resources(doc: &Document, node_id: ObjectId) -> Option<Dictionary> {
    let Ok(Object::Dictionary(dict)) = doc.get_object(node_id) else {
        return None;
    };

    if let Ok(resources) = dict.get(b"Resources") {
        if let Ok((_, Object::Dictionary(res_dict))) = doc.dereference(resources) {
            return Some(res_dict.clone());
        }
    }

    match dict.get(b"Parent") {
        Ok(Object::Reference(parent_id)) => page_resources(doc, *parent_id),
        _ => None,
    }
}

fn image_from_object(doc: &Document, obj: &Object) -> Option<DynamicImage> {
    let Object::Stream(stream) = obj else {
        return None;
    };
    let dict = &stream.dict;

    if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
        return None;
    }

    let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
    let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;
    trace!("Found image object: {}x{}", width, height);

    if let Ok(filter) = dict.get(b"Filter") {
        let filter_name = match filter {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            _ => None,
        };

        match filter_name {
            Some(b"DCTDecode") => {
                return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg).ok();
            }
            Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                trace!("Unsupported image filter");
                return None;
            }
            _ => {}
        }
    }

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| match o {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
            _ => None,
        })
        .unwrap_or(b"DeviceRGB");

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);

    if bits != 8 {
        trace!("Unsupported bits per component: {}", bits);
        return None;
    }

    image_from_raw(&data, width, height, color_space)
}

/// Expand 8-bit RGB or gray samples to RGBA.
fn image_from_raw(data: &[u8], width: u32, height: u32, color_space: &[u8]) -> Option<DynamicImage> {
    let pixels = (width as usize).checked_mul(height as usize)?;

    let rgba: Vec<u8> = match color_space {
        b"DeviceRGB" | b"RGB" if data.len() >= pixels * 3 => data[..pixels * 3]
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        b"DeviceGray" | b"G" if data.len() >= pixels => data[..pixels]
            .iter()
            .flat_map(|&g| [g, g, g, 255])
            .collect(),
        _ => {
            trace!("Could not decode raw image: {} bytes for {} pixels", data.len(), pixels);
            return None;
        }
    };

    ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba).map(DynamicImage::ImageRgba8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CuponError;

    #[test]
    fn test_garbage_is_parse_error() {
        let err = PdfExtractor::new().extract_text(b"not a pdf").unwrap_err();
        assert!(matches!(err, CuponError::Pdf(PdfError::Parse(_))));
    }

    #[test]
    fn test_raw_gray_image() {
        let img = image_from_raw(&[0, 128, 255, 64], 2, 2, b"DeviceGray").unwrap();
        assert_eq!(img.width(), 2);
        assert_eq!(img.to_rgba8().get_pixel(1, 0).0, [128, 128, 128, 255]);
    }

    #[test]
    fn test_raw_image_too_short() {
        assert!(image_from_raw(&[1, 2, 3], 2, 2, b"DeviceRGB").is_none());
        assert!(image_from_raw(&[1, 2, 3, 4], 2, 2, b"Indexed").is_none());
    }
}

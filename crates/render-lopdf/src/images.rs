//! Raster images as PDF image XObjects.

use image::{ColorType, DynamicImage, ImageFormat};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use quire_render_core::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageXObject {
    pub id: ObjectId,
    pub width: u32,
    pub height: u32,
}

fn image_error(err: image::ImageError) -> RenderError {
    RenderError::Image(err.to_string())
}

/// Embeds encoded image bytes into `doc`. Baseline JPEG data is passed
/// through with `DCTDecode`; everything else is stored as raw RGB with an
/// optional soft mask for the alpha channel.
pub fn embed_image(doc: &mut Document, data: &[u8]) -> Result<ImageXObject, RenderError> {
    let format = image::guess_format(data).map_err(image_error)?;
    let decoded = image::load_from_memory_with_format(data, format).map_err(image_error)?;
    let (width, height) = (decoded.width(), decoded.height());
    if width == 0 || height == 0 {
        return Err(RenderError::Image("image has no pixels".to_string()));
    }

    let stream = match (format, decoded.color()) {
        (ImageFormat::Jpeg, ColorType::L8) => jpeg_stream(data, width, height, "DeviceGray"),
        (ImageFormat::Jpeg, ColorType::Rgb8) => jpeg_stream(data, width, height, "DeviceRGB"),
        _ => raw_stream(doc, &decoded),
    };
    let id = doc.add_object(stream);
    log::debug!("Embedded {:?} image {}x{} as {:?}", format, width, height, id);
    Ok(ImageXObject { id, width, height })
}

fn jpeg_stream(data: &[u8], width: u32, height: u32, color_space: &str) -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        data.to_vec(),
    )
}

fn raw_stream(doc: &mut Document, decoded: &DynamicImage) -> Stream {
    let (width, height) = (decoded.width() as i64, decoded.height() as i64);
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width,
        "Height" => height,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };
    if decoded.color().has_alpha() {
        let alpha: Vec<u8> = decoded.to_rgba8().pixels().map(|p| p[3]).collect();
        let mask = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha,
        );
        let mask_id = doc.add_object(mask);
        dict.set("SMask", Object::Reference(mask_id));
    }
    Stream::new(dict, decoded.to_rgb8().into_raw())
}

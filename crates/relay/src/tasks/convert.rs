use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use std::time::Duration;
use uuid::Uuid;

use crate::classify::{self, ErrorKind};
use crate::intent::{ImageSource, TargetFormat};

/// Result of a transcode attempt. `Unsupported` is a sentinel, not a
/// failure: the caller passes the original bytes through unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Transcoded {
    Converted(Vec<u8>),
    Unsupported,
}

#[cfg(feature = "codec")]
pub fn transcode(bytes: &[u8], format: TargetFormat) -> Transcoded {
    use std::io::Cursor;

    let decoded = match image::load_from_memory(bytes) {
        Ok(decoded) => decoded,
        Err(_) => return Transcoded::Unsupported,
    };

    let mut cursor = Cursor::new(Vec::new());
    let written = match format {
        TargetFormat::Png => decoded.write_to(&mut cursor, image::ImageFormat::Png),
        // the jpeg encoder rejects alpha channels
        TargetFormat::Jpeg => image::DynamicImage::ImageRgb8(decoded.to_rgb8())
            .write_to(&mut cursor, image::ImageOutputFormat::Jpeg(90)),
        TargetFormat::Webp => decoded.write_to(&mut cursor, image::ImageFormat::WebP),
    };

    match written {
        Ok(()) => Transcoded::Converted(cursor.into_inner()),
        Err(_) => Transcoded::Unsupported,
    }
}

#[cfg(not(feature = "codec"))]
pub fn transcode(_bytes: &[u8], _format: TargetFormat) -> Transcoded {
    Transcoded::Unsupported
}

async fn source_bytes(source: &ImageSource) -> Result<Vec<u8>, String> {
    let url = source
        .url()
        .ok_or_else(|| "the attachment has no readable contents".to_string())?;

    if let Some(rest) = url.strip_prefix("data:") {
        let (_, payload) = rest
            .split_once(";base64,")
            .ok_or_else(|| "unrecognized inline data encoding".to_string())?;
        return STANDARD.decode(payload).map_err(|e| e.to_string());
    }

    let client = Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| e.to_string())?;
    let response = client.get(&url).send().await.map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("failed to fetch image: status {}", response.status()));
    }
    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| e.to_string())
}

/// Re-encode the source image to the requested format. When no codec is
/// available (or the bytes defeat it) the original bytes are embedded
/// unchanged, still under a filename carrying the requested extension.
pub async fn convert(source: &ImageSource, format: TargetFormat) -> String {
    let original = match source_bytes(source).await {
        Ok(bytes) => bytes,
        Err(raw) => return classify::render(ErrorKind::ImageFormat, Some(&raw), None),
    };

    let output = match transcode(&original, format) {
        Transcoded::Converted(bytes) => bytes,
        Transcoded::Unsupported => original,
    };

    let filename = format!("converted-image-{}.{}", Uuid::new_v4(), format.extension());
    let encoded = STANDARD.encode(&output);

    format!(
        "**Image converted to {}.**\n\nHere's your converted image:\n\n\
![{}](data:{};base64,{})\n\n**Filename:** {}\n\n\
*Hover over the image to download, or right-click to save.*",
        format.label(),
        filename,
        format.mime(),
        encoded,
        filename
    )
}

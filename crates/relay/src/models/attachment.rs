use serde::{Deserialize, Serialize};

/// A file the caller attached to the current turn. Read-only once the
/// request has been classified; the provider adapters encode it per wire
/// format without mutating it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type", alias = "mimeType")]
    pub mime_type: Option<String>,
    /// Inline payload: either a full data URL or bare base64.
    #[serde(default)]
    pub data: Option<String>,
    /// Remote reference, used when the interface uploaded the file elsewhere.
    #[serde(default)]
    pub url: Option<String>,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.mime_type
            .as_deref()
            .map(|m| m.starts_with("image/"))
            .unwrap_or(false)
    }

    /// A URL-shaped reference to the attachment contents, preferring inline
    /// data over a remote link. Bare base64 payloads are wrapped into a data
    /// URL using the declared mime type.
    pub fn source_url(&self) -> Option<String> {
        if let Some(data) = &self.data {
            if data.starts_with("data:") {
                return Some(data.clone());
            }
            let mime = self.mime_type.as_deref().unwrap_or("image/png");
            return Some(format!("data:{};base64,{}", mime, data));
        }
        self.url.clone()
    }

    /// The inline payload split into (media type, base64 data), when present.
    pub fn inline_parts(&self) -> Option<(String, String)> {
        let data = self.data.as_deref()?;
        if let Some(rest) = data.strip_prefix("data:") {
            let (mime, payload) = rest.split_once(";base64,")?;
            return Some((mime.to_string(), payload.to_string()));
        }
        let mime = self.mime_type.clone().unwrap_or_else(|| "image/png".to_string());
        Some((mime, data.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_url_prefers_inline_data() {
        let attachment = Attachment {
            name: Some("photo.png".to_string()),
            mime_type: Some("image/png".to_string()),
            data: Some("iVBORw0KGgo=".to_string()),
            url: Some("https://files.example.com/photo.png".to_string()),
        };
        assert_eq!(
            attachment.source_url().unwrap(),
            "data:image/png;base64,iVBORw0KGgo="
        );
    }

    #[test]
    fn test_inline_parts_from_data_url() {
        let attachment = Attachment {
            data: Some("data:image/jpeg;base64,AAAA".to_string()),
            ..Default::default()
        };
        let (mime, payload) = attachment.inline_parts().unwrap();
        assert_eq!(mime, "image/jpeg");
        assert_eq!(payload, "AAAA");
    }

    #[test]
    fn test_is_image() {
        let attachment = Attachment {
            mime_type: Some("image/webp".to_string()),
            ..Default::default()
        };
        assert!(attachment.is_image());

        let attachment = Attachment {
            mime_type: Some("text/plain".to_string()),
            ..Default::default()
        };
        assert!(!attachment.is_image());
    }
}

//! Heuristic intent detection over the raw message text.
//!
//! The matchers are an explicit prioritized list so precedence stays
//! documented and testable: format conversion (needs a source image), then
//! file operations, then image editing (needs a source image), then image
//! generation. Anything else, or a matched intent whose precondition is not
//! met, falls through to the plain chat path.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::attachment::Attachment;
use crate::models::message::Message;
use crate::models::role::Role;

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    ConvertImage {
        format: TargetFormat,
        source: ImageSource,
    },
    FileOp(FileRequest),
    EditImage {
        source: ImageSource,
    },
    GenerateImage,
    Chat,
}

/// Where the source image for an edit/convert comes from: an attachment on
/// this turn, or an image reference recovered from conversation history.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    Attachment(Attachment),
    History(String),
}

impl ImageSource {
    pub fn url(&self) -> Option<String> {
        match self {
            ImageSource::Attachment(attachment) => attachment.source_url(),
            ImageSource::History(url) => Some(url.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Png,
    Jpeg,
    Webp,
}

impl TargetFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Png => "png",
            TargetFormat::Jpeg => "jpg",
            TargetFormat::Webp => "webp",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            TargetFormat::Png => "image/png",
            TargetFormat::Jpeg => "image/jpeg",
            TargetFormat::Webp => "image/webp",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TargetFormat::Png => "PNG",
            TargetFormat::Jpeg => "JPG",
            TargetFormat::Webp => "WEBP",
        }
    }

    fn parse(token: &str) -> Option<Self> {
        match token.to_lowercase().as_str() {
            "png" => Some(TargetFormat::Png),
            "jpg" | "jpeg" => Some(TargetFormat::Jpeg),
            "webp" => Some(TargetFormat::Webp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    Create,
    Read,
    List,
    Delete,
    Append,
    ExtractText,
    ConvertText,
    Download,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileRequest {
    pub op: FileOp,
    pub filename: Option<String>,
    pub content: Option<String>,
}

lazy_static! {
    static ref GENERATE_PATTERNS: Vec<Regex> = compile(&[
        r"(?i)create\s+(an?\s+)?image",
        r"(?i)generate\s+(an?\s+)?image",
        r"(?i)make\s+(an?\s+)?image",
        r"(?i)draw\s+(an?\s+)?",
        r"(?i)create\s+(an?\s+)?picture",
        r"(?i)generate\s+(an?\s+)?picture",
        r"(?i)make\s+(an?\s+)?picture",
        r"(?i)create\s+(an?\s+)?photo",
        r"(?i)generate\s+(an?\s+)?photo",
        r"(?i)create\s+art(work)?",
        r"(?i)generate\s+art(work)?",
        r"(?i)design\s+(an?\s+)?image",
        r"(?i)visualize",
        r"(?i)illustration\s+of",
        r"(?i)image\s+(create|generate|make)",
        r"(?i)picture\s+(create|generate|make)",
        r"(?i)(create|make|generate)\s+.{1,50}\s+(image|picture|photo)",
        r"(?i)\b(image|picture|photo)\s+.{1,30}\s*(create|generate|make)",
        r"(?i)\w+\s+image\s+(with|in|of|for|on)",
    ]);
    static ref EDIT_PATTERNS: Vec<Regex> = compile(&[
        r"(?i)edit\s+(this\s+)?(image|photo|picture)",
        r"(?i)change\s+(the\s+)?(background|color|style)",
        r"(?i)modify\s+(this\s+)?(image|photo|picture)",
        r"(?i)remove\s+(the\s+)?(background|object|person|text)",
        r"(?i)add\s+.+\s+to\s+(this\s+)?(image|photo|picture)",
        r"(?i)replace\s+.+\s+(in|on)\s+(this\s+)?(image|photo|picture)",
        r"(?i)make\s+(this|the)\s+(image|photo|picture|it)\s+",
        r"(?i)transform\s+(this\s+)?(image|photo|picture)",
        r"(?i)edit\s+it",
        r"(?i)fix\s+(this\s+)?(image|photo|picture|it)",
        r"(?i)fix\s+(the\s+)?(clarity|quality|blur|blurr?iness|resolution)",
        r"(?i)enhance\s+(this\s+)?(image|photo|picture|it)",
        r"(?i)improve\s+(this\s+)?(image|photo|picture|it)",
        r"(?i)upscale\s+(this\s+)?(image|photo|picture|it)",
        r"(?i)sharpen\s+(this\s+)?(image|photo|picture|it)",
        r"(?i)make\s+(it|this)\s+(clear|clearer|sharper|better)",
        r"(?i)increase\s+(the\s+)?(resolution|quality|clarity)",
        r"(?i)reduce\s+(the\s+)?(blur|noise|grain)",
        r"(?i)clean\s+up\s+(this\s+)?(image|photo|picture|it)",
    ]);
    static ref CONVERT_PATTERNS: Vec<Regex> = compile(&[
        r"(?i)convert\s+(this\s+)?(image|photo|picture|file|it)?\s*(to|into)\s*(png|jpg|jpeg|webp)",
        r"(?i)save\s+(this\s+)?(image|photo|picture|it)?\s*(as|to)\s*(png|jpg|jpeg|webp)",
        r"(?i)(to|into|as)\s*(\.?)(png|jpg|jpeg|webp)\s*(format|file)?",
        r"(?i)change\s+(to|into)\s*(png|jpg|jpeg|webp)",
        r"(?i)make\s+(it\s+)?(a\s+)?(png|jpg|jpeg|webp)",
        r"(?i)(png|jpg|jpeg|webp)\s*(conversion|convert)",
    ]);
    static ref FILE_PATTERNS: Vec<Regex> = compile(&[
        r"(?i)create\s+(a\s+)?(new\s+)?file",
        r"(?i)make\s+(a\s+)?(new\s+)?file",
        r"(?i)save\s+(this\s+)?(as\s+)?(a\s+)?file",
        r"(?i)write\s+(to\s+)?(a\s+)?file",
        r"(?i)create\s+.+\.(txt|py|js|ts|json|md|html|css|csv|xml|yaml|yml)",
        r"(?i)save\s+.+\.(txt|py|js|ts|json|md|html|css|csv|xml|yaml|yml)",
        r"(?i)read\s+(the\s+)?file",
        r"(?i)open\s+(the\s+)?file",
        r"(?i)show\s+(me\s+)?(the\s+)?file",
        r"(?i)what('s| is)\s+in\s+(the\s+)?file",
        r"(?i)list\s+(all\s+)?(my\s+)?files",
        r"(?i)show\s+(all\s+)?(my\s+)?files",
        r"(?i)what\s+files\s+(do\s+i\s+have|exist)",
        r"(?i)delete\s+(the\s+)?file",
        r"(?i)remove\s+(the\s+)?file",
        r"(?i)append\s+to\s+(the\s+)?file",
        r"(?i)add\s+to\s+(the\s+)?file",
        r"(?i)update\s+(the\s+)?file",
        r"(?i)modify\s+(the\s+)?file",
        r"(?i)extract\s+(the\s+)?text",
        r"(?i)convert\s+.+\s+to\s+text",
        r"(?i)download\s+(the\s+)?file",
    ]);
    static ref FORMAT_TOKEN: Regex = Regex::new(r"(?i)\.?(png|jpg|jpeg|webp)\b").unwrap();
    static ref HISTORY_DATA_IMAGE: Regex =
        Regex::new(r"!\[[^\]]*\]\((data:image/[^)]+)\)").unwrap();
    static ref HISTORY_REMOTE_IMAGE: Regex =
        Regex::new(r"!\[[^\]]*\]\((https?://[^)]+)\)").unwrap();
    static ref FILENAME_NAMED: Regex =
        Regex::new(r#"(?i)(?:called|named|as|file:?)\s*["']?([A-Za-z0-9_.-]+\.[A-Za-z0-9]+)["']?"#)
            .unwrap();
    static ref FILENAME_QUOTED: Regex =
        Regex::new(r#"["']([A-Za-z0-9_.-]+\.[A-Za-z0-9]+)["']"#).unwrap();
    static ref FILENAME_BARE: Regex = Regex::new(
        r"(?i)([A-Za-z0-9_-]+\.(txt|py|js|ts|json|md|html|css|csv|xml|yaml|yml|pdf|docx?))"
    )
    .unwrap();
    static ref CONTENT_FENCED: Regex = Regex::new(r"(?s)```[\w]*\n?(.*?)```").unwrap();
    static ref CONTENT_TAIL: Regex =
        Regex::new(r#"(?is)(?:content|containing|with)\s*[:=]\s*["']?(.+?)["']?\s*$"#).unwrap();
    static ref LIST_HINT: Regex = Regex::new(r"list|show|what files").unwrap();
    static ref READ_HINT: Regex = Regex::new(r"read|open|show|view|what('s| is) in").unwrap();
    static ref CREATE_HINT: Regex = Regex::new(r"create|make|save|write|generate").unwrap();
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

fn any_match(patterns: &[Regex], message: &str) -> bool {
    patterns.iter().any(|p| p.is_match(message))
}

/// The most recent image produced earlier in the conversation, found by
/// scanning assistant turns in reverse for inline-data or remote markdown
/// images. Heuristic: with several images in history the newest wins, which
/// is usually but not always the one the user means.
pub fn recent_image_from_history(history: &[Message]) -> Option<String> {
    for message in history.iter().rev() {
        if message.role != Role::Assistant {
            continue;
        }
        let text = message.concat_text();
        if let Some(captures) = HISTORY_DATA_IMAGE.captures(&text) {
            return Some(captures[1].to_string());
        }
        if let Some(captures) = HISTORY_REMOTE_IMAGE.captures(&text) {
            return Some(captures[1].to_string());
        }
    }
    None
}

fn source_image(attachments: &[Attachment], history: &[Message]) -> Option<ImageSource> {
    if let Some(attachment) = attachments.iter().find(|a| a.is_image()) {
        return Some(ImageSource::Attachment(attachment.clone()));
    }
    recent_image_from_history(history).map(ImageSource::History)
}

fn target_format(message: &str) -> TargetFormat {
    FORMAT_TOKEN
        .captures(message)
        .and_then(|c| TargetFormat::parse(&c[1]))
        .unwrap_or(TargetFormat::Png)
}

pub fn extract_filename(message: &str) -> Option<String> {
    FILENAME_NAMED
        .captures(message)
        .or_else(|| FILENAME_QUOTED.captures(message))
        .or_else(|| FILENAME_BARE.captures(message))
        .map(|c| c[1].to_string())
}

fn extract_content(message: &str) -> Option<String> {
    if let Some(captures) = CONTENT_FENCED.captures(message) {
        return Some(captures[1].trim().to_string());
    }
    CONTENT_TAIL
        .captures(message)
        .map(|c| c[1].trim().to_string())
}

/// Work out which file sub-intent the message names. Returns None when the
/// message matched a file pattern but no actionable request could be parsed,
/// in which case the turn falls through to plain chat.
fn detect_file_request(message: &str) -> Option<FileRequest> {
    let lowered = message.to_lowercase();

    if LIST_HINT.is_match(&lowered) && lowered.contains("files") {
        return Some(FileRequest {
            op: FileOp::List,
            filename: None,
            content: None,
        });
    }

    let filename = extract_filename(message);

    if lowered.contains("extract") && lowered.contains("text") {
        return filename.map(|f| FileRequest {
            op: FileOp::ExtractText,
            filename: Some(f),
            content: None,
        });
    }
    if lowered.contains("to text") && lowered.contains("convert") {
        return filename.map(|f| FileRequest {
            op: FileOp::ConvertText,
            filename: Some(f),
            content: None,
        });
    }
    if lowered.contains("download") {
        return filename.map(|f| FileRequest {
            op: FileOp::Download,
            filename: Some(f),
            content: None,
        });
    }
    // modify and update are served by append: the storage service owns
    // merge semantics
    if lowered.contains("append")
        || lowered.contains("modify")
        || lowered.contains("update")
        || lowered.starts_with("add to")
    {
        return filename.map(|f| FileRequest {
            op: FileOp::Append,
            filename: Some(f),
            content: extract_content(message),
        });
    }
    if lowered.contains("delete") || lowered.contains("remove") {
        return filename.map(|f| FileRequest {
            op: FileOp::Delete,
            filename: Some(f),
            content: None,
        });
    }
    // create before read: "save preview.txt" would otherwise trip the
    // read hint on the "view" substring
    if CREATE_HINT.is_match(&lowered) {
        return filename.map(|f| FileRequest {
            op: FileOp::Create,
            filename: Some(f),
            content: extract_content(message),
        });
    }
    if READ_HINT.is_match(&lowered) {
        return filename.map(|f| FileRequest {
            op: FileOp::Read,
            filename: Some(f),
            content: None,
        });
    }

    None
}

/// Classify one turn. Attempted in priority order; a matched family whose
/// precondition fails (no source image, no parseable file request) does not
/// stop the walk down the list.
pub fn classify(
    message: &str,
    attachments: &[Attachment],
    history: &[Message],
) -> Intent {
    if any_match(&CONVERT_PATTERNS, message) {
        if let Some(source) = source_image(attachments, history) {
            return Intent::ConvertImage {
                format: target_format(message),
                source,
            };
        }
    }

    if any_match(&FILE_PATTERNS, message) {
        if let Some(request) = detect_file_request(message) {
            return Intent::FileOp(request);
        }
    }

    if any_match(&EDIT_PATTERNS, message) {
        if let Some(source) = source_image(attachments, history) {
            return Intent::EditImage { source };
        }
    }

    if any_match(&GENERATE_PATTERNS, message) {
        return Intent::GenerateImage;
    }

    Intent::Chat
}

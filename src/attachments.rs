//! Attachment handling: creation from local files, image encoding, document text.

use crate::types::{Attachment, AttachmentType};
use async_trait::async_trait;
use base64::Engine;
use std::path::Path;

/// Files above this size are rejected before sending.
pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;
/// Plain text beyond this many characters is truncated.
pub const MAX_DOCUMENT_CHARS: usize = 15_360;

const FALLBACK_MIME: &str = "application/octet-stream";

const MIME_BY_EXTENSION: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("heic", "image/heic"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("log", "text/plain"),
    ("csv", "text/csv"),
    ("html", "text/html"),
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
];

#[derive(Clone, Debug, PartialEq)]
pub struct DocumentContent {
    pub file_name: String,
    pub mime_type: String,
    pub text_content: String,
}

/// Turns attachments into the payload pieces of an outgoing message.
#[async_trait]
pub trait AttachmentSource: Send + Sync {
    /// Base64 for every image attachment that could be read; failures are skipped.
    async fn encode_images(&self, attachments: &[Attachment]) -> Vec<String>;

    /// Text (or guidance) for every document attachment that could be read.
    async fn extract_documents(&self, attachments: &[Attachment]) -> Vec<DocumentContent>;
}

pub fn mime_type_for(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    extension
        .and_then(|ext| {
            MIME_BY_EXTENSION
                .iter()
                .find(|(known, _)| *known == ext)
                .map(|(_, mime)| *mime)
        })
        .unwrap_or(FALLBACK_MIME)
}

pub fn create_attachment(path: &Path) -> std::io::Result<Attachment> {
    let metadata = std::fs::metadata(path)?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown_file")
        .to_string();
    let mime_type = mime_type_for(&file_name).to_string();
    let kind = AttachmentType::from_mime_type(&mime_type);
    tracing::info!(file = %file_name, mime = %mime_type, %kind, "attachment created");

    Ok(Attachment {
        id: uuid::Uuid::new_v4().to_string(),
        locator: path.to_path_buf(),
        file_name,
        mime_type,
        size: metadata.len(),
        kind,
    })
}

pub fn is_valid_attachment(attachment: &Attachment) -> bool {
    if attachment.size > MAX_ATTACHMENT_BYTES {
        tracing::warn!("file too large: {} bytes", attachment.size);
        return false;
    }
    match std::fs::File::open(&attachment.locator) {
        Ok(_) => true,
        Err(_) => {
            tracing::warn!("file not accessible: {}", attachment.locator.display());
            false
        }
    }
}

/// Only images and documents reach a backend; anything else would be dropped silently.
pub fn is_sendable(attachment: &Attachment) -> bool {
    attachment.kind != AttachmentType::Unknown
}

/// Coarse size for attachment chips, e.g. `12 KB`.
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    match bytes {
        b if b < KB => format!("{b} B"),
        b if b < MB => format!("{} KB", b / KB),
        b if b < GB => format!("{} MB", b / MB),
        b => format!("{} GB", b / GB),
    }
}

/// One-decimal size, e.g. `2.0 GB`.
pub fn format_bytes(bytes: u64) -> String {
    let kb = bytes as f64 / 1024.0;
    let mb = kb / 1024.0;
    let gb = mb / 1024.0;
    if gb >= 1.0 {
        format!("{gb:.1} GB")
    } else if mb >= 1.0 {
        format!("{mb:.1} MB")
    } else if kb >= 1.0 {
        format!("{kb:.1} KB")
    } else {
        format!("{bytes} B")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DocumentKind {
    PlainText,
    Pdf,
    Word,
    Spreadsheet,
    Other,
}

fn document_kind(attachment: &Attachment) -> DocumentKind {
    let mime = attachment.mime_type.as_str();
    let name = attachment.file_name.to_ascii_lowercase();
    let ends = |ext: &str| name.ends_with(ext);

    if mime.starts_with("text/") || ends(".txt") || ends(".md") || ends(".log") {
        DocumentKind::PlainText
    } else if mime == "application/pdf" || ends(".pdf") {
        DocumentKind::Pdf
    } else if mime.contains("word")
        || mime.contains("wordprocessingml")
        || ends(".docx")
        || ends(".doc")
    {
        DocumentKind::Word
    } else if mime.contains("spreadsheet")
        || mime.contains("excel")
        || mime.contains("sheet")
        || ends(".xlsx")
        || ends(".xls")
    {
        DocumentKind::Spreadsheet
    } else {
        DocumentKind::Other
    }
}

fn truncate_text(content: String) -> String {
    let total = content.chars().count();
    if total <= MAX_DOCUMENT_CHARS {
        return content;
    }
    tracing::warn!("text file too long ({total} chars), truncating");
    let kept: String = content.chars().take(MAX_DOCUMENT_CHARS).collect();
    format!("{kept}\n\n[Text truncated - original file was {total} characters]")
}

fn document_guidance(kind: DocumentKind, attachment: &Attachment) -> String {
    let name = &attachment.file_name;
    let size = format_bytes(attachment.size);
    match kind {
        DocumentKind::Pdf => format!(
            "📄 PDF Document: {name} ({size})\n\n\
             I can see you've attached a PDF file. While I can't extract text from PDFs directly, \
             I'd be happy to help if you could:\n\
             • Copy and paste the relevant text from the PDF\n\
             • Tell me what specific information you're looking for\n\
             • Describe the content you'd like me to analyze\n\n\
             What would you like to discuss about this PDF?"
        ),
        DocumentKind::Word => format!(
            "📝 **Word Document**: {name} ({size})\n\n\
             I can see you've attached a Word document. While I can't extract text from Word files directly, \
             I'd be happy to help if you could:\n\n\
             • **Copy and paste** the relevant text from the document\n\
             • **Save as plain text**: File → Save As → Plain Text (.txt) and attach that\n\
             • **Tell me** what specific content you'd like me to analyze\n\n\
             What would you like to discuss about this document?"
        ),
        DocumentKind::Spreadsheet => format!(
            "📊 Excel Spreadsheet: {name} ({size})\n\n\
             I can see you've attached an Excel file. While I can't extract data from spreadsheets directly, \
             I'd be happy to help if you could:\n\
             • Copy and paste the relevant data from the spreadsheet\n\
             • Export the data as a CSV or text file and attach that\n\
             • Describe what analysis or help you need with the data\n\n\
             What would you like to discuss about this spreadsheet?"
        ),
        DocumentKind::Other | DocumentKind::PlainText => format!(
            "📎 Document: {name} ({size})\n\
             Type: {mime}\n\n\
             I can see you've attached a file, but I can only read plain text files directly. \
             For other file types, I'd be happy to help if you could:\n\
             • Copy and paste the relevant content from the file\n\
             • Convert the file to plain text format\n\
             • Tell me what you'd like me to analyze or help with\n\n\
             What would you like to discuss about this file?",
            mime = attachment.mime_type
        ),
    }
}

/// Reads attachments straight from the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileAttachments;

impl FileAttachments {
    async fn extract_document(&self, attachment: &Attachment) -> std::io::Result<String> {
        match document_kind(attachment) {
            DocumentKind::PlainText => {
                let raw = tokio::fs::read(&attachment.locator).await?;
                Ok(truncate_text(String::from_utf8_lossy(&raw).into_owned()))
            }
            kind => {
                // Confirm the file is still there before describing it.
                tokio::fs::metadata(&attachment.locator).await?;
                Ok(document_guidance(kind, attachment))
            }
        }
    }
}

#[async_trait]
impl AttachmentSource for FileAttachments {
    async fn encode_images(&self, attachments: &[Attachment]) -> Vec<String> {
        let mut encoded = Vec::new();
        for attachment in attachments.iter().filter(|a| a.is_image()) {
            match tokio::fs::read(&attachment.locator).await {
                Ok(bytes) => {
                    tracing::debug!(
                        file = %attachment.file_name,
                        bytes = bytes.len(),
                        "encoded image"
                    );
                    encoded.push(base64::engine::general_purpose::STANDARD.encode(bytes));
                }
                Err(err) => {
                    tracing::error!("failed to encode image {}: {err}", attachment.file_name);
                }
            }
        }
        encoded
    }

    async fn extract_documents(&self, attachments: &[Attachment]) -> Vec<DocumentContent> {
        let mut documents = Vec::new();
        for attachment in attachments.iter().filter(|a| a.is_document()) {
            match self.extract_document(attachment).await {
                Ok(text_content) => {
                    tracing::info!(
                        file = %attachment.file_name,
                        chars = text_content.len(),
                        "extracted document text"
                    );
                    documents.push(DocumentContent {
                        file_name: attachment.file_name.clone(),
                        mime_type: attachment.mime_type.clone(),
                        text_content,
                    });
                }
                Err(err) => {
                    tracing::error!(
                        "failed to process document {}: {err}",
                        attachment.file_name
                    );
                }
            }
        }
        documents
    }
}

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::text::count_words;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Figure,
    Pdf,
}

impl AttachmentKind {
    pub fn code(self) -> &'static str {
        match self {
            AttachmentKind::Figure => "figure",
            AttachmentKind::Pdf => "pdf",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "figure" => Some(AttachmentKind::Figure),
            "pdf" => Some(AttachmentKind::Pdf),
            _ => None,
        }
    }

    /// MIME types accepted for this kind of upload.
    pub fn accepts(self, mime_type: &str) -> bool {
        match self {
            AttachmentKind::Figure => matches!(mime_type, "image/png" | "image/jpeg" | "image/gif"),
            AttachmentKind::Pdf => mime_type == "application/pdf",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentState {
    New,
    Ready,
    Error,
}

impl AttachmentState {
    pub fn code(self) -> &'static str {
        match self {
            AttachmentState::New => "new",
            AttachmentState::Ready => "ready",
            AttachmentState::Error => "error",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AttachmentState::New => "Processing",
            AttachmentState::Ready => "Ready",
            AttachmentState::Error => "Error",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "new" => Some(AttachmentState::New),
            "ready" => Some(AttachmentState::Ready),
            "error" => Some(AttachmentState::Error),
            _ => None,
        }
    }
}

/// Attachment metadata; the file contents are loaded separately.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttachmentInfo {
    pub id: i64,
    pub proposal_id: i64,
    pub role: String,
    pub kind: String,
    pub mime_type: String,
    pub filename: String,
    pub md5: String,
    pub caption: String,
    pub sort_order: i32,
    pub state: String,
    pub pages: Option<i32>,
    pub uploaded_at: DateTime<Utc>,
}

impl AttachmentInfo {
    pub fn status(&self) -> AttachmentState {
        AttachmentState::from_code(&self.state).unwrap_or(AttachmentState::New)
    }

    pub fn state_label(&self) -> &'static str {
        self.status().label()
    }

    pub fn is_figure(&self) -> bool {
        self.kind == AttachmentKind::Figure.code()
    }

    pub fn caption_words(&self) -> i32 {
        count_words(&self.caption)
    }

    pub fn pages_display(&self) -> String {
        self.pages.map(|p| p.to_string()).unwrap_or_default()
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct AttachmentData {
    pub mime_type: String,
    pub filename: String,
    pub data: Vec<u8>,
}

/// An attachment awaiting processing.
#[derive(Debug, sqlx::FromRow)]
pub struct PendingAttachment {
    pub id: i64,
    pub kind: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Deserialize)]
pub struct CaptionForm {
    pub caption: String,
    pub csrf_token: String,
}

/// Identify an upload from its leading bytes; the declared content type is not trusted.
pub fn detect_mime(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(b"%PDF-") {
        Some("application/pdf")
    } else if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if data.starts_with(b"\xff\xd8\xff") {
        Some("image/jpeg")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("image/gif")
    } else {
        None
    }
}

/// Count the pages of a PDF by walking its page tree. Object streams and
/// cross-reference streams are read as well as classic tables.
pub fn count_pdf_pages(data: &[u8]) -> Result<usize, String> {
    let doc = lopdf::Document::load_mem(data).map_err(|e| format!("the PDF could not be read: {e}"))?;
    Ok(doc.get_pages().len())
}

/// Check an uploaded file, returning the PDF page count where applicable.
pub fn process(kind: AttachmentKind, mime_type: &str, data: &[u8]) -> Result<Option<i32>, String> {
    let detected = detect_mime(data).ok_or_else(|| "unrecognized file format".to_string())?;
    if detected != mime_type || !kind.accepts(detected) {
        return Err(format!("unexpected file type {detected}"));
    }
    match kind {
        AttachmentKind::Pdf => {
            if !data.windows(5).any(|w| w == b"%%EOF") {
                return Err("the PDF file is truncated".to_string());
            }
            match count_pdf_pages(data)? {
                0 => Err("the PDF has no pages".to_string()),
                pages => i32::try_from(pages).map(Some).map_err(|_| "the PDF has too many pages".to_string()),
            }
        }
        AttachmentKind::Figure => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    /// Page objects 3, 4, ... under page tree 2; catalog is object 1.
    fn page_objects(pages: usize) -> Vec<String> {
        let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", i + 3)).collect();
        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!("<< /Type /Pages /Kids [{}] /Count {pages} >>", kids.join(" ")),
        ];
        objects.extend((0..pages).map(|_| "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>".to_string()));
        objects
    }

    /// A PDF 1.4 file with a classic cross-reference table.
    fn classic_pdf(pages: usize) -> Vec<u8> {
        let objects = page_objects(pages);
        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend(format!("{} 0 obj\n{body}\nendobj\n", i + 1).bytes());
        }
        let xref = out.len();
        out.extend(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).bytes());
        for offset in offsets {
            out.extend(format!("{offset:010} 00000 n \n").bytes());
        }
        out.extend(
            format!("trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n", objects.len() + 1).bytes(),
        );
        out
    }

    /// A PDF 1.5 file whose page tree and pages sit in a deflated object
    /// stream, indexed by a cross-reference stream, as pdflatex writes them.
    fn object_stream_pdf(pages: usize) -> Vec<u8> {
        let objects = page_objects(pages);
        let packed = &objects[1..];
        let stream_num = objects.len() + 1;
        let xref_num = stream_num + 1;

        let mut header = String::new();
        let mut body = String::new();
        for (i, obj) in packed.iter().enumerate() {
            header.push_str(&format!("{} {} ", i + 2, body.len()));
            body.push_str(obj);
            body.push('\n');
        }
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(format!("{header}{body}").as_bytes()).unwrap();
        let deflated = encoder.finish().unwrap();

        let mut out = b"%PDF-1.5\n".to_vec();
        let catalog = out.len();
        out.extend(format!("1 0 obj\n{}\nendobj\n", objects[0]).bytes());
        let object_stream = out.len();
        out.extend(
            format!(
                "{stream_num} 0 obj\n<< /Type /ObjStm /N {} /First {} /Filter /FlateDecode /Length {} >>\nstream\n",
                packed.len(),
                header.len(),
                deflated.len()
            )
            .bytes(),
        );
        out.extend(&deflated);
        out.extend(b"\nendstream\nendobj\n");

        let xref = out.len();
        let mut entries = Vec::new();
        let mut entry = |kind: u8, field: u32, index: u16| {
            entries.push(kind);
            entries.extend(field.to_be_bytes());
            entries.extend(index.to_be_bytes());
        };
        entry(0, 0, 0xffff);
        entry(1, catalog as u32, 0);
        for i in 0..packed.len() {
            entry(2, stream_num as u32, i as u16);
        }
        entry(1, object_stream as u32, 0);
        entry(1, xref as u32, 0);
        out.extend(
            format!(
                "{xref_num} 0 obj\n<< /Type /XRef /Size {} /W [1 4 2] /Root 1 0 R /Length {} >>\nstream\n",
                xref_num + 1,
                entries.len()
            )
            .bytes(),
        );
        out.extend(&entries);
        out.extend(format!("\nendstream\nendobj\nstartxref\n{xref}\n%%EOF\n").bytes());
        out
    }

    #[test]
    fn magic_bytes() {
        assert_eq!(detect_mime(&classic_pdf(1)), Some("application/pdf"));
        assert_eq!(detect_mime(b"\x89PNG\r\n\x1a\n\0\0"), Some("image/png"));
        assert_eq!(detect_mime(b"\xff\xd8\xff\xe0"), Some("image/jpeg"));
        assert_eq!(detect_mime(b"GIF89a...."), Some("image/gif"));
        assert_eq!(detect_mime(b"<svg></svg>"), None);
        assert_eq!(detect_mime(b""), None);
    }

    #[test]
    fn pages_exclude_page_tree() {
        assert_eq!(count_pdf_pages(&classic_pdf(2)), Ok(2));
    }

    #[test]
    fn pages_inside_object_streams_are_counted() {
        let pdf = object_stream_pdf(3);
        assert!(!pdf.windows(11).any(|w| w == b"/Type /Page"), "page dictionaries are compressed");
        assert_eq!(count_pdf_pages(&pdf), Ok(3));
        assert_eq!(process(AttachmentKind::Pdf, "application/pdf", &pdf), Ok(Some(3)));
    }

    #[test]
    fn processing() {
        let pdf = classic_pdf(2);
        assert_eq!(process(AttachmentKind::Pdf, "application/pdf", &pdf), Ok(Some(2)));
        assert!(process(AttachmentKind::Pdf, "application/pdf", b"%PDF-1.4 no end").is_err());
        assert!(process(AttachmentKind::Pdf, "application/pdf", b"%PDF-1.4\ngarbage\n%%EOF\n").is_err());
        assert!(process(AttachmentKind::Figure, "application/pdf", &pdf).is_err());
        assert_eq!(process(AttachmentKind::Figure, "image/gif", b"GIF87a\0\0"), Ok(None));
    }

    #[test]
    fn kinds_accept() {
        assert!(AttachmentKind::Figure.accepts("image/png"));
        assert!(!AttachmentKind::Figure.accepts("application/pdf"));
        assert!(AttachmentKind::Pdf.accepts("application/pdf"));
    }
}

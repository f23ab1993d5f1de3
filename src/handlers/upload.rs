use actix_multipart::Multipart;
use futures_util::StreamExt;

use crate::errors::AppError;

pub struct UploadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

/// A multipart form read into memory: text fields plus at most one file part named `file`.
pub struct UploadForm {
    pub fields: Vec<(String, String)>,
    pub file: Option<UploadedFile>,
}

impl UploadForm {
    pub fn field(&self, key: &str) -> &str {
        super::form::get_field(&self.fields, key)
    }
}

/// Read a multipart payload, refusing files larger than `max_bytes`.
pub async fn read_multipart(mut payload: Multipart, max_bytes: usize) -> Result<UploadForm, AppError> {
    let mut form = UploadForm { fields: Vec::new(), file: None };

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| AppError::Upload(e.to_string()))?;
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()))
            .unwrap_or_default();
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename().map(|f| f.to_string()));

        let limit = if name == "file" { max_bytes } else { 64 * 1024 };
        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::Upload(e.to_string()))?;
            if data.len() + chunk.len() > limit {
                return Err(AppError::Upload(format!(
                    "The uploaded {} is larger than the limit of {} kB",
                    if name == "file" { "file" } else { "field" },
                    limit / 1024
                )));
            }
            data.extend_from_slice(&chunk);
        }

        if name == "file" {
            form.file = Some(UploadedFile {
                filename: sanitize_filename(filename.as_deref().unwrap_or("upload")),
                data,
            });
        } else {
            let value = String::from_utf8(data)
                .map_err(|_| AppError::Upload(format!("Field {name} is not valid UTF-8")))?;
            form.fields.push((name, value));
        }
    }

    Ok(form)
}

/// Keep the last path component and drop characters unsafe in a Content-Disposition header.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .take(200)
        .collect();
    if cleaned.trim().is_empty() { "upload".to_string() } else { cleaned }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_are_reduced_to_base_name() {
        assert_eq!(sanitize_filename("C:\\Users\\pi\\figure 1.png"), "figure 1.png");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("a\"b\n.pdf"), "ab.pdf");
        assert_eq!(sanitize_filename(""), "upload");
    }
}

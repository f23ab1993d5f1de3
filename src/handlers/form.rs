//! Helpers for forms whose field names are not known up front
//! (member tables, reviewer grids, weight tables).

use crate::errors::AppError;

/// Parse a URL-encoded form body, keeping duplicate keys (e.g. checkboxes).
pub fn parse_form_body(body: &[u8]) -> Result<Vec<(String, String)>, AppError> {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)
        .map_err(|e| AppError::Upload(format!("Malformed form data: {e}")))
}

pub fn get_field<'a>(params: &'a [(String, String)], key: &str) -> &'a str {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .unwrap_or("")
}

pub fn get_all<'a>(params: &'a [(String, String)], key: &str) -> Vec<&'a str> {
    params
        .iter()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_and_keeps_duplicates() {
        let params = parse_form_body(b"csrf_token=abc&editor_4=on&editor_7=on&note=a+b%26c&id=1&id=2").unwrap();
        assert_eq!(get_field(&params, "note"), "a b&c");
        assert_eq!(get_field(&params, "missing"), "");
        assert_eq!(get_all(&params, "id"), vec!["1", "2"]);
        assert_eq!(get_field(&params, "editor_7"), "on");
    }
}

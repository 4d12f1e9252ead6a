/// Rewrite a Google Drive "view" URL into the direct-download form.
///
/// Best-effort string rewrite: `/file/d/<id>/view` becomes `/uc?id=<id>`, and
/// anything from a `/view` segment onward is dropped. URLs that do not
/// mention the Drive host pass through unchanged.
pub fn normalize_drive_url(url: &str) -> String {
    if !url.contains("drive.google.com") {
        return url.to_string();
    }

    let mut fixed = url.replace("/file/d/", "/uc?id=");
    if let Some(pos) = fixed.find("/view") {
        fixed.truncate(pos);
    }
    fixed
}

/// Sanitize filename to remove invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

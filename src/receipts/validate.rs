use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

pub const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_ITEMS: usize = 50;
pub const MAX_ITEM_LEN: usize = 255;
pub const MAX_TAGS: usize = 20;
pub const MAX_TAG_LEN: usize = 50;

const STEM_CAP: usize = 50;
const PDF_TAIL_WINDOW: usize = 1024;

const ALLOWED_MIME: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/heic",
    "image/heif",
    "application/pdf",
];

const ALLOWED_EXT: &[&str] = &["jpg", "jpeg", "png", "webp", "heic", "heif", "pdf"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadRejection {
    #[error("Uploaded file is empty")]
    Empty,
    #[error("File exceeds the 10 MiB limit")]
    TooLarge,
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("Unsupported file extension: {0}")]
    UnsupportedExtension(String),
    #[error("File content is corrupted or does not match its declared format")]
    CorruptedContent,
    #[error("Corrupted PDF file")]
    CorruptedPdf,
}

/// Size, declared-type, extension and content-sniffing stages, in that
/// order, each short-circuiting. The declared MIME type and the extension
/// are checked against their own allow-lists independently, so a mismatch
/// between the two is caught by whichever list is stricter.
pub fn validate(
    file_name: &str,
    declared_mime: &str,
    body: &[u8],
) -> Result<(), UploadRejection> {
    if body.is_empty() {
        return Err(UploadRejection::Empty);
    }
    if body.len() > MAX_FILE_BYTES {
        return Err(UploadRejection::TooLarge);
    }

    let mime = declared_mime.to_ascii_lowercase();
    if !ALLOWED_MIME.contains(&mime.as_str()) {
        return Err(UploadRejection::UnsupportedType(declared_mime.to_string()));
    }

    let ext = extension(file_name)
        .ok_or_else(|| UploadRejection::UnsupportedExtension(file_name.to_string()))?;
    if !ALLOWED_EXT.contains(&ext.as_str()) {
        return Err(UploadRejection::UnsupportedExtension(ext));
    }

    sniff(&mime, body)
}

fn extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// Leading-byte signatures for every type on the allow-list, keyed by the
/// declared MIME type. PDFs additionally need an end-of-file or
/// end-of-object marker near the tail.
fn sniff(mime: &str, body: &[u8]) -> Result<(), UploadRejection> {
    let ok = match mime {
        "image/jpeg" => body.starts_with(&[0xFF, 0xD8, 0xFF]),
        "image/png" => body.starts_with(&[0x89, 0x50, 0x4E, 0x47]),
        "image/webp" => {
            body.starts_with(b"RIFF") && body.len() >= 12 && &body[8..12] == b"WEBP"
        }
        "image/heic" | "image/heif" => body.len() >= 8 && &body[4..8] == b"ftyp",
        "application/pdf" => {
            if !body.starts_with(b"%PDF") {
                return Err(UploadRejection::CorruptedContent);
            }
            let tail = &body[body.len().saturating_sub(PDF_TAIL_WINDOW)..];
            if !contains(tail, b"%%EOF") && !contains(tail, b"endobj") {
                return Err(UploadRejection::CorruptedPdf);
            }
            true
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(UploadRejection::CorruptedContent)
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Collision-resistant, filesystem-safe name for a validated upload. The
/// client-supplied name contributes only a sanitized, length-capped stem;
/// it is never used as a path component.
pub fn safe_file_name(original: &str, now: OffsetDateTime, id: Uuid) -> String {
    let (stem, ext) = original.rsplit_once('.').unwrap_or((original, "bin"));
    let ext = ext.to_ascii_lowercase();
    let mut stem: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(STEM_CAP)
        .collect();
    if stem.is_empty() {
        stem.push_str("receipt");
    }
    format!("{}-{}-{}.{}", now.unix_timestamp(), id, stem, ext)
}

pub fn validate_items(items: &[String]) -> Result<(), String> {
    if items.len() > MAX_ITEMS {
        return Err(format!("At most {MAX_ITEMS} items are allowed"));
    }
    for item in items {
        if item.is_empty() {
            return Err("Item names must not be empty".into());
        }
        if item.len() > MAX_ITEM_LEN {
            return Err(format!("Item names are capped at {MAX_ITEM_LEN} characters"));
        }
    }
    Ok(())
}

pub fn validate_tags(tags: &[String]) -> Result<(), String> {
    if tags.len() > MAX_TAGS {
        return Err(format!("At most {MAX_TAGS} tags are allowed"));
    }
    for tag in tags {
        if tag.is_empty() {
            return Err("Tag names must not be empty".into());
        }
        if tag.len() > MAX_TAG_LEN {
            return Err(format!("Tag names are capped at {MAX_TAG_LEN} characters"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3];
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

    fn pdf_with_trailer() -> Vec<u8> {
        let mut pdf = b"%PDF-1.4\nsome objects\n".to_vec();
        pdf.extend_from_slice(b"trailer\n<<>>\nstartxref\n0\n%%EOF\n");
        pdf
    }

    #[test]
    fn valid_png_passes() {
        assert_eq!(validate("scan.png", "image/png", PNG), Ok(()));
    }

    #[test]
    fn valid_jpeg_passes() {
        assert_eq!(validate("IMG_0042.JPG", "image/jpeg", JPEG), Ok(()));
    }

    #[test]
    fn png_bytes_renamed_to_pdf_fail_sniffing() {
        assert_eq!(
            validate("scan.pdf", "application/pdf", PNG),
            Err(UploadRejection::CorruptedContent)
        );
    }

    #[test]
    fn empty_and_oversized_files_are_rejected() {
        assert_eq!(validate("a.png", "image/png", &[]), Err(UploadRejection::Empty));
        let big = vec![0u8; MAX_FILE_BYTES + 1];
        assert_eq!(
            validate("a.png", "image/png", &big),
            Err(UploadRejection::TooLarge)
        );
    }

    #[test]
    fn exactly_at_the_size_ceiling_is_allowed() {
        let mut exact = vec![0u8; MAX_FILE_BYTES];
        exact[..4].copy_from_slice(&[0x89, 0x50, 0x4E, 0x47]);
        assert_eq!(validate("a.png", "image/png", &exact), Ok(()));
    }

    #[test]
    fn declared_type_allow_list() {
        assert_eq!(
            validate("a.gif", "image/gif", PNG),
            Err(UploadRejection::UnsupportedType("image/gif".into()))
        );
        assert_eq!(
            validate("a.png", "text/html", PNG),
            Err(UploadRejection::UnsupportedType("text/html".into()))
        );
    }

    #[test]
    fn extension_allow_list_is_independent_of_mime() {
        // Declared type is fine, extension is not.
        assert_eq!(
            validate("a.exe", "image/png", PNG),
            Err(UploadRejection::UnsupportedExtension("exe".into()))
        );
        assert_eq!(
            validate("no_extension", "image/png", PNG),
            Err(UploadRejection::UnsupportedExtension("no_extension".into()))
        );
        assert_eq!(
            validate("trailing_dot.", "image/png", PNG),
            Err(UploadRejection::UnsupportedExtension("trailing_dot.".into()))
        );
    }

    #[test]
    fn webp_needs_riff_and_webp_tags() {
        let mut webp = b"RIFF\x24\x00\x00\x00WEBPVP8 ".to_vec();
        webp.extend_from_slice(&[0u8; 16]);
        assert_eq!(validate("a.webp", "image/webp", &webp), Ok(()));
        assert_eq!(
            validate("a.webp", "image/webp", b"RIFF\x24\x00\x00\x00WAVE"),
            Err(UploadRejection::CorruptedContent)
        );
    }

    #[test]
    fn heic_needs_ftyp_box() {
        let heic = b"\x00\x00\x00\x20ftypheic\x00\x00\x00\x00";
        assert_eq!(validate("a.heic", "image/heic", heic), Ok(()));
        assert_eq!(validate("a.heif", "image/heif", heic), Ok(()));
        assert_eq!(
            validate("a.heic", "image/heic", JPEG),
            Err(UploadRejection::CorruptedContent)
        );
    }

    #[test]
    fn pdf_requires_header_and_trailer() {
        assert_eq!(
            validate("doc.pdf", "application/pdf", &pdf_with_trailer()),
            Ok(())
        );
        assert_eq!(
            validate("doc.pdf", "application/pdf", b"%PDF-1.4\ntruncated"),
            Err(UploadRejection::CorruptedPdf)
        );
        let mut endobj_only = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n".to_vec();
        endobj_only.extend_from_slice(&[b' '; 10]);
        assert_eq!(
            validate("doc.pdf", "application/pdf", &endobj_only),
            Ok(())
        );
    }

    #[test]
    fn safe_name_neutralizes_path_traversal() {
        let now = datetime!(2026-03-01 12:00 UTC);
        let id = Uuid::nil();
        let name = safe_file_name("../../etc/passwd.png", now, id);
        assert!(!name.contains('/'));
        assert!(!name.contains(".."));
        assert!(name.ends_with(".png"));
        assert!(name.starts_with(&now.unix_timestamp().to_string()));
    }

    #[test]
    fn safe_name_caps_the_stem_and_keeps_the_extension() {
        let now = datetime!(2026-03-01 12:00 UTC);
        let id = Uuid::nil();
        let long = format!("{}.pdf", "x".repeat(300));
        let name = safe_file_name(&long, now, id);
        let stem = name
            .rsplit_once('.')
            .map(|(s, _)| s.rsplit('-').next().unwrap())
            .unwrap();
        assert_eq!(stem.len(), 50);
        assert!(name.ends_with(".pdf"));

        let spaced = safe_file_name("moje zakupy (maj).JPG", now, id);
        assert!(spaced.ends_with(".jpg"));
        assert!(spaced.contains("moje_zakupy__maj_"));
    }

    #[test]
    fn item_and_tag_caps() {
        let ok_items: Vec<String> = (0..MAX_ITEMS).map(|i| format!("item {i}")).collect();
        assert!(validate_items(&ok_items).is_ok());
        let too_many: Vec<String> = (0..=MAX_ITEMS).map(|i| format!("item {i}")).collect();
        assert!(validate_items(&too_many).is_err());
        assert!(validate_items(&["x".repeat(MAX_ITEM_LEN + 1)]).is_err());
        assert!(validate_items(&[String::new()]).is_err());

        let too_many_tags: Vec<String> = (0..=MAX_TAGS).map(|i| format!("tag {i}")).collect();
        assert!(validate_tags(&too_many_tags).is_err());
        assert!(validate_tags(&["x".repeat(MAX_TAG_LEN + 1)]).is_err());
        assert!(validate_tags(&["groceries".to_string()]).is_ok());
    }
}

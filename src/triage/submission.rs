use std::path::Path;

use tokio::io::AsyncReadExt;

use super::{AnalysisError, ValidationError};

/// Shortest symptom description accepted, counted after trimming.
pub const MIN_SYMPTOM_CHARS: usize = 5;

/// An image ready for upload: name, declared media type and raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Image with an explicitly declared media type.
    pub fn new(file_name: &str, media_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: sanitize_filename(file_name),
            media_type: media_type.trim().to_ascii_lowercase(),
            bytes,
        }
    }

    /// Image whose media type is detected from its content, falling back to
    /// the file extension.
    pub fn from_bytes(file_name: &str, bytes: Vec<u8>) -> Self {
        let media_type = detect_media_type(file_name, &bytes);
        Self::new(file_name, &media_type, bytes)
    }

    /// Read an image from disk, refusing files over `max_bytes` without
    /// reading them.
    pub async fn from_path(path: &Path, max_bytes: u64) -> Result<Self, AnalysisError> {
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        if size > max_bytes {
            return Err(ValidationError::ImageTooLarge {
                size,
                limit: max_bytes,
            }
            .into());
        }

        // The file may grow between the size check and the read.
        let mut bytes = Vec::with_capacity(size as usize);
        file.take(max_bytes.saturating_add(1))
            .read_to_end(&mut bytes)
            .await?;
        if bytes.len() as u64 > max_bytes {
            return Err(ValidationError::ImageTooLarge {
                size: bytes.len() as u64,
                limit: max_bytes,
            }
            .into());
        }

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image");
        tracing::debug!(
            path = %path.display(),
            size_bytes = bytes.len(),
            "Loaded image for upload"
        );
        Ok(Self::from_bytes(file_name, bytes))
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }
}

/// A validated case, ready to send exactly once.
///
/// The only way to build one is [`CaseSubmission::new`], so holding a
/// `CaseSubmission` means the local preconditions already hold.
#[derive(Debug, Clone)]
pub struct CaseSubmission {
    symptom_description: String,
    image: ImageUpload,
    follow_up_case_id: Option<String>,
}

impl CaseSubmission {
    /// Check the image first, then the symptom text.
    pub fn new(
        symptom_description: impl Into<String>,
        image: ImageUpload,
        follow_up_case_id: Option<String>,
        max_image_bytes: u64,
    ) -> Result<Self, ValidationError> {
        if image.bytes.is_empty() {
            return Err(ValidationError::ImageMissing);
        }
        if !image.is_image() {
            return Err(ValidationError::InvalidImageType);
        }
        if image.size_bytes() > max_image_bytes {
            return Err(ValidationError::ImageTooLarge {
                size: image.size_bytes(),
                limit: max_image_bytes,
            });
        }

        let symptom_description = symptom_description.into();
        if symptom_description.trim().chars().count() < MIN_SYMPTOM_CHARS {
            return Err(ValidationError::SymptomsTooShort);
        }

        let follow_up_case_id = follow_up_case_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        Ok(Self {
            symptom_description,
            image,
            follow_up_case_id,
        })
    }

    pub fn symptom_description(&self) -> &str {
        &self.symptom_description
    }

    pub fn image(&self) -> &ImageUpload {
        &self.image
    }

    pub fn follow_up_case_id(&self) -> Option<&str> {
        self.follow_up_case_id.as_deref()
    }

    pub(crate) fn into_parts(self) -> (String, ImageUpload, Option<String>) {
        (self.symptom_description, self.image, self.follow_up_case_id)
    }
}

/// Detect an image media type from magic bytes, then from the extension.
/// Returns `application/octet-stream` when neither says anything.
pub fn detect_media_type(file_name: &str, bytes: &[u8]) -> String {
    match sniff_image(bytes) {
        Some(mime) => mime.to_string(),
        None => mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'B', b'M', ..] => Some("image/bmp"),
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Some("image/tiff"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        // HEIC/HEIF: "ftyp" box at offset 4 with a HEIF brand
        [_, _, _, _, b'f', b't', b'y', b'p', brand @ ..]
            if brand.starts_with(b"heic")
                || brand.starts_with(b"heix")
                || brand.starts_with(b"mif1")
                || brand.starts_with(b"msf1") =>
        {
            Some("image/heic")
        }
        _ => None,
    }
}

/// Strip path components and control characters, limit length.
pub fn sanitize_filename(original: &str) -> String {
    let name = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let clean: String = name
        .chars()
        .filter(|c| !c.is_control())
        .take(255)
        .collect();

    if clean.trim().is_empty() || clean == "." || clean == ".." {
        "image".to_string()
    } else {
        clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
    const LIMIT: u64 = 1024 * 1024;

    fn jpeg() -> ImageUpload {
        ImageUpload::from_bytes("rash.jpg", JPEG.to_vec())
    }

    #[test]
    fn accepts_valid_submission() {
        let submission =
            CaseSubmission::new("Itchy red rash on forearm", jpeg(), None, LIMIT).unwrap();
        assert_eq!(submission.symptom_description(), "Itchy red rash on forearm");
        assert_eq!(submission.image().media_type, "image/jpeg");
        assert!(submission.follow_up_case_id().is_none());
    }

    #[test]
    fn rejects_non_image_media_type() {
        let pdf = ImageUpload::new("report.pdf", "application/pdf", b"%PDF-1.7".to_vec());
        let err = CaseSubmission::new("Itchy red rash", pdf, None, LIMIT).unwrap_err();
        assert_eq!(err, ValidationError::InvalidImageType);
    }

    #[test]
    fn rejects_empty_image() {
        let empty = ImageUpload::new("rash.jpg", "image/jpeg", Vec::new());
        let err = CaseSubmission::new("Itchy red rash", empty, None, LIMIT).unwrap_err();
        assert_eq!(err, ValidationError::ImageMissing);
    }

    #[test]
    fn rejects_oversized_image() {
        let err = CaseSubmission::new("Itchy red rash", jpeg(), None, 4).unwrap_err();
        assert_eq!(
            err,
            ValidationError::ImageTooLarge {
                size: JPEG.len() as u64,
                limit: 4
            }
        );
    }

    #[test]
    fn rejects_short_symptoms_after_trimming() {
        let err = CaseSubmission::new("  itch   ", jpeg(), None, LIMIT).unwrap_err();
        assert_eq!(err, ValidationError::SymptomsTooShort);
    }

    #[test]
    fn five_characters_is_enough() {
        assert!(CaseSubmission::new("  hives ", jpeg(), None, LIMIT).is_ok());
        assert!(CaseSubmission::new("Ülcer", jpeg(), None, LIMIT).is_ok());
    }

    #[test]
    fn image_is_checked_before_symptoms() {
        let pdf = ImageUpload::new("report.pdf", "application/pdf", b"%PDF".to_vec());
        let err = CaseSubmission::new("", pdf, None, LIMIT).unwrap_err();
        assert_eq!(err, ValidationError::InvalidImageType);
    }

    #[test]
    fn blank_follow_up_id_is_dropped() {
        let submission =
            CaseSubmission::new("Itchy red rash", jpeg(), Some("  ".into()), LIMIT).unwrap();
        assert!(submission.follow_up_case_id().is_none());

        let submission =
            CaseSubmission::new("Itchy red rash", jpeg(), Some(" abc123 ".into()), LIMIT).unwrap();
        assert_eq!(submission.follow_up_case_id(), Some("abc123"));
    }

    #[test]
    fn declared_media_type_is_normalized() {
        let image = ImageUpload::new("a.png", " IMAGE/PNG ", vec![1, 2, 3]);
        assert_eq!(image.media_type, "image/png");
        assert!(image.is_image());
    }

    #[test]
    fn detects_formats_from_magic_bytes() {
        assert_eq!(detect_media_type("x", JPEG), "image/jpeg");
        assert_eq!(detect_media_type("x", &[0x89, 0x50, 0x4E, 0x47, 0x0D]), "image/png");
        assert_eq!(detect_media_type("x", b"GIF89a"), "image/gif");
        assert_eq!(detect_media_type("x", b"RIFF\x00\x00\x00\x00WEBPVP8 "), "image/webp");
        assert_eq!(detect_media_type("x", &[0x49, 0x49, 0x2A, 0x00]), "image/tiff");
        assert_eq!(detect_media_type("x", b"\x00\x00\x00\x18ftypheic"), "image/heic");
    }

    #[test]
    fn magic_bytes_win_over_extension() {
        assert_eq!(detect_media_type("photo.pdf", JPEG), "image/jpeg");
    }

    #[test]
    fn falls_back_to_extension() {
        assert_eq!(detect_media_type("photo.png", b"not really"), "image/png");
        assert_eq!(detect_media_type("notes.txt", b"hello"), "text/plain");
        assert_eq!(detect_media_type("blob", b"\x00\x01"), "application/octet-stream");
    }

    #[test]
    fn sanitize_strips_paths() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\rash.jpg"), "rash.jpg");
        assert_eq!(sanitize_filename("rash\0.jpg"), "rash.jpg");
    }

    #[test]
    fn sanitize_empty_name() {
        assert_eq!(sanitize_filename(""), "image");
        assert_eq!(sanitize_filename("dir/"), "image");
        assert_eq!(sanitize_filename(".."), "image");
    }

    #[tokio::test]
    async fn from_path_reads_and_detects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lesion.dat");
        std::fs::write(&path, JPEG).unwrap();

        let image = ImageUpload::from_path(&path, 1024).await.unwrap();
        assert_eq!(image.file_name, "lesion.dat");
        assert_eq!(image.media_type, "image/jpeg");
        assert_eq!(image.size_bytes(), JPEG.len() as u64);
    }

    #[tokio::test]
    async fn from_path_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ImageUpload::from_path(&dir.path().join("nope.jpg"), 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Io(_)));
    }

    #[tokio::test]
    async fn from_path_refuses_file_over_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("large.jpg");
        let mut contents = JPEG.to_vec();
        contents.resize(65, 0);
        std::fs::write(&path, &contents).unwrap();

        let err = ImageUpload::from_path(&path, 64).await.unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Validation(ValidationError::ImageTooLarge { size: 65, limit: 64 })
        ));

        let image = ImageUpload::from_path(&path, 65).await.unwrap();
        assert_eq!(image.size_bytes(), 65);
    }
}

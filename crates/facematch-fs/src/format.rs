//! Reference image recognition by file extension and content signature.

use image::ImageFormat;
use std::path::Path;

/// Formats accepted as reference images: JPEG, PNG, BMP.
const REFERENCE_FORMATS: [ImageFormat; 3] =
    [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::Bmp];

/// Image format implied by the file extension, if it is a reference format.
///
/// Matching is case-insensitive (`.JPG`, `.Jpeg` are accepted).
pub fn reference_format(path: &Path) -> Option<ImageFormat> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    ImageFormat::from_extension(ext).filter(|f| REFERENCE_FORMATS.contains(f))
}

/// Image format identified from the leading signature bytes, if it is a
/// reference format.
pub fn sniff_reference_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes)
        .ok()
        .filter(|f| REFERENCE_FORMATS.contains(f))
}

/// True if `name` looks like a reference image file name.
pub fn is_reference_image(name: &str) -> bool {
    reference_format(Path::new(name)).is_some()
}

/// A bare file name: non-empty, no path separators, not `.`/`..`.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_reference_extensions() {
        for name in ["a.jpg", "b.jpeg", "c.png", "d.bmp"] {
            assert!(is_reference_image(name), "{name}");
        }
    }

    #[test]
    fn test_extension_case_insensitive() {
        for name in ["A.JPG", "b.Jpeg", "c.PNG", "d.BmP"] {
            assert!(is_reference_image(name), "{name}");
        }
    }

    #[test]
    fn test_rejects_other_files() {
        for name in ["notes.txt", "clip.gif", "photo.webp", "README", "jpg", ".png.bak"] {
            assert!(!is_reference_image(name), "{name}");
        }
    }

    #[test]
    fn test_format_mapping() {
        assert_eq!(reference_format(Path::new("x.jpeg")), Some(ImageFormat::Jpeg));
        assert_eq!(reference_format(Path::new("x.bmp")), Some(ImageFormat::Bmp));
    }

    #[test]
    fn test_sniff_signatures() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(sniff_reference_format(&jpeg), Some(ImageFormat::Jpeg));
        assert_eq!(sniff_reference_format(&png), Some(ImageFormat::Png));
        assert_eq!(sniff_reference_format(b"BM\x00\x00\x00\x00"), Some(ImageFormat::Bmp));
    }

    #[test]
    fn test_sniff_rejects_other_content() {
        assert_eq!(sniff_reference_format(b"password=hunter2\n"), None);
        assert_eq!(sniff_reference_format(b"GIF89a\x01\x00"), None);
        assert_eq!(sniff_reference_format(&[]), None);
    }

    #[test]
    fn test_plain_file_name() {
        assert!(is_plain_file_name("alice.jpg"));
        assert!(!is_plain_file_name("../alice.jpg"));
        assert!(!is_plain_file_name("dir/alice.jpg"));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name(""));
    }
}

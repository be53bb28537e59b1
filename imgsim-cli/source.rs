use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use image::{GrayImage, ImageReader, ImageResult};

/// Where an image's encoded bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Path(PathBuf),
    /// Encoded bytes held in memory; `name` stands in for the path
    Bytes { name: String, data: Vec<u8> },
}

impl ImageSource {
    /// Identifier reported in results and used to derive cache keys
    pub fn identifier(&self) -> &Path {
        match self {
            ImageSource::Path(path) => path,
            ImageSource::Bytes { name, .. } => Path::new(name),
        }
    }

    /// Decode and convert to 8-bit luma. The format is sniffed from the
    /// content, so a mislabelled extension still decodes.
    pub fn load_luma(&self) -> ImageResult<GrayImage> {
        let img = match self {
            ImageSource::Path(path) => ImageReader::open(path)?.with_guessed_format()?.decode()?,
            ImageSource::Bytes { data, .. } => image::load_from_memory(data)?,
        };
        Ok(img.to_luma8())
    }

    /// Modification time in whole seconds since the epoch, if the source is a readable file
    pub fn modified(&self) -> Option<u64> {
        match self {
            ImageSource::Path(path) => fs::metadata(path)
                .and_then(|meta| meta.modified())
                .ok()
                .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
                .map(|elapsed| elapsed.as_secs()),
            ImageSource::Bytes { .. } => None,
        }
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::Path(path)
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        ImageSource::Path(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Luma};
    use std::io::Cursor;

    fn encoded_png(width: u32, height: u32) -> Vec<u8> {
        let img = GrayImage::from_fn(width, height, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        bytes
    }

    #[test]
    fn test_identifier() {
        let path = ImageSource::from(Path::new("/data/cat.jpg"));
        assert_eq!(path.identifier(), Path::new("/data/cat.jpg"));

        let bytes = ImageSource::Bytes { name: "stdin".to_string(), data: Vec::new() };
        assert_eq!(bytes.identifier(), Path::new("stdin"));
        assert_eq!(bytes.modified(), None);
    }

    #[test]
    fn test_load_from_bytes() {
        let source = ImageSource::Bytes { name: "query".to_string(), data: encoded_png(12, 9) };
        let luma = source.load_luma().unwrap();
        assert_eq!(luma.dimensions(), (12, 9));
    }

    #[test]
    fn test_load_failures() {
        let garbage = ImageSource::Bytes { name: "junk".to_string(), data: b"not an image".to_vec() };
        assert!(garbage.load_luma().is_err());

        let missing = ImageSource::from(PathBuf::from("/definitely/not/here.png"));
        assert!(missing.load_luma().is_err());
        assert_eq!(missing.modified(), None);
    }

    #[test]
    fn test_mislabelled_extension_decodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("actually_png.jpg");
        fs::write(&path, encoded_png(8, 8)).unwrap();

        let source = ImageSource::from(path);
        assert_eq!(source.load_luma().unwrap().dimensions(), (8, 8));
        assert!(source.modified().is_some());
    }
}

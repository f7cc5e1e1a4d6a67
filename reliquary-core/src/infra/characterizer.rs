use async_trait::async_trait;
use reliquary_model::TechnicalMetadata;

use crate::error::Result;
use crate::ports::Characterizer;

/// Characterizer that recognises common formats by magic bytes, falling
/// back to the filename extension. Reads PNG dimensions from the header.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicCharacterizer;

impl BasicCharacterizer {
    fn sniff(content: &[u8]) -> Option<&'static str> {
        const SIGNATURES: &[(&[u8], &str)] = &[
            (b"\x89PNG\r\n\x1a\n", "image/png"),
            (b"\xff\xd8\xff", "image/jpeg"),
            (b"II*\x00", "image/tiff"),
            (b"MM\x00*", "image/tiff"),
            (b"%PDF-", "application/pdf"),
            (b"GIF87a", "image/gif"),
            (b"GIF89a", "image/gif"),
            (b"ID3", "audio/mpeg"),
        ];
        SIGNATURES
            .iter()
            .find(|(magic, _)| content.starts_with(magic))
            .map(|(_, mime)| *mime)
    }

    fn from_extension(filename: &str) -> Option<&'static str> {
        let (_, extension) = filename.rsplit_once('.')?;
        let mime = match extension.to_ascii_lowercase().as_str() {
            "tif" | "tiff" => "image/tiff",
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "jp2" => "image/jp2",
            "gif" => "image/gif",
            "pdf" => "application/pdf",
            "mp3" => "audio/mpeg",
            "wav" => "audio/x-wav",
            "mp4" => "video/mp4",
            "mov" => "video/quicktime",
            "txt" => "text/plain",
            "xml" => "application/xml",
            _ => return None,
        };
        Some(mime)
    }

    fn png_dimensions(content: &[u8]) -> Option<(u32, u32)> {
        let header = content.get(16..24)?;
        let width = u32::from_be_bytes(header[0..4].try_into().ok()?);
        let height = u32::from_be_bytes(header[4..8].try_into().ok()?);
        Some((width, height))
    }
}

#[async_trait]
impl Characterizer for BasicCharacterizer {
    async fn characterize(&self, content: &[u8], filename: &str) -> Result<TechnicalMetadata> {
        let mime_type = Self::sniff(content)
            .or_else(|| Self::from_extension(filename))
            .unwrap_or("application/octet-stream");
        let (width, height) = if mime_type == "image/png" {
            Self::png_dimensions(content).unzip()
        } else {
            (None, None)
        };
        Ok(TechnicalMetadata {
            mime_type: Some(mime_type.to_string()),
            size: Some(content.len() as u64),
            width,
            height,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn magic_bytes_win_over_extension() {
        let metadata = BasicCharacterizer
            .characterize(b"%PDF-1.7 body", "scan.tif")
            .await
            .unwrap();
        assert_eq!(metadata.mime_type.as_deref(), Some("application/pdf"));
        assert_eq!(metadata.size, Some(13));
    }

    #[tokio::test]
    async fn png_header_gives_dimensions() {
        let mut png = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR".to_vec();
        png.extend_from_slice(&640u32.to_be_bytes());
        png.extend_from_slice(&480u32.to_be_bytes());
        let metadata = BasicCharacterizer.characterize(&png, "page.png").await.unwrap();
        assert_eq!((metadata.width, metadata.height), (Some(640), Some(480)));
    }

    #[tokio::test]
    async fn unknown_content_falls_back_to_extension() {
        let metadata = BasicCharacterizer
            .characterize(b"raw", "front.TIF")
            .await
            .unwrap();
        assert_eq!(metadata.mime_type.as_deref(), Some("image/tiff"));
    }
}

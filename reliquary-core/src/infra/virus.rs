use async_trait::async_trait;

use crate::error::Result;
use crate::ports::{ScanVerdict, VirusScanner};

/// The EICAR anti-virus test string.
pub const EICAR_SIGNATURE: &[u8] =
    b"X5O!P%@AP[4\\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

/// Scanner matching byte signatures anywhere in the content.
#[derive(Debug, Clone)]
pub struct SignatureScanner {
    signatures: Vec<(String, Vec<u8>)>,
}

impl Default for SignatureScanner {
    fn default() -> Self {
        Self::new().with_signature("Eicar-Test-Signature", EICAR_SIGNATURE)
    }
}

impl SignatureScanner {
    /// A scanner that knows no signatures.
    pub fn new() -> Self {
        Self {
            signatures: Vec::new(),
        }
    }

    pub fn with_signature(mut self, name: impl Into<String>, pattern: impl Into<Vec<u8>>) -> Self {
        self.signatures.push((name.into(), pattern.into()));
        self
    }
}

#[async_trait]
impl VirusScanner for SignatureScanner {
    async fn scan(&self, content: &[u8]) -> Result<ScanVerdict> {
        let hit = self.signatures.iter().find(|(_, pattern)| {
            !pattern.is_empty() && content.windows(pattern.len()).any(|window| window == pattern.as_slice())
        });
        Ok(match hit {
            Some((name, _)) => ScanVerdict::Infected {
                signature: name.clone(),
            },
            None => ScanVerdict::Clean,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn eicar_is_detected_inside_content() {
        let scanner = SignatureScanner::default();
        let mut content = b"%PDF-1.4 ".to_vec();
        content.extend_from_slice(EICAR_SIGNATURE);
        assert_eq!(
            scanner.scan(&content).await.unwrap(),
            ScanVerdict::Infected {
                signature: "Eicar-Test-Signature".into()
            }
        );
        assert_eq!(scanner.scan(b"clean tiff").await.unwrap(), ScanVerdict::Clean);
    }
}

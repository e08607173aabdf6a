//! File encoding: raw document bytes → base64 [`EncodedPart`].
//!
//! The inference API takes documents inline in the JSON body, so each file is
//! read fully into memory and base64-wrapped. Files are read concurrently but
//! the output keeps input order so identical inputs produce identical request
//! bodies. The first failed read aborts the whole batch.

use crate::error::VerificaError;
use crate::progress::ProgressCallback;
use crate::session::{FileSource, InputFile};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// MIME type attached to every encoded part.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// One document ready to be attached to the inference request.
///
/// Serialises as the `inlineData` payload: `{"data": …, "mimeType": …}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedPart {
    pub data: String,
    pub mime_type: String,
}

impl EncodedPart {
    /// Base64-encode `bytes` as a PDF part.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: STANDARD.encode(bytes),
            mime_type: PDF_MIME_TYPE.to_string(),
        }
    }

    /// Decode the payload back to raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.data)
    }
}

/// Read one file completely and encode it.
pub async fn encode_file(file: &InputFile) -> Result<(EncodedPart, usize), VerificaError> {
    let part = match file.source() {
        FileSource::Path(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|source| VerificaError::Encoding {
                    name: file.name().to_string(),
                    source,
                })?;
            (EncodedPart::from_bytes(&bytes), bytes.len())
        }
        FileSource::Bytes(bytes) => (EncodedPart::from_bytes(bytes), bytes.len()),
    };
    debug!(
        "Encoded '{}': {} bytes → {} bytes base64",
        file.name(),
        part.1,
        part.0.data.len()
    );
    Ok(part)
}

/// Encode all files with at most `concurrency` reads in flight.
///
/// Output order matches `files`; the first error cancels the remaining reads.
pub async fn encode_all(
    files: &[InputFile],
    concurrency: usize,
    progress: Option<&ProgressCallback>,
) -> Result<Vec<EncodedPart>, VerificaError> {
    stream::iter(files.iter().enumerate())
        .map(|(index, file)| async move {
            let (part, size) = encode_file(file).await?;
            if let Some(cb) = progress {
                cb.on_file_encoded(index, file.name(), size);
            }
            Ok::<_, VerificaError>(part)
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}

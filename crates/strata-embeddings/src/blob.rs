//! f32 vector ⇄ `SQLite` BLOB codec (little-endian, 4 bytes per component).

use thiserror::Error;

/// Decoding failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlobError {
    /// Blob length is not a multiple of 4.
    #[error("embedding blob length {0} is not a multiple of 4")]
    Misaligned(usize),
}

/// Convert an f32 slice to a byte blob for storage.
pub fn f32_slice_to_blob(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert a byte blob back to an f32 vector.
pub fn blob_to_f32_vec(blob: &[u8]) -> Result<Vec<f32>, BlobError> {
    if blob.len() % 4 != 0 {
        return Err(BlobError::Misaligned(blob.len()));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let v = vec![0.25_f32, -1.5, 3.0];
        let blob = f32_slice_to_blob(&v);
        assert_eq!(blob.len(), 12);
        assert_eq!(blob_to_f32_vec(&blob).unwrap(), v);
    }

    #[test]
    fn empty_blob_is_empty_vector() {
        assert!(blob_to_f32_vec(&[]).unwrap().is_empty());
    }

    #[test]
    fn misaligned_blob_rejected() {
        assert_eq!(blob_to_f32_vec(&[0, 1, 2]), Err(BlobError::Misaligned(3)));
    }
}

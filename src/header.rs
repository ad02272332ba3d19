use crate::error::HistoError;

/// Number of axes representable in a catalog record, only the first `dim` of
/// which are meaningful for a given histogram.
pub const MAX_AXES: usize = 4;

/// Size in bytes of the catalog header that opens a `.drr` file.
pub const CATALOG_HEADER_SIZE: usize = 128;

/// Size in bytes of one fixed-layout per-histogram record.
pub const RECORD_SIZE: usize = 130;

const CATALOG_MAGIC: &[u8; 4] = b"HHIR";

/// The catalog-level header at the start of a `.drr` file: a signature and
/// the number of histogram records that follow.
#[derive(Debug, Clone, Copy)]
pub struct CatalogHeader {
    pub num_histograms: u32,
}

impl CatalogHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, HistoError> {
        if bytes.len() < CATALOG_HEADER_SIZE {
            return Err(HistoError::ShortRead {
                expected: CATALOG_HEADER_SIZE as u64,
                found: bytes.len() as u64,
            });
        }
        if &bytes[0..4] != CATALOG_MAGIC {
            return Err(HistoError::BadHeader(
                "directory file signature mismatch".to_string(),
            ));
        }
        let num_histograms = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        Ok(Self { num_histograms })
    }
}

/// Immutable description of one histogram, decoded from a `.drr` record.
///
/// Only `params[0..dim]`, `raw[0..dim]`, `scaled[0..dim]`, `min_ch[0..dim]`
/// and `max_ch[0..dim]` are meaningful; the rest are unused padding slots in
/// the legacy layout.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramHeader {
    pub id: i64,
    pub dim: u16,
    pub half_words: u16,
    pub params: [u16; MAX_AXES],
    pub raw: [u16; MAX_AXES],
    pub scaled: [u16; MAX_AXES],
    pub min_ch: [i32; MAX_AXES],
    pub max_ch: [i32; MAX_AXES],
    /// Offset into `.his`, in half-words (2-byte units) from the start of the file.
    pub offset: u64,
    pub calibration_constants: [f64; 4],
    pub xlabel: String,
    pub ylabel: String,
    pub title: String,
}

fn read_u16_array(bytes: &[u8]) -> [u16; MAX_AXES] {
    let mut out = [0u16; MAX_AXES];
    for (i, chunk) in bytes.chunks_exact(2).take(MAX_AXES).enumerate() {
        out[i] = u16::from_le_bytes(chunk.try_into().unwrap());
    }
    out
}

fn read_i16_array_widened(bytes: &[u8]) -> [i32; MAX_AXES] {
    let mut out = [0i32; MAX_AXES];
    for (i, chunk) in bytes.chunks_exact(2).take(MAX_AXES).enumerate() {
        out[i] = i32::from(i16::from_le_bytes(chunk.try_into().unwrap()));
    }
    out
}

fn trim_ascii_field(bytes: &[u8]) -> String {
    let end = bytes
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}

impl HistogramHeader {
    /// Decodes one fixed-width record. Does not know the `.his` file length,
    /// so the offset+size invariant is checked by the reader at `read_bins`
    /// time rather than here.
    pub fn parse(bytes: &[u8]) -> Result<Self, HistoError> {
        if bytes.len() < RECORD_SIZE {
            return Err(HistoError::ShortRead {
                expected: RECORD_SIZE as u64,
                found: bytes.len() as u64,
            });
        }

        let id = i64::from(i16::from_le_bytes(bytes[0..2].try_into().unwrap()));
        let dim = u16::from_le_bytes(bytes[2..4].try_into().unwrap());
        let half_words = u16::from_le_bytes(bytes[4..6].try_into().unwrap());
        let params = read_u16_array(&bytes[6..14]);
        let raw = read_u16_array(&bytes[14..22]);
        let scaled = read_u16_array(&bytes[22..30]);
        let min_ch = read_i16_array_widened(&bytes[30..38]);
        let max_ch = read_i16_array_widened(&bytes[38..46]);
        let offset = u64::from(u32::from_le_bytes(bytes[46..50].try_into().unwrap()));
        let mut calibration_constants = [0f64; 4];
        for (i, chunk) in bytes[50..66].chunks_exact(4).enumerate() {
            calibration_constants[i] = f64::from(f32::from_le_bytes(chunk.try_into().unwrap()));
        }
        let xlabel = trim_ascii_field(&bytes[66..78]);
        let ylabel = trim_ascii_field(&bytes[78..90]);
        let title = trim_ascii_field(&bytes[90..130]);

        let header = Self {
            id,
            dim,
            half_words,
            params,
            raw,
            scaled,
            min_ch,
            max_ch,
            offset,
            calibration_constants,
            xlabel,
            ylabel,
            title,
        };
        header.validate()?;
        Ok(header)
    }

    fn validate(&self) -> Result<(), HistoError> {
        if self.dim != 1 && self.dim != 2 {
            return Err(HistoError::UnsupportedDim(self.dim));
        }
        if self.half_words != 1 && self.half_words != 2 {
            return Err(HistoError::BadHeader(format!(
                "id {}: halfWords must be 1 or 2, found {}",
                self.id, self.half_words
            )));
        }
        for k in 0..self.dim as usize {
            if self.scaled[k] < 1 {
                return Err(HistoError::BadHeader(format!(
                    "id {}: scaled[{k}] must be >= 1",
                    self.id
                )));
            }
            if self.min_ch[k] > self.max_ch[k] {
                return Err(HistoError::BadHeader(format!(
                    "id {}: minCh[{k}] ({}) > maxCh[{k}] ({})",
                    self.id, self.min_ch[k], self.max_ch[k]
                )));
            }
        }
        Ok(())
    }

    /// Total number of stored bins (`prod(scaled[0..dim])`).
    pub fn bin_count(&self) -> u64 {
        (0..self.dim as usize).fold(1u64, |acc, k| acc * u64::from(self.scaled[k]))
    }

    /// Size in bytes of this histogram's bin array on disk.
    pub fn byte_size(&self) -> u64 {
        self.bin_count() * u64::from(self.half_words) * 2
    }

    /// Byte offset (not half-word offset) into `.his`.
    pub fn byte_offset(&self) -> u64 {
        self.offset * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record_bytes(id: i16, dim: u16, scaled0: u16, min0: i16, max0: i16) -> Vec<u8> {
        let mut b = vec![0u8; RECORD_SIZE];
        b[0..2].copy_from_slice(&id.to_le_bytes());
        b[2..4].copy_from_slice(&dim.to_le_bytes());
        b[4..6].copy_from_slice(&1u16.to_le_bytes()); // half_words
        b[22..24].copy_from_slice(&scaled0.to_le_bytes());
        b[30..32].copy_from_slice(&min0.to_le_bytes());
        b[38..40].copy_from_slice(&max0.to_le_bytes());
        b
    }

    #[test]
    fn parses_minimal_1d_record() {
        let bytes = sample_record_bytes(7, 1, 10, 0, 9);
        let header = HistogramHeader::parse(&bytes).unwrap();
        assert_eq!(header.id, 7);
        assert_eq!(header.dim, 1);
        assert_eq!(header.scaled[0], 10);
        assert_eq!(header.min_ch[0], 0);
        assert_eq!(header.max_ch[0], 9);
        assert_eq!(header.bin_count(), 10);
        assert_eq!(header.byte_size(), 20);
    }

    #[test]
    fn rejects_bad_scale() {
        let mut bytes = sample_record_bytes(1, 1, 0, 0, 9);
        bytes[22..24].copy_from_slice(&0u16.to_le_bytes());
        assert!(matches!(
            HistogramHeader::parse(&bytes),
            Err(HistoError::BadHeader(_))
        ));
    }

    #[test]
    fn rejects_min_gt_max() {
        let bytes = sample_record_bytes(1, 1, 10, 9, 0);
        assert!(matches!(
            HistogramHeader::parse(&bytes),
            Err(HistoError::BadHeader(_))
        ));
    }

    #[test]
    fn rejects_bad_dim() {
        let bytes = sample_record_bytes(1, 3, 10, 0, 9);
        assert!(matches!(
            HistogramHeader::parse(&bytes),
            Err(HistoError::UnsupportedDim(3))
        ));
    }
}

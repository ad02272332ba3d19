use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::HistoError;
use crate::header::{CatalogHeader, HistogramHeader, CATALOG_HEADER_SIZE, RECORD_SIZE};

/// A decoded `.drr`/`.his` pair. Opens and fully indexes the directory file
/// eagerly; `.his` is read lazily, one span at a time, per `read_bins` call.
pub struct DrrHisReader {
    his_path: PathBuf,
    headers: Vec<HistogramHeader>,
}

impl DrrHisReader {
    /// Opens `<base>.drr` and indexes every record it contains. `<base>.his`
    /// is only opened when `read_bins` is called.
    pub fn open(base: impl AsRef<Path>) -> Result<Self, HistoError> {
        let base = base.as_ref();
        let drr_path = with_extension(base, "drr");
        let his_path = with_extension(base, "his");

        let mut drr_bytes = Vec::new();
        File::open(&drr_path)?.read_to_end(&mut drr_bytes)?;

        let catalog = CatalogHeader::parse(&drr_bytes)?;

        let mut headers = Vec::with_capacity(catalog.num_histograms as usize);
        let mut offset = CATALOG_HEADER_SIZE;
        for _ in 0..catalog.num_histograms {
            let end = offset + RECORD_SIZE;
            if end > drr_bytes.len() {
                return Err(HistoError::ShortRead {
                    expected: end as u64,
                    found: drr_bytes.len() as u64,
                });
            }
            headers.push(HistogramHeader::parse(&drr_bytes[offset..end])?);
            offset = end;
        }

        Ok(Self { his_path, headers })
    }

    /// Ids in directory order.
    pub fn list_ids(&self) -> Vec<i64> {
        self.headers.iter().map(|h| h.id).collect()
    }

    pub fn header_of(&self, id: i64) -> Result<&HistogramHeader, HistoError> {
        self.headers
            .iter()
            .find(|h| h.id == id)
            .ok_or(HistoError::UnknownId(id))
    }

    /// Reads and widens the raw bin counts for `id`, in row-major order for
    /// 2D histograms (`iy * nBinX + ix`).
    pub fn read_bins(&self, id: i64) -> Result<Vec<i64>, HistoError> {
        let header = self.header_of(id)?;
        let byte_offset = header.byte_offset();
        let byte_size = header.byte_size();

        let mut file = File::open(&self.his_path)?;
        let file_len = file.metadata()?.len();
        if byte_offset + byte_size > file_len {
            return Err(HistoError::ShortRead {
                expected: byte_offset + byte_size,
                found: file_len,
            });
        }

        use std::io::{Seek, SeekFrom};
        file.seek(SeekFrom::Start(byte_offset))?;
        let mut buf = vec![0u8; byte_size as usize];
        file.read_exact(&mut buf)?;

        let n = header.bin_count() as usize;
        let mut values = Vec::with_capacity(n);
        match header.half_words {
            1 => {
                for chunk in buf.chunks_exact(2) {
                    values.push(i64::from(u16::from_le_bytes(chunk.try_into().unwrap())));
                }
            }
            2 => {
                for chunk in buf.chunks_exact(4) {
                    values.push(i64::from(u32::from_le_bytes(chunk.try_into().unwrap())));
                }
            }
            other => {
                return Err(HistoError::BadHeader(format!(
                    "id {id}: unsupported halfWords value {other}"
                )))
            }
        }
        Ok(values)
    }
}

fn with_extension(base: &Path, ext: &str) -> PathBuf {
    let mut p = base.to_path_buf();
    p.set_extension(ext);
    p
}

//! Readers for the daily archive files.
//!
//! Each file is a small little-endian header followed by raw arrays. The
//! whole file is read into one owned buffer; the payload arrays are typed
//! views at the header-declared offsets, decoded per element, never
//! copied out.

use byteorder::{LittleEndian, ReadBytesExt};
use chrono::NaiveDate;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tracing::instrument;

use thalassa_core::EngineError;

/// Accepted current-archive header versions. Versions 2 and 3 are the
/// single-layer legacy layouts; version 4 carries an explicit depth
/// dimension.
pub const CURRENT_VERSIONS: &[i32] = &[2, 3, 4];

/// Diffusivity-archive header version.
pub const DIFFUSIVITY_VERSION: i32 = 6;

// Dimension sanity bounds; anything outside is a corrupt header, not a
// bigger grid.
const MAX_DIM: usize = 100_000;
const MAX_DEPTHS: usize = 1_000;

/// Shared owned byte buffer for one archive file.
pub type FileBuf = Arc<Vec<u8>>;

/// f32 array view at a byte offset of a file buffer.
#[derive(Debug, Clone)]
pub struct F32View {
    buf: FileBuf,
    byte_offset: usize,
    len: usize,
}

impl F32View {
    fn new(buf: &FileBuf, path: &Path, byte_offset: usize, len: usize) -> Result<Self, EngineError> {
        let end = byte_offset
            .checked_add(len.checked_mul(4).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        if end > buf.len() {
            return Err(EngineError::CorruptBinary {
                path: path.display().to_string(),
                detail: format!(
                    "f32 array [{}..{}] exceeds file length {}",
                    byte_offset,
                    end,
                    buf.len()
                ),
            });
        }
        Ok(Self {
            buf: buf.clone(),
            byte_offset,
            len,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Decode element `i`. Bounds were validated at construction; an
    /// out-of-range index is an internal invariant violation.
    #[inline]
    pub fn get(&self, i: usize) -> f32 {
        let o = self.byte_offset + i * 4;
        f32::from_le_bytes([self.buf[o], self.buf[o + 1], self.buf[o + 2], self.buf[o + 3]])
    }
}

/// u16 array view (binary16 payloads).
#[derive(Debug, Clone)]
pub struct U16View {
    buf: FileBuf,
    byte_offset: usize,
    len: usize,
}

impl U16View {
    fn new(buf: &FileBuf, path: &Path, byte_offset: usize, len: usize) -> Result<Self, EngineError> {
        let end = byte_offset
            .checked_add(len.checked_mul(2).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        if end > buf.len() {
            return Err(EngineError::CorruptBinary {
                path: path.display().to_string(),
                detail: format!(
                    "u16 array [{}..{}] exceeds file length {}",
                    byte_offset,
                    end,
                    buf.len()
                ),
            });
        }
        Ok(Self {
            buf: buf.clone(),
            byte_offset,
            len,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, i: usize) -> u16 {
        let o = self.byte_offset + i * 2;
        u16::from_le_bytes([self.buf[o], self.buf[o + 1]])
    }
}

fn truncated(path: &Path) -> EngineError {
    EngineError::CorruptBinary {
        path: path.display().to_string(),
        detail: "truncated header".into(),
    }
}

fn read_dim(cur: &mut Cursor<&[u8]>, path: &Path, what: &str, max: usize) -> Result<usize, EngineError> {
    let raw = cur.read_i32::<LittleEndian>().map_err(|_| truncated(path))?;
    if raw <= 0 || raw as usize > max {
        return Err(EngineError::CorruptBinary {
            path: path.display().to_string(),
            detail: format!("{} = {} out of range", what, raw),
        });
    }
    Ok(raw as usize)
}

fn read_date(cur: &mut Cursor<&[u8]>, path: &Path) -> Result<NaiveDate, EngineError> {
    let year = cur.read_i32::<LittleEndian>().map_err(|_| truncated(path))?;
    let month = cur.read_i32::<LittleEndian>().map_err(|_| truncated(path))?;
    let day = cur.read_i32::<LittleEndian>().map_err(|_| truncated(path))?;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32).ok_or_else(|| {
        EngineError::CorruptBinary {
            path: path.display().to_string(),
            detail: format!("invalid header date {}-{}-{}", year, month, day),
        }
    })
}

/// One day of the current archive: header plus lon/lat/u/v views.
#[derive(Debug, Clone)]
pub struct CurrentFile {
    pub version: i32,
    pub n_lat: usize,
    pub n_lon: usize,
    pub n_depth: usize,
    pub date: NaiveDate,
    pub lon: F32View,
    pub lat: F32View,
    pub u: F32View,
    pub v: F32View,
}

impl CurrentFile {
    pub fn n_cells(&self) -> usize {
        self.n_lat * self.n_lon
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn read(path: &Path) -> Result<Self, EngineError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| EngineError::io(path, &e))?;
        Self::parse(path, Arc::new(bytes))
    }

    pub fn parse(path: &Path, buf: FileBuf) -> Result<Self, EngineError> {
        let mut cur = Cursor::new(buf.as_slice());

        let version = cur.read_i32::<LittleEndian>().map_err(|_| truncated(path))?;
        if !CURRENT_VERSIONS.contains(&version) {
            return Err(EngineError::UnsupportedFormat {
                path: path.display().to_string(),
                version,
            });
        }

        let n_lat = read_dim(&mut cur, path, "n_lat", MAX_DIM)?;
        let n_lon = read_dim(&mut cur, path, "n_lon", MAX_DIM)?;
        let n_depth = if version == 4 {
            read_dim(&mut cur, path, "n_depth", MAX_DEPTHS)?
        } else {
            1
        };
        let date = read_date(&mut cur, path)?;

        let n_cells = n_lat * n_lon;
        let n_values = n_depth * n_cells;
        let mut offset = cur.position() as usize;

        let lon = F32View::new(&buf, path, offset, n_cells)?;
        offset += n_cells * 4;
        let lat = F32View::new(&buf, path, offset, n_cells)?;
        offset += n_cells * 4;
        let u = F32View::new(&buf, path, offset, n_values)?;
        offset += n_values * 4;
        let v = F32View::new(&buf, path, offset, n_values)?;

        Ok(Self {
            version,
            n_lat,
            n_lon,
            n_depth,
            date,
            lon,
            lat,
            u,
            v,
        })
    }
}

/// One day of the diffusivity archive: header plus the binary16 K array.
/// The grid shape comes from the shared coordinate file.
#[derive(Debug, Clone)]
pub struct DiffusivityFile {
    pub version: i32,
    pub date: NaiveDate,
    /// Largest quantization error, units of 1e-3 m²/s. Diagnostic only.
    pub max_error_scaled: i32,
    pub k_half: U16View,
}

impl DiffusivityFile {
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn read(path: &Path, n_cells: usize) -> Result<Self, EngineError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| EngineError::io(path, &e))?;
        Self::parse(path, Arc::new(bytes), n_cells)
    }

    pub fn parse(path: &Path, buf: FileBuf, n_cells: usize) -> Result<Self, EngineError> {
        let mut cur = Cursor::new(buf.as_slice());

        let version = cur.read_i32::<LittleEndian>().map_err(|_| truncated(path))?;
        if version != DIFFUSIVITY_VERSION {
            return Err(EngineError::UnsupportedFormat {
                path: path.display().to_string(),
                version,
            });
        }

        let date = read_date(&mut cur, path)?;
        let max_error_scaled = cur.read_i32::<LittleEndian>().map_err(|_| truncated(path))?;

        let offset = cur.position() as usize;
        let k_half = U16View::new(&buf, path, offset, n_cells)?;

        Ok(Self {
            version,
            date,
            max_error_scaled,
            k_half,
        })
    }
}

/// Shared coordinate file for the diffusivity archive
/// (`eke_coords.bin`): one lon/lat grid for every day.
#[derive(Debug, Clone)]
pub struct CoordsFile {
    pub version: i32,
    pub n_lat: usize,
    pub n_lon: usize,
    pub lon: F32View,
    pub lat: F32View,
}

impl CoordsFile {
    pub fn n_cells(&self) -> usize {
        self.n_lat * self.n_lon
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn read(path: &Path) -> Result<Self, EngineError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| EngineError::io(path, &e))?;
        Self::parse(path, Arc::new(bytes))
    }

    pub fn parse(path: &Path, buf: FileBuf) -> Result<Self, EngineError> {
        let mut cur = Cursor::new(buf.as_slice());

        let version = cur.read_i32::<LittleEndian>().map_err(|_| truncated(path))?;
        let n_lat = read_dim(&mut cur, path, "n_lat", MAX_DIM)?;
        let n_lon = read_dim(&mut cur, path, "n_lon", MAX_DIM)?;

        let n_cells = n_lat * n_lon;
        let mut offset = cur.position() as usize;

        let lon = F32View::new(&buf, path, offset, n_cells)?;
        offset += n_cells * 4;
        let lat = F32View::new(&buf, path, offset, n_cells)?;

        Ok(Self {
            version,
            n_lat,
            n_lon,
            lon,
            lat,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Builders for handcrafted archive bytes.

    use super::*;

    pub fn push_i32(out: &mut Vec<u8>, v: i32) {
        out.extend_from_slice(&v.to_le_bytes());
    }

    pub fn push_f32s(out: &mut Vec<u8>, values: &[f32]) {
        for v in values {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    pub fn push_u16s(out: &mut Vec<u8>, values: &[u16]) {
        for v in values {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    /// A version-4 current file over a small regular grid.
    pub fn current_file_bytes(
        n_lat: usize,
        n_lon: usize,
        depths: usize,
        date: (i32, i32, i32),
        lon0: f32,
        lat0: f32,
        cell_deg: f32,
        u_of_cell: impl Fn(usize, usize) -> f32,
        v_of_cell: impl Fn(usize, usize) -> f32,
    ) -> Vec<u8> {
        let mut out = Vec::new();
        push_i32(&mut out, 4);
        push_i32(&mut out, n_lat as i32);
        push_i32(&mut out, n_lon as i32);
        push_i32(&mut out, depths as i32);
        push_i32(&mut out, date.0);
        push_i32(&mut out, date.1);
        push_i32(&mut out, date.2);

        let mut lons = Vec::new();
        let mut lats = Vec::new();
        for iy in 0..n_lat {
            for ix in 0..n_lon {
                lons.push(lon0 + ix as f32 * cell_deg);
                lats.push(lat0 + iy as f32 * cell_deg);
            }
        }
        push_f32s(&mut out, &lons);
        push_f32s(&mut out, &lats);

        for k in 0..depths {
            for c in 0..n_lat * n_lon {
                push_f32s(&mut out, &[u_of_cell(k, c)]);
            }
        }
        for k in 0..depths {
            for c in 0..n_lat * n_lon {
                push_f32s(&mut out, &[v_of_cell(k, c)]);
            }
        }
        out
    }
}

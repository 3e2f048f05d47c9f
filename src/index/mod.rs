
use std::cmp::Ordering;
use std::fs;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::RagError;

const INDEX_MAGIC: [u8; 4] = *b"NRFI";
const INDEX_FORMAT_VERSION: u32 = 1;

/// Exact nearest-neighbor index over a flat array of fixed-dimension
/// vectors, using squared Euclidean distance.
///
/// Vectors are identified by their slot: the 0-based insertion position.
/// The slot is the sole join key to the metadata store, so insertion order
/// must be preserved exactly, including across persistence round-trips.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    #[inline]
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::Index("dimension must be greater than zero".to_string()).into());
        }
        Ok(Self {
            dimension,
            data: Vec::new(),
        })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of vectors stored
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append vectors in order; slot `i` of the batch lands at slot
    /// `len() + i`.
    #[inline]
    pub fn add_batch(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        for (i, vector) in vectors.iter().enumerate() {
            if vector.len() != self.dimension {
                return Err(RagError::Index(format!(
                    "Vector {} has dimension {}, expected {}",
                    i,
                    vector.len(),
                    self.dimension
                ))
                .into());
            }
        }
        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        debug!("Index now holds {} vectors", self.len());
        Ok(())
    }

    /// Borrow the vector stored at `slot`, if any.
    #[inline]
    pub fn vector(&self, slot: usize) -> Option<&[f32]> {
        if slot >= self.len() {
            return None;
        }
        let start = slot * self.dimension;
        self.data.get(start..start + self.dimension)
    }

    /// Return the `k` nearest slots to `query` by squared L2 distance,
    /// ascending. `k` larger than the stored count is clamped, never an
    /// error; ties break on the lower slot.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dimension {
            return Err(RagError::Index(format!(
                "Query has dimension {}, expected {}",
                query.len(),
                self.dimension
            ))
            .into());
        }
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .map(|candidate| squared_l2(query, candidate))
            .enumerate()
            .collect();
        hits.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        hits.truncate(k.min(self.len()));
        Ok(hits)
    }

    /// Write the index as a binary blob: magic, format version, dimension,
    /// count, then the raw little-endian f32 payload in slot order.
    #[inline]
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let file = fs::File::create(path)
            .with_context(|| format!("Failed to create index file: {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        writer.write_all(&INDEX_MAGIC)?;
        writer.write_all(&INDEX_FORMAT_VERSION.to_le_bytes())?;
        writer.write_all(&(self.dimension as u64).to_le_bytes())?;
        writer.write_all(&(self.len() as u64).to_le_bytes())?;
        for value in &self.data {
            writer.write_all(&value.to_le_bytes())?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write index file: {}", path.display()))?;

        debug!("Saved index with {} vectors to {}", self.len(), path.display());
        Ok(())
    }

    /// Load an index previously written by [`FlatIndex::save`].
    ///
    /// The round-trip is exact: slot order and every stored bit are
    /// preserved, so search results match the pre-save index.
    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RagError::Index(format!(
                "Vector index not found: {}. Run the build command first.",
                path.display()
            ))
            .into());
        }

        let file = fs::File::open(path)
            .with_context(|| format!("Failed to open index file: {}", path.display()))?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .with_context(|| format!("Failed to read index header: {}", path.display()))?;
        if magic != INDEX_MAGIC {
            return Err(RagError::Index(format!(
                "Not a vector index file: {}",
                path.display()
            ))
            .into());
        }

        let version = read_u32(&mut reader)?;
        if version != INDEX_FORMAT_VERSION {
            return Err(RagError::Index(format!(
                "Unsupported index format version {} in {}",
                version,
                path.display()
            ))
            .into());
        }

        let dimension = usize::try_from(read_u64(&mut reader)?)
            .map_err(|_| RagError::Index("Index dimension overflows usize".to_string()))?;
        let count = usize::try_from(read_u64(&mut reader)?)
            .map_err(|_| RagError::Index("Index count overflows usize".to_string()))?;
        if dimension == 0 {
            return Err(RagError::Index(format!(
                "Corrupt index header (zero dimension): {}",
                path.display()
            ))
            .into());
        }

        let value_count = dimension.checked_mul(count).ok_or_else(|| {
            RagError::Index(format!("Corrupt index header: {}", path.display()))
        })?;
        let byte_count = value_count.checked_mul(4).ok_or_else(|| {
            RagError::Index(format!("Corrupt index header: {}", path.display()))
        })?;

        let mut payload = vec![0u8; byte_count];
        reader.read_exact(&mut payload).with_context(|| {
            format!("Index file truncated or corrupt: {}", path.display())
        })?;

        let mut trailing = Vec::new();
        reader.read_to_end(&mut trailing)?;
        if !trailing.is_empty() {
            return Err(RagError::Index(format!(
                "Index file has {} trailing bytes: {}",
                trailing.len(),
                path.display()
            ))
            .into());
        }

        let data = payload
            .chunks_exact(4)
            .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            .collect();

        debug!("Loaded index with {} vectors from {}", count, path.display());
        Ok(Self { dimension, data })
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .fold(0.0f32, |acc, (&x, &y)| {
            let d = x - y;
            d.mul_add(d, acc)
        })
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes).context("Failed to read index header")?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut bytes = [0u8; 8];
    reader.read_exact(&mut bytes).context("Failed to read index header")?;
    Ok(u64::from_le_bytes(bytes))
}

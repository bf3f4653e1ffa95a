//! Decoding of the TIFF/BigTIFF directory chain.
//!
//! Only the tags the layout checks need are decoded: image and block
//! geometry, block offsets and byte counts, and the subfile type that tells
//! overviews and masks apart.

use std::collections::HashSet;

use thiserror::Error;

use crate::errors::GdalError;
use crate::validate::range_reader::RangeReader;

const TAG_NEW_SUBFILE_TYPE: u16 = 254;
const TAG_IMAGE_WIDTH: u16 = 256;
const TAG_IMAGE_LENGTH: u16 = 257;
const TAG_COMPRESSION: u16 = 259;
const TAG_STRIP_OFFSETS: u16 = 273;
const TAG_SAMPLES_PER_PIXEL: u16 = 277;
const TAG_ROWS_PER_STRIP: u16 = 278;
const TAG_STRIP_BYTE_COUNTS: u16 = 279;
const TAG_PLANAR_CONFIGURATION: u16 = 284;
const TAG_TILE_WIDTH: u16 = 322;
const TAG_TILE_LENGTH: u16 = 323;
const TAG_TILE_OFFSETS: u16 = 324;
const TAG_TILE_BYTE_COUNTS: u16 = 325;

/// `NewSubfileType` bit flagging a transparency mask.
const FILETYPE_MASK: u32 = 0x4;

const STRUCTURAL_METADATA_KEY: &str = "GDAL_STRUCTURAL_METADATA_SIZE=";
/// Length of `GDAL_STRUCTURAL_METADATA_SIZE=XXXXXX bytes\n`.
pub const STRUCTURAL_METADATA_PREFIX_LEN: usize = 43;

const MAX_DIRECTORIES: usize = 1024;
const MAX_ENTRIES: u64 = 4096;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("{0}")]
    NotTiff(String),
    #[error("{0}")]
    Truncated(String),
}

impl From<GdalError> for LayoutError {
    fn from(err: GdalError) -> Self {
        LayoutError::Truncated(err.to_string())
    }
}

type LayoutResult<T> = std::result::Result<T, LayoutError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ByteOrder {
    little: bool,
}

impl ByteOrder {
    fn u16(self, b: &[u8]) -> u16 {
        let raw = [b[0], b[1]];
        if self.little {
            u16::from_le_bytes(raw)
        } else {
            u16::from_be_bytes(raw)
        }
    }

    fn u32(self, b: &[u8]) -> u32 {
        let raw = [b[0], b[1], b[2], b[3]];
        if self.little {
            u32::from_le_bytes(raw)
        } else {
            u32::from_be_bytes(raw)
        }
    }

    fn u64(self, b: &[u8]) -> u64 {
        let raw = [b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]];
        if self.little {
            u64::from_le_bytes(raw)
        } else {
            u64::from_be_bytes(raw)
        }
    }
}

/// The `GDAL_STRUCTURAL_METADATA` block GDAL writes right after the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralMetadata {
    pub declared_size: usize,
    pub content: String,
}

impl StructuralMetadata {
    fn has(&self, item: &str) -> bool {
        self.content.contains(item)
    }

    pub fn block_order_row_major(&self) -> bool {
        self.has("BLOCK_ORDER=ROW_MAJOR")
    }

    pub fn block_leader_size_as_uint4(&self) -> bool {
        self.has("BLOCK_LEADER=SIZE_AS_UINT4")
    }

    pub fn block_trailer_last_4_bytes_repeated(&self) -> bool {
        self.has("BLOCK_TRAILER=LAST_4_BYTES_REPEATED")
    }

    pub fn mask_interleaved_with_imagery(&self) -> bool {
        self.has("MASK_INTERLEAVED_WITH_IMAGERY=YES")
    }

    pub fn known_incompatible_edition(&self) -> bool {
        self.has("KNOWN_INCOMPATIBLE_EDITION=YES")
    }

    /// The `KEY=VALUE` lines, in file order.
    pub fn items(&self) -> Vec<(String, String)> {
        self.content
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
            .collect()
    }
}

/// One image file directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    pub offset: u64,
    pub subfile_type: u32,
    pub width: usize,
    pub height: usize,
    pub block_width: usize,
    pub block_height: usize,
    pub tiled: bool,
    pub samples_per_pixel: u16,
    pub planar_configuration: u16,
    pub compression: u16,
    pub block_offsets: Vec<u64>,
    pub block_byte_counts: Vec<u64>,
}

impl Directory {
    pub fn is_mask(&self) -> bool {
        self.subfile_type & FILETYPE_MASK != 0
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Blocks per row and per column.
    pub fn blocks(&self) -> (usize, usize) {
        (
            self.width.div_ceil(self.block_width.max(1)),
            self.height.div_ceil(self.block_height.max(1)),
        )
    }

    /// Offset and byte count of block `(x, y)` of the first band; zeros for
    /// a sparse block.
    ///
    /// The parser guarantees both arrays cover the block grid.
    pub fn block(&self, x: usize, y: usize) -> (u64, u64) {
        let (xblocks, _) = self.blocks();
        let index = y * xblocks + x;
        (
            self.block_offsets.get(index).copied().unwrap_or(0),
            self.block_byte_counts.get(index).copied().unwrap_or(0),
        )
    }

    /// First non-empty block offset in row-major order, 0 when fully sparse.
    pub fn first_block_offset(&self) -> u64 {
        self.block_offsets
            .iter()
            .copied()
            .find(|&offset| offset != 0)
            .unwrap_or(0)
    }
}

/// An imagery directory and its mask, if the file carries one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub image: Directory,
    pub mask: Option<Directory>,
}

/// The decoded container: header facts and the main image followed by its
/// overviews, each paired with its mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerLayout {
    pub big_tiff: bool,
    pub header_len: u64,
    pub first_ifd_offset: u64,
    pub structural_metadata: Option<StructuralMetadata>,
    pub levels: Vec<Level>,
}

impl ContainerLayout {
    pub fn main(&self) -> &Level {
        &self.levels[0]
    }

    pub fn overviews(&self) -> &[Level] {
        &self.levels[1..]
    }

    pub fn read(reader: &dyn RangeReader) -> LayoutResult<ContainerLayout> {
        let size = reader.size();
        if size < 8 {
            return Err(LayoutError::NotTiff(format!("file is only {size} bytes long")));
        }
        let head = reader.read_range(0, size.min(16) as usize)?;
        let order = match &head[0..2] {
            b"II" => ByteOrder { little: true },
            b"MM" => ByteOrder { little: false },
            _ => return Err(LayoutError::NotTiff("missing II/MM byte order mark".to_string())),
        };
        let (big_tiff, header_len, first_ifd_offset) = match order.u16(&head[2..4]) {
            42 => (false, 8, u64::from(order.u32(&head[4..8]))),
            43 => {
                if head.len() < 16 || order.u16(&head[4..6]) != 8 {
                    return Err(LayoutError::NotTiff("malformed BigTIFF header".to_string()));
                }
                (true, 16, order.u64(&head[8..16]))
            }
            version => {
                return Err(LayoutError::NotTiff(format!("unknown TIFF version {version}")))
            }
        };

        let parser = Parser {
            reader,
            order,
            big_tiff,
        };
        let structural_metadata = parser.structural_metadata(header_len)?;
        let directories = parser.directory_chain(first_ifd_offset)?;
        let levels = pair_masks(directories)?;

        Ok(ContainerLayout {
            big_tiff,
            header_len,
            first_ifd_offset,
            structural_metadata,
            levels,
        })
    }
}

/// Groups directories into levels: every imagery directory opens a level and
/// a mask directory of the same size attaches to the closest preceding one.
fn pair_masks(directories: Vec<Directory>) -> LayoutResult<Vec<Level>> {
    let mut levels: Vec<Level> = Vec::new();
    let mut orphan_masks = Vec::new();
    for dir in directories {
        if dir.is_mask() {
            match levels
                .iter_mut()
                .rev()
                .find(|l| l.mask.is_none() && l.image.size() == dir.size())
            {
                Some(level) => level.mask = Some(dir),
                None => orphan_masks.push(dir),
            }
        } else {
            levels.push(Level {
                image: dir,
                mask: None,
            });
        }
    }
    // Mask-first layouts put the mask ahead of its imagery.
    for dir in orphan_masks {
        if let Some(level) = levels
            .iter_mut()
            .find(|l| l.mask.is_none() && l.image.size() == dir.size())
        {
            level.mask = Some(dir);
        }
    }
    if levels.is_empty() {
        return Err(LayoutError::NotTiff("no imagery directory".to_string()));
    }
    Ok(levels)
}

struct Entry {
    field_type: u16,
    count: u64,
    inline: Vec<u8>,
}

struct Parser<'r> {
    reader: &'r dyn RangeReader,
    order: ByteOrder,
    big_tiff: bool,
}

impl Parser<'_> {
    fn structural_metadata(&self, header_len: u64) -> LayoutResult<Option<StructuralMetadata>> {
        let size = self.reader.size();
        if size < header_len + STRUCTURAL_METADATA_PREFIX_LEN as u64 {
            return Ok(None);
        }
        let prefix = self
            .reader
            .read_range(header_len, STRUCTURAL_METADATA_PREFIX_LEN)?;
        let Some(rest) = prefix.strip_prefix(STRUCTURAL_METADATA_KEY.as_bytes()) else {
            return Ok(None);
        };
        let declared_size = std::str::from_utf8(&rest[..6])
            .ok()
            .and_then(|digits| digits.parse::<usize>().ok())
            .ok_or_else(|| {
                LayoutError::Truncated("unparsable GDAL_STRUCTURAL_METADATA_SIZE".to_string())
            })?;
        let start = header_len + STRUCTURAL_METADATA_PREFIX_LEN as u64;
        let available = (size - start).min(declared_size as u64) as usize;
        let bytes = self.reader.read_range(start, available)?;
        Ok(Some(StructuralMetadata {
            declared_size,
            content: bytes.iter().map(|&b| b as char).collect(),
        }))
    }

    fn directory_chain(&self, first: u64) -> LayoutResult<Vec<Directory>> {
        let mut directories = Vec::new();
        let mut seen = HashSet::new();
        let mut offset = first;
        while offset != 0 {
            if !seen.insert(offset) {
                return Err(LayoutError::Truncated(format!(
                    "IFD chain loops back to offset {offset}"
                )));
            }
            if directories.len() == MAX_DIRECTORIES {
                return Err(LayoutError::Truncated(format!(
                    "more than {MAX_DIRECTORIES} IFDs"
                )));
            }
            let (dir, next) = self.directory(offset)?;
            directories.push(dir);
            offset = next;
        }
        if directories.is_empty() {
            return Err(LayoutError::NotTiff("first IFD offset is 0".to_string()));
        }
        Ok(directories)
    }

    fn directory(&self, offset: u64) -> LayoutResult<(Directory, u64)> {
        let (count_len, entry_len, next_len) = if self.big_tiff { (8, 20, 8) } else { (2, 12, 4) };
        let raw_count = self.reader.read_range(offset, count_len)?;
        let body_offset = offset.checked_add(count_len as u64).ok_or_else(|| {
            LayoutError::Truncated(format!("IFD offset {offset} is out of range"))
        })?;
        let count = if self.big_tiff {
            self.order.u64(&raw_count)
        } else {
            u64::from(self.order.u16(&raw_count))
        };
        if count > MAX_ENTRIES {
            return Err(LayoutError::Truncated(format!(
                "IFD at offset {offset} claims {count} entries"
            )));
        }
        let body = self
            .reader
            .read_range(body_offset, count as usize * entry_len + next_len)?;

        let mut entries = std::collections::HashMap::new();
        for raw in body[..count as usize * entry_len].chunks_exact(entry_len) {
            let tag = self.order.u16(&raw[0..2]);
            let field_type = self.order.u16(&raw[2..4]);
            let (count, inline) = if self.big_tiff {
                (self.order.u64(&raw[4..12]), raw[12..20].to_vec())
            } else {
                (u64::from(self.order.u32(&raw[4..8])), raw[8..12].to_vec())
            };
            entries.insert(
                tag,
                Entry {
                    field_type,
                    count,
                    inline,
                },
            );
        }
        let tail = &body[count as usize * entry_len..];
        let next = if self.big_tiff {
            self.order.u64(tail)
        } else {
            u64::from(self.order.u32(tail))
        };

        let scalar = |tag: u16| -> LayoutResult<Option<u64>> {
            match entries.get(&tag) {
                Some(entry) => Ok(self.values(entry)?.first().copied()),
                None => Ok(None),
            }
        };
        let array = |tag: u16| -> LayoutResult<Vec<u64>> {
            match entries.get(&tag) {
                Some(entry) => self.values(entry),
                None => Ok(Vec::new()),
            }
        };

        let width = scalar(TAG_IMAGE_WIDTH)?
            .ok_or_else(|| LayoutError::Truncated(format!("IFD at {offset} lacks ImageWidth")))?
            as usize;
        let height = scalar(TAG_IMAGE_LENGTH)?
            .ok_or_else(|| LayoutError::Truncated(format!("IFD at {offset} lacks ImageLength")))?
            as usize;
        let tiled = entries.contains_key(&TAG_TILE_OFFSETS);
        let (block_width, block_height, block_offsets, block_byte_counts) = if tiled {
            (
                scalar(TAG_TILE_WIDTH)?.unwrap_or(width as u64) as usize,
                scalar(TAG_TILE_LENGTH)?.unwrap_or(height as u64) as usize,
                array(TAG_TILE_OFFSETS)?,
                array(TAG_TILE_BYTE_COUNTS)?,
            )
        } else {
            (
                width,
                scalar(TAG_ROWS_PER_STRIP)?
                    .unwrap_or(height as u64)
                    .min(height as u64) as usize,
                array(TAG_STRIP_OFFSETS)?,
                array(TAG_STRIP_BYTE_COUNTS)?,
            )
        };

        let blocks = width
            .div_ceil(block_width.max(1))
            .checked_mul(height.div_ceil(block_height.max(1)))
            .ok_or_else(|| {
                LayoutError::Truncated(format!("IFD at {offset} declares an unaddressable {width}x{height} image"))
            })?;
        if block_offsets.len() != block_byte_counts.len() || block_offsets.len() < blocks {
            return Err(LayoutError::Truncated(format!(
                "IFD at {offset} lists {} block offsets and {} byte counts for {blocks} blocks",
                block_offsets.len(),
                block_byte_counts.len()
            )));
        }

        let dir = Directory {
            offset,
            subfile_type: scalar(TAG_NEW_SUBFILE_TYPE)?.unwrap_or(0) as u32,
            width,
            height,
            block_width,
            block_height,
            tiled,
            samples_per_pixel: scalar(TAG_SAMPLES_PER_PIXEL)?.unwrap_or(1) as u16,
            planar_configuration: scalar(TAG_PLANAR_CONFIGURATION)?.unwrap_or(1) as u16,
            compression: scalar(TAG_COMPRESSION)?.unwrap_or(1) as u16,
            block_offsets,
            block_byte_counts,
        };
        Ok((dir, next))
    }

    /// Unsigned integer values of an entry, inline or out of line.
    fn values(&self, entry: &Entry) -> LayoutResult<Vec<u64>> {
        let width = match entry.field_type {
            1 | 7 => 1,  // BYTE, UNDEFINED
            3 => 2,      // SHORT
            4 | 13 => 4, // LONG, IFD
            16 | 18 => 8, // LONG8, IFD8
            other => {
                return Err(LayoutError::Truncated(format!(
                    "unexpected field type {other} for an integer tag"
                )))
            }
        };
        let total = entry
            .count
            .checked_mul(width as u64)
            .filter(|&t| t <= self.reader.size())
            .ok_or_else(|| {
                LayoutError::Truncated(format!("tag array of {} values exceeds the file", entry.count))
            })? as usize;
        let raw = if total <= entry.inline.len() {
            entry.inline[..total].to_vec()
        } else {
            let offset = if self.big_tiff {
                self.order.u64(&entry.inline)
            } else {
                u64::from(self.order.u32(&entry.inline))
            };
            self.reader.read_range(offset, total)?
        };
        Ok(raw
            .chunks_exact(width)
            .map(|v| match width {
                1 => u64::from(v[0]),
                2 => u64::from(self.order.u16(v)),
                4 => u64::from(self.order.u32(v)),
                _ => self.order.u64(v),
            })
            .collect())
    }
}

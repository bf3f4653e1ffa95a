//! Hand-assembled cloud-optimized GeoTIFFs.
//!
//! The builder lays a little-endian TIFF (classic or BigTIFF) out the way
//! GDAL's COG driver does: optional structural metadata after the header,
//! every IFD before any imagery, imagery from the smallest overview to the
//! main image, and optional per-block leaders, trailers and interleaved
//! masks. Knobs exist to break each of those rules.

const TAG_NEW_SUBFILE_TYPE: u16 = 254;
const TAG_IMAGE_WIDTH: u16 = 256;
const TAG_IMAGE_LENGTH: u16 = 257;
const TAG_STRIP_OFFSETS: u16 = 273;
const TAG_SAMPLES_PER_PIXEL: u16 = 277;
const TAG_ROWS_PER_STRIP: u16 = 278;
const TAG_STRIP_BYTE_COUNTS: u16 = 279;
const TAG_TILE_WIDTH: u16 = 322;
const TAG_TILE_LENGTH: u16 = 323;
const TAG_TILE_OFFSETS: u16 = 324;
const TAG_TILE_BYTE_COUNTS: u16 = 325;

const SHORT: u16 = 3;
const LONG: u16 = 4;
const LONG8: u16 = 16;
const ENTRIES: usize = 7;

#[derive(Debug, Clone)]
pub struct CogBuilder {
    levels: Vec<(usize, usize)>,
    block: usize,
    block_bytes: usize,
    big_tiff: bool,
    strips: Vec<usize>,
    masks: bool,
    structural_metadata: bool,
    leader_trailer: bool,
    incompatible_edition: bool,
    declared_size_delta: i64,
    reverse_main_blocks: bool,
    mask_gap: usize,
    swapped_ifds: Option<(usize, usize)>,
    largest_first: bool,
    ifds_after_data: bool,
    forged_block_offset: Option<u64>,
}

/// Where one block landed in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRecord {
    /// 0 for the main image, `i + 1` for overview `i`.
    pub level: usize,
    pub mask: bool,
    pub x: usize,
    pub y: usize,
    pub offset: u64,
    pub count: u64,
}

#[derive(Debug, Clone)]
pub struct BuiltCog {
    pub bytes: Vec<u8>,
    pub first_ifd_offset: u64,
    /// Offset of the imagery IFD of each level, main image first.
    pub ifd_offsets: Vec<u64>,
    /// Length of the structural metadata text actually written.
    pub metadata_len: usize,
    pub blocks: Vec<BlockRecord>,
}

impl BuiltCog {
    pub fn block(&self, level: usize, mask: bool, x: usize, y: usize) -> BlockRecord {
        *self
            .blocks
            .iter()
            .find(|b| b.level == level && b.mask == mask && b.x == x && b.y == y)
            .expect("no such block")
    }
}

impl Default for CogBuilder {
    fn default() -> Self {
        Self {
            levels: vec![(1024, 1024), (512, 512), (256, 256)],
            block: 512,
            block_bytes: 16,
            big_tiff: false,
            strips: Vec::new(),
            masks: false,
            structural_metadata: true,
            leader_trailer: true,
            incompatible_edition: false,
            declared_size_delta: 0,
            reverse_main_blocks: false,
            mask_gap: 0,
            swapped_ifds: None,
            largest_first: false,
            ifds_after_data: false,
            forged_block_offset: None,
        }
    }
}

struct Dir {
    level: usize,
    mask: bool,
    strips: bool,
    width: usize,
    height: usize,
    offset: u64,
    arrays_offset: u64,
    blocks: usize,
}

impl Dir {
    fn subfile_type(&self) -> u64 {
        let reduced = if self.level > 0 { 1 } else { 0 };
        let mask = if self.mask { 4 } else { 0 };
        reduced | mask
    }
}

impl CogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Main image size followed by overview sizes.
    pub fn levels(mut self, levels: &[(usize, usize)]) -> Self {
        self.levels = levels.to_vec();
        self
    }

    pub fn masks(mut self, masks: bool) -> Self {
        self.masks = masks;
        self
    }

    pub fn structural_metadata(mut self, present: bool) -> Self {
        self.structural_metadata = present;
        self
    }

    pub fn leader_trailer(mut self, present: bool) -> Self {
        self.leader_trailer = present;
        self
    }

    pub fn incompatible_edition(mut self, yes: bool) -> Self {
        self.incompatible_edition = yes;
        self
    }

    /// Declares a structural metadata size off by `delta` bytes.
    pub fn declared_size_delta(mut self, delta: i64) -> Self {
        self.declared_size_delta = delta;
        self
    }

    /// Writes the main image blocks in reverse row-major order.
    pub fn reverse_main_blocks(mut self, reverse: bool) -> Self {
        self.reverse_main_blocks = reverse;
        self
    }

    /// Padding inserted between each image block and its mask block.
    pub fn mask_gap(mut self, gap: usize) -> Self {
        self.mask_gap = gap;
        self
    }

    pub fn big_tiff(mut self, big_tiff: bool) -> Self {
        self.big_tiff = big_tiff;
        self
    }

    /// Stores `level` as full-width strips instead of tiles.
    pub fn strips(mut self, level: usize) -> Self {
        self.strips.push(level);
        self
    }

    /// Swaps where the IFDs of two levels sit in the file, keeping the
    /// chain in level order.
    pub fn swap_ifds(mut self, a: usize, b: usize) -> Self {
        self.swapped_ifds = Some((a, b));
        self
    }

    /// Writes the main image blocks first and the smallest overview last.
    pub fn largest_first(mut self, yes: bool) -> Self {
        self.largest_first = yes;
        self
    }

    /// Places every IFD after the imagery.
    pub fn ifds_after_data(mut self, yes: bool) -> Self {
        self.ifds_after_data = yes;
        self
    }

    /// Points block (0, 0) of the main image at `offset`. Offsets past
    /// `u32::MAX` need [`CogBuilder::big_tiff`].
    pub fn forged_block_offset(mut self, offset: u64) -> Self {
        self.forged_block_offset = Some(offset);
        self
    }

    fn word(&self) -> u64 {
        if self.big_tiff {
            8
        } else {
            4
        }
    }

    fn ifd_len(&self) -> u64 {
        if self.big_tiff {
            8 + 20 * ENTRIES as u64 + 8
        } else {
            2 + 12 * ENTRIES as u64 + 4
        }
    }

    fn metadata_text(&self) -> String {
        let mut text = String::from("LAYOUT=IFDS_BEFORE_DATA\nBLOCK_ORDER=ROW_MAJOR\n");
        if self.leader_trailer {
            text.push_str("BLOCK_LEADER=SIZE_AS_UINT4\nBLOCK_TRAILER=LAST_4_BYTES_REPEATED\n");
        }
        if self.masks {
            text.push_str("MASK_INTERLEAVED_WITH_IMAGERY=YES\n");
        }
        if self.incompatible_edition {
            text.push_str("KNOWN_INCOMPATIBLE_EDITION=YES\n");
        } else {
            text.push_str("KNOWN_INCOMPATIBLE_EDITION=NO\n");
        }
        text
    }

    fn blocks_of(&self, level: usize) -> (usize, usize) {
        let (width, height) = self.levels[level];
        if self.strips.contains(&level) {
            (1, height.div_ceil(self.block))
        } else {
            (width.div_ceil(self.block), height.div_ceil(self.block))
        }
    }

    fn mask_flags(&self) -> &'static [bool] {
        if self.masks {
            &[false, true]
        } else {
            &[false]
        }
    }

    pub fn build(&self) -> BuiltCog {
        let mut bytes = if self.big_tiff {
            let mut header = b"II+\0".to_vec();
            header.extend_from_slice(&8u16.to_le_bytes());
            header.extend_from_slice(&0u16.to_le_bytes());
            header.extend_from_slice(&0u64.to_le_bytes());
            header
        } else {
            b"II*\0\0\0\0\0".to_vec()
        };

        let mut metadata_len = 0;
        if self.structural_metadata {
            let text = self.metadata_text();
            metadata_len = text.len();
            let declared = (text.len() as i64 + self.declared_size_delta) as usize;
            bytes.extend_from_slice(
                format!("GDAL_STRUCTURAL_METADATA_SIZE={declared:06} bytes\n").as_bytes(),
            );
            bytes.extend_from_slice(text.as_bytes());
            if bytes.len() % 2 == 1 {
                bytes.push(b' ');
            }
        }
        let header_end = bytes.len() as u64;

        // Imagery, smallest overview first unless asked otherwise. Offsets
        // are relative to the start of the imagery until it is placed.
        let mut records = Vec::new();
        let mut data = Vec::new();
        let mut level_order: Vec<usize> = (0..self.levels.len()).rev().collect();
        if self.largest_first {
            level_order.reverse();
        }
        for level in level_order {
            let (bx, by) = self.blocks_of(level);
            let mut order: Vec<(usize, usize)> =
                (0..by).flat_map(|y| (0..bx).map(move |x| (x, y))).collect();
            if level == 0 && self.reverse_main_blocks {
                order.reverse();
            }
            for (x, y) in order {
                for &mask in self.mask_flags() {
                    if mask {
                        data.extend(std::iter::repeat(0u8).take(self.mask_gap));
                    }
                    let payload: Vec<u8> = (0..self.block_bytes)
                        .map(|i| (level * 31 + x * 7 + y * 13 + i + usize::from(mask) * 101) as u8)
                        .collect();
                    if self.leader_trailer {
                        data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
                    }
                    let offset = data.len() as u64;
                    data.extend_from_slice(&payload);
                    if self.leader_trailer {
                        data.extend_from_slice(&payload[payload.len() - 4..]);
                    }
                    records.push(BlockRecord {
                        level,
                        mask,
                        x,
                        y,
                        offset,
                        count: payload.len() as u64,
                    });
                }
            }
        }

        // Directories in chain order.
        let mut dirs = Vec::new();
        for (level, &(width, height)) in self.levels.iter().enumerate() {
            for &mask in self.mask_flags() {
                let (bx, by) = self.blocks_of(level);
                dirs.push(Dir {
                    level,
                    mask,
                    strips: self.strips.contains(&level),
                    width,
                    height,
                    offset: 0,
                    arrays_offset: 0,
                    blocks: bx * by,
                });
            }
        }
        let word = self.word();
        let dir_len = |d: &Dir| self.ifd_len() + if d.blocks > 1 { 2 * word * d.blocks as u64 } else { 0 };
        let ifds_len: u64 = dirs.iter().map(dir_len).sum();
        let (ifd_start, data_start) = if self.ifds_after_data {
            (header_end + data.len() as u64, header_end)
        } else {
            (header_end, header_end + ifds_len)
        };
        for record in &mut records {
            record.offset += data_start;
        }

        let slot = |level: usize| match self.swapped_ifds {
            Some((a, b)) if level == a => b,
            Some((a, b)) if level == b => a,
            _ => level,
        };
        let mut physical: Vec<usize> = (0..dirs.len()).collect();
        physical.sort_by_key(|&i| (slot(dirs[i].level), dirs[i].mask));
        let mut cursor = ifd_start;
        for &i in &physical {
            let len = dir_len(&dirs[i]);
            let dir = &mut dirs[i];
            dir.offset = cursor;
            dir.arrays_offset = cursor + self.ifd_len();
            cursor += len;
        }

        let first_ifd_offset = dirs[0].offset;
        if self.big_tiff {
            bytes[8..16].copy_from_slice(&first_ifd_offset.to_le_bytes());
        } else {
            bytes[4..8].copy_from_slice(&(first_ifd_offset as u32).to_le_bytes());
        }

        if self.ifds_after_data {
            bytes.extend_from_slice(&data);
        }
        for &i in &physical {
            let dir = &dirs[i];
            let next = dirs.get(i + 1).map(|d| d.offset).unwrap_or(0);
            let (bx, by) = self.blocks_of(dir.level);
            let mut offsets = Vec::with_capacity(dir.blocks);
            let mut counts = Vec::with_capacity(dir.blocks);
            for y in 0..by {
                for x in 0..bx {
                    let record = records
                        .iter()
                        .find(|r| r.level == dir.level && r.mask == dir.mask && r.x == x && r.y == y)
                        .expect("block placed");
                    let forged = self
                        .forged_block_offset
                        .filter(|_| dir.level == 0 && !dir.mask && (x, y) == (0, 0));
                    offsets.push(forged.unwrap_or(record.offset));
                    counts.push(record.count);
                }
            }
            self.write_ifd(&mut bytes, dir, &offsets, &counts, next);
        }
        if !self.ifds_after_data {
            bytes.extend_from_slice(&data);
        }

        BuiltCog {
            bytes,
            first_ifd_offset,
            ifd_offsets: dirs.iter().filter(|d| !d.mask).map(|d| d.offset).collect(),
            metadata_len,
            blocks: records,
        }
    }

    fn write_ifd(&self, bytes: &mut Vec<u8>, dir: &Dir, offsets: &[u64], counts: &[u64], next: u64) {
        assert_eq!(bytes.len() as u64, dir.offset);
        let word = self.word() as usize;
        let array_type = if self.big_tiff { LONG8 } else { LONG };
        let blocks = dir.blocks as u64;
        let (offsets_value, counts_value) = if dir.blocks == 1 {
            (offsets[0], counts[0])
        } else {
            (dir.arrays_offset, dir.arrays_offset + word as u64 * blocks)
        };
        let head = [
            (TAG_NEW_SUBFILE_TYPE, LONG, 1, dir.subfile_type()),
            (TAG_IMAGE_WIDTH, LONG, 1, dir.width as u64),
            (TAG_IMAGE_LENGTH, LONG, 1, dir.height as u64),
        ];
        let layout = if dir.strips {
            [
                (TAG_STRIP_OFFSETS, array_type, blocks, offsets_value),
                (TAG_SAMPLES_PER_PIXEL, SHORT, 1, 1),
                (TAG_ROWS_PER_STRIP, LONG, 1, self.block as u64),
                (TAG_STRIP_BYTE_COUNTS, array_type, blocks, counts_value),
            ]
        } else {
            [
                (TAG_TILE_WIDTH, SHORT, 1, self.block as u64),
                (TAG_TILE_LENGTH, SHORT, 1, self.block as u64),
                (TAG_TILE_OFFSETS, array_type, blocks, offsets_value),
                (TAG_TILE_BYTE_COUNTS, array_type, blocks, counts_value),
            ]
        };

        if self.big_tiff {
            bytes.extend_from_slice(&(ENTRIES as u64).to_le_bytes());
        } else {
            bytes.extend_from_slice(&(ENTRIES as u16).to_le_bytes());
        }
        for (tag, field_type, count, value) in head.into_iter().chain(layout) {
            bytes.extend_from_slice(&tag.to_le_bytes());
            bytes.extend_from_slice(&field_type.to_le_bytes());
            bytes.extend_from_slice(&count.to_le_bytes()[..word]);
            let type_width = match field_type {
                SHORT => 2,
                LONG => 4,
                _ => 8,
            };
            bytes.extend_from_slice(&value.to_le_bytes()[..type_width]);
            bytes.extend(std::iter::repeat(0u8).take(word - type_width));
        }
        bytes.extend_from_slice(&next.to_le_bytes()[..word]);
        if dir.blocks > 1 {
            for value in offsets.iter().chain(counts) {
                bytes.extend_from_slice(&value.to_le_bytes()[..word]);
            }
        }
    }
}

//! 4 KiB block marker arithmetic.
//!
//! CouchDB writes one marker byte at every file position that is a multiple
//! of [`BLOCK_SIZE`]. The marker says whether the block starts a header
//! (`1`) or not (`0`); it is never part of the data flowing across it.

/// Alignment of header blocks and marker bytes.
pub const BLOCK_SIZE: u64 = 4096;

/// Number of raw file bytes occupied by `size` logical bytes starting at
/// raw position `offset`.
///
/// A marker at `offset` itself counts: data that starts on a boundary
/// begins right after that boundary's marker.
pub fn raw_len(offset: u64, size: usize) -> usize {
    let size = size as u64;
    let mut raw = size;
    loop {
        let markers = markers_in(offset, raw);
        if size + markers == raw {
            return raw as usize;
        }
        raw = size + markers;
    }
}

/// Count of block boundaries in `[offset, offset + len)`.
fn markers_in(offset: u64, len: u64) -> u64 {
    if len == 0 {
        return 0;
    }
    let first = offset.div_ceil(BLOCK_SIZE);
    let last = (offset + len - 1) / BLOCK_SIZE;
    if last < first {
        0
    } else {
        last - first + 1
    }
}

/// Remove the marker bytes from `raw`, which was read at file position
/// `offset`.
pub fn strip_markers(raw: &[u8], offset: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut pos = 0usize;
    while pos < raw.len() {
        let abs = offset + pos as u64;
        if abs % BLOCK_SIZE == 0 {
            pos += 1;
            continue;
        }
        let to_boundary = (BLOCK_SIZE - abs % BLOCK_SIZE) as usize;
        let end = raw.len().min(pos + to_boundary);
        out.extend_from_slice(&raw[pos..end]);
        pos = end;
    }
    out
}

/// Inverse of [`strip_markers`]: lay `logical` out as it would appear on
/// disk at `offset`, with `marker` written at every boundary it crosses.
pub fn insert_markers(logical: &[u8], offset: u64, marker: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw_len(offset, logical.len()));
    let mut rest = logical;
    let mut abs = offset;
    while !rest.is_empty() {
        if abs % BLOCK_SIZE == 0 {
            out.push(marker);
            abs += 1;
            continue;
        }
        let take = rest.len().min((BLOCK_SIZE - abs % BLOCK_SIZE) as usize);
        out.extend_from_slice(&rest[..take]);
        rest = &rest[take..];
        abs += take as u64;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn no_boundary_inside() {
        assert_eq!(raw_len(100, 50), 50);
        assert_eq!(raw_len(4097, 4095), 4095);
    }

    #[test]
    fn aligned_start_skips_leading_marker() {
        assert_eq!(raw_len(0, 1), 2);
        assert_eq!(raw_len(4096, 10), 11);
        let raw = [0u8, 7, 8, 9];
        assert_eq!(strip_markers(&raw, 4096), vec![7, 8, 9]);
    }

    #[test]
    fn range_ending_on_boundary_does_not_include_it() {
        // [4000, 4096) holds exactly 96 bytes with no marker.
        assert_eq!(raw_len(4000, 96), 96);
        assert_eq!(raw_len(4000, 97), 98);
    }

    #[test]
    fn multiple_boundaries() {
        // 10_000 logical bytes from 10 cross boundaries at 4096 and 8192.
        assert_eq!(raw_len(10, 10_000), 10_002);
        // Markers push the end past a third boundary.
        assert_eq!(raw_len(1, 3 * 4095), 3 * 4095 + 2);
        assert_eq!(raw_len(1, 3 * 4095 + 1), 3 * 4095 + 4);
    }

    #[test]
    fn strip_known_layout() {
        let mut raw: Vec<u8> = (0..10).collect();
        raw.insert(6, 0xEE); // boundary at 4096 for a read starting at 4090
        assert_eq!(raw_len(4090, 10), 11);
        assert_eq!(strip_markers(&raw, 4090), (0..10).collect::<Vec<u8>>());
    }

    proptest! {
        #[test]
        fn frame_then_strip_is_identity(
            data in proptest::collection::vec(any::<u8>(), 0..12_000),
            offset in 0u64..20_000,
        ) {
            let framed = insert_markers(&data, offset, 0);
            prop_assert_eq!(framed.len(), raw_len(offset, data.len()));
            prop_assert_eq!(strip_markers(&framed, offset), data);
        }

        #[test]
        fn block_aligned_offsets(
            data in proptest::collection::vec(any::<u8>(), 1..9000),
            block in 0u64..4
        ) {
            let offset = block * BLOCK_SIZE;
            let framed = insert_markers(&data, offset, 1);
            prop_assert_eq!(framed[0], 1);
            prop_assert_eq!(strip_markers(&framed, offset), data);
        }
    }
}

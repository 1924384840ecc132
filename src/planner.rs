//! Partitioning of result columns into fetch blocks.
//!
//! Fixed-length columns next to each other are fetched together in one request per row. A long
//! column can only be fetched alone, one segment at a time, so it always gets a block of its own.

use serde::Serialize;

use crate::descriptor::ColumnDescriptor;

/// Buffer size for a segmented column whose declared length is too small to hold a segment.
pub const DEFAULT_SEGMENT_LEN: usize = 2002;

/// Length prefix carried by every segment.
pub const SEGMENT_PREFIX_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BlockKind {
    Fixed,
    Segmented,
}

/// A contiguous run of columns fetched with one request, or a single segmented column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnBlock {
    pub kind: BlockKind,
    pub start: usize,
    pub count: usize,
}

impl ColumnBlock {
    #[must_use]
    pub fn columns(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.count
    }

    #[must_use]
    pub fn is_segmented(&self) -> bool {
        self.kind == BlockKind::Segmented
    }
}

/// Split `columns` into blocks covering every column once, in ordinal order.
#[must_use]
pub fn plan(columns: &[ColumnDescriptor]) -> Vec<ColumnBlock> {
    let mut blocks = Vec::new();
    let mut start = 0;

    for (current, column) in columns.iter().enumerate() {
        if !column.is_long() {
            continue;
        }
        if current > start {
            blocks.push(ColumnBlock {
                kind: BlockKind::Fixed,
                start,
                count: current - start,
            });
        }
        blocks.push(ColumnBlock {
            kind: BlockKind::Segmented,
            start: current,
            count: 1,
        });
        start = current + 1;
    }

    if columns.len() > start {
        blocks.push(ColumnBlock {
            kind: BlockKind::Fixed,
            start,
            count: columns.len() - start,
        });
    }

    blocks
}

/// Size of the per-column receive buffer.
#[must_use]
pub fn buffer_len(column: &ColumnDescriptor) -> usize {
    let declared = usize::from(column.length);
    if column.is_long() && declared <= SEGMENT_PREFIX_LEN {
        DEFAULT_SEGMENT_LEN
    } else {
        declared
    }
}

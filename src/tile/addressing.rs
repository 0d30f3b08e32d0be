//! Tile addressing in Morton (Z-order).
//!
//! A collection is one flat, ordered list of images. At the deepest zoom level
//! every tile shows exactly one image; one level up, a tile shows a 2x2 block,
//! and so on. Images are laid out in Z-order so the four children of any tile
//! are the four indices formed by appending two bits to the parent's index:
//!
//! ```text
//!  zoom = max - 1, tile (0,0)        zoom = max
//!  ┌─────────┬─────────┐
//!  │ 0 = 00  │ 1 = 01  │             one tile per index,
//!  ├─────────┼─────────┤             tile (col,row) -> morton(row, col)
//!  │ 2 = 10  │ 3 = 11  │
//!  └─────────┴─────────┘
//! ```
//!
//! The row coordinate supplies the odd bits and the column the even bits, so
//! neighbours along a row are adjacent in the list.

/// Spread the bits of `v` so bit `i` lands at bit `2i`.
#[inline]
fn spread(v: u32) -> u64 {
    let mut x = v as u64;
    x = (x | (x << 16)) & 0x0000_FFFF_0000_FFFF;
    x = (x | (x << 8)) & 0x00FF_00FF_00FF_00FF;
    x = (x | (x << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    x = (x | (x << 2)) & 0x3333_3333_3333_3333;
    x = (x | (x << 1)) & 0x5555_5555_5555_5555;
    x
}

/// Inverse of [`spread`]: gather the even bits of `x`.
#[inline]
fn compact(x: u64) -> u32 {
    let mut x = x & 0x5555_5555_5555_5555;
    x = (x | (x >> 1)) & 0x3333_3333_3333_3333;
    x = (x | (x >> 2)) & 0x0F0F_0F0F_0F0F_0F0F;
    x = (x | (x >> 4)) & 0x00FF_00FF_00FF_00FF;
    x = (x | (x >> 8)) & 0x0000_FFFF_0000_FFFF;
    x = (x | (x >> 16)) & 0x0000_0000_FFFF_FFFF;
    x as u32
}

/// Interleave two coordinates into a Morton code.
///
/// Bit `i` of `a` becomes bit `2i + 1` of the result and bit `i` of `b`
/// becomes bit `2i`, so `morton(1, 0) == 2` and `morton(0, 1) == 1`.
#[inline]
pub fn morton(a: u32, b: u32) -> u64 {
    (spread(a) << 1) | spread(b)
}

/// Split a Morton code back into `(a, b)`.
#[inline]
pub fn unmorton(code: u64) -> (u32, u32) {
    (compact(code >> 1), compact(code))
}

/// One grid cell of a tile and the global image index it shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellIndex {
    /// Cell column inside the tile (0..resize_factor)
    pub x: u32,
    /// Cell row inside the tile (0..resize_factor)
    pub y: u32,
    /// Global image index
    pub index: u64,
}

/// Map a tile to the image indices composited into it.
///
/// Returns up to `resize_factor * resize_factor` cells in row-major order.
/// Cell `(x, y)` shows image `morton(resize_factor * row + y,
/// resize_factor * column + x)`. Cells whose coordinates overflow are
/// omitted; callers must also skip indices beyond their image count.
pub fn select_indices(resize_factor: u32, column: u32, row: u32) -> Vec<CellIndex> {
    let mut cells = Vec::with_capacity((resize_factor as usize).pow(2));
    for y in 0..resize_factor {
        for x in 0..resize_factor {
            let a = resize_factor.checked_mul(row).and_then(|v| v.checked_add(y));
            let b = resize_factor
                .checked_mul(column)
                .and_then(|v| v.checked_add(x));
            if let (Some(a), Some(b)) = (a, b) {
                cells.push(CellIndex {
                    x,
                    y,
                    index: morton(a, b),
                });
            }
        }
    }
    cells
}

/// Resize factor for a zoom level: `2^(max_zoom - zoom)`.
///
/// Returns `None` when `zoom` is above `max_zoom`.
pub fn resize_factor(zoom: u32, max_zoom: u32) -> Option<u32> {
    max_zoom
        .checked_sub(zoom)
        .and_then(|shift| 1u32.checked_shl(shift))
}

// =============================================================================
// Tests
// =============================================================================

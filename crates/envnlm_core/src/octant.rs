//! Octant labels and the finite rotation table acting on them.
//!
//! An octant is a 3-bit label built from the signs of a relative offset:
//! bit 2 is the w sign, bit 1 the v sign, bit 0 the u sign. A set bit means
//! the component is non-negative, so `0b111` is the all-positive octant.
//!
//! The [`RotationTable`] holds the 10 relabelings used when comparing
//! environments: identity, then 90/180/270 degree turns about w, v and u.

/// Number of octants around a point.
pub const OCTANTS: usize = 8;

/// Number of rotations compared: 9 proper turns plus the identity.
pub const ROTATIONS: usize = 10;

/// The all-positive octant, which never receives the central value.
pub const FAR_OCTANT: usize = 0b111;

const BIT_U: u8 = 0b001;
const BIT_V: u8 = 0b010;
const BIT_W: u8 = 0b100;

/// Lattice axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    U,
    V,
    W,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::W, Axis::V, Axis::U];

    #[inline]
    fn bit(self) -> u8 {
        match self {
            Axis::U => BIT_U,
            Axis::V => BIT_V,
            Axis::W => BIT_W,
        }
    }
}

/// Octant label in `0..8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Octant(u8);

impl Octant {
    /// Wrap a raw label. Only the low three bits are kept.
    #[inline]
    pub const fn new(bits: u8) -> Self {
        Self(bits & 0b111)
    }

    /// Classify an offset; zero components count as non-negative.
    #[inline]
    pub fn from_offset(offset: [isize; 3]) -> Self {
        let bu = if offset[0] >= 0 { BIT_U } else { 0 };
        let bv = if offset[1] >= 0 { BIT_V } else { 0 };
        let bw = if offset[2] >= 0 { BIT_W } else { 0 };
        Self(bw | bv | bu)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn is_positive(self, axis: Axis) -> bool {
        self.0 & axis.bit() != 0
    }

    /// Same octant with the sign along `axis` flipped.
    #[inline]
    pub fn mirrored(self, axis: Axis) -> Self {
        Self(self.0 ^ axis.bit())
    }

    /// Position of this octant after a single 90 degree turn about `axis`.
    ///
    /// The axis bit is held fixed; of the other two, the first takes the
    /// complement of the second and the second takes the first:
    /// about w `(u, v) -> (!v, u)`, about v `(u, w) -> (!w, u)`,
    /// about u `(v, w) -> (!w, v)`.
    #[inline]
    pub fn quarter_turn(self, axis: Axis) -> Self {
        let bit = |b: u8| (self.0 & b != 0) as u8;
        let (u, v, w) = (bit(BIT_U), bit(BIT_V), bit(BIT_W));
        let (u, v, w) = match axis {
            Axis::W => (1 - v, u, w),
            Axis::V => (1 - w, v, u),
            Axis::U => (u, 1 - w, v),
        };
        Self((w << 2) | (v << 1) | u)
    }

    /// Position after `quarters` successive 90 degree turns about `axis`.
    pub fn rotated(self, axis: Axis, quarters: usize) -> Self {
        (0..quarters % 4).fold(self, |o, _| o.quarter_turn(axis))
    }
}

/// Fixed `10 x 8` table: `table[r][o]` is the octant `o` maps to under
/// rotation `r`.
///
/// Row 0 is the identity; rows 1-3 turn about w, rows 4-6 about v and
/// rows 7-9 about u, by 90, 180 and 270 degrees. Built once and passed by
/// reference into the comparator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationTable {
    table: [[u8; OCTANTS]; ROTATIONS],
}

impl RotationTable {
    pub fn new() -> Self {
        let mut table = [[0u8; OCTANTS]; ROTATIONS];
        for (o, slot) in table[0].iter_mut().enumerate() {
            *slot = o as u8;
        }
        for (axis_idx, axis) in Axis::ALL.iter().enumerate() {
            for quarters in 1..=3 {
                let row = 1 + axis_idx * 3 + (quarters - 1);
                for o in 0..OCTANTS {
                    table[row][o] = Octant::new(o as u8).rotated(*axis, quarters).0;
                }
            }
        }
        Self { table }
    }

    /// Rotated label for octant `o` under rotation `r`.
    #[inline(always)]
    pub fn get(&self, r: usize, o: usize) -> usize {
        self.table[r][o] as usize
    }

    #[inline]
    pub fn row(&self, r: usize) -> &[u8; OCTANTS] {
        &self.table[r]
    }

    pub fn rows(&self) -> &[[u8; OCTANTS]; ROTATIONS] {
        &self.table
    }
}

impl Default for RotationTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_permutation(row: &[u8; OCTANTS]) -> bool {
        let mut seen = [false; OCTANTS];
        for &o in row {
            if seen[o as usize] {
                return false;
            }
            seen[o as usize] = true;
        }
        seen.iter().all(|&s| s)
    }

    // ==================== Octant Tests ====================

    #[test]
    fn test_octant_from_offset() {
        assert_eq!(Octant::from_offset([1, 1, 1]).index(), 7);
        assert_eq!(Octant::from_offset([0, 0, 0]).index(), 7);
        assert_eq!(Octant::from_offset([-1, -1, -1]).index(), 0);
        assert_eq!(Octant::from_offset([1, -1, -1]).index(), 0b001);
        assert_eq!(Octant::from_offset([-1, 2, -1]).index(), 0b010);
        assert_eq!(Octant::from_offset([-3, -1, 0]).index(), 0b100);
    }

    #[test]
    fn test_octant_mirrored() {
        let o = Octant::new(0b101);
        assert_eq!(o.mirrored(Axis::U).index(), 0b100);
        assert_eq!(o.mirrored(Axis::V).index(), 0b111);
        assert_eq!(o.mirrored(Axis::W).index(), 0b001);
        assert!(o.is_positive(Axis::W));
        assert!(!o.is_positive(Axis::V));
    }

    #[test]
    fn test_quarter_turn_keeps_axis_bit() {
        for o in 0..8u8 {
            let oct = Octant::new(o);
            for axis in Axis::ALL {
                assert_eq!(
                    oct.quarter_turn(axis).is_positive(axis),
                    oct.is_positive(axis),
                    "axis bit changed for {:?} about {:?}",
                    oct,
                    axis
                );
            }
        }
    }

    #[test]
    fn test_half_turns_closed_form() {
        // 180 degrees about w flips both u and v
        for o in 0..8u8 {
            let oct = Octant::new(o);
            assert_eq!(oct.rotated(Axis::W, 2).index(), (o ^ 0b011) as usize);
            assert_eq!(oct.rotated(Axis::V, 2).index(), (o ^ 0b101) as usize);
            assert_eq!(oct.rotated(Axis::U, 2).index(), (o ^ 0b110) as usize);
        }
        // 90 about w: (u, v) -> (!v, u)
        assert_eq!(Octant::new(0b001).quarter_turn(Axis::W).index(), 0b011);
        assert_eq!(Octant::new(0b010).quarter_turn(Axis::W).index(), 0b000);
    }

    // ==================== RotationTable Tests ====================

    #[test]
    fn test_rows_are_permutations() {
        let table = RotationTable::new();
        for (r, row) in table.rows().iter().enumerate() {
            assert!(is_permutation(row), "row {}: {:?}", r, row);
        }
    }

    #[test]
    fn test_row_zero_is_identity() {
        let table = RotationTable::new();
        for o in 0..OCTANTS {
            assert_eq!(table.get(0, o), o);
        }
    }

    #[test]
    fn test_four_quarter_turns_close() {
        for axis in Axis::ALL {
            for o in 0..8u8 {
                let oct = Octant::new(o);
                let back = (0..4).fold(oct, |acc, _| acc.quarter_turn(axis));
                assert_eq!(back, oct, "four turns about {:?} did not close", axis);
            }
        }
    }

    #[test]
    fn test_table_rows_compose() {
        // Row for 180 equals row for 90 applied twice; 270 is 90 three times.
        let table = RotationTable::new();
        for axis_idx in 0..3 {
            let r90 = 1 + axis_idx * 3;
            for o in 0..OCTANTS {
                let twice = table.get(r90, table.get(r90, o));
                let thrice = table.get(r90, twice);
                assert_eq!(table.get(r90 + 1, o), twice);
                assert_eq!(table.get(r90 + 2, o), thrice);
                assert_eq!(table.get(r90, thrice), o);
            }
        }
    }

    #[test]
    fn test_rows_distinct() {
        let table = RotationTable::new();
        for a in 0..ROTATIONS {
            for b in (a + 1)..ROTATIONS {
                assert_ne!(table.row(a), table.row(b), "rows {} and {} coincide", a, b);
            }
        }
    }

    #[test]
    fn test_known_rows() {
        let table = RotationTable::new();
        // 90 degrees about w
        assert_eq!(table.row(1), &[1, 3, 0, 2, 5, 7, 4, 6]);
        // 180 degrees about w
        assert_eq!(table.row(2), &[3, 2, 1, 0, 7, 6, 5, 4]);
    }
}

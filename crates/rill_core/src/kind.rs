//! Value kinds and the kind-byte encoding.
//!
//! The second byte of a cell header is the "kind byte".  Values 0..64 are
//! concrete datatypes (0 is reserved for the end-of-sequence marker, so any
//! raw scan can stop on a single byte test).  Values 64 and above encode up
//! to three stacked quote levels in the same byte: `byte = kind + 64 * depth`.
//! Deeper quoting does not fit and overflows into a heap pairing, at which
//! point the kind becomes the generic `Quoted`.

/// Concrete value kinds.  Must stay below [`MAX_KIND`] so three quote levels
/// fit in the byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    /// End-of-sequence marker, reserved discriminant 0.
    End = 0,
    Nulled = 1,
    Blank = 2,
    Logic = 3,
    Integer = 4,
    Decimal = 5,
    Word = 6,
    SetWord = 7,
    GetWord = 8,
    Block = 9,
    Group = 10,
    Text = 11,
    Object = 12,
    Action = 13,
    /// Field descriptor living in keylists/paramlists, not user-visible.
    Key = 14,
    /// Generic escaped value whose payload points at an overflow pairing.
    Quoted = 15,
}

/// Exclusive upper bound on concrete kind discriminants.
pub const MAX_KIND: u8 = 64;

/// Deepest quote level the kind byte can encode inline.
pub const MAX_INLINE_QUOTE: u8 = 3;

impl Kind {
    pub const COUNT: usize = 16;

    /// Recover a kind from its discriminant.  Panics on out-of-range input,
    /// which indicates a corrupt kind byte.
    pub fn from_byte(b: u8) -> Kind {
        assert!(b < MAX_KIND, "corrupt kind byte: {b}");
        match b {
            0 => Kind::End,
            1 => Kind::Nulled,
            2 => Kind::Blank,
            3 => Kind::Logic,
            4 => Kind::Integer,
            5 => Kind::Decimal,
            6 => Kind::Word,
            7 => Kind::SetWord,
            8 => Kind::GetWord,
            9 => Kind::Block,
            10 => Kind::Group,
            11 => Kind::Text,
            12 => Kind::Object,
            13 => Kind::Action,
            14 => Kind::Key,
            15 => Kind::Quoted,
            _ => panic!("unassigned kind byte: {b}"),
        }
    }

    /// True for kinds whose payload references an array of cells.
    pub fn is_array_kind(self) -> bool {
        matches!(self, Kind::Block | Kind::Group)
    }

    /// Words in all their evaluator flavors.
    pub fn is_word_kind(self) -> bool {
        matches!(self, Kind::Word | Kind::SetWord | Kind::GetWord)
    }
}

/// A set of kinds, as a bitmask over discriminants.  Used for parameter type
/// constraints and for the deep-copy recursion filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeSet(pub u64);

impl TypeSet {
    pub const NONE: TypeSet = TypeSet(0);
    /// Every concrete kind except the end marker.
    pub const ANY: TypeSet = TypeSet(!1);

    pub const fn just(kind: Kind) -> TypeSet {
        TypeSet(1 << kind as u8)
    }

    pub const fn with(self, kind: Kind) -> TypeSet {
        TypeSet(self.0 | 1 << kind as u8)
    }

    pub const fn without(self, kind: Kind) -> TypeSet {
        TypeSet(self.0 & !(1 << kind as u8))
    }

    pub fn contains(self, kind: Kind) -> bool {
        self.0 & (1 << kind as u8) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl core::ops::BitOr for TypeSet {
    type Output = TypeSet;
    fn bitor(self, rhs: TypeSet) -> TypeSet {
        TypeSet(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_marker_is_zero() {
        assert_eq!(Kind::End as u8, 0);
    }

    #[test]
    fn kinds_round_trip_through_bytes() {
        for b in 0..Kind::COUNT as u8 {
            assert_eq!(Kind::from_byte(b) as u8, b);
        }
    }

    #[test]
    fn typeset_membership() {
        let ts = TypeSet::just(Kind::Integer).with(Kind::Decimal);
        assert!(ts.contains(Kind::Integer));
        assert!(ts.contains(Kind::Decimal));
        assert!(!ts.contains(Kind::Word));
        assert!(!TypeSet::ANY.contains(Kind::End));
    }
}

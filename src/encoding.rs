//! Nucleotide alphabet used to label mutation events.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Nucleotide {
    A,
    T,
    C,
    G,
}

impl Nucleotide {
    pub const SIZE: usize = 4;

    /// State of every site at the root of a genealogy.
    pub const REFERENCE: Nucleotide = Nucleotide::A;

    pub fn index(&self) -> usize {
        match self {
            Nucleotide::A => 0,
            Nucleotide::T => 1,
            Nucleotide::C => 2,
            Nucleotide::G => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Nucleotide::A),
            1 => Some(Nucleotide::T),
            2 => Some(Nucleotide::C),
            3 => Some(Nucleotide::G),
            _ => None,
        }
    }

    pub fn try_decode(s: &u8) -> Option<Self> {
        match s {
            // ATCG | atcg | 0123 -> Nucleotide
            0x41 | 0x61 | 0x30 => Some(Nucleotide::A),
            0x54 | 0x74 | 0x31 => Some(Nucleotide::T),
            0x43 | 0x63 | 0x32 => Some(Nucleotide::C),
            0x47 | 0x67 | 0x33 => Some(Nucleotide::G),
            _ => None,
        }
    }

    pub fn encode(&self) -> u8 {
        match self {
            Nucleotide::A => 0x41,
            Nucleotide::T => 0x54,
            Nucleotide::C => 0x43,
            Nucleotide::G => 0x47,
        }
    }
}

impl std::fmt::Display for Nucleotide {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.encode() as char)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_matches_decode() {
        for (index, literal) in b"ATCG".iter().enumerate() {
            let nucleotide = Nucleotide::try_decode(literal).unwrap();
            assert_eq!(nucleotide.index(), index);
            assert_eq!(Nucleotide::from_index(index), Some(nucleotide));
            assert_eq!(nucleotide.encode(), *literal);
        }
        assert_eq!(Nucleotide::from_index(4), None);
        assert_eq!(Nucleotide::try_decode(&b'N'), None);
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}{}", Nucleotide::G, Nucleotide::T), "GT");
    }
}

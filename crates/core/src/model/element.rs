#![forbid(unsafe_code)]

use crate::dao::EntityKind;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// Payload value a matrix cell can hold.
pub trait Element: Copy + Ord + Hash + Debug {
    /// Kind of the matrix whose cells carry this element.
    const MATRIX_KIND: EntityKind;
}

/// Reference to a character state by its number in the column's character.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateNumber(pub u32);

impl Element for StateNumber {
    const MATRIX_KIND: EntityKind = EntityKind::StandardMatrix;
}

/// Elements of molecular matrices, written as one-letter symbols.
pub trait Molecular: Element + 'static {
    /// Elements whose upper-case symbol is `symbol`.
    fn from_symbol(symbol: char) -> Option<Self>;

    fn symbol(self) -> char;

    /// Expansion of an ambiguity code into the elements it stands for.
    fn ambiguity(symbol: char) -> Option<&'static [Self]>;

    fn is_unassigned_symbol(symbol: char) -> bool {
        symbol == '?'
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Nucleotide {
    A,
    C,
    G,
    T,
}

impl Element for Nucleotide {
    const MATRIX_KIND: EntityKind = EntityKind::DnaMatrix;
}

impl Nucleotide {
    /// True for every character a stored DNA sequence may contain.
    pub fn is_sequence_symbol(symbol: char) -> bool {
        let upper = symbol.to_ascii_uppercase();
        upper == '-'
            || Self::is_unassigned_symbol(upper)
            || Self::from_symbol(upper).is_some()
            || Self::ambiguity(upper).is_some()
    }
}

impl Molecular for Nucleotide {
    fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            'A' => Some(Self::A),
            'C' => Some(Self::C),
            'G' => Some(Self::G),
            'T' => Some(Self::T),
            _ => None,
        }
    }

    fn symbol(self) -> char {
        match self {
            Self::A => 'A',
            Self::C => 'C',
            Self::G => 'G',
            Self::T => 'T',
        }
    }

    fn ambiguity(symbol: char) -> Option<&'static [Self]> {
        use Nucleotide::{A, C, G, T};
        let expansion: &'static [Self] = match symbol {
            'R' => &[A, G],
            'Y' => &[C, T],
            'S' => &[C, G],
            'W' => &[A, T],
            'K' => &[G, T],
            'M' => &[A, C],
            'B' => &[C, G, T],
            'D' => &[A, G, T],
            'H' => &[A, C, T],
            'V' => &[A, C, G],
            'N' => &[A, C, G, T],
            _ => return None,
        };
        Some(expansion)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Residue {
    A,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    K,
    L,
    M,
    N,
    P,
    Q,
    R,
    S,
    T,
    V,
    W,
    Y,
}

const RESIDUES: [(char, Residue); 20] = [
    ('A', Residue::A),
    ('C', Residue::C),
    ('D', Residue::D),
    ('E', Residue::E),
    ('F', Residue::F),
    ('G', Residue::G),
    ('H', Residue::H),
    ('I', Residue::I),
    ('K', Residue::K),
    ('L', Residue::L),
    ('M', Residue::M),
    ('N', Residue::N),
    ('P', Residue::P),
    ('Q', Residue::Q),
    ('R', Residue::R),
    ('S', Residue::S),
    ('T', Residue::T),
    ('V', Residue::V),
    ('W', Residue::W),
    ('Y', Residue::Y),
];

impl Element for Residue {
    const MATRIX_KIND: EntityKind = EntityKind::ProteinMatrix;
}

impl Molecular for Residue {
    fn from_symbol(symbol: char) -> Option<Self> {
        RESIDUES
            .iter()
            .find(|(candidate, _)| *candidate == symbol)
            .map(|(_, residue)| *residue)
    }

    fn symbol(self) -> char {
        RESIDUES
            .iter()
            .find(|(_, residue)| *residue == self)
            .map(|(symbol, _)| *symbol)
            .unwrap_or('?')
    }

    fn ambiguity(symbol: char) -> Option<&'static [Self]> {
        match symbol {
            'B' => Some(&[Residue::D, Residue::N]),
            'Z' => Some(&[Residue::E, Residue::Q]),
            _ => None,
        }
    }

    fn is_unassigned_symbol(symbol: char) -> bool {
        matches!(symbol, '?' | 'X')
    }
}

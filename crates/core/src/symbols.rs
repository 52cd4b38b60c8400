#![forbid(unsafe_code)]

//! One-letter symbol grammar for DNA and protein rows.
//!
//! `?` unassigned, `-` inapplicable, a plain symbol is a single element
//! (lower case is remembered), an ambiguity code is an uncertain set,
//! `(..)` is a polymorphic group and `{..}` an uncertain group.

use crate::error::ReconcileError;
use crate::model::{CellType, CellValue, Molecular};
use std::collections::BTreeSet;

pub fn parse_row<E: Molecular>(row: &str) -> Result<Vec<CellValue<E>>, ReconcileError> {
    let mut cells = Vec::new();
    let mut chars = row.chars().filter(|c| !c.is_whitespace());

    while let Some(symbol) = chars.next() {
        let cell = match symbol {
            '(' => group::<E>(&mut chars, ')', CellType::Polymorphic)?,
            '{' => group::<E>(&mut chars, '}', CellType::Uncertain)?,
            '-' => CellValue::inapplicable(),
            other => single_symbol::<E>(other)?,
        };
        cells.push(cell);
    }

    Ok(cells)
}

fn single_symbol<E: Molecular>(symbol: char) -> Result<CellValue<E>, ReconcileError> {
    let upper = symbol.to_ascii_uppercase();
    if E::is_unassigned_symbol(upper) {
        return Ok(CellValue::unassigned());
    }
    if let Some(element) = E::from_symbol(upper) {
        return Ok(CellValue::single(element, symbol.is_ascii_lowercase()));
    }
    if let Some(expansion) = E::ambiguity(upper) {
        let elements: BTreeSet<E> = expansion.iter().copied().collect();
        return Ok(CellValue::new(CellType::Uncertain, elements, false)?);
    }
    Err(ReconcileError::malformed(format!(
        "unknown symbol {symbol:?}"
    )))
}

fn group<E: Molecular>(
    chars: &mut impl Iterator<Item = char>,
    close: char,
    cell_type: CellType,
) -> Result<CellValue<E>, ReconcileError> {
    let mut elements = BTreeSet::new();
    for symbol in chars.by_ref() {
        if symbol == close {
            return Ok(CellValue::new(cell_type, elements, false)?);
        }
        let Some(element) = E::from_symbol(symbol.to_ascii_uppercase()) else {
            return Err(ReconcileError::malformed(format!(
                "symbol {symbol:?} is not allowed inside a group"
            )));
        };
        elements.insert(element);
    }
    Err(ReconcileError::malformed(format!(
        "unterminated group, expected {close:?}"
    )))
}

/// Renders a cell back into the grammar accepted by [`parse_row`].
pub fn render_cell<E: Molecular>(value: &CellValue<E>) -> String {
    let symbols = || value.elements().iter().map(|e| e.symbol());
    match value.cell_type() {
        CellType::Unassigned => "?".to_string(),
        CellType::Inapplicable => "-".to_string(),
        CellType::Single => symbols()
            .map(|c| {
                if value.lower_case() {
                    c.to_ascii_lowercase()
                } else {
                    c
                }
            })
            .collect(),
        CellType::Polymorphic => format!("({})", symbols().collect::<String>()),
        CellType::Uncertain => format!("{{{}}}", symbols().collect::<String>()),
    }
}

pub fn render_row<E: Molecular>(cells: impl IntoIterator<Item = CellValue<E>>) -> String {
    cells.into_iter().map(|cell| render_cell(&cell)).collect()
}

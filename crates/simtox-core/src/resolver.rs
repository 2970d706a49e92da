//! Identifier resolution.
//!
//! Turns user input into a [`CompoundReference`]. Without a hint the input is
//! classified heuristically, in this order:
//!
//! 1. **Structure**: no whitespace, only SMILES alphabet characters, and either
//!    a bond or bracket token (`= # ( ) [ ] @ / \`) or ring-closure digits
//!    that each occur an even number of times. The bare ring-closure form
//!    also needs an aromatic atom and only organic-subset letters
//!    (`c1ccccc1`), so `COX22` and `CHEMBL11` are not structures.
//! 2. **Database id**: `CHEMBL<digits>` or `DB<5 digits>`, case-insensitive.
//! 3. **Name**: everything else.
//!
//! Strings shorter than three characters are always names. The heuristic is
//! not a SMILES validator; anything ambiguous falls through to `Name`.

use crate::compound::{CompoundReference, IdentifierKind};
use crate::errors::ResolutionError;

/// Strings shorter than this are never classified as structures.
const MIN_STRUCTURE_LEN: usize = 3;

/// Tokens that cannot appear in a plain drug name but are common in SMILES.
const STRUCTURE_TOKENS: &[char] = &['=', '#', '(', ')', '[', ']', '@', '/', '\\'];

/// Letters of the organic subset: `B C N O P S F Cl Br I` plus aromatic forms.
const ORGANIC_LETTERS: &str = "BCNOPSFIbcnopslr";

const AROMATIC_ATOMS: &str = "bcnops";

/// Resolve a raw identifier into a canonical reference.
///
/// # Errors
///
/// Returns [`ResolutionError::Empty`] for blank input and
/// [`ResolutionError::InvalidDatabaseId`] when `hint` is
/// [`IdentifierKind::DatabaseId`] but the value does not match a known pattern.
pub fn resolve(
    raw: &str,
    hint: Option<IdentifierKind>,
) -> Result<CompoundReference, ResolutionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ResolutionError::Empty);
    }

    let kind = hint.unwrap_or_else(|| classify(trimmed));
    match kind {
        IdentifierKind::DatabaseId => {
            let canonical = trimmed.to_ascii_uppercase();
            if !is_database_id(&canonical) {
                return Err(ResolutionError::InvalidDatabaseId(trimmed.to_string()));
            }
            Ok(CompoundReference::new(kind, canonical))
        }
        IdentifierKind::Name | IdentifierKind::Structure => {
            Ok(CompoundReference::new(kind, trimmed.to_string()))
        }
    }
}

/// Best-effort classification of an unhinted identifier.
#[must_use]
pub fn classify(value: &str) -> IdentifierKind {
    if looks_like_structure(value) {
        IdentifierKind::Structure
    } else if is_database_id(&value.to_ascii_uppercase()) {
        IdentifierKind::DatabaseId
    } else {
        IdentifierKind::Name
    }
}

/// `CHEMBL` followed by at least one digit, or `DB` followed by exactly five.
/// Expects upper-cased input.
#[must_use]
pub fn is_database_id(value: &str) -> bool {
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    if let Some(rest) = value.strip_prefix("CHEMBL") {
        return all_digits(rest);
    }
    if let Some(rest) = value.strip_prefix("DB") {
        return rest.len() == 5 && all_digits(rest);
    }
    false
}

fn looks_like_structure(value: &str) -> bool {
    if value.chars().count() < MIN_STRUCTURE_LEN {
        return false;
    }
    if !value.chars().all(is_smiles_char) {
        return false;
    }
    if value.contains(STRUCTURE_TOKENS) {
        return true;
    }
    has_paired_ring_closures(value)
}

fn is_smiles_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "=#()[]@+-\\/%.:*".contains(c)
}

/// True when the value has digits and every digit occurs an even number of
/// times, as ring-closure labels do, and the letters read as SMILES atoms with
/// at least one aromatic atom.
fn has_paired_ring_closures(value: &str) -> bool {
    let mut counts = [0_u32; 10];
    for b in value.bytes().filter(u8::is_ascii_digit) {
        counts[usize::from(b - b'0')] += 1;
    }
    let total: u32 = counts.iter().sum();
    if total == 0 || counts.iter().any(|c| c % 2 != 0) {
        return false;
    }
    value
        .chars()
        .filter(char::is_ascii_alphabetic)
        .all(|c| ORGANIC_LETTERS.contains(c))
        && value.chars().any(|c| AROMATIC_ATOMS.contains(c))
}

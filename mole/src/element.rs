//! Atom labels.
//!
//! A label names an element, optionally decorated: a trailing tag (`H1`,
//! `H^2`, `C@a`) distinguishes otherwise identical atoms, and a `GHOST`
//! prefix (`GHOST-C`, `ghost_H1`) places basis functions without a
//! nucleus. Labels are parsed once into [`AtomSymbol`] and every other
//! module works on the parsed form.

use periodic_table_on_an_enum::Element;
use serde::{Deserialize, Serialize};

use crate::error::{MoleError, MoleResult};

const GHOST: &str = "GHOST";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AtomSymbol {
    /// Label as given by the user, trimmed.
    pub raw: String,
    /// Standard element symbol, e.g. "C".
    pub element: String,
    pub is_ghost: bool,
    /// Decoration following the element symbol, e.g. "1" or "^2".
    pub tag: String,
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

fn lookup(symbol: &str) -> Option<Element> {
    Element::from_symbol(&capitalize(symbol))
}

/// Standard symbol of the element with atomic number `z`.
pub fn symbol_of(z: usize) -> MoleResult<String> {
    Element::from_atomic_number(z)
        .map(|e| e.get_symbol().to_string())
        .ok_or_else(|| MoleError::UnknownElement(z.to_string()))
}

impl AtomSymbol {
    pub fn parse(label: &str) -> MoleResult<Self> {
        let raw = label.trim();
        if raw.is_empty() {
            return Err(MoleError::UnknownElement(label.to_string()));
        }

        if raw.chars().all(|c| c.is_ascii_digit()) {
            let z: usize = raw
                .parse()
                .map_err(|_| MoleError::UnknownElement(raw.to_string()))?;
            return Ok(AtomSymbol {
                raw: raw.to_string(),
                element: symbol_of(z)?,
                is_ghost: false,
                tag: String::new(),
            });
        }

        let (is_ghost, rest) = if raw.len() > GHOST.len()
            && raw.is_char_boundary(GHOST.len())
            && raw[..GHOST.len()].eq_ignore_ascii_case(GHOST)
        {
            // skip separators between the prefix and the element
            let rest = raw[GHOST.len()..].trim_start_matches(|c: char| !c.is_ascii_alphabetic());
            (true, rest)
        } else {
            (false, raw)
        };

        let letters: String = rest.chars().take_while(|c| c.is_ascii_alphabetic()).take(2).collect();
        if letters.is_empty() {
            return Err(MoleError::UnknownElement(raw.to_string()));
        }

        // Prefer the two-letter reading ("Co", "Cl"). A lowercase second
        // letter always belongs to the symbol, so "Hx" is unknown; any other
        // second character starts the tag ("HX", "C@a").
        let second_is_lower = letters.chars().nth(1).is_some_and(|c| c.is_ascii_lowercase());
        let (element, consumed) = match lookup(&letters) {
            Some(e) if letters.len() == 2 => (e, 2),
            _ if second_is_lower => return Err(MoleError::UnknownElement(raw.to_string())),
            _ => match lookup(&letters[..1]) {
                Some(e) => (e, 1),
                None => return Err(MoleError::UnknownElement(raw.to_string())),
            },
        };

        Ok(AtomSymbol {
            raw: raw.to_string(),
            element: element.get_symbol().to_string(),
            is_ghost,
            tag: rest[consumed..].to_string(),
        })
    }

    /// Canonical decorated label, e.g. "C1" or "GHOST-C1".
    pub fn label(&self) -> String {
        if self.is_ghost {
            format!("{}-{}{}", GHOST, self.element, self.tag)
        } else {
            format!("{}{}", self.element, self.tag)
        }
    }

    /// Label without the decoration tag, ghost prefix kept: "C" or "GHOST-C".
    pub fn pure_label(&self) -> String {
        if self.is_ghost {
            format!("{}-{}", GHOST, self.element)
        } else {
            self.element.clone()
        }
    }

    /// Canonical label with the ghost marker removed.
    pub fn unghosted_label(&self) -> String {
        format!("{}{}", self.element, self.tag)
    }

    pub fn atomic_number(&self) -> i32 {
        lookup(&self.element)
            .map(|e| e.get_atomic_number() as i32)
            .unwrap_or(0)
    }

    /// Nuclear charge; ghost atoms carry none.
    pub fn charge(&self) -> i32 {
        if self.is_ghost {
            0
        } else {
            self.atomic_number()
        }
    }

    /// Standard atomic mass in amu; 0 for ghost atoms.
    pub fn mass(&self) -> f64 {
        if self.is_ghost {
            return 0.0;
        }
        lookup(&self.element)
            .map(|e| e.get_atomic_mass() as f64)
            .unwrap_or(0.0)
    }

    /// Keys tried, in order, when matching this atom to a basis entry.
    pub fn basis_candidates(&self) -> Vec<String> {
        let mut keys = vec![self.label(), self.pure_label()];
        if self.is_ghost {
            keys.push(self.unghosted_label());
            keys.push(self.element.clone());
        }
        keys.dedup();
        keys
    }

    /// Keys tried when matching this atom to an ECP entry. Ghost atoms have
    /// no core to replace.
    pub fn ecp_candidates(&self) -> Vec<String> {
        if self.is_ghost {
            return Vec::new();
        }
        let mut keys = vec![self.label(), self.element.clone()];
        keys.dedup();
        keys
    }
}

/// Canonical form of a user supplied map key. Keys that are not atom labels
/// are returned unchanged.
pub fn canonical_key(key: &str) -> String {
    AtomSymbol::parse(key)
        .map(|s| s.label())
        .unwrap_or_else(|_| key.trim().to_string())
}

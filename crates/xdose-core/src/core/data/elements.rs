use phf::{Map, phf_map};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    pub symbol: &'static str,
    pub atomic_number: u8,
    /// Standard atomic weight in g/mol (Da).
    pub atomic_weight: f64,
}

macro_rules! element {
    ($symbol:literal, $z:literal, $weight:literal) => {
        Element { symbol: $symbol, atomic_number: $z, atomic_weight: $weight }
    };
}

#[rustfmt::skip]
static ELEMENTS: Map<&'static str, Element> = phf_map! {
    // --- Light elements of biological matter ---
    "H"  => element!("H", 1, 1.008),
    "C"  => element!("C", 6, 12.011),
    "N"  => element!("N", 7, 14.007),
    "O"  => element!("O", 8, 15.999),
    "F"  => element!("F", 9, 18.998),
    "P"  => element!("P", 15, 30.974),
    "S"  => element!("S", 16, 32.06),

    // --- Common buffer and salt ions ---
    "Na" => element!("Na", 11, 22.990),
    "Mg" => element!("Mg", 12, 24.305),
    "Al" => element!("Al", 13, 26.982),
    "Si" => element!("Si", 14, 28.085),
    "Cl" => element!("Cl", 17, 35.45),
    "K"  => element!("K", 19, 39.098),
    "Ca" => element!("Ca", 20, 40.078),

    // --- Transition metals ---
    "Mn" => element!("Mn", 25, 54.938),
    "Fe" => element!("Fe", 26, 55.845),
    "Co" => element!("Co", 27, 58.933),
    "Ni" => element!("Ni", 28, 58.693),
    "Cu" => element!("Cu", 29, 63.546),
    "Zn" => element!("Zn", 30, 65.38),

    // --- Heavy-atom derivatives ---
    "Se" => element!("Se", 34, 78.971),
    "Br" => element!("Br", 35, 79.904),
    "Cd" => element!("Cd", 48, 112.41),
    "I"  => element!("I", 53, 126.90),
    "Pt" => element!("Pt", 78, 195.08),
    "Au" => element!("Au", 79, 196.97),
    "Hg" => element!("Hg", 80, 200.59),
    "Pb" => element!("Pb", 82, 207.2),
};

/// Normalises an element symbol to its conventional capitalisation (`"ZN"` -> `"Zn"`).
pub fn canonical_symbol(symbol: &str) -> String {
    let mut chars = symbol.trim().chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Looks up an element by symbol, ignoring case.
pub fn element(symbol: &str) -> Option<&'static Element> {
    ELEMENTS.get(canonical_symbol(symbol).as_str())
}

pub fn elements() -> impl Iterator<Item = &'static Element> {
    ELEMENTS.values()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_lookup_is_case_insensitive() {
        assert_eq!(element("zn").map(|e| e.atomic_number), Some(30));
        assert_eq!(element("ZN").map(|e| e.symbol), Some("Zn"));
        assert_eq!(element(" S ").map(|e| e.atomic_weight), Some(32.06));
    }

    #[test]
    fn unknown_symbol_is_none() {
        assert!(element("Xx").is_none());
        assert!(element("").is_none());
    }

    #[test]
    fn table_keys_match_symbols() {
        for e in elements() {
            assert_eq!(element(e.symbol), Some(e));
            assert!(e.atomic_weight > e.atomic_number as f64);
        }
    }
}

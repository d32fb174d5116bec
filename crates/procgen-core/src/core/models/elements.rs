use phf::phf_map;

/// Standard atomic masses (g/mol) for the elements likely to appear in species definitions.
static ATOMIC_MASSES: phf::Map<&'static str, f64> = phf_map! {
    "H" => 1.008,
    "D" => 2.014,
    "He" => 4.0026,
    "Li" => 6.94,
    "Be" => 9.0122,
    "B" => 10.81,
    "C" => 12.011,
    "N" => 14.007,
    "O" => 15.999,
    "F" => 18.998,
    "Ne" => 20.180,
    "Na" => 22.990,
    "Mg" => 24.305,
    "Al" => 26.982,
    "Si" => 28.085,
    "P" => 30.974,
    "S" => 32.06,
    "Cl" => 35.45,
    "Ar" => 39.948,
    "K" => 39.098,
    "Ca" => 40.078,
    "Fe" => 55.845,
    "Cu" => 63.546,
    "Zn" => 65.38,
    "Br" => 79.904,
    "Kr" => 83.798,
    "I" => 126.90,
    "Xe" => 131.29,
};

/// Returns the atomic mass of `symbol`, matched case-insensitively.
pub fn atomic_mass(symbol: &str) -> Option<f64> {
    let mut chars = symbol.trim().chars();
    let first = chars.next()?.to_ascii_uppercase();
    let canonical: String = std::iter::once(first)
        .chain(chars.map(|c| c.to_ascii_lowercase()))
        .collect();
    ATOMIC_MASSES.get(canonical.as_str()).copied()
}

/// Whether two element symbols name the same element.
pub fn same_element(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mass_lookup_normalises_symbol_case() {
        assert_eq!(atomic_mass("O"), Some(15.999));
        assert_eq!(atomic_mass("cl"), Some(35.45));
        assert_eq!(atomic_mass("CL"), Some(35.45));
        assert_eq!(atomic_mass("Xx"), None);
        assert_eq!(atomic_mass(""), None);
    }
}

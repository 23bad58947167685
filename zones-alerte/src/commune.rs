//! Normalisation des codes commune INSEE
//!
//! Les arrondissements de Paris, Marseille et Lyon sont ramenés au code de
//! la commune principale. Les index de l'instantané sont construits avec les
//! codes normalisés, les recherches normalisent donc aussi leur entrée.

use std::borrow::Cow;

/// Plages d'arrondissements (bornes incluses) et commune principale
const ARRONDISSEMENTS: &[(u32, u32, &str)] = &[
    // Paris
    (75101, 75120, "75056"),
    // Marseille
    (13201, 13216, "13055"),
    // Lyon
    (69381, 69389, "69123"),
];

/// Normalise un code commune (idempotent)
pub fn normalize_code_commune(code: &str) -> Cow<'_, str> {
    let trimmed = code.trim();
    if trimmed.len() == 5 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(value) = trimmed.parse::<u32>() {
            for &(first, last, parent) in ARRONDISSEMENTS {
                if (first..=last).contains(&value) {
                    return Cow::Borrowed(parent);
                }
            }
        }
    }
    if trimmed.len() == code.len() {
        Cow::Borrowed(code)
    } else {
        Cow::Owned(trimmed.to_string())
    }
}

/// Indique si le code est un arrondissement municipal
pub fn is_arrondissement(code: &str) -> bool {
    normalize_code_commune(code) != code.trim()
}

/// Liste tous les codes d'arrondissements connus
pub fn arrondissement_codes() -> impl Iterator<Item = (String, &'static str)> {
    ARRONDISSEMENTS
        .iter()
        .flat_map(|&(first, last, parent)| (first..=last).map(move |c| (c.to_string(), parent)))
}

//! Empreinte stable d'un instantané
//!
//! Hash blake3 des enregistrements de zones (triés par identifiant), de
//! l'appartenance communale et de l'index des arrêtés municipaux. Deux
//! constructions à partir des mêmes données donnent la même empreinte.

use blake3::Hasher;

use super::Snapshot;

impl Snapshot {
    /// Empreinte hexadécimale du contenu publié
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let mut hasher = Hasher::new();

        hasher.update(b"ZONES");
        for record in self.zones().records() {
            // La sérialisation d'une structure sans map est déterministe
            let bytes = serde_json::to_vec(record)?;
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(&bytes);
        }

        hasher.update(b"COMMUNES");
        for code in self.zones().communes() {
            hasher.update(code.as_bytes());
            for &idx in self.zones().commune_zones(code) {
                hasher.update(&self.zones().record(idx).id.to_le_bytes());
            }
        }

        hasher.update(b"DECREES");
        for (code, decree) in self.decrees().sorted() {
            hasher.update(code.as_bytes());
            hasher.update(&decree.id.to_le_bytes());
            if let Some(file) = &decree.chemin_fichier {
                hasher.update(file.as_bytes());
            }
        }

        Ok(hex::encode(hasher.finalize().as_bytes()))
    }
}

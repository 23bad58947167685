//! Index spatial des zones (R-tree `rstar` chargé en bloc)
//!
//! L'arbre est construit une seule fois par `bulk_load` à partir de toutes
//! les emprises, puis n'est plus jamais modifié. La seule requête exposée
//! est "toutes les zones dont la bbox contient le point": c'est un
//! préfiltre, le test d'inclusion exact reste à la charge du résolveur.

use std::fmt;

use geo::Rect;
use rstar::{RTree, RTreeObject, AABB};

use crate::ZoneError;

/// Entrée de l'arbre: position de la zone dans le [`crate::ZoneSet`] et son emprise
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneEntry {
    idx: usize,
    envelope: AABB<[f64; 2]>,
}

impl ZoneEntry {
    pub fn new(idx: usize, rect: Rect<f64>) -> Result<Self, ZoneError> {
        let (min, max) = (rect.min(), rect.max());
        if ![min.x, min.y, max.x, max.y].iter().all(|v| v.is_finite()) {
            return Err(ZoneError::IndexBuild(format!(
                "non-finite bbox for entry {idx}: {rect:?}"
            )));
        }
        Ok(Self {
            idx,
            envelope: AABB::from_corners([min.x, min.y], [max.x, max.y]),
        })
    }

    pub fn idx(&self) -> usize {
        self.idx
    }
}

impl RTreeObject for ZoneEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Arbre figé des emprises de zones
pub struct ZoneTree {
    tree: RTree<ZoneEntry>,
}

impl ZoneTree {
    pub fn bulk_load(entries: Vec<ZoneEntry>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Positions des zones dont la bbox contient le point (bords compris), triées
    pub fn search_point(&self, x: f64, y: f64) -> Vec<usize> {
        let mut found: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&AABB::from_point([x, y]))
            .map(ZoneEntry::idx)
            .collect();
        found.sort_unstable();
        found
    }
}

impl fmt::Debug for ZoneTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoneTree")
            .field("len", &self.tree.size())
            .finish()
    }
}

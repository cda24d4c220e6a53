//! R-tree broad phase over element footprints.

use std::fmt;

use bim_kernel::BoundingBox;
use rstar::{RTree, RTreeObject, AABB};

/// An element's planar bounding box, tagged with its position in the model
/// so query results can be returned in model order.
#[derive(Debug, Clone)]
pub(crate) struct FootprintEntry {
    pub(crate) id: String,
    pub(crate) order: usize,
    pub(crate) bbox: BoundingBox,
}

impl RTreeObject for FootprintEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.bbox.min[0], self.bbox.min[1]], [self.bbox.max[0], self.bbox.max[1]])
    }
}

pub(crate) struct FootprintIndex {
    tree: RTree<FootprintEntry>,
}

impl fmt::Debug for FootprintIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FootprintIndex").field("len", &self.len()).finish()
    }
}

impl FootprintIndex {
    pub(crate) fn build(entries: Vec<FootprintEntry>) -> Self {
        Self { tree: RTree::bulk_load(entries) }
    }

    /// Entries whose box meets `bbox` grown by `margin`, in model order.
    pub(crate) fn candidates(&self, bbox: &BoundingBox, margin: f64) -> Vec<&FootprintEntry> {
        let grown = bbox.expanded(margin);
        let envelope = AABB::from_corners([grown.min[0], grown.min[1]], [grown.max[0], grown.max[1]]);
        let mut hits: Vec<&FootprintEntry> = self.tree.locate_in_envelope_intersecting(&envelope).collect();
        hits.sort_by_key(|e| e.order);
        hits
    }

    pub(crate) fn len(&self) -> usize {
        self.tree.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, order: usize, min: [f64; 2], max: [f64; 2]) -> FootprintEntry {
        FootprintEntry {
            id: id.into(),
            order,
            bbox: BoundingBox::new([min[0], min[1], 0.0], [max[0], max[1], 0.0]),
        }
    }

    #[test]
    fn test_candidates_in_model_order() {
        let index = FootprintIndex::build(vec![
            entry("c", 2, [0.0, 0.0], [1.0, 1.0]),
            entry("a", 0, [0.5, 0.5], [2.0, 2.0]),
            entry("far", 1, [50.0, 50.0], [60.0, 60.0]),
        ]);
        assert_eq!(index.len(), 3);

        let window = BoundingBox::new([0.0, 0.0, 0.0], [1.0, 1.0, 0.0]);
        let ids: Vec<&str> = index.candidates(&window, 0.0).iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
    }

    #[test]
    fn test_margin_widens_query() {
        let index = FootprintIndex::build(vec![entry("b", 0, [3.0, 0.0], [4.0, 1.0])]);
        let window = BoundingBox::new([0.0, 0.0, 0.0], [1.0, 1.0, 0.0]);
        assert!(index.candidates(&window, 1.0).is_empty());
        assert_eq!(index.candidates(&window, 2.5).len(), 1);
    }
}

//! Plain BIM data model consumed by the graph and spatial layers.
//!
//! Elements are stored in insertion order and looked up by string id.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geometry::{GeometricEntity, Shape};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Building,
    Floor,
    Zone,
    Room,
    Wall,
    Door,
    Window,
    Device,
    Equipment,
    Fixture,
    Other,
}

impl ElementKind {
    /// Kinds that can spatially contain other elements.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Building | Self::Floor | Self::Zone | Self::Room)
    }

    /// Kinds counted as devices when measuring a room's occupancy.
    pub fn is_device(&self) -> bool {
        matches!(self, Self::Device | Self::Equipment | Self::Fixture)
    }
}

/// One model element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: String,
    pub kind: ElementKind,
    #[serde(default)]
    pub name: String,
    pub geometry: GeometricEntity,
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Building system the element belongs to (hvac, electrical, ...).
    #[serde(default)]
    pub system: Option<String>,
    /// Functional use of a room (office, lobby, ...).
    #[serde(default)]
    pub room_type: Option<String>,
    #[serde(default)]
    pub floor_level: Option<i32>,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl Element {
    pub fn new(id: impl Into<String>, kind: ElementKind, geometry: GeometricEntity) -> Self {
        Self {
            id: id.into(),
            kind,
            name: String::new(),
            geometry,
            parent_id: None,
            system: None,
            room_type: None,
            floor_level: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_room_type(mut self, room_type: impl Into<String>) -> Self {
        self.room_type = Some(room_type.into());
        self
    }

    pub fn with_floor(mut self, level: i32) -> Self {
        self.floor_level = Some(level);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property_f64(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(Value::as_f64)
    }

    pub fn property_bool(&self, key: &str) -> Option<bool> {
        self.properties.get(key).and_then(Value::as_bool)
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Clear opening width of a door or window: the `width` property if set,
    /// otherwise the length of a line or the longer side of a rectangle.
    pub fn opening_width(&self) -> Option<f64> {
        if let Some(w) = self.property_f64("width") {
            return Some(w);
        }
        match &self.geometry {
            GeometricEntity::Line { .. } => self.geometry.measure(),
            GeometricEntity::Rectangle { width, height, .. } => Some(width.max(*height)),
            other => {
                let bb = other.bounding_box();
                let w = bb.width().max(bb.height());
                (w > 0.0).then_some(w)
            }
        }
    }
}

/// An insertion-ordered collection of elements keyed by id.
#[derive(Debug, Clone, Default)]
pub struct BimModel {
    elements: Vec<Element>,
    index: HashMap<String, usize>,
}

impl BimModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A replaced element keeps its original position.
    pub fn insert(&mut self, element: Element) -> Option<Element> {
        if let Some(&i) = self.index.get(&element.id) {
            return Some(std::mem::replace(&mut self.elements[i], element));
        }
        self.index.insert(element.id.clone(), self.elements.len());
        self.elements.push(element);
        None
    }

    pub fn remove(&mut self, id: &str) -> Option<Element> {
        let i = self.index.remove(id)?;
        let removed = self.elements.remove(i);
        for idx in self.index.values_mut() {
            if *idx > i {
                *idx -= 1;
            }
        }
        Some(removed)
    }

    pub fn get(&self, id: &str) -> Option<&Element> {
        self.index.get(id).map(|&i| &self.elements[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }

    pub fn of_kind(&self, kind: ElementKind) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(move |e| e.kind == kind)
    }

    pub fn children_of<'a>(&'a self, parent_id: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements
            .iter()
            .filter(move |e| e.parent_id.as_deref() == Some(parent_id))
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl FromIterator<Element> for BimModel {
    fn from_iter<I: IntoIterator<Item = Element>>(iter: I) -> Self {
        let mut model = BimModel::new();
        for e in iter {
            model.insert(e);
        }
        model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Coordinate;

    fn room(id: &str, x: f64) -> Element {
        let origin = Coordinate::xy(x, 0.0).unwrap();
        Element::new(id, ElementKind::Room, GeometricEntity::rectangle(origin, 10.0, 10.0).unwrap())
    }

    #[test]
    fn test_insert_keeps_order() {
        let mut model = BimModel::new();
        model.insert(room("b", 0.0));
        model.insert(room("a", 10.0));
        assert!(model.insert(room("b", 20.0)).is_some());
        let ids: Vec<_> = model.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(model.get("b").unwrap().geometry.anchor()[0], 25.0);
    }

    #[test]
    fn test_remove_reindexes() {
        let mut model: BimModel = [room("r1", 0.0), room("r2", 10.0), room("r3", 20.0)]
            .into_iter()
            .collect();
        assert!(model.remove("r1").is_some());
        assert!(model.get("r3").is_some());
        assert_eq!(model.get("r3").unwrap().id, "r3");
        assert_eq!(model.len(), 2);
        assert!(model.remove("r1").is_none());
    }

    #[test]
    fn test_opening_width() {
        let door = Element::new(
            "d1",
            ElementKind::Door,
            GeometricEntity::line(Coordinate::xy(0.0, 0.0).unwrap(), Coordinate::xy(0.9, 0.0).unwrap()),
        );
        assert!((door.opening_width().unwrap() - 0.9).abs() < 1e-12);
        let door = door.with_property("width", 0.7);
        assert!((door.opening_width().unwrap() - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_children() {
        let mut model = BimModel::new();
        model.insert(room("r1", 0.0));
        model.insert(
            Element::new("d1", ElementKind::Door, GeometricEntity::point(Coordinate::ORIGIN))
                .with_parent("r1"),
        );
        assert_eq!(model.children_of("r1").count(), 1);
        assert_eq!(model.of_kind(ElementKind::Room).count(), 1);
    }
}

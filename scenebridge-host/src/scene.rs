//! Demo scene document
//!
//! A small in-memory stand-in for a 3D application's document: unit system,
//! ordered layers and objects with user text. Not thread-safe on purpose;
//! it is only ever touched from the host thread.

use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use uuid::Uuid;

/// Name of the layer every fresh scene starts with
pub const DEFAULT_LAYER: &str = "Default";

/// Unit system of the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnitSystem {
    pub code: u32,
    pub name: &'static str,
}

impl UnitSystem {
    /// Look up a unit system by its numeric code
    pub fn from_code(code: u32) -> Option<Self> {
        let name = match code {
            0 => "No unit system",
            1 => "Microns",
            2 => "Millimeters",
            3 => "Centimeters",
            4 => "Meters",
            5 => "Kilometers",
            8 => "Inches",
            9 => "Feet",
            10 => "Miles",
            13 => "Nanometers",
            14 => "Decimeters",
            19 => "Yards",
            _ => return None,
        };
        Some(Self { code, name })
    }
}

impl Default for UnitSystem {
    fn default() -> Self {
        Self {
            code: 2,
            name: "Millimeters",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layer {
    pub name: String,
    pub visible: bool,
    pub locked: bool,
    pub color: [u8; 3],
}

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visible: true,
            locked: false,
            color: [0, 0, 0],
        }
    }
}

/// Geometry type of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Brep,
    Point,
    Light,
    Grip,
}

impl ObjectKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Brep => "Brep",
            Self::Point => "Point",
            Self::Light => "Light",
            Self::Grip => "Grip",
        }
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl BoundingBox {
    /// Box of edge `size` centred on `center`
    pub fn cube(center: [f64; 3], size: f64) -> Self {
        let half = size / 2.0;
        Self {
            min: [center[0] - half, center[1] - half, center[2] - half],
            max: [center[0] + half, center[1] + half, center[2] + half],
        }
    }

    pub fn point(at: [f64; 3]) -> Self {
        Self { min: at, max: at }
    }

    /// The eight corners, bottom face first, counter-clockwise from `min`
    pub fn corners(&self) -> [[f64; 3]; 8] {
        let [x0, y0, z0] = self.min;
        let [x1, y1, z1] = self.max;
        [
            [x0, y0, z0],
            [x1, y0, z0],
            [x1, y1, z0],
            [x0, y1, z0],
            [x0, y0, z1],
            [x1, y0, z1],
            [x1, y1, z1],
            [x0, y1, z1],
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub id: Uuid,
    pub name: Option<String>,
    pub layer: String,
    pub kind: ObjectKind,
    pub bbox: BoundingBox,
    pub user_text: BTreeMap<String, String>,
    pub selected: bool,
}

impl SceneObject {
    /// Display name, "Unnamed" when none is set
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unnamed")
    }
}

/// The document
#[derive(Debug, Clone)]
pub struct Scene {
    units: UnitSystem,
    layers: Vec<Layer>,
    current_layer: String,
    objects: Vec<SceneObject>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// A fresh scene with a single `Default` layer
    pub fn new() -> Self {
        Self {
            units: UnitSystem::default(),
            layers: vec![Layer::new(DEFAULT_LAYER)],
            current_layer: DEFAULT_LAYER.to_string(),
            objects: Vec::new(),
        }
    }

    pub fn units(&self) -> UnitSystem {
        self.units
    }

    pub fn set_units(&mut self, units: UnitSystem) {
        self.units = units;
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn layer_mut(&mut self, name: &str) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.name == name)
    }

    /// Add a layer unless one with that name exists; returns whether it was added
    pub fn add_layer(&mut self, name: &str) -> bool {
        if self.layer(name).is_some() {
            return false;
        }
        self.layers.push(Layer::new(name));
        true
    }

    pub fn current_layer(&self) -> &str {
        &self.current_layer
    }

    /// Make `name` the current layer, creating it if needed
    pub fn set_current_layer(&mut self, name: &str) {
        self.add_layer(name);
        self.current_layer = name.to_string();
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn objects_on_layer<'a>(&'a self, layer: &'a str) -> impl Iterator<Item = &'a SceneObject> {
        self.objects.iter().filter(move |o| o.layer == layer)
    }

    pub fn find(&self, id: Uuid) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn find_mut(&mut self, id: Uuid) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    /// Add an object; a missing layer is created
    pub fn add_object(
        &mut self,
        kind: ObjectKind,
        bbox: BoundingBox,
        name: Option<String>,
        layer: Option<&str>,
    ) -> Uuid {
        let layer = layer.unwrap_or(&self.current_layer).to_string();
        self.add_layer(&layer);

        let id = Uuid::new_v4();
        self.objects.push(SceneObject {
            id,
            name,
            layer,
            kind,
            bbox,
            user_text: BTreeMap::new(),
            selected: false,
        });
        id
    }

    /// Add a cube of edge `size` centred on `location`
    pub fn add_cube(
        &mut self,
        size: f64,
        location: [f64; 3],
        name: Option<String>,
        layer: Option<&str>,
    ) -> Uuid {
        self.add_object(ObjectKind::Brep, BoundingBox::cube(location, size), name, layer)
    }

    /// Remove an object; returns whether it existed
    pub fn delete(&mut self, id: Uuid) -> bool {
        let before = self.objects.len();
        self.objects.retain(|o| o.id != id);
        self.objects.len() != before
    }

    /// Ids of objects whose name matches `pattern` (wildcards allowed)
    pub fn find_by_name(&self, pattern: &Regex) -> Vec<Uuid> {
        self.objects
            .iter()
            .filter(|o| pattern.is_match(o.display_name()))
            .map(|o| o.id)
            .collect()
    }

    pub fn select(&mut self, id: Uuid, selected: bool) -> bool {
        match self.find_mut(id) {
            Some(obj) => {
                obj.selected = selected;
                true
            }
            None => false,
        }
    }

    pub fn clear_selection(&mut self) {
        for obj in &mut self.objects {
            obj.selected = false;
        }
    }

    pub fn selected(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter().filter(|o| o.selected)
    }
}

/// Compile a `*` wildcard pattern into an anchored, case-insensitive regex
///
/// Every other character matches literally.
pub fn wildcard_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    RegexBuilder::new(&format!("^{}$", body))
        .case_insensitive(true)
        .build()
}

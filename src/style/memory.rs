//! In-memory style engine.
//!
//! Reference implementation of `StyleEngine`: a list of named styles and a
//! lexicon of the visual properties it accepts. Interior state sits behind
//! a `parking_lot::RwLock` so the trait can take `&self`.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::{Bypass, MappingFunction, StyleEngine, TargetKind, ValueSpace, VisualProperty};
use crate::{Error, Result};

/// Built-in lexicon: `(target, name, value space)`.
const LEXICON: &[(TargetKind, &str, ValueSpace)] = &[
    (TargetKind::Network, "NETWORK_BACKGROUND_PAINT", ValueSpace::Color),
    (TargetKind::Network, "NETWORK_TITLE", ValueSpace::Discrete),
    (TargetKind::Network, "NETWORK_SCALE_FACTOR", ValueSpace::Number),
    (TargetKind::Node, "NODE_FILL_COLOR", ValueSpace::Color),
    (TargetKind::Node, "NODE_BORDER_PAINT", ValueSpace::Color),
    (TargetKind::Node, "NODE_LABEL_COLOR", ValueSpace::Color),
    (TargetKind::Node, "NODE_SIZE", ValueSpace::Number),
    (TargetKind::Node, "NODE_WIDTH", ValueSpace::Number),
    (TargetKind::Node, "NODE_HEIGHT", ValueSpace::Number),
    (TargetKind::Node, "NODE_BORDER_WIDTH", ValueSpace::Number),
    (TargetKind::Node, "NODE_TRANSPARENCY", ValueSpace::Number),
    (TargetKind::Node, "NODE_LABEL_FONT_SIZE", ValueSpace::Number),
    (TargetKind::Node, "NODE_LABEL", ValueSpace::Discrete),
    (TargetKind::Node, "NODE_SHAPE", ValueSpace::Discrete),
    (TargetKind::Node, "NODE_TOOLTIP", ValueSpace::Discrete),
    (TargetKind::Edge, "EDGE_PAINT", ValueSpace::Color),
    (TargetKind::Edge, "EDGE_LABEL_COLOR", ValueSpace::Color),
    (TargetKind::Edge, "EDGE_WIDTH", ValueSpace::Number),
    (TargetKind::Edge, "EDGE_TRANSPARENCY", ValueSpace::Number),
    (TargetKind::Edge, "EDGE_LABEL", ValueSpace::Discrete),
    (TargetKind::Edge, "EDGE_LINE_TYPE", ValueSpace::Discrete),
    (TargetKind::Edge, "EDGE_TARGET_ARROW_SHAPE", ValueSpace::Discrete),
];

#[derive(Debug, Default)]
struct Style {
    name: String,
    defaults: BTreeMap<(TargetKind, String), String>,
    mappings: Vec<(VisualProperty, MappingFunction)>,
    bypasses: Vec<Bypass>,
    dependencies: BTreeMap<String, bool>,
}

#[derive(Debug, Default)]
struct StylesInner {
    styles: Vec<Style>,
    current: Option<usize>,
}

/// In-memory visual style storage.
#[derive(Debug)]
pub struct MemoryStyles {
    lexicon: RwLock<Vec<VisualProperty>>,
    inner: RwLock<StylesInner>,
}

impl MemoryStyles {
    /// An engine with the built-in lexicon and no styles.
    pub fn new() -> Self {
        let lexicon = LEXICON
            .iter()
            .map(|(target, name, space)| VisualProperty::new(*target, *name, *space))
            .collect();
        Self { lexicon: RwLock::new(lexicon), inner: RwLock::new(StylesInner::default()) }
    }

    /// Teach the engine an extra visual property.
    pub fn with_property(self, property: VisualProperty) -> Self {
        self.lexicon.write().push(property);
        self
    }

    fn with_current<T>(&self, f: impl FnOnce(&Style) -> T) -> Option<T> {
        let inner = self.inner.read();
        inner.current.map(|i| f(&inner.styles[i]))
    }

    /// Mutate the current style, creating a `default` style if there is none.
    fn with_current_mut(&self, f: impl FnOnce(&mut Style)) {
        let mut inner = self.inner.write();
        let index = match inner.current {
            Some(i) => i,
            None => {
                inner.styles.push(Style { name: "default".into(), ..Style::default() });
                let i = inner.styles.len() - 1;
                inner.current = Some(i);
                i
            }
        };
        f(&mut inner.styles[index]);
    }
}

impl Default for MemoryStyles {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleEngine for MemoryStyles {
    fn style_names(&self) -> Vec<String> {
        self.inner.read().styles.iter().map(|s| s.name.clone()).collect()
    }

    fn create_style(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.styles.iter().any(|s| s.name.eq_ignore_ascii_case(name)) {
            return Err(Error::ValidationError(format!("style '{name}' already exists")));
        }
        inner.styles.push(Style { name: name.to_string(), ..Style::default() });
        inner.current = Some(inner.styles.len() - 1);
        Ok(())
    }

    fn current_style(&self) -> Option<String> {
        self.with_current(|s| s.name.clone())
    }

    fn lookup_property(&self, target: TargetKind, name: &str) -> Option<VisualProperty> {
        self.lexicon
            .read()
            .iter()
            .find(|p| p.target == target && p.name == name)
            .cloned()
    }

    fn default_value(&self, property: &VisualProperty) -> Option<String> {
        self.with_current(|s| s.defaults.get(&(property.target, property.name.clone())).cloned())
            .flatten()
    }

    fn set_default_value(&self, property: &VisualProperty, value: String) {
        self.with_current_mut(|s| {
            s.defaults.insert((property.target, property.name.clone()), value);
        });
    }

    fn defaults(&self) -> Vec<(VisualProperty, String)> {
        let Some(entries) = self.with_current(|s| {
            s.defaults.iter().map(|((t, n), v)| (*t, n.clone(), v.clone())).collect::<Vec<_>>()
        }) else {
            return Vec::new();
        };
        entries
            .into_iter()
            .filter_map(|(target, name, value)| Some((self.lookup_property(target, &name)?, value)))
            .collect()
    }

    fn add_mapping(&self, property: &VisualProperty, mapping: MappingFunction) {
        self.with_current_mut(|s| {
            s.mappings.retain(|(p, _)| p != property);
            s.mappings.push((property.clone(), mapping));
        });
    }

    fn mappings(&self) -> Vec<(VisualProperty, MappingFunction)> {
        self.with_current(|s| s.mappings.clone()).unwrap_or_default()
    }

    fn bypasses(&self, target: TargetKind) -> Vec<Bypass> {
        self.with_current(|s| {
            s.bypasses.iter().filter(|b| b.property.target == target).cloned().collect()
        })
        .unwrap_or_default()
    }

    fn set_bypass(&self, bypass: Bypass) {
        self.with_current_mut(|s| {
            s.bypasses.retain(|b| !(b.element == bypass.element && b.property == bypass.property));
            s.bypasses.push(bypass);
        });
    }

    fn dependencies(&self) -> BTreeMap<String, bool> {
        self.with_current(|s| s.dependencies.clone()).unwrap_or_default()
    }

    fn set_dependency(&self, name: &str, enabled: bool) {
        self.with_current_mut(|s| {
            s.dependencies.insert(name.to_string(), enabled);
        });
    }
}

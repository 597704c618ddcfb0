//! Blueprint reference surface. Blueprint *authoring*, storage, and config
//! rendering/templating are out of scope — owned by an external
//! collaborator — but the entity graph still needs to ask a blueprint two
//! questions to enforce its own invariants: does it declare a validation
//! template, and which foundation blueprints is a structure blueprint
//! allowed to sit on. `Blueprint` is the narrow read-only shape those
//! questions are asked against.

use derive_more::Display;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct BlueprintId(String);

impl BlueprintId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BlueprintId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The facts the entity graph needs from a blueprint. A real blueprint
/// carries far more (rendering templates, parameter schemas); this is only
/// the slice the lifecycle invariants read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blueprint {
    pub id: BlueprintId,
    /// Whether `Foundation::set_located`/`set_built` require `id_map` to be
    /// present before progressing.
    pub has_validation_template: bool,
    /// For a structure blueprint: the foundation blueprints it may be
    /// placed on ("foundation's blueprint must lie in the structure
    /// blueprint's allowed set").
    pub allowed_foundation_blueprints: Vec<BlueprintId>,
}

impl Blueprint {
    pub fn new(id: impl Into<String>) -> Self {
        Blueprint {
            id: BlueprintId::new(id.into()),
            has_validation_template: false,
            allowed_foundation_blueprints: Vec::new(),
        }
    }

    pub fn with_validation_template(mut self) -> Self {
        self.has_validation_template = true;
        self
    }

    pub fn allowing_foundation(mut self, blueprint: impl Into<String>) -> Self {
        self.allowed_foundation_blueprints.push(BlueprintId::new(blueprint.into()));
        self
    }

    pub fn allows_foundation(&self, foundation_blueprint: &BlueprintId) -> bool {
        self.allowed_foundation_blueprints.iter().any(|b| b == foundation_blueprint)
    }
}

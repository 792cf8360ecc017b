use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Vision,
    Diffuser,
}

impl ModelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vision => "vision",
            Self::Diffuser => "diffuser",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub display_name: String,
    pub kind: ModelKind,
    /// Outbound image parts for this model must carry an ephemeral cache hint.
    pub requires_cache_annotation: bool,
}

impl ModelSpec {
    pub fn new(
        name: &str,
        display_name: &str,
        kind: ModelKind,
        requires_cache_annotation: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            kind,
            requires_cache_annotation,
        }
    }

    /// Spec for an id the registry does not know: no cache hint, name as label.
    pub fn unregistered(name: &str, kind: ModelKind) -> Self {
        Self::new(name, name, kind, false)
    }

    pub fn supports(&self, kind: ModelKind) -> bool {
        self.kind == kind
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn by_kind(&self, kind: ModelKind) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(kind))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, name: &str, kind: ModelKind) -> Option<ModelSpec> {
        let model = self.get(name)?;
        if model.supports(kind) {
            return Some(model.clone());
        }
        None
    }

    pub fn requires_cache_annotation(&self, name: &str) -> bool {
        self.get(name)
            .map(|model| model.requires_cache_annotation)
            .unwrap_or(false)
    }

    pub fn display_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.get(name)
            .map(|model| model.display_name.as_str())
            .unwrap_or(name)
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, display_name: &str, kind: ModelKind, cache: bool| {
        map.insert(
            name.to_string(),
            ModelSpec::new(name, display_name, kind, cache),
        );
    };

    insert(
        "databricks-claude-sonnet-4",
        "Claude Sonnet 4",
        ModelKind::Vision,
        true,
    );
    insert("databricks-gpt-5", "Databricks GPT-5", ModelKind::Vision, false);
    insert(
        "databricks-llama-4-maverick",
        "Llama 4 Maverick",
        ModelKind::Vision,
        true,
    );
    insert(
        "databricks-shutterstock-imageai",
        "Shutterstock ImageAI (Text-to-Image)",
        ModelKind::Diffuser,
        false,
    );
    insert(
        "kandinsky-controlnet-img2img",
        "Kandinsky ControlNet (Image-to-Image)",
        ModelKind::Diffuser,
        false,
    );

    map
}

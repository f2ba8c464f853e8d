//! Keyword record and partial updates.

use serde::{Deserialize, Serialize};

/// Stable numeric identifier of a keyword row. Lower ids are older.
pub type KeywordId = i64;

/// A keyword node of the graph, candidate for deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    /// Unique, stable row id
    pub id: KeywordId,
    /// Display name
    pub name: String,
    /// Optional free-text description
    #[serde(default)]
    pub description: Option<String>,
    /// Embedding of name + description
    #[serde(default)]
    pub text_embedding: Option<Vec<f32>>,
    /// Embedding of the name alone
    #[serde(default)]
    pub name_embedding: Option<Vec<f32>>,
}

impl Keyword {
    /// Create a keyword with no description and no embeddings.
    pub fn new(id: KeywordId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            text_embedding: None,
            name_embedding: None,
        }
    }

    /// Builder: set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder: set the name embedding.
    pub fn with_name_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.name_embedding = Some(embedding);
        self
    }

    /// Builder: set the text embedding.
    pub fn with_text_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.text_embedding = Some(embedding);
        self
    }

    /// True if a non-empty name embedding is present.
    pub fn has_name_embedding(&self) -> bool {
        self.name_embedding.as_ref().is_some_and(|v| !v.is_empty())
    }

    /// True if a non-empty text embedding is present.
    pub fn has_text_embedding(&self) -> bool {
        self.text_embedding.as_ref().is_some_and(|v| !v.is_empty())
    }

    /// Description with surrounding whitespace removed, `None` when blank.
    pub fn description_text(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    /// Text used for the text embedding: name plus description.
    ///
    /// Falls back to the name alone when the description is blank.
    pub fn embedding_text(&self) -> String {
        embedding_text(&self.name, self.description.as_deref())
    }
}

/// Compose the text-embedding input from a name and optional description.
pub fn embedding_text(name: &str, description: Option<&str>) -> String {
    let name = name.trim();
    match description.map(str::trim).filter(|d| !d.is_empty()) {
        Some(desc) if name.is_empty() => desc.to_string(),
        Some(desc) => format!("{name}\n{desc}"),
        None => name.to_string(),
    }
}

/// Partial update of a keyword row.
///
/// `None` fields are left untouched. `description: Some(None)` clears the
/// description.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KeywordUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_embedding: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_embedding: Option<Vec<f32>>,
}

impl KeywordUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    pub fn with_text_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.text_embedding = Some(embedding);
        self
    }

    pub fn with_name_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.name_embedding = Some(embedding);
        self
    }

    /// True if applying this update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.text_embedding.is_none()
            && self.name_embedding.is_none()
    }

    /// Apply the update to an in-memory keyword.
    pub fn apply_to(&self, keyword: &mut Keyword) {
        if let Some(name) = &self.name {
            keyword.name = name.clone();
        }
        if let Some(description) = &self.description {
            keyword.description = description.clone();
        }
        if let Some(embedding) = &self.text_embedding {
            keyword.text_embedding = Some(embedding.clone());
        }
        if let Some(embedding) = &self.name_embedding {
            keyword.name_embedding = Some(embedding.clone());
        }
    }
}

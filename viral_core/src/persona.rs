//! Persona records consumed from the host.
//!
//! Personas are generated and validated elsewhere; the engine only reads them.

use crate::graph::Metadata;
use serde::{Deserialize, Serialize};
use viral_env::UserId;

/// A synthetic user profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub id: UserId,
    pub archetype: String,
    pub experience_level: String,
    pub collaboration_style: String,
    pub tech_adoption: String,

    /// Situations that make this persona likely to refer
    #[serde(default)]
    pub referral_triggers: Vec<String>,

    /// Any further host-defined attributes
    #[serde(default)]
    pub attributes: Metadata,
}

impl Persona {
    /// Creates a persona with the given id and empty profile fields.
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            archetype: String::new(),
            experience_level: String::new(),
            collaboration_style: String::new(),
            tech_adoption: String::new(),
            referral_triggers: Vec::new(),
            attributes: Metadata::new(),
        }
    }

    /// Sets the archetype.
    pub fn with_archetype(mut self, archetype: impl Into<String>) -> Self {
        self.archetype = archetype.into();
        self
    }

    /// Sets the referral triggers.
    pub fn with_triggers<I, S>(mut self, triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.referral_triggers = triggers.into_iter().map(Into::into).collect();
        self
    }

    /// Node metadata recorded when the persona joins the graph.
    pub fn node_metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        if !self.archetype.is_empty() {
            metadata.insert("archetype".into(), self.archetype.clone().into());
        }
        if !self.experience_level.is_empty() {
            metadata.insert("experience_level".into(), self.experience_level.clone().into());
        }
        metadata
    }
}

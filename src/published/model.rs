//! Records read from the content, media, member and domain services, and the
//! published views built from them.

use std::collections::BTreeSet;
use std::sync::Arc;

use uuid::Uuid;

/// How a content type's properties vary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentVariation {
    #[default]
    Nothing,
    Culture,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTypeInfo {
    pub id: i32,
    pub key: Uuid,
    pub alias: String,
    pub variation: ContentVariation,
}

impl ContentTypeInfo {
    pub fn invariant(id: i32, alias: impl Into<String>) -> Self {
        Self {
            id,
            key: Uuid::from_u128(id as u128),
            alias: alias.into(),
            variation: ContentVariation::Nothing,
        }
    }

    pub fn by_culture(id: i32, alias: impl Into<String>) -> Self {
        Self {
            variation: ContentVariation::Culture,
            ..Self::invariant(id, alias)
        }
    }

    pub fn varies_by_culture(&self) -> bool {
        self.variation == ContentVariation::Culture
    }
}

/// A content or media item as stored by the backing service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentNode {
    pub id: i32,
    pub key: Uuid,
    pub parent_id: Option<i32>,
    pub name: String,
    pub content_type: Arc<ContentTypeInfo>,
    /// Published in at least one culture (or at all, for invariant content).
    pub published: bool,
    pub available_cultures: BTreeSet<String>,
    pub published_cultures: BTreeSet<String>,
}

impl ContentNode {
    pub fn new(id: i32, key: Uuid, name: impl Into<String>, content_type: Arc<ContentTypeInfo>) -> Self {
        Self {
            id,
            key,
            parent_id: None,
            name: name.into(),
            content_type,
            published: false,
            available_cultures: BTreeSet::new(),
            published_cultures: BTreeSet::new(),
        }
    }

    pub fn under(mut self, parent_id: i32) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn published(mut self, published: bool) -> Self {
        self.published = published;
        self
    }

    /// Adds a culture; `published` also marks the node as published.
    pub fn with_culture(mut self, culture: &str, published: bool) -> Self {
        self.available_cultures.insert(culture.to_string());
        if published {
            self.published_cultures.insert(culture.to_string());
            self.published = true;
        }
        self
    }

    pub fn is_culture_available(&self, culture: &str) -> bool {
        self.available_cultures.contains(culture)
    }

    pub fn is_culture_published(&self, culture: &str) -> bool {
        self.published_cultures.contains(culture)
    }
}

/// The renderable view of a content or media item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedContent {
    pub id: i32,
    pub key: Uuid,
    pub parent_id: Option<i32>,
    pub name: String,
    pub content_type_alias: String,
    /// Built for a preview request and may show unpublished state.
    pub is_preview: bool,
    pub cultures: Vec<String>,
}

impl PublishedContent {
    pub fn from_node(node: &ContentNode, preview: bool) -> Self {
        let cultures = if preview {
            &node.available_cultures
        } else {
            &node.published_cultures
        };
        Self {
            id: node.id,
            key: node.key,
            parent_id: node.parent_id,
            name: node.name.clone(),
            content_type_alias: node.content_type.alias.clone(),
            is_preview: preview,
            cultures: cultures.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberNode {
    pub id: i32,
    pub key: Uuid,
    pub username: String,
    pub email: String,
    pub member_type_alias: String,
    pub approved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMember {
    pub id: i32,
    pub key: Uuid,
    pub username: String,
    pub email: String,
    pub member_type_alias: String,
}

impl From<&MemberNode> for PublishedMember {
    fn from(node: &MemberNode) -> Self {
        Self {
            id: node.id,
            key: node.key,
            username: node.username.clone(),
            email: node.email.clone(),
            member_type_alias: node.member_type_alias.clone(),
        }
    }
}

/// A domain as stored by the domain service; root and culture may be missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRecord {
    pub id: i32,
    pub name: String,
    pub root_content_id: Option<i32>,
    pub language_iso_code: Option<String>,
    pub is_wildcard: bool,
    pub sort_order: i32,
}

/// A validated domain assigned to a content root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    pub id: i32,
    pub name: String,
    pub content_id: i32,
    pub culture: String,
    pub is_wildcard: bool,
    pub sort_order: i32,
}

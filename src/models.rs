use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Schema-free metadata block at the top of a post.
///
/// Authors may add any field, so nothing here is required. The accessors
/// return `None` (or an empty list) when a field is absent or has an
/// unexpected shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrontMatter(Map<String, Value>);

impl FrontMatter {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str).filter(|s| !s.trim().is_empty())
    }

    pub fn title(&self) -> Option<&str> {
        self.str_field("title")
    }

    pub fn date(&self) -> Option<&str> {
        self.str_field("date")
    }

    pub fn description(&self) -> Option<&str> {
        self.str_field("description")
            .or_else(|| self.str_field("excerpt"))
    }

    /// `tags` may be written as a single string or a list.
    pub fn tags(&self) -> Vec<&str> {
        match self.get("tags") {
            Some(Value::String(tag)) => vec![tag.as_str()],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostDescriptor {
    pub slug: String,
    pub frontmatter: FrontMatter,
}

impl PostDescriptor {
    pub fn display_title(&self) -> &str {
        self.frontmatter.title().unwrap_or(&self.slug)
    }
}

/// GitHub hands out numeric ids, other sources may not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepoId {
    Number(u64),
    Text(String),
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoId::Number(n) => write!(f, "{}", n),
            RepoId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub id: RepoId,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(rename = "html_url", default, deserialize_with = "null_as_empty")]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryList {
    #[serde(default)]
    pub repos: Vec<RepositorySummary>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

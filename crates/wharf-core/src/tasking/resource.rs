use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// A lockable resource a job mutates or reads under reservation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum ResourceId {
    Repository(String),
    Remote(String),
    Publisher(String),
}

impl ResourceId {
    pub fn repository(name: impl Into<String>) -> Self {
        ResourceId::Repository(name.into())
    }

    pub fn remote(name: impl Into<String>) -> Self {
        ResourceId::Remote(name.into())
    }

    pub fn publisher(name: impl Into<String>) -> Self {
        ResourceId::Publisher(name.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ResourceId::Repository(_) => "repository",
            ResourceId::Remote(_) => "remote",
            ResourceId::Publisher(_) => "publisher",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ResourceId::Repository(name)
            | ResourceId::Remote(name)
            | ResourceId::Publisher(name) => name,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.name())
    }
}

impl FromStr for ResourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, name) = s
            .split_once(':')
            .ok_or_else(|| format!("resource `{s}` is not of the form kind:name"))?;
        if name.is_empty() {
            return Err(format!("resource `{s}` has an empty name"));
        }
        match kind {
            "repository" => Ok(ResourceId::repository(name)),
            "remote" => Ok(ResourceId::remote(name)),
            "publisher" => Ok(ResourceId::publisher(name)),
            other => Err(format!("unknown resource kind `{other}`")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let id = ResourceId::repository("pypi");
        assert_eq!(id.to_string(), "repository:pypi");
        assert_eq!("repository:pypi".parse::<ResourceId>().unwrap(), id);
        assert_eq!(
            "remote:up:stream".parse::<ResourceId>().unwrap(),
            ResourceId::remote("up:stream")
        );
        assert!("bucket:x".parse::<ResourceId>().is_err());
        assert!("publisher:".parse::<ResourceId>().is_err());
        assert!("pypi".parse::<ResourceId>().is_err());
    }
}

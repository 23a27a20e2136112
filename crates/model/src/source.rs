use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LinkError;

/// One external knowledge base an entity can be linked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Wikipedia,
    Wikidata,
    Dbpedia,
}

impl Source {
    /// Resolution order used by the pipeline. Wikipedia goes first because its pages
    /// carry the identifiers the other two sources are linked through.
    pub const ALL: [Source; 3] = [Source::Wikipedia, Source::Wikidata, Source::Dbpedia];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Wikipedia => "wikipedia",
            Source::Wikidata => "wikidata",
            Source::Dbpedia => "dbpedia",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wikipedia" => Ok(Source::Wikipedia),
            "wikidata" => Ok(Source::Wikidata),
            "dbpedia" => Ok(Source::Dbpedia),
            other => Err(LinkError::Config(format!("unknown source '{}'", other))),
        }
    }
}

/// Linkage state of one entity against one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    #[default]
    NotAttempted,
    Linked,
    NotLinked,
    Error,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::NotAttempted => "not_attempted",
            LinkStatus::Linked => "linked",
            LinkStatus::NotLinked => "not_linked",
            LinkStatus::Error => "error",
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_parse() {
        assert_eq!("Wikidata".parse::<Source>().unwrap(), Source::Wikidata);
        assert_eq!(" dbpedia ".parse::<Source>().unwrap(), Source::Dbpedia);
        assert!("freebase".parse::<Source>().is_err());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Source::Wikipedia).unwrap(), "\"wikipedia\"");
        assert_eq!(
            serde_json::to_string(&LinkStatus::NotAttempted).unwrap(),
            "\"not_attempted\""
        );
    }
}

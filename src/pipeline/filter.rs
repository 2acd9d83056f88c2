use crate::error::ConfigError;
use crate::pipeline::context::RecordData;
use indexmap::IndexSet;

/// Key projection applied to every structured event
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FilterRule {
    /// Keep only the listed keys
    Include(IndexSet<String>),
    /// Drop the listed keys
    Exclude(IndexSet<String>),
    /// Leave events untouched
    #[default]
    Identity,
}

impl FilterRule {
    /// Build the rule from optional include/exclude lists. Both present is an error.
    pub fn from_keys(
        include: Option<&[String]>,
        exclude: Option<&[String]>,
    ) -> Result<Self, ConfigError> {
        match (include, exclude) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingKeyFilters),
            (Some(keys), None) => Ok(FilterRule::Include(keys.iter().cloned().collect())),
            (None, Some(keys)) => Ok(FilterRule::Exclude(keys.iter().cloned().collect())),
            (None, None) => Ok(FilterRule::Identity),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FilterRule::Include(_) => "include",
            FilterRule::Exclude(_) => "exclude",
            FilterRule::Identity => "identity",
        }
    }

    /// Project the key set of an event. Never drops the event itself.
    ///
    /// Only structured objects have keys; raw records, arrays and scalars pass
    /// through unchanged.
    pub fn apply(&self, record: RecordData) -> RecordData {
        let obj = match record {
            RecordData::Structured(serde_json::Value::Object(obj)) => obj,
            other => return other,
        };

        let projected = match self {
            FilterRule::Identity => obj,
            FilterRule::Include(keys) => obj
                .into_iter()
                .filter(|(key, _)| keys.contains(key))
                .collect(),
            FilterRule::Exclude(keys) => obj
                .into_iter()
                .filter(|(key, _)| !keys.contains(key))
                .collect(),
        };

        RecordData::Structured(serde_json::Value::Object(projected))
    }
}

/// Split a comma-separated key list, trimming whitespace and dropping empty entries
pub fn parse_key_list(list: &str) -> Result<Vec<String>, ConfigError> {
    clean_keys(list.split(','))
}

/// Trim key names and drop empty ones; an empty result is an error
pub(crate) fn clean_keys<'a>(
    keys: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<String>, ConfigError> {
    let given: Vec<&str> = keys.into_iter().collect();
    let cleaned: Vec<String> = given
        .iter()
        .map(|key| key.trim())
        .filter(|key| !key.is_empty())
        .map(|key| key.to_string())
        .collect();

    if cleaned.is_empty() {
        return Err(ConfigError::EmptyKeyList(given.join(",")));
    }
    Ok(cleaned)
}

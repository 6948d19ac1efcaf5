use std::fmt;

use crate::{ModelError, Topic};

/// Subscription pattern.
///
/// Follows the MQTT wildcard rules: `+` matches exactly one level and must occupy a whole level,
/// `#` matches any number of trailing levels and may only appear as the last level.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicFilter(String);

impl TopicFilter {
    pub fn new(filter: impl Into<String>) -> Result<Self, ModelError> {
        let filter = filter.into();
        if let Some(reason) = validate(&filter) {
            return Err(ModelError::InvalidFilter { filter, reason });
        }
        Ok(Self(filter))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if `topic` would be delivered to a subscriber of this filter.
    pub fn matches(&self, topic: &Topic) -> bool {
        let mut levels = topic.as_str().split('/');
        for pattern in self.0.split('/') {
            match pattern {
                "#" => return true,
                "+" => {
                    if levels.next().is_none() {
                        return false;
                    }
                }
                exact => {
                    if levels.next() != Some(exact) {
                        return false;
                    }
                }
            }
        }
        levels.next().is_none()
    }
}

fn validate(filter: &str) -> Option<&'static str> {
    if filter.is_empty() {
        return Some("filter must not be empty");
    }
    if filter.contains('\0') {
        return Some("filter must not contain NUL");
    }
    let levels: Vec<&str> = filter.split('/').collect();
    let last = levels.len() - 1;
    for (i, level) in levels.iter().enumerate() {
        if level.contains('#') && (*level != "#" || i != last) {
            return Some("'#' must be the whole last level");
        }
        if level.contains('+') && *level != "+" {
            return Some("'+' must occupy a whole level");
        }
    }
    None
}

impl fmt::Display for TopicFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Topic> for TopicFilter {
    fn from(topic: Topic) -> Self {
        Self(topic.into())
    }
}

impl TryFrom<&str> for TopicFilter {
    type Error = ModelError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(s: &str) -> Topic {
        Topic::new(s).unwrap()
    }

    #[test]
    fn accepts_valid_filters() {
        for f in ["a/b", "#", "+", "sensors/+/temp", "sensors/#", "+/+/#"] {
            assert!(TopicFilter::new(f).is_ok(), "{f}");
        }
    }

    #[test]
    fn rejects_misplaced_wildcards() {
        for f in ["", "a/#/b", "a#", "a/b+", "+a/b"] {
            assert!(TopicFilter::new(f).is_err(), "{f}");
        }
    }

    #[test]
    fn single_level_wildcard() {
        let f = TopicFilter::new("sensors/+/temp").unwrap();
        assert!(f.matches(&topic("sensors/kitchen/temp")));
        assert!(!f.matches(&topic("sensors/kitchen/humidity")));
        assert!(!f.matches(&topic("sensors/kitchen/oven/temp")));
    }

    #[test]
    fn multi_level_wildcard() {
        let f = TopicFilter::new("devices/#").unwrap();
        assert!(f.matches(&topic("devices/commands/restart")));
        assert!(f.matches(&topic("devices/x")));
        assert!(!f.matches(&topic("sensors/x")));
    }

    #[test]
    fn exact_filter() {
        let f = TopicFilter::from(topic("a/b"));
        assert!(f.matches(&topic("a/b")));
        assert!(!f.matches(&topic("a/b/c")));
        assert!(!f.matches(&topic("a")));
    }
}

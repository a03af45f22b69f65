//! Topic remapping from the subscribed namespace to the output namespace.

use crate::error::TopicError;

/// Strip trailing wildcard levels and separators, e.g. `msh/US/#` or
/// `msh/US/+` to `msh/US`.
pub fn literal_prefix(pattern: &str) -> &str {
    let mut prefix = pattern.trim_end_matches('/');
    loop {
        let last = prefix.rsplit_once('/').map_or(prefix, |(_, level)| level);
        if last != "#" && last != "+" {
            return prefix;
        }
        prefix = prefix[..prefix.len() - last.len()].trim_end_matches('/');
    }
}

/// Rewrites inbound topics under the subscribed prefix to the output prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMapper {
    input_prefix: String,
    output_prefix: String,
}

impl TopicMapper {
    /// Build from the subscription pattern and the output topic.
    ///
    /// The pattern may only end in a wildcard; a `+` or `#` before the end
    /// would make the literal prefix meaningless.
    pub fn new(input_pattern: &str, output_topic: &str) -> Result<Self, TopicError> {
        let input_prefix = literal_prefix(input_pattern);
        if input_prefix.contains(['+', '#']) {
            return Err(TopicError::InteriorWildcard(input_pattern.to_string()));
        }
        let output_prefix = literal_prefix(output_topic);
        if output_prefix.contains(['+', '#']) {
            return Err(TopicError::WildcardInOutput(output_topic.to_string()));
        }
        Ok(Self {
            input_prefix: input_prefix.to_string(),
            output_prefix: output_prefix.to_string(),
        })
    }

    pub fn input_prefix(&self) -> &str {
        &self.input_prefix
    }

    pub fn output_prefix(&self) -> &str {
        &self.output_prefix
    }

    /// Replace the input prefix at the start of `topic`, keeping the rest
    /// verbatim.
    pub fn map(&self, topic: &str) -> Result<String, TopicError> {
        map(topic, &self.input_prefix, &self.output_prefix)
    }
}

/// Stateless form of [`TopicMapper::map`].
pub fn map(topic: &str, input_pattern: &str, output_prefix: &str) -> Result<String, TopicError> {
    let prefix = literal_prefix(input_pattern);
    let rest = topic
        .strip_prefix(prefix)
        .ok_or_else(|| TopicError::PrefixMismatch {
            topic: topic.to_string(),
            prefix: prefix.to_string(),
        })?;
    let output = literal_prefix(output_prefix);

    let mut mapped = String::with_capacity(output.len() + rest.len());
    mapped.push_str(output);
    mapped.push_str(rest);
    Ok(mapped)
}

//! Search filter templates.
//!
//! A template such as `(&(objectClass=person)(mail=%u))` is compiled once at
//! construction. Each `%x` token names a parameter; values bound at render
//! time are escaped per RFC 4515 so a username can never alter the filter
//! structure. `%%` renders a literal percent sign.

use std::fmt;

use ldap3::ldap_escape;

use crate::error::FilterError;

/// Placeholder bound to the candidate username.
pub const USERNAME: char = 'u';

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(char),
}

/// Compiled search filter template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl FilterTemplate {
    /// Compile any template made of literals and `%x` placeholders.
    pub fn parse(template: &str) -> Result<Self, FilterError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.char_indices();

        while let Some((position, c)) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }

            match chars.next() {
                Some((_, '%')) => literal.push('%'),
                Some((_, name)) if name.is_ascii_alphabetic() => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(
                            &mut literal,
                        )));
                    }
                    segments.push(Segment::Param(name));
                },
                Some((_, name)) => {
                    return Err(FilterError::InvalidPlaceholder { name });
                },
                None => return Err(FilterError::DanglingPercent { position }),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: template.to_owned(),
            segments,
        })
    }

    /// Compile a user lookup template.
    ///
    /// The template must reference `%u` and no other parameter.
    pub fn user_filter(template: &str) -> Result<Self, FilterError> {
        let filter = Self::parse(template)?;

        if let Some(name) = filter.placeholders().find(|&n| n != USERNAME) {
            return Err(FilterError::InvalidPlaceholder { name });
        }
        if !filter.placeholders().any(|n| n == USERNAME) {
            return Err(FilterError::MissingPlaceholder);
        }

        Ok(filter)
    }

    /// Names of every placeholder, in template order.
    pub fn placeholders(&self) -> impl Iterator<Item = char> + '_ {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param(name) => Some(*name),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute every placeholder with its escaped value.
    pub fn render(&self, params: &FilterParams) -> Result<String, FilterError> {
        let mut out = String::with_capacity(self.source.len());

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Param(name) => {
                    let value = params
                        .get(*name)
                        .ok_or(FilterError::UnboundParameter { name: *name })?;
                    out.push_str(&ldap_escape(value));
                },
            }
        }

        Ok(out)
    }
}

impl fmt::Display for FilterTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Named values substituted into a [`FilterTemplate`].
#[derive(Debug, Default, Clone)]
pub struct FilterParams<'a> {
    values: Vec<(char, &'a str)>,
}

impl<'a> FilterParams<'a> {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters for a user lookup.
    pub fn user(username: &'a str) -> Self {
        Self::new().bind(USERNAME, username)
    }

    /// Bind `value` to placeholder `name`, replacing any previous value.
    pub fn bind(mut self, name: char, value: &'a str) -> Self {
        self.values.retain(|(n, _)| *n != name);
        self.values.push((name, value));
        self
    }

    fn get(&self, name: char) -> Option<&'a str> {
        self.values
            .iter()
            .find_map(|(n, value)| (*n == name).then_some(*value))
    }
}

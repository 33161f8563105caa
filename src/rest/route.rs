//! Route metadata derived from URI templates.
//!
//! # Responsibilities
//! - Parse a template (`/orders/{id}?<expand>`) once, at registration time
//! - Expose literal tokens, path parameters and query parameters
//! - Match request path segments structurally (arity + literal positions)
//! - Produce the router pattern used when mounting on axum
//!
//! # Design Decisions
//! - `{name}` binds one path segment positionally
//! - `<name>` binds from the query string by name and never takes part in path matching
//! - `?` and `&` inside a template are separators only
//! - No regex: templates are scanned once and matching is a segment-wise comparison

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::http::Method;

/// HTTP verbs an operation can be declared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
        }
    }

    /// Map an HTTP method onto a verb, if it is one we dispatch.
    pub fn from_method(method: &Method) -> Option<Self> {
        method.as_str().parse().ok()
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a method name is not one of the four dispatchable verbs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HTTP verb `{0}`")]
pub struct UnsupportedVerb(pub String);

impl FromStr for Verb {
    type Err = UnsupportedVerb;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Verb::Get),
            "POST" => Ok(Verb::Post),
            "PUT" => Ok(Verb::Put),
            "DELETE" => Ok(Verb::Delete),
            other => Err(UnsupportedVerb(other.to_string())),
        }
    }
}

/// One path-bound piece of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the request segment at the same position.
    Literal(String),
    /// Takes whatever the request has at this position.
    Param(String),
}

/// Immutable routing descriptor attached to an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMetadata {
    verb: Verb,
    path_template: String,
    segments: Vec<Segment>,
    service_name_tokens: Vec<String>,
    path_param_names: Vec<String>,
    query_param_names: Vec<String>,
    function_param_names: Arc<[String]>,
}

impl RouteMetadata {
    /// Derive metadata from a template and the operation's ordered parameter names.
    ///
    /// Parameter names are not checked against the placeholders; a name with
    /// no source simply binds as `None` at dispatch time.
    pub fn new<I, P>(verb: Verb, path_template: impl Into<String>, function_params: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        let path_template = path_template.into();
        let (segments, query_param_names) = parse_template(&path_template);

        let mut service_name_tokens = Vec::new();
        let mut path_param_names = Vec::new();
        for segment in &segments {
            match segment {
                Segment::Literal(token) => service_name_tokens.push(token.clone()),
                Segment::Param(name) => path_param_names.push(name.clone()),
            }
        }

        Self {
            verb,
            path_template,
            segments,
            service_name_tokens,
            path_param_names,
            query_param_names,
            function_param_names: function_params.into_iter().map(Into::into).collect(),
        }
    }

    /// Metadata whose parameter list is the template's placeholders in order:
    /// path parameters first, then query parameters.
    pub fn from_template(verb: Verb, path_template: impl Into<String>) -> Self {
        let path_template = path_template.into();
        let (segments, query) = parse_template(&path_template);
        let params: Vec<String> = segments
            .into_iter()
            .filter_map(|s| match s {
                Segment::Param(name) => Some(name),
                Segment::Literal(_) => None,
            })
            .chain(query)
            .collect();
        Self::new(verb, path_template, params)
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn path_template(&self) -> &str {
        &self.path_template
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn service_name_tokens(&self) -> &[String] {
        &self.service_name_tokens
    }

    pub fn path_param_names(&self) -> &[String] {
        &self.path_param_names
    }

    pub fn query_param_names(&self) -> &[String] {
        &self.query_param_names
    }

    pub fn function_param_names(&self) -> &Arc<[String]> {
        &self.function_param_names
    }

    /// Structural match: same segment count, literals equal at their positions.
    pub fn matches_path(&self, path_segments: &[&str]) -> bool {
        path_segments.len() == self.path_param_names.len() + self.service_name_tokens.len()
            && self
                .segments
                .iter()
                .zip(path_segments)
                .all(|(segment, actual)| match segment {
                    Segment::Literal(token) => token == actual,
                    Segment::Param(_) => true,
                })
    }

    /// Values sitting in parameter slots, in template order.
    ///
    /// Call only after [`matches_path`](Self::matches_path) returned true.
    pub fn path_values<'a>(&self, path_segments: &[&'a str]) -> Vec<&'a str> {
        self.segments
            .iter()
            .zip(path_segments)
            .filter(|(segment, _)| matches!(segment, Segment::Param(_)))
            .map(|(_, value)| *value)
            .collect()
    }

    /// Function parameters with no path placeholder, in declaration order.
    /// These are looked up in the query string.
    pub fn unbound_params(&self) -> impl Iterator<Item = &str> {
        self.function_param_names
            .iter()
            .map(String::as_str)
            .filter(move |name| !self.path_param_names.iter().any(|p| p.as_str() == *name))
    }

    /// Pattern for the HTTP router: every `{name}` becomes a single-segment
    /// capture, query placeholders disappear.
    ///
    /// Captures are numbered by position so that templates differing only in
    /// parameter names collapse onto the same pattern.
    pub fn route_pattern(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }
        let mut pattern = String::new();
        let mut index = 0;
        for segment in &self.segments {
            pattern.push('/');
            match segment {
                Segment::Literal(token) => {
                    pattern.push_str(&token.replace('{', "{{").replace('}', "}}"))
                }
                Segment::Param(_) => {
                    pattern.push_str(&format!("{{p{index}}}"));
                    index += 1;
                }
            }
        }
        pattern
    }
}

fn parse_template(template: &str) -> (Vec<Segment>, Vec<String>) {
    let mut segments = Vec::new();
    let mut query = Vec::new();

    for raw in template.split('/') {
        let mut text = String::with_capacity(raw.len());
        let mut chars = raw.chars();
        while let Some(c) = chars.next() {
            match c {
                '<' => {
                    let name: String = chars.by_ref().take_while(|&c| c != '>').collect();
                    if !name.is_empty() {
                        query.push(name);
                    }
                }
                '?' | '&' => {}
                other => text.push(other),
            }
        }

        if text.is_empty() {
            continue;
        }
        match text.strip_prefix('{').and_then(|t| t.strip_suffix('}')) {
            Some(name) => segments.push(Segment::Param(name.to_string())),
            None => segments.push(Segment::Literal(text)),
        }
    }

    (segments, query)
}

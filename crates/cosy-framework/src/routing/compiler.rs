//! Path template compilation.
//!
//! Templates are split on `/` outside of constraints and each segment is
//! tokenized into literal text and parameters. Parameters are written `:name` or `{name}`, may carry a
//! constraint (`:name(\d+)`, `{name:\d+}`) and may be optional (`:name?`,
//! `{name?}`). A segment that is nothing but an optional parameter is dropped
//! together with its slash when absent:
//!
//! ```text
//! /users/:id?        ^/users(?:/([^/]+))?$
//! /posts/{slug:[a-z-]+}  ^/posts/([a-z-]+)$
//! /files/:name.:ext  ^/files/([^/]+)\.([^/]+)$
//! ```

use std::collections::HashMap;
use std::fmt::Write;
use std::iter::Peekable;
use std::str::Chars;

use regex::Regex;

use cosy_core::Params;

use crate::error::{RouteError, RouteResult};

const DEFAULT_CONSTRAINT: &str = "[^/]+";

/// Non-empty `/`-separated segments. Slashes inside `{..}` or `(..)` belong
/// to a constraint and do not split.
fn split_segments(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in path.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '{' | '(' => depth += 1,
            '}' | ')' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => {
                segments.push(&path[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&path[start..]);
    segments.retain(|s| !s.is_empty());
    segments
}

/// Forces a leading slash, collapses repeated slashes and strips a trailing
/// slash (except for the root).
pub fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 1);
    for segment in split_segments(path) {
        normalized.push('/');
        normalized.push_str(segment);
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}

/// Joins a group prefix and a route path with exactly one slash.
pub fn join_paths(prefix: &str, path: &str) -> String {
    normalize_path(&format!("{prefix}/{path}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Param {
        name: String,
        constraint: Option<String>,
        optional: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment(Vec<Part>);

impl Segment {
    /// The parameter name if the segment is a lone optional parameter.
    fn optional_param(&self) -> Option<&str> {
        match self.0.as_slice() {
            [Part::Param {
                name,
                optional: true,
                ..
            }] => Some(name.as_str()),
            _ => None,
        }
    }
}

/// A template compiled into an anchored regular expression.
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    template: String,
    pattern: Regex,
    param_names: Vec<String>,
    segments: Vec<Segment>,
}

impl CompiledRoute {
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Parameter names in capture-group order.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Matches `path`, returning its parameters. Optional parameters that
    /// were not supplied are absent from the map.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let captures = self.pattern.captures(path)?;
        Some(
            self.param_names
                .iter()
                .enumerate()
                .filter_map(|(i, name)| {
                    captures
                        .get(i + 1)
                        .map(|m| (name.clone(), m.as_str().to_string()))
                })
                .collect(),
        )
    }

    /// Builds a concrete path from `params`.
    pub fn build(&self, params: &Params) -> RouteResult<String> {
        let missing = |param: &str| RouteError::MissingParameter {
            route: self.template.clone(),
            param: param.to_string(),
        };

        let mut path = String::new();
        for segment in &self.segments {
            if let Some(name) = segment.optional_param() {
                if let Some(value) = params.get(name) {
                    path.push('/');
                    path.push_str(value);
                }
                continue;
            }

            path.push('/');
            for part in &segment.0 {
                match part {
                    Part::Literal(text) => path.push_str(text),
                    Part::Param { name, optional, .. } => match params.get(name) {
                        Some(value) => path.push_str(value),
                        None if *optional => {}
                        None => return Err(missing(name.as_str())),
                    },
                }
            }
        }

        if path.is_empty() {
            path.push('/');
        }
        Ok(path)
    }
}

/// Compiles a path template.
pub fn compile(template: &str) -> RouteResult<CompiledRoute> {
    compile_with(template, &HashMap::new())
}

/// Compiles a path template, with `constraints` overriding inline parameter
/// constraints by name.
pub fn compile_with(
    template: &str,
    constraints: &HashMap<String, String>,
) -> RouteResult<CompiledRoute> {
    let normalized = normalize_path(template);
    let segments = split_segments(&normalized)
        .into_iter()
        .map(|s| parse_segment(&normalized, s).map(Segment))
        .collect::<RouteResult<Vec<_>>>()?;

    let mut param_names: Vec<String> = Vec::new();
    let mut body = String::new();
    let mut all_optional = !segments.is_empty();

    for segment in &segments {
        let whole_optional = segment.optional_param().is_some();
        if whole_optional {
            body.push_str("(?:/");
        } else {
            all_optional = false;
            body.push('/');
        }

        for part in &segment.0 {
            match part {
                Part::Literal(text) => body.push_str(&regex::escape(text)),
                Part::Param {
                    name,
                    constraint,
                    optional,
                } => {
                    if param_names.contains(name) {
                        return Err(RouteError::DuplicateParameter {
                            template: normalized.clone(),
                            param: name.clone(),
                        });
                    }
                    let constraint = constraints
                        .get(name)
                        .map(String::as_str)
                        .or(constraint.as_deref())
                        .unwrap_or(DEFAULT_CONSTRAINT);
                    check_constraint(&normalized, name, constraint)?;

                    let _ = write!(body, "({constraint})");
                    if *optional && !whole_optional {
                        body.push('?');
                    }
                    param_names.push(name.clone());
                }
            }
        }

        if whole_optional {
            body.push_str(")?");
        }
    }

    if let Some(unknown) = constraints.keys().find(|k| !param_names.contains(*k)) {
        return Err(RouteError::UnknownParameter {
            template: normalized,
            param: unknown.clone(),
        });
    }

    let source = if segments.is_empty() {
        "^/$".to_string()
    } else if all_optional {
        format!("^(?:{body}|/)$")
    } else {
        format!("^{body}$")
    };
    let pattern = Regex::new(&source).map_err(|e| RouteError::invalid(&normalized, e.to_string()))?;

    Ok(CompiledRoute {
        template: normalized,
        pattern,
        param_names,
        segments,
    })
}

/// Matches `path` against a compiled route.
pub fn match_path(route: &CompiledRoute, path: &str) -> Option<Params> {
    route.matches(path)
}

/// A constraint must be a valid expression without capturing groups, so
/// that capture indices keep lining up with parameter names.
fn check_constraint(template: &str, param: &str, constraint: &str) -> RouteResult<()> {
    let re = Regex::new(&format!("(?:{constraint})"))
        .map_err(|e| RouteError::invalid(template, format!("parameter '{param}': {e}")))?;
    if re.captures_len() != 1 {
        return Err(RouteError::CapturingConstraint {
            template: template.to_string(),
            param: param.to_string(),
        });
    }
    Ok(())
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn parse_segment(template: &str, segment: &str) -> RouteResult<Vec<Part>> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = segment.chars().peekable();

    while let Some(c) = chars.next() {
        let param = match c {
            ':' if chars.peek().copied().is_some_and(is_ident) => {
                let mut name = String::new();
                while let Some(c) = chars.next_if(|c| is_ident(*c)) {
                    name.push(c);
                }
                let constraint = match chars.next_if_eq(&'(') {
                    Some(_) => Some(take_balanced(template, &mut chars, '(', ')')?),
                    None => None,
                };
                let optional = chars.next_if_eq(&'?').is_some();
                Part::Param {
                    name,
                    constraint,
                    optional,
                }
            }
            '{' => {
                let inner = take_balanced(template, &mut chars, '{', '}')?;
                let (head, constraint) = match inner.split_once(':') {
                    Some((head, constraint)) => (head, Some(constraint.to_string())),
                    None => (inner.as_str(), None),
                };
                let (name, optional) = match head.strip_suffix('?') {
                    Some(name) => (name, true),
                    None => (head, false),
                };
                if name.is_empty() || !name.chars().all(is_ident) {
                    return Err(RouteError::invalid(
                        template,
                        format!("malformed parameter '{{{inner}}}'"),
                    ));
                }
                Part::Param {
                    name: name.to_string(),
                    constraint,
                    optional,
                }
            }
            _ => {
                literal.push(c);
                continue;
            }
        };

        if !literal.is_empty() {
            parts.push(Part::Literal(std::mem::take(&mut literal)));
        }
        parts.push(param);
    }

    if !literal.is_empty() {
        parts.push(Part::Literal(literal));
    }
    Ok(parts)
}

/// Consumes up to the delimiter closing an already consumed `open`,
/// honouring nesting and backslash escapes.
fn take_balanced(
    template: &str,
    chars: &mut Peekable<Chars<'_>>,
    open: char,
    close: char,
) -> RouteResult<String> {
    let mut depth = 1usize;
    let mut taken = String::new();

    while let Some(c) = chars.next() {
        if c == '\\' {
            taken.push(c);
            if let Some(escaped) = chars.next() {
                taken.push(escaped);
            }
            continue;
        }
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Ok(taken);
            }
        }
        taken.push(c);
    }

    Err(RouteError::invalid(template, format!("unclosed '{open}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("users/"), "/users");
        assert_eq!(normalize_path("//api//users/"), "/api/users");
        assert_eq!(join_paths("/api/", "/users"), "/api/users");
        assert_eq!(join_paths("/api", "/"), "/api");
    }

    #[test]
    fn test_constraint_with_slash() {
        assert_eq!(normalize_path("files//{path:.+/.+}/"), "/files/{path:.+/.+}");

        let braces = compile("/files/{path:.+/.+}").unwrap();
        assert_eq!(braces.matches("/files/a/b"), Some(params(&[("path", "a/b")])));
        assert!(braces.matches("/files/a").is_none());

        let colon = compile("/raw/:rest(.+/.+)/view").unwrap();
        assert_eq!(colon.matches("/raw/x/y/z/view"), Some(params(&[("rest", "x/y/z")])));
        assert_eq!(colon.param_names(), ["rest"]);
    }

    #[test]
    fn test_static_and_root() {
        let root = compile("/").unwrap();
        assert_eq!(root.pattern().as_str(), "^/$");
        assert!(root.matches("/").is_some());
        assert!(root.matches("/x").is_none());

        let status = compile("/api/status").unwrap();
        assert_eq!(status.matches("/api/status"), Some(Params::new()));
        assert!(status.matches("/api/status/extra").is_none());
    }

    #[test]
    fn test_both_param_syntaxes() {
        let colon = compile("/users/:id/posts/:post").unwrap();
        let braces = compile("/users/{id}/posts/{post}").unwrap();

        let expected = params(&[("id", "7"), ("post", "99")]);
        assert_eq!(colon.matches("/users/7/posts/99"), Some(expected.clone()));
        assert_eq!(braces.matches("/users/7/posts/99"), Some(expected));
        assert_eq!(colon.param_names(), ["id", "post"]);
    }

    #[test]
    fn test_optional_trailing_segment() {
        let route = compile("/users/:id?").unwrap();
        assert_eq!(route.matches("/users"), Some(Params::new()));
        assert_eq!(route.matches("/users/5"), Some(params(&[("id", "5")])));
        assert!(route.matches("/users/").is_none());

        let braces = compile("/users/{id?}").unwrap();
        assert_eq!(braces.matches("/users"), Some(Params::new()));
    }

    #[test]
    fn test_only_optional_segments() {
        let route = compile("/:lang?").unwrap();
        assert_eq!(route.matches("/"), Some(Params::new()));
        assert_eq!(route.matches("/en"), Some(params(&[("lang", "en")])));
    }

    #[test]
    fn test_constraints() {
        let inline = compile(r"/users/:id(\d+)").unwrap();
        assert!(inline.matches("/users/42").is_some());
        assert!(inline.matches("/users/abc").is_none());

        let braces = compile(r"/codes/{code:[A-Z]{3}}").unwrap();
        assert_eq!(braces.matches("/codes/ABC"), Some(params(&[("code", "ABC")])));
        assert!(braces.matches("/codes/ABCD").is_none());

        let constraints = HashMap::from([("id".to_string(), r"\d+".to_string())]);
        let external = compile_with("/posts/{id}", &constraints).unwrap();
        assert!(external.matches("/posts/1").is_some());
        assert!(external.matches("/posts/x").is_none());
    }

    #[test]
    fn test_literals_are_escaped() {
        let route = compile("/files/:name.json").unwrap();
        assert_eq!(route.matches("/files/a.json"), Some(params(&[("name", "a")])));
        assert!(route.matches("/files/axjson").is_none());
    }

    #[test]
    fn test_rejected_templates() {
        assert!(matches!(
            compile("/a/:id/b/:id"),
            Err(RouteError::DuplicateParameter { .. })
        ));
        assert!(matches!(
            compile(r"/a/:id((\d)+)"),
            Err(RouteError::CapturingConstraint { .. })
        ));
        assert!(matches!(
            compile("/a/{id"),
            Err(RouteError::InvalidPattern { .. })
        ));
        assert!(matches!(
            compile("/a/{}"),
            Err(RouteError::InvalidPattern { .. })
        ));

        let constraints = HashMap::from([("nope".to_string(), r"\d+".to_string())]);
        assert!(matches!(
            compile_with("/a/:id", &constraints),
            Err(RouteError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn test_build() {
        let route = compile("/users/:id/posts/:post?").unwrap();
        assert_eq!(
            route.build(&params(&[("id", "1"), ("post", "2")])).unwrap(),
            "/users/1/posts/2"
        );
        assert_eq!(route.build(&params(&[("id", "1")])).unwrap(), "/users/1/posts");
        assert!(matches!(
            route.build(&Params::new()),
            Err(RouteError::MissingParameter { .. })
        ));
    }

    #[test]
    fn test_match_path() {
        let route = compile("/ping").unwrap();
        assert!(match_path(&route, "/ping").is_some());
    }
}

//! URI templates: `scheme://literal/{slot}/{list*}`.
//!
//! A template is a scheme plus `/`-separated segments. Each segment is a
//! literal, a single-value slot (`{name}`) or a variadic slot (`{name*}`)
//! that binds a comma-separated list carried in one segment. A variadic
//! slot is only valid as the final segment.

use std::collections::HashSet;
use std::fmt;

use crate::types::{ConfigError, ParamType};

/// One segment of a [`UriTemplate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
    Variadic(String),
}

impl Segment {
    pub fn literal(text: impl Into<String>) -> Self {
        Segment::Literal(text.into())
    }

    pub fn param(name: impl Into<String>) -> Self {
        Segment::Param(name.into())
    }

    pub fn variadic(name: impl Into<String>) -> Self {
        Segment::Variadic(name.into())
    }

    pub fn is_slot(&self) -> bool {
        !matches!(self, Segment::Literal(_))
    }

    /// Type the slot's raw text is coerced to; `None` for literals.
    pub fn param_type(&self) -> Option<ParamType> {
        match self {
            Segment::Literal(_) => None,
            Segment::Param(_) => Some(ParamType::Float),
            Segment::Variadic(_) => Some(ParamType::FloatList),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Literal(text) => f.write_str(text),
            Segment::Param(name) => write!(f, "{{{name}}}"),
            Segment::Variadic(name) => write!(f, "{{{name}*}}"),
        }
    }
}

/// Raw text bound to a slot by a structural match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawBinding<'a> {
    pub name: &'a str,
    pub ty: ParamType,
    pub raw: &'a str,
}

/// A parsed, validated resource URI template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    raw: String,
    scheme: String,
    segments: Vec<Segment>,
}

impl UriTemplate {
    /// Parse a template string such as `resource://addition/{a}/{b}`.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidTemplate {
            template: raw.to_string(),
            reason: reason.to_string(),
        };

        let (scheme, path) = split_uri(raw).ok_or_else(|| invalid("missing \"://\""))?;

        let mut segments = Vec::with_capacity(path.len());
        for seg in path {
            segments.push(parse_segment(seg).map_err(|reason| invalid(reason.as_str()))?);
        }

        Self::from_segments(scheme, segments)
    }

    /// Build a template directly from typed segments.
    pub fn from_segments(
        scheme: impl Into<String>,
        segments: Vec<Segment>,
    ) -> Result<Self, ConfigError> {
        let scheme = scheme.into();
        let raw = render(&scheme, &segments);
        let invalid = |reason: String| ConfigError::InvalidTemplate {
            template: raw.clone(),
            reason,
        };

        if scheme.is_empty() {
            return Err(invalid("empty scheme".into()));
        }
        if segments.is_empty() {
            return Err(invalid("no path segments".into()));
        }

        let mut names = HashSet::new();
        let last = segments.len() - 1;
        for (i, seg) in segments.iter().enumerate() {
            match seg {
                Segment::Literal(text) => {
                    if text.is_empty() {
                        return Err(invalid(format!("empty segment at position {i}")));
                    }
                    if text.contains(['/', '{', '}']) {
                        return Err(invalid(format!("literal \"{text}\" contains reserved characters")));
                    }
                }
                Segment::Param(name) | Segment::Variadic(name) => {
                    if !valid_name(name) {
                        return Err(invalid(format!("invalid parameter name \"{name}\"")));
                    }
                    if !names.insert(name.as_str()) {
                        return Err(invalid(format!("duplicate parameter \"{name}\"")));
                    }
                    if matches!(seg, Segment::Variadic(_)) && i != last {
                        return Err(invalid(format!(
                            "variadic parameter \"{name}\" must be the final segment"
                        )));
                    }
                }
            }
        }

        Ok(UriTemplate {
            raw,
            scheme,
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of single-value and variadic slots.
    pub fn slot_count(&self) -> usize {
        self.segments.iter().filter(|s| s.is_slot()).count()
    }

    pub fn has_slots(&self) -> bool {
        self.segments.iter().any(Segment::is_slot)
    }

    /// True when some URI could structurally match both templates.
    pub fn overlaps(&self, other: &UriTemplate) -> bool {
        self.scheme == other.scheme
            && self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    _ => true,
                })
    }

    /// Structural match. Literals compare case-sensitively; each slot binds
    /// exactly one request segment. Returns the raw slot bindings in order.
    pub fn match_uri<'a>(&'a self, uri: &'a str) -> Option<Vec<RawBinding<'a>>> {
        let (scheme, path) = split_uri(uri)?;
        if scheme != self.scheme || path.len() != self.segments.len() {
            return None;
        }

        let mut bindings = Vec::new();
        for (seg, raw) in self.segments.iter().zip(path) {
            match seg {
                Segment::Literal(text) => {
                    if text != raw {
                        return None;
                    }
                }
                Segment::Param(name) => bindings.push(RawBinding {
                    name,
                    ty: ParamType::Float,
                    raw,
                }),
                Segment::Variadic(name) => bindings.push(RawBinding {
                    name,
                    ty: ParamType::FloatList,
                    raw,
                }),
            }
        }
        Some(bindings)
    }
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split `scheme://a/b/c` into the scheme and its path segments.
fn split_uri(uri: &str) -> Option<(&str, Vec<&str>)> {
    let (scheme, path) = uri.split_once("://")?;
    Some((scheme, path.split('/').collect()))
}

fn parse_segment(seg: &str) -> Result<Segment, String> {
    let Some(inner) = seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
        if seg.contains(['{', '}']) {
            return Err(format!("segment \"{seg}\" mixes literal text and a slot"));
        }
        return Ok(Segment::Literal(seg.to_string()));
    };

    if let Some(name) = inner.strip_suffix('*') {
        Ok(Segment::Variadic(name.to_string()))
    } else {
        Ok(Segment::Param(inner.to_string()))
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn render(scheme: &str, segments: &[Segment]) -> String {
    let path: Vec<String> = segments.iter().map(Segment::to_string).collect();
    format!("{scheme}://{}", path.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fixed_template() {
        let t = UriTemplate::parse("resource://addition/{a}/{b}").unwrap();
        assert_eq!(t.scheme(), "resource");
        assert_eq!(
            t.segments(),
            &[
                Segment::literal("addition"),
                Segment::param("a"),
                Segment::param("b")
            ]
        );
        assert_eq!(t.slot_count(), 2);
        assert_eq!(t.as_str(), "resource://addition/{a}/{b}");
    }

    #[test]
    fn test_parse_variadic_template() {
        let t = UriTemplate::parse("resource://addition/{numbers*}").unwrap();
        assert_eq!(t.segments()[1], Segment::variadic("numbers"));
        assert_eq!(t.segments()[1].param_type(), Some(ParamType::FloatList));
    }

    #[test]
    fn test_parse_static_template() {
        let t = UriTemplate::parse("resource://greet").unwrap();
        assert!(!t.has_slots());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in [
            "addition/{a}",
            "://addition",
            "resource://addition/{a}/{a}",
            "resource://addition/{numbers*}/{b}",
            "resource://addition/x{a}",
            "resource://addition/{}",
            "resource://addition//{a}",
            "resource://addition/{a-b}",
        ] {
            assert!(UriTemplate::parse(raw).is_err(), "accepted {raw}");
        }
    }

    #[test]
    fn test_from_segments_validates() {
        let err = UriTemplate::from_segments(
            "resource",
            vec![Segment::variadic("xs"), Segment::literal("tail")],
        )
        .unwrap_err();
        assert!(err.to_string().contains("final segment"));

        let t = UriTemplate::from_segments(
            "resource",
            vec![Segment::literal("multiplication"), Segment::variadic("xs")],
        )
        .unwrap();
        assert_eq!(t.as_str(), "resource://multiplication/{xs*}");
    }

    #[test]
    fn test_match_binds_raw_segments() {
        let t = UriTemplate::parse("resource://addition/{a}/{b}").unwrap();
        let b = t.match_uri("resource://addition/15/27").unwrap();
        assert_eq!(b.len(), 2);
        assert_eq!((b[0].name, b[0].raw), ("a", "15"));
        assert_eq!((b[1].name, b[1].raw), ("b", "27"));
    }

    #[test]
    fn test_variadic_binds_single_final_segment() {
        let t = UriTemplate::parse("resource://addition/{numbers*}").unwrap();
        let b = t.match_uri("resource://addition/15,27,10").unwrap();
        assert_eq!(b[0].raw, "15,27,10");
        assert_eq!(b[0].ty, ParamType::FloatList);
        assert!(t.match_uri("resource://addition/15/27").is_none());
    }

    #[test]
    fn test_match_is_case_sensitive_and_scheme_aware() {
        let t = UriTemplate::parse("resource://greet").unwrap();
        assert!(t.match_uri("resource://greet").is_some());
        assert!(t.match_uri("resource://Greet").is_none());
        assert!(t.match_uri("file://greet").is_none());
        assert!(t.match_uri("resource://greet/extra").is_none());
        assert!(t.match_uri("greet").is_none());
    }

    #[test]
    fn test_overlaps() {
        let fixed = UriTemplate::parse("resource://addition/{a}/{b}").unwrap();
        let list = UriTemplate::parse("resource://addition/{numbers*}").unwrap();
        let one = UriTemplate::parse("resource://addition/{x}").unwrap();
        let mult = UriTemplate::parse("resource://multiplication/{numbers*}").unwrap();
        assert!(!fixed.overlaps(&list));
        assert!(list.overlaps(&one));
        assert!(!list.overlaps(&mult));

        let left = UriTemplate::parse("resource://a/{x}").unwrap();
        let right = UriTemplate::parse("resource://{y}/b").unwrap();
        assert!(left.overlaps(&right));
    }
}

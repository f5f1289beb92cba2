//! Segment-based glob patterns for paths and hosts.
//!
//! A pattern is split on a separator (`/` for paths, `.` for hosts) and
//! matched segment by segment:
//! - `*` matches any run of characters inside one segment
//! - `?` matches exactly one character inside one segment
//! - `**` matches zero or more whole segments
//! - `{name}` captures one non-empty segment as a URI variable
//!
//! No regex is involved; `**` is the only construct that backtracks.

use crate::routing::UriVariables;

/// Error raised when a pattern cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid pattern `{pattern}`: {reason}")]
pub struct PatternError {
    pub pattern: String,
    pub reason: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Glob(Vec<char>),
    Capture(String),
    AnySegments,
}

impl Segment {
    fn parse(raw: &str, pattern: &str) -> Result<Self, PatternError> {
        if raw == "**" {
            return Ok(Segment::AnySegments);
        }
        if let Some(name) = raw.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
            if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
                return Err(PatternError {
                    pattern: pattern.to_string(),
                    reason: "variable names must be non-empty and alphanumeric",
                });
            }
            return Ok(Segment::Capture(name.to_string()));
        }
        if raw.contains('{') || raw.contains('}') {
            return Err(PatternError {
                pattern: pattern.to_string(),
                reason: "a variable must span a whole segment",
            });
        }
        if raw.contains("**") {
            return Err(PatternError {
                pattern: pattern.to_string(),
                reason: "`**` must span a whole segment",
            });
        }
        if raw.contains('*') || raw.contains('?') {
            Ok(Segment::Glob(raw.chars().collect()))
        } else {
            Ok(Segment::Literal(raw.to_string()))
        }
    }
}

/// A compiled segment pattern.
#[derive(Debug, Clone)]
pub struct SegmentPattern {
    raw: String,
    separator: char,
    case_insensitive: bool,
    segments: Vec<Segment>,
}

impl SegmentPattern {
    /// Compile a path pattern (`/twitter/**`, `/users/{id}`).
    pub fn path(pattern: &str) -> Result<Self, PatternError> {
        if !pattern.starts_with('/') {
            return Err(PatternError {
                pattern: pattern.to_string(),
                reason: "path patterns must start with `/`",
            });
        }
        Self::compile(pattern, '/', false)
    }

    /// Compile a host pattern (`*.spring.io`). Matching is case-insensitive.
    pub fn host(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError {
                pattern: pattern.to_string(),
                reason: "host patterns must not be empty",
            });
        }
        Self::compile(&pattern.to_ascii_lowercase(), '.', true)
    }

    fn compile(pattern: &str, separator: char, case_insensitive: bool) -> Result<Self, PatternError> {
        let segments = split(pattern, separator)
            .map(|raw| Segment::parse(raw, pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: pattern.to_string(),
            separator,
            case_insensitive,
            segments,
        })
    }

    /// The pattern source text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match `input`, pushing captured variables into `vars`.
    ///
    /// On a failed match `vars` is left as it was.
    pub fn matches(&self, input: &str, vars: &mut UriVariables) -> bool {
        let lowered;
        let input = if self.case_insensitive {
            lowered = input.to_ascii_lowercase();
            lowered.as_str()
        } else {
            input
        };

        let parts: Vec<&str> = split(input, self.separator).collect();
        let mark = vars.len();
        if match_segments(&self.segments, &parts, vars) {
            true
        } else {
            vars.truncate(mark);
            false
        }
    }
}

/// Split on `separator`, ignoring one leading and one trailing separator.
/// The root path `/` yields no segments.
fn split(input: &str, separator: char) -> impl Iterator<Item = &str> {
    let trimmed = input.strip_prefix(separator).unwrap_or(input);
    let trimmed = trimmed.strip_suffix(separator).unwrap_or(trimmed);
    trimmed
        .split(separator)
        .filter(move |_| !trimmed.is_empty())
}

fn match_segments(pattern: &[Segment], input: &[&str], vars: &mut UriVariables) -> bool {
    let Some((head, rest)) = pattern.split_first() else {
        return input.is_empty();
    };

    if let Segment::AnySegments = head {
        return (0..=input.len()).any(|skip| {
            let mark = vars.len();
            if match_segments(rest, &input[skip..], vars) {
                true
            } else {
                vars.truncate(mark);
                false
            }
        });
    }

    let Some((first, remaining)) = input.split_first() else {
        return false;
    };

    let mark = vars.len();
    let matched = match head {
        Segment::Literal(literal) => literal == first,
        Segment::Glob(glob) => glob_match(glob, first),
        Segment::Capture(name) => {
            if first.is_empty() {
                false
            } else {
                vars.insert(name.clone(), (*first).to_string());
                true
            }
        }
        Segment::AnySegments => unreachable!("handled above"),
    };

    if matched && match_segments(rest, remaining, vars) {
        true
    } else {
        vars.truncate(mark);
        false
    }
}

/// Wildcard match of a single segment: `*` any run, `?` one char.
fn glob_match(glob: &[char], text: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let (mut g, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if g < glob.len() && (glob[g] == '?' || glob[g] == text[t]) {
            g += 1;
            t += 1;
        } else if g < glob.len() && glob[g] == '*' {
            star = Some((g, t));
            g += 1;
        } else if let Some((star_g, star_t)) = star {
            g = star_g + 1;
            t = star_t + 1;
            star = Some((star_g, star_t + 1));
        } else {
            return false;
        }
    }

    glob[g..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_matches(pattern: &str, path: &str) -> bool {
        SegmentPattern::path(pattern)
            .unwrap()
            .matches(path, &mut UriVariables::default())
    }

    #[test]
    fn test_literal_paths() {
        assert!(path_matches("/customers", "/customers"));
        assert!(path_matches("/customers", "/customers/"));
        assert!(!path_matches("/customers", "/customers2"));
        assert!(!path_matches("/customers", "/Customers"));
        assert!(path_matches("/", "/"));
        assert!(!path_matches("/", "/a"));
    }

    #[test]
    fn test_double_star() {
        assert!(path_matches("/twitter/**", "/twitter/alice"));
        assert!(path_matches("/twitter/**", "/twitter/alice/status/1"));
        assert!(path_matches("/twitter/**", "/twitter"));
        assert!(!path_matches("/twitter/**", "/twitterx/alice"));
        assert!(path_matches("/**/feed", "/a/b/feed"));
        assert!(!path_matches("/**/feed", "/a/b/feed/x"));
    }

    #[test]
    fn test_single_segment_globs() {
        assert!(path_matches("/img/*.png", "/img/cat.png"));
        assert!(!path_matches("/img/*.png", "/img/cat.jpg"));
        assert!(!path_matches("/img/*", "/img/a/b"));
        assert!(path_matches("/v?/users", "/v2/users"));
    }

    #[test]
    fn test_captures() {
        let pattern = SegmentPattern::path("/users/{id}/posts/{post}").unwrap();
        let mut vars = UriVariables::default();
        assert!(pattern.matches("/users/42/posts/7", &mut vars));
        assert_eq!(vars.get("id"), Some("42"));
        assert_eq!(vars.get("post"), Some("7"));

        let mut vars = UriVariables::default();
        assert!(!pattern.matches("/users/42/comments/7", &mut vars));
        assert!(vars.is_empty(), "failed match must not leak captures");
    }

    #[test]
    fn test_host_patterns() {
        let pattern = SegmentPattern::host("*.spring.io").unwrap();
        let mut vars = UriVariables::default();
        assert!(pattern.matches("docs.spring.io", &mut vars));
        assert!(pattern.matches("DOCS.Spring.IO", &mut vars));
        assert!(!pattern.matches("spring.com", &mut vars));
        assert!(!pattern.matches("spring.io", &mut vars));
        assert!(!pattern.matches("a.b.spring.io", &mut vars));

        let deep = SegmentPattern::host("**.spring.io").unwrap();
        assert!(deep.matches("a.b.spring.io", &mut vars));
    }

    #[test]
    fn test_rejects_malformed_patterns() {
        assert!(SegmentPattern::path("customers").is_err());
        assert!(SegmentPattern::path("/a/{}").is_err());
        assert!(SegmentPattern::path("/a/x{id}").is_err());
        assert!(SegmentPattern::path("/a/**b").is_err());
        assert!(SegmentPattern::host("").is_err());
    }
}

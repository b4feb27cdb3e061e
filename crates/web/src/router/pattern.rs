//! Compiles route patterns.
//!
//! A pattern such as `/files/{name}-{id:int}.{ext}` is split at its first `{`:
//! the literal prefix (`/files/`) is compared as a plain string, the rest
//! becomes one anchored regex with a named group per placeholder, so adjacent
//! placeholders like `{a:int}{b:int}` are disambiguated in a single match.

use regex::Regex;

use crate::error::RouteError;
use crate::request::PathParams;
use crate::router::param::ParamType;

/// A pattern after compilation.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pattern: String,
    prefix: String,
    matcher: Option<Regex>,
    params: Vec<Placeholder>,
    score: u32,
}

#[derive(Debug, Clone)]
struct Placeholder {
    name: String,
    group: String,
    param_type: ParamType,
}

impl CompiledPattern {
    /// Compiles `pattern`, prepending `/` if it is missing.
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidPattern`] for unbalanced braces, empty or repeated
    /// names and custom types that aren't valid regexes.
    pub fn compile(pattern: &str) -> Result<Self, RouteError> {
        let pattern = normalize(pattern);

        let Some(params_begin) = pattern.find('{') else {
            if pattern.contains('}') {
                return Err(RouteError::invalid_pattern(&pattern, "unbalanced '}'"));
            }
            return Ok(Self { prefix: pattern.clone(), pattern, matcher: None, params: Vec::new(), score: 0 });
        };

        let prefix = pattern[..params_begin].to_string();
        let (expression, params) = compile_dynamic(&pattern, &pattern[params_begin..])?;
        let matcher = Regex::new(&expression).map_err(|e| RouteError::invalid_pattern(&pattern, e))?;
        let score = params.iter().map(|param| param.param_type.weight()).sum();

        Ok(Self { pattern, prefix, matcher: Some(matcher), params, score })
    }

    /// The normalized pattern text
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Everything before the first placeholder
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_exact(&self) -> bool {
        self.matcher.is_none()
    }

    /// Sum of the placeholder weights
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Matches a normalized path.
    ///
    /// Returns `Ok(None)` when the path doesn't match.
    ///
    /// # Errors
    ///
    /// [`RouteError::ParamConversion`] when a matched value can't be converted.
    pub fn matches(&self, path: &str) -> Result<Option<PathParams>, RouteError> {
        let Some(matcher) = &self.matcher else {
            return Ok((path == self.prefix).then(PathParams::empty));
        };

        let Some(suffix) = path.strip_prefix(self.prefix.as_str()) else {
            return Ok(None);
        };

        let Some(captures) = matcher.captures(suffix) else {
            return Ok(None);
        };

        let mut params = PathParams::with_capacity(self.params.len());
        for placeholder in &self.params {
            let value = captures.name(&placeholder.group).map_or("", |m| m.as_str());
            params.push(placeholder.name.clone(), placeholder.param_type.convert(&placeholder.name, value)?);
        }
        Ok(Some(params))
    }
}

/// Prepends `/` if absent.
pub fn normalize(path: &str) -> String {
    if path.starts_with('/') { path.to_string() } else { format!("/{path}") }
}

/// Turns the part of a pattern from its first `{` on into an anchored regex.
fn compile_dynamic(pattern: &str, dynamic: &str) -> Result<(String, Vec<Placeholder>), RouteError> {
    let mut expression = String::from("^");
    let mut params: Vec<Placeholder> = Vec::new();

    let mut literal_start = 0;
    let mut chars = dynamic.char_indices();
    while let Some((index, ch)) = chars.next() {
        match ch {
            '{' => {
                expression.push_str(&regex::escape(&dynamic[literal_start..index]));

                // placeholder bodies may hold braces of their own, e.g. `{code:\d{3}}`
                let mut depth = 1;
                let mut end = None;
                for (inner_index, inner) in chars.by_ref() {
                    match inner {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                end = Some(inner_index);
                                break;
                            }
                        }
                        _ => {}
                    }
                }

                let end = end.ok_or_else(|| RouteError::invalid_pattern(pattern, "unclosed '{'"))?;
                let placeholder = parse_placeholder(pattern, &dynamic[index + 1..end], params.len())?;
                if params.iter().any(|param| param.name == placeholder.name) {
                    return Err(RouteError::invalid_pattern(pattern, format!("parameter {} defined twice", placeholder.name)));
                }

                expression.push_str(&format!("(?P<{}>{})", placeholder.group, placeholder.param_type.fragment()));
                params.push(placeholder);
                literal_start = end + 1;
            }
            '}' => return Err(RouteError::invalid_pattern(pattern, "unbalanced '}'")),
            _ => {}
        }
    }

    expression.push_str(&regex::escape(&dynamic[literal_start..]));
    expression.push('$');
    Ok((expression, params))
}

/// Parses `name` or `name:type`, whitespace around both is ignored.
fn parse_placeholder(pattern: &str, body: &str, position: usize) -> Result<Placeholder, RouteError> {
    let (name, type_name) = match body.split_once(':') {
        Some((name, type_name)) => (name.trim(), Some(type_name.trim())),
        None => (body.trim(), None),
    };

    if name.is_empty() {
        return Err(RouteError::invalid_pattern(pattern, "placeholder without a name"));
    }
    if type_name.is_some_and(str::is_empty) {
        return Err(RouteError::invalid_pattern(pattern, format!("parameter {name} has an empty type")));
    }

    Ok(Placeholder { name: name.to_string(), group: format!("p{position}"), param_type: ParamType::parse(type_name) })
}

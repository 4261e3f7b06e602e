//! `{column}` templates.
//!
//! Templates interpolate row cells by column name. `{{` and `}}` produce
//! literal braces, and an opening brace without a closing one is copied
//! through unchanged.

use thiserror::Error;

/// Errors raised while rendering a template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// A placeholder named a column the row does not have.
    #[error("template references unknown column '{column}'")]
    MissingColumn {
        /// Placeholder name.
        column: String,
    },
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

fn segments(template: &str) -> Vec<Segment<'_>> {
    let mut parts = Vec::new();
    let mut rest = template;
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix("{{") {
            parts.push(Segment::Text("{"));
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("}}") {
            parts.push(Segment::Text("}"));
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix('{') {
            match tail.split_once('}') {
                Some((name, after)) if !name.contains('{') => {
                    parts.push(Segment::Placeholder(name));
                    rest = after;
                }
                _ => {
                    parts.push(Segment::Text("{"));
                    rest = tail;
                }
            }
        } else if let Some(tail) = rest.strip_prefix('}') {
            parts.push(Segment::Text("}"));
            rest = tail;
        } else {
            let end = rest.find(['{', '}']).unwrap_or(rest.len());
            let (text, tail) = rest.split_at(end);
            parts.push(Segment::Text(text));
            rest = tail;
        }
    }
    parts
}

/// Placeholder names in order of appearance, repeated names included.
///
/// # Examples
///
/// ```
/// use wbk_core::template::placeholders;
///
/// assert_eq!(placeholders("School in {district} ({code})"), vec!["district", "code"]);
/// assert!(placeholders("{{literal}}").is_empty());
/// ```
#[must_use]
pub fn placeholders(template: &str) -> Vec<&str> {
    segments(template)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name),
            Segment::Text(_) => None,
        })
        .collect()
}

/// Whether the template interpolates any column.
#[must_use]
pub fn has_placeholders(template: &str) -> bool {
    segments(template)
        .iter()
        .any(|segment| matches!(segment, Segment::Placeholder(_)))
}

/// Render a template, looking each placeholder up with `lookup`.
pub fn render<'a, F>(template: &str, lookup: F) -> Result<String, TemplateError>
where
    F: Fn(&str) -> Option<&'a str>,
{
    let mut rendered = String::with_capacity(template.len());
    for segment in segments(template) {
        match segment {
            Segment::Text(text) => rendered.push_str(text),
            Segment::Placeholder(name) => {
                let Some(value) = lookup(name) else {
                    return Err(TemplateError::MissingColumn {
                        column: name.to_owned(),
                    });
                };
                rendered.push_str(value);
            }
        }
    }
    Ok(rendered)
}

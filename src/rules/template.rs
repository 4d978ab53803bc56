//! Output templates with `{field}` placeholders.
//!
//! Supports the subset of format specs used by rename rules:
//! `[[fill]align][0][width]` where `align` is one of `<`, `>` or `^`,
//! for example `{episode:0>2}` or `{title:<20}`.
//! Literal braces are written as `{{` and `}}`.

use std::fmt;

use anyhow::{Context, Result, anyhow, bail};

use crate::rules::field::{Field, MatchResult};

/// A parsed output template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder { field: Field, spec: FormatSpec },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FormatSpec {
    fill: char,
    align: Align,
    width: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
}

impl Template {
    /// Parse a template string.
    ///
    /// # Errors
    /// Returns an error for unbalanced braces, unknown field names or unsupported format specs.
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => bail!("Single '}}' in output format: '{source}'"),
                '{' => {
                    let mut inner = String::new();
                    let mut closed = false;
                    for next in chars.by_ref() {
                        if next == '}' {
                            closed = true;
                            break;
                        }
                        inner.push(next);
                    }
                    if !closed {
                        bail!("Unclosed '{{' in output format: '{source}'");
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Self::parse_placeholder(&inner).with_context(|| format!("Invalid output format: '{source}'"))?);
                }
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The original template string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Fields referenced by the template, in order of appearance.
    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder { field, .. } => Some(*field),
            Segment::Literal(_) => None,
        })
    }

    /// Render the template with the given field values.
    ///
    /// # Errors
    /// Returns `format error: missing '<field>'` if a referenced field has no value.
    pub fn render(&self, values: &MatchResult) -> Result<String> {
        let mut output = String::with_capacity(self.source.len() * 2);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Placeholder { field, spec } => {
                    let value = values
                        .value(*field)
                        .ok_or_else(|| anyhow!("format error: missing '{field}'"))?;
                    spec.write_padded(&mut output, value);
                }
            }
        }
        Ok(output)
    }

    fn parse_placeholder(inner: &str) -> Result<Segment> {
        let (name, spec) = inner.split_once(':').unwrap_or((inner, ""));
        let field = name
            .trim()
            .parse::<Field>()
            .with_context(|| format!("Unknown placeholder '{{{inner}}}'"))?;
        let spec = FormatSpec::parse(spec)?;
        Ok(Segment::Placeholder { field, spec })
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl FormatSpec {
    const NONE: Self = Self {
        fill: ' ',
        align: Align::Left,
        width: 0,
    };

    fn parse(spec: &str) -> Result<Self> {
        if spec.is_empty() {
            return Ok(Self::NONE);
        }
        let chars: Vec<char> = spec.chars().collect();
        let mut result = Self::NONE;
        let mut rest = 0;

        if chars.len() >= 2
            && let Some(align) = Align::from_char(chars[1])
        {
            result.fill = chars[0];
            result.align = align;
            rest = 2;
        } else if let Some(align) = Align::from_char(chars[0]) {
            result.align = align;
            rest = 1;
        } else if chars[0] == '0' {
            // Zero flag without explicit alignment pads numbers on the left
            result.fill = '0';
            result.align = Align::Right;
            rest = 1;
        }

        let width: String = chars[rest..].iter().collect();
        if !width.is_empty() {
            result.width = width
                .parse()
                .map_err(|_| anyhow!("Unsupported format spec: '{spec}'"))?;
        }
        Ok(result)
    }

    fn write_padded(&self, output: &mut String, value: &str) {
        let padding = self.width.saturating_sub(value.chars().count());
        let (left, right) = match self.align {
            Align::Left => (0, padding),
            Align::Right => (padding, 0),
            Align::Center => (padding / 2, padding - padding / 2),
        };
        output.extend(std::iter::repeat_n(self.fill, left));
        output.push_str(value);
        output.extend(std::iter::repeat_n(self.fill, right));
    }
}

impl Align {
    const fn from_char(c: char) -> Option<Self> {
        match c {
            '<' => Some(Self::Left),
            '>' => Some(Self::Right),
            '^' => Some(Self::Center),
            _ => None,
        }
    }
}

#[cfg(test)]
mod template_tests {
    use super::*;

    fn values(pairs: &[(Field, &str)]) -> MatchResult {
        pairs.iter().map(|(field, value)| (*field, (*value).to_string())).collect()
    }

    #[test]
    fn renders_plain_placeholders() {
        let template = Template::parse("{series} - {title}").unwrap();
        let output = template
            .render(&values(&[(Field::Series, "Show"), (Field::Title, "Pilot")]))
            .unwrap();
        assert_eq!(output, "Show - Pilot");
    }

    #[test]
    fn zero_pads_episode() {
        let template = Template::parse("S01E{episode:0>2}").unwrap();
        assert_eq!(template.render(&values(&[(Field::Episode, "5")])).unwrap(), "S01E05");
        assert_eq!(template.render(&values(&[(Field::Episode, "123")])).unwrap(), "S01E123");
        assert_eq!(template.render(&values(&[(Field::Episode, "OVA")])).unwrap(), "S01EOVA");
    }

    #[test]
    fn zero_flag_without_alignment_pads_left() {
        let template = Template::parse("{season:02}").unwrap();
        assert_eq!(template.render(&values(&[(Field::Season, "3")])).unwrap(), "03");
    }

    #[test]
    fn supports_left_and_center_alignment() {
        let left = Template::parse("[{title:<6}]").unwrap();
        assert_eq!(left.render(&values(&[(Field::Title, "ab")])).unwrap(), "[ab    ]");
        let center = Template::parse("[{title:*^5}]").unwrap();
        assert_eq!(center.render(&values(&[(Field::Title, "ab")])).unwrap(), "[*ab**]");
    }

    #[test]
    fn escaped_braces_are_literal() {
        let template = Template::parse("{{{series}}}").unwrap();
        assert_eq!(template.render(&values(&[(Field::Series, "x")])).unwrap(), "{x}");
    }

    #[test]
    fn missing_field_is_a_format_error() {
        let template = Template::parse("{series} S01E{episode:0>2} - {title}").unwrap();
        let error = template
            .render(&values(&[(Field::Series, "Show"), (Field::Episode, "1")]))
            .unwrap_err();
        assert_eq!(error.to_string(), "format error: missing 'title'");
    }

    #[test]
    fn empty_value_is_not_missing() {
        let template = Template::parse("{series} - {title}").unwrap();
        let output = template
            .render(&values(&[(Field::Series, "Show"), (Field::Title, "")]))
            .unwrap();
        assert_eq!(output, "Show - ");
    }

    #[test]
    fn rejects_malformed_templates() {
        assert!(Template::parse("{series").is_err());
        assert!(Template::parse("series}").is_err());
        assert!(Template::parse("{unknown}").is_err());
        assert!(Template::parse("{episode:0>x}").is_err());
    }

    #[test]
    fn lists_referenced_fields() {
        let template = Template::parse("{series} S{season:0>2}E{episode:0>2}").unwrap();
        assert_eq!(
            template.fields().collect::<Vec<_>>(),
            vec![Field::Series, Field::Season, Field::Episode]
        );
    }
}

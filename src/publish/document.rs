//! Front-matter document writer.
//!
//! Every string scalar is emitted double-quoted with backslash, quote and
//! control characters escaped, so titles like `He said "hi"\n` survive a
//! YAML round-trip unchanged.

use std::fmt::Write as _;

use super::{Article, PublishError};
use crate::article::GeoRef;

/// Double-quoted YAML scalar.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn validate(a: &Article) -> Result<(), PublishError> {
    for (field, value) in [("id", &a.id), ("title", &a.title), ("date", &a.date)] {
        if value.trim().is_empty() {
            return Err(PublishError::Invalid(format!("{field} is empty")));
        }
    }
    if let Some(g) = &a.geo {
        if !g.lat.is_finite() || !g.lon.is_finite() {
            return Err(PublishError::Invalid(format!(
                "non-finite coordinates for {}",
                g.name
            )));
        }
    }
    Ok(())
}

/// Render the article as front matter followed by the Markdown body.
pub fn render(a: &Article) -> Result<String, PublishError> {
    validate(a)?;

    let global = GeoRef {
        name: "Global".into(),
        lat: 0.0,
        lon: 0.0,
        country_code: "XX".into(),
    };
    let geo = a.geo.as_ref().unwrap_or(&global);
    let tags = a
        .tags
        .iter()
        .map(|t| quote(t))
        .collect::<Vec<_>>()
        .join(", ");

    let mut doc = String::new();
    let _ = writeln!(doc, "---");
    let _ = writeln!(doc, "id: {}", quote(&a.id));
    let _ = writeln!(doc, "title: {}", quote(&a.title));
    let _ = writeln!(doc, "category: {}", quote(a.category.as_str()));
    let _ = writeln!(doc, "date: {}", quote(&a.date));
    let _ = writeln!(doc, "excerpt: {}", quote(&a.excerpt));
    let _ = writeln!(doc, "source:");
    let _ = writeln!(doc, "  name: {}", quote(&a.source.name));
    let _ = writeln!(doc, "  url: {}", quote(&a.source.url));
    let _ = writeln!(doc, "image:");
    let _ = writeln!(doc, "  url: {}", quote(&a.image.url));
    let _ = writeln!(doc, "  alt: {}", quote(&a.image.alt));
    let _ = writeln!(doc, "tags: [{tags}]");
    let _ = writeln!(doc, "geo:");
    let _ = writeln!(doc, "  name: {}", quote(&geo.name));
    let _ = writeln!(doc, "  lat: {}", geo.lat);
    let _ = writeln!(doc, "  lon: {}", geo.lon);
    let _ = writeln!(doc, "  countryCode: {}", quote(&geo.country_code));
    let _ = writeln!(doc, "featured: {}", a.featured);
    let _ = writeln!(doc, "approved: true");
    let _ = writeln!(doc, "---");
    let _ = writeln!(doc);
    let _ = writeln!(doc, "{}", a.content.trim());
    Ok(doc)
}

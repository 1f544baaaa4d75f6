//! Normalized text rendering of attribute records for embedding.
//!
//! Known fields come first in a fixed order with human labels and units; any
//! remaining attributes follow in name order. Provenance fields are not part
//! of the rendering.

use crate::types::{AttrValue, Attributes, PROVENANCE_FIELDS};

#[derive(Debug, Clone)]
pub struct FieldLabel {
    pub attribute: String,
    pub label: String,
    pub unit: Option<String>,
}

impl FieldLabel {
    pub fn new(attribute: &str, label: &str, unit: Option<&str>) -> Self {
        Self { attribute: attribute.to_string(), label: label.to_string(), unit: unit.map(str::to_string) }
    }
}

#[derive(Debug, Clone)]
pub struct RenderSpec {
    pub fields: Vec<FieldLabel>,
    pub include_unlisted: bool,
}

impl Default for RenderSpec {
    fn default() -> Self {
        Self {
            fields: vec![
                FieldLabel::new("client_name", "Company", None),
                FieldLabel::new("source_type", "Energy source", None),
                FieldLabel::new("power_installed", "Installed power", Some("MW")),
                FieldLabel::new("connection_point", "Connection point", None),
                FieldLabel::new("address", "Address", None),
                FieldLabel::new("contact_person", "Contact", None),
                FieldLabel::new("contact_phone", "Phone", None),
                FieldLabel::new("contact_email", "Email", None),
            ],
            include_unlisted: true,
        }
    }
}

pub fn render_record_text(attributes: &Attributes, spec: &RenderSpec) -> String {
    let mut parts = Vec::new();
    for field in &spec.fields {
        if let Some(value) = attributes.get(&field.attribute).filter(|v| v.is_truthy()) {
            parts.push(render_part(&field.label, value, field.unit.as_deref()));
        }
    }
    if spec.include_unlisted {
        for (name, value) in attributes {
            let listed = spec.fields.iter().any(|f| &f.attribute == name);
            if listed || PROVENANCE_FIELDS.contains(&name.as_str()) || !value.is_truthy() { continue; }
            parts.push(render_part(name, value, None));
        }
    }
    if parts.is_empty() { return String::new(); }
    format!("{}.", parts.join(". "))
}

fn render_part(label: &str, value: &AttrValue, unit: Option<&str>) -> String {
    match unit {
        Some(unit) => format!("{label}: {value} {unit}"),
        None => format!("{label}: {value}"),
    }
}

/// Parse a power figure such as `"1,5 MW"`, `"500 kW"` or `"2GW"` into megawatts.
/// A bare number is taken as MW.
pub fn parse_power_mw(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().to_uppercase().replace(',', ".").replace(' ', "");
    let mut numeric = String::new();
    let mut unit = 'M';
    for ch in cleaned.chars() {
        if ch.is_ascii_digit() || ch == '.' {
            numeric.push(ch);
        } else if matches!(ch, 'K' | 'M' | 'G') {
            unit = ch;
            break;
        }
    }
    let value: f64 = numeric.parse().ok()?;
    Some(match unit {
        'K' => value / 1000.0,
        'G' => value * 1000.0,
        _ => value,
    })
}

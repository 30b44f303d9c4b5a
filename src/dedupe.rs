//! Duplicate detection for event sub-lists (volunteers, special guests,
//! media, promotional materials).
//!
//! Records are plain JSON objects. Keys are built from normalized fields so
//! that formatting differences (case, spacing, phone punctuation) do not
//! hide duplicates.

use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Number of trailing digits kept from a phone number.
const PHONE_DIGITS: usize = 10;

/// Trims, lowercases and collapses whitespace runs to a single space.
pub fn normalize_text(text: Option<&str>) -> String {
    let Some(text) = text else {
        return String::new();
    };
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Keeps only digits, truncated to the last ten when longer (drops country
/// codes).
pub fn normalize_phone(phone: Option<&str>) -> String {
    let digits: Vec<char> = phone
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    let skip = digits.len().saturating_sub(PHONE_DIGITS);
    digits[skip..].iter().collect()
}

/// Joins the normalized values of `fields`. Strings are normalized, numbers
/// stringified, anything else (and empty results) skipped.
pub fn build_key(record: &Value, fields: &[&str]) -> String {
    fields
        .iter()
        .filter_map(|field| match record.get(field) {
            Some(Value::String(s)) => Some(normalize_text(Some(s.as_str()))),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join("|")
}

/// True when `record` has a non-empty key that matches any record in
/// `existing`.
pub fn is_duplicate<T, F>(record: &T, existing: &[T], key: F) -> bool
where
    F: Fn(&T) -> String,
{
    let record_key = key(record);
    if record_key.is_empty() {
        return false;
    }
    existing.iter().any(|other| key(other) == record_key)
}

/// Keeps the first record for each key. Records whose key is empty are
/// dropped.
pub fn remove_duplicates<T, F>(list: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> String,
{
    let mut seen = HashSet::new();
    list.into_iter()
        .filter(|item| {
            let k = key(item);
            !k.is_empty() && seen.insert(k)
        })
        .collect()
}

/// First field holding a non-empty string.
fn first_text<'a>(record: &'a Value, fields: &[&str]) -> Option<&'a str> {
    fields
        .iter()
        .filter_map(|field| record.get(field).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

/// First field holding a usable identifier: a non-empty string or a
/// non-zero number.
fn first_id(record: &Value, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| match record.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    })
}

fn join_present(parts: &[String]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("|")
}

/// Phone when present, otherwise name plus whatever phone text was given.
pub fn special_guest_key(guest: &Value) -> String {
    let raw_phone = first_text(guest, &["phone", "personalNumber"]);
    let phone = normalize_phone(raw_phone);
    if !phone.is_empty() {
        return phone;
    }

    let name = match first_text(guest, &["name"]) {
        Some(name) => normalize_text(Some(name)),
        None => {
            let first = first_text(guest, &["firstName"]).unwrap_or_default();
            let last = first_text(guest, &["lastName"]).unwrap_or_default();
            normalize_text(Some(format!("{} {}", first, last).as_str()))
        }
    };
    join_present(&[name, normalize_text(raw_phone)])
}

/// `id:<id>` when present, otherwise name, phone and branch.
pub fn volunteer_key(volunteer: &Value) -> String {
    if let Some(id) = first_id(volunteer, &["id"]) {
        return format!("id:{}", id);
    }
    join_present(&[
        normalize_text(first_text(volunteer, &["name", "volunteer_name"])),
        normalize_phone(first_text(volunteer, &["contact", "phone"])),
        normalize_text(first_text(volunteer, &["branch", "branch_name"])),
    ])
}

/// `id:<id>`, then `s3:<key>`, otherwise filename, url and company.
pub fn event_media_key(media: &Value) -> String {
    if let Some(id) = first_id(media, &["id", "media_id"]) {
        return format!("id:{}", id);
    }
    if let Some(s3_key) = first_text(media, &["s3_key"]) {
        return format!("s3:{}", normalize_text(Some(s3_key)));
    }
    join_present(&[
        normalize_text(first_text(media, &["filename", "fileName"])),
        normalize_text(first_text(media, &["url", "website"])),
        normalize_text(first_text(media, &["companyName", "organization"])),
    ])
}

/// `id:<id>` when present, otherwise name and type.
pub fn promotional_material_key(material: &Value) -> String {
    if let Some(id) = first_id(material, &["id"]) {
        return format!("id:{}", id);
    }
    join_present(&[
        normalize_text(first_text(material, &["name", "materialType"])),
        normalize_text(first_text(material, &["type", "materialType"])),
    ])
}

/// Record kinds with a dedicated key builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    SpecialGuest,
    Volunteer,
    EventMedia,
    PromotionalMaterial,
}

impl RecordKind {
    pub fn key(&self, record: &Value) -> String {
        match self {
            RecordKind::SpecialGuest => special_guest_key(record),
            RecordKind::Volunteer => volunteer_key(record),
            RecordKind::EventMedia => event_media_key(record),
            RecordKind::PromotionalMaterial => promotional_material_key(record),
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::SpecialGuest => write!(f, "special-guests"),
            RecordKind::Volunteer => write!(f, "volunteers"),
            RecordKind::EventMedia => write!(f, "media"),
            RecordKind::PromotionalMaterial => write!(f, "promotional-materials"),
        }
    }
}

impl FromStr for RecordKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "special-guests" | "guests" => Ok(RecordKind::SpecialGuest),
            "volunteers" => Ok(RecordKind::Volunteer),
            "media" => Ok(RecordKind::EventMedia),
            "promotional-materials" | "materials" => Ok(RecordKind::PromotionalMaterial),
            _ => anyhow::bail!(
                "Unknown record kind: {}. Expected special-guests, volunteers, media, or promotional-materials.",
                s
            ),
        }
    }
}

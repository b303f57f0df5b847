//! Identifier naming.
//!
//! Every identifier in generated code is derived from the same token split:
//! runs of ASCII letters and digits, further broken at lower-to-upper case
//! boundaries. Exported names capitalize and concatenate the tokens; field
//! and method names join them in snake_case.

use oasgen_spec::HttpMethod;

/// Rust keywords that cannot be used as bare identifiers.
const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in",
    "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "self", "Self", "static", "struct", "super", "trait", "true", "try", "type", "typeof",
    "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Keywords that are not accepted as raw identifiers.
const NON_RAW: &[&str] = &["crate", "self", "Self", "super"];

/// Split `raw` into name tokens.
///
/// Any character other than an ASCII letter or digit separates tokens, so
/// `pet-status`, `pet.status`, `pet status` and `pet_status` all yield
/// `["pet", "status"]`. `birthDate` yields `["birth", "Date"]`.
pub fn tokens(raw: &str) -> Vec<&str> {
    let mut out = Vec::new();

    for word in raw.split(|c: char| !c.is_ascii_alphanumeric()) {
        let bytes = word.as_bytes();
        let mut start = 0;
        for i in 1..bytes.len() {
            if bytes[i - 1].is_ascii_lowercase() && bytes[i].is_ascii_uppercase() {
                out.push(&word[start..i]);
                start = i;
            }
        }
        if start < word.len() {
            out.push(&word[start..]);
        }
    }

    out
}

fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Convert an arbitrary name to an exported identifier.
///
/// Total and deterministic. The result contains only ASCII letters and
/// digits and is empty when `raw` has no letters or digits. Distinct inputs
/// may collide.
pub fn to_exported_name(raw: &str) -> String {
    tokens(raw).into_iter().map(capitalize).collect()
}

/// Convert an arbitrary name to a snake_case field or method identifier.
///
/// Keywords are escaped as raw identifiers (`r#type`); `self`, `Self`,
/// `super` and `crate` get a trailing underscore instead. A leading digit
/// is prefixed with `_`. Returns an empty string when `raw` has no
/// letters or digits.
pub fn to_field_name(raw: &str) -> String {
    let name = tokens(raw)
        .into_iter()
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("_");

    if NON_RAW.contains(&name.as_str()) {
        format!("{name}_")
    } else if KEYWORDS.contains(&name.as_str()) {
        format!("r#{name}")
    } else if name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{name}")
    } else {
        name
    }
}

/// An exported type name, falling back to `default` when `raw` yields
/// nothing. Names starting with a digit are prefixed with `T`.
pub fn type_name(raw: &str, default: &str) -> String {
    let name = to_exported_name(raw);
    if name.is_empty() {
        default.to_string()
    } else if name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("T{name}")
    } else {
        name
    }
}

/// An enum variant name for a string literal.
///
/// The empty literal becomes `Empty`; a leading digit is prefixed with `V`.
pub fn variant_name(literal: &str) -> String {
    let name = to_exported_name(literal);
    if name.is_empty() {
        "Empty".to_string()
    } else if name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("V{name}")
    } else {
        name
    }
}

/// The constant declared for one literal of an enum type.
///
/// `pet-status` + `available` gives `PetStatusAvailable`.
pub fn constant_name(type_name: &str, literal: &str) -> String {
    let suffix = to_exported_name(literal);
    if suffix.is_empty() {
        format!("{type_name}Empty")
    } else {
        format!("{type_name}{suffix}")
    }
}

/// The exported name of an operation.
///
/// Uses the `operationId` when present, otherwise the verb followed by the
/// literal path segments: `GET /pets/{petId}` gives `GetPets`.
pub fn operation_name(method: HttpMethod, path: &str, operation_id: Option<&str>) -> String {
    if let Some(name) = operation_id.map(to_exported_name).filter(|n| !n.is_empty()) {
        return type_name(&name, "Operation");
    }

    let mut name = capitalize(method.key());
    for segment in path.split('/') {
        if segment.starts_with('{') && segment.ends_with('}') {
            continue;
        }
        name.push_str(&to_exported_name(segment));
    }
    name
}

//! Turns display names into Terraform-safe identifiers

/// Sanitize a display name so it can be used as a Terraform resource name.
///
/// Every character outside `[A-Za-z0-9_-]` becomes an underscore, and names
/// that would start with a digit or dash are prefixed with an underscore.
/// Distinct names may collide after sanitizing ("a b" and "a_b").
pub fn sanitize_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    match sanitized.chars().next() {
        None => "_".to_string(),
        Some(first) if first.is_ascii_digit() || first == '-' => {
            sanitized.insert(0, '_');
            sanitized
        }
        Some(_) => sanitized,
    }
}

/// Build the prefixed resource name used for an exported entity
pub fn resource_name(prefix: &str, name: &str) -> String {
    format!("{}_{}", prefix, sanitize_name(name))
}

use serde_json::Value;

/// Quote a string as an HCL string literal
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');

    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c.is_control() => quoted.push_str(&format!("\\u{:04X}", c as u32)),
            c => quoted.push(c),
        }
    }

    quoted.push('"');
    quoted
}

/// Render a JSON value as an HCL expression
pub fn to_hcl_expression(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(to_hcl_expression).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(map) => {
            if map.is_empty() {
                return "{}".to_string();
            }

            let entries: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{} = {}", quote(k), to_hcl_expression(v)))
                .collect();
            format!("{{ {} }}", entries.join(", "))
        }
    }
}

/// Render a list of reference expressions as bare resource addresses,
/// as required by `depends_on`
pub fn to_address_list(value: &Value) -> String {
    let addresses: Vec<String> = value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(dependency_address)
                .filter(|address| !address.is_empty())
                .collect()
        })
        .unwrap_or_default();

    format!("[{}]", addresses.join(", "))
}

/// Reference to the id of a managed resource
pub fn resource_reference(terraform_type: &str, name: &str) -> String {
    format!("${{{}.{}.id}}", terraform_type, name)
}

/// Reference to the first id returned by a data source lookup
pub fn data_reference(data_type: &str, name: &str, collection: &str) -> String {
    format!("${{data.{}.{}.{}[0].id}}", data_type, name, collection)
}

/// Reference to a terraform variable
pub fn variable_reference(name: &str) -> String {
    format!("${{var.{}}}", name)
}

/// Strip the interpolation and trailing attribute from a reference,
/// leaving the address of the block it points at.
///
/// `${octopusdeploy_tag_set.tagset_a.id}` becomes `octopusdeploy_tag_set.tagset_a`.
pub fn dependency_address(reference: &str) -> String {
    let inner = reference
        .strip_prefix("${")
        .and_then(|r| r.strip_suffix('}'))
        .unwrap_or(reference);

    let inner = inner.strip_suffix(".id").unwrap_or(inner);

    // Data lookups are addressed without their collection index
    match inner.find('[') {
        Some(position) if inner.starts_with("data.") => inner[..position]
            .rsplit_once('.')
            .map(|(address, _)| address.to_string())
            .unwrap_or_else(|| inner[..position].to_string()),
        _ => inner.to_string(),
    }
}

/// Escape template sequences in a literal value so terraform does not
/// interpret them
pub fn escape_template_sequences(value: &str) -> String {
    value.replace("${", "$${").replace("%{", "%%{")
}

use flowcore::{Document, Value, DEFAULT_TARGET_HANDLE};

/// Items a list-processing node works on.
///
/// With exactly one input port its value is used, and a value that is not a
/// list becomes a one-element list. With several ports only an `input` port
/// holding a list contributes items.
pub(crate) fn input_items(inputs: &Document) -> Vec<Value> {
    if inputs.len() == 1 {
        return match inputs.values().next() {
            Some(Value::Array(items)) => items.clone(),
            Some(value) => vec![value.clone()],
            None => Vec::new(),
        };
    }

    match inputs.get(DEFAULT_TARGET_HANDLE) {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

/// Path inside a string that is exactly one `{{ path }}` placeholder
pub(crate) fn exact_placeholder(text: &str) -> Option<&str> {
    let inner = text.trim().strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") || inner.contains("}}") {
        return None;
    }
    Some(inner.trim())
}

/// Replace every `{{ key }}` placeholder in `text`.
///
/// `resolve` receives the trimmed key; placeholders it cannot resolve are
/// left as written.
pub(crate) fn interpolate<F>(text: &str, mut resolve: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        out.push_str(&rest[..start]);

        let token = &after[..end];
        match resolve(token.trim()) {
            Some(value) => out.push_str(&value),
            None => {
                out.push_str("{{");
                out.push_str(token);
                out.push_str("}}");
            }
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

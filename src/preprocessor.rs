use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

use crate::request::ImageRequest;

/// Replace every `$name` in `input` with its value. A `$` not followed by
/// an identifier is kept literally.
pub fn expand_variables(input: &str, variables: &HashMap<String, String>) -> Result<String> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '$' => {
                let var_name = consume_identifier(&mut chars);
                if var_name.is_empty() {
                    output.push('$');
                } else if let Some(val) = variables.get(&var_name) {
                    output.push_str(val);
                } else {
                    return Err(anyhow!("Variable '${}' not defined", var_name));
                }
            }
            _ => output.push(c),
        }
    }

    Ok(output)
}

fn consume_identifier(chars: &mut Peekable<Chars>) -> String {
    let mut name = String::new();
    // Identifiers start with a letter or _
    match chars.peek() {
        Some(&c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return name,
    }

    while let Some(&c) = chars.peek() {
        if c.is_ascii_alphanumeric() || c == '_' {
            name.push(c);
            chars.next();
        } else {
            break;
        }
    }
    name
}

/// Expand variables in every string value of a JSON document. Keys and
/// non-string values are left alone.
pub fn expand_json(value: &Value, variables: &HashMap<String, String>) -> Result<Value> {
    Ok(match value {
        Value::String(s) => Value::String(expand_variables(s, variables)?),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| expand_json(item, variables))
                .collect::<Result<_>>()?,
        ),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                let expanded = expand_json(item, variables)
                    .with_context(|| format!("in field '{}'", key))?;
                out.insert(key.clone(), expanded);
            }
            Value::Object(out)
        }
        other => other.clone(),
    })
}

/// Instantiate a layout template into a validated request.
pub fn render_layout(layout: &Value, variables: &HashMap<String, String>) -> Result<ImageRequest> {
    let expanded = expand_json(layout, variables)?;
    let request: ImageRequest =
        serde_json::from_value(expanded).context("Expanded layout is not a valid image request")?;
    request.validate()?;
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_expansion() {
        let vars = vars(&[("session_id", "S100"), ("track", "Keynote")]);
        let output = expand_variables("$session_id - $track", &vars).unwrap();
        assert_eq!(output, "S100 - Keynote");
    }

    #[test]
    fn test_identifier_stops_at_punctuation() {
        let vars = vars(&[("speaker", "jane-doe")]);
        assert_eq!(expand_variables("$speaker.jpg", &vars).unwrap(), "jane-doe.jpg");
    }

    #[test]
    fn test_lone_dollar() {
        let vars = HashMap::new();
        assert_eq!(expand_variables("Cost ($) $5", &vars).unwrap(), "Cost ($) $5");
    }

    #[test]
    fn test_undefined_variable() {
        let err = expand_variables("$missing", &HashMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "Variable '$missing' not defined");
    }

    #[test]
    fn test_expand_json_only_touches_strings() {
        let layout = json!({"$key": "$v", "n": 3, "list": ["$v", true]});
        let out = expand_json(&layout, &vars(&[("v", "x")])).unwrap();
        assert_eq!(out, json!({"$key": "x", "n": 3, "list": ["x", true]}));
    }

    #[test]
    fn test_values_with_quotes_stay_inside_strings() {
        let layout = json!({
            "file_name": "S1",
            "elements": {"text": [{"value": "$title", "position": {"x": 0, "y": 0}}]}
        });
        let request = render_layout(&layout, &vars(&[("title", "Say \"hi\", } {")])).unwrap();
        assert_eq!(request.elements.text[0].text(), "Say \"hi\", } {");
    }

    #[test]
    fn test_render_layout_validates() {
        let layout = json!({"file_name": "$id"});
        let err = render_layout(&layout, &vars(&[("id", "")])).unwrap_err();
        assert!(err.to_string().contains("invalid element spec"));
    }
}

//! `{param}` placeholder substitution for descriptor URIs.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::trace;

use crate::error::{ApiError, Result};
use crate::http::HttpMethod;
use crate::types::Params;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]+)\}").expect("placeholder pattern is valid"));

/// Resolve every placeholder in `template` from `params`.
///
/// Consumed keys are removed from the bag so they are not repeated in the
/// query string or body. The identifier shorthand fills every placeholder and
/// is consumed as well. A placeholder with no value becomes `""` on GET and
/// fails with `MissingPathParameter` on any other verb.
pub fn expand(template: &str, params: &mut Params, method: HttpMethod) -> Result<String> {
    let id = params.take_id();
    let mut resolved: HashMap<&str, String> = HashMap::new();
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&template[last..whole.start()]);
        last = whole.end();

        if let Some(id) = &id {
            out.push_str(id);
            continue;
        }

        let name = name.as_str();
        if let Some(value) = resolved.get(name) {
            out.push_str(value);
            continue;
        }

        match params.remove(name).as_ref().and_then(path_value) {
            Some(value) => {
                out.push_str(&value);
                resolved.insert(name, value);
            }
            None if method == HttpMethod::Get => {
                trace!(param = name, "path parameter absent, substituting empty string");
                resolved.insert(name, String::new());
            }
            None => return Err(ApiError::MissingPathParameter(name.to_string())),
        }
    }

    out.push_str(&template[last..]);
    Ok(out)
}

/// Null and empty strings count as "not supplied".
fn path_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_and_consumes_named_param() {
        let mut params = Params::new().with("id", "w1").with("color", "red");
        let url = expand("/widgets/{id}", &mut params, HttpMethod::Get).unwrap();
        assert_eq!(url, "/widgets/w1");
        assert!(params.get("id").is_none());
        assert_eq!(params.get("color"), Some(&Value::from("red")));
    }

    #[test]
    fn replaces_every_occurrence() {
        let mut params = Params::new().with("x", "7");
        let url = expand("/a/{x}/b/{x}", &mut params, HttpMethod::Put).unwrap();
        assert_eq!(url, "/a/7/b/7");
        assert!(params.values().is_empty());
    }

    #[test]
    fn id_shorthand_fills_all_placeholders() {
        let mut params = Params::id("abc123");
        let url = expand("/widgets/{id}", &mut params, HttpMethod::Get).unwrap();
        assert_eq!(url, "/widgets/abc123");
        assert!(params.is_empty());
    }

    #[test]
    fn get_tolerates_missing_param() {
        let mut params = Params::new();
        let url = expand("/widgets/{id}/parts", &mut params, HttpMethod::Get).unwrap();
        assert_eq!(url, "/widgets//parts");
    }

    #[test]
    fn mutating_verbs_require_path_params() {
        for method in [HttpMethod::Post, HttpMethod::Put, HttpMethod::Delete] {
            let mut params = Params::new().with("name", "x");
            let err = expand("/widgets/{id}", &mut params, method).unwrap_err();
            assert_eq!(err, ApiError::MissingPathParameter("id".to_string()));
        }
    }

    #[test]
    fn numbers_are_rendered_plainly() {
        let mut params = Params::new().with("n", 42);
        let url = expand("/pages/{n}", &mut params, HttpMethod::Delete).unwrap();
        assert_eq!(url, "/pages/42");
    }

    #[test]
    fn template_without_placeholders_is_unchanged() {
        let mut params = Params::new().with("page", 2);
        let url = expand("https://api.example.com/v1/widgets", &mut params, HttpMethod::Get).unwrap();
        assert_eq!(url, "https://api.example.com/v1/widgets");
        assert_eq!(params.values().len(), 1);
    }
}

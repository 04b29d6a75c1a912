//! Binding of the flat JSON parameter map onto typed tool arguments.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ToolError;

/// Flat named-parameter map carried in an RPC envelope.
pub type Params = Map<String, Value>;

/// Convert the optional `params` member of an envelope into a [`Params`] map.
/// Absent or `null` means no parameters; any other non-object is rejected.
pub fn from_envelope(params: Option<Value>) -> Result<Params, ToolError> {
    match params {
        None | Some(Value::Null) => Ok(Params::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(ToolError::Params(format!(
            "params must be an object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Bind `params` to `T`. Argument structs use `deny_unknown_fields`, so the
/// serde message names the missing or unexpected parameter.
pub fn bind<T: DeserializeOwned>(params: Params) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(params)).map_err(|e| ToolError::Params(e.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct PromptArgs {
        prompt: String,
        #[serde(default)]
        limit: Option<u32>,
    }

    fn map(v: Value) -> Params {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn missing_parameter_is_named() {
        let err = bind::<PromptArgs>(Params::new()).unwrap_err();
        assert!(matches!(&err, ToolError::Params(m) if m.contains("prompt")), "{err}");
    }

    #[test]
    fn unexpected_parameter_is_named() {
        let err = bind::<PromptArgs>(map(json!({"prompt": "x", "colour": "red"}))).unwrap_err();
        assert!(matches!(&err, ToolError::Params(m) if m.contains("colour")), "{err}");
    }

    #[test]
    fn wrong_type_is_a_params_error() {
        let err = bind::<PromptArgs>(map(json!({"prompt": "x", "limit": "ten"}))).unwrap_err();
        assert!(matches!(err, ToolError::Params(_)));
    }

    #[test]
    fn optional_parameters_default() {
        let args: PromptArgs = bind(map(json!({"prompt": "hi"}))).unwrap();
        assert_eq!(args.prompt, "hi");
        assert_eq!(args.limit, None);
    }

    #[test]
    fn envelope_params_must_be_an_object() {
        assert!(from_envelope(None).unwrap().is_empty());
        assert!(from_envelope(Some(Value::Null)).unwrap().is_empty());
        let err = from_envelope(Some(json!(["a"]))).unwrap_err();
        assert!(matches!(&err, ToolError::Params(m) if m.contains("array")));
    }
}

use serde_json::Value;

/// Content of `choices[0].message` in a completion object, if present.
pub fn first_choice_message(response: &Value) -> Option<&str> {
    response
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
}

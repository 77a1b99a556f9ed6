use super::Diagnostic;

pub fn render(d: &Diagnostic) -> String {
    let mut obj = serde_json::json!({
        "severity": "error",
        "message": d.message,
        "notes": d.notes,
    });

    if let Some(code) = d.code {
        obj["code"] = serde_json::Value::String(code.to_string());
    }

    if let Some(position) = &d.position {
        obj["position"] = serde_json::Value::String(position.clone());
    }

    if let Some(s) = &d.suggestion {
        obj["suggestion"] = serde_json::Value::String(s.clone());
    }

    serde_json::to_string(&obj).unwrap_or_else(|_| r#"{"severity":"error","message":"internal error serializing diagnostic"}"#.to_string())
}

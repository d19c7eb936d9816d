//! Built-in tools available to plan steps

mod echo;
mod http_get;
mod read_file;
mod shell;
mod write_file;

pub use echo::EchoTool;
pub use http_get::HttpGetTool;
pub use read_file::ReadFileTool;
pub use shell::ShellTool;
pub use write_file::WriteFileTool;

use serde_json::Value;

// Models often quote numbers and booleans, so accept both forms.

pub(crate) fn arg_u64(input: &Value, key: &str) -> Option<u64> {
    match &input[key] {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn arg_f64(input: &Value, key: &str) -> Option<f64> {
    match &input[key] {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn arg_bool(input: &Value, key: &str) -> Option<bool> {
    match &input[key] {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

//! Terminal rendering for schemas, replies and errors.
use colored::*;
use std::fmt::Display;
use wirecall_core::model::{FieldKind, MessageType, Method, ScalarKind, Service};
use wirecall_core::tonic::Status;

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

pub struct ServiceList(pub Vec<String>);

pub struct GenericError<T: Display>(pub &'static str, pub T);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)?;
        Ok(())
    }
}

impl From<serde_json::Value> for FormattedString {
    fn from(value: serde_json::Value) -> Self {
        FormattedString(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()))
    }
}

impl From<Status> for FormattedString {
    fn from(status: Status) -> Self {
        FormattedString(format!(
            "{} code={:?} message={:?}",
            "gRPC Failed:".red().bold(),
            status.code(),
            status.message()
        ))
    }
}

impl<T: Display> From<GenericError<T>> for FormattedString {
    fn from(GenericError(msg, err): GenericError<T>) -> Self {
        FormattedString(format!("{}\n\n'{}'", msg.red().bold(), err))
    }
}

impl From<ServiceList> for FormattedString {
    fn from(ServiceList(services): ServiceList) -> Self {
        if services.is_empty() {
            return FormattedString("No services found.".yellow().to_string());
        }

        let mut out = String::new();
        out.push_str("Available Services:\n");
        for svc in services {
            out.push_str(&format!("  - {}\n", svc.green()));
        }
        FormattedString(out.trim_end().to_string())
    }
}

/// Renders a service with its methods, followed by the definition of every
/// distinct message type its methods mention.
impl From<&Service> for FormattedString {
    fn from(service: &Service) -> Self {
        let mut out = String::new();
        out.push_str(&format!(
            "{} {} {{\n",
            "service".cyan(),
            service.name.green()
        ));
        for method in &service.methods {
            out.push_str("  ");
            out.push_str(&FormattedString::from(method).0);
            out.push('\n');
        }
        out.push('}');

        let mut seen = Vec::new();
        for method in &service.methods {
            for message in [&method.input, &method.output] {
                if message.fields.is_empty() || seen.contains(&message.name) {
                    continue;
                }
                seen.push(message.name.clone());
                out.push_str("\n\n");
                out.push_str(&render_message(message));
            }
        }
        FormattedString(out)
    }
}

impl From<&Method> for FormattedString {
    fn from(method: &Method) -> Self {
        let input_stream = if method.client_streaming {
            format!("{} ", "stream".cyan())
        } else {
            "".to_string()
        };
        let output_stream = if method.server_streaming {
            format!("{} ", "stream".cyan())
        } else {
            "".to_string()
        };

        FormattedString(format!(
            "{} {}({}{}) {} ({}{});",
            "rpc".cyan(),
            method.name.green(),
            input_stream,
            method.input.name.yellow(),
            "returns".cyan(),
            output_stream,
            method.output.name.yellow()
        ))
    }
}

fn render_message(message: &MessageType) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} {} {{\n",
        "message".cyan(),
        message.name.green()
    ));
    for field in &message.fields {
        let label = if field.repeated {
            format!("{} ", "repeated".cyan())
        } else {
            "".to_string()
        };
        out.push_str(&format!(
            "  {}{} {} = {};\n",
            label,
            field_type(&field.kind).yellow(),
            field.name,
            field.tag
        ));
    }
    out.push('}');
    out
}

fn field_type(kind: &FieldKind) -> String {
    match kind {
        FieldKind::Scalar(scalar) => scalar_type(scalar).to_string(),
        FieldKind::Enum { name, .. } => name.clone(),
        FieldKind::Message(message) => message.name.clone(),
        FieldKind::WellKnown { name } => name.clone(),
        FieldKind::Map { key, value } => format!("map<{key}, {value}>"),
    }
}

fn scalar_type(kind: &ScalarKind) -> &'static str {
    match kind {
        ScalarKind::Double => "double",
        ScalarKind::Float => "float",
        ScalarKind::Int32 => "int32",
        ScalarKind::Int64 => "int64",
        ScalarKind::Uint32 => "uint32",
        ScalarKind::Uint64 => "uint64",
        ScalarKind::Sint32 => "sint32",
        ScalarKind::Sint64 => "sint64",
        ScalarKind::Fixed32 => "fixed32",
        ScalarKind::Fixed64 => "fixed64",
        ScalarKind::Sfixed32 => "sfixed32",
        ScalarKind::Sfixed64 => "sfixed64",
        ScalarKind::Bool => "bool",
        ScalarKind::String => "string",
        ScalarKind::Bytes => "bytes",
    }
}

pub mod ansi;
pub mod json;
pub mod registry;

use crate::compiler::CompileError;
use crate::vm::RuntimeError;

/// A user facing error report, rendered either for a terminal or as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub code: Option<&'static str>,
    pub message: String,
    /// Source position as given by the parser, when known.
    pub position: Option<String>,
    pub notes: Vec<String>,
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic { code: None, message: message.into(), position: None, notes: Vec::new(), suggestion: None }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        let position = position.into();
        if !position.is_empty() {
            self.position = Some(position);
        }
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

// ---- From impls for the crate's error types ----

impl From<&CompileError> for Diagnostic {
    fn from(e: &CompileError) -> Self {
        let pos = e.pos();
        let text = e.to_string();
        let message = text.strip_prefix(&pos.prefix()).unwrap_or(&text).to_string();
        let code = match e {
            CompileError::InvalidOperation { .. } => "OK-C001",
            CompileError::InvalidUnary { .. } => "OK-C002",
            CompileError::AssignKind { .. } => "OK-C003",
            CompileError::ElementKind { .. } => "OK-C004",
            CompileError::NotAssignable { .. } => "OK-C005",
            CompileError::UndefinedVariable { .. } => "OK-C006",
            CompileError::NoSuchFunction { .. } => "OK-C007",
            CompileError::NoSuchMethod { .. } => "OK-C008",
            CompileError::DuplicateFunction { .. } => "OK-C009",
            CompileError::ArgumentCount { .. } => "OK-C010",
            CompileError::ArgumentKind { .. } => "OK-C011",
            CompileError::ValueCount { .. } => "OK-C012",
            CompileError::ReturnKind { .. } => "OK-C013",
            CompileError::Condition { .. } => "OK-C014",
            CompileError::NotIndexable { .. } => "OK-C015",
            CompileError::NotIterable { .. } => "OK-C016",
            CompileError::InvalidLiteral { .. } => "OK-C017",
            CompileError::UntypedLiteral { .. } => "OK-C018",
            CompileError::BuiltinArgument { .. } => "OK-C019",
        };
        let mut d = Diagnostic::error(message).with_code(code).with_position(pos.to_string());
        match e {
            CompileError::AssignKind { name, .. } => {
                d = d.with_suggestion(format!("assign to a new variable, or convert the value before assigning to '{name}'"));
            }
            CompileError::InvalidOperation { left, right, .. } if left != right => {
                d = d.with_note("both operands must have the same kind");
            }
            CompileError::NoSuchMethod { kind, .. } => {
                d = d.with_note(format!("methods of {kind} are its public function fields"));
            }
            _ => {}
        }
        d
    }
}

impl From<&RuntimeError> for Diagnostic {
    fn from(e: &RuntimeError) -> Self {
        let code = match e {
            RuntimeError::DivisionByZero => "OK-R001",
            RuntimeError::Cast(_) => "OK-R002",
            RuntimeError::Arithmetic(_) => "OK-R003",
            RuntimeError::Call(_) => "OK-R004",
            RuntimeError::Property(_) => "OK-R005",
            RuntimeError::Index(_) => "OK-R006",
            RuntimeError::UndefinedFunction(_) => "OK-R007",
            RuntimeError::Raised { .. } => "OK-R008",
            RuntimeError::WrongKind { .. } | RuntimeError::UnsetRegister(_) | RuntimeError::Io(_) => "OK-R009",
        };
        let d = Diagnostic::error(e.to_string()).with_code(code);
        if e.is_guest() {
            d.with_note(format!("uncaught {}", e.error_type()))
        } else {
            d
        }
    }
}

use super::Diagnostic;

pub struct AnsiRenderer {
    pub use_color: bool,
}

impl AnsiRenderer {
    fn bold(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[1m{s}\x1b[0m") } else { s.to_string() }
    }

    fn bold_red(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[1;31m{s}\x1b[0m") } else { s.to_string() }
    }

    fn cyan(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[36m{s}\x1b[0m") } else { s.to_string() }
    }

    fn dim(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[2m{s}\x1b[0m") } else { s.to_string() }
    }

    pub fn render(&self, d: &Diagnostic) -> String {
        let mut out = String::new();

        // "error[OK-C001]: message"
        let label = match d.code {
            Some(code) => format!("error[{code}]"),
            None => "error".to_string(),
        };
        out.push_str(&format!("{}: {}\n", self.bold_red(&label), self.bold(&d.message)));

        if let Some(position) = &d.position {
            out.push_str(&format!("  {} {}\n", self.cyan("-->"), position));
        }

        for note in &d.notes {
            out.push_str(&format!("  {} note: {}\n", self.dim("="), note));
        }

        if let Some(suggestion) = &d.suggestion {
            out.push_str(&format!("  {} suggestion: {}\n", self.dim("="), suggestion));
        }

        if let Some(code) = d.code {
            out.push_str(&format!("  {} run `ok explain {code}` for details\n", self.dim("=")));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_diag() -> Diagnostic {
        Diagnostic::error("cannot perform number + string")
            .with_code("OK-C001")
            .with_position("main.ok:3:5")
            .with_note("both operands must have the same kind")
            .with_suggestion("convert one side with string()")
    }

    #[test]
    fn render_contains_code_and_message() {
        let r = AnsiRenderer { use_color: false };
        let out = r.render(&make_diag());
        assert!(out.starts_with("error[OK-C001]: cannot perform number + string\n"), "got:\n{out}");
    }

    #[test]
    fn render_contains_position() {
        let r = AnsiRenderer { use_color: false };
        let out = r.render(&make_diag());
        assert!(out.contains("--> main.ok:3:5"), "missing position in:\n{out}");
    }

    #[test]
    fn render_contains_note_and_suggestion() {
        let r = AnsiRenderer { use_color: false };
        let out = r.render(&make_diag());
        assert!(out.contains("note: both operands"), "missing note in:\n{out}");
        assert!(out.contains("suggestion: convert"), "missing suggestion in:\n{out}");
        assert!(out.contains("ok explain OK-C001"), "missing explain hint in:\n{out}");
    }

    #[test]
    fn render_plain_error() {
        let r = AnsiRenderer { use_color: false };
        let out = r.render(&Diagnostic::error("something bad"));
        assert_eq!(out, "error: something bad\n");
    }

    #[test]
    fn render_with_color_contains_ansi_codes() {
        let r = AnsiRenderer { use_color: true };
        assert!(r.render(&make_diag()).contains("\x1b["));
    }

    #[test]
    fn render_without_color_no_ansi_codes() {
        let r = AnsiRenderer { use_color: false };
        assert!(!r.render(&make_diag()).contains("\x1b["));
    }
}

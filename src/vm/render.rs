use crate::kind::is_public;
use crate::number;

use super::Literal;

/// Renders a value for `print` and string interpolation.
///
/// Text-like values are quoted only when `nested` inside a collection, so a
/// top level string prints as-is while `["a"]` keeps its quotes.
pub fn render(value: &Literal, nested: bool) -> String {
    match value {
        Literal::Bool(b) => b.to_string(),
        Literal::Number(n) => number::format(n),
        Literal::Char(c) => quote(&c.to_string(), nested),
        Literal::String(s) => quote(s, nested),
        Literal::Data(d) => quote(&String::from_utf8_lossy(d), nested),
        Literal::Func { name, .. } => name.clone(),
        Literal::Array { elements, .. } => {
            let parts: Vec<String> = elements.iter().map(|e| render(e, true)).collect();
            format!("[{}]", parts.join(", "))
        }
        Literal::Map { kind, entries } => {
            let object = kind.is_object();
            // BTreeMap iteration is already key ordered.
            let parts: Vec<String> = entries
                .iter()
                .filter(|(key, _)| !object || is_public(key))
                .filter(|(_, v)| !matches!(v, Literal::Func { .. }))
                .map(|(key, v)| format!("\"{key}\": {}", render(v, true)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

fn quote(s: &str, nested: bool) -> String {
    if nested { format!("\"{s}\"") } else { s.to_string() }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::kind::Kind;

    fn map(kind: Kind, entries: &[(&str, Literal)]) -> Literal {
        Literal::Map {
            kind,
            entries: entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn top_level_primitives() {
        assert_eq!(render(&Literal::Bool(false), false), "false");
        assert_eq!(render(&Literal::Char('#'), false), "#");
        assert_eq!(render(&Literal::Data(b"abc".to_vec()), false), "abc");
        assert_eq!(render(&Literal::string("foo bar"), false), "foo bar");
    }

    #[test]
    fn number_array() {
        let array = Literal::array(
            Kind::array_of(Kind::NUMBER),
            vec![Literal::int(123), Literal::int(456), Literal::int(789)],
        );
        assert_eq!(render(&array, false), "[123, 456, 789]");
    }

    #[test]
    fn any_array_quotes_text() {
        let array = Literal::array(
            Kind::array_of(Kind::ANY),
            vec![
                Literal::Bool(true),
                Literal::Char('a'),
                Literal::Data(b"data".to_vec()),
                Literal::int(123),
                Literal::string("789"),
            ],
        );
        assert_eq!(render(&array, false), r#"[true, "a", "data", 123, "789"]"#);
    }

    #[test]
    fn maps_sort_keys() {
        let m = map(
            Kind::map_of(Kind::NUMBER),
            &[("c", Literal::int(789)), ("a", Literal::int(123)), ("b", Literal::int(456))],
        );
        assert_eq!(render(&m, false), r#"{"a": 123, "b": 456, "c": 789}"#);
    }

    #[test]
    fn objects_hide_private_fields_and_funcs() {
        let person = map(
            Kind::named("Person"),
            &[
                ("Foo", Literal::int(123)),
                ("bar", Literal::int(456)),
                ("Greet", Literal::func("Greet", Kind::func(vec![], vec![]))),
            ],
        );
        assert_eq!(render(&person, false), r#"{"Foo": 123}"#);
    }

    #[test]
    fn map_keeps_lowercase_keys() {
        let m = map(Kind::map_of(Kind::BOOL), &[("x", Literal::Bool(true))]);
        assert_eq!(render(&m, false), r#"{"x": true}"#);
    }
}

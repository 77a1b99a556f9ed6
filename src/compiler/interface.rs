use crate::ast::{Expr, Func, Stmt};
use crate::kind::is_public;

use super::InterfaceTable;

/// Methods of object kinds, read off their constructors: a public variable
/// assigned a function literal at the top level of a constructor is a method
/// of that kind.
pub fn derive_interfaces(funcs: &[Func]) -> InterfaceTable {
    let mut table = InterfaceTable::new();
    for func in funcs.iter().filter(|f| f.is_constructor()) {
        let methods = table.entry(func.name.clone()).or_default();
        for stmt in &func.statements {
            let Stmt::Assign { targets, values, .. } = stmt else { continue };
            for (target, value) in targets.iter().zip(values) {
                if let (Expr::Identifier { name, .. }, Expr::Func(method)) = (target, value) {
                    if is_public(name) {
                        methods.insert(name.clone(), method.kind());
                    }
                }
            }
        }
    }
    table
}

//! `require()` discovery.

use std::path::Path;

use oxc_allocator::Allocator;
use oxc_ast::ast::{Argument, CallExpression, Expression};
use oxc_ast_visit::{Visit, walk};
use oxc_parser::Parser;
use oxc_span::SourceType;

use crate::error::BundleError;

/// Parse `source` as a CommonJS script and return every statically known
/// `require()` specifier in source order.
///
/// Calls with a computed argument are left alone; they fail at runtime the
/// same way they would without bundling.
pub(crate) fn collect_requires(path: &Path, source: &str) -> Result<Vec<String>, BundleError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::cjs()).parse();

    if !ret.errors.is_empty() {
        let message = ret
            .errors
            .iter()
            .map(|err| err.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(BundleError::Parse {
            path: path.to_path_buf(),
            message,
        });
    }

    let mut collector = RequireCollector::default();
    collector.visit_program(&ret.program);
    Ok(collector.specifiers)
}

#[derive(Default)]
struct RequireCollector {
    specifiers: Vec<String>,
}

impl<'a> Visit<'a> for RequireCollector {
    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if let Expression::Identifier(ident) = &call.callee {
            if ident.name.as_str() == "require" && call.arguments.len() == 1 {
                if let Some(specifier) = literal_specifier(&call.arguments[0]) {
                    self.specifiers.push(specifier);
                }
            }
        }
        walk::walk_call_expression(self, call);
    }
}

fn literal_specifier(arg: &Argument<'_>) -> Option<String> {
    match arg {
        Argument::StringLiteral(lit) => Some(lit.value.as_str().to_string()),
        Argument::TemplateLiteral(tpl) if tpl.expressions.is_empty() => tpl
            .quasis
            .first()
            .and_then(|quasi| quasi.value.cooked.as_ref())
            .map(|cooked| cooked.as_str().to_string()),
        _ => None,
    }
}

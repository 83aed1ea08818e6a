//! Argument Templating
//!
//! Resolves step arguments against the results already produced in the
//! current workflow frame.
//!
//! - Literals resolve to themselves.
//! - A reference without a format resolves to the referenced value, type
//!   preserved (a number stays a number).
//! - A reference with a format resolves to text. Placeholders:
//!   `{}` is the reference's own value, `{step}` / `{step.path}` name any
//!   step of the frame, `{{` and `}}` are literal braces. A placeholder
//!   naming no step with a result, like `{message}`, is the reference's own
//!   value as well.

use std::collections::HashMap;

use crate::error::EngineError;
use crate::workflow::{Argument, Reference, StepValue};

/// Latest results visible to argument resolution.
pub trait ResultScope {
    /// Most recent result of `step`, if it has produced one.
    fn latest(&self, step: &str) -> Option<&StepValue>;
}

impl ResultScope for HashMap<String, StepValue> {
    fn latest(&self, step: &str) -> Option<&StepValue> {
        self.get(step)
    }
}

/// Resolves one argument.
pub fn resolve(
    argument_name: &str,
    argument: &Argument,
    scope: &dyn ResultScope,
) -> Result<StepValue, EngineError> {
    match argument {
        Argument::Literal(value) => Ok(StepValue::from(value.clone())),
        Argument::Reference(reference) => resolve_reference(argument_name, reference, scope),
    }
}

fn resolve_reference(
    argument_name: &str,
    reference: &Reference,
    scope: &dyn ResultScope,
) -> Result<StepValue, EngineError> {
    let own = lookup(
        argument_name,
        &reference.step,
        reference.path.as_deref(),
        reference,
        scope,
    )?;

    match &reference.format {
        None => Ok(own),
        Some(format) => interpolate(argument_name, format, &own, reference, scope).map(StepValue::Text),
    }
}

/// Finds `step` (optionally at `path`) in the scope. Falls back to the
/// reference's default only when `step` is the reference's own step.
fn lookup(
    argument_name: &str,
    step: &str,
    path: Option<&str>,
    reference: &Reference,
    scope: &dyn ResultScope,
) -> Result<StepValue, EngineError> {
    let unresolved = |target: String| EngineError::UnresolvedReference {
        argument: argument_name.to_string(),
        reference: target,
    };

    let Some(value) = scope.latest(step) else {
        return match &reference.default {
            Some(default) if step == reference.step => Ok(StepValue::from(default.clone())),
            _ => Err(unresolved(step.to_string())),
        };
    };

    match path {
        None => Ok(value.clone()),
        Some(path) => value
            .lookup_path(path)
            .ok_or_else(|| unresolved(format!("{}.{}", step, path))),
    }
}

/// Resolves `{expression}`. A name with no result in the frame stands for
/// the reference's own value.
fn resolve_placeholder(
    argument_name: &str,
    expression: &str,
    own: &StepValue,
    reference: &Reference,
    scope: &dyn ResultScope,
) -> Result<StepValue, EngineError> {
    // Whole expression first, so step names containing '.' still work
    if scope.latest(expression).is_some() {
        return lookup(argument_name, expression, None, reference, scope);
    }
    match expression.split_once('.') {
        Some((step, path)) if scope.latest(step).is_some() => {
            lookup(argument_name, step, Some(path), reference, scope)
        }
        _ => Ok(own.clone()),
    }
}

fn interpolate(
    argument_name: &str,
    template: &str,
    own: &StepValue,
    reference: &Reference,
    scope: &dyn ResultScope,
) -> Result<String, EngineError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(|c| c == '{' || c == '}') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") || tail.starts_with("}}") {
            out.push_str(&tail[..1]);
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('}') {
            out.push('}');
            rest = &tail[1..];
            continue;
        }

        let Some(end) = tail[1..].find('}') else {
            // Unclosed brace is literal text
            out.push_str(tail);
            rest = "";
            break;
        };

        let expression = tail[1..1 + end].trim();
        let value = if expression.is_empty() {
            own.clone()
        } else {
            resolve_placeholder(argument_name, expression, own, reference, scope)?
        };
        out.push_str(&value.render_inline());
        rest = &tail[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

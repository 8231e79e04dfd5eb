//! Built-in filters, registered under the `builtins` qualifier

use super::registry::Namespace;
use crate::renderer::escape::escape;
use crate::value::{Function, HostError, Kwargs, Value};

const QUALIFIER: &str = "builtins";

type Builtin = fn(&[Value], &Kwargs) -> Result<Value, HostError>;

const FILTERS: &[(&str, Builtin)] = &[
    ("safe", safe),
    ("escape", escape_filter),
    ("upper", upper),
    ("lower", lower),
    ("join", join),
    ("length", length),
    ("default", default),
];

pub(super) fn install(filters: &mut Namespace) {
    for (name, f) in FILTERS {
        let qualified = format!("{}.{}", QUALIFIER, name);
        filters.insert(&qualified, name, Function::new(qualified.as_str(), *f));
    }
}

/// Positional argument `index`, or the keyword `name`
fn arg<'v>(args: &'v [Value], kwargs: &'v Kwargs, index: usize, name: &str) -> Option<&'v Value> {
    args.get(index).or_else(|| kwargs.get(name))
}

fn input<'v>(args: &'v [Value], filter: &str) -> Result<&'v Value, HostError> {
    args.first()
        .ok_or_else(|| format!("{} expects a value to filter", filter).into())
}

fn safe(args: &[Value], _: &Kwargs) -> Result<Value, HostError> {
    Ok(match input(args, "safe")? {
        Value::Safe(s) => Value::Safe(s.clone()),
        other => Value::Safe(other.to_string()),
    })
}

fn escape_filter(args: &[Value], _: &Kwargs) -> Result<Value, HostError> {
    Ok(match input(args, "escape")? {
        Value::Safe(s) => Value::Safe(s.clone()),
        other => Value::Safe(escape(&other.to_string()).into_owned()),
    })
}

/// Apply `f` to the text, keeping a safe string safe
fn map_text(value: &Value, f: impl Fn(&str) -> String) -> Value {
    match value {
        Value::Safe(s) => Value::Safe(f(s)),
        other => Value::Str(f(&other.to_string())),
    }
}

fn upper(args: &[Value], _: &Kwargs) -> Result<Value, HostError> {
    Ok(map_text(input(args, "upper")?, str::to_uppercase))
}

fn lower(args: &[Value], _: &Kwargs) -> Result<Value, HostError> {
    Ok(map_text(input(args, "lower")?, str::to_lowercase))
}

fn join(args: &[Value], kwargs: &Kwargs) -> Result<Value, HostError> {
    let value = input(args, "join")?;
    let sep = match arg(args, kwargs, 1, "sep") {
        Some(sep) => sep.to_string(),
        None => String::new(),
    };
    let items = value
        .iterate()
        .ok_or_else(|| format!("join expects a sequence, got {}", value.kind()))?;
    Ok(Value::Str(
        items
            .iter()
            .map(|item| item.to_string())
            .collect::<Vec<_>>()
            .join(&sep),
    ))
}

fn length(args: &[Value], _: &Kwargs) -> Result<Value, HostError> {
    let value = input(args, "length")?;
    value
        .len()
        .map(Value::from)
        .ok_or_else(|| format!("{} value has no length", value.kind()).into())
}

fn default(args: &[Value], kwargs: &Kwargs) -> Result<Value, HostError> {
    let value = input(args, "default")?;
    if value.is_truthy() {
        return Ok(value.clone());
    }
    Ok(arg(args, kwargs, 1, "fallback").cloned().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(f: Builtin, args: Vec<Value>) -> Result<Value, HostError> {
        f(&args, &Kwargs::new())
    }

    #[test]
    fn test_join() {
        let list = Value::from(vec!["a", "b"]);
        assert_eq!(run(join, vec![list.clone(), ", ".into()]).unwrap(), Value::from("a, b"));
        assert_eq!(run(join, vec![list.clone()]).unwrap(), Value::from("ab"));

        let mut kwargs = Kwargs::new();
        kwargs.insert("sep".to_string(), Value::from("-"));
        assert_eq!(join(&[list], &kwargs).unwrap(), Value::from("a-b"));

        assert!(run(join, vec![Value::Int(1)]).is_err());
    }

    #[test]
    fn test_case_keeps_safety() {
        assert_eq!(run(upper, vec!["a<b".into()]).unwrap(), Value::from("A<B"));
        assert!(run(lower, vec![Value::safe("<B>")]).unwrap().is_safe());
    }

    #[test]
    fn test_escape_marks_safe() {
        assert_eq!(
            run(escape_filter, vec!["<".into()]).unwrap(),
            Value::safe("&lt;")
        );
        assert!(run(escape_filter, vec!["<".into()]).unwrap().is_safe());
    }

    #[test]
    fn test_length_and_default() {
        assert_eq!(run(length, vec![Value::from(vec![1, 2, 3])]).unwrap(), Value::Int(3));
        assert!(run(length, vec![Value::Int(3)]).is_err());
        assert_eq!(run(default, vec!["".into(), "x".into()]).unwrap(), Value::from("x"));
        assert_eq!(run(default, vec!["y".into(), "x".into()]).unwrap(), Value::from("y"));
        assert_eq!(run(default, vec![Value::None]).unwrap(), Value::None);
    }

    #[test]
    fn test_missing_input() {
        let err = run(upper, vec![]).unwrap_err();
        assert_eq!(err.to_string(), "upper expects a value to filter");
    }
}

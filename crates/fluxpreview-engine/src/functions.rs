//! Global template functions

use minijinja::{Error, ErrorKind, Value};

/// Abort rendering with `message`
pub fn fail(message: String) -> Result<Value, Error> {
    Err(Error::new(ErrorKind::InvalidOperation, message))
}

/// `dict("name", release.name, "port", 80)`
pub fn dict(args: Vec<Value>) -> Result<Value, Error> {
    if args.len() % 2 != 0 {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            "dict expects key/value pairs",
        ));
    }

    let mut map = serde_json::Map::with_capacity(args.len() / 2);
    for pair in args.chunks(2) {
        let key = pair[0]
            .as_str()
            .ok_or_else(|| Error::new(ErrorKind::InvalidOperation, "dict keys must be strings"))?;
        let value = serde_json::to_value(&pair[1])
            .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))?;
        map.insert(key.to_string(), value);
    }
    Ok(Value::from_serialize(&map))
}

pub fn list(args: Vec<Value>) -> Value {
    Value::from(args)
}

/// First argument that is neither missing, none nor empty
pub fn coalesce(args: Vec<Value>) -> Value {
    args.into_iter()
        .find(|v| !v.is_undefined() && !v.is_none() && v.is_true())
        .unwrap_or(Value::from(()))
}

/// `ternary("yes", "no", values.enabled)`
pub fn ternary(when_true: Value, when_false: Value, condition: Value) -> Value {
    if condition.is_true() {
        when_true
    } else {
        when_false
    }
}

/// Go-style formatting for the verbs charts use: `%s %v %d %q %%`
pub fn printf(format: String, args: Vec<Value>) -> Result<String, Error> {
    let mut out = String::with_capacity(format.len());
    let mut args = args.iter();
    let mut chars = format.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let verb = match chars.next() {
            Some('%') => {
                out.push('%');
                continue;
            }
            Some(verb) => verb,
            None => {
                out.push('%');
                break;
            }
        };
        let arg = args.next().ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("printf: missing argument for %{}", verb),
            )
        })?;
        match verb {
            'q' => out.push_str(&format!("{:?}", arg.as_str().map_or(arg.to_string(), str::to_string))),
            'd' => match arg.as_i64() {
                Some(n) => out.push_str(&n.to_string()),
                None => out.push_str(&format!("%!d({})", arg)),
            },
            _ => out.push_str(&arg.to_string()),
        }
    }

    Ok(out)
}

use crate::interpreter::value::Value;

fn index_arg(args: &[Value], at: usize, method: &str) -> Result<Option<f64>, String> {
    match args.get(at) {
        None | Some(Value::Nil) => Ok(None),
        Some(Value::Num(n)) => Ok(Some(n.trunc())),
        Some(other) => Err(format!("{} expects a number, got {}", method, other.tag())),
    }
}

fn str_arg<'a>(args: &'a [Value], at: usize, method: &str) -> Result<&'a str, String> {
    match args.get(at) {
        Some(Value::Str(s)) => Ok(s),
        Some(other) => Err(format!("{} expects a string, got {}", method, other.tag())),
        None => Err(format!("{} expects a string argument", method)),
    }
}

// negative indices count from the end, everything is clamped into 0..=len
fn clamp_index(index: f64, len: usize) -> usize {
    if index < 0.0 {
        (len as f64 + index).max(0.0) as usize
    } else {
        (index as usize).min(len)
    }
}

fn slice_bounds(args: &[Value], len: usize, method: &str) -> Result<(usize, usize), String> {
    let start = index_arg(args, 0, method)?.map_or(0, |i| clamp_index(i, len));
    let end = index_arg(args, 1, method)?.map_or(len, |i| clamp_index(i, len));
    Ok((start, end.max(start)))
}

/// Reads `receiver.key` / `receiver[key]` for everything except modules.
pub fn get_property(receiver: &Value, key: &Value) -> Result<Value, String> {
    match (receiver, key) {
        (Value::Str(s), Value::Str(k)) if k.as_ref() == "length" => {
            Ok(Value::Num(s.chars().count() as f64))
        }
        (Value::Array(elements), Value::Str(k)) if k.as_ref() == "length" => {
            Ok(Value::Num(elements.borrow().len() as f64))
        }
        (Value::Str(s), Value::Num(n)) => Ok(if *n >= 0.0 && n.fract() == 0.0 {
            s.chars()
                .nth(*n as usize)
                .map(|c| Value::str(c.to_string()))
                .unwrap_or(Value::Nil)
        } else {
            Value::Nil
        }),
        (Value::Array(elements), Value::Num(n)) => Ok(if *n >= 0.0 && n.fract() == 0.0 {
            elements.borrow().get(*n as usize).cloned().unwrap_or(Value::Nil)
        } else {
            Value::Nil
        }),
        (Value::Object(object), key) => Ok(object
            .borrow()
            .get(&key.to_string())
            .cloned()
            .unwrap_or(Value::Nil)),
        _ => Err(format!(
            "Cannot read property '{}' of {}",
            key,
            receiver.tag()
        )),
    }
}

/// Methods on strings, arrays and objects that need no access to the interpreter.
/// `map`, `filter` and `forEach` call back into user code and live in the interpreter.
pub fn call_native_method(receiver: &Value, name: &str, args: &[Value]) -> Result<Value, String> {
    match (receiver, name) {
        // strings
        (Value::Str(s), "toUpperCase") => Ok(Value::str(s.to_uppercase())),
        (Value::Str(s), "toLowerCase") => Ok(Value::str(s.to_lowercase())),
        (Value::Str(s), "trim") => Ok(Value::str(s.trim())),
        (Value::Str(s), "split") => {
            let separator = str_arg(args, 0, "split")?;
            let parts: Vec<Value> = if separator.is_empty() {
                s.chars().map(|c| Value::str(c.to_string())).collect()
            } else {
                s.split(separator).map(Value::str).collect()
            };
            Ok(Value::array(parts))
        }
        (Value::Str(s), "includes") => Ok(Value::Bool(s.contains(str_arg(args, 0, "includes")?))),
        (Value::Str(s), "startsWith") => {
            Ok(Value::Bool(s.starts_with(str_arg(args, 0, "startsWith")?)))
        }
        (Value::Str(s), "endsWith") => Ok(Value::Bool(s.ends_with(str_arg(args, 0, "endsWith")?))),
        (Value::Str(s), "replace") => {
            let from = str_arg(args, 0, "replace")?;
            let to = args.get(1).map(|v| v.to_string()).unwrap_or_default();
            Ok(Value::str(s.replacen(from, &to, 1)))
        }
        (Value::Str(s), "indexOf") => {
            let needle = str_arg(args, 0, "indexOf")?;
            let index = s
                .find(needle)
                .map(|byte| s[..byte].chars().count() as f64)
                .unwrap_or(-1.0);
            Ok(Value::Num(index))
        }
        (Value::Str(s), "slice") => {
            let chars: Vec<char> = s.chars().collect();
            let (start, end) = slice_bounds(args, chars.len(), "slice")?;
            Ok(Value::str(chars[start..end].iter().collect::<String>()))
        }
        (Value::Str(_), "charAt") => {
            let index = index_arg(args, 0, "charAt")?.unwrap_or(0.0);
            match get_property(receiver, &Value::Num(index))? {
                Value::Nil => Ok(Value::str("")),
                c => Ok(c),
            }
        }

        // arrays
        (Value::Array(elements), "push") => {
            let mut elements = elements.borrow_mut();
            elements.extend(args.iter().cloned());
            Ok(Value::Num(elements.len() as f64))
        }
        (Value::Array(elements), "pop") => Ok(elements.borrow_mut().pop().unwrap_or(Value::Nil)),
        (Value::Array(elements), "join") => {
            let separator = match args.first() {
                Some(Value::Str(sep)) => sep.to_string(),
                _ => ",".to_string(),
            };
            let joined = elements
                .borrow()
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(&separator);
            Ok(Value::str(joined))
        }
        (Value::Array(elements), "includes") => {
            let needle = args.first().cloned().unwrap_or(Value::Nil);
            Ok(Value::Bool(elements.borrow().iter().any(|v| v.strict_eq(&needle))))
        }
        (Value::Array(elements), "indexOf") => {
            let needle = args.first().cloned().unwrap_or(Value::Nil);
            let index = elements
                .borrow()
                .iter()
                .position(|v| v.strict_eq(&needle))
                .map_or(-1.0, |i| i as f64);
            Ok(Value::Num(index))
        }
        (Value::Array(elements), "slice") => {
            let elements = elements.borrow();
            let (start, end) = slice_bounds(args, elements.len(), "slice")?;
            Ok(Value::array(elements[start..end].to_vec()))
        }

        // objects
        (Value::Object(object), "keys") => Ok(Value::array(
            object.borrow().keys().map(|k| Value::Str(k.clone())).collect(),
        )),
        (Value::Object(object), "values") => {
            Ok(Value::array(object.borrow().values().cloned().collect()))
        }
        (Value::Object(object), "has") => {
            let key = args.first().map(|k| k.to_string()).unwrap_or_default();
            Ok(Value::Bool(object.borrow().contains_key(&key)))
        }

        _ => Err(format!(
            "'{}' is not a method of {}",
            name,
            receiver.tag()
        )),
    }
}

use super::value::{HostContext, NativeFunction, Value};
use std::collections::HashMap;
use std::rc::Rc;

pub fn native(
    name: &str,
    arity: Option<usize>,
    func: impl Fn(&mut HostContext, &[Value]) -> Result<Value, String> + 'static,
) -> Value {
    Value::NativeFn(Rc::new(NativeFunction {
        name: Rc::from(name),
        arity,
        func: Box::new(func),
    }))
}

/// `vine:global`, also installed into every module root.
pub fn global_module() -> HashMap<String, Value> {
    let mut m = HashMap::new();
    m.insert("print".into(), native_print());
    m
}

fn native_print() -> Value {
    native("print", None, |ctx, args| {
        let line = args
            .iter()
            .map(|arg| arg.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(ctx.out, "{}", line).map_err(|e| format!("print failed: {}", e))?;
        ctx.out
            .flush()
            .map_err(|e| format!("print failed: {}", e))?;
        Ok(Value::Nil)
    })
}

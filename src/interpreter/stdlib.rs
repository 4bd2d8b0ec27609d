use super::native_function::native;
use super::value::{HostContext, Object, Value};
use chrono::{DateTime, Datelike, Local, Timelike, Utc};
use std::cell::Cell;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;
use std::time::UNIX_EPOCH;

/// Returns (module_name, export_name) pairs for all built-in exports. Used by the drift test.
pub fn all_stdlib_exports() -> Vec<(&'static str, &'static str)> {
    vec![
        // global
        ("global", "print"),
        // io
        ("io", "read"),
        ("io", "write"),
        ("io", "exists"),
        ("io", "delete"),
        ("io", "mkdir"),
        ("io", "deleteDir"),
        ("io", "info"),
        // path
        ("path", "file"),
        ("path", "dir"),
        ("path", "extname"),
        ("path", "resolve"),
        ("path", "join"),
        ("path", "isAbsolute"),
        // date
        ("date", "now"),
        ("date", "reset"),
        ("date", "getDate"),
        ("date", "getDay"),
        ("date", "getFullYear"),
        ("date", "getHours"),
        ("date", "getMilliseconds"),
        ("date", "getMinutes"),
        ("date", "getMonth"),
        ("date", "getSeconds"),
        ("date", "getTime"),
        ("date", "getTimezoneOffset"),
        ("date", "getUTCDate"),
        ("date", "getUTCDay"),
        ("date", "getUTCFullYear"),
        ("date", "getUTCHours"),
        ("date", "getUTCMilliseconds"),
        ("date", "getUTCMinutes"),
        ("date", "getUTCMonth"),
        ("date", "getUTCSeconds"),
        ("date", "toISOString"),
        ("date", "toJSON"),
        ("date", "toDateString"),
        ("date", "toTimeString"),
        ("date", "toUTCString"),
    ]
}

fn expect_str<'a>(args: &'a [Value], index: usize, func: &str) -> Result<&'a str, String> {
    match args.get(index) {
        Some(Value::Str(s)) => Ok(s),
        _ => Err(format!("{} expects a string as argument {}", func, index + 1)),
    }
}

// Lexically folds `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

fn base_dir(ctx: &HostContext) -> PathBuf {
    ctx.file_path
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

// paths given to io functions are relative to the calling file's directory
fn resolve_arg(ctx: &HostContext, args: &[Value], func: &str) -> Result<PathBuf, String> {
    let raw = expect_str(args, 0, func)?;
    Ok(base_dir(ctx).join(raw))
}

fn path_value(path: &Path) -> Value {
    Value::str(path.to_string_lossy())
}

// ── io module ────────────────────────────────────────────────────────────────

pub fn io_module() -> HashMap<String, Value> {
    let mut m = HashMap::new();

    m.insert(
        "read".into(),
        native("read", Some(1), |ctx, args| {
            let path = resolve_arg(ctx, args, "read")?;
            fs::read_to_string(&path)
                .map(Value::str)
                .map_err(|e| format!("Error reading '{}': {}", path.display(), e))
        }),
    );
    m.insert(
        "write".into(),
        native("write", Some(2), |ctx, args| {
            let path = resolve_arg(ctx, args, "write")?;
            let content = args[1].to_string();
            fs::write(&path, content)
                .map(|_| Value::Nil)
                .map_err(|e| format!("Error writing '{}': {}", path.display(), e))
        }),
    );
    m.insert(
        "exists".into(),
        native("exists", Some(1), |ctx, args| {
            let path = resolve_arg(ctx, args, "exists")?;
            Ok(Value::Bool(path.exists()))
        }),
    );
    m.insert(
        "delete".into(),
        native("delete", Some(1), |ctx, args| {
            let path = resolve_arg(ctx, args, "delete")?;
            fs::remove_file(&path)
                .map(|_| Value::Nil)
                .map_err(|e| format!("Error deleting '{}': {}", path.display(), e))
        }),
    );
    m.insert(
        "mkdir".into(),
        native("mkdir", Some(1), |ctx, args| {
            let path = resolve_arg(ctx, args, "mkdir")?;
            fs::create_dir(&path)
                .map(|_| Value::Nil)
                .map_err(|e| format!("Error creating '{}': {}", path.display(), e))
        }),
    );
    m.insert(
        "deleteDir".into(),
        native("deleteDir", Some(1), |ctx, args| {
            let path = resolve_arg(ctx, args, "deleteDir")?;
            fs::remove_dir(&path)
                .map(|_| Value::Nil)
                .map_err(|e| format!("Error removing '{}': {}", path.display(), e))
        }),
    );
    m.insert(
        "info".into(),
        native("info", Some(1), |ctx, args| {
            let path = resolve_arg(ctx, args, "info")?;
            let meta = fs::metadata(&path)
                .map_err(|e| format!("Error reading info of '{}': {}", path.display(), e))?;
            let is_symlink = fs::symlink_metadata(&path)
                .map(|m| m.file_type().is_symlink())
                .unwrap_or(false);
            let millis = |time: std::io::Result<std::time::SystemTime>| {
                time.ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| Value::Num(d.as_millis() as f64))
                    .unwrap_or(Value::Nil)
            };

            let mut info = Object::new();
            info.insert("size", Value::Num(meta.len() as f64));
            info.insert("mtimeMs", millis(meta.modified()));
            info.insert("atimeMs", millis(meta.accessed()));
            info.insert("birthtimeMs", millis(meta.created()));
            info.insert("readonly", Value::Bool(meta.permissions().readonly()));
            info.insert("isFile", Value::Bool(meta.is_file()));
            info.insert("isDirectory", Value::Bool(meta.is_dir()));
            info.insert("isSymbolicLink", Value::Bool(is_symlink));
            Ok(Value::object(info))
        }),
    );

    m
}

// ── path module ──────────────────────────────────────────────────────────────

pub fn path_module() -> HashMap<String, Value> {
    let mut m = HashMap::new();

    m.insert(
        "file".into(),
        native("file", Some(0), |ctx, _| {
            Ok(ctx
                .file_path
                .as_deref()
                .and_then(Path::file_name)
                .map(|name| Value::str(name.to_string_lossy()))
                .unwrap_or(Value::Nil))
        }),
    );
    m.insert(
        "dir".into(),
        native("dir", Some(0), |ctx, _| Ok(path_value(&base_dir(ctx)))),
    );
    m.insert(
        "extname".into(),
        native("extname", Some(0), |ctx, _| {
            let ext = ctx
                .file_path
                .as_deref()
                .and_then(Path::extension)
                .map(|ext| format!(".{}", ext.to_string_lossy()))
                .unwrap_or_default();
            Ok(Value::str(ext))
        }),
    );
    m.insert(
        "resolve".into(),
        native("resolve", None, |_, args| {
            let mut path = std::env::current_dir().map_err(|e| e.to_string())?;
            for (i, _) in args.iter().enumerate() {
                path.push(expect_str(args, i, "resolve")?);
            }
            Ok(path_value(&normalize(&path)))
        }),
    );
    m.insert(
        "join".into(),
        native("join", None, |_, args| {
            let mut path = PathBuf::new();
            for (i, _) in args.iter().enumerate() {
                // unlike PathBuf::push, later absolute segments do not reset the path
                path.push(expect_str(args, i, "join")?.trim_start_matches('/'));
            }
            Ok(path_value(&normalize(&path)))
        }),
    );
    m.insert(
        "isAbsolute".into(),
        native("isAbsolute", Some(1), |_, args| {
            let raw = expect_str(args, 0, "isAbsolute")?;
            Ok(Value::Bool(Path::new(raw).is_absolute()))
        }),
    );

    m
}

// ── date module ──────────────────────────────────────────────────────────────

// Every getter reads the same captured instant until `reset` moves it to now.
fn date_getter(
    anchor: &Rc<Cell<DateTime<Local>>>,
    name: &str,
    read: fn(DateTime<Local>) -> Value,
) -> Value {
    let anchor = Rc::clone(anchor);
    native(name, Some(0), move |_, _| Ok(read(anchor.get())))
}

fn num(n: impl Into<f64>) -> Value {
    Value::Num(n.into())
}

pub fn date_module() -> HashMap<String, Value> {
    let anchor = Rc::new(Cell::new(Local::now()));
    let mut m = HashMap::new();

    m.insert(
        "now".into(),
        native("now", Some(0), |_, _| {
            Ok(Value::Num(Utc::now().timestamp_millis() as f64))
        }),
    );
    let reset_anchor = Rc::clone(&anchor);
    m.insert(
        "reset".into(),
        native("reset", Some(0), move |_, _| {
            reset_anchor.set(Local::now());
            Ok(Value::Nil)
        }),
    );

    let getters: [(&str, fn(DateTime<Local>) -> Value); 24] = [
        ("getDate", |d| num(d.day())),
        ("getDay", |d| num(d.weekday().num_days_from_sunday())),
        ("getFullYear", |d| num(d.year())),
        ("getHours", |d| num(d.hour())),
        ("getMilliseconds", |d| num(d.timestamp_subsec_millis())),
        ("getMinutes", |d| num(d.minute())),
        ("getMonth", |d| num(d.month0())),
        ("getSeconds", |d| num(d.second())),
        ("getTime", |d| Value::Num(d.timestamp_millis() as f64)),
        // minutes behind UTC, so zones east of Greenwich are negative
        ("getTimezoneOffset", |d| {
            num(-d.offset().local_minus_utc() / 60)
        }),
        ("getUTCDate", |d| num(d.with_timezone(&Utc).day())),
        ("getUTCDay", |d| {
            num(d.with_timezone(&Utc).weekday().num_days_from_sunday())
        }),
        ("getUTCFullYear", |d| num(d.with_timezone(&Utc).year())),
        ("getUTCHours", |d| num(d.with_timezone(&Utc).hour())),
        ("getUTCMilliseconds", |d| {
            num(d.with_timezone(&Utc).timestamp_subsec_millis())
        }),
        ("getUTCMinutes", |d| num(d.with_timezone(&Utc).minute())),
        ("getUTCMonth", |d| num(d.with_timezone(&Utc).month0())),
        ("getUTCSeconds", |d| num(d.with_timezone(&Utc).second())),
        ("toISOString", |d| {
            Value::str(d.with_timezone(&Utc).format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
        }),
        ("toJSON", |d| {
            Value::str(d.with_timezone(&Utc).format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
        }),
        ("toDateString", |d| Value::str(d.format("%a %b %d %Y").to_string())),
        ("toTimeString", |d| Value::str(d.format("%H:%M:%S GMT%z").to_string())),
        ("toUTCString", |d| {
            Value::str(d.with_timezone(&Utc).format("%a, %d %b %Y %H:%M:%S GMT").to_string())
        }),
        ("toLocaleString", |d| Value::str(d.format("%x, %X").to_string())),
    ];
    for (name, read) in getters {
        m.insert(name.into(), date_getter(&anchor, name, read));
    }

    m
}

//! `PyUnicode_FromFormat` engine
//!
//! Supports `%d %i %u %x %s %p %A %U %V %S %R %c %%` with the `l`, `ll`
//! and `z` length modifiers on the integer conversions. Flags and width
//! are accepted and ignored; precision truncates `%s`. Any other
//! `%`-sequence is copied to the output unchanged.

mod valist;


pub use valist::{VaArg, VaList};

use crate::context::Context;
use crate::convert::{to_managed, to_native};
use crate::error::{PyException, PyResult};
use crate::exception::may_raise_ptr;
use crate::object::{NativePtr, Value};
use crate::refcount::RefMode;
use crate::runtime::ManagedRuntime;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static SPECIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"%(?P<flags>[-+ #0])?(?P<width>\d+)?(?:\.(?P<prec>\d+))?(?P<len>ll|l|z)?(?P<spec>[%cduixsAUVSRp])",
    )
    .expect("format specifier pattern compiles")
});

const MAX_CHAR: i64 = 0x10FFFF;

/// Render `fmt`, reading arguments from `args`
pub fn format(
    ctx: &Context,
    runtime: &dyn ManagedRuntime,
    fmt: &str,
    args: &mut VaList,
) -> PyResult<String> {
    let mut out = String::with_capacity(fmt.len());
    let mut cursor = 0;

    for caps in SPECIFIER.captures_iter(fmt) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&fmt[cursor..whole.start()]);
        cursor = whole.end();

        if !render(ctx, runtime, &caps, args, &mut out)? {
            out.push_str(whole.as_str());
        }
    }
    out.push_str(&fmt[cursor..]);
    Ok(out)
}

/// Render one specifier; false when the combination is not supported
fn render(
    ctx: &Context,
    runtime: &dyn ManagedRuntime,
    caps: &Captures<'_>,
    args: &mut VaList,
    out: &mut String,
) -> PyResult<bool> {
    let spec = caps.name("spec").map_or("", |m| m.as_str());
    let wide = caps.name("len").is_some();
    let precision = caps
        .name("prec")
        .and_then(|m| m.as_str().parse::<usize>().ok());

    if wide && !matches!(spec, "d" | "i" | "u" | "x") {
        return Ok(false);
    }

    match spec {
        "%" => out.push('%'),
        "c" => {
            let ordinal = args.next_int()?;
            if !(0..=MAX_CHAR).contains(&ordinal) {
                return Err(PyException::overflow_error(
                    "character argument not in range(0x110000)",
                ));
            }
            out.push(char::from_u32(ordinal as u32).unwrap_or(char::REPLACEMENT_CHARACTER));
        }
        "d" | "i" => {
            let v = args.next_int()?;
            let v = if wide { v } else { v as i32 as i64 };
            out.push_str(&v.to_string());
        }
        "u" => {
            let v = args.next_int()?;
            let v = if wide { v as u64 } else { v as u32 as u64 };
            out.push_str(&v.to_string());
        }
        "x" => {
            let v = args.next_int()?;
            let v = if wide { v as u64 } else { v as u32 as u64 };
            out.push_str(&format!("{:x}", v));
        }
        "s" => match args.next_cstr()? {
            Some(s) => match precision {
                Some(prec) => out.extend(s.chars().take(prec)),
                None => out.push_str(&s),
            },
            None => out.push_str("(null)"),
        },
        "p" => {
            let ptr = args.next_pointer()?;
            out.push_str(&format!("0x{:x}", ptr.addr()));
        }
        "A" => {
            let value = next_value(ctx, args)?;
            out.push_str(&runtime.ascii(&value)?);
        }
        "U" => {
            let position = args.position();
            let value = next_value(ctx, args)?;
            out.push_str(expect_str(&value, position)?);
        }
        "V" => {
            let position = args.position();
            let obj = args.next_object()?;
            if obj.is_null() {
                match args.next_cstr()? {
                    Some(s) => out.push_str(&s),
                    None => out.push_str("(null)"),
                }
            } else {
                args.skip()?;
                let value = to_managed(ctx, obj)?;
                out.push_str(expect_str(&value, position)?);
            }
        }
        "S" => {
            let value = next_value(ctx, args)?;
            out.push_str(&runtime.str(&value)?);
        }
        "R" => {
            let value = next_value(ctx, args)?;
            out.push_str(&runtime.repr(&value)?);
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn next_value(ctx: &Context, args: &mut VaList) -> PyResult<Value> {
    let ptr = args.next_object()?;
    to_managed(ctx, ptr)
}

fn expect_str(value: &Value, position: usize) -> PyResult<&str> {
    value.as_str().ok_or_else(|| {
        PyException::system_error(format!(
            "Error when accessing variable argument at position {}",
            position
        ))
    })
}

/// `PyUnicode_FromFormatV`: the rendered string as a new reference, or
/// NULL with the error pending
pub fn unicode_from_format(
    ctx: &Context,
    runtime: &dyn ManagedRuntime,
    fmt: &str,
    args: &mut VaList,
) -> NativePtr {
    may_raise_ptr(ctx, || {
        let rendered = format(ctx, runtime, fmt, args)?;
        Ok(to_native(ctx, &Value::str(rendered), RefMode::New))
    })
}

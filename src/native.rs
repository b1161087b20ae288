//! Host functions installed in the global frame of every interpreter.

use std::io::Write;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use log::debug;

use crate::value::{LoxArray, NativeFunction, Value};

const MAX_ARRAY_LEN: usize = 1 << 24;

/// Every native, in definition order.
pub fn natives() -> Vec<NativeFunction> {
    vec![
        NativeFunction {
            name: "clock",
            arity: 0,
            func: clock,
        },
        NativeFunction {
            name: "sleep",
            arity: 1,
            func: sleep,
        },
        NativeFunction {
            name: "clear",
            arity: 0,
            func: clear,
        },
        NativeFunction {
            name: "Array",
            arity: 1,
            func: array,
        },
    ]
}

/// Seconds since the Unix epoch, with sub‑second precision.
fn clock(_args: &[Value], _out: &mut dyn Write) -> Result<Value, String> {
    let micros = Utc::now().timestamp_micros();

    Ok(Value::Number(micros as f64 / 1_000_000.0))
}

/// Block the (only) thread for the given number of milliseconds.
fn sleep(args: &[Value], _out: &mut dyn Write) -> Result<Value, String> {
    match args.first() {
        Some(Value::Number(ms)) if *ms >= 0.0 && ms.is_finite() => {
            debug!("Sleeping for {} ms", ms);

            thread::sleep(Duration::from_secs_f64(ms / 1000.0));
            Ok(Value::Bool(true))
        }
        _ => Err("sleep() expects a non-negative number of milliseconds.".to_string()),
    }
}

/// Clear the screen and home the cursor (ANSI).
fn clear(_args: &[Value], out: &mut dyn Write) -> Result<Value, String> {
    write!(out, "\x1B[2J\x1B[1;1H")
        .and_then(|_| out.flush())
        .map_err(|e| format!("clear() failed: {}", e))?;

    Ok(Value::Bool(true))
}

/// `Array(n)` for `n` nil slots, `Array(value)` for a one‑element array.
fn array(args: &[Value], _out: &mut dyn Write) -> Result<Value, String> {
    let array = match args.first() {
        Some(Value::Number(n)) => {
            if *n < 0.0 || n.fract() != 0.0 || !n.is_finite() {
                return Err("Array size must be a non-negative whole number.".to_string());
            }
            if *n > MAX_ARRAY_LEN as f64 {
                return Err(format!("Array size must not exceed {}.", MAX_ARRAY_LEN));
            }
            LoxArray::with_len(*n as usize)
        }
        Some(value) => LoxArray::with_value(value.clone()),
        None => LoxArray::with_len(0),
    };

    Ok(Value::Array(Rc::new(array)))
}

//! What the user sees: JSON on stdout, notifications on stderr.

use std::io::{self, Write};

use serde::Serialize;

use otadash_query::{Navigator, Toast, LOGIN_ROUTE};

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_json(&mut out, value)
}

pub fn write_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// One line per notification, e.g. `error: Network Error`.
pub fn write_toasts<W: Write>(out: &mut W, toasts: &[Toast]) -> io::Result<()> {
    for toast in toasts {
        writeln!(out, "{}: {}", toast.severity, toast.message)?;
    }
    Ok(())
}

/// Turns redirects into hints on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn redirect(&self, route: &str) {
        if route == LOGIN_ROUTE {
            eprintln!("Your session has expired. Sign in again with `otadash login`.");
        } else {
            eprintln!("See {}", route);
        }
    }
}

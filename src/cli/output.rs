//! Terminal output for sync progress and stored entities
//!
//! Colors follow NO_COLOR / CLICOLOR / CLICOLOR_FORCE via `colored`.
//! Diagnostics go to stderr, results to stdout.

use std::fmt::Display;

use colored::Colorize;

pub fn error(msg: &(impl Display + ?Sized)) {
    eprintln!("{}: {}", "error".red().bold(), msg);
}

pub fn warning(msg: &(impl Display + ?Sized)) {
    eprintln!("{}: {}", "Warning".yellow(), msg);
}

/// Node skipped together with its subtree.
pub fn skipped(path: &str, reason: &(impl Display + ?Sized)) {
    eprintln!("{} {} ({})", "skipped".yellow(), path.bold(), reason);
}

pub fn success(msg: &(impl Display + ?Sized)) {
    println!("{} {}", "✓".green(), msg);
}

/// Leaf written to the database, `verb` is `Saved` or `Updated`.
pub fn saved(verb: &str, title: &(impl Display + ?Sized)) {
    println!("{} {}", format!("{}:", verb).green(), title);
}

pub fn header(msg: &(impl Display + ?Sized)) {
    println!("{}", msg.to_string().cyan().bold());
}

/// Aligned `label  value` line of a record or summary.
pub fn field(label: &str, value: &(impl Display + ?Sized)) {
    let label = format!("{:<14}", format!("{}:", label));
    println!("  {}{}", label.dimmed(), value);
}

/// Summary counter, red when it counts failures and is non-zero.
pub fn counter(label: &str, n: usize, is_failure: bool) {
    let value = if is_failure && n > 0 {
        n.to_string().red().bold()
    } else {
        n.to_string().normal()
    };
    field(label, &value);
}

pub fn detail(msg: &(impl Display + ?Sized)) {
    println!("  {}", msg);
}

pub fn info(msg: &(impl Display + ?Sized)) {
    println!("{}", msg);
}

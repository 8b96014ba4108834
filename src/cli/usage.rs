//! Usage banners and help text in the argparse layout, wrapped to the
//! terminal width.
//!
//! The parts are taken from the clap command definition, so the banner
//! always matches the arguments the parser accepts.
use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{Arg, ArgAction, Command};

const DEFAULT_COLUMNS: usize = 80;
const PREFIX: &str = "usage: ";
const HELP_POSITION: usize = 24;

fn width_from_columns(columns: Option<&str>) -> usize {
    columns
        .and_then(|c| c.trim().parse::<usize>().ok())
        .filter(|c| *c > 0)
        .unwrap_or(DEFAULT_COLUMNS)
        .saturating_sub(2)
}

/// Wrapping width: the `COLUMNS` environment variable (80 when unset or
/// invalid) less a margin of 2
pub fn text_width() -> usize {
    width_from_columns(std::env::var("COLUMNS").ok().as_deref())
}

fn metavar(arg: &Arg) -> String {
    arg.get_value_names()
        .and_then(|names| names.first())
        .map(|name| name.to_string())
        .unwrap_or_else(|| arg.get_id().as_str().to_uppercase())
}

fn option_string(arg: &Arg) -> String {
    match (arg.get_short(), arg.get_long()) {
        (Some(short), _) => format!("-{}", short),
        (None, Some(long)) => format!("--{}", long),
        (None, None) => arg.get_id().as_str().to_string(),
    }
}

fn takes_values(arg: &Arg) -> bool {
    arg.get_action().takes_values()
}

fn is_multiple(arg: &Arg) -> bool {
    matches!(arg.get_action(), ArgAction::Append)
        || arg.get_num_args().is_some_and(|range| range.max_values() > 1)
}

fn built(cmd: &Command) -> Command {
    let mut cmd = cmd.clone();
    cmd.build();
    cmd
}

/// Optional and positional usage parts, each unsplittable when wrapping
pub fn usage_parts(cmd: &Command) -> (Vec<String>, Vec<String>) {
    let cmd = built(cmd);
    let mut optionals = Vec::new();
    let mut positionals = Vec::new();
    for arg in cmd.get_arguments().filter(|a| !a.is_hide_set()) {
        if arg.is_positional() {
            let name = metavar(arg);
            match (arg.is_required_set(), is_multiple(arg)) {
                (true, false) => positionals.push(name),
                (true, true) => {
                    positionals.push(name.clone());
                    positionals.push(format!("[{} ...]", name));
                }
                (false, false) => positionals.push(format!("[{}]", name)),
                (false, true) => positionals.push(format!("[{} ...]", name)),
            }
        } else {
            let mut part = option_string(arg);
            if takes_values(arg) {
                part = format!("{} {}", part, metavar(arg));
            }
            if !arg.is_required_set() {
                part = format!("[{}]", part);
            }
            optionals.push(part);
        }
    }
    (optionals, positionals)
}

/// Greedy line filling. Continuation lines start with `indent` spaces; the
/// first line is measured from the end of `prefix` when one is given.
fn get_lines(parts: &[String], indent: usize, prefix: Option<&str>, width: usize) -> Vec<String> {
    let pad = " ".repeat(indent);
    let mut lines = Vec::new();
    let mut line: Vec<&str> = Vec::new();
    let mut line_len = match prefix {
        Some(p) => p.len().saturating_sub(1),
        None => indent.saturating_sub(1),
    };
    for part in parts {
        if line_len + 1 + part.len() > width && !line.is_empty() {
            lines.push(format!("{}{}", pad, line.join(" ")));
            line.clear();
            line_len = indent.saturating_sub(1);
        }
        line.push(part);
        line_len += part.len() + 1;
    }
    if !line.is_empty() {
        lines.push(format!("{}{}", pad, line.join(" ")));
    }
    if prefix.is_some() {
        if let Some(first) = lines.first_mut() {
            *first = first[indent..].to_string();
        }
    }
    lines
}

/// `usage: prog [optionals] positionals`, wrapped to `width`
pub fn format_usage(prog: &str, optionals: &[String], positionals: &[String], width: usize) -> String {
    let one_line = std::iter::once(prog.to_string())
        .chain(optionals.iter().cloned())
        .chain(positionals.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ");
    if PREFIX.len() + one_line.len() <= width {
        return format!("{}{}", PREFIX, one_line);
    }

    let lines = if (PREFIX.len() + prog.len()) as f64 <= 0.75 * width as f64 {
        let indent = PREFIX.len() + prog.len() + 1;
        let head: Vec<String> = std::iter::once(prog.to_string())
            .chain(if optionals.is_empty() { positionals } else { optionals }.iter().cloned())
            .collect();
        let mut lines = get_lines(&head, indent, Some(PREFIX), width);
        if !optionals.is_empty() {
            lines.extend(get_lines(positionals, indent, None, width));
        }
        lines
    } else {
        let indent = PREFIX.len();
        let all: Vec<String> = optionals.iter().chain(positionals).cloned().collect();
        let mut lines = get_lines(&all, indent, None, width);
        if lines.len() > 1 {
            lines = get_lines(optionals, indent, None, width);
            lines.extend(get_lines(positionals, indent, None, width));
        }
        std::iter::once(prog.to_string()).chain(lines).collect()
    };
    format!("{}{}", PREFIX, lines.join("\n"))
}

/// Usage banner for a tool command, wrapped to `width`
pub fn usage_banner(cmd: &Command, width: usize) -> String {
    let (optionals, positionals) = usage_parts(cmd);
    format_usage(cmd.get_name(), &optionals, &positionals, width)
}

fn invocation(arg: &Arg) -> String {
    if arg.is_positional() {
        return metavar(arg);
    }
    let mut flags = Vec::new();
    if let Some(short) = arg.get_short() {
        flags.push(format!("-{}", short));
    }
    if let Some(long) = arg.get_long() {
        flags.push(format!("--{}", long));
    }
    let mut text = flags.join(", ");
    if takes_values(arg) {
        text = format!("{} {}", text, metavar(arg));
    }
    text
}

fn help_entry(arg: &Arg) -> String {
    let name = invocation(arg);
    let help = arg.get_help().map(|h| h.to_string()).unwrap_or_default();
    if help.is_empty() {
        format!("  {}\n", name)
    } else if name.len() + 4 <= HELP_POSITION {
        format!("  {:<width$}{}\n", name, help, width = HELP_POSITION - 2)
    } else {
        format!("  {}\n{}{}\n", name, " ".repeat(HELP_POSITION), help)
    }
}

/// Full help: banner, description and one entry per argument
pub fn help_text(cmd: &Command, width: usize) -> String {
    let built = built(cmd);
    let mut out = usage_banner(&built, width);
    out.push_str("\n\n");
    if let Some(about) = built.get_about() {
        out.push_str(&format!("{}\n\n", about));
    }
    let (positionals, optionals): (Vec<&Arg>, Vec<&Arg>) = built
        .get_arguments()
        .filter(|a| !a.is_hide_set())
        .partition(|a| a.is_positional());
    if !positionals.is_empty() {
        out.push_str("positional arguments:\n");
        positionals.iter().for_each(|a| out.push_str(&help_entry(a)));
    }
    if !optionals.is_empty() {
        if !positionals.is_empty() {
            out.push('\n');
        }
        out.push_str("optional arguments:\n");
        optionals.iter().for_each(|a| out.push_str(&help_entry(a)));
    }
    out
}

// Clap renders missing arguments as `<NAME>`, `<NAME>...` or `--flag <VALUE>`
fn argparse_name(rendered: &str) -> String {
    let token = rendered.split_whitespace().next().unwrap_or(rendered);
    token
        .trim_end_matches("...")
        .trim_start_matches('<')
        .trim_end_matches('>')
        .to_string()
}

/// One-line description of a parse failure, worded the way argparse words it
pub fn error_message(err: &clap::Error) -> String {
    match (err.kind(), err.get(ContextKind::InvalidArg)) {
        (ErrorKind::MissingRequiredArgument, Some(ContextValue::Strings(names))) => {
            let names: Vec<String> = names.iter().map(|n| argparse_name(n)).collect();
            format!("the following arguments are required: {}", names.join(", "))
        }
        (ErrorKind::UnknownArgument, Some(ContextValue::String(arg))) => {
            format!("unrecognized arguments: {}", arg)
        }
        _ => {
            let rendered = err.render().to_string();
            let first = rendered.lines().next().unwrap_or_default();
            first.trim_start_matches("error: ").to_string()
        }
    }
}

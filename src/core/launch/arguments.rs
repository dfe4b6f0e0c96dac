// ─── Argument templates ───
// `${token}` substitution for JVM and game argument templates.

use std::collections::HashMap;

/// Values for `${token}` placeholders.
#[derive(Debug, Clone, Default)]
pub struct ArgumentValues {
    values: HashMap<&'static str, String>,
}

impl ArgumentValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, token: &'static str, value: impl Into<String>) -> &mut Self {
        self.values.insert(token, value.into());
        self
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.values.get(token).map(String::as_str)
    }

    /// Replace every placeholder in `arg`; `None` when any of them is unknown.
    pub fn resolve(&self, arg: &str) -> Option<String> {
        let mut out = String::with_capacity(arg.len());
        let mut rest = arg;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find('}')?;
            out.push_str(self.get(&after[..end])?);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Some(out)
    }

    /// Resolve a whole template.
    ///
    /// Arguments with an unknown placeholder are dropped. When the dropped
    /// argument is a bare value, the option right before it goes too so no
    /// flag is left without its value.
    pub fn substitute(&self, template: &[String]) -> Vec<String> {
        let mut resolved = Vec::with_capacity(template.len());
        for arg in template {
            match self.resolve(arg) {
                Some(value) => resolved.push(value),
                None => {
                    if !arg.starts_with('-') {
                        drop_dangling_option(&mut resolved);
                    }
                }
            }
        }
        resolved
    }
}

fn drop_dangling_option(args: &mut Vec<String>) {
    if args.last().is_some_and(|last| last.starts_with('-')) {
        let _ = args.pop();
    }
}

/// Remove `flag <value>` pairs and `flag=value` forms from `args`.
pub fn strip_option(args: &mut Vec<String>, flags: &[&str]) {
    let mut kept = Vec::with_capacity(args.len());
    let mut iter = std::mem::take(args).into_iter();
    while let Some(arg) = iter.next() {
        if flags.contains(&arg.as_str()) {
            let _ = iter.next();
            continue;
        }
        if flags
            .iter()
            .any(|flag| arg.starts_with(&format!("{flag}=")))
        {
            continue;
        }
        kept.push(arg);
    }
    *args = kept;
}

/// Drop every `-D<property>=...` for the given properties.
pub fn strip_system_properties(args: &mut Vec<String>, properties: &[&str]) {
    args.retain(|arg| {
        !properties
            .iter()
            .any(|prop| arg.starts_with(&format!("-D{prop}=")))
    });
}

pub fn contains_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|arg| arg == flag)
}

/// Append `flag value` unless the pair (or `flag=value`) is already there.
pub fn ensure_arg_pair(args: &mut Vec<String>, flag: &str, value: &str) {
    let combined = format!("{}={}", flag, value);
    if args.iter().any(|arg| arg == &combined) {
        return;
    }
    if args.windows(2).any(|w| w[0] == flag && w[1] == value) {
        return;
    }
    args.push(flag.to_string());
    args.push(value.to_string());
}

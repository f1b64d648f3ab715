//! Environment and home-directory expansion for launcher arguments.
//!
//! Launch command lines arrive from scripts that reference `$VAR` paths
//! and `~`-relative log files; the emulator binaries themselves perform
//! no expansion, so it happens here before the child is spawned.

/// Expand `$VAR` and `${VAR}` references against the process
/// environment. References to unset variables are left untouched.
pub fn expand_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('{') => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                match std::env::var(&name) {
                    Ok(val) if closed => out.push_str(&val),
                    _ => {
                        out.push_str("${");
                        out.push_str(&name);
                        if closed {
                            out.push('}');
                        }
                    }
                }
            }
            Some(&c) if c.is_ascii_alphanumeric() || c == '_' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match std::env::var(&name) {
                    Ok(val) => out.push_str(&val),
                    Err(_) => {
                        out.push('$');
                        out.push_str(&name);
                    }
                }
            }
            _ => out.push('$'),
        }
    }
    out
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> String {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home.display().to_string();
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).display().to_string();
        }
    }
    path.to_string()
}

/// Rewrite the path value of any `--ingress-log=PATH` or
/// `--egress-log=PATH` argument with home expansion applied. Other
/// arguments pass through untouched.
pub fn rewrite_log_paths(args: &mut [String]) {
    for arg in args.iter_mut() {
        if arg.contains("--ingress-log") || arg.contains("--egress-log") {
            if let Some((flag, path)) = arg.split_once('=') {
                *arg = format!("{}={}", flag, expand_home(path));
            }
        }
    }
}

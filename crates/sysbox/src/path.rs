//! Lexical path resolution for the virtual filesystem.
//!
//! Resolution is purely textual: no store lookups, no existence checks.
//! The interpreter resolves every user-supplied path through [`resolve`]
//! before touching the store, so the store only ever sees normalized
//! absolute paths.

/// Resolve `input` against the current working directory `cwd`.
///
/// Absolute inputs (leading `/`) ignore `cwd`; relative inputs are joined
/// onto it. Repeated separators collapse, `.` segments drop, and `..`
/// segments pop (never above the root). The result never carries a trailing
/// separator except for the root itself.
///
/// Idempotent: resolving an already-absolute normalized path is a no-op.
pub fn resolve(cwd: &str, input: &str) -> String {
    let joined = if input.starts_with('/') {
        input.to_string()
    } else {
        format!("{}/{}", cwd, input)
    };

    let mut segments: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Parent directory of a normalized absolute path. The root is its own parent.
pub fn parent(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

/// Final path segment of a normalized absolute path.
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_input_ignores_cwd() {
        assert_eq!(resolve("/system/root", "/etc/conf"), "/etc/conf");
    }

    #[test]
    fn relative_input_joins_cwd() {
        assert_eq!(resolve("/system/root", "modules/fs"), "/system/root/modules/fs");
    }

    #[test]
    fn dot_and_dotdot_segments() {
        assert_eq!(resolve("/system/root", "./modules/../tmp"), "/system/root/tmp");
        assert_eq!(resolve("/system/root", ".."), "/system");
        assert_eq!(resolve("/", "../.."), "/");
    }

    #[test]
    fn collapses_repeated_separators_and_trailing_slash() {
        assert_eq!(resolve("/system//root", "tmp///"), "/system/root/tmp");
        assert_eq!(resolve("/", "/"), "/");
    }

    #[test]
    fn idempotent_on_absolute_paths() {
        let once = resolve("/system/root", "modules/fs");
        assert_eq!(resolve("/system/root", &once), once);
    }

    #[test]
    fn parent_and_basename() {
        assert_eq!(parent("/system/root/readme.txt"), "/system/root");
        assert_eq!(parent("/system"), "/");
        assert_eq!(parent("/"), "/");
        assert_eq!(basename("/system/root/readme.txt"), "readme.txt");
    }
}

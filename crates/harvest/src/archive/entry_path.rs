use std::path::{Component, Path, PathBuf};

/// Resolves an archive entry name against `base`, returning `None` when the
/// entry would land outside of it (zip-slip), is absolute, or names nothing.
///
/// Backslashes are treated as separators so Windows-style names cannot smuggle
/// `..\` past the check on Unix.
pub fn contained_path(base: &Path, entry_name: &str) -> Option<PathBuf> {
    let normalized_name = entry_name.replace('\\', "/");
    let entry = Path::new(&normalized_name);

    let mut relative = PathBuf::new();
    let mut depth = 0usize;

    for component in entry.components() {
        match component {
            Component::Normal(part) => {
                relative.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                relative.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if depth == 0 {
        return None;
    }

    // Drive letters such as `C:` survive as a Normal component on Unix
    if relative
        .components()
        .next()
        .and_then(|c| c.as_os_str().to_str())
        .is_some_and(|first| first.ends_with(':'))
    {
        return None;
    }

    let resolved = base.join(relative);
    resolved.starts_with(base).then_some(resolved)
}

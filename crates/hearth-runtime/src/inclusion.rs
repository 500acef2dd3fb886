//! Script inclusion resolution
//!
//! Maps an inclusion path to a compiled unit of the application. Resolution
//! is purely lexical: the filesystem is never consulted, only the script
//! table. Paths with a `scheme://` prefix are handed to the scheme handler
//! registered for that scheme.

use crate::context::RunContext;
use crate::descriptor::CompiledUnit;
use crate::registry::ScriptTable;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Plug-in resolving `scheme://...` inclusions
pub trait SchemeHandler: Send + Sync {
    /// Resolve `path` (scheme prefix removed) to a registered unit
    fn resolve_script(
        &self,
        ctx: &RunContext,
        current_dir: Option<&str>,
        path: &str,
    ) -> Option<Arc<CompiledUnit>>;
}

impl<F> SchemeHandler for F
where
    F: Fn(&RunContext, Option<&str>, &str) -> Option<Arc<CompiledUnit>> + Send + Sync,
{
    fn resolve_script(
        &self,
        ctx: &RunContext,
        current_dir: Option<&str>,
        path: &str,
    ) -> Option<Arc<CompiledUnit>> {
        self(ctx, current_dir, path)
    }
}

/// Split `scheme://rest` into `(scheme, rest)`
pub fn split_scheme(path: &str) -> Option<(&str, &str)> {
    let pos = path.find("://")?;
    let scheme = &path[..pos];
    // single letters are drive names, not schemes
    let valid = scheme.len() > 1
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then(|| (scheme, &path[pos + 3..]))
}

fn segments(path: &str) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            s => out.push(s),
        }
    }
    out
}

/// Lexically normalize a path to `a/b/c` form.
///
/// Both `/` and `\` separate segments, `.` is dropped, `..` pops a segment
/// (never above the start) and leading separators are removed.
pub fn normalize_path(path: &str) -> String {
    segments(path).join("/")
}

fn is_absolute(path: &str) -> bool {
    if path.starts_with(['/', '\\']) {
        return true;
    }
    let bytes = path.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && matches!(bytes[2], b'/' | b'\\')
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Directory settings used to resolve relative inclusions
#[derive(Debug, Clone, Default)]
pub struct InclusionResolver {
    root: String,
    include_paths: Vec<String>,
    working_dir: String,
}

impl InclusionResolver {
    /// Create a resolver.
    ///
    /// Relative `include_paths` entries are taken relative to `working_dir`;
    /// a relative `working_dir` is taken relative to `root`.
    pub fn new(root: &Path, include_paths: &[PathBuf], working_dir: &Path) -> Self {
        let root = path_str(root);
        let working_dir = path_str(working_dir);
        let working_dir = if is_absolute(&working_dir) {
            working_dir
        } else {
            format!("{}/{}", root, working_dir)
        };
        let include_paths = include_paths
            .iter()
            .map(|p| {
                let p = path_str(p);
                if is_absolute(&p) {
                    p
                } else {
                    format!("{}/{}", working_dir, p)
                }
            })
            .collect();

        Self {
            root,
            include_paths,
            working_dir,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn working_dir(&self) -> &str {
        &self.working_dir
    }

    /// Root-relative form of an absolute path, if it lies under the root
    pub fn relative_to_root(&self, absolute: &str) -> Option<String> {
        let root = segments(&self.root);
        let target = segments(absolute);
        if target.len() < root.len() || !target.iter().zip(&root).all(|(a, b)| a == b) {
            return None;
        }
        Some(target[root.len()..].join("/"))
    }

    /// Resolve a non-scheme path against the script table.
    ///
    /// `current_dir` is the including script's directory, absolute or
    /// relative to the root. Relative paths are tried against it, then each
    /// include path, then the working directory.
    pub fn resolve(
        &self,
        table: &ScriptTable,
        path: &str,
        current_dir: Option<&str>,
    ) -> Option<Arc<CompiledUnit>> {
        if is_absolute(path) {
            return self
                .relative_to_root(path)
                .and_then(|relative| table.lookup(&relative));
        }

        let current = current_dir.map(|dir| {
            if is_absolute(dir) {
                dir.to_string()
            } else {
                format!("{}/{}", self.root, dir)
            }
        });

        current
            .iter()
            .chain(self.include_paths.iter())
            .chain(std::iter::once(&self.working_dir))
            .find_map(|base| {
                self.relative_to_root(&format!("{}/{}", base, path))
                    .and_then(|relative| table.lookup(&relative))
            })
    }

    /// Filesystem location a path would have, used for the raw-file fallback
    pub fn physical_path(&self, path: &str, current_dir: Option<&str>) -> PathBuf {
        if is_absolute(path) {
            return PathBuf::from(path);
        }
        let base = match current_dir {
            Some(dir) if is_absolute(dir) => dir.to_string(),
            Some(dir) => format!("{}/{}", self.root, dir),
            None => self.working_dir.clone(),
        };
        Path::new(&base).join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::MainFn;
    use crate::value::Value;
    use rstest::rstest;

    fn table(paths: &[&str]) -> ScriptTable {
        let mut table = ScriptTable::new();
        for path in paths {
            let main: MainFn = Arc::new(|_, _| Ok(Value::Null));
            table.declare(path, main).unwrap();
        }
        table
    }

    fn resolver() -> InclusionResolver {
        InclusionResolver::new(
            Path::new("/srv/app"),
            &[PathBuf::from("lib"), PathBuf::from("/srv/app/vendor")],
            Path::new("/srv/app"),
        )
    }

    #[rstest]
    #[case("a/b/c.ext", "a/b/c.ext")]
    #[case("./a//b/./c.ext", "a/b/c.ext")]
    #[case("a\\b\\c.ext", "a/b/c.ext")]
    #[case("a/../b.ext", "b.ext")]
    #[case("../../b.ext", "b.ext")]
    #[case("/x/y/", "x/y")]
    fn test_normalize_path(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_path(input), expected);
    }

    #[rstest]
    #[case("phar://archive/x.ext", Some(("phar", "archive/x.ext")))]
    #[case("app+res://x", Some(("app+res", "x")))]
    #[case("C://x", None)]
    #[case("plain/x.ext", None)]
    #[case("://x", None)]
    fn test_split_scheme(#[case] input: &str, #[case] expected: Option<(&str, &str)>) {
        assert_eq!(split_scheme(input), expected);
    }

    #[test]
    fn test_absolute_path_resolves_under_root() {
        let table = table(&["index.ext"]);
        let r = resolver();

        assert!(r.resolve(&table, "/srv/app/index.ext", None).is_some());
        assert!(r.resolve(&table, "/srv/app/sub/../index.ext", None).is_some());
        assert!(r.resolve(&table, "/etc/index.ext", None).is_none());
    }

    #[test]
    fn test_current_dir_wins_over_include_paths() {
        let table = table(&["pages/util.ext", "lib/util.ext"]);
        let r = resolver();

        let unit = r.resolve(&table, "util.ext", Some("pages")).unwrap();
        assert_eq!(unit.path(), "pages/util.ext");

        let unit = r.resolve(&table, "util.ext", Some("other")).unwrap();
        assert_eq!(unit.path(), "lib/util.ext");
    }

    #[test]
    fn test_include_paths_in_order_then_working_dir() {
        let table = table(&["vendor/pkg.ext", "top.ext"]);
        let r = resolver();

        assert_eq!(r.resolve(&table, "pkg.ext", None).unwrap().path(), "vendor/pkg.ext");
        assert_eq!(r.resolve(&table, "top.ext", None).unwrap().path(), "top.ext");
        assert!(r.resolve(&table, "missing.ext", None).is_none());
    }

    #[test]
    fn test_dot_relative_and_bare_resolve_to_same_unit() {
        let table = table(&["x.ext"]);
        let r = resolver();

        let a = r.resolve(&table, "./x.ext", Some("")).unwrap();
        let b = r.resolve(&table, "x.ext", Some("")).unwrap();
        assert_eq!(a.index(), b.index());
    }

    #[test]
    fn test_physical_path() {
        let r = resolver();
        assert_eq!(r.physical_path("a.txt", Some("pages")), PathBuf::from("/srv/app/pages/a.txt"));
        assert_eq!(r.physical_path("a.txt", None), PathBuf::from("/srv/app/a.txt"));
        assert_eq!(r.physical_path("/tmp/a.txt", None), PathBuf::from("/tmp/a.txt"));
    }
}

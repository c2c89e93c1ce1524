//! The host supplies every byte webrashader reads. Preset, shader and lookup
//! texture paths are plain `/`-separated strings that are joined and
//! normalized here, then handed back to the host's [`Resolver`].

use rustc_hash::FxHashMap;

/// Retrieves the contents of a file referenced by a preset or shader.
///
/// Any `FnMut(&str) -> Option<Vec<u8>>` closure is a resolver.
pub trait Resolver {
    /// Read the raw bytes at `path`, or `None` if it does not exist.
    fn read_bytes(&mut self, path: &str) -> Option<Vec<u8>>;

    /// Read the file at `path` as UTF-8 text.
    ///
    /// Invalid UTF-8 is replaced rather than rejected, shader sources are
    /// ASCII in practice and a stray byte in a comment should not fail a load.
    fn read_text(&mut self, path: &str) -> Option<String> {
        let bytes = self.read_bytes(path)?;
        Some(String::from_utf8(bytes).unwrap_or_else(|e| {
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }))
    }
}

impl<F> Resolver for F
where
    F: FnMut(&str) -> Option<Vec<u8>>,
{
    fn read_bytes(&mut self, path: &str) -> Option<Vec<u8>> {
        self(path)
    }
}

/// A resolver over files held in memory, keyed by normalized path.
#[derive(Debug, Default, Clone)]
pub struct MemoryResolver {
    files: FxHashMap<String, Vec<u8>>,
}

impl MemoryResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, replacing any previous contents at the same path.
    pub fn insert(&mut self, path: &str, contents: impl Into<Vec<u8>>) -> &mut Self {
        self.files.insert(normalize(path), contents.into());
        self
    }

    /// Builder form of [`MemoryResolver::insert`].
    pub fn with(mut self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }
}

impl Resolver for MemoryResolver {
    fn read_bytes(&mut self, path: &str) -> Option<Vec<u8>> {
        self.files.get(&normalize(path)).cloned()
    }
}

/// The directory part of `path`, without a trailing separator.
///
/// Returns an empty string for a bare file name.
pub fn parent(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Resolve `relative` against the directory containing `base_file`.
///
/// Absolute paths (leading `/` or a `scheme:` prefix) are returned as-is.
pub fn join_relative(base_file: &str, relative: &str) -> String {
    let relative = relative.trim();
    if has_scheme(relative) {
        return relative.to_string();
    }
    if relative.starts_with('/') {
        return normalize(relative);
    }
    let dir = parent(base_file);
    if dir.is_empty() {
        normalize(relative)
    } else {
        normalize(&format!("{dir}/{relative}"))
    }
}

fn has_scheme(path: &str) -> bool {
    match path.find(':') {
        Some(idx) => path[..idx].chars().all(|c| c.is_ascii_alphanumeric()) && idx > 1,
        None => false,
    }
}

/// Collapse `.` and `..` segments and unify separators to `/`.
///
/// Leading `..` segments that cannot be collapsed are kept.
pub fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            segment => segments.push(segment),
        }
    }
    let joined = segments.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn joins_relative_paths() {
        assert_eq!(
            join_relative("presets/crt/crt.slangp", "../../shaders/crt.slang"),
            "shaders/crt.slang"
        );
        assert_eq!(join_relative("crt.slangp", "shaders/a.slang"), "shaders/a.slang");
        assert_eq!(join_relative("a/b.slangp", "../../x.slang"), "../x.slang");
        assert_eq!(join_relative("a/b.slangp", "/abs/x.slang"), "/abs/x.slang");
        assert_eq!(
            join_relative("a/b.slangp", "https://cdn/x.slang"),
            "https://cdn/x.slang"
        );
    }

    #[test]
    fn memory_resolver_normalizes() {
        let mut resolver = MemoryResolver::new().with("shaders/./a.slang", "abc");
        assert_eq!(
            resolver.read_text("shaders/x/../a.slang").as_deref(),
            Some("abc")
        );
        assert_eq!(resolver.read_text("missing"), None);
    }

    #[test]
    fn closures_are_resolvers() {
        let mut resolver = |path: &str| (path == "a").then(|| b"hi".to_vec());
        assert_eq!(resolver.read_text("a").as_deref(), Some("hi"));
    }
}

//! Module Loader & VFS (spec.md §4.H): a small layered filesystem
//! abstraction for the Script VM's `load()`, with a caching layer and cycle
//! detection via import-stack membership.
//!
//! Grounded on `fetch.rs` (`ureq::get`, relative-URL resolution idiom) for
//! the remote layer, and `pkg/larker/fs/*`'s `dummy`/`local`/`github`/
//! `caching` naming for the trait split.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{CompileError, Result};

/// A source of script text, keyed by a path-like string. Implementations are
/// `Send` so a [`crate::vm::ScriptHost`] can hand one to a worker thread.
pub trait FileSystem: Send + Sync {
    fn stat(&self, path: &str) -> bool;
    fn get(&self, path: &str) -> Result<String>;
    fn join(&self, base: &str, relative: &str) -> String;
    fn list(&self, path: &str) -> Result<Vec<String>>;
    fn clone_box(&self) -> Box<dyn FileSystem>;
}

/// Always reports "not found" — used when no `load()` support is wired up
/// (the default `Larker::New` layer in the teacher's original).
#[derive(Debug, Clone, Default)]
pub struct DummyFs;

impl DummyFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for DummyFs {
    fn stat(&self, _path: &str) -> bool {
        false
    }

    fn get(&self, path: &str) -> Result<String> {
        Err(CompileError::NotFound(path.to_string()))
    }

    fn join(&self, base: &str, relative: &str) -> String {
        join_paths(base, relative)
    }

    fn list(&self, _path: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn clone_box(&self) -> Box<dyn FileSystem> {
        Box::new(self.clone())
    }
}

/// Serves script files from a local directory root.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl FileSystem for LocalFs {
    fn stat(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn get(&self, path: &str) -> Result<String> {
        std::fs::read_to_string(self.resolve(path))
            .map_err(|_| CompileError::NotFound(path.to_string()))
    }

    fn join(&self, base: &str, relative: &str) -> String {
        join_paths(base, relative)
    }

    fn list(&self, path: &str) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(self.resolve(path))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn clone_box(&self) -> Box<dyn FileSystem> {
        Box::new(self.clone())
    }
}

/// Fetches script files from `github.com/<owner>/<repo>/<path>`-style
/// references over HTTPS. Grounded on `fetch.rs`'s `ureq::get` usage.
#[derive(Debug, Clone)]
pub struct GithubFs {
    token: Option<String>,
}

impl GithubFs {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }

    fn raw_url(&self, path: &str) -> String {
        let trimmed = path.trim_start_matches("github.com/");
        let mut parts = trimmed.splitn(3, '/');
        let owner = parts.next().unwrap_or_default();
        let repo = parts.next().unwrap_or_default();
        let rest = parts.next().unwrap_or_default();
        format!("https://raw.githubusercontent.com/{owner}/{repo}/main/{rest}")
    }
}

impl FileSystem for GithubFs {
    fn stat(&self, path: &str) -> bool {
        self.get(path).is_ok()
    }

    fn get(&self, path: &str) -> Result<String> {
        let url = self.raw_url(path);
        let mut request = ureq::get(&url);
        if let Some(token) = &self.token {
            request = request.header("Authorization", &format!("token {token}"));
        }
        request
            .call()
            .map_err(|e| CompileError::LoadFailed(format!("fetching '{path}': {e}")))?
            .into_body()
            .read_to_string()
            .map_err(|e| CompileError::LoadFailed(format!("reading '{path}': {e}")))
    }

    fn join(&self, base: &str, relative: &str) -> String {
        join_paths(base, relative)
    }

    fn list(&self, path: &str) -> Result<Vec<String>> {
        Err(CompileError::LoadFailed(format!(
            "listing directories is not supported over the remote layer (path '{path}')"
        )))
    }

    fn clone_box(&self) -> Box<dyn FileSystem> {
        Box::new(self.clone())
    }
}

/// Write-once-per-key cache in front of another [`FileSystem`]: the first
/// successful read for a given path wins and is never re-fetched, matching
/// spec.md §5's "write-once-per-key VFS cache with first-reader-wins
/// collapse".
#[derive(Clone)]
pub struct CachingFs {
    inner: Arc<dyn FileSystem>,
    cache: Arc<Mutex<HashMap<String, String>>>,
}

impl CachingFs {
    pub fn wrap(inner: Box<dyn FileSystem>) -> Self {
        Self { inner: Arc::from(inner), cache: Arc::new(Mutex::new(HashMap::new())) }
    }
}

impl FileSystem for CachingFs {
    fn stat(&self, path: &str) -> bool {
        if self.cache.lock().expect("cache lock poisoned").contains_key(path) {
            return true;
        }
        self.inner.stat(path)
    }

    fn get(&self, path: &str) -> Result<String> {
        if let Some(cached) = self.cache.lock().expect("cache lock poisoned").get(path) {
            return Ok(cached.clone());
        }
        let content = self.inner.get(path)?;
        let mut cache = self.cache.lock().expect("cache lock poisoned");
        Ok(cache.entry(path.to_string()).or_insert(content).clone())
    }

    fn join(&self, base: &str, relative: &str) -> String {
        self.inner.join(base, relative)
    }

    fn list(&self, path: &str) -> Result<Vec<String>> {
        self.inner.list(path)
    }

    fn clone_box(&self) -> Box<dyn FileSystem> {
        Box::new(self.clone())
    }
}

fn join_paths(base: &str, relative: &str) -> String {
    if relative.starts_with('/') || relative.starts_with("github.com/") {
        return relative.to_string();
    }
    let base_dir = Path::new(base).parent().unwrap_or_else(|| Path::new(""));
    base_dir.join(relative).to_string_lossy().replace('\\', "/")
}

/// Resolves `load()` calls against a [`FileSystem`], tracking the current
/// import stack so cyclic imports raise [`CompileError::LoadCycle`] instead
/// of recursing forever (spec.md §9's "cyclic import via stack membership"
/// design note).
pub struct ModuleLoader {
    fs: Box<dyn FileSystem>,
    stack: Vec<String>,
}

impl ModuleLoader {
    pub fn new(fs: Box<dyn FileSystem>) -> Self {
        Self { fs, stack: Vec::new() }
    }

    pub fn load(&mut self, path: &str) -> Result<String> {
        if self.stack.iter().any(|p| p == path) {
            return Err(CompileError::LoadCycle(format!(
                "{} -> {path}",
                self.stack.join(" -> ")
            )));
        }
        self.stack.push(path.to_string());
        let content = self.fs.get(path);
        self.stack.pop();
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_fs_reports_not_found() {
        let fs = DummyFs::new();
        assert!(!fs.stat("x.star"));
        assert!(matches!(fs.get("x.star"), Err(CompileError::NotFound(_))));
    }

    #[test]
    fn caching_fs_first_reader_wins() {
        #[derive(Clone)]
        struct CountingFs(Arc<Mutex<usize>>);
        impl FileSystem for CountingFs {
            fn stat(&self, _path: &str) -> bool {
                true
            }
            fn get(&self, _path: &str) -> Result<String> {
                *self.0.lock().unwrap() += 1;
                Ok("content".to_string())
            }
            fn join(&self, base: &str, relative: &str) -> String {
                join_paths(base, relative)
            }
            fn list(&self, _path: &str) -> Result<Vec<String>> {
                Ok(Vec::new())
            }
            fn clone_box(&self) -> Box<dyn FileSystem> {
                Box::new(self.clone())
            }
        }

        let calls = Arc::new(Mutex::new(0));
        let fs = CachingFs::wrap(Box::new(CountingFs(calls.clone())));
        fs.get("a.star").unwrap();
        fs.get("a.star").unwrap();
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn module_loader_detects_cycles() {
        struct SelfReferencing;
        impl FileSystem for SelfReferencing {
            fn stat(&self, _path: &str) -> bool {
                true
            }
            fn get(&self, path: &str) -> Result<String> {
                Ok(format!("load('{path}')"))
            }
            fn join(&self, base: &str, relative: &str) -> String {
                join_paths(base, relative)
            }
            fn list(&self, _path: &str) -> Result<Vec<String>> {
                Ok(Vec::new())
            }
            fn clone_box(&self) -> Box<dyn FileSystem> {
                Box::new(SelfReferencing)
            }
        }
        let mut loader = ModuleLoader::new(Box::new(SelfReferencing));
        loader.stack.push("a.star".to_string());
        let err = loader.load("a.star").unwrap_err();
        assert!(matches!(err, CompileError::LoadCycle(_)));
    }

    #[test]
    fn join_paths_is_relative_to_base_directory() {
        assert_eq!(join_paths("a/b.star", "c.star"), "a/c.star");
        assert_eq!(join_paths("a/b.star", "github.com/x/y/z.star"), "github.com/x/y/z.star");
    }
}

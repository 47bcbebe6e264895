//! Path and content heuristics that keep extraction to source text.

use pipeline_core::ExtractedFile;

/// Directories holding build output, dependencies or VCS metadata.
const DEFAULT_EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "bower_components",
    "vendor",
    "target",
    "dist",
    "build",
    "out",
    ".next",
    ".nuxt",
    "__pycache__",
    ".venv",
    "venv",
    ".tox",
    ".gradle",
    ".idea",
    ".vscode",
    "coverage",
];

/// Binary assets, archives and generated bundles, matched as file-name suffixes.
const DEFAULT_EXCLUDED_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tiff", "psd",
    // media
    "mp3", "mp4", "wav", "ogg", "mov", "avi", "webm",
    // fonts
    "woff", "woff2", "ttf", "otf", "eot",
    // archives
    "zip", "tar", "gz", "tgz", "bz2", "xz", "7z", "rar", "jar", "war",
    // binaries
    "exe", "dll", "so", "dylib", "a", "o", "obj", "class", "pyc", "pyo", "wasm", "bin",
    // documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
    // data blobs
    "sqlite", "db", "pkl", "npy", "parquet",
    // generated
    "min.js", "min.css", "map",
];

/// Dependency lockfiles: large, machine-written, no analytical value.
const DEFAULT_EXCLUDED_FILES: &[&str] = &[
    "Cargo.lock",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "bun.lockb",
    "poetry.lock",
    "Pipfile.lock",
    "uv.lock",
    "Gemfile.lock",
    "composer.lock",
    "go.sum",
    "mix.lock",
    "pubspec.lock",
    "flake.lock",
    ".DS_Store",
];

/// Decides which repository files count as analyzable text.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    excluded_dirs: Vec<String>,
    excluded_extensions: Vec<String>,
    excluded_files: Vec<String>,
    max_file_bytes: u64,
}

impl ContentFilter {
    /// Default heuristics with the given per-file cap.
    pub fn new(max_file_bytes: u64) -> Self {
        Self {
            excluded_dirs: to_owned(DEFAULT_EXCLUDED_DIRS),
            excluded_extensions: to_owned(DEFAULT_EXCLUDED_EXTENSIONS),
            excluded_files: to_owned(DEFAULT_EXCLUDED_FILES),
            max_file_bytes,
        }
    }

    /// Add directory names to skip.
    pub fn with_excluded_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_dirs.extend(dirs.into_iter().map(Into::into));
        self
    }

    /// Add file-name suffixes (without the leading dot) to skip.
    pub fn with_excluded_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_extensions.extend(
            extensions
                .into_iter()
                .map(|e| e.into().trim_start_matches('.').to_ascii_lowercase()),
        );
        self
    }

    /// Add exclusions written as config patterns: `dir/` names a directory,
    /// `*.ext` a suffix, anything else an exact file name.
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if let Some(dir) = pattern.strip_suffix('/') {
                self.excluded_dirs.push(dir.trim_start_matches("**/").to_string());
            } else if let Some(ext) = pattern.strip_prefix("*.") {
                self.excluded_extensions.push(ext.to_ascii_lowercase());
            } else if !pattern.is_empty() {
                self.excluded_files.push(pattern.to_string());
            }
        }
        self
    }

    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_bytes
    }

    /// Glob patterns describing the exclusions, for the ingestion request.
    pub fn exclude_patterns(&self) -> Vec<String> {
        let dirs = self.excluded_dirs.iter().map(|d| format!("**/{}/**", d));
        let exts = self.excluded_extensions.iter().map(|e| format!("*.{}", e));
        let files = self.excluded_files.iter().map(|f| format!("**/{}", f));
        dirs.chain(exts).chain(files).collect()
    }

    /// Why `path` is excluded, or `None` if the path is acceptable.
    pub fn path_exclusion(&self, path: &str) -> Option<&'static str> {
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let file_name = segments.pop()?;

        if segments
            .iter()
            .any(|seg| self.excluded_dirs.iter().any(|d| d == seg))
        {
            return Some("excluded directory");
        }
        if self.excluded_files.iter().any(|f| f == file_name) {
            return Some("lockfile");
        }
        let lower = file_name.to_ascii_lowercase();
        if self
            .excluded_extensions
            .iter()
            .any(|ext| lower.ends_with(&format!(".{}", ext)))
        {
            return Some("binary or generated extension");
        }
        None
    }

    /// Why `file` is excluded, or `None` if it is analyzable text.
    pub fn exclusion(&self, file: &ExtractedFile) -> Option<&'static str> {
        if let Some(reason) = self.path_exclusion(&file.path) {
            return Some(reason);
        }
        if file.size_bytes() > self.max_file_bytes {
            return Some("file exceeds size cap");
        }
        // NUL bytes survive lossy decoding of binaries; real text never has them.
        if file.content.contains('\0') {
            return Some("binary content");
        }
        None
    }

    pub fn accepts(&self, file: &ExtractedFile) -> bool {
        self.exclusion(file).is_none()
    }
}

fn to_owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

use std::fs::File;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

/// Get the content type for a file based on its extension
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        // Text types
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "text/javascript",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",

        // Application types
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "wasm" => "application/wasm",

        // Image types
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",

        _ => "application/octet-stream",
    }
}

/// What a request path maps to on disk
#[derive(Debug)]
pub enum Resolved {
    Found {
        file: File,
        length: u64,
        content_type: &'static str,
    },
    NotFound,
    /// The path points outside the served root
    Forbidden,
}

/// Maps request paths to readable files
pub trait FileResolver: Send + Sync {
    fn resolve(&self, request_path: &str) -> io::Result<Resolved>;
}

/// Serves files below a single root directory
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
    index_file: String,
}

impl StaticFiles {
    /// The root is canonicalized up front so every lookup compares against the real path
    pub fn new<P: AsRef<Path>>(root: P, index_file: &str) -> io::Result<Self> {
        Ok(Self {
            root: root.as_ref().canonicalize()?,
            index_file: index_file.to_string(),
        })
    }

    /// Turn the URL path into a path relative to the root.
    /// `None` means the path tries to climb out of the root.
    fn relative_path(request_path: &str) -> Option<PathBuf> {
        let path = request_path
            .split(|c: char| c == '?' || c == '#')
            .next()
            .unwrap_or_default();
        let decoded = percent_decode(path);

        let mut relative = PathBuf::new();
        for segment in decoded.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return None,
                s if s.contains('\\') || s.contains('\0') => return None,
                s => relative.push(s),
            }
        }
        Some(relative)
    }

    fn open_within_root(&self, candidate: &Path) -> io::Result<Resolved> {
        let canonical = match candidate.canonicalize() {
            Ok(p) => p,
            Err(ref e) if e.kind() == ErrorKind::NotFound => return Ok(Resolved::NotFound),
            Err(e) => return Err(e),
        };

        // Symlinks may point anywhere
        if !canonical.starts_with(&self.root) {
            return Ok(Resolved::Forbidden);
        }

        if canonical.is_dir() {
            let index = canonical.join(&self.index_file);
            if !index.is_file() {
                return Ok(Resolved::NotFound);
            }
            return self.open_within_root(&index);
        }

        let file = match File::open(&canonical) {
            Ok(f) => f,
            Err(ref e) if e.kind() == ErrorKind::NotFound => return Ok(Resolved::NotFound),
            Err(ref e) if e.kind() == ErrorKind::PermissionDenied => return Ok(Resolved::Forbidden),
            Err(e) => return Err(e),
        };
        let length = file.metadata()?.len();

        Ok(Resolved::Found {
            file,
            length,
            content_type: content_type_for(&canonical),
        })
    }
}

impl FileResolver for StaticFiles {
    fn resolve(&self, request_path: &str) -> io::Result<Resolved> {
        if !request_path.starts_with('/') {
            return Ok(Resolved::NotFound);
        }

        match Self::relative_path(request_path) {
            Some(relative) => self.open_within_root(&self.root.join(relative)),
            None => Ok(Resolved::Forbidden),
        }
    }
}

/// Decode `%XX` escapes; malformed escapes are kept literally
fn percent_decode(input: &str) -> String {
    let bytes = urlencoding::decode_binary(input.as_bytes());
    String::from_utf8_lossy(&bytes).into_owned()
}

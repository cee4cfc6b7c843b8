//! Resolve undefined identifiers to standard-library packages.

use std::collections::BTreeSet;

use super::diagnostic::{Category, Diagnostic};

/// Map a package name, as used in a selector (`filepath.Join`), to its
/// import path.
///
/// Only standard-library packages whose name is unambiguous are listed;
/// `template` and `rand` resolve to `text/template` and `math/rand`.
#[must_use]
pub fn package_for_identifier(ident: &str) -> Option<&'static str> {
    let path = match ident {
        "bufio" => "bufio",
        "bytes" => "bytes",
        "context" => "context",
        "errors" => "errors",
        "fmt" => "fmt",
        "io" => "io",
        "log" => "log",
        "math" => "math",
        "os" => "os",
        "path" => "path",
        "reflect" => "reflect",
        "regexp" => "regexp",
        "sort" => "sort",
        "strconv" => "strconv",
        "strings" => "strings",
        "sync" => "sync",
        "time" => "time",
        "unicode" => "unicode",
        "atomic" => "sync/atomic",
        "base64" => "encoding/base64",
        "binary" => "encoding/binary",
        "csv" => "encoding/csv",
        "hex" => "encoding/hex",
        "json" => "encoding/json",
        "xml" => "encoding/xml",
        "filepath" => "path/filepath",
        "fs" => "io/fs",
        "ioutil" => "io/ioutil",
        "exec" => "os/exec",
        "signal" => "os/signal",
        "user" => "os/user",
        "big" => "math/big",
        "bits" => "math/bits",
        "cmplx" => "math/cmplx",
        "rand" => "math/rand",
        "md5" => "crypto/md5",
        "sha1" => "crypto/sha1",
        "sha256" => "crypto/sha256",
        "sha512" => "crypto/sha512",
        "http" => "net/http",
        "url" => "net/url",
        "net" => "net",
        "heap" => "container/heap",
        "list" => "container/list",
        "ring" => "container/ring",
        "utf8" => "unicode/utf8",
        "utf16" => "unicode/utf16",
        "template" => "text/template",
        "tabwriter" => "text/tabwriter",
        "flag" => "flag",
        "runtime" => "runtime",
        "debug" => "runtime/debug",
        "unsafe" => "unsafe",
        "slices" => "slices",
        "maps" => "maps",
        "cmp" => "cmp",
        "iter" => "iter",
        "slog" => "log/slog",
        "gzip" => "compress/gzip",
        "zip" => "archive/zip",
        "tar" => "archive/tar",
        "crc32" => "hash/crc32",
        "fnv" => "hash/fnv",
        "html" => "html",
        "mime" => "mime",
        "embed" => "embed",
        "testing" => "testing",
        _ => return None,
    };
    Some(path)
}

/// The name a package is referred to by in source.
///
/// This is the last path element, ignoring a trailing major-version element
/// (`/v2`) and a `.vN` suffix, with `go-` prefixes and `-go` suffixes
/// dropped.
#[must_use]
pub fn package_name(path: &str) -> String {
    let mut elems: Vec<&str> = path.trim_end_matches('/').split('/').collect();
    if elems.len() > 1
        && elems
            .last()
            .is_some_and(|e| e.len() > 1 && e.starts_with('v') && e[1..].bytes().all(|b| b.is_ascii_digit()))
    {
        elems.pop();
    }
    let last = elems.last().copied().unwrap_or(path);
    let last = match last.rsplit_once(".v") {
        Some((stem, ver)) if !ver.is_empty() && ver.bytes().all(|b| b.is_ascii_digit()) => stem,
        _ => last,
    };
    let last = last.strip_prefix("go-").unwrap_or(last);
    let last = last.strip_suffix("-go").unwrap_or(last);
    last.replace(['-', '.'], "_")
}

/// What the resolver decided for a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The path was added to the pending imports; retry the build.
    Added(String),
    /// The identifier is a known package but auto-import is off.
    Suggest { ident: String, path: String },
    /// Nothing is known about the identifier.
    Unknown,
}

/// Resolve an undefined-identifier diagnostic against the package table.
///
/// Adds to `pending` only; never removes or replaces an existing import. A
/// path already present is not added again, so the caller cannot loop on an
/// identifier the package does not actually provide.
pub fn resolve(
    diagnostic: &Diagnostic,
    auto_import: bool,
    active: &BTreeSet<String>,
    pending: &mut BTreeSet<String>,
) -> Resolution {
    let Category::Undefined { ident } = &diagnostic.category else {
        return Resolution::Unknown;
    };
    let Some(path) = package_for_identifier(ident) else {
        return Resolution::Unknown;
    };
    if active.contains(path) || pending.contains(path) {
        return Resolution::Unknown;
    }
    if !auto_import {
        return Resolution::Suggest {
            ident: ident.clone(),
            path: path.to_string(),
        };
    }
    tracing::debug!(%ident, path, "auto-importing package");
    pending.insert(path.to_string());
    Resolution::Added(path.to_string())
}

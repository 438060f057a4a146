use std::borrow::Cow;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use encoding_rs::{Encoding, UTF_8};
use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// Error unless the directory already exists.
pub fn require_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("Directory does not exist: {}", path.display());
    }
    if !path.is_dir() {
        anyhow::bail!("Path exists but is not a directory: {}", path.display());
    }
    Ok(())
}

/// Create the parent directory of `path` if it doesn't exist.
pub fn ensure_parent_exists(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display())),
        _ => Ok(()),
    }
}

/// True if the file name ends in `.<ext>` or `.<ext>.gz` (case-insensitive).
fn has_extension(path: &Path, ext: &str) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else { return false };
    let name = name.to_ascii_lowercase();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    name.strip_suffix(ext).is_some_and(|stem| stem.ends_with('.') && stem.len() > 1)
}

/// All CityGML inputs below `base`, sorted.
///
/// Looks for `*.gml` first and falls back to `*.xml` only when no GML file
/// exists. Gzipped variants of either are included.
pub fn find_input_files(base: &Path) -> Result<Vec<PathBuf>> {
    if base.is_file() {
        return Ok(vec![base.to_path_buf()]);
    }
    require_dir_exists(base)?;

    let mut candidates = Vec::new();
    for entry in WalkDir::new(base).follow_links(true) {
        let entry = entry.with_context(|| format!("Failed to walk {}", base.display()))?;
        if entry.file_type().is_file() {
            candidates.push(entry.into_path());
        }
    }

    let mut files: Vec<PathBuf> = candidates.iter().filter(|p| has_extension(p, "gml")).cloned().collect();
    if files.is_empty() {
        files = candidates.into_iter().filter(|p| has_extension(p, "xml")).collect();
    }
    files.sort();
    Ok(files)
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Lowercase hex SHA-256 of a file's contents, streamed.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)
        .with_context(|| format!("open for hash {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 1 << 16];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Key identifying `path` across runs: its path below `base` with `/`
/// separators, or the bare file name when `path` is not below `base`.
pub fn relative_key(base: &Path, path: &Path) -> String {
    match path.strip_prefix(base) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        _ => file_name(path),
    }
}

/// Final path component, or the whole path if there is none.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Label from `encoding="..."` in a leading XML declaration.
fn declared_encoding(bytes: &[u8]) -> Option<&[u8]> {
    let decl = bytes.strip_prefix(b"<?xml")?;
    let end = decl.windows(2).position(|w| w == b"?>")?;
    let decl = &decl[..end];
    let at = decl.windows(8).position(|w| w == b"encoding")?;
    let rest = decl[at + 8..].trim_ascii_start().strip_prefix(b"=")?.trim_ascii_start();
    let (&quote, rest) = rest.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let len = rest.iter().position(|&b| b == quote)?;
    Some(&rest[..len])
}

/// Decode an XML document to text.
///
/// The encoding comes from a byte order mark, else from the XML declaration,
/// else UTF-8. Bytes that are invalid in that encoding are an `InvalidData`
/// error; nothing is replaced.
pub fn decode_xml(bytes: &[u8]) -> io::Result<Cow<'_, str>> {
    let (encoding, body) = match Encoding::for_bom(bytes) {
        Some((encoding, bom)) => (encoding, &bytes[bom..]),
        None => {
            let declared = declared_encoding(bytes).and_then(Encoding::for_label);
            (declared.map_or(UTF_8, Encoding::output_encoding), bytes)
        }
    };
    encoding.decode_without_bom_handling_and_without_replacement(body)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, format!("malformed {} text", encoding.name())))
}

/// Decompress `bytes` if `path` is gzipped, otherwise return them unchanged.
pub fn decode_input(path: &Path, bytes: Vec<u8>) -> io::Result<Vec<u8>> {
    let gzipped = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
    if !gzipped {
        return Ok(bytes);
    }
    let mut out = Vec::with_capacity(bytes.len() * 4);
    GzDecoder::new(bytes.as_slice()).read_to_end(&mut out)?;
    Ok(out)
}

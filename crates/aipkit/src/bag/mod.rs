//! Minimal BagIt 0.97 support: turn a directory into a bag in place and
//! check a bag's completeness and fixity.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::debug;
use md5::Md5;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::{BagError, StorageError};
use crate::storage::filesystem::{available_path, list_names, move_path, write_file};

pub const BAGIT_VERSION: &str = "0.97";
pub const DATA_DIR: &str = "data";
const BAGIT_TXT: &str = "bagit.txt";
const BAG_INFO_TXT: &str = "bag-info.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Algorithm {
    Md5,
    Sha256,
}

impl Algorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "md5" => Some(Self::Md5),
            "sha256" => Some(Self::Sha256),
            _ => None,
        }
    }

    fn manifest_name(&self) -> String {
        format!("manifest-{}.txt", self.name())
    }

    fn tagmanifest_name(&self) -> String {
        format!("tagmanifest-{}.txt", self.name())
    }
}

/// Total payload size and file count, as recorded in `bag-info.txt`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PayloadOxum {
    pub bytes: u64,
    pub files: u64,
}

impl PayloadOxum {
    pub fn parse(value: &str) -> Option<Self> {
        let (bytes, files) = value.trim().split_once('.')?;
        Some(Self {
            bytes: bytes.parse().ok()?,
            files: files.parse().ok()?,
        })
    }
}

impl fmt::Display for PayloadOxum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.bytes, self.files)
    }
}

/// Every problem found with one path in a bag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BagFinding {
    pub path: String,
    pub problems: Vec<String>,
}

impl fmt::Display for BagFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.problems.join("; "))
    }
}

#[derive(Default)]
struct Findings(BTreeMap<String, Vec<String>>);

impl Findings {
    fn add(&mut self, path: &str, problem: impl Into<String>) {
        let problem = problem.into();
        let entry = self.0.entry(path.to_string()).or_default();
        if !entry.contains(&problem) {
            entry.push(problem);
        }
    }

    fn touches_payload(&self) -> bool {
        let prefix = format!("{}/", DATA_DIR);
        self.0.keys().any(|path| path.starts_with(&prefix))
    }

    fn into_vec(self) -> Vec<BagFinding> {
        self.0
            .into_iter()
            .map(|(path, problems)| BagFinding { path, problems })
            .collect()
    }
}

/// Converts `dir` into a bag in place: its current contents move under
/// `data/` and the tag files are written beside it.
pub fn make_bag(dir: &Path, algorithms: &[Algorithm]) -> Result<PayloadOxum, BagError> {
    if !dir.is_dir() {
        return Err(BagError::NotABag(
            dir.to_path_buf(),
            "not a directory".to_string(),
        ));
    }

    let staging = available_path(dir, "data-staging")?;
    let entries = list_names(dir)?;
    std::fs::create_dir(&staging).map_err(|e| StorageError::CreateDirectory {
        path: staging.clone(),
        source: e,
    })?;
    for name in entries {
        move_path(&dir.join(&name), &staging.join(&name))?;
    }
    move_path(&staging, &dir.join(DATA_DIR))?;

    let payload = payload_files(dir)?;
    let mut oxum = PayloadOxum::default();
    let mut manifests: BTreeMap<Algorithm, String> = BTreeMap::new();
    for relative in &payload {
        let path = dir.join(relative);
        let digests = digest_file(&path, algorithms)?;
        oxum.bytes += file_len(&path)?;
        oxum.files += 1;
        for (algorithm, digest) in algorithms.iter().zip(digests) {
            manifests
                .entry(*algorithm)
                .or_default()
                .push_str(&format!("{}  {}\n", digest, manifest_name(relative)));
        }
    }

    write_file(
        &dir.join(BAGIT_TXT),
        format!(
            "BagIt-Version: {}\nTag-File-Character-Encoding: UTF-8\n",
            BAGIT_VERSION
        )
        .as_bytes(),
    )?;
    write_file(
        &dir.join(BAG_INFO_TXT),
        format!(
            "Bag-Software-Agent: aipkit {}\nBagging-Date: {}\nPayload-Oxum: {}\n",
            env!("CARGO_PKG_VERSION"),
            Local::now().format("%Y-%m-%d"),
            oxum
        )
        .as_bytes(),
    )?;

    let mut tag_files = vec![BAGIT_TXT.to_string(), BAG_INFO_TXT.to_string()];
    for algorithm in algorithms {
        let name = algorithm.manifest_name();
        let body = manifests.remove(algorithm).unwrap_or_default();
        write_file(&dir.join(&name), body.as_bytes())?;
        tag_files.push(name);
    }
    tag_files.sort();

    for algorithm in algorithms {
        let mut body = String::new();
        for name in &tag_files {
            let digest = digest_file(&dir.join(name), &[*algorithm])?;
            body.push_str(&format!(
                "{}  {}\n",
                digest.concat(),
                manifest_name(Path::new(name))
            ));
        }
        write_file(&dir.join(algorithm.tagmanifest_name()), body.as_bytes())?;
    }

    debug!("Bagged {} ({} payload files)", dir.display(), oxum.files);
    Ok(oxum)
}

/// Checks a bag and returns its problems, one entry per path, sorted by
/// path. An empty result means the bag is valid.
pub fn validate(dir: &Path) -> Result<Vec<BagFinding>, BagError> {
    if !dir.is_dir() {
        return Err(BagError::NotABag(
            dir.to_path_buf(),
            "not a directory".to_string(),
        ));
    }

    let mut findings = Findings::default();

    for required in [BAGIT_TXT, BAG_INFO_TXT] {
        if !dir.join(required).is_file() {
            findings.add(required, "required tag file missing");
        }
    }
    if !dir.join(DATA_DIR).is_dir() {
        findings.add(DATA_DIR, "payload directory missing");
        return Ok(findings.into_vec());
    }

    let payload = payload_files(dir)?;
    let oxum_mismatch = check_oxum(dir, &payload, &mut findings)?;

    let mut payload_manifests = Vec::new();
    let mut tag_manifests = Vec::new();
    for name in list_names(dir)? {
        let name = name.to_string_lossy().into_owned();
        if let Some(alg) = manifest_algorithm(&name, "manifest-") {
            payload_manifests.push((name, alg));
        } else if let Some(alg) = manifest_algorithm(&name, "tagmanifest-") {
            tag_manifests.push((name, alg));
        }
    }

    if payload_manifests.is_empty() {
        findings.add("manifest", "no payload manifest");
    }

    let mut manifested = BTreeSet::new();
    for (name, algorithm) in &payload_manifests {
        let Some(algorithm) = algorithm else {
            findings.add(name, "unsupported checksum algorithm");
            continue;
        };
        let entries = read_manifest(&dir.join(name), name, &mut findings)?;
        for (expected, entry) in entries {
            if let Some(key) = check_entry(dir, &entry, *algorithm, &expected, &mut findings)? {
                manifested.insert(key);
            }
        }
    }

    for relative in &payload {
        let key = manifest_name(relative);
        if !manifested.contains(&key) {
            findings.add(&key, "not listed in any payload manifest");
        }
    }

    for (name, algorithm) in &tag_manifests {
        let Some(algorithm) = algorithm else {
            findings.add(name, "unsupported checksum algorithm");
            continue;
        };
        for (expected, entry) in read_manifest(&dir.join(name), name, &mut findings)? {
            check_entry(dir, &entry, *algorithm, &expected, &mut findings)?;
        }
    }

    // A changed file also changes the totals; only report them on their own.
    if let Some(problem) = oxum_mismatch {
        if !findings.touches_payload() {
            findings.add(BAG_INFO_TXT, problem);
        }
    }

    Ok(findings.into_vec())
}

/// The Payload-Oxum recorded in the bag's `bag-info.txt`, if any.
pub fn read_payload_oxum(dir: &Path) -> Result<Option<PayloadOxum>, StorageError> {
    let info = read_text(&dir.join(BAG_INFO_TXT))?;
    Ok(tag_value(&info, "Payload-Oxum").and_then(|v| PayloadOxum::parse(&v)))
}

/// The Payload-Oxum mismatch, if any. A malformed value is recorded directly.
fn check_oxum(
    dir: &Path,
    payload: &[PathBuf],
    findings: &mut Findings,
) -> Result<Option<String>, BagError> {
    let info_path = dir.join(BAG_INFO_TXT);
    if !info_path.is_file() {
        return Ok(None);
    }
    let info = read_text(&info_path)?;
    let Some(value) = tag_value(&info, "Payload-Oxum") else {
        return Ok(None);
    };
    let Some(expected) = PayloadOxum::parse(&value) else {
        findings.add(BAG_INFO_TXT, format!("malformed Payload-Oxum '{}'", value));
        return Ok(None);
    };

    let mut actual = PayloadOxum::default();
    for relative in payload {
        actual.bytes += file_len(&dir.join(relative))?;
        actual.files += 1;
    }
    Ok((actual != expected)
        .then(|| format!("Payload-Oxum mismatch: expected {}, found {}", expected, actual)))
}

/// Checks one manifest line and returns the entry's normalized name, or
/// `None` when the entry points outside the bag.
fn check_entry(
    dir: &Path,
    entry: &str,
    algorithm: Algorithm,
    expected: &str,
    findings: &mut Findings,
) -> Result<Option<String>, BagError> {
    let Some(relative) = entry_path(entry) else {
        findings.add(entry, "path escapes the bag");
        return Ok(None);
    };
    let key = manifest_name(&relative);
    let path = dir.join(&relative);
    if !path.is_file() {
        findings.add(&key, "listed in manifest but missing");
        return Ok(Some(key));
    }
    let actual = digest_file(&path, &[algorithm])?.concat();
    if !actual.eq_ignore_ascii_case(expected) {
        findings.add(&key, format!("{} checksum mismatch", algorithm.name()));
    }
    Ok(Some(key))
}

/// `Some(None)` for a manifest in an algorithm this module cannot check.
fn manifest_algorithm(name: &str, prefix: &str) -> Option<Option<Algorithm>> {
    let alg = name.strip_prefix(prefix)?.strip_suffix(".txt")?;
    Some(Algorithm::from_name(alg))
}

fn read_manifest(
    path: &Path,
    name: &str,
    findings: &mut Findings,
) -> Result<Vec<(String, String)>, BagError> {
    let text = read_text(path)?;
    let mut entries = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match line.split_once(char::is_whitespace) {
            Some((digest, rest)) => {
                entries.push((digest.to_string(), rest.trim_start().to_string()));
            }
            None => findings.add(name, format!("malformed line {}", index + 1)),
        }
    }
    Ok(entries)
}

fn tag_value(text: &str, label: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == label).then(|| value.trim().to_string())
    })
}

/// Bag-relative paths of every payload file, sorted.
fn payload_files(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let data = dir.join(DATA_DIR);
    let mut files = Vec::new();
    for entry in WalkDir::new(&data).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| StorageError::Walk {
            path: data.clone(),
            source: e,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        files.push(relative.to_path_buf());
    }
    files.sort();
    Ok(files)
}

/// How a bag-relative path is written in a manifest: `/`-separated, with
/// `%`, CR, LF and bytes that are not UTF-8 percent-encoded.
fn manifest_name(relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .map(|c| encode_component(c.as_os_str()))
        .collect();
    parts.join("/")
}

fn encode_component(name: &OsStr) -> String {
    let mut bytes = name.as_encoded_bytes();
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(text) => {
                push_encoded(&mut out, text);
                return out;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                push_encoded(&mut out, std::str::from_utf8(valid).unwrap_or_default());
                let invalid = e.error_len().unwrap_or(rest.len());
                for byte in &rest[..invalid] {
                    out.push_str(&format!("%{:02X}", byte));
                }
                bytes = &rest[invalid..];
            }
        }
    }
}

fn push_encoded(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '%' => out.push_str("%25"),
            '\r' => out.push_str("%0D"),
            '\n' => out.push_str("%0A"),
            c => out.push(c),
        }
    }
}

/// Bag-relative path for a manifest entry, or `None` when a segment is
/// empty, `.`, `..` or would decode to a separator.
fn entry_path(entry: &str) -> Option<PathBuf> {
    let mut path = PathBuf::new();
    for segment in entry.split('/') {
        let bytes = decode_segment(segment);
        if bytes.is_empty() || bytes == b"." || bytes == b".." || bytes.contains(&b'/') {
            return None;
        }
        path.push(os_string_from_bytes(bytes));
    }
    Some(path)
}

fn decode_segment(segment: &str) -> Vec<u8> {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = (bytes[i] == b'%')
            .then(|| bytes.get(i + 1..i + 3))
            .flatten()
            .and_then(|hex| std::str::from_utf8(hex).ok())
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
        match escaped {
            Some(byte) => {
                out.push(byte);
                i += 3;
            }
            None => {
                out.push(bytes[i]);
                i += 1;
            }
        }
    }
    out
}

#[cfg(unix)]
fn os_string_from_bytes(bytes: Vec<u8>) -> OsString {
    use std::os::unix::ffi::OsStringExt;
    OsString::from_vec(bytes)
}

#[cfg(not(unix))]
fn os_string_from_bytes(bytes: Vec<u8>) -> OsString {
    OsString::from(String::from_utf8_lossy(&bytes).into_owned())
}

fn read_text(path: &Path) -> Result<String, StorageError> {
    std::fs::read_to_string(path).map_err(|e| StorageError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })
}

fn file_len(path: &Path) -> Result<u64, StorageError> {
    crate::storage::filesystem::file_size(path)
}

/// Hex digests of `path` for each algorithm, computed in a single read.
pub fn digest_file(path: &Path, algorithms: &[Algorithm]) -> Result<Vec<String>, StorageError> {
    let read_err = |e: std::io::Error| StorageError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    };
    let mut file = File::open(path).map_err(read_err)?;

    let mut md5 = algorithms.contains(&Algorithm::Md5).then(Md5::new);
    let mut sha256 = algorithms.contains(&Algorithm::Sha256).then(Sha256::new);
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer).map_err(read_err)?;
        if read == 0 {
            break;
        }
        if let Some(hasher) = md5.as_mut() {
            hasher.update(&buffer[..read]);
        }
        if let Some(hasher) = sha256.as_mut() {
            hasher.update(&buffer[..read]);
        }
    }

    let md5 = md5.map(|h| hex::encode(h.finalize()));
    let sha256 = sha256.map(|h| hex::encode(h.finalize()));
    Ok(algorithms
        .iter()
        .map(|algorithm| match algorithm {
            Algorithm::Md5 => md5.clone().unwrap_or_default(),
            Algorithm::Sha256 => sha256.clone().unwrap_or_default(),
        })
        .collect())
}

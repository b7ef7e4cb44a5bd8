#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    Zip,
    TarGz,
}

impl ArchiveType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
        }
    }

    pub fn infer_from_file_name(file_name: &str) -> Option<Self> {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            return Some(Self::Zip);
        }
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            return Some(Self::TarGz);
        }
        None
    }

    pub fn infer_from_url(url: &str) -> Option<Self> {
        artifact_file_name(url).and_then(Self::infer_from_file_name)
    }
}

/// Base name of the file a download URL points at, with query and fragment removed.
///
/// Artifacts are stored in the cache under this name, so two URLs with the same
/// base name for the same mode, version and location share a cache entry.
pub fn artifact_file_name(url: &str) -> Option<&str> {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment
        .split('?')
        .next()
        .unwrap_or(without_fragment);
    let path = without_query
        .split_once("://")
        .map(|(_, rest)| rest.split_once('/').map(|(_, path)| path).unwrap_or(""))
        .unwrap_or(without_query);
    let file_name = path.rsplit('/').next().unwrap_or("");
    if file_name.is_empty()
        || file_name == "."
        || file_name == ".."
        || file_name.contains('\\')
    {
        return None;
    }
    Some(file_name)
}

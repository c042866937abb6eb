//! Helpers for sanitizing paths before they enter tracing span attributes.
//!
//! Intake paths point at a file server; spans carry only what is needed to
//! correlate a run, never the server name.

use std::path::Path;

/// Returns only the last component of a path. Both `/` and `\` separate
/// components, so UNC paths redact the same on every platform.
pub fn redact_path(path: &Path) -> String {
    path.to_string_lossy()
        .rsplit(['/', '\\'])
        .find(|c| !c.is_empty())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Masks the server of a UNC share path.
///
/// - `\\fs01\Resoluciones` → `\\****\Resoluciones`
/// - `//fs01/Resoluciones` → `//****/Resoluciones`
/// - `/mnt/share` → `/mnt/share` (no change)
pub fn redact_share(path: &Path) -> String {
    let raw = path.to_string_lossy();
    for prefix in [r"\\", "//"] {
        if let Some(rest) = raw.strip_prefix(prefix) {
            return match rest.find(['/', '\\']) {
                Some(end) => format!("{}****{}", prefix, &rest[end..]),
                None => format!("{}****", prefix),
            };
        }
    }
    raw.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_path_returns_filename() {
        assert_eq!(
            redact_path(Path::new("/tmp/staging/1-000123-2024.pdf")),
            "1-000123-2024.pdf"
        );
        assert_eq!(
            redact_path(Path::new(r"\\fs01\Resoluciones_Temp\lote\2-000001-2023.pdf")),
            "2-000001-2023.pdf"
        );
    }

    #[test]
    fn test_redact_path_no_filename() {
        assert_eq!(redact_path(Path::new("/")), "<unknown>");
    }

    #[test]
    fn test_redact_share_unc() {
        assert_eq!(
            redact_share(Path::new(r"\\fs01\Resoluciones_Temp")),
            r"\\****\Resoluciones_Temp"
        );
        assert_eq!(redact_share(Path::new("//fs01/archivo/2024")), "//****/archivo/2024");
        assert_eq!(redact_share(Path::new(r"\\fs01")), r"\\****");
    }

    #[test]
    fn test_redact_share_local_path_unchanged() {
        assert_eq!(redact_share(Path::new("/mnt/share")), "/mnt/share");
        assert_eq!(redact_share(Path::new(r"C:\Temp")), r"C:\Temp");
    }
}

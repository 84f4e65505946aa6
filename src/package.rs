//! Package-format detection from release asset file names.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    Deb,
    Rpm,
    Pacman,
    Flatpak,
    Snap,
    AppImage,
    Unknown,
}

impl PackageType {
    pub fn display_name(&self) -> &'static str {
        match self {
            PackageType::Deb => "Debian package",
            PackageType::Rpm => "RPM package",
            PackageType::Pacman => "Arch package",
            PackageType::Flatpak => "Flatpak",
            PackageType::Snap => "Snap",
            PackageType::AppImage => "AppImage",
            PackageType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            PackageType::Deb => "deb",
            PackageType::Rpm => "rpm",
            PackageType::Pacman => "pacman",
            PackageType::Flatpak => "flatpak",
            PackageType::Snap => "snap",
            PackageType::AppImage => "appimage",
            PackageType::Unknown => "unknown",
        };
        write!(f, "{}", tag)
    }
}

const PACMAN_SUFFIXES: &[&str] = &[".pkg.tar.zst", ".pkg.tar.xz"];

/// Installer and metadata formats that are never a runnable binary.
const NON_BINARY_SUFFIXES: &[&str] = &[
    ".apk", ".dmg", ".pkg", ".msi", ".pem", ".pub", ".sbom", ".txt", ".json",
];

pub fn detect_type(asset_name: &str) -> PackageType {
    let name = asset_name.to_lowercase();
    if name.ends_with(".deb") {
        PackageType::Deb
    } else if name.ends_with(".rpm") {
        PackageType::Rpm
    } else if PACMAN_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        PackageType::Pacman
    } else if name.ends_with(".flatpak") {
        PackageType::Flatpak
    } else if name.ends_with(".snap") {
        PackageType::Snap
    } else if name.ends_with(".appimage") {
        PackageType::AppImage
    } else {
        PackageType::Unknown
    }
}

/// True for assets the binary strategy may download: not a checksum or
/// signature, not a source bundle, not a native package.
pub fn is_binary_asset(asset_name: &str) -> bool {
    let name = asset_name.to_lowercase();

    if name.contains("checksum")
        || name.contains("sha256")
        || name.contains("sha512")
        || name.ends_with(".sig")
        || name.ends_with(".asc")
    {
        return false;
    }

    if name.starts_with("source") || name.contains("src") {
        return false;
    }

    if detect_type(&name) != PackageType::Unknown {
        return false;
    }

    !NON_BINARY_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Compressed container formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    Zip,
    TarXz,
    Gz,
}

impl ArchiveKind {
    /// Matching suffixes, longest first within each kind.
    const SUFFIXES: &'static [(&'static str, ArchiveKind)] = &[
        (".tar.gz", ArchiveKind::TarGz),
        (".tgz", ArchiveKind::TarGz),
        (".zip", ArchiveKind::Zip),
        (".tar.xz", ArchiveKind::TarXz),
        (".txz", ArchiveKind::TarXz),
        (".gz", ArchiveKind::Gz),
    ];

    pub fn detect(file_name: &str) -> Option<Self> {
        let name = file_name.to_lowercase();
        Self::SUFFIXES
            .iter()
            .find(|(suffix, _)| name.ends_with(suffix))
            .map(|(_, kind)| *kind)
    }

    /// Binary-strategy rank: `.tar.gz` beats `.zip` beats anything else.
    pub fn priority(&self) -> u8 {
        match self {
            ArchiveKind::TarGz => 2,
            ArchiveKind::Zip => 1,
            ArchiveKind::TarXz | ArchiveKind::Gz => 0,
        }
    }

    /// Asset name with this archive's suffix removed, original casing kept.
    pub fn strip_suffix<'a>(&self, file_name: &'a str) -> &'a str {
        let lower = file_name.to_lowercase();
        Self::SUFFIXES
            .iter()
            .filter(|(_, kind)| kind == self)
            .find(|(suffix, _)| lower.ends_with(suffix))
            .map(|(suffix, _)| &file_name[..file_name.len() - suffix.len()])
            .unwrap_or(file_name)
    }
}

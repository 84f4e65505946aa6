//! Filters and ranks a release's assets for each installation strategy.
//!
//! Both selection modes are pure over the asset list and the [`HostEnv`];
//! the same inputs always select the same asset.

use crate::error::{InstallError, Result};
use crate::package::{detect_type, is_binary_asset, ArchiveKind, PackageType};
use crate::platform::{HostEnv, PlatformClassifier};
use crate::system::preferred_package_type;
use crate::types::{Release, ReleaseAsset};

/// Standalone executables outrank every archive format.
const STANDALONE_PRIORITY: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryCandidate {
    pub asset: ReleaseAsset,
    pub extracted_name: String,
    pub is_archive: bool,
    pub priority: u8,
}

impl BinaryCandidate {
    pub fn from_asset(asset: &ReleaseAsset) -> Self {
        let archive = ArchiveKind::detect(&asset.name);
        Self {
            asset: asset.clone(),
            extracted_name: executable_name(&asset.name),
            is_archive: archive.is_some(),
            priority: archive.map_or(STANDALONE_PRIORITY, |kind| kind.priority()),
        }
    }
}

/// Executable name implied by an asset name: archive suffix removed, then cut
/// at the first `-` and the first `_`.
///
/// `app_1.0.0_linux_amd64.tar.gz` gives `app`, `myapp-linux-amd64` gives
/// `myapp`.
pub fn executable_name(asset_name: &str) -> String {
    let stem = match ArchiveKind::detect(asset_name) {
        Some(kind) => kind.strip_suffix(asset_name),
        None => asset_name,
    };
    let token = stem.split('-').next().unwrap_or(stem);
    let token = token.split('_').next().unwrap_or(token);
    if token.is_empty() {
        stem.to_string()
    } else {
        token.to_string()
    }
}

/// Native-package mode: assets of the host's package type that carry the
/// host's architecture (or a universal token), in release order.
///
/// When nothing qualifies but the release did ship recognisable packages, the
/// error lists the package types seen so the caller can choose a fallback.
pub fn compatible_packages(
    assets: &[ReleaseAsset],
    preferred: PackageType,
    classifier: &PlatformClassifier,
    arch_label: &str,
) -> Result<Vec<ReleaseAsset>> {
    if preferred == PackageType::Unknown {
        return Err(InstallError::NoPackageManager);
    }

    let mut seen_types: Vec<PackageType> = Vec::new();
    let mut type_only_matches = 0usize;
    let mut compatible = Vec::new();

    for asset in assets {
        let detected = detect_type(&asset.name);
        if detected != PackageType::Unknown && !seen_types.contains(&detected) {
            seen_types.push(detected);
        }
        if detected != preferred {
            continue;
        }
        type_only_matches += 1;

        if classifier.matches_arch(&asset.name) {
            tracing::debug!("Compatible {} asset: {}", preferred, asset.name);
            compatible.push(asset.clone());
        } else {
            tracing::trace!("Skipping {}: architecture mismatch", asset.name);
        }
    }

    if compatible.is_empty() && (type_only_matches > 0 || !seen_types.is_empty()) {
        return Err(InstallError::NoCompatibleArchitecture {
            package_type: preferred,
            arch: arch_label.to_string(),
            available: seen_types,
        });
    }

    Ok(compatible)
}

/// Exposed entry point: native-package assets for this host.
pub fn get_compatible_assets(release: &Release, env: &HostEnv) -> Result<Vec<ReleaseAsset>> {
    compatible_packages(
        &release.assets,
        preferred_package_type(env),
        &env.classifier(),
        env.arch.label(),
    )
}

/// Binary mode: every binary-looking asset built for this platform, in
/// release order.
pub fn binary_candidates(
    assets: &[ReleaseAsset],
    classifier: &PlatformClassifier,
) -> Vec<BinaryCandidate> {
    assets
        .iter()
        .filter(|asset| is_binary_asset(&asset.name))
        .filter(|asset| classifier.matches_platform(&asset.name))
        .map(BinaryCandidate::from_asset)
        .collect()
}

/// Highest priority wins; among equals the first in release order wins.
///
/// The tie-break only mirrors the order GitHub lists assets in. It carries no
/// meaning beyond being stable.
pub fn select_binary(candidates: &[BinaryCandidate]) -> Option<&BinaryCandidate> {
    let mut selected: Option<&BinaryCandidate> = None;
    for candidate in candidates {
        match selected {
            Some(current) if candidate.priority <= current.priority => {}
            _ => selected = Some(candidate),
        }
    }
    selected
}

pub fn resolve_binary(release: &Release, env: &HostEnv) -> Result<BinaryCandidate> {
    let classifier = env.classifier();
    tracing::debug!("Platform keywords: {:?}", classifier.keywords());
    let candidates = binary_candidates(&release.assets, &classifier);
    for candidate in &candidates {
        tracing::trace!(
            "  - {} (priority {}, executable '{}')",
            candidate.asset.name,
            candidate.priority,
            candidate.extracted_name
        );
    }
    let selected = select_binary(&candidates).ok_or(InstallError::NoBinaryAssets)?;
    tracing::info!("Found best match: '{}'", selected.asset.name);
    Ok(selected.clone())
}

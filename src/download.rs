use crate::error::{InstallError, Result};
use crate::types::ReleaseAsset;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Downloads `asset` into `dest_dir`, keeping the asset's file name so the
/// extractor can dispatch on its extension.
pub async fn download_asset(
    client: &reqwest::Client,
    asset: &ReleaseAsset,
    dest_dir: &Path,
) -> Result<PathBuf> {
    fs::create_dir_all(dest_dir)?;
    let local_path = dest_dir.join(file_name_for(asset));
    tracing::info!("Downloading {}...", asset.download_url);

    let response = client
        .get(&asset.download_url)
        .send()
        .await
        .map_err(|e| InstallError::Network(e.to_string()))?;

    if !response.status().is_success() {
        return Err(InstallError::Network(format!(
            "bad status downloading {}: {}",
            asset.name,
            response.status()
        )));
    }

    let total_size = response.content_length().unwrap_or(asset.size_bytes);
    let pb = ProgressBar::new(total_size);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(format!("Downloading {}", asset.name));

    let mut file = fs::File::create(&local_path)?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| InstallError::Network(e.to_string()))?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }
    file.sync_all()?;

    pb.finish_and_clear();
    tracing::debug!("Downloaded {} bytes to {}", downloaded, local_path.display());
    Ok(local_path)
}

/// Asset names come from the network; keep only the final path component.
fn file_name_for(asset: &ReleaseAsset) -> String {
    Path::new(&asset.name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty() && n != "..")
        .unwrap_or_else(|| "asset.download".to_string())
}

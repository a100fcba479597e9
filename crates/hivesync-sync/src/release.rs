// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HiveSync.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! GitHub release checking module
//!
//! Release metadata is scraped with [`crate::extract`] instead of being
//! deserialized: only `tag_name` and one asset's download URL are needed.

use crate::config::ReleaseRepo;
use crate::error::{Result, SyncError};
use crate::extract::{find_literal, find_string, find_string_from};
use crate::transport::{HttpRequest, HttpTransport};
use std::time::Duration;
use tracing::{debug, warn};

/// How far past the asset name its `browser_download_url` may start. GitHub
/// puts the whole `uploader` object in between, which is about 1 KiB.
pub const ASSET_URL_WINDOW: usize = 4096;

/// Tag of the release described by `metadata`
pub fn latest_tag(metadata: &str) -> Option<String> {
    find_string(metadata, "tag_name")
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
}

/// Download URL for `asset`: the URL listed next to the asset name if there
/// is one, otherwise the conventional URL built from the release tag
pub fn find_asset_url(metadata: &str, asset: &str, repo: &ReleaseRepo) -> Option<String> {
    if let Some(url) = listed_asset_url(metadata, asset) {
        return Some(url.to_string());
    }

    let tag = latest_tag(metadata)?;
    debug!("No listed URL for {asset}, using tag {tag}");
    Some(repo.download_url(&tag, asset))
}

fn listed_asset_url<'a>(metadata: &'a str, asset: &str) -> Option<&'a str> {
    let name_pos = asset_name_pos(metadata, asset)?;
    let found = find_string_from(metadata, "browser_download_url", name_pos)?;
    if found.key_pos - name_pos > ASSET_URL_WINDOW {
        debug!("browser_download_url too far from asset name, ignoring");
        return None;
    }
    Some(found.value).filter(|url| !url.is_empty())
}

/// Offset of the first `"name":"<asset>"` pair
fn asset_name_pos(metadata: &str, asset: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(pos) = find_literal(metadata, "\"name\":", from) {
        if let Some(found) = find_string_from(metadata, "name", pos)
            && found.key_pos == pos
            && found.value == asset
        {
            return Some(pos);
        }
        from = pos + 1;
    }
    None
}

/// Fetch the raw metadata of the latest release
pub async fn fetch_latest_release(
    transport: &dyn HttpTransport,
    repo: &ReleaseRepo,
    timeout: Duration,
) -> Result<String> {
    let url = repo.latest_release_url();
    let request = HttpRequest::get(&url)
        .header("Accept", "application/vnd.github+json")
        .timeout(timeout);

    let response = transport.send(request).await?;

    if let Some(remaining) = response.header("x-ratelimit-remaining") {
        debug!(
            "RateLimit remaining={remaining} used={} reset={}",
            response.header("x-ratelimit-used").unwrap_or("?"),
            response.header("x-ratelimit-reset").unwrap_or("?")
        );
        if remaining.parse::<u32>().is_ok_and(|left| left < 10) {
            warn!("GitHub rate limit low: {remaining} remaining");
        }
    }

    if response.status != 200 {
        warn!(
            "Release check HTTP {}: {}",
            response.status,
            response.body_preview()
        );
        return Err(SyncError::status(response.status, "Release check"));
    }

    debug!("Body size: {}", response.body.len());
    Ok(response.body)
}

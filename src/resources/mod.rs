//! Loading of external assets: raw files, textures and TMX maps.
//!
//! Natively, paths are resolved under [`LoaderConfig::asset_root`] and read
//! with `tokio::fs`. On wasm32 they are fetched from `<origin>/assets/`.

pub mod registry;
pub mod tmx;

use std::path::PathBuf;

#[cfg(not(target_arch = "wasm32"))]
use anyhow::Context;

use crate::data_structures::texture::Texture;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Directory asset paths are relative to (native only).
    pub asset_root: PathBuf,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("assets"),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AssetLoader {
    config: LoaderConfig,
}

impl AssetLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn with_root(asset_root: impl Into<PathBuf>) -> Self {
        Self::new(LoaderConfig {
            asset_root: asset_root.into(),
        })
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub async fn load_string(&self, file_name: &str) -> anyhow::Result<String> {
        #[cfg(target_arch = "wasm32")]
        let txt = {
            let url = format_url(file_name)?;
            reqwest::get(url).await?.error_for_status()?.text().await?
        };
        #[cfg(not(target_arch = "wasm32"))]
        let txt = {
            let path = self.config.asset_root.join(file_name);
            tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?
        };

        Ok(txt)
    }

    pub async fn load_binary(&self, file_name: &str) -> anyhow::Result<Vec<u8>> {
        #[cfg(target_arch = "wasm32")]
        let data = {
            let url = format_url(file_name)?;
            reqwest::get(url)
                .await?
                .error_for_status()?
                .bytes()
                .await?
                .to_vec()
        };
        #[cfg(not(target_arch = "wasm32"))]
        let data = {
            let path = self.config.asset_root.join(file_name);
            tokio::fs::read(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?
        };

        Ok(data)
    }

    pub async fn load_texture(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        file_name: &str,
    ) -> anyhow::Result<Texture> {
        let data = self.load_binary(file_name).await?;
        let format = file_name.rsplit_once('.').map(|(_, ext)| ext);
        Texture::from_bytes(device, queue, &data, file_name, format)
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().ok_or_else(|| anyhow::anyhow!("no window"))?;
    let origin = window
        .location()
        .origin()
        .map_err(|e| anyhow::anyhow!("no origin: {e:?}"))?;
    let base = reqwest::Url::parse(&format!("{origin}/assets/"))?;
    Ok(base.join(file_name)?)
}

/// Joins `relative` onto the directory of `base` using `/` separators, the
/// way asset paths are written in map files.
pub fn resolve_relative(base: &str, relative: &str) -> String {
    if relative.starts_with('/') {
        return relative.trim_start_matches('/').to_string();
    }
    let mut parts: Vec<&str> = match base.rfind('/') {
        Some(idx) => base[..idx].split('/').filter(|p| !p.is_empty()).collect(),
        None => Vec::new(),
    };
    for part in relative.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_follow_the_map() {
        assert_eq!(resolve_relative("maps/town.tmx", "tiles.png"), "maps/tiles.png");
        assert_eq!(resolve_relative("town.tmx", "tiles.png"), "tiles.png");
        assert_eq!(
            resolve_relative("maps/a/town.tmx", "../sheets/./tiles.png"),
            "maps/sheets/tiles.png"
        );
        assert_eq!(resolve_relative("maps/town.tmx", "/shared/tiles.png"), "shared/tiles.png");
    }

    #[tokio::test]
    async fn missing_files_name_the_path() {
        let loader = AssetLoader::with_root("does-not-exist");
        let err = loader.load_string("nothing.tmx").await.unwrap_err();
        assert!(format!("{err:#}").contains("nothing.tmx"));
    }
}

//! Automatic chromedriver management.
//!
//! Drivers come from the Chrome for Testing manifest and are cached per
//! version and platform, so a second install of the same version never
//! touches the network.

use crate::utils::error::{LoaderError, Result};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

pub const KNOWN_GOOD_VERSIONS_URL: &str =
    "https://googlechromelabs.github.io/chrome-for-testing/known-good-versions-with-downloads.json";

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub versions: Vec<ManifestVersion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestVersion {
    pub version: String,
    #[serde(default)]
    pub downloads: Downloads,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Downloads {
    #[serde(default)]
    pub chromedriver: Vec<Download>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Download {
    pub platform: String,
    pub url: String,
}

/// 要求的驅動程式版本
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverVersion {
    Latest,
    /// 完整版本 (`120.0.6099.109`) 或只有主版本 (`120`)
    Exact(String),
}

impl DriverVersion {
    fn is_full(&self) -> bool {
        matches!(self, DriverVersion::Exact(v) if v.split('.').count() == 4)
    }

    fn major(&self) -> Option<&str> {
        match self {
            DriverVersion::Latest => None,
            DriverVersion::Exact(v) => v.split('.').next(),
        }
    }
}

impl FromStr for DriverVersion {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("latest") {
            return Ok(DriverVersion::Latest);
        }
        if s.split('.').all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())) {
            Ok(DriverVersion::Exact(s.to_string()))
        } else {
            Err(LoaderError::InvalidConfigValueError {
                field: "browser_version".to_string(),
                value: s.to_string(),
                reason: "expected 'latest', a major version or a dotted version".to_string(),
            })
        }
    }
}

fn version_key(version: &str) -> Vec<u32> {
    version.split('.').map(|p| p.parse().unwrap_or(0)).collect()
}

/// Chrome for Testing 的平台名稱
pub fn platform() -> Result<&'static str> {
    platform_for(std::env::consts::OS, std::env::consts::ARCH)
}

pub fn platform_for(os: &str, arch: &str) -> Result<&'static str> {
    match (os, arch) {
        ("linux", "x86_64") => Ok("linux64"),
        ("macos", "aarch64") => Ok("mac-arm64"),
        ("macos", _) => Ok("mac-x64"),
        ("windows", "x86") => Ok("win32"),
        ("windows", _) => Ok("win64"),
        _ => Err(LoaderError::DriverError {
            message: format!("no chromedriver build for {}/{}", os, arch),
        }),
    }
}

pub fn driver_file_name() -> &'static str {
    if cfg!(windows) {
        "chromedriver.exe"
    } else {
        "chromedriver"
    }
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\.(\d+)\.(\d+)\.(\d+)").expect("static regex"))
}

/// 從 `google-chrome --version` 或登錄檔輸出取出版本號
pub fn parse_browser_version(output: &str) -> Option<String> {
    version_regex()
        .find(output)
        .map(|m| m.as_str().to_string())
}

fn browser_version_commands() -> Vec<(&'static str, Vec<&'static str>)> {
    if cfg!(target_os = "windows") {
        vec![(
            "reg",
            vec![
                "query",
                r"HKEY_CURRENT_USER\Software\Google\Chrome\BLBeacon",
                "/v",
                "version",
            ],
        )]
    } else if cfg!(target_os = "macos") {
        vec![(
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            vec!["--version"],
        )]
    } else {
        ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"]
            .into_iter()
            .map(|bin| (bin, vec!["--version"]))
            .collect()
    }
}

/// 偵測本機 Chrome 版本
pub async fn detect_browser_version() -> Result<String> {
    for (program, args) in browser_version_commands() {
        let output = match tokio::process::Command::new(program).args(&args).output().await {
            Ok(output) if output.status.success() => output,
            _ => continue,
        };
        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(version) = parse_browser_version(&stdout) {
            tracing::debug!("🔎 {} reports Chrome {}", program, version);
            return Ok(version);
        }
    }
    Err(LoaderError::DriverError {
        message: "could not detect an installed Chrome version".to_string(),
    })
}

/// 依要求版本與平台挑出下載項目，回傳 (版本, URL)
///
/// 完整版本優先精確比對；找不到時退回同主版本中最新的一版。
pub fn resolve_download(
    manifest: &Manifest,
    requested: &DriverVersion,
    platform: &str,
) -> Result<(String, String)> {
    let candidates = manifest.versions.iter().filter_map(|v| {
        v.downloads
            .chromedriver
            .iter()
            .find(|d| d.platform == platform)
            .map(|d| (v.version.as_str(), d.url.as_str()))
    });

    if let DriverVersion::Exact(wanted) = requested {
        if requested.is_full() {
            if let Some((version, url)) = candidates.clone().find(|(v, _)| v == wanted) {
                return Ok((version.to_string(), url.to_string()));
            }
        }
    }

    let major = requested.major();
    candidates
        .filter(|(v, _)| match major {
            Some(major) => v.split('.').next() == Some(major),
            None => true,
        })
        .max_by(|(a, _), (b, _)| version_key(a).cmp(&version_key(b)))
        .map(|(v, u)| (v.to_string(), u.to_string()))
        .ok_or_else(|| LoaderError::DriverError {
            message: match requested {
                DriverVersion::Latest => format!("no chromedriver available for {}", platform),
                DriverVersion::Exact(v) => {
                    format!("no chromedriver matching {} for {}", v, platform)
                }
            },
        })
}

/// 從下載的 zip 取出 chromedriver 執行檔
pub fn extract_driver(archive: &[u8], dest: &Path) -> Result<()> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))?;
    let file_name = driver_file_name();

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let base = name.rsplit('/').next().unwrap_or(&name);
        if base != file_name {
            continue;
        }

        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let partial = dest.with_extension("partial");
        fs::write(&partial, &bytes)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&partial, fs::Permissions::from_mode(0o755))?;
        }
        fs::rename(&partial, dest)?;
        return Ok(());
    }

    Err(LoaderError::DriverError {
        message: format!("archive does not contain {}", file_name),
    })
}

#[derive(Debug, Clone)]
pub struct DriverManager {
    http: Client,
    cache_dir: PathBuf,
    manifest_url: String,
    platform: Option<String>,
}

impl DriverManager {
    /// 使用系統快取目錄 (`~/.cache/ecosloader/drivers` 等)
    pub fn new() -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| LoaderError::DriverError {
                message: "no cache directory on this system".to_string(),
            })?
            .join("ecosloader")
            .join("drivers");
        Self::with_cache_dir(cache_dir)
    }

    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            http: Client::builder().build()?,
            cache_dir: cache_dir.into(),
            manifest_url: KNOWN_GOOD_VERSIONS_URL.to_string(),
            platform: None,
        })
    }

    pub fn with_manifest_url(mut self, url: impl Into<String>) -> Self {
        self.manifest_url = url.into();
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    fn target_platform(&self) -> Result<String> {
        match &self.platform {
            Some(platform) => Ok(platform.clone()),
            None => platform().map(str::to_string),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn cached_path(&self, version: &str) -> Result<PathBuf> {
        Ok(self
            .cache_dir
            .join(version)
            .join(self.target_platform()?)
            .join(driver_file_name()))
    }

    pub async fn fetch_manifest(&self) -> Result<Manifest> {
        tracing::debug!("📥 fetching driver manifest {}", self.manifest_url);
        let response = self.http.get(&self.manifest_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoaderError::HttpStatusError {
                status: status.as_u16(),
                url: self.manifest_url.clone(),
            });
        }
        Ok(response.json().await?)
    }

    /// 回傳可執行的 chromedriver 路徑，必要時下載
    pub async fn install(&self, requested: &DriverVersion) -> Result<PathBuf> {
        if let DriverVersion::Exact(version) = requested {
            let cached = self.cached_path(version)?;
            if requested.is_full() && cached.exists() {
                tracing::debug!("📦 chromedriver {} cached at {}", version, cached.display());
                return Ok(cached);
            }
        }

        let manifest = self.fetch_manifest().await?;
        let platform = self.target_platform()?;
        let (version, url) = resolve_download(&manifest, requested, &platform)?;
        let dest = self.cached_path(&version)?;
        if dest.exists() {
            tracing::debug!("📦 chromedriver {} cached at {}", version, dest.display());
            return Ok(dest);
        }

        tracing::info!("📥 downloading chromedriver {} ({})", version, platform);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoaderError::HttpStatusError {
                status: status.as_u16(),
                url,
            });
        }
        let archive = response.bytes().await?;
        extract_driver(&archive, &dest)?;
        tracing::info!("✅ chromedriver {} installed at {}", version, dest.display());
        Ok(dest)
    }

    /// 配合本機 Chrome 的版本安裝；偵測失敗時改用最新版
    pub async fn install_for_local_browser(&self) -> Result<PathBuf> {
        let requested = match detect_browser_version().await {
            Ok(version) => DriverVersion::Exact(version),
            Err(e) => {
                tracing::warn!("⚠️ {}; falling back to the latest chromedriver", e);
                DriverVersion::Latest
            }
        };
        self.install(&requested).await
    }
}

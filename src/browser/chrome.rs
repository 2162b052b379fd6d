use anyhow::{bail, Context, Result};
use log::info;
use serde::Deserialize;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::time::{Duration, Instant};

const DEBUG_PORT_START: u16 = 9300;
const DEBUG_PORT_END: u16 = 9800;
const READY_POLL_INTERVAL_MS: u64 = 500;

#[derive(Debug, Deserialize)]
struct CdpTarget {
    #[serde(rename = "type")]
    target_type: String,
    #[serde(default)]
    url: String,
}

/// Allocate an available debugging port by probing localhost listeners.
pub fn allocate_port() -> Result<u16> {
    for port in DEBUG_PORT_START..=DEBUG_PORT_END {
        if TcpListener::bind(("127.0.0.1", port)).is_ok() {
            return Ok(port);
        }
    }

    bail!(
        "No available Chrome debugging port in range {}-{}",
        DEBUG_PORT_START,
        DEBUG_PORT_END
    )
}

/// Detect Chrome installation path on the current OS
pub fn detect_chrome() -> Result<PathBuf> {
    if let Ok(custom) = std::env::var("CHROME_BIN") {
        let path = PathBuf::from(custom);
        if path.exists() {
            return Ok(path);
        }
    }

    #[cfg(target_os = "macos")]
    {
        let paths = [
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ];
        for p in &paths {
            let path = PathBuf::from(p);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        let paths = [
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ];
        for p in &paths {
            let path = PathBuf::from(p);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    let names = [
        "google-chrome",
        "google-chrome-stable",
        "chromium-browser",
        "chromium",
        "chrome",
    ];
    for name in &names {
        if let Ok(path) = which::which(name) {
            return Ok(path);
        }
    }

    bail!("Could not find Chrome browser. Please install Google Chrome or set CHROME_BIN.")
}

/// Launch Chrome on an editor URL with a debugging port and return (Child, port).
///
/// The user data dir is supplied by the caller; signing in to platforms
/// happens there, outside this crate.
pub fn launch_chrome_with_debug(
    chrome_path: &Path,
    user_data_dir: &Path,
    url: &str,
) -> Result<(Child, u16)> {
    let port = allocate_port()?;
    info!(
        "[Chrome launch] user_data_dir={} port={} url={}",
        user_data_dir.display(),
        port,
        url
    );

    let child = Command::new(chrome_path)
        .arg(format!("--user-data-dir={}", user_data_dir.display()))
        .arg(format!("--remote-debugging-port={}", port))
        .arg("--new-window")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-default-apps")
        .arg("--disable-background-timer-throttling")
        .arg("--disable-backgrounding-occluded-windows")
        .arg("--disable-renderer-backgrounding")
        .arg(format!("--window-size={},{}", 1280, 800))
        .arg(url)
        .spawn()
        .context("Failed to launch Chrome")?;

    info!("Launched Chrome (PID: {}, port: {})", child.id(), port);
    Ok((child, port))
}

/// Wait until the debugging endpoint answers and exposes a page target.
pub async fn wait_for_chrome_ready(port: u16, timeout: Duration) -> Result<()> {
    let start = Instant::now();
    let mut saw_version = false;

    loop {
        if start.elapsed() > timeout {
            if saw_version {
                bail!(
                    "CHROME_NOT_READY: debugging port {} answered but no page target appeared within {:?}",
                    port,
                    timeout
                );
            }
            bail!(
                "CHROME_NOT_READY: Chrome did not answer on port {} within {:?}",
                port,
                timeout
            );
        }

        if is_port_version_ready(port).await {
            saw_version = true;
            match page_targets(port).await {
                Ok(urls) if !urls.is_empty() => {
                    info!(
                        "Chrome is ready on port {} ({} page target(s), first={})",
                        port,
                        urls.len(),
                        urls[0]
                    );
                    return Ok(());
                }
                Ok(_) => info!("Chrome answered on port {}, waiting for a page target...", port),
                Err(e) => info!("Chrome answered on port {}, page target check failed: {}", port, e),
            }
        }

        tokio::time::sleep(Duration::from_millis(READY_POLL_INTERVAL_MS)).await;
    }
}

async fn is_port_version_ready(port: u16) -> bool {
    let version_url = format!("http://127.0.0.1:{}/json/version", port);
    match reqwest::get(&version_url).await {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}

/// URLs of the page targets exposed on `port`.
pub async fn page_targets(port: u16) -> Result<Vec<String>> {
    let list_url = format!("http://127.0.0.1:{}/json/list", port);
    let resp = reqwest::get(&list_url)
        .await
        .context("Failed to request Chrome json/list")?;

    if !resp.status().is_success() {
        return Ok(Vec::new());
    }

    let targets: Vec<CdpTarget> = resp
        .json()
        .await
        .context("Chrome json/list returned malformed JSON")?;
    Ok(parse_page_targets(targets))
}

fn parse_page_targets(targets: Vec<CdpTarget>) -> Vec<String> {
    targets
        .into_iter()
        .filter(|target| target.target_type == "page")
        .map(|target| target.url)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_page_targets_are_kept() {
        let targets: Vec<CdpTarget> = serde_json::from_str(
            r#"[
                {"type": "service_worker", "url": "chrome-extension://x"},
                {"type": "page", "url": "https://creator.douyin.com/creator-micro/content/upload"}
            ]"#,
        )
        .unwrap();
        assert_eq!(
            parse_page_targets(targets),
            vec!["https://creator.douyin.com/creator-micro/content/upload".to_string()]
        );
    }

    #[test]
    fn allocated_port_is_in_range() {
        let port = allocate_port().unwrap();
        assert!((DEBUG_PORT_START..=DEBUG_PORT_END).contains(&port));
    }

    #[tokio::test]
    #[ignore] // needs a local Chrome: cargo test -- --ignored
    async fn launches_and_reaches_ready() {
        let chrome = detect_chrome().expect("Chrome not installed");
        let dir = std::env::temp_dir().join("multi-platform-autofill-test-profile");
        let (mut child, port) =
            launch_chrome_with_debug(&chrome, &dir, "about:blank").expect("launch failed");
        let ready = wait_for_chrome_ready(port, Duration::from_secs(30)).await;
        let _ = child.kill();
        assert!(ready.is_ok());
    }
}

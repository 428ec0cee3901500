// src/fetch/archive.rs
use reqwest::Client;
use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};
use tokio::{fs as tokio_fs, io::AsyncWriteExt, time::Instant};
use tracing::{debug, info, instrument, warn};
use zip::ZipArchive;

use crate::config::Config;
use crate::error::{PipelineError, Result, Stage};

/// Download `url` to `dest`. Bytes go to `<dest>.part` and are renamed into
/// place once the body is complete.
#[instrument(level = "info", skip(client, dest), fields(dest = %dest.display()))]
pub async fn download_zip(client: &Client, url: &str, dest: &Path) -> Result<PathBuf> {
    let download_err = |source| PipelineError::Download {
        url: url.to_string(),
        source,
    };

    if let Some(parent) = dest.parent() {
        tokio_fs::create_dir_all(parent)
            .await
            .map_err(|e| PipelineError::io(Stage::Fetch, parent, e))?;
    }

    let start = Instant::now();
    let mut resp = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(download_err)?;

    let part = dest.with_extension("zip.part");
    let mut file = tokio_fs::File::create(&part)
        .await
        .map_err(|e| PipelineError::io(Stage::Fetch, &part, e))?;

    let mut total: u64 = 0;
    while let Some(chunk) = resp.chunk().await.map_err(download_err)? {
        file.write_all(&chunk)
            .await
            .map_err(|e| PipelineError::io(Stage::Fetch, &part, e))?;
        total += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| PipelineError::io(Stage::Fetch, &part, e))?;
    drop(file);

    tokio_fs::rename(&part, dest)
        .await
        .map_err(|e| PipelineError::io(Stage::Fetch, dest, e))?;

    info!(bytes = total, elapsed = ?start.elapsed(), "downloaded");
    Ok(dest.to_path_buf())
}

/// Unpack every entry of `zip_path` under `out_dir`.
#[instrument(level = "info", skip(zip_path, out_dir), fields(zip = %zip_path.display()))]
pub fn extract_zip(zip_path: &Path, out_dir: &Path) -> Result<()> {
    let extract_err = |source| PipelineError::Extract {
        path: zip_path.to_path_buf(),
        source,
    };

    fs::create_dir_all(out_dir).map_err(|e| PipelineError::io(Stage::Fetch, out_dir, e))?;
    let file = File::open(zip_path).map_err(|e| PipelineError::io(Stage::Fetch, zip_path, e))?;
    let mut archive = ZipArchive::new(file).map_err(extract_err)?;
    let entries = archive.len();
    archive.extract(out_dir).map_err(extract_err)?;

    info!(entries, out = %out_dir.display(), "extracted");
    Ok(())
}

/// Rename `work_dir/from` to `work_dir/alias`, replacing a stale `alias`.
pub fn rename_extracted(work_dir: &Path, from: &str, alias: &str) -> Result<PathBuf> {
    let src = work_dir.join(from);
    let dst = work_dir.join(alias);
    if src == dst {
        return Ok(dst);
    }
    if !src.is_dir() {
        return Err(PipelineError::io(
            Stage::Fetch,
            &src,
            io::Error::new(io::ErrorKind::NotFound, "extracted directory not found"),
        ));
    }
    if dst.exists() {
        warn!(path = %dst.display(), "replacing previous extraction");
        fs::remove_dir_all(&dst).map_err(|e| PipelineError::io(Stage::Fetch, &dst, e))?;
    }
    fs::rename(&src, &dst).map_err(|e| PipelineError::io(Stage::Fetch, &dst, e))?;
    debug!(from = %src.display(), to = %dst.display(), "renamed extracted directory");
    Ok(dst)
}

/// Download the archive (unless a non-empty copy is already on disk),
/// extract it into `work_dir` and rename the data directory to its alias.
pub async fn fetch_and_extract(client: &Client, cfg: &Config) -> Result<PathBuf> {
    let archive = cfg.archive_path()?;

    let cached = tokio_fs::metadata(&archive)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false);
    if cached {
        info!(path = %archive.display(), "archive already downloaded, skipping");
    } else {
        info!(url = %cfg.archive_url, "downloading archive");
        download_zip(client, &cfg.archive_url, &archive).await?;
    }

    let work_dir = cfg.work_dir.clone();
    let extracted_dir = cfg.extracted_dir.clone();
    let alias = cfg.data_alias.clone();
    tokio::task::spawn_blocking(move || {
        extract_zip(&archive, &work_dir)?;
        rename_extracted(&work_dir, &extracted_dir, &alias)
    })
    .await
    .map_err(|e| PipelineError::io(Stage::Fetch, &cfg.work_dir, io::Error::new(io::ErrorKind::Other, e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;
    use zip::CompressionMethod;

    fn build_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
            for (name, body) in entries {
                zip.start_file(*name, options).unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        fs::write(path, buf).unwrap();
    }

    #[test]
    fn extracts_and_renames() {
        let dir = tempdir().unwrap();
        let zip_path = dir.path().join("pack.zip");
        build_zip(
            &zip_path,
            &[
                ("2021 Census GCP/2021Census_G01_AUST_SAL.csv", "SAL_CODE_2021,Tot_P_P\n"),
                ("Metadata/geog.csv", "ASGS_Structure\n"),
            ],
        );
        let work = dir.path().join("census");

        extract_zip(&zip_path, &work).unwrap();
        let data = rename_extracted(&work, "2021 Census GCP", "data").unwrap();

        assert!(data.join("2021Census_G01_AUST_SAL.csv").is_file());
        assert!(work.join("Metadata/geog.csv").is_file());
        assert!(!work.join("2021 Census GCP").exists());
    }

    #[test]
    fn rename_replaces_stale_alias() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("fresh")).unwrap();
        fs::write(dir.path().join("fresh/new.csv"), "x").unwrap();
        fs::create_dir_all(dir.path().join("data")).unwrap();
        fs::write(dir.path().join("data/old.csv"), "x").unwrap();

        let data = rename_extracted(dir.path(), "fresh", "data").unwrap();
        assert!(data.join("new.csv").exists());
        assert!(!data.join("old.csv").exists());
    }

    #[test]
    fn rename_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let err = rename_extracted(dir.path(), "absent", "data").unwrap_err();
        assert_eq!(err.stage(), Stage::Fetch);
    }

    #[test]
    fn corrupt_archive_is_an_extract_error() {
        let dir = tempdir().unwrap();
        let zip_path = dir.path().join("bad.zip");
        fs::write(&zip_path, b"definitely not a zip").unwrap();

        let err = extract_zip(&zip_path, dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Extract { .. }));
    }

    /// Answer a single HTTP request on a loopback port with `status` and
    /// `body`, returning the URL to fetch.
    async fn serve_once(status: &'static str, body: Vec<u8>) -> String {
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut req = Vec::new();
            let mut buf = [0u8; 1024];
            while !req.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = sock.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                req.extend_from_slice(&buf[..n]);
            }
            let head = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            sock.write_all(head.as_bytes()).await.unwrap();
            sock.write_all(&body).await.unwrap();
            sock.shutdown().await.unwrap();
        });
        format!("http://{addr}/pack.zip")
    }

    #[tokio::test]
    async fn download_writes_body_and_removes_part_file() {
        let dir = tempdir().unwrap();
        let zip_path = dir.path().join("source.zip");
        build_zip(&zip_path, &[("tables/a.csv", "SAL_CODE_2021\nSAL1\n")]);
        let body = fs::read(&zip_path).unwrap();

        let url = serve_once("200 OK", body.clone()).await;
        let dest = dir.path().join("census/pack.zip");
        let got = download_zip(&Client::new(), &url, &dest).await.unwrap();

        assert_eq!(got, dest);
        assert_eq!(fs::read(&dest).unwrap(), body);
        assert!(!dest.with_extension("zip.part").exists());
    }

    #[tokio::test]
    async fn http_error_status_is_a_download_error() {
        let dir = tempdir().unwrap();
        let url = serve_once("404 Not Found", b"missing".to_vec()).await;
        let dest = dir.path().join("pack.zip");

        let err = download_zip(&Client::new(), &url, &dest).await.unwrap_err();
        assert!(matches!(err, PipelineError::Download { ref url, .. } if url.ends_with("/pack.zip")));
        assert_eq!(err.stage(), Stage::Fetch);
        assert!(!dest.exists());
        assert!(!dest.with_extension("zip.part").exists());
    }

    #[tokio::test]
    async fn cached_archive_skips_download() {
        let dir = tempdir().unwrap();
        let work = dir.path().join("census");
        fs::create_dir_all(&work).unwrap();
        build_zip(&work.join("pack.zip"), &[("tables/a.csv", "x\n")]);

        let cfg = Config {
            // unroutable; must never be contacted
            archive_url: "http://127.0.0.1:9/pack.zip".into(),
            work_dir: work.clone(),
            extracted_dir: "tables".into(),
            data_alias: "data".into(),
            ..Config::default()
        };

        let data = fetch_and_extract(&Client::new(), &cfg).await.unwrap();
        assert_eq!(data, work.join("data"));
        assert!(data.join("a.csv").is_file());
    }
}

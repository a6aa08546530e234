//! OCR through the `pdftoppm` and `tesseract` command line tools.

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::PageRecognizer;
use crate::error::OcrError;
use crate::models::config::OcrConfig;
use crate::pdf::LoadedPdf;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Renders a page with poppler's `pdftoppm` and recognizes it with `tesseract`.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    dpi: u32,
    language: String,
    timeout: Duration,
}

impl TesseractOcr {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            dpi: config.render_dpi,
            language: config.language.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Whether both tools can be executed.
    pub fn is_available() -> bool {
        let probe = |tool: &str, flag: &str| {
            Command::new(tool)
                .arg(flag)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .is_ok()
        };
        probe("pdftoppm", "-v") && probe("tesseract", "--version")
    }

    fn render(&self, pdf_path: &Path, out_prefix: &Path, page: u32, deadline: Instant) -> Result<(), OcrError> {
        let mut cmd = Command::new("pdftoppm");
        cmd.arg("-png")
            .arg("-singlefile")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-f")
            .arg(page.to_string())
            .arg("-l")
            .arg(page.to_string())
            .arg(pdf_path)
            .arg(out_prefix);

        run_bounded(cmd, "pdftoppm", deadline, self.timeout).map_err(|e| match e {
            OcrError::Recognition(reason) => OcrError::Render { page, reason },
            other => other,
        })
    }

    fn recognize(&self, image_path: &Path, out_base: &Path, deadline: Instant) -> Result<(), OcrError> {
        let mut cmd = Command::new("tesseract");
        cmd.arg(image_path)
            .arg(out_base)
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg("3");

        run_bounded(cmd, "tesseract", deadline, self.timeout)
    }
}

impl PageRecognizer for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize_page(&self, pdf: &LoadedPdf, page: u32) -> Result<String, OcrError> {
        let deadline = Instant::now() + self.timeout;
        let work = tempfile::tempdir()
            .map_err(|e| OcrError::Recognition(format!("failed to create temp dir: {}", e)))?;

        let pdf_path = work.path().join("statement.pdf");
        std::fs::write(&pdf_path, pdf.raw())
            .map_err(|e| OcrError::Render { page, reason: e.to_string() })?;

        let prefix = work.path().join("page");
        self.render(&pdf_path, &prefix, page, deadline)?;

        let image_path = prefix.with_extension("png");
        if !image_path.exists() {
            return Err(OcrError::Render {
                page,
                reason: "pdftoppm produced no image".to_string(),
            });
        }
        trace!("Rendered page {} at {} dpi", page, self.dpi);

        let out_base = work.path().join("ocr");
        self.recognize(&image_path, &out_base, deadline)?;

        let text = std::fs::read_to_string(out_base.with_extension("txt"))
            .map_err(|e| OcrError::Recognition(format!("missing tesseract output: {}", e)))?;

        debug!("tesseract recognized {} chars on page {}", text.len(), page);
        Ok(text)
    }
}

/// Run a tool to completion, killing it once `deadline` passes.
///
/// Both tools write their results to files. Stderr is spooled to an
/// anonymous temp file and only surfaces in the error message.
fn run_bounded(
    mut cmd: Command,
    tool: &str,
    deadline: Instant,
    budget: Duration,
) -> Result<(), OcrError> {
    let stderr_file = tempfile::tempfile()
        .map_err(|e| OcrError::Recognition(format!("failed to create stderr buffer: {}", e)))?;
    let stderr_reader = stderr_file
        .try_clone()
        .map_err(|e| OcrError::Recognition(e.to_string()))?;

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::from(stderr_file))
        .spawn()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => OcrError::ToolUnavailable(tool.to_string()),
            _ => OcrError::Recognition(format!("failed to start {}: {}", tool, e)),
        })?;

    loop {
        match child.try_wait() {
            Ok(Some(status)) if status.success() => return Ok(()),
            Ok(Some(status)) => {
                let stderr = read_all(stderr_reader);
                return Err(OcrError::Recognition(format!(
                    "{} exited with {}: {}",
                    tool,
                    status,
                    stderr.trim()
                )));
            }
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(OcrError::Timeout(budget));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                return Err(OcrError::Recognition(format!("waiting for {}: {}", tool, e)));
            }
        }
    }
}

fn read_all(mut file: File) -> String {
    use std::io::{Read, Seek, SeekFrom};

    let mut buffer = String::new();
    if file.seek(SeekFrom::Start(0)).is_ok() {
        let _ = file.read_to_string(&mut buffer);
    }
    buffer
}

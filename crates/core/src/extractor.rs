use crate::error::IngestError;
use base64::{engine::general_purpose::STANDARD, Engine};
use lopdf::Document as PdfDocument;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionMethod {
    Native,
    Ocr,
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMethod::Native => write!(f, "native"),
            ExtractionMethod::Ocr => write!(f, "ocr"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategyOutput {
    pub text: String,
    pub missing_pages: usize,
}

/// One way of turning a file into plain text.
pub trait TextStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn method(&self) -> ExtractionMethod;

    fn extract(&self, path: &Path) -> Result<StrategyOutput, IngestError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    /// `None` when every strategy came up empty.
    pub method: Option<ExtractionMethod>,
    pub strategy: Option<&'static str>,
    /// Pages without text in the first strategy that ran to completion.
    pub missing_pages: usize,
    pub failures: Vec<String>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.method.is_none()
    }

    pub fn skip_reason(&self) -> String {
        if self.failures.is_empty() {
            "no extractable text".to_string()
        } else {
            format!("no extractable text ({})", self.failures.join("; "))
        }
    }
}

/// Ordered list of strategies; the first non-blank output wins.
pub struct TextExtractor {
    strategies: Vec<Box<dyn TextStrategy>>,
}

impl TextExtractor {
    pub fn new(strategies: Vec<Box<dyn TextStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn native_only() -> Self {
        Self::new(vec![Box::new(NativePdfStrategy)])
    }

    pub fn with_tesseract(config: TesseractConfig) -> Self {
        Self::new(vec![
            Box::new(NativePdfStrategy),
            Box::new(TesseractOcrStrategy::new(config)),
        ])
    }

    pub fn with_ocr_endpoint(config: OcrEndpointConfig) -> Self {
        Self::new(vec![
            Box::new(NativePdfStrategy),
            Box::new(EndpointOcrStrategy::new(config)),
        ])
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|strategy| strategy.name()).collect()
    }

    pub fn extract(&self, path: &Path) -> Extraction {
        let mut missing_pages = None;
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            match strategy.extract(path) {
                Ok(output) => {
                    let missing = *missing_pages.get_or_insert(output.missing_pages);
                    if !output.text.trim().is_empty() {
                        debug!(
                            path = %path.display(),
                            strategy = strategy.name(),
                            "text extracted"
                        );
                        return Extraction {
                            text: output.text,
                            method: Some(strategy.method()),
                            strategy: Some(strategy.name()),
                            missing_pages: missing,
                            failures,
                        };
                    }
                    failures.push(format!("{}: empty output", strategy.name()));
                }
                Err(error) => {
                    warn!(
                        path = %path.display(),
                        strategy = strategy.name(),
                        error = %error,
                        "extraction strategy failed"
                    );
                    failures.push(format!("{}: {error}", strategy.name()));
                }
            }
        }

        Extraction {
            text: String::new(),
            method: None,
            strategy: None,
            missing_pages: missing_pages.unwrap_or(0),
            failures,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NativePdfStrategy;

impl TextStrategy for NativePdfStrategy {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Native
    }

    fn extract(&self, path: &Path) -> Result<StrategyOutput, IngestError> {
        let document =
            PdfDocument::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut text = String::new();
        let mut missing_pages = 0;
        for (page_no, _page_id) in document.get_pages() {
            match document.extract_text(&[page_no]) {
                Ok(page) if !page.trim().is_empty() => text.push_str(&page),
                Ok(_) => missing_pages += 1,
                Err(error) => {
                    debug!(page = page_no, error = %error, "page text extraction failed");
                    missing_pages += 1;
                }
            }
        }

        if missing_pages > 0 {
            warn!(
                path = %path.display(),
                missing_pages,
                "pages without native text"
            );
        }

        Ok(StrategyOutput {
            text,
            missing_pages,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TesseractConfig {
    pub tesseract_bin: String,
    pub pdftoppm_bin: String,
    pub language: String,
    pub dpi: u32,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            tesseract_bin: "tesseract".to_string(),
            pdftoppm_bin: "pdftoppm".to_string(),
            language: "eng".to_string(),
            dpi: 300,
        }
    }
}

/// Rasterises with `pdftoppm` and recognises each page image with `tesseract`.
pub struct TesseractOcrStrategy {
    config: TesseractConfig,
}

impl TesseractOcrStrategy {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
        let prefix = out_dir.join("page");
        let dpi = self.config.dpi.to_string();
        run_tool(
            &self.config.pdftoppm_bin,
            &[
                OsStr::new("-r"),
                OsStr::new(&dpi),
                OsStr::new("-png"),
                pdf.as_os_str(),
                prefix.as_os_str(),
            ],
        )?;

        let mut images = std::fs::read_dir(out_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| has_extension(path, &["png"]))
            .collect::<Vec<_>>();
        images.sort_unstable();
        Ok(images)
    }

    fn recognize(&self, image: &Path) -> Result<String, IngestError> {
        run_tool(
            &self.config.tesseract_bin,
            &[
                image.as_os_str(),
                OsStr::new("stdout"),
                OsStr::new("-l"),
                OsStr::new(&self.config.language),
            ],
        )
    }
}

impl TextStrategy for TesseractOcrStrategy {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Ocr
    }

    fn extract(&self, path: &Path) -> Result<StrategyOutput, IngestError> {
        let scratch = tempfile::tempdir()?;
        let images = if has_extension(path, IMAGE_EXTENSIONS) {
            vec![path.to_path_buf()]
        } else {
            self.rasterize(path, scratch.path())?
        };

        let mut pages = Vec::new();
        let mut missing_pages = 0;
        let mut first_error = None;
        let mut failed_pages = 0;
        for image in &images {
            match self.recognize(image) {
                Ok(page) if !page.trim().is_empty() => {
                    pages.push(page.replace('\u{000c}', "").trim().to_string())
                }
                Ok(_) => missing_pages += 1,
                Err(error) => {
                    debug!(image = %image.display(), error = %error, "ocr failed for page image");
                    missing_pages += 1;
                    failed_pages += 1;
                    first_error.get_or_insert(error);
                }
            }
        }

        // A tool that fails on every page is an error, not an empty scan.
        if failed_pages == images.len() {
            if let Some(error) = first_error {
                return Err(error);
            }
        }

        Ok(StrategyOutput {
            text: pages.join("\n"),
            missing_pages,
        })
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp"];

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            extensions
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
}

fn run_tool(bin: &str, args: &[&OsStr]) -> Result<String, IngestError> {
    let output = match Command::new(bin).args(args).output() {
        Ok(output) => output,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return Err(IngestError::OcrFailed(format!("{bin} not found on PATH")));
        }
        Err(error) => return Err(IngestError::Io(error)),
    };

    if !output.status.success() {
        return Err(IngestError::OcrFailed(format!(
            "{bin} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[derive(Debug, Clone, Serialize)]
struct OcrRequest {
    pdf_base64: String,
    source_path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrResponse {
    pages: Option<Vec<OcrPage>>,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrPage {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OcrEndpointConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

/// Sends the whole file to an HTTP OCR service.
pub struct EndpointOcrStrategy {
    config: OcrEndpointConfig,
}

impl EndpointOcrStrategy {
    pub fn new(config: OcrEndpointConfig) -> Self {
        Self { config }
    }
}

impl TextStrategy for EndpointOcrStrategy {
    fn name(&self) -> &'static str {
        "ocr-endpoint"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Ocr
    }

    fn extract(&self, path: &Path) -> Result<StrategyOutput, IngestError> {
        let bytes = std::fs::read(path)?;
        let payload = OcrRequest {
            pdf_base64: STANDARD.encode(bytes),
            source_path: path.to_string_lossy().to_string(),
        };

        let mut request = Client::new()
            .post(&self.config.endpoint)
            .header("content-type", "application/json")
            .json(&payload);

        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send()?;

        if !response.status().is_success() {
            return Err(IngestError::OcrFailed(format!(
                "ocr request to {} returned {}",
                self.config.endpoint,
                response.status()
            )));
        }

        let payload: OcrResponse = response.json()?;
        Ok(StrategyOutput {
            text: payload_to_text(&payload),
            missing_pages: 0,
        })
    }
}

fn payload_to_text(payload: &OcrResponse) -> String {
    if let Some(listed) = &payload.pages {
        let mut listed = listed
            .iter()
            .enumerate()
            .filter_map(|(index, page)| {
                let text = page.text.as_deref().map(str::trim).unwrap_or_default();
                if text.is_empty() {
                    None
                } else {
                    Some((page.page.unwrap_or(index as u32 + 1), text))
                }
            })
            .collect::<Vec<_>>();
        listed.sort_by_key(|(number, _)| *number);

        if !listed.is_empty() {
            return listed
                .into_iter()
                .map(|(_, text)| text)
                .collect::<Vec<_>>()
                .join("\n");
        }
    }

    payload
        .text
        .as_deref()
        .map(|raw| {
            raw.split('\u{000c}')
                .map(str::trim)
                .filter(|chunk| !chunk.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

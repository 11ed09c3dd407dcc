use std::collections::HashMap;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::GenericImageView;

use super::types::TextRecognizer;
use super::RecognitionError;
use crate::config;

/// Characters that can legitimately appear on a CCCD card: ASCII letters and
/// digits, every precomposed Vietnamese vowel in both cases, đ/Đ, and the
/// separators used in dates and addresses.
pub const CARD_CHAR_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789\
áàảãạăắằẳẵặâấầẩẫậéèẻẽẹêếềểễệíìỉĩịóòỏõọôốồổỗộơớờởỡợúùủũụưứừửữựýỳỷỹỵđ\
ÁÀẢÃẠĂẮẰẲẴẶÂẤẦẨẪẬÉÈẺẼẸÊẾỀỂỄỆÍÌỈĨỊÓÒỎÕỌÔỐỒỔỖỘƠỚỜỞỠỢÚÙỦŨỤƯỨỪỬỮỰÝỲỶỸỴĐ /.-,";

/// Page segmentation mode 6: assume a single uniform block of text.
const DEFAULT_PAGE_SEGMENTATION: u8 = 6;

// ── TesseractCli ──────────────────────────────────────────

/// Runs the system `tesseract` binary on a temporary PNG.
///
/// Stateless: every call spawns its own process, so one instance can be
/// shared across recognition workers.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: PathBuf,
    tessdata_dir: Option<PathBuf>,
    page_segmentation: u8,
    whitelist: Option<String>,
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new()
    }
}

impl TesseractCli {
    /// `tesseract` from `PATH`, tessdata from `TESSDATA_PREFIX` when set,
    /// PSM 6 and the card character whitelist.
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            tessdata_dir: config::tessdata_dir(),
            page_segmentation: DEFAULT_PAGE_SEGMENTATION,
            whitelist: Some(CARD_CHAR_WHITELIST.to_string()),
        }
    }

    pub fn with_binary(mut self, binary: &Path) -> Self {
        self.binary = binary.to_path_buf();
        self
    }

    pub fn with_tessdata_dir(mut self, dir: &Path) -> Self {
        self.tessdata_dir = Some(dir.to_path_buf());
        self
    }

    pub fn with_page_segmentation(mut self, psm: u8) -> Self {
        self.page_segmentation = psm;
        self
    }

    /// Let the engine emit any character.
    pub fn without_whitelist(mut self) -> Self {
        self.whitelist = None;
        self
    }

    /// Every `+`-joined language must have its traineddata when a tessdata
    /// directory is configured. Without one, tesseract's own lookup decides.
    fn check_language(&self, language: &str) -> Result<(), RecognitionError> {
        let Some(dir) = &self.tessdata_dir else {
            return Ok(());
        };
        for lang in language.split('+').filter(|l| !l.is_empty()) {
            let data = dir.join(format!("{lang}.traineddata"));
            if !data.exists() {
                return Err(RecognitionError::EngineUnavailable(format!(
                    "missing {}",
                    data.display()
                )));
            }
        }
        Ok(())
    }

    fn build_args(&self, image_path: &Path, language: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            image_path.as_os_str().to_os_string(),
            "stdout".into(),
            "-l".into(),
            language.into(),
            "--psm".into(),
            self.page_segmentation.to_string().into(),
        ];
        if let Some(dir) = &self.tessdata_dir {
            args.push("--tessdata-dir".into());
            args.push(dir.as_os_str().to_os_string());
        }
        if let Some(whitelist) = &self.whitelist {
            args.push("-c".into());
            args.push(format!("tessedit_char_whitelist={whitelist}").into());
        }
        args
    }
}

impl TextRecognizer for TesseractCli {
    fn recognize(&self, image_png: &[u8], language: &str) -> Result<String, RecognitionError> {
        self.check_language(language)?;

        let mut file = tempfile::Builder::new()
            .prefix("cccd-ocr-")
            .suffix(".png")
            .tempfile()?;
        file.write_all(image_png)?;
        file.flush()?;

        let output = Command::new(&self.binary)
            .args(self.build_args(file.path(), language))
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => RecognitionError::EngineUnavailable(format!(
                    "{} not found on PATH",
                    self.binary.display()
                )),
                _ => RecognitionError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognitionError::Engine(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        tracing::debug!(chars = text.chars().count(), language, "Tesseract finished");
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "tesseract-cli"
    }
}

// ── MockTextRecognizer ────────────────────────────────────

/// Mock recognizer for unit testing without tesseract.
///
/// Returns fixed text, optionally routed by the width of the submitted
/// image so front and back sides can carry different text. Counts calls.
pub struct MockTextRecognizer {
    text: String,
    by_width: HashMap<u32, String>,
    fail: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockTextRecognizer {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            by_width: HashMap::new(),
            fail: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail: Some(message.to_string()),
            ..Self::new("")
        }
    }

    /// Return `text` for images exactly `width` pixels wide.
    pub fn with_text_for_width(mut self, width: u32, text: &str) -> Self {
        self.by_width.insert(width, text.to_string());
        self
    }

    /// Sleep before answering (blocking), to simulate a slow engine.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextRecognizer for MockTextRecognizer {
    fn recognize(&self, image_png: &[u8], _language: &str) -> Result<String, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if let Some(message) = &self.fail {
            return Err(RecognitionError::Engine(message.clone()));
        }

        if !self.by_width.is_empty() {
            let width = image::load_from_memory(image_png)
                .map(|img| img.dimensions().0)
                .ok();
            if let Some(text) = width.and_then(|w| self.by_width.get(&w)) {
                return Ok(text.clone());
            }
        }
        Ok(self.text.clone())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

use thiserror::Error;

pub mod config;
pub mod decoder;
pub mod extractor;
pub mod images;
pub mod ocr;
pub mod parser;
pub mod pipeline;
pub mod text;
pub mod types;

pub use config::HeuristicsConfig;
pub use decoder::{DocumentDecoder, LopdfDecoder};
pub use extractor::{
    document_profile, extract_outline, extract_outline_or_default, extract_outline_with,
    extract_text, extract_text_with, try_extract_outline, OutlineExtractor, Stage,
};
pub use ocr::{OcrCapability, OcrEngine, TesseractOcr};
pub use types::*;

#[derive(Debug, Error)]
pub enum OutlineError {
    #[error("cannot open PDF: {0}")]
    Open(String),
    #[error("Document is encrypted")]
    Encrypted,
    #[error("pipeline failed after stage '{stage}': {message}")]
    Stage { stage: Stage, message: String },
    #[error("metadata lookup failed: {0}")]
    Lookup(String),
    #[error("OCR failed: {0}")]
    Ocr(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

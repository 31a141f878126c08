use std::collections::VecDeque;

use thiserror::Error;

use ocv_core::model::BBox;

/// Output of recognizing one diagram crop: a bare piece placement plus the
/// recognizer's confidence in it.
#[derive(Clone, Debug, PartialEq)]
pub struct RecognizedPosition {
    pub placement: String,
    pub confidence: f32,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RecognitionError {
    #[error("recognizer unavailable")]
    Unavailable,
    #[error("no board found in the selected region")]
    NoBoard,
    #[error("recognizer failed: {0}")]
    Failed(String),
}

/// Diagram detection, position recognition and text extraction for
/// rendered PDF pages.
pub trait Recognizer {
    fn detect_diagrams(&mut self, page: u32) -> Result<Vec<BBox>, RecognitionError>;
    fn recognize(&mut self, page: u32, bbox: BBox) -> Result<RecognizedPosition, RecognitionError>;
    /// Text layer of a page; OCR fallback is the caller's concern.
    fn extract_text(&mut self, page: u32) -> Result<String, RecognitionError>;
}

#[derive(Default)]
pub struct NoopRecognizer;

impl Recognizer for NoopRecognizer {
    fn detect_diagrams(&mut self, _page: u32) -> Result<Vec<BBox>, RecognitionError> {
        Ok(Vec::new())
    }

    fn recognize(
        &mut self,
        _page: u32,
        _bbox: BBox,
    ) -> Result<RecognizedPosition, RecognitionError> {
        Err(RecognitionError::Unavailable)
    }

    fn extract_text(&mut self, _page: u32) -> Result<String, RecognitionError> {
        Ok(String::new())
    }
}

/// Test double fed with canned outcomes, consumed in FIFO order.
#[derive(Default)]
pub struct ScriptedRecognizer {
    detections: VecDeque<Vec<BBox>>,
    recognitions: VecDeque<Result<RecognizedPosition, RecognitionError>>,
    page_texts: std::collections::HashMap<u32, String>,
    recognize_calls: usize,
}

impl ScriptedRecognizer {
    pub fn push_detection(&mut self, boxes: Vec<BBox>) {
        self.detections.push_back(boxes);
    }

    pub fn set_page_text(&mut self, page: u32, text: impl Into<String>) {
        self.page_texts.insert(page, text.into());
    }

    pub fn push_recognition(&mut self, outcome: Result<RecognizedPosition, RecognitionError>) {
        self.recognitions.push_back(outcome);
    }

    pub fn recognize_calls(&self) -> usize {
        self.recognize_calls
    }
}

impl Recognizer for ScriptedRecognizer {
    fn detect_diagrams(&mut self, _page: u32) -> Result<Vec<BBox>, RecognitionError> {
        Ok(self.detections.pop_front().unwrap_or_default())
    }

    fn recognize(
        &mut self,
        _page: u32,
        _bbox: BBox,
    ) -> Result<RecognizedPosition, RecognitionError> {
        self.recognize_calls += 1;
        self.recognitions
            .pop_front()
            .unwrap_or(Err(RecognitionError::Unavailable))
    }

    fn extract_text(&mut self, page: u32) -> Result<String, RecognitionError> {
        Ok(self.page_texts.get(&page).cloned().unwrap_or_default())
    }
}

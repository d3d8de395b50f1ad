use std::fmt;

/// Recorded audio for a speaking question.
#[derive(Clone, PartialEq, Eq)]
pub struct AudioClip {
    mime_type: String,
    bytes: Vec<u8>,
}

impl AudioClip {
    #[must_use]
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for AudioClip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioClip")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Answer payload for a single question.
///
/// Writing and multiple-choice questions carry text; speaking questions carry
/// the recorded clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Text(String),
    Audio(AudioClip),
}

impl Answer {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Answer::Text(text) => Some(text),
            Answer::Audio(_) => None,
        }
    }

    #[must_use]
    pub fn as_audio(&self) -> Option<&AudioClip> {
        match self {
            Answer::Audio(clip) => Some(clip),
            Answer::Text(_) => None,
        }
    }
}

impl From<&str> for Answer {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<AudioClip> for Answer {
    fn from(value: AudioClip) -> Self {
        Self::Audio(value)
    }
}

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    User,
    Assistant,
}

impl Author {
    /// Label shown next to the turn when it is drawn.
    pub fn label(self) -> &'static str {
        match self {
            Author::User => "You",
            Author::Assistant => "Tutor",
        }
    }
}

/// Image bytes attached to a user submission.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub name: Option<String>,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageAttachment {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: None,
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn sha256_hex(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        hex::encode(hasher.finalize())
    }
}

// Raw bytes are noisy in debug output.
impl std::fmt::Debug for ImageAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageAttachment")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Text,
    TextWithImage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    TextWithImage(String, ImageAttachment),
}

impl Payload {
    pub fn text(&self) -> &str {
        match self {
            Payload::Text(text) | Payload::TextWithImage(text, _) => text,
        }
    }

    pub fn image(&self) -> Option<&ImageAttachment> {
        match self {
            Payload::Text(_) => None,
            Payload::TextWithImage(_, image) => Some(image),
        }
    }

    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Text(_) => PayloadKind::Text,
            Payload::TextWithImage(_, _) => PayloadKind::TextWithImage,
        }
    }
}

/// One authored message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub author: Author,
    pub payload: Payload,
}

impl Turn {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            author: Author::User,
            payload: Payload::Text(text.into()),
        }
    }

    pub fn user_with_image(text: impl Into<String>, image: ImageAttachment) -> Self {
        Self {
            author: Author::User,
            payload: Payload::TextWithImage(text.into(), image),
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            author: Author::Assistant,
            payload: Payload::Text(text.into()),
        }
    }

    pub fn text(&self) -> &str {
        self.payload.text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_text_ignores_image_component() {
        let image = ImageAttachment::new("image/png", vec![1, 2, 3]);
        let turn = Turn::user_with_image("Explain this circuit", image.clone());
        assert_eq!(turn.text(), "Explain this circuit");
        assert_eq!(turn.payload.kind(), PayloadKind::TextWithImage);
        assert_eq!(turn.payload.image(), Some(&image));

        let reply = Turn::assistant_text("Look at the resistors.");
        assert_eq!(reply.payload.kind(), PayloadKind::Text);
        assert!(reply.payload.image().is_none());
    }

    #[test]
    fn image_digest_is_stable_hex() {
        let image = ImageAttachment::new("image/png", b"abc".to_vec());
        assert_eq!(
            image.sha256_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn debug_output_omits_raw_bytes() {
        let image = ImageAttachment::new("image/jpeg", vec![0; 4096]).with_name("circuit.jpg");
        let rendered = format!("{image:?}");
        assert!(rendered.contains("circuit.jpg"));
        assert!(rendered.contains("len: 4096"));
        assert!(!rendered.contains("0, 0, 0"));
    }
}

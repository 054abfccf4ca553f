use crate::error::Result;

/// How a span of text should stand out.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Style {
    Plain,
    Title,
    Hint,
    Cue,
    Alert,
}

/// Span is a run of text placed at an absolute terminal position.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Span {
    pub(crate) x: u16,
    pub(crate) y: u16,
    pub(crate) style: Style,
    pub(crate) text: String,
}

impl Span {
    pub(crate) fn new(x: u16, y: u16, style: Style, text: impl Into<String>) -> Self {
        Self {
            x,
            y,
            style,
            text: text.into(),
        }
    }
}

pub(crate) trait Renderer {
    fn size_hint(&self) -> Result<(u16, u16)>;
    fn render(&mut self, spans: &[Span]) -> Result<()>;
    fn recover(&mut self);
}

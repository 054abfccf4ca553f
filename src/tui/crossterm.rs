use std::io::Write;
use std::time::Duration;

use crossterm::{
    cursor,
    event::{self, Event as CrossTermEvent, KeyCode, KeyEvent, KeyEventKind},
    style::{self, Color},
    terminal, ExecutableCommand, QueueableCommand,
};

use super::events::{Event, EventSource, UserInput};
use super::renderer::{Renderer, Span, Style};
use crate::engine::grid::Direction;
use crate::error::Result;

pub(crate) struct Crossterm<T: Write> {
    w: Box<T>,
}

impl<T: Write> Crossterm<T> {
    pub(crate) fn new(mut w: Box<T>) -> Result<Self> {
        terminal::enable_raw_mode()?;
        w.execute(terminal::EnterAlternateScreen)?;
        w.execute(cursor::Hide)?;
        Ok(Self { w })
    }

    fn queue_style(&mut self, s: Style) -> Result<()> {
        match s {
            Style::Plain => self.w.queue(style::ResetColor)?,
            Style::Title => self.w.queue(style::SetAttribute(style::Attribute::Bold))?,
            Style::Hint => self.w.queue(style::SetForegroundColor(Color::Yellow))?,
            Style::Cue => self.w.queue(style::SetForegroundColor(Color::Green))?,
            Style::Alert => self.w.queue(style::SetForegroundColor(Color::Red))?,
        };
        Ok(())
    }
}

impl<T: Write> Drop for Crossterm<T> {
    fn drop(&mut self) {
        self.recover();
    }
}

impl<T: Write> Renderer for Crossterm<T> {
    fn size_hint(&self) -> Result<(u16, u16)> {
        Ok(terminal::size()?)
    }

    fn render(&mut self, spans: &[Span]) -> Result<()> {
        self.w.queue(terminal::BeginSynchronizedUpdate)?;
        self.w.queue(terminal::Clear(terminal::ClearType::All))?;
        for span in spans {
            self.queue_style(span.style)?;
            self.w.queue(cursor::MoveTo(span.x, span.y))?;
            self.w.queue(style::Print(&span.text))?;
            self.w.queue(style::SetAttribute(style::Attribute::Reset))?;
            self.w.queue(style::ResetColor)?;
        }
        self.w.queue(terminal::EndSynchronizedUpdate)?;
        self.w.flush()?;
        Ok(())
    }

    fn recover(&mut self) {
        if let Err(e) = self.w.execute(cursor::Show) {
            log::error!("showing cursor: {}", e);
        }
        if let Err(e) = self.w.execute(terminal::LeaveAlternateScreen) {
            log::error!("leaving alternate screen: {}", e);
        }
        if let Err(e) = terminal::disable_raw_mode() {
            log::error!("disabling raw mode: {}", e);
        }
    }
}

#[derive(Default)]
pub(crate) struct CrosstermEvents {}

impl EventSource for CrosstermEvents {
    fn next_event(&self, timeout: Duration) -> Result<Option<Event>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        match event::read()? {
            CrossTermEvent::Key(ke) => Ok(handle_key_event(ke).map(Event::UserInput)),
            CrossTermEvent::Resize(_, _) => Ok(Some(Event::Resize)),
            _ => Ok(None),
        }
    }
}

fn handle_key_event(ke: KeyEvent) -> Option<UserInput> {
    if ke.kind == KeyEventKind::Release {
        return None;
    }
    match ke.code {
        KeyCode::Left | KeyCode::Char('h') => Some(UserInput::Direction(Direction::Left)),
        KeyCode::Right | KeyCode::Char('l') => Some(UserInput::Direction(Direction::Right)),
        KeyCode::Up | KeyCode::Char('k') => Some(UserInput::Direction(Direction::Up)),
        KeyCode::Down | KeyCode::Char('j') => Some(UserInput::Direction(Direction::Down)),
        KeyCode::Char('n') => Some(UserInput::NewGame),
        KeyCode::Char('i') => Some(UserInput::Hint),
        KeyCode::Char('m') => Some(UserInput::NextMode),
        KeyCode::Char('a') => Some(UserInput::StartAutoPlay),
        KeyCode::Char('s') | KeyCode::Esc => Some(UserInput::Stop),
        KeyCode::Char('b') => Some(UserInput::RunBatch),
        KeyCode::Char('+') | KeyCode::Char('=') => Some(UserInput::DepthUp),
        KeyCode::Char('-') => Some(UserInput::DepthDown),
        KeyCode::Char('g') => Some(UserInput::NextAlgorithm),
        KeyCode::Tab => Some(UserInput::SwitchBoard),
        KeyCode::Char('q') => Some(UserInput::Quit),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use crossterm::event::KeyModifiers;
    use rstest::*;

    use super::*;

    #[rstest]
    #[case::arrow(KeyCode::Left, Some(UserInput::Direction(Direction::Left)))]
    #[case::vim(KeyCode::Char('k'), Some(UserInput::Direction(Direction::Up)))]
    #[case::hint(KeyCode::Char('i'), Some(UserInput::Hint))]
    #[case::tab(KeyCode::Tab, Some(UserInput::SwitchBoard))]
    #[case::unbound(KeyCode::Char('z'), None)]
    fn key_mapping(#[case] code: KeyCode, #[case] expected: Option<UserInput>) {
        assert_eq!(
            handle_key_event(KeyEvent::new(code, KeyModifiers::NONE)),
            expected
        );
    }
}

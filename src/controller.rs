use std::time::Duration;
use tracing::trace;

use crate::domain::{DirConfig, DirError, Message};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &DirConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, DirError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    // The line editor wants every key as is
                    if model.raw_keyevents() {
                        return Ok(Some(Message::RawKey(key)));
                    }
                    return Ok(Self::handle_key(key));
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    pub fn handle_key(key: event::KeyEvent) -> Option<Message> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            let message = match key.code {
                KeyCode::Char('c') => Some(Message::Quit),
                KeyCode::Char('f') => Some(Message::NextPage),
                KeyCode::Char('b') => Some(Message::PrevPage),
                _ => None,
            };
            trace!("Mapped: {key:?} => {message:?}");
            return message;
        }

        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Char('j') | KeyCode::Down => Some(Message::MoveDown),
            KeyCode::Char('k') | KeyCode::Up => Some(Message::MoveUp),
            KeyCode::Char('l') | KeyCode::Right | KeyCode::PageDown => Some(Message::NextPage),
            KeyCode::Char('h') | KeyCode::Left | KeyCode::PageUp => Some(Message::PrevPage),
            KeyCode::Char('g') | KeyCode::Home => Some(Message::FirstPage),
            KeyCode::Char('G') | KeyCode::End => Some(Message::LastPage),
            KeyCode::Char('/') => Some(Message::EditNameFilter),
            KeyCode::Char('o') => Some(Message::NextLocation),
            KeyCode::Char('O') => Some(Message::PrevLocation),
            KeyCode::Char('i') => Some(Message::NextIndustry),
            KeyCode::Char('I') => Some(Message::PrevIndustry),
            KeyCode::Char('s') => Some(Message::CycleSort),
            KeyCode::Char('c') => Some(Message::ClearFilters),
            KeyCode::Char('y') => Some(Message::CopyRecord),
            KeyCode::Char('r') => Some(Message::Reload),
            KeyCode::Char('?') => Some(Message::Help),
            KeyCode::Enter => Some(Message::Enter),
            KeyCode::Esc => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn map(code: KeyCode, modifiers: KeyModifiers) -> Option<Message> {
        Controller::handle_key(KeyEvent::new(code, modifiers))
    }

    #[test]
    fn maps_navigation() {
        assert_eq!(map(KeyCode::Char('j'), KeyModifiers::NONE), Some(Message::MoveDown));
        assert_eq!(map(KeyCode::Up, KeyModifiers::NONE), Some(Message::MoveUp));
        assert_eq!(map(KeyCode::PageDown, KeyModifiers::NONE), Some(Message::NextPage));
        assert_eq!(map(KeyCode::Char('G'), KeyModifiers::SHIFT), Some(Message::LastPage));
        assert_eq!(map(KeyCode::Char('f'), KeyModifiers::CONTROL), Some(Message::NextPage));
    }

    #[test]
    fn maps_filters() {
        assert_eq!(map(KeyCode::Char('/'), KeyModifiers::NONE), Some(Message::EditNameFilter));
        assert_eq!(map(KeyCode::Char('o'), KeyModifiers::NONE), Some(Message::NextLocation));
        assert_eq!(map(KeyCode::Char('O'), KeyModifiers::SHIFT), Some(Message::PrevLocation));
        assert_eq!(map(KeyCode::Char('I'), KeyModifiers::SHIFT), Some(Message::PrevIndustry));
        assert_eq!(map(KeyCode::Char('s'), KeyModifiers::NONE), Some(Message::CycleSort));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        assert_eq!(map(KeyCode::Char('z'), KeyModifiers::NONE), None);
        assert_eq!(map(KeyCode::Char('q'), KeyModifiers::CONTROL), None);
        assert_eq!(map(KeyCode::Char('c'), KeyModifiers::CONTROL), Some(Message::Quit));
    }
}

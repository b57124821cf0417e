use std::time::{Duration, Instant};
use tracing::trace;

use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crate::domain::{CompassConfig, CompassError, Message};
use crate::model::Model;

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &CompassConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    /// Waits for the next terminal event, but never past a pending resize
    /// recompute of the model.
    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, CompassError> {
        let mut timeout = Duration::from_millis(self.event_poll_time);
        if let Some(due) = model.next_deadline(Instant::now()) {
            timeout = timeout.min(due);
        }
        if !event::poll(timeout)? {
            return Ok(None);
        }
        let message = match event::read()? {
            Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                if model.raw_keyevents() {
                    Some(Message::RawKey(key))
                } else {
                    self.handle_key(key)
                }
            }
            Event::Resize(width, height) => Some(Message::Resize(width, height)),
            _ => None,
        };
        Ok(message)
    }

    fn handle_key(&self, key: KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Char('j'), _) | (KeyCode::Down, _) => Some(Message::MoveDown),
            (KeyCode::Char('k'), _) | (KeyCode::Up, _) => Some(Message::MoveUp),
            (KeyCode::Char('n'), _) | (KeyCode::Right, _) | (KeyCode::PageDown, _) => {
                Some(Message::NextPage)
            }
            (KeyCode::Char('p'), _) | (KeyCode::Left, _) | (KeyCode::PageUp, _) => {
                Some(Message::PrevPage)
            }
            (KeyCode::Char('g'), _) | (KeyCode::Home, _) => Some(Message::FirstPage),
            (KeyCode::Char('G'), _) | (KeyCode::End, _) => Some(Message::LastPage),
            (KeyCode::Char('/'), _) => Some(Message::Search),
            (KeyCode::Enter, _) => Some(Message::Enter),
            (KeyCode::Esc, _) => Some(Message::Exit),
            (KeyCode::Tab, _) => Some(Message::NextTab),
            (KeyCode::BackTab, _) => Some(Message::PrevTab),
            (KeyCode::Char('y'), _) => Some(Message::CopyRow),
            (KeyCode::Char('e'), _) => Some(Message::Export),
            (KeyCode::Char('o'), _) => Some(Message::SignOut),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};
use tracing::trace;

/// Single line editor used for the name search.
#[derive(Default)]
pub struct Inputter {
    current_input: String,
    cursor_pos: usize, // in chars, not bytes
    finished: bool,
    canceled: bool,
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct InputResult {
    pub input: String,
    pub finished: bool,
    pub canceled: bool,
    pub cursor_pos: usize,
}

impl Inputter {
    pub fn read(&mut self, key: event::KeyEvent) -> InputResult {
        match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => self.enter(),
            (KeyCode::Esc, _) => self.escape(),
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Left, _) => self.left(),
            (KeyCode::Right, _) => self.right(),
            (KeyCode::Home, _) => self.home(),
            (KeyCode::End, _) => self.end(),
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => self.kill_line(),
            (kc, km) => self.key(kc, km),
        }
    }

    /// Replace the content and put the cursor behind it.
    pub fn set(&mut self, s: &str) {
        self.current_input = s.to_string();
        self.cursor_pos = s.chars().count();
    }

    pub fn get(&self) -> InputResult {
        InputResult {
            canceled: self.canceled,
            finished: self.finished,
            input: self.current_input.clone(),
            cursor_pos: self.cursor_pos,
        }
    }

    pub fn clear(&mut self) {
        self.canceled = false;
        self.finished = false;
        self.current_input.clear();
        self.cursor_pos = 0;
    }

    fn enter(&mut self) -> InputResult {
        self.finished = true;
        self.get()
    }

    fn escape(&mut self) -> InputResult {
        self.clear();
        self.canceled = true;
        self.finished = true;
        self.get()
    }

    fn backspace(&mut self) -> InputResult {
        if self.cursor_pos > 0 {
            self.cursor_pos -= 1;
            self.current_input.remove(self.byte_pos());
        }
        self.get()
    }

    fn delete(&mut self) -> InputResult {
        if self.cursor_pos < self.char_len() {
            self.current_input.remove(self.byte_pos());
        }
        self.get()
    }

    fn left(&mut self) -> InputResult {
        self.cursor_pos = self.cursor_pos.saturating_sub(1);
        self.get()
    }

    fn right(&mut self) -> InputResult {
        if self.cursor_pos < self.char_len() {
            self.cursor_pos += 1;
        }
        self.get()
    }

    fn home(&mut self) -> InputResult {
        self.cursor_pos = 0;
        self.get()
    }

    fn end(&mut self) -> InputResult {
        self.cursor_pos = self.char_len();
        self.get()
    }

    fn kill_line(&mut self) -> InputResult {
        self.current_input.clear();
        self.cursor_pos = 0;
        self.get()
    }

    fn key(&mut self, code: KeyCode, modifier: KeyModifiers) -> InputResult {
        if modifier.contains(KeyModifiers::CONTROL) || modifier.contains(KeyModifiers::ALT) {
            trace!("Ignoring {code:?} with {modifier:?}");
        } else if let Some(chr) = code.as_char() {
            self.current_input.insert(self.byte_pos(), chr);
            self.cursor_pos += 1;
        }
        self.get()
    }

    fn char_len(&self) -> usize {
        self.current_input.chars().count()
    }

    fn byte_pos(&self) -> usize {
        self.current_input
            .char_indices()
            .nth(self.cursor_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn press(inputter: &mut Inputter, code: KeyCode) -> InputResult {
        inputter.read(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_str(inputter: &mut Inputter, s: &str) -> InputResult {
        let mut last = inputter.get();
        for c in s.chars() {
            last = press(inputter, KeyCode::Char(c));
        }
        last
    }

    #[test]
    fn typing_and_editing() {
        let mut inputter = Inputter::default();
        let res = type_str(&mut inputter, "acme");
        assert_eq!(res.input, "acme");
        assert_eq!(res.cursor_pos, 4);

        press(&mut inputter, KeyCode::Left);
        press(&mut inputter, KeyCode::Left);
        let res = press(&mut inputter, KeyCode::Backspace);
        assert_eq!(res.input, "ame");
        assert_eq!(res.cursor_pos, 1);

        let res = press(&mut inputter, KeyCode::Char('x'));
        assert_eq!(res.input, "axme");

        let res = press(&mut inputter, KeyCode::Delete);
        assert_eq!(res.input, "axe");
        assert!(!res.finished);
    }

    #[test]
    fn handles_multibyte_chars() {
        let mut inputter = Inputter::default();
        inputter.set("Zürich");
        assert_eq!(inputter.get().cursor_pos, 6);
        press(&mut inputter, KeyCode::Home);
        press(&mut inputter, KeyCode::Right);
        press(&mut inputter, KeyCode::Right);
        let res = press(&mut inputter, KeyCode::Backspace);
        assert_eq!(res.input, "Zrich");
        press(&mut inputter, KeyCode::End);
        let res = press(&mut inputter, KeyCode::Right);
        assert_eq!(res.cursor_pos, 5);
    }

    #[test]
    fn enter_finishes() {
        let mut inputter = Inputter::default();
        type_str(&mut inputter, "bo");
        let res = press(&mut inputter, KeyCode::Enter);
        assert!(res.finished);
        assert!(!res.canceled);
        assert_eq!(res.input, "bo");
    }

    #[test]
    fn escape_cancels_and_clears() {
        let mut inputter = Inputter::default();
        type_str(&mut inputter, "bo");
        let res = press(&mut inputter, KeyCode::Esc);
        assert!(res.finished);
        assert!(res.canceled);
        assert!(res.input.is_empty());

        inputter.clear();
        assert_eq!(inputter.get(), InputResult::default());
    }

    #[test]
    fn control_keys_do_not_insert() {
        let mut inputter = Inputter::default();
        type_str(&mut inputter, "abc");
        let res = inputter.read(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::CONTROL));
        assert_eq!(res.input, "abc");
        let res = inputter.read(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
        assert_eq!(res.input, "");
        assert_eq!(res.cursor_pos, 0);
    }
}

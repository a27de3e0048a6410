//! Single-line input editing for the raw-mode prompt.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// What a key press did to the line being edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditAction {
    /// Enter was pressed; the line (possibly empty) is complete.
    Submit(String),
    /// Ctrl-C. The partial line is discarded.
    Interrupt,
    /// Ctrl-D on an empty line.
    EndOfInput,
    /// The buffer changed and should be redrawn.
    Changed,
    Ignored,
}

/// Line buffer plus a submitted-line history navigable with Up/Down.
#[derive(Debug, Default)]
pub struct LineEditor {
    buffer: String,
    history: Vec<String>,
    /// Index into `history` while browsing; `None` when editing a fresh line.
    history_pos: Option<usize>,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Apply one crossterm key event.
    ///
    /// Release events are discarded so that terminals reporting both press
    /// and release do not double-fire.
    pub fn handle_key(&mut self, key: KeyEvent) -> EditAction {
        if key.kind == KeyEventKind::Release {
            return EditAction::Ignored;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Char('c') if ctrl => {
                self.buffer.clear();
                self.history_pos = None;
                EditAction::Interrupt
            }
            KeyCode::Char('d') if ctrl => {
                if self.buffer.is_empty() {
                    EditAction::EndOfInput
                } else {
                    EditAction::Ignored
                }
            }
            KeyCode::Char('u') if ctrl => {
                self.buffer.clear();
                EditAction::Changed
            }
            KeyCode::Char(_) if ctrl => EditAction::Ignored,
            KeyCode::Char(c) => {
                self.buffer.push(c);
                EditAction::Changed
            }
            KeyCode::Backspace => {
                if self.buffer.pop().is_some() {
                    EditAction::Changed
                } else {
                    EditAction::Ignored
                }
            }
            KeyCode::Enter => {
                let line = std::mem::take(&mut self.buffer);
                self.history_pos = None;
                if !line.trim().is_empty() && self.history.last() != Some(&line) {
                    self.history.push(line.clone());
                }
                EditAction::Submit(line)
            }
            KeyCode::Up => self.history_back(),
            KeyCode::Down => self.history_forward(),
            _ => EditAction::Ignored,
        }
    }

    fn history_back(&mut self) -> EditAction {
        if self.history.is_empty() {
            return EditAction::Ignored;
        }
        let pos = match self.history_pos {
            Some(0) => return EditAction::Ignored,
            Some(p) => p - 1,
            None => self.history.len() - 1,
        };
        self.history_pos = Some(pos);
        self.buffer = self.history[pos].clone();
        EditAction::Changed
    }

    fn history_forward(&mut self) -> EditAction {
        let Some(pos) = self.history_pos else {
            return EditAction::Ignored;
        };
        if pos + 1 < self.history.len() {
            self.history_pos = Some(pos + 1);
            self.buffer = self.history[pos + 1].clone();
        } else {
            self.history_pos = None;
            self.buffer.clear();
        }
        EditAction::Changed
    }
}

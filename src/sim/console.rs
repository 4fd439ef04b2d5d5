use std::io::{self, BufRead, Write};

use crate::services::Dialogs;

/// Dialogs rendered as lines on stdout. Confirmations read a y/n answer from
/// stdin unless an answer was fixed up front.
#[derive(Debug, Default)]
pub struct ConsoleDialogs {
    progress: Option<String>,
    upgrade_open: bool,
    assume: Option<bool>,
}

impl ConsoleDialogs {
    /// Answers every confirmation with `answer` instead of prompting.
    pub fn assume(answer: bool) -> Self {
        Self {
            assume: Some(answer),
            ..Self::default()
        }
    }
}

impl Dialogs for ConsoleDialogs {
    fn show_progress(&mut self, title: &str) {
        println!("[..] {title}");
        self.progress = Some(title.to_string());
    }

    fn hide_progress(&mut self) {
        if let Some(title) = self.progress.take() {
            println!("[ok] {title}");
        }
    }

    fn show_info(&mut self, message: &str, _auto_dismiss_ms: u64) {
        println!("[i] {message}");
    }

    fn show_alert(&mut self, message: &str) {
        println!("[!] {message}");
    }

    fn confirm(&mut self, message: &str) -> bool {
        if let Some(answer) = self.assume {
            return answer;
        }
        print!("[?] {message} [y/N] ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim(), "y" | "Y" | "yes")
    }

    fn open_upgrade_progress(&mut self, title: &str, percent: u8) {
        self.upgrade_open = true;
        println!("[..] {title} {percent}%");
    }

    fn update_upgrade_progress(&mut self, percent: u8) {
        if self.upgrade_open {
            println!("     {percent}%");
        }
        if percent >= 100 {
            self.upgrade_open = false;
        }
    }
}

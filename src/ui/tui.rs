use crate::actions::registry::ActionDescriptor;
use crate::core::error::Result;
use crate::retrieval::notification::copied_message;
use crate::retrieval::pipeline::Delivery;
use crate::runner::{PassRunner, QueryMatch};
use crate::search::matcher::Relevance;
use ratatui::backend::CrosstermBackend;
use ratatui::crossterm::cursor;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::crossterm::execute;
use ratatui::crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

// How often the picker wakes up without input to pick up index rebuilds
const TICK: Duration = Duration::from_millis(250);

/// What a finished retrieval reports back to the picker
enum Feedback {
    Status(String),
    Content { entry: String, content: String },
}

/// Interactive entry picker: type to filter, Enter to copy
pub struct PickerTui {
    runner: Arc<PassRunner>,
    runtime: Handle,

    query: String,
    matches: Vec<QueryMatch>,
    selected: usize,
    // None means the default action (first line of the file)
    action: Option<usize>,
    seen_generation: u64,

    status: Option<String>,
    popup: Option<(String, String)>,

    feedback_tx: Sender<Feedback>,
    feedback_rx: Receiver<Feedback>,
}

impl PickerTui {
    pub fn new(runner: Arc<PassRunner>, runtime: Handle) -> Self {
        let (feedback_tx, feedback_rx) = mpsc::channel();
        let mut tui = Self {
            runner,
            runtime,
            query: String::new(),
            matches: Vec::new(),
            selected: 0,
            action: None,
            seen_generation: 0,
            status: None,
            popup: None,
            feedback_tx,
            feedback_rx,
        };
        tui.refresh();
        tui
    }

    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

        // Always restore terminal, even if we early-return with an error.
        struct TerminalRestore;
        impl Drop for TerminalRestore {
            fn drop(&mut self) {
                let _ = disable_raw_mode();
                let mut stdout = io::stdout();
                let _ = execute!(stdout, LeaveAlternateScreen, cursor::Show);
            }
        }
        let _restore = TerminalRestore;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = ratatui::Terminal::new(backend)?;

        loop {
            self.drain_feedback();
            if self.runner.snapshot().generation != self.seen_generation {
                self.refresh();
            }

            terminal.draw(|f| self.render_ui(f))?;

            if !event::poll(TICK)? {
                continue;
            }
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && self.handle_key(key) {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Returns true when the picker should exit
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => return true,
                KeyCode::Char('u') => {
                    self.query.clear();
                    self.refresh();
                }
                KeyCode::Char('r') => {
                    self.status = Some(match self.runner.reload() {
                        Ok(()) => "Configuration reloaded".to_string(),
                        Err(e) => e.to_string(),
                    });
                    self.action = None;
                    self.refresh();
                }
                _ => {}
            }
            return false;
        }

        if self.popup.is_some() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')) {
                self.popup = None;
            }
            return false;
        }

        match key.code {
            KeyCode::Esc => return true,
            KeyCode::Enter => self.run_selected(),
            KeyCode::Tab => self.cycle_action(),
            KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Down => {
                if self.selected + 1 < self.matches.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Backspace => {
                self.query.pop();
                self.refresh();
            }
            KeyCode::Char(c) => {
                self.query.push(c);
                self.refresh();
            }
            _ => {}
        }
        false
    }

    /// Re-run the query against the current snapshot
    fn refresh(&mut self) {
        self.seen_generation = self.runner.snapshot().generation;
        let mut matches = self.runner.query(&self.query, true);
        matches.sort_by_key(|m| m.relevance);
        self.matches = matches;
        if self.selected >= self.matches.len() {
            self.selected = self.matches.len().saturating_sub(1);
        }
    }

    fn actions(&self) -> Vec<ActionDescriptor> {
        self.runner.actions().actions().to_vec()
    }

    fn cycle_action(&mut self) {
        let count = self.actions().len();
        self.action = match self.action {
            _ if count == 0 => None,
            None => Some(0),
            Some(i) if i + 1 < count => Some(i + 1),
            Some(_) => None,
        };
    }

    fn run_selected(&mut self) {
        let Some(selected) = self.matches.get(self.selected).cloned() else {
            return;
        };
        let action = self.action.and_then(|i| self.actions().get(i).cloned());
        let timeout = self.runner.settings().clip_duration();

        let _enter = self.runtime.enter();
        let task = self.runner.run(&selected, action.as_ref());
        let tx = self.feedback_tx.clone();
        self.status = Some(format!("Decrypting {}...", selected.text));

        self.runtime.spawn(async move {
            let feedback = match task.await {
                Ok(Ok(Delivery::Copied { entry, action, .. })) => {
                    Feedback::Status(copied_message(&entry, action.as_deref(), timeout))
                }
                Ok(Ok(Delivery::Displayed { entry, content })) => Feedback::Content { entry, content },
                Ok(Err(e)) => Feedback::Status(e.to_string()),
                Err(e) => Feedback::Status(format!("Retrieval task failed: {}", e)),
            };
            let _ = tx.send(feedback);
        });
    }

    fn drain_feedback(&mut self) {
        while let Ok(feedback) = self.feedback_rx.try_recv() {
            match feedback {
                Feedback::Status(message) => self.status = Some(message),
                Feedback::Content { entry, content } => {
                    self.status = None;
                    self.popup = Some((entry, content));
                }
            }
        }
    }

    fn render_ui(&self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(3),
                Constraint::Length(2),
            ])
            .split(f.size());

        self.render_input(f, chunks[0]);
        self.render_actions(f, chunks[1]);
        self.render_matches(f, chunks[2]);
        self.render_footer(f, chunks[3]);

        if let Some((entry, content)) = &self.popup {
            let area = centered(f.size(), 80, 70);
            f.render_widget(Clear, area);
            let popup = Paragraph::new(content.as_str())
                .wrap(Wrap { trim: false })
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(format!(" {} (Esc to close) ", entry)),
                );
            f.render_widget(popup, area);
        }
    }

    fn render_input(&self, f: &mut Frame, area: Rect) {
        let input = Paragraph::new(Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Cyan)),
            Span::raw(self.query.as_str()),
            Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        ]))
        .block(Block::default().borders(Borders::ALL).title(" Password store "));
        f.render_widget(input, area);
    }

    fn render_actions(&self, f: &mut Frame, area: Rect) {
        let actions = self.actions();
        let highlight = Style::default().fg(Color::Black).bg(Color::Cyan);

        let mut spans = vec![Span::styled(
            " Password ",
            if self.action.is_none() { highlight } else { Style::default() },
        )];
        for (i, action) in actions.iter().enumerate() {
            spans.push(Span::raw(" "));
            spans.push(Span::styled(
                format!(" {} ", action.name),
                if self.action == Some(i) { highlight } else { Style::default() },
            ));
        }

        let bar = Paragraph::new(Line::from(spans))
            .block(Block::default().borders(Borders::ALL).title(" Action (Tab) "));
        f.render_widget(bar, area);
    }

    fn render_matches(&self, f: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .matches
            .iter()
            .map(|m| {
                let marker = match m.relevance {
                    Relevance::Exact => Span::styled("= ", Style::default().fg(Color::Green)),
                    Relevance::Partial => Span::raw("  "),
                };
                ListItem::new(Line::from(vec![marker, Span::raw(m.text.as_str())]))
            })
            .collect();

        let title = format!(" {} of {} ", self.matches.len(), self.runner.snapshot().len());
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("▶ ");

        let mut state = ListState::default();
        if !self.matches.is_empty() {
            state.select(Some(self.selected));
        }
        f.render_stateful_widget(list, area, &mut state);
    }

    fn render_footer(&self, f: &mut Frame, area: Rect) {
        let help = "Enter copy · Tab action · ↑↓ select · Ctrl-R reload · Esc quit";
        let lines = vec![
            Line::from(Span::styled(
                self.status.clone().unwrap_or_default(),
                Style::default().fg(Color::Yellow),
            )),
            Line::from(Span::styled(help, Style::default().fg(Color::DarkGray))),
        ];
        f.render_widget(Paragraph::new(lines), area);
    }
}

fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

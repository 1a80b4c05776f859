use std::io::Stdout;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use crate::api::{DiaryApi, Notebook};
use crate::config::AppConfig;
use crate::editor::{EditorState, Focus, Mood, TextBuffer};
use crate::storage::KeyValueStore;
use crate::ui;

pub mod screen;
pub mod state;

pub use screen::{
    ApiOutcome, DraftOrigin, EditorScreen, ExitChoice, Notice, NoticeLevel, RecoveryChoice,
    ScreenCommand,
};
pub use state::{Overlay, Toast, Toasts, UiState};

const READ_ONLY_BODY: &str = "Body has rich content and is read-only here";

pub struct App<S> {
    pub config: Arc<AppConfig>,
    api: Arc<dyn DiaryApi>,
    screen: EditorScreen<S>,
    ui: UiState,
    tick_rate: Duration,
    results_tx: Sender<ApiOutcome>,
    results_rx: Receiver<ApiOutcome>,
    should_quit: bool,
}

impl<S: KeyValueStore> App<S> {
    pub fn new(
        config: Arc<AppConfig>,
        api: Arc<dyn DiaryApi>,
        screen: EditorScreen<S>,
        notebooks: Vec<Notebook>,
    ) -> Self {
        let (results_tx, results_rx) = crossbeam_channel::unbounded();
        let tick_rate = config.editor.tick_rate();
        let ui = UiState::new(notebooks, config.editor.toast_duration());
        Self {
            config,
            api,
            screen,
            ui,
            tick_rate,
            results_tx,
            results_rx,
            should_quit: false,
        }
    }

    pub fn screen(&self) -> &EditorScreen<S> {
        &self.screen
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            terminal
                .draw(|frame| ui::draw_app(frame, &self.screen, &self.ui))
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or(Duration::ZERO);

            if event::poll(timeout).context("polling for terminal events")? {
                if let Event::Key(key) = event::read().context("reading terminal event")? {
                    self.handle_key(key);
                }
            }

            self.drain_results();

            if last_tick.elapsed() >= self.tick_rate {
                self.on_tick(Instant::now());
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('q') | KeyCode::Char('c'))
        {
            let command = self.screen.abandon();
            self.dispatch(Some(command));
            return;
        }
        if self.screen.is_recovering() {
            self.handle_recovery_key(key);
        } else if self.screen.is_confirming_exit() {
            self.handle_exit_key(key);
        } else if self.ui.overlay().is_some() {
            self.handle_overlay_key(key);
        } else {
            self.handle_editor_key(key);
        }
        self.collect_notices();
    }

    fn handle_recovery_key(&mut self, key: KeyEvent) {
        let choice = match key.code {
            KeyCode::Enter | KeyCode::Char('c') => RecoveryChoice::Continue,
            KeyCode::Char('s') => RecoveryChoice::SaveDraft,
            KeyCode::Char('d') => RecoveryChoice::Discard,
            KeyCode::Esc => RecoveryChoice::Dismiss,
            _ => return,
        };
        let command = self.screen.choose_recovery(choice, Instant::now());
        self.dispatch(command);
    }

    fn handle_exit_key(&mut self, key: KeyEvent) {
        let choice = match key.code {
            KeyCode::Char('s') => ExitChoice::SaveDraft,
            KeyCode::Char('d') => ExitChoice::Discard,
            KeyCode::Esc | KeyCode::Char('c') => ExitChoice::Continue,
            _ => return,
        };
        let command = self.screen.choose_exit(choice);
        self.dispatch(command);
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) {
        let Some(overlay) = self.ui.overlay_mut() else {
            return;
        };
        match overlay {
            Overlay::TagInput { input } => match key.code {
                KeyCode::Esc => self.ui.close_overlay(),
                KeyCode::Enter => {
                    let tag = std::mem::take(input);
                    self.ui.close_overlay();
                    let added = self.screen.editor_mut().map(|editor| editor.add_tag(&tag));
                    if added == Some(false) && !tag.trim().is_empty() {
                        self.notice(NoticeLevel::Info, format!("Tag '{}' already added", tag.trim()));
                    }
                }
                KeyCode::Backspace => {
                    if input.pop().is_none() {
                        self.ui.close_overlay();
                        if let Some(editor) = self.screen.editor_mut() {
                            editor.pop_tag();
                        }
                    }
                }
                KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                    input.push(ch)
                }
                _ => {}
            },
            Overlay::NotebookPicker { .. } | Overlay::MoodPicker { .. } => match key.code {
                KeyCode::Esc => self.ui.close_overlay(),
                KeyCode::Up | KeyCode::Char('k') => self.ui.move_selection(-1),
                KeyCode::Down | KeyCode::Char('j') => self.ui.move_selection(1),
                KeyCode::Char('x') => {
                    if matches!(self.ui.overlay(), Some(Overlay::MoodPicker { .. })) {
                        if let Some(editor) = self.screen.editor_mut() {
                            editor.set_mood(None);
                        }
                        self.ui.close_overlay();
                    }
                }
                KeyCode::Enter => {
                    let notebook = self.ui.selected_notebook().map(|n| n.id);
                    let mood = self.ui.selected_mood();
                    self.ui.close_overlay();
                    if let Some(editor) = self.screen.editor_mut() {
                        if let Some(id) = notebook {
                            editor.set_notebook(Some(id));
                        } else if let Some(mood) = mood {
                            editor.set_mood(Some(mood));
                        }
                    }
                }
                _ => {}
            },
            Overlay::Help => self.ui.close_overlay(),
        }
    }

    fn handle_editor_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('s') => {
                    let command = self.screen.publish();
                    self.dispatch(command);
                }
                KeyCode::Char('n') => {
                    let current = self.screen.editor().notebook_id();
                    if !self.ui.open_notebook_picker(current) {
                        self.notice(NoticeLevel::Error, "No notebooks available");
                    }
                }
                KeyCode::Char('t') => self.ui.open_tag_input(),
                KeyCode::Char('e') => {
                    let current = self.screen.editor().mood().and_then(Mood::from_value);
                    self.ui.open_mood_picker(current);
                }
                KeyCode::Char('z') => {
                    self.edit_text(TextBuffer::undo);
                }
                KeyCode::Char('y') => {
                    self.edit_text(TextBuffer::redo);
                }
                KeyCode::Left => {
                    self.edit(|editor| editor.active_mut().move_word_left());
                }
                KeyCode::Right => {
                    self.edit(|editor| editor.active_mut().move_word_right());
                }
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Esc => {
                let command = self.screen.request_exit();
                self.dispatch(command);
            }
            KeyCode::F(1) => self.ui.open_help(),
            KeyCode::Tab | KeyCode::BackTab => {
                self.edit(|editor| {
                    editor.toggle_focus();
                    true
                });
            }
            KeyCode::Enter => {
                if self.screen.editor().focus() == Focus::Body {
                    self.edit_text(TextBuffer::insert_newline);
                } else {
                    self.edit(EditorState::enter);
                }
            }
            KeyCode::Backspace => {
                self.edit_text(TextBuffer::backspace);
            }
            KeyCode::Delete => {
                self.edit_text(TextBuffer::delete);
            }
            KeyCode::Left => {
                self.edit(|editor| editor.active_mut().move_left());
            }
            KeyCode::Right => {
                self.edit(|editor| editor.active_mut().move_right());
            }
            KeyCode::Up => {
                self.edit(|editor| editor.active_mut().move_up());
            }
            KeyCode::Down => {
                self.edit(|editor| editor.active_mut().move_down());
            }
            KeyCode::Home => {
                self.edit(|editor| editor.active_mut().move_home());
            }
            KeyCode::End => {
                self.edit(|editor| editor.active_mut().move_end());
            }
            KeyCode::Char(ch) if !key.modifiers.intersects(KeyModifiers::ALT | KeyModifiers::SUPER) => {
                self.edit_text(|buffer| buffer.insert_char(ch));
            }
            _ => {}
        }
    }

    fn edit<F>(&mut self, f: F) -> bool
    where
        F: FnOnce(&mut EditorState) -> bool,
    {
        match self.screen.editor_mut() {
            Some(editor) => f(editor),
            None => false,
        }
    }

    /// Changes the focused text. A locked body says so instead.
    fn edit_text<F>(&mut self, f: F) -> bool
    where
        F: FnOnce(&mut TextBuffer) -> bool,
    {
        let locked = match self.screen.editor_mut() {
            Some(editor) if editor.focus() == Focus::Body && editor.body_is_read_only() => true,
            Some(editor) => return f(editor.active_mut()),
            None => false,
        };
        if locked {
            self.notice(NoticeLevel::Info, READ_ONLY_BODY);
        }
        false
    }

    fn dispatch(&mut self, command: Option<ScreenCommand>) {
        let Some(command) = command else {
            return;
        };
        if command.is_close() {
            self.should_quit = true;
            return;
        }
        self.ui.in_flight = Some(match &command {
            ScreenCommand::SaveDraft { .. } => "Saving draft…",
            _ => "Saving diary…",
        });
        let api = Arc::clone(&self.api);
        let results = self.results_tx.clone();
        thread::spawn(move || {
            if let Some(outcome) = command.execute(api.as_ref()) {
                if results.send(outcome).is_err() {
                    tracing::debug!("editor closed before request finished");
                }
            }
        });
    }

    fn drain_results(&mut self) {
        while let Ok(outcome) = self.results_rx.try_recv() {
            self.ui.in_flight = None;
            let command = self.screen.apply_outcome(outcome, Instant::now());
            self.collect_notices();
            self.dispatch(command);
        }
    }

    fn on_tick(&mut self, now: Instant) {
        self.screen.on_tick(now);
        self.collect_notices();
        self.ui.toasts.prune(now);
    }

    fn collect_notices(&mut self) {
        let now = Instant::now();
        for notice in self.screen.take_notices() {
            self.ui.toasts.push(notice, now);
        }
    }

    fn notice(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.ui.toasts.push(
            Notice {
                level,
                message: message.into(),
            },
            Instant::now(),
        );
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("creating terminal backend")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("restoring screen state")?;
    Ok(())
}

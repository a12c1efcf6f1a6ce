use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap},
};
use std::io;
use std::time::{Duration, Instant};

use crate::actions;
use crate::context::RepositoryContext;
use crate::dashboard::Dashboard;
use crate::{ApprovalCategory, format_score};

/// Application state for the review list TUI.
pub struct App {
    ctx: RepositoryContext,
    dashboard: Dashboard,
    should_quit: bool,
    show_help: bool,
    status_message: Option<(String, Instant)>,
}

impl App {
    pub fn new(ctx: RepositoryContext, dashboard: Dashboard) -> Self {
        Self {
            ctx,
            dashboard,
            should_quit: false,
            show_help: false,
            status_message: None,
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    /// Handle keyboard input.
    fn handle_input(&mut self, key: event::KeyEvent) {
        if self.show_help {
            // Any key closes help
            self.show_help = false;
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char('?') => {
                self.show_help = true;
            }
            KeyCode::Char('j') | KeyCode::Down => {
                self.dashboard.select_next();
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.dashboard.select_prev();
            }
            KeyCode::Char('r') => match self.dashboard.refresh(&self.ctx) {
                Ok(()) => self.set_status(format!("{} reviews", self.dashboard.store.len())),
                Err(e) => self.set_status(format!("refresh failed: {e}")),
            },
            KeyCode::Char('o') => {
                let outcome = self
                    .dashboard
                    .selected_review()
                    .map(|review| (review.number, actions::browse(review)));
                match outcome {
                    Some((number, Ok(()))) => self.set_status(format!("opened change {number}")),
                    Some((_, Err(e))) => self.set_status(e.to_string()),
                    None => self.set_status("no review selected"),
                }
            }
            KeyCode::Char('d') => {
                let outcome = self
                    .dashboard
                    .selected_review()
                    .map(|review| actions::download_patchset(&self.ctx, review));
                match outcome {
                    Some(Ok(branch)) => self.set_status(format!("fetched into {branch}")),
                    Some(Err(e)) => self.set_status(e.to_string()),
                    None => self.set_status("no review selected"),
                }
            }
            _ => {}
        }
    }

    fn render(&mut self, frame: &mut Frame) {
        // Expire stale status messages
        if let Some((_, time)) = &self.status_message
            && time.elapsed() > Duration::from_secs(5)
        {
            self.status_message = None;
        }

        if self.show_help {
            self.render_help(frame);
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),
                Constraint::Length(8),
                Constraint::Length(3),
            ])
            .split(frame.area());

        self.render_review_table(frame, chunks[0]);
        self.render_commit_message(frame, chunks[1]);
        self.render_status_bar(frame, chunks[2]);
    }

    /// Render the review table in Gerrit's own ordering.
    fn render_review_table(&self, frame: &mut Frame, area: Rect) {
        let rows: Vec<Row> = self
            .dashboard
            .store
            .all()
            .iter()
            .enumerate()
            .map(|(idx, review)| {
                let is_selected = idx == self.dashboard.selected;
                let prefix = if is_selected { ">" } else { " " };
                let draft = if review.is_draft { "D" } else { " " };

                let cr = format_score(review.score_for(&ApprovalCategory::CodeReview));
                let verified = format_score(review.score_for(&ApprovalCategory::Verified));

                let style = if is_selected {
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD)
                } else if review.is_draft {
                    Style::default().fg(Color::DarkGray)
                } else {
                    Style::default()
                };

                Row::new(vec![
                    Cell::from(format!("{} {}", prefix, review.number)),
                    Cell::from(draft),
                    Cell::from(cr),
                    Cell::from(verified),
                    Cell::from(review.owner.name.clone()),
                    Cell::from(review.subject.clone()),
                ])
                .style(style)
            })
            .collect();

        let widths = [
            Constraint::Length(8),
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Percentage(20),
            Constraint::Percentage(60),
        ];

        let header = Row::new(vec!["Change", "D", "CR", "V", "Owner", "Subject"]).style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );

        let title = format!(
            "Reviews: {} ({})",
            self.ctx.project,
            self.dashboard.status.as_str()
        );
        let table = Table::new(rows, widths)
            .block(Block::default().borders(Borders::ALL).title(title))
            .header(header);

        frame.render_widget(table, area);
    }

    /// Render the selected review's commit message.
    fn render_commit_message(&self, frame: &mut Frame, area: Rect) {
        let text = self
            .dashboard
            .selected_review()
            .map(|r| r.commit_message.clone())
            .unwrap_or_default();

        let paragraph = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title("Commit Message"))
            .wrap(Wrap { trim: false });

        frame.render_widget(paragraph, area);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let status_text = match &self.status_message {
            Some((msg, _)) => msg.clone(),
            None => format!(
                "{} reviews | j/k: navigate  r: refresh  o: browse  d: download  ?: help  q: quit",
                self.dashboard.store.len()
            ),
        };

        let status_bar = Paragraph::new(status_text)
            .block(Block::default().borders(Borders::ALL))
            .wrap(Wrap { trim: false });

        frame.render_widget(status_bar, area);
    }

    fn render_help(&self, frame: &mut Frame) {
        let help = "Keys\n\n\
            j / Down    next review\n\
            k / Up      previous review\n\
            r           refresh from gerrit\n\
            o           open review in browser\n\
            d           fetch patchset into a local branch\n\
            q / Esc     quit\n\n\
            Any key closes this help.";

        let paragraph = Paragraph::new(help)
            .block(Block::default().borders(Borders::ALL).title("Help"))
            .wrap(Wrap { trim: false });

        let area = centered_rect(50, 50, frame.area());
        frame.render_widget(Clear, area);
        frame.render_widget(paragraph, area);
    }
}

/// Create a centered rectangle.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Setup the terminal for TUI rendering.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("Failed to create terminal")
}

/// Restore the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}

/// Launch the interactive review list.
pub fn run_tui(mut app: App) -> Result<()> {
    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let mut terminal = setup_terminal()?;

    let result = (|| -> Result<()> {
        loop {
            terminal
                .draw(|f| app.render(f))
                .context("Failed to draw frame")?;

            if app.should_quit {
                break;
            }

            if event::poll(Duration::from_millis(200)).context("Failed to poll events")?
                && let Event::Key(key) = event::read().context("Failed to read event")?
            {
                // Ignore key release events
                if key.kind == event::KeyEventKind::Press {
                    app.handle_input(key);
                }
            }
        }
        Ok(())
    })();

    restore_terminal(&mut terminal)?;

    result
}

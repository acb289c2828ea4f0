//! Terminal dashboard: instrument selector, date range, and overlay chart.
//!
//! # Controls
//!
//! - `Tab`: switch instrument
//! - `←`/`→`: choose the start or end date field
//! - `↑`/`↓`: move the selected date by one day
//! - `PgUp`/`PgDn`: move the selected date by 30 days
//! - `q`/`Esc`: quit
//!
//! Every control change re-filters the forecast and redraws. Model stages run
//! once per instrument and are served from a [`ForecastCache`] afterwards.

use std::io::{self, Stdout};

use chrono::{Days, NaiveDate};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame, Terminal,
};
use tracing::{info, warn};

use crate::chart::{ChartSpec, ForecastChart};
use crate::context::DashboardContext;
use crate::instrument::Instrument;
use crate::pipeline::{DateRange, Forecast, ForecastCache};

const HEADER: &str = "Stock Price Prediction (Mastercard & Visa)";
const PAGE_DAYS: i64 = 30;

/// Which date the arrow keys move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    Start,
    End,
}

/// A user interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ToggleInstrument,
    SelectField(DateField),
    ShiftDays(i64),
    Quit,
}

/// Map a key press to an action.
pub fn action_for_key(key: KeyEvent) -> Option<Action> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Tab | KeyCode::BackTab => Some(Action::ToggleInstrument),
        KeyCode::Left => Some(Action::SelectField(DateField::Start)),
        KeyCode::Right => Some(Action::SelectField(DateField::End)),
        KeyCode::Up => Some(Action::ShiftDays(1)),
        KeyCode::Down => Some(Action::ShiftDays(-1)),
        KeyCode::PageUp => Some(Action::ShiftDays(PAGE_DAYS)),
        KeyCode::PageDown => Some(Action::ShiftDays(-PAGE_DAYS)),
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        _ => None,
    }
}

/// Control values: selected instrument, date range and focused date field.
///
/// Start after end is accepted; it just selects nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub instrument: Instrument,
    pub range: DateRange,
    pub field: DateField,
}

impl Selection {
    pub fn new(instrument: Instrument, range: DateRange) -> Self {
        Self {
            instrument,
            range,
            field: DateField::Start,
        }
    }

    /// Apply an action. Returns whether the chart needs refreshing.
    pub fn apply(&mut self, action: Action) -> bool {
        match action {
            Action::ToggleInstrument => {
                self.instrument = self.instrument.next();
                true
            }
            Action::SelectField(field) => {
                self.field = field;
                false
            }
            Action::ShiftDays(days) => {
                let date = match self.field {
                    DateField::Start => &mut self.range.start,
                    DateField::End => &mut self.range.end,
                };
                match shift(*date, days) {
                    Some(shifted) => {
                        *date = shifted;
                        true
                    }
                    None => false,
                }
            }
            Action::Quit => false,
        }
    }
}

fn shift(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    if days >= 0 {
        date.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    }
}

/// Dashboard application state.
pub struct Dashboard<'a> {
    ctx: &'a DashboardContext,
    cache: ForecastCache,
    selection: Selection,
    /// Filtered forecast currently on screen.
    view: Forecast,
    /// Last pipeline failure, shown in the status line.
    error: Option<String>,
}

impl<'a> Dashboard<'a> {
    /// Create the dashboard and compute the initial view.
    pub fn new(ctx: &'a DashboardContext, selection: Selection) -> Self {
        let mut dashboard = Self {
            ctx,
            cache: ForecastCache::new(),
            view: Forecast::empty(selection.instrument),
            selection,
            error: None,
        };
        dashboard.refresh();
        dashboard
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn view(&self) -> &Forecast {
        &self.view
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Apply an action. Returns `false` when the user asked to quit.
    pub fn handle(&mut self, action: Action) -> bool {
        if action == Action::Quit {
            return false;
        }
        if self.selection.apply(action) {
            self.refresh();
        }
        true
    }

    /// Recompute the on-screen forecast for the current selection.
    ///
    /// Pipeline failures are kept for the status line and leave an empty chart.
    fn refresh(&mut self) {
        let Selection {
            instrument, range, ..
        } = self.selection;
        match self.cache.view(self.ctx, instrument, &range) {
            Ok(view) => {
                info!(
                    %instrument,
                    start = %range.start,
                    end = %range.end,
                    points = view.len(),
                    "refreshed chart"
                );
                self.view = view;
                self.error = None;
            }
            Err(err) => {
                warn!(%instrument, error = %err, "forecast failed");
                self.view = Forecast::empty(instrument);
                self.error = Some(format!("{err:#}"));
            }
        }
    }

    /// Run the terminal event loop until the user quits.
    pub fn run(mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.run_loop(&mut terminal);

        // Restore terminal
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;

            if let Event::Key(key) = event::read()? {
                if let Some(action) = action_for_key(key) {
                    if !self.handle(action) {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn draw(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(8),
                Constraint::Length(1),
            ])
            .split(frame.area());

        let header = Paragraph::new(HEADER).style(Style::default().add_modifier(Modifier::BOLD));
        frame.render_widget(header, chunks[0]);
        frame.render_widget(Paragraph::new(self.controls_line()), chunks[1]);

        let spec = ChartSpec::from_forecast(&self.view);
        frame.render_widget(ForecastChart::new(&spec), chunks[2]);

        frame.render_widget(Paragraph::new(self.status_line()), chunks[3]);
    }

    fn controls_line(&self) -> Line<'static> {
        let highlight = Style::default().fg(Color::Black).bg(Color::Cyan);
        let normal = Style::default();
        let field_style = |field| {
            if self.selection.field == field {
                highlight
            } else {
                normal
            }
        };

        let mut spans = vec![Span::raw(" Stock: ")];
        for instrument in Instrument::all() {
            let style = if instrument == self.selection.instrument {
                highlight
            } else {
                normal.fg(Color::DarkGray)
            };
            spans.push(Span::styled(format!(" {instrument} "), style));
        }
        spans.push(Span::raw("   Start: "));
        spans.push(Span::styled(
            self.selection.range.start.to_string(),
            field_style(DateField::Start),
        ));
        spans.push(Span::raw("   End: "));
        spans.push(Span::styled(
            self.selection.range.end.to_string(),
            field_style(DateField::End),
        ));
        Line::from(spans)
    }

    fn status_line(&self) -> Line<'static> {
        match &self.error {
            Some(err) => Line::from(Span::styled(
                format!(" error: {err}"),
                Style::default().fg(Color::Red),
            )),
            None => Line::from(Span::styled(
                format!(
                    " {} points | Tab: stock  ←/→: field  ↑/↓: ±1 day  PgUp/PgDn: ±{PAGE_DAYS} days  q: quit",
                    self.view.len()
                ),
                Style::default().fg(Color::DarkGray),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn selection() -> Selection {
        Selection::new(
            Instrument::Mastercard,
            DateRange::new(date(2023, 1, 1), date(2024, 1, 1)),
        )
    }

    #[test]
    fn test_key_mapping() {
        let press = |code| KeyEvent::new(code, KeyModifiers::NONE);
        assert_eq!(
            action_for_key(press(KeyCode::Tab)),
            Some(Action::ToggleInstrument)
        );
        assert_eq!(action_for_key(press(KeyCode::Up)), Some(Action::ShiftDays(1)));
        assert_eq!(
            action_for_key(press(KeyCode::PageDown)),
            Some(Action::ShiftDays(-30))
        );
        assert_eq!(action_for_key(press(KeyCode::Char('q'))), Some(Action::Quit));
        assert_eq!(action_for_key(press(KeyCode::Char('x'))), None);
    }

    #[test]
    fn test_toggle_instrument() {
        let mut sel = selection();
        assert!(sel.apply(Action::ToggleInstrument));
        assert_eq!(sel.instrument, Instrument::Visa);
    }

    #[test]
    fn test_shift_selected_field() {
        let mut sel = selection();
        assert!(sel.apply(Action::ShiftDays(-1)));
        assert_eq!(sel.range.start, date(2022, 12, 31));

        assert!(!sel.apply(Action::SelectField(DateField::End)));
        assert!(sel.apply(Action::ShiftDays(30)));
        assert_eq!(sel.range.end, date(2024, 1, 31));
        assert_eq!(sel.range.start, date(2022, 12, 31));
    }

    #[test]
    fn test_start_may_pass_end() {
        let mut sel = Selection::new(
            Instrument::Visa,
            DateRange::new(date(2023, 1, 1), date(2023, 1, 2)),
        );
        sel.apply(Action::ShiftDays(5));
        assert!(sel.range.is_inverted());
    }

    #[test]
    fn test_shift_out_of_calendar() {
        assert_eq!(shift(NaiveDate::MAX, 1), None);
        assert_eq!(shift(date(2023, 3, 1), -1), Some(date(2023, 2, 28)));
    }
}

//! Ratatui-based terminal UI.
//!
//! The TUI provides a city multi-select panel plus a set of chart tabs
//! (top cities, daily, cumulative, age range, sex), recomputed from the
//! cached dataset whenever the filter changes and re-fetched on a timer.

use std::io;
use std::time::{Duration, Instant};

use chrono::NaiveDate;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span, Text},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Clear, List, ListItem, Paragraph},
};

use crate::app::pipeline::{self, Views};
use crate::cli::ReportArgs;
use crate::data::cache::CacheStatus;
use crate::domain::{CategoryCount, CityCategoryCount, DashConfig, FeedKind};
use crate::error::AppError;
use crate::io::ingest::IngestedData;

mod plotters_chart;

use plotters_chart::{SeriesChart, palette_ratatui};

/// Start the TUI.
pub fn run(config: DashConfig, args: ReportArgs) -> Result<(), AppError> {
    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::fetch(format!("Failed to initialize terminal: {e}")))?;

    let mut app = App::new(config, args);
    app.refresh();
    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::fetch(format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::fetch(format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChartTab {
    TopCities,
    Daily,
    Cumulative,
    AgeRange,
    Sex,
}

impl ChartTab {
    const ALL: [ChartTab; 5] = [
        ChartTab::TopCities,
        ChartTab::Daily,
        ChartTab::Cumulative,
        ChartTab::AgeRange,
        ChartTab::Sex,
    ];

    fn title(self) -> &'static str {
        match self {
            ChartTab::TopCities => "Top Cities",
            ChartTab::Daily => "By Day",
            ChartTab::Cumulative => "Cumulative",
            ChartTab::AgeRange => "Age Range",
            ChartTab::Sex => "Sex",
        }
    }

    fn next(self) -> ChartTab {
        let idx = Self::ALL.iter().position(|t| *t == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    fn prev(self) -> ChartTab {
        let idx = Self::ALL.iter().position(|t| *t == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

struct App {
    config: DashConfig,
    kind: FeedKind,
    /// Selected cities (normalized). Empty means county-wide.
    filter: Vec<String>,
    cursor: usize,
    tab: ChartTab,
    status: String,
    /// City options from the latest dataset.
    cities: Vec<String>,
    ingest: Option<IngestedData>,
    views: Option<Views>,
    last_refresh: Instant,
}

impl App {
    fn new(config: DashConfig, args: ReportArgs) -> Self {
        let kind = if args.deaths { FeedKind::Deaths } else { FeedKind::Cases };
        Self {
            config,
            kind,
            filter: pipeline::normalize_filter(&args.cities),
            cursor: 0,
            tab: ChartTab::TopCities,
            status: "Fetching data...".to_string(),
            cities: Vec::new(),
            ingest: None,
            views: None,
            last_refresh: Instant::now(),
        }
    }

    fn event_loop<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
    ) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::fetch(format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(250))
                .map_err(|e| AppError::fetch(format!("Event poll error: {e}")))?
            {
                // Periodic recompute; the cache TTL gates actual network use.
                if self.last_refresh.elapsed() >= Duration::from_secs(self.config.update_interval_secs)
                {
                    self.refresh();
                    needs_redraw = true;
                }
                continue;
            }

            match event::read().map_err(|e| AppError::fetch(format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') => return true,
            KeyCode::Up => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                }
            }
            KeyCode::Down => {
                if self.cursor + 1 < self.cities.len() {
                    self.cursor += 1;
                }
            }
            KeyCode::Char(' ') => self.toggle_city_at_cursor(),
            KeyCode::Char('c') => {
                self.filter.clear();
                self.recompute_views();
                self.status = "Filter cleared (county-wide).".to_string();
            }
            KeyCode::Tab | KeyCode::Right => self.tab = self.tab.next(),
            KeyCode::Left => self.tab = self.tab.prev(),
            KeyCode::Char('d') => {
                self.kind = match self.kind {
                    FeedKind::Cases => FeedKind::Deaths,
                    FeedKind::Deaths => FeedKind::Cases,
                };
                self.refresh();
                self.status = format!("Feed: {}", self.kind.display_name());
            }
            KeyCode::Char('r') => {
                self.force_refresh();
            }
            KeyCode::Char('b') => self.write_debug_bundle(),
            _ => {}
        }
        false
    }

    fn toggle_city_at_cursor(&mut self) {
        let Some(city) = self.cities.get(self.cursor).cloned() else {
            return;
        };
        match self.filter.iter().position(|c| c == &city) {
            Some(idx) => {
                self.filter.remove(idx);
            }
            None => {
                self.filter.push(city);
                self.filter.sort();
            }
        }
        self.recompute_views();
        self.status = if self.filter.is_empty() {
            "Filter cleared (county-wide).".to_string()
        } else {
            format!("Filter: {}", self.filter.join(", "))
        };
    }

    /// Re-run the pipeline through the cache.
    ///
    /// Fetch failures never tear the UI down; they land in the status line
    /// while the previous dataset (if any) stays on screen.
    fn refresh(&mut self) {
        self.last_refresh = Instant::now();
        match pipeline::run_cycle(&self.config, self.kind, &self.filter) {
            Ok(run) => {
                self.cities = run.ingest.dataset.cities();
                if self.cursor >= self.cities.len() {
                    self.cursor = self.cities.len().saturating_sub(1);
                }
                // Keep only filter entries that still exist upstream, then
                // recompute in case that changed the filter.
                self.filter.retain(|c| self.cities.contains(c));
                self.views = Some(pipeline::compute_views(&run.ingest.dataset, &self.filter));
                self.status = format!(
                    "{} rows ({} dropped), {}",
                    run.ingest.rows_used,
                    run.ingest.row_errors.len(),
                    cache_label(run.cache_status),
                );
                self.ingest = Some(run.ingest);
            }
            Err(err) => {
                self.status = format!("Data temporarily unavailable: {err}");
            }
        }
    }

    /// Drop cached bytes first so the refresh really hits upstream.
    fn force_refresh(&mut self) {
        let cache = crate::data::cache::FileCache::new(
            self.config.cache_dir.clone(),
            Duration::from_secs(self.config.cache_ttl_secs),
        );
        if let Err(err) = cache.clear() {
            self.status = format!("Cache clear failed: {err}");
            return;
        }
        self.refresh();
    }

    /// Recompute views for the current filter without touching the network.
    fn recompute_views(&mut self) {
        if let Some(ingest) = &self.ingest {
            self.views = Some(pipeline::compute_views(&ingest.dataset, &self.filter));
        }
    }

    fn write_debug_bundle(&mut self) {
        let (Some(ingest), Some(views)) = (&self.ingest, &self.views) else {
            self.status = "No dataset loaded yet.".to_string();
            return;
        };
        match crate::debug::write_debug_bundle(&self.config, self.kind, ingest, views, &self.filter)
        {
            Ok(path) => self.status = format!("Wrote debug bundle: {}", path.display()),
            Err(err) => self.status = format!("Debug write failed: {err}"),
        }
    }

    // -----------------------------------------------------------------------
    // Drawing
    // -----------------------------------------------------------------------

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("cvd", Style::default().fg(Color::Cyan)),
            Span::raw(" — county COVID-19 dashboard"),
        ]));

        let (rows, range) = match &self.ingest {
            Some(ingest) => {
                let range = match ingest.dataset.date_range() {
                    Some((start, end)) => format!("{start} to {end}"),
                    None => "-".to_string(),
                };
                (ingest.rows_used.to_string(), range)
            }
            None => ("-".to_string(), "-".to_string()),
        };

        let filter_label = if self.filter.is_empty() {
            "county-wide".to_string()
        } else {
            self.filter.join(", ")
        };

        lines.push(Line::from(Span::styled(
            format!(
                "feed: {} | rows: {rows} | dates: {range} | filter: {filter_label}",
                self.kind.display_name(),
            ),
            Style::default().fg(Color::Gray),
        )));

        let tabs = ChartTab::ALL
            .iter()
            .map(|t| {
                if *t == self.tab {
                    format!("[{}]", t.title())
                } else {
                    format!(" {} ", t.title())
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        lines.push(Line::from(Span::styled(tabs, Style::default().fg(Color::Gray))));

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(28), Constraint::Min(0)])
            .split(area);

        self.draw_city_panel(frame, chunks[0]);
        self.draw_chart(frame, chunks[1]);
    }

    fn draw_city_panel(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let items: Vec<ListItem> = self
            .cities
            .iter()
            .map(|city| {
                match self.filter.iter().position(|c| c == city) {
                    Some(idx) => ListItem::new(Line::from(vec![
                        Span::styled("■ ", Style::default().fg(palette_ratatui(idx))),
                        Span::raw(city.clone()),
                    ])),
                    None => ListItem::new(Line::from(vec![Span::raw("  "), Span::raw(city.clone())])),
                }
            })
            .collect();

        let list = List::new(items)
            .block(Block::default().title("Select a City").borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ratatui::widgets::ListState::default();
        if !self.cities.is_empty() {
            state.select(Some(self.cursor.min(self.cities.len() - 1)));
        }
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let title = chart_title(self.tab, self.kind);
        let block = Block::default().title(title).borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some(views) = &self.views else {
            let msg = Paragraph::new("Data temporarily unavailable.")
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default());
            frame.render_widget(msg, inner);
            return;
        };

        match self.tab {
            ChartTab::TopCities => self.draw_top_cities(frame, inner, views),
            ChartTab::Daily => self.draw_series(frame, inner, views, SeriesKind::Daily),
            ChartTab::Cumulative => self.draw_series(frame, inner, views, SeriesKind::Cumulative),
            ChartTab::AgeRange => {
                self.draw_histogram(frame, inner, &views.age_histogram, &views.age_by_city)
            }
            ChartTab::Sex => {
                self.draw_histogram(frame, inner, &views.sex_histogram, &views.sex_by_city)
            }
        }
    }

    fn draw_top_cities(&self, frame: &mut ratatui::Frame<'_>, area: Rect, views: &Views) {
        if views.top_cities.is_empty() {
            frame.render_widget(Paragraph::new("No rows in the current scope."), area);
            return;
        }

        let take = (area.width as usize / 10).max(1);
        let bars: Vec<Bar> = views
            .top_cities
            .iter()
            .take(take)
            .map(|row| {
                Bar::default()
                    .value(row.count)
                    .label(Line::from(short_label(&row.city, 9)))
            })
            .collect();

        let chart = BarChart::default()
            .bar_width(9)
            .bar_gap(1)
            .bar_style(Style::default().fg(Color::Cyan))
            .value_style(Style::default().fg(Color::Black).bg(Color::Cyan))
            .data(BarGroup::default().bars(&bars));
        frame.render_widget(chart, area);
    }

    fn draw_series(&self, frame: &mut ratatui::Frame<'_>, area: Rect, views: &Views, kind: SeriesKind) {
        let Some((series, x_base, x_bounds, y_bounds)) = chart_series(views, &self.filter, kind)
        else {
            frame.render_widget(Paragraph::new("No rows in the current scope."), area);
            return;
        };

        let widget = SeriesChart {
            series: &series,
            x_base,
            x_bounds,
            y_bounds,
            y_label: "count",
            draw_points: kind == SeriesKind::Daily,
        };
        frame.render_widget(widget, area);
    }

    fn draw_histogram(
        &self,
        frame: &mut ratatui::Frame<'_>,
        area: Rect,
        combined: &[CategoryCount],
        by_city: &[CityCategoryCount],
    ) {
        if self.filter.len() > 1 {
            self.draw_grouped_histogram(frame, area, by_city);
            return;
        }

        if combined.iter().all(|bin| bin.count == 0) {
            frame.render_widget(Paragraph::new("No rows in the current scope."), area);
            return;
        }

        let bar_width = ((area.width as usize / combined.len().max(1)).saturating_sub(1))
            .clamp(3, 8) as u16;
        let bars: Vec<Bar> = combined
            .iter()
            .map(|bin| {
                Bar::default()
                    .value(bin.count)
                    .label(Line::from(short_label(&bin.category, bar_width as usize)))
            })
            .collect();

        let chart = BarChart::default()
            .bar_width(bar_width)
            .bar_gap(1)
            .bar_style(Style::default().fg(Color::Cyan))
            .value_style(Style::default().fg(Color::Black).bg(Color::Cyan))
            .data(BarGroup::default().bars(&bars));
        frame.render_widget(chart, area);
    }

    /// Grouped bars: one group per category, one colored bar per city.
    fn draw_grouped_histogram(
        &self,
        frame: &mut ratatui::Frame<'_>,
        area: Rect,
        by_city: &[CityCategoryCount],
    ) {
        let categories = category_order(by_city);
        if categories.is_empty() {
            frame.render_widget(Paragraph::new("No rows in the current scope."), area);
            return;
        }

        let mut chart = BarChart::default().bar_width(3).bar_gap(0).group_gap(2);
        for category in &categories {
            let bars: Vec<Bar> = self
                .filter
                .iter()
                .enumerate()
                .map(|(i, city)| {
                    let count = by_city
                        .iter()
                        .find(|row| &row.city == city && &row.category == category)
                        .map(|row| row.count)
                        .unwrap_or(0);
                    Bar::default()
                        .value(count)
                        .style(Style::default().fg(palette_ratatui(i)))
                        .value_style(
                            Style::default().fg(Color::Black).bg(palette_ratatui(i)),
                        )
                })
                .collect();
            chart = chart.data(
                BarGroup::default()
                    .label(Line::from(short_label(category, 8)))
                    .bars(&bars),
            );
        }
        frame.render_widget(chart, area);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "↑/↓ move  space select  c clear  ←/→ chart  d feed  r refresh  b debug  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeriesKind {
    Daily,
    Cumulative,
}

fn chart_title(tab: ChartTab, kind: FeedKind) -> String {
    let noun = match kind {
        FeedKind::Cases => "Confirmed COVID-19 Cases",
        FeedKind::Deaths => "COVID-19 Deaths",
    };
    match tab {
        ChartTab::TopCities => format!("Total {noun} by City"),
        ChartTab::Daily => format!("Total {noun} by Day"),
        ChartTab::Cumulative => format!("Total Cumulative {noun} by Day"),
        ChartTab::AgeRange => format!("Total {noun} by Age Range"),
        ChartTab::Sex => format!("Total {noun} by Sex"),
    }
}

/// Build chart series for Plotters.
///
/// With an empty filter there is a single county-wide series; otherwise one
/// series per selected city, colored in filter order. Returns
/// `(series, x_base, x_bounds, y_bounds)`.
fn chart_series(
    views: &Views,
    filter: &[String],
    kind: SeriesKind,
) -> Option<(Vec<(String, Vec<(f64, f64)>)>, NaiveDate, [f64; 2], [f64; 2])> {
    let mut series: Vec<(String, Vec<(f64, f64)>)> = Vec::new();
    let x_base;

    if filter.is_empty() {
        let points: Vec<(NaiveDate, u64)> = match kind {
            SeriesKind::Daily => views.daily.iter().map(|d| (d.date, d.count)).collect(),
            SeriesKind::Cumulative => views
                .cumulative
                .iter()
                .map(|d| (d.date, d.cumulative))
                .collect(),
        };
        x_base = points.first()?.0;
        series.push((
            String::new(),
            points
                .iter()
                .map(|(date, count)| (day_offset(x_base, *date), *count as f64))
                .collect(),
        ));
    } else {
        let rows: Vec<(&str, NaiveDate, u64)> = match kind {
            SeriesKind::Daily => views
                .daily_by_city
                .iter()
                .map(|r| (r.city.as_str(), r.date, r.count))
                .collect(),
            SeriesKind::Cumulative => views
                .cumulative_by_city
                .iter()
                .map(|r| (r.city.as_str(), r.date, r.cumulative))
                .collect(),
        };
        x_base = rows.iter().map(|(_, date, _)| *date).min()?;
        for city in filter {
            let points: Vec<(f64, f64)> = rows
                .iter()
                .filter(|(c, _, _)| *c == city.as_str())
                .map(|(_, date, count)| (day_offset(x_base, *date), *count as f64))
                .collect();
            series.push((city.clone(), points));
        }
    }

    let mut x_max = 0.0f64;
    let mut y_max = 1.0f64;
    for (_, points) in &series {
        for &(x, y) in points {
            x_max = x_max.max(x);
            y_max = y_max.max(y);
        }
    }

    Some((
        series,
        x_base,
        [0.0, x_max.max(1.0)],
        [0.0, y_max * 1.05],
    ))
}

fn day_offset(base: NaiveDate, date: NaiveDate) -> f64 {
    (date - base).num_days() as f64
}

fn category_order(by_city: &[CityCategoryCount]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for row in by_city {
        if !out.contains(&row.category) {
            out.push(row.category.clone());
        }
    }
    out
}

fn cache_label(status: CacheStatus) -> &'static str {
    match status {
        CacheStatus::Fresh => "from cache",
        CacheStatus::Refreshed => "freshly fetched",
        CacheStatus::StaleServed => "stale (upstream unavailable)",
    }
}

fn short_label(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    s.chars().take(max.saturating_sub(1)).collect::<String>() + "."
}

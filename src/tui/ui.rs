//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem},
    style::{Color, Style, Modifier},
};
use crate::cpu::{Bank, BANK_SIZE, MEMORY_SIZE};
use super::app::{DebuggerApp, WORDS_PER_ROW};

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(55),
            Constraint::Percentage(45),
        ])
        .split(frame.area());

    // Left side: code, registers and status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(8),
            Constraint::Length(10),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    draw_disassembly(frame, left_chunks[0], app);
    draw_registers(frame, left_chunks[1], app);
    draw_status(frame, left_chunks[2], app);

    // Right side: memory and help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(8),
            Constraint::Length(4),
        ])
        .split(chunks[1]);

    draw_memory(frame, right_chunks[0], app);
    draw_help(frame, right_chunks[1]);
}

/// Draw disassembly view around the program counter.
fn draw_disassembly(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let disasm = app.get_disassembly((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = disasm
        .iter()
        .map(|(addr, instr, is_current)| {
            let prefix = if *is_current { "▶ " } else { "  " };
            let bp = if app.breakpoints.contains(addr) { "●" } else { " " };
            let text = format!("{}{:04x}: {}", prefix, addr, instr);

            let style = if *is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if app.breakpoints.contains(addr) {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(format!("{} {}", bp, text)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Disassembly ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

/// Draw the three register banks, eight registers per line.
fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let mut content: Vec<Line> = Vec::new();

    for bank in Bank::ALL {
        let values = app.cpu.regs.bank(bank);
        for (row, words) in values.chunks(BANK_SIZE / 2).enumerate() {
            let label = if row == 0 { format!("{bank}: ") } else { "   ".to_string() };
            let mut spans = vec![Span::raw(label)];
            spans.extend(words.iter().map(|&w| {
                let style = if w == 0 {
                    Style::default().fg(Color::DarkGray)
                } else {
                    Style::default().fg(Color::White)
                };
                Span::styled(format!("{w:04x} "), style)
            }));
            content.push(Line::from(spans));
        }
    }

    let stack = app.cpu.stack();
    content.push(Line::from(vec![
        Span::raw("PC: "),
        Span::styled(format!("{:04x}", app.cpu.pc()), Style::default().fg(Color::Yellow)),
        Span::raw("   SP: "),
        Span::styled(format!("{:04x}", stack.last()), Style::default().fg(Color::Magenta)),
        Span::raw(format!(" (depth {})", stack.depth())),
        Span::raw("   Cycles: "),
        Span::styled(format!("{}", app.cpu.cycles), Style::default().fg(Color::Cyan)),
        Span::raw("   "),
        if app.faulted {
            Span::styled("FAULT", Style::default().fg(Color::Red))
        } else {
            Span::styled("OK", Style::default().fg(Color::Green))
        },
    ]));
    content.push(Line::from(vec![
        Span::raw("Last: "),
        Span::styled(app.last_pulse_line(), Style::default().fg(Color::DarkGray)),
    ]));

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Draw memory view.
fn draw_memory(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let visible_rows = (area.height as usize).saturating_sub(2);
    let start = app.mem_scroll;
    let end = (start + visible_rows).min(MEMORY_SIZE / WORDS_PER_ROW);
    let pc = app.cpu.pc();
    let sp = app.cpu.stack().last();

    let items: Vec<ListItem> = (start..end)
        .map(|row| {
            let base = row * WORDS_PER_ROW;
            let words = app.cpu.mem.slice(base, WORDS_PER_ROW);

            let mut spans = vec![Span::styled(
                format!("{base:04x}: "),
                Style::default().fg(Color::DarkGray),
            )];
            spans.extend(words.iter().enumerate().map(|(i, &w)| {
                let addr = base + i;
                let style = if addr == pc || addr == pc + 1 {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else if addr < sp {
                    Style::default().fg(Color::Magenta)
                } else if w != 0 {
                    Style::default().fg(Color::White)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                Span::styled(format!("{w:04x} "), style)
            }));

            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Memory ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(list, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default()
            .title(" Status ")
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: Step  r: Run  p: Pause  b: Breakpoint  x: Reset"),
        Line::from("↑↓ PgUp PgDn: Scroll memory  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}

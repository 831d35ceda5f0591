//! Diff renderer
//!
//! Paints a [`Grid`] onto a terminal output stream. A front buffer
//! remembers the last presented frame so `present` emits control
//! sequences only for cells that changed, making repeated presents of
//! an unchanged grid produce no output.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    queue,
    style::{
        Attribute, Color, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
    },
    terminal::{Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use tracing::trace;

use crate::core::term::grid::{Attr, Cell, Grid};

/// Renders grid state to any byte sink that accepts terminal control
/// sequences: a PTY slave, a tty, or an in-memory buffer in tests.
pub struct Renderer<W: Write> {
    out: W,
    /// Last presented frame, diffed against on each present.
    front: Grid,
    /// Forces a clear + full repaint on the next present.
    full_redraw: bool,
    /// Cursor placement emitted by the previous present.
    last_cursor: Option<(u16, u16)>,
    mouse: bool,
    initialized: bool,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, width: u16, height: u16, mouse: bool) -> Self {
        Self {
            out,
            front: Grid::new(width, height),
            full_redraw: false,
            last_cursor: None,
            mouse,
            initialized: false,
        }
    }

    /// Prepare the output surface: enter the alternate screen, hide the
    /// cursor, clear, and enable mouse reporting if configured.
    pub fn init(&mut self) -> io::Result<()> {
        queue!(
            self.out,
            EnterAlternateScreen,
            Hide,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;
        if self.mouse {
            write!(self.out, "\x1b[?1000h")?; // mouse click tracking
            write!(self.out, "\x1b[?1002h")?; // mouse drag tracking
            write!(self.out, "\x1b[?1006h")?; // SGR extended mouse mode
        }
        self.out.flush()?;
        self.initialized = true;
        self.full_redraw = false;
        self.front.clear();
        self.last_cursor = None;
        Ok(())
    }

    /// Restore the output surface. Safe to call more than once.
    pub fn shutdown(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;
        if self.mouse {
            write!(self.out, "\x1b[?1006l")?;
            write!(self.out, "\x1b[?1002l")?;
            write!(self.out, "\x1b[?1000l")?;
        }
        queue!(
            self.out,
            ResetColor,
            SetAttribute(Attribute::Reset),
            Show,
            LeaveAlternateScreen
        )?;
        self.out.flush()
    }

    /// Adopt new dimensions. The front buffer is discarded and the next
    /// present repaints from scratch.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.front = Grid::new(width, height);
        self.full_redraw = true;
    }

    /// Flush the grid to the output, emitting only differences from the
    /// previously presented frame, then place or hide the cursor. Fully
    /// flushes before returning.
    pub fn present(&mut self, grid: &Grid, cursor: Option<(u16, u16)>) -> io::Result<()> {
        if self.full_redraw {
            queue!(self.out, Clear(ClearType::All))?;
            self.front.clear();
            self.full_redraw = false;
        }

        let width = grid.width().min(self.front.width());
        let height = grid.height().min(self.front.height());

        let mut changed = 0usize;
        let mut last_attrs: Option<(Attr, Attr)> = None;
        let mut last_pos: Option<(u16, u16)> = None;

        for y in 0..height {
            let mut x = 0;
            while x < width {
                let cell = grid.cell(x, y);
                let w = cell.width();
                if x + w > width {
                    // A wide glyph that would spill past the edge is clipped.
                    break;
                }
                if self.front.cell(x, y) != cell {
                    if last_pos != Some((x, y)) {
                        queue!(self.out, MoveTo(x, y))?;
                    }
                    if last_attrs != Some((cell.fg, cell.bg)) {
                        apply_attrs(&mut self.out, cell.fg, cell.bg)?;
                        last_attrs = Some((cell.fg, cell.bg));
                    }
                    write!(self.out, "{}", cell.display_char())?;
                    last_pos = Some((x + w, y));
                    self.front.put(x, y, cell);
                    if w == 2 {
                        // The on-screen glyph covers the next column.
                        self.front.put(x + 1, y, Cell::EMPTY);
                    }
                    changed += 1;
                }
                x += w;
            }
        }

        if changed > 0 {
            queue!(self.out, ResetColor, SetAttribute(Attribute::Reset))?;
        }
        // Re-place the cursor whenever cells were painted over it or the
        // requested position changed.
        if changed > 0 || cursor != self.last_cursor {
            match cursor {
                Some((cx, cy)) => queue!(self.out, MoveTo(cx, cy), Show)?,
                None => queue!(self.out, Hide)?,
            }
            self.last_cursor = cursor;
        }
        if changed > 0 {
            trace!(cells = changed, "presented frame");
        }
        self.out.flush()
    }
}

/// Translate an attribute pair into SGR commands. Style flags are
/// honored from either mask; colors come from each mask's low byte.
fn apply_attrs<W: Write>(out: &mut W, fg: Attr, bg: Attr) -> io::Result<()> {
    queue!(out, SetAttribute(Attribute::Reset))?;

    let style = fg | bg;
    if style.contains(Attr::BOLD) {
        queue!(out, SetAttribute(Attribute::Bold))?;
    }
    if style.contains(Attr::DIM) {
        queue!(out, SetAttribute(Attribute::Dim))?;
    }
    if style.contains(Attr::ITALIC) {
        queue!(out, SetAttribute(Attribute::Italic))?;
    }
    if style.contains(Attr::UNDERLINE) {
        queue!(out, SetAttribute(Attribute::Underlined))?;
    }
    if style.contains(Attr::BLINK) {
        queue!(out, SetAttribute(Attribute::SlowBlink))?;
    }
    if style.contains(Attr::REVERSE) {
        queue!(out, SetAttribute(Attribute::Reverse))?;
    }
    #[cfg(feature = "extended-attrs")]
    {
        if style.contains(Attr::STRIKEOUT) {
            queue!(out, SetAttribute(Attribute::CrossedOut))?;
        }
        if style.contains(Attr::UNDERLINE_2) {
            queue!(out, SetAttribute(Attribute::DoubleUnderlined))?;
        }
        if style.contains(Attr::OVERLINE) {
            queue!(out, SetAttribute(Attribute::OverLined))?;
        }
        if style.contains(Attr::INVISIBLE) {
            queue!(out, SetAttribute(Attribute::Hidden))?;
        }
    }

    if let Some(color) = ansi_color(fg) {
        queue!(out, SetForegroundColor(color))?;
    }
    if let Some(color) = ansi_color(bg) {
        queue!(out, SetBackgroundColor(color))?;
    }
    Ok(())
}

/// Map an attribute's color byte to a palette color, or `None` for the
/// terminal default.
fn ansi_color(attr: Attr) -> Option<Color> {
    let mut idx = match attr.color() {
        0 => {
            if attr.contains(Attr::HI_BLACK) {
                return Some(Color::AnsiValue(0));
            }
            return None;
        }
        c @ 1..=8 => c - 1,
        _ => return None,
    };
    if attr.contains(Attr::BRIGHT) {
        idx += 8;
    }
    Some(Color::AnsiValue(idx))
}

impl<W: Write> Drop for Renderer<W> {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer(width: u16, height: u16) -> Renderer<Vec<u8>> {
        let mut r = Renderer::new(Vec::new(), width, height, false);
        r.init().unwrap();
        r.out.clear();
        r
    }

    fn output(r: &Renderer<Vec<u8>>) -> String {
        String::from_utf8_lossy(&r.out).into_owned()
    }

    #[test]
    fn test_init_sequences() {
        let mut r = Renderer::new(Vec::new(), 10, 4, false);
        r.init().unwrap();
        let out = output(&r);
        assert!(out.contains("\x1b[?1049h")); // alternate screen
        assert!(out.contains("\x1b[?25l")); // hide cursor
        assert!(out.contains("\x1b[2J")); // clear
    }

    #[test]
    fn test_mouse_mode_sequences() {
        let mut r = Renderer::new(Vec::new(), 10, 4, true);
        r.init().unwrap();
        let out = output(&r);
        assert!(out.contains("\x1b[?1000h"));
        assert!(out.contains("\x1b[?1006h"));

        r.out.clear();
        r.shutdown().unwrap();
        let out = output(&r);
        assert!(out.contains("\x1b[?1006l"));
        assert!(out.contains("\x1b[?1049l"));
    }

    #[test]
    fn test_present_positions_and_prints() {
        let mut r = renderer(20, 5);
        let mut grid = Grid::new(20, 5);
        grid.print(0, 0, "hi");

        r.present(&grid, None).unwrap();
        let out = output(&r);
        // Cursor moved to row 1, column 1 (1-based), then the literal text.
        assert!(out.contains("\x1b[1;1H"));
        assert!(out.contains("hi"));
    }

    #[test]
    fn test_present_is_idempotent_in_content() {
        let mut r = renderer(10, 3);
        let mut grid = Grid::new(10, 3);
        grid.print(1, 1, "x");

        r.present(&grid, None).unwrap();
        r.out.clear();

        // No mutation: the second present emits nothing.
        r.present(&grid, None).unwrap();
        assert!(r.out.is_empty());
    }

    #[test]
    fn test_present_emits_attributes() {
        let mut r = renderer(10, 2);
        let mut grid = Grid::new(10, 2);
        grid.set_cell(0, 0, 'A', Attr::RED | Attr::BOLD, Attr::BLUE);

        r.present(&grid, None).unwrap();
        let out = output(&r);
        assert!(out.contains("\x1b[1m")); // bold
        assert!(out.contains("\x1b[38;5;1m")); // red foreground
        assert!(out.contains("\x1b[48;5;4m")); // blue background
        assert!(out.contains('A'));
    }

    #[test]
    fn test_bright_and_hi_black_colors() {
        assert_eq!(ansi_color(Attr::RED), Some(Color::AnsiValue(1)));
        assert_eq!(
            ansi_color(Attr::RED | Attr::BRIGHT),
            Some(Color::AnsiValue(9))
        );
        assert_eq!(ansi_color(Attr::DEFAULT), None);
        assert_eq!(ansi_color(Attr::HI_BLACK), Some(Color::AnsiValue(0)));
    }

    #[test]
    fn test_cursor_placement() {
        let mut r = renderer(10, 10);
        let grid = Grid::new(10, 10);

        r.present(&grid, Some((5, 5))).unwrap();
        let out = output(&r);
        assert!(out.contains("\x1b[6;6H")); // 1-based position
        assert!(out.contains("\x1b[?25h")); // cursor shown

        r.out.clear();
        r.present(&grid, None).unwrap();
        assert!(output(&r).contains("\x1b[?25l")); // hidden again
    }

    #[test]
    fn test_diff_emits_only_changes() {
        let mut r = renderer(10, 2);
        let mut grid = Grid::new(10, 2);
        grid.print(0, 0, "abc");
        r.present(&grid, None).unwrap();

        r.out.clear();
        grid.set_cell(1, 0, 'X', Attr::DEFAULT, Attr::DEFAULT);
        r.present(&grid, None).unwrap();

        let out = output(&r);
        assert!(out.contains('X'));
        // Unchanged neighbors are not repainted.
        assert!(!out.contains('a'));
        assert!(!out.contains('c'));
    }

    #[test]
    fn test_cleared_cells_are_repainted_as_spaces() {
        let mut r = renderer(10, 2);
        let mut grid = Grid::new(10, 2);
        grid.print(0, 0, "@");
        r.present(&grid, None).unwrap();

        grid.clear();
        r.out.clear();
        r.present(&grid, None).unwrap();

        let out = output(&r);
        assert!(!out.contains('@'));
        assert!(out.contains(' '));
    }

    #[test]
    fn test_wide_char_skips_shadowed_column() {
        let mut r = renderer(6, 1);
        let mut grid = Grid::new(6, 1);
        grid.print(0, 0, "あb");

        r.present(&grid, None).unwrap();
        let out = output(&r);
        assert!(out.contains('あ'));
        assert!(out.contains('b'));

        // Nothing further to emit: the shadowed column is tracked.
        r.out.clear();
        r.present(&grid, None).unwrap();
        assert!(r.out.is_empty());
    }

    #[test]
    fn test_resize_forces_full_repaint() {
        let mut r = renderer(4, 2);
        let mut grid = Grid::new(4, 2);
        grid.print(0, 0, "ab");
        r.present(&grid, None).unwrap();

        grid.resize(6, 3);
        r.resize(6, 3);
        r.out.clear();
        r.present(&grid, None).unwrap();

        let out = output(&r);
        assert!(out.contains("\x1b[2J"));
        assert!(out.contains("ab"));
    }
}

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use unicode_width::UnicodeWidthChar;
use unicode_width::UnicodeWidthStr;

/// Scroll position along one axis, in the same unit for all three fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScrollExtent {
    pub offset: u64,
    pub viewport: u64,
    pub content: u64,
}

pub fn render_scrollbar(area: Rect, buf: &mut Buffer, extent: ScrollExtent, style: Style) {
    buf.set_style(area, style);
    if area.height == 0 {
        return;
    }
    if extent.content <= extent.viewport || extent.content == 0 {
        for dy in 0..area.height {
            buf.set_stringn(area.x, area.y + dy, " ", 1, style);
        }
        return;
    }

    let track_h = area.height as f64;
    let thumb_h = ((extent.viewport as f64 / extent.content as f64) * track_h)
        .round()
        .clamp(1.0, track_h) as u16;

    let max_offset = extent.content.saturating_sub(extent.viewport).max(1) as f64;
    let thumb_top = ((extent.offset as f64 / max_offset) * (track_h - thumb_h as f64))
        .round()
        .clamp(0.0, (track_h - thumb_h as f64).max(0.0)) as u16;

    for dy in 0..area.height {
        let ch = if dy >= thumb_top && dy < thumb_top + thumb_h {
            "█"
        } else {
            " "
        };
        buf.set_stringn(area.x, area.y + dy, ch, 1, style);
    }
}

/// Writes `input` starting at display column `start_col`, using at most `max_cols` cells.
///
/// Wide characters cut by either edge are skipped rather than split. Returns the number of cells
/// written.
pub fn render_str_clipped(
    x: u16,
    y: u16,
    start_col: u32,
    max_cols: u16,
    buf: &mut Buffer,
    input: &str,
    style: Style,
) -> u16 {
    let start_col = start_col as usize;
    let max_cols = max_cols as usize;
    let mut col = 0usize;
    let mut out_cols = 0usize;
    let mut tmp = [0u8; 4];

    for ch in input.chars() {
        let ch = if ch == '\t' || ch == '\n' { ' ' } else { ch };
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if w == 0 {
            continue;
        }
        if col < start_col {
            col += w;
            continue;
        }
        if out_cols + w > max_cols {
            break;
        }

        let s = ch.encode_utf8(&mut tmp);
        if let Some(cell) = buf.cell_mut((x + out_cols as u16, y)) {
            cell.set_style(style);
            cell.set_symbol(s);
        }
        if w == 2 {
            if let Some(cell) = buf.cell_mut((x + out_cols as u16 + 1, y)) {
                cell.set_style(style);
                cell.set_symbol("");
            }
        }
        out_cols += w;
        col += w;
    }
    out_cols as u16
}

/// Shortens `input` to `max_cols` display columns, ending with `…` when something was cut.
pub fn truncate_with_ellipsis(input: &str, max_cols: usize) -> String {
    if input.width() <= max_cols {
        return input.to_string();
    }
    if max_cols == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0usize;
    for ch in input.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > max_cols - 1 {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(buf: &Buffer, width: u16) -> String {
        (0..width)
            .map(|x| buf.cell((x, 0)).unwrap().symbol().to_string())
            .collect()
    }

    #[test]
    fn clipped_string_skips_and_stops() {
        let mut buf = Buffer::empty(Rect::new(0, 0, 6, 1));
        let written = render_str_clipped(0, 0, 2, 3, &mut buf, "abcdef", Style::default());
        assert_eq!(written, 3);
        assert_eq!(line(&buf, 6), "cde   ");
    }

    #[test]
    fn clipped_string_does_not_split_wide_chars() {
        let mut buf = Buffer::empty(Rect::new(0, 0, 4, 1));
        let written = render_str_clipped(0, 0, 0, 3, &mut buf, "你好", Style::default());
        assert_eq!(written, 2);
    }

    #[test]
    fn truncation_adds_ellipsis() {
        assert_eq!(truncate_with_ellipsis("Person 12", 6), "Perso…");
        assert_eq!(truncate_with_ellipsis("Ada", 6), "Ada");
        assert_eq!(truncate_with_ellipsis("Ada", 0), "");
    }

    #[test]
    fn scrollbar_fills_track_when_content_fits() {
        let mut buf = Buffer::empty(Rect::new(0, 0, 1, 3));
        render_scrollbar(
            Rect::new(0, 0, 1, 3),
            &mut buf,
            ScrollExtent {
                offset: 0,
                viewport: 10,
                content: 5,
            },
            Style::default(),
        );
        assert_eq!(buf.cell((0, 1)).unwrap().symbol(), " ");
    }

    #[test]
    fn scrollbar_thumb_reaches_bottom() {
        let mut buf = Buffer::empty(Rect::new(0, 0, 1, 4));
        render_scrollbar(
            Rect::new(0, 0, 1, 4),
            &mut buf,
            ScrollExtent {
                offset: 90,
                viewport: 10,
                content: 100,
            },
            Style::default(),
        );
        assert_eq!(buf.cell((0, 3)).unwrap().symbol(), "█");
        assert_eq!(buf.cell((0, 0)).unwrap().symbol(), " ");
    }
}

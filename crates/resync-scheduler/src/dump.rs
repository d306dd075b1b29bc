use std::io::Write;

use resync_core::StatHistory;

const HEADERS: [&str; 5] = ["NAME", "SUCCESS", "START", "END", "DURATION"];
const PADDING: usize = 3;

/// Write `history` as one column-aligned table per job: header, rows, then a
/// blank line. Each table is aligned on its own.
pub fn write_history<W: Write + ?Sized>(w: &mut W, history: &StatHistory) -> std::io::Result<()> {
    for (name, stats) in history {
        let rows: Vec<[String; 5]> = stats
            .iter()
            .map(|stat| {
                [
                    name.clone(),
                    stat.success.to_string(),
                    stat.start.clone(),
                    stat.end.clone(),
                    stat.human_duration(),
                ]
            })
            .collect();

        let mut widths = HEADERS.map(str::len);
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        write_row(w, &widths, HEADERS.iter().copied())?;
        for row in &rows {
            write_row(w, &widths, row.iter().map(String::as_str))?;
        }
        writeln!(w)?;
    }
    w.flush()
}

fn write_row<'a, W: Write + ?Sized>(
    w: &mut W,
    widths: &[usize],
    cells: impl Iterator<Item = &'a str>,
) -> std::io::Result<()> {
    let cells: Vec<&str> = cells.collect();
    let last = cells.len().saturating_sub(1);
    let mut line = String::new();
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        line.push_str(cell);
        if i < last {
            let pad = width - cell.chars().count() + PADDING;
            line.extend(std::iter::repeat(' ').take(pad));
        }
    }
    writeln!(w, "{line}")
}

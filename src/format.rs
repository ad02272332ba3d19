use std::fmt::Write as _;

/// One row of the `--list`/`--list-empty` table.
#[derive(Debug, Clone, PartialEq)]
pub struct ListEntry {
    pub id: i64,
    pub dim: u16,
    pub empty: Option<bool>,
}

/// The orchestrator's pipeline output, already gated/rebinned/strided/
/// zero-suppressed — the formatter only owns column layout and header rows,
/// per spec: it is the sole place text is emitted.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedOutput {
    List(Vec<ListEntry>),
    Info(Vec<(String, String)>),
    /// 1D mode and the single-axis/polygon-gated 2D projections: `x | n | dn`.
    Columns1D(Vec<(f64, i64, f64)>),
    /// Crop / no-gate 2D mode: `x | y | n`, grouped by x-column so a blank
    /// line can separate columns the way downstream plotters expect.
    Columns2D(Vec<Vec<(f64, f64, i64)>>),
}

/// Renders a pipeline result to the text format described in spec §4.6.
pub fn render(output: &RenderedOutput) -> String {
    let mut buf = String::new();
    match output {
        RenderedOutput::List(entries) => {
            let _ = writeln!(buf, "#id dim empty");
            for e in entries {
                match e.empty {
                    Some(empty) => {
                        let _ = writeln!(buf, "{} {} {}", e.id, e.dim, empty);
                    }
                    None => {
                        let _ = writeln!(buf, "{} {}", e.id, e.dim);
                    }
                }
            }
        }
        RenderedOutput::Info(fields) => {
            for (key, value) in fields {
                let _ = writeln!(buf, "#{key}: {value}");
            }
        }
        RenderedOutput::Columns1D(rows) => {
            let _ = writeln!(buf, "#X N dN");
            for (x, n, dn) in rows {
                let _ = writeln!(buf, "{x} {n} {dn}");
            }
        }
        RenderedOutput::Columns2D(columns) => {
            let _ = writeln!(buf, "#X Y N");
            for (col_idx, column) in columns.iter().enumerate() {
                if col_idx > 0 {
                    let _ = writeln!(buf);
                }
                for (x, y, n) in column {
                    let _ = writeln!(buf, "{x} {y} {n}");
                }
            }
        }
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s6_list_mode_table() {
        let output = RenderedOutput::List(vec![
            ListEntry { id: 100, dim: 1, empty: None },
            ListEntry { id: 200, dim: 2, empty: None },
            ListEntry { id: 300, dim: 1, empty: None },
        ]);
        let text = render(&output);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "#id dim empty");
        assert_eq!(lines[1], "100 1");
    }

    #[test]
    fn s1_columns_1d_header_and_rows() {
        let output = RenderedOutput::Columns1D(vec![(0.5, 1, 1.0), (1.5, 2, 1.4142)]);
        let text = render(&output);
        assert!(text.starts_with("#X N dN\n"));
        assert!(text.contains("0.5 1 1"));
    }

    #[test]
    fn columns_2d_blank_line_between_x_columns() {
        let output = RenderedOutput::Columns2D(vec![
            vec![(0.5, 0.5, 1), (0.5, 1.5, 2)],
            vec![(1.5, 0.5, 3)],
        ]);
        let text = render(&output);
        let lines: Vec<&str> = text.split('\n').collect();
        // header, two rows, blank separator, one row, trailing empty from writeln.
        assert_eq!(lines[0], "#X Y N");
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "1.5 0.5 3");
    }
}

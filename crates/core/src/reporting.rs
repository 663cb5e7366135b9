//! Report helpers: percentage rates and CSV export.

/// `part / whole` as a percentage rounded to one decimal, 0 when `whole` is 0.
pub fn rate(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    ((part as f64 / whole as f64) * 1000.0).round() / 10.0
}

/// Escape a value for CSV: wrap in quotes if it contains comma, quote, or newline.
pub fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render a header and rows as CSV, one record per line, CRLF-free.
pub fn render_csv<R, C>(header: &[&str], rows: R) -> String
where
    R: IntoIterator<Item = C>,
    C: IntoIterator<Item = String>,
{
    let mut out = header
        .iter()
        .map(|h| csv_escape(h))
        .collect::<Vec<_>>()
        .join(",");
    out.push('\n');
    for row in rows {
        let line = row
            .into_iter()
            .map(|cell| csv_escape(&cell))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates() {
        assert_eq!(rate(0, 0), 0.0);
        assert_eq!(rate(2, 3), 66.7);
        assert_eq!(rate(3, 3), 100.0);
    }

    #[test]
    fn escape() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_escape("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn render() {
        let rows = vec![
            vec!["CROU-NY".to_string(), "1000".to_string()],
            vec!["Dosso, Tahoua".to_string(), "0".to_string()],
        ];
        let csv = render_csv(&["tenant", "amount"], rows);
        assert_eq!(csv, "tenant,amount\nCROU-NY,1000\n\"Dosso, Tahoua\",0\n");
    }

    #[test]
    fn render_header_only() {
        let rows: Vec<Vec<String>> = Vec::new();
        assert_eq!(render_csv(&["a"], rows), "a\n");
    }
}

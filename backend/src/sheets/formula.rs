//! Formula construction.
//!
//! Every formula string sent to the spreadsheet is assembled from this
//! small expression tree and rendered in one place, so quoting, anchoring
//! and the argument separator have a single owner instead of being
//! re-implemented at every call site.

use super::column::column_letters;

/// Reference to a single cell, optionally tab-qualified and `$`-anchored.
#[derive(Debug, Clone)]
pub struct CellRef {
    pub tab: Option<String>,
    pub col: u32,
    pub row: u32,
    pub abs_col: bool,
    pub abs_row: bool,
}

/// Column span starting at a cell; the end row is open when `end_row` is
/// `None` ("A2:A"). End anchors mirror the start anchors, which covers
/// every range shape the engine emits.
#[derive(Debug, Clone)]
pub struct RangeRef {
    pub start: CellRef,
    pub end_col: u32,
    pub end_row: Option<u32>,
}

pub fn cell(col: u32, row: u32) -> CellRef {
    CellRef {
        tab: None,
        col,
        row,
        abs_col: false,
        abs_row: false,
    }
}

impl CellRef {
    pub fn abs(mut self) -> Self {
        self.abs_col = true;
        self.abs_row = true;
        self
    }

    pub fn abs_col(mut self) -> Self {
        self.abs_col = true;
        self
    }

    pub fn abs_row(mut self) -> Self {
        self.abs_row = true;
        self
    }

    pub fn in_tab(mut self, tab: &str) -> Self {
        self.tab = Some(tab.to_string());
        self
    }

    /// Extends the cell into a range ending at `end_col`, optionally
    /// bounded at `end_row`.
    pub fn to(self, end_col: u32, end_row: impl Into<Option<u32>>) -> RangeRef {
        RangeRef {
            start: self,
            end_col,
            end_row: end_row.into(),
        }
    }

    fn write_local(&self, out: &mut String) {
        if self.abs_col {
            out.push('$');
        }
        out.push_str(&column_letters(self.col));
        if self.abs_row {
            out.push('$');
        }
        out.push_str(&self.row.to_string());
    }
}

fn write_tab(tab: &Option<String>, out: &mut String) {
    if let Some(tab) = tab {
        let plain = tab.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if plain {
            out.push_str(tab);
        } else {
            out.push('\'');
            out.push_str(&tab.replace('\'', "''"));
            out.push('\'');
        }
        out.push('!');
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    /// Quoted string literal; inner quotes are doubled on render.
    Str(String),
    Int(i64),
    Cell(CellRef),
    Range(RangeRef),
    Call(String, Vec<Expr>),
    Bin(Box<Expr>, &'static str, Box<Expr>),
    Paren(Box<Expr>),
    /// `{a;b;c}` stacking, as used around QUERY sources.
    Array(Vec<Expr>),
    /// Renders to nothing; the trailing omitted argument of IF.
    Empty,
}

pub fn text(value: &str) -> Expr {
    Expr::Str(value.to_string())
}

pub fn num(value: i64) -> Expr {
    Expr::Int(value)
}

pub fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Call(name.to_string(), args)
}

pub fn bin(left: Expr, op: &'static str, right: Expr) -> Expr {
    Expr::Bin(Box::new(left), op, Box::new(right))
}

pub fn paren(inner: Expr) -> Expr {
    Expr::Paren(Box::new(inner))
}

pub fn array(items: Vec<Expr>) -> Expr {
    Expr::Array(items)
}

impl From<CellRef> for Expr {
    fn from(cell: CellRef) -> Self {
        Expr::Cell(cell)
    }
}

impl From<RangeRef> for Expr {
    fn from(range: RangeRef) -> Self {
        Expr::Range(range)
    }
}

impl Expr {
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.write(&mut out);
        out
    }

    /// The `=`-prefixed form written into a cell.
    pub fn formula(&self) -> String {
        format!("={}", self.render())
    }

    fn write(&self, out: &mut String) {
        match self {
            Expr::Str(value) => {
                out.push('"');
                out.push_str(&value.replace('"', "\"\""));
                out.push('"');
            }
            Expr::Int(value) => out.push_str(&value.to_string()),
            Expr::Cell(cell) => {
                write_tab(&cell.tab, out);
                cell.write_local(out);
            }
            Expr::Range(range) => {
                write_tab(&range.start.tab, out);
                range.start.write_local(out);
                out.push(':');
                if range.start.abs_col {
                    out.push('$');
                }
                out.push_str(&column_letters(range.end_col));
                if let Some(end_row) = range.end_row {
                    if range.start.abs_row {
                        out.push('$');
                    }
                    out.push_str(&end_row.to_string());
                }
            }
            Expr::Call(name, args) => {
                out.push_str(name);
                out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push(';');
                    }
                    arg.write(out);
                }
                out.push(')');
            }
            Expr::Bin(left, op, right) => {
                left.write(out);
                out.push_str(op);
                right.write(out);
            }
            Expr::Paren(inner) => {
                out.push('(');
                inner.write(out);
                out.push(')');
            }
            Expr::Array(items) => {
                out.push('{');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(';');
                    }
                    item.write(out);
                }
                out.push('}');
            }
            Expr::Empty => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_literals_double_inner_quotes() {
        assert_eq!(text("say \"hi\"").formula(), "=\"say \"\"hi\"\"\"");
        assert_eq!(text("Login").formula(), "=\"Login\"");
    }

    #[test]
    fn cells_render_anchors_and_tabs() {
        assert_eq!(Expr::from(cell(2, 5)).render(), "B5");
        assert_eq!(Expr::from(cell(2, 5).abs()).render(), "$B$5");
        assert_eq!(Expr::from(cell(2, 5).abs_row()).render(), "B$5");
        assert_eq!(
            Expr::from(cell(1, 1).in_tab("Registrations")).render(),
            "Registrations!A1"
        );
        assert_eq!(
            Expr::from(cell(1, 1).in_tab("Group balance")).render(),
            "'Group balance'!A1"
        );
    }

    #[test]
    fn ranges_render_open_and_bounded_forms() {
        assert_eq!(Expr::from(cell(5, 2).to(5, None)).render(), "E2:E");
        assert_eq!(Expr::from(cell(1, 2).to(1, 9999)).render(), "A2:A9999");
        assert_eq!(
            Expr::from(cell(1, 2).abs().in_tab("Reg").to(1, None)).render(),
            "Reg!$A$2:$A"
        );
        assert_eq!(
            Expr::from(cell(2, 3).abs().to(11, 3)).render(),
            "$B$3:$K$3"
        );
    }

    #[test]
    fn calls_use_semicolon_separators() {
        let expr = call(
            "SUMIF",
            vec![
                cell(2, 3).abs().to(11, 3).into(),
                text("=0"),
                cell(2, 6).abs_col().to(11, 6).into(),
            ],
        );
        assert_eq!(expr.formula(), "=SUMIF($B$3:$K$3;\"=0\";$B6:$K6)");
    }

    #[test]
    fn empty_renders_to_omitted_argument() {
        let expr = call(
            "IF",
            vec![
                bin(cell(1, 6).abs_col().into(), "=", cell(1, 2).abs().in_tab("Reg").to(1, None).into()),
                cell(3, 2).abs_row().in_tab("Reg").to(3, None).into(),
                Expr::Empty,
            ],
        );
        assert_eq!(expr.render(), "IF($A6=Reg!$A$2:$A;Reg!C$2:C;)");
    }

    #[test]
    fn arrays_and_operators_compose() {
        let expr = call(
            "QUERY",
            vec![array(vec![cell(5, 2).in_tab("Raw").to(5, None).into()])],
        );
        assert_eq!(expr.formula(), "=QUERY({Raw!E2:E})");

        let owed = bin(
            Expr::from(cell(19, 6)),
            "-",
            paren(bin(cell(21, 6).into(), " + ", cell(23, 6).into())),
        );
        assert_eq!(owed.formula(), "=S6-(U6 + W6)");
    }
}

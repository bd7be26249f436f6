//! Summary synthesis and the derived report tabs.
//!
//! The summary tab has one row per unique Login key (grown by a UNIQUE
//! formula in hidden column A) and joins everything else in through
//! INDEX/MATCH and TEXTJOIN lookups against the registration tab. Its
//! column layout is derived positionally at synthesis time: course columns
//! first, then a fixed sequence of summary columns at the next free index.
//! `SummaryLayout` is the single owner of that arithmetic; readers resolve
//! positions by header text instead (see `extract`).

use super::client::SheetsError;
use super::column::{column_index, column_letters};
use super::formats::{currency_pln, COURSE_COLUMN_PX, NARROW_COLUMN_PX, PAYMENT_COLUMN_PX};
use super::formula::{array, bin, call, cell, paren, text, Expr};
use super::{Engine, MAX_ROWS, SUMMARY_FIRST_DATA_ROW};
use chrono::{Duration, Local};
use common::model::course::Course;
use common::model::email::EmailType;

/// Number of installment (amount, date) column pairs.
pub const INSTALLMENT_SLOTS: u32 = 5;

/// Column positions of the summary tab, derived once per run.
///
/// Course status columns start at B; after them the summary columns follow
/// in a fixed order. The "Sum Cheaper" column only exists when the pricing
/// has the discounted fourth tier.
#[derive(Debug, Clone)]
pub struct SummaryLayout {
    pub course_count: u32,
    pub first_course_col: u32,
    pub sum_full_col: u32,
    pub sum_cheaper_col: Option<u32>,
    pub email_col: u32,
    pub first_name_col: u32,
    pub last_name_col: u32,
    pub phone_col: u32,
    pub courses_col: u32,
    pub partner_col: u32,
    pub installment_col: u32,
    pub discount_col: u32,
    pub installment_sum_col: u32,
    pub need_to_be_paid_col: u32,
    pub first_installment_pair_col: u32,
    pub first_marker_col: u32,
}

impl SummaryLayout {
    pub fn for_event(course_count: u32, has_cheaper_tier: bool) -> Self {
        let first_course_col = 2;
        let sum_full_col = first_course_col + course_count;
        let sum_cheaper_col = has_cheaper_tier.then_some(sum_full_col + 1);
        let mut next = sum_full_col + if has_cheaper_tier { 2 } else { 1 };
        let mut take = || {
            let col = next;
            next += 1;
            col
        };
        let email_col = take();
        let first_name_col = take();
        let last_name_col = take();
        let phone_col = take();
        let courses_col = take();
        let partner_col = take();
        let installment_col = take();
        let discount_col = take();
        let installment_sum_col = take();
        let need_to_be_paid_col = take();
        let first_installment_pair_col = next;
        let first_marker_col = first_installment_pair_col + INSTALLMENT_SLOTS * 2;
        SummaryLayout {
            course_count,
            first_course_col,
            sum_full_col,
            sum_cheaper_col,
            email_col,
            first_name_col,
            last_name_col,
            phone_col,
            courses_col,
            partner_col,
            installment_col,
            discount_col,
            installment_sum_col,
            need_to_be_paid_col,
            first_installment_pair_col,
            first_marker_col,
        }
    }

    /// 0-based installment slot to its amount column.
    pub fn installment_amount_col(&self, slot: u32) -> u32 {
        self.first_installment_pair_col + slot * 2
    }

    /// 0-based installment slot to its date column.
    pub fn installment_date_col(&self, slot: u32) -> u32 {
        self.installment_amount_col(slot) + 1
    }

    pub fn marker_col(&self, email_type: EmailType) -> u32 {
        let offset = EmailType::CONCRETE
            .iter()
            .position(|t| *t == email_type)
            .unwrap_or(0);
        self.first_marker_col + offset as u32
    }
}

/// Course codes are written vertically into their narrow columns: one
/// letter per line.
fn stack_letters(value: &str) -> String {
    value
        .chars()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

impl Engine {
    /// Creates the summary tab and fills in the whole formula grid. Does
    /// nothing when the tab already exists.
    pub(crate) fn set_up_summary_tab(&mut self) -> Result<(), SheetsError> {
        let title = self.settings.summary_tab_name.clone();
        let course_count = self.event.courses.len() as u32;
        let tab = self.ensure_tab(&title, 30 + course_count, MAX_ROWS)?;
        if !tab.created {
            return Ok(());
        }
        let layout = self.summary_layout();
        let reg_tab = self.settings.registration_tab_name.clone();
        let reg_login = column_index(&self.reg_cols().login);

        // Hidden column A grows one row per unique Login key.
        self.buffer.hide_column(tab.id, 1);
        let unique = call(
            "UNIQUE",
            vec![cell(reg_login, 2).in_tab(&reg_tab).to(reg_login, 9999).into()],
        );
        self.queue_formula(tab.id, 1, SUMMARY_FIRST_DATA_ROW, &unique);

        // Price tiers in the hidden first row.
        let prices = self.settings.prices.clone();
        for (i, price) in prices.iter().take(3).enumerate() {
            self.queue_formula(tab.id, 2 + i as u32, 1, &Expr::Int(*price));
        }
        if let Some(cheaper) = prices.get(3) {
            self.queue_formula(tab.id, 6, 1, &Expr::Int(*cheaper));
        }
        self.flush()?;

        // Course columns: name, full/shorter criterion, stacked code,
        // attendance sum.
        for (i, course) in self.event.courses.clone().iter().enumerate() {
            let col = layout.first_course_col + i as u32;
            self.queue_text(tab.id, col, 2, &course.name);
            self.queue_text(tab.id, col, 3, if course.is_shorter { "1" } else { "0" });
            self.queue_text(tab.id, col, 4, &stack_letters(&course.code));
            let sum = call(
                "SUM",
                vec![cell(col, SUMMARY_FIRST_DATA_ROW)
                    .to(col, MAX_ROWS + SUMMARY_FIRST_DATA_ROW)
                    .into()],
            );
            self.queue_formula(tab.id, col, 5, &sum);
            self.buffer.set_column_width(tab.id, col, COURSE_COLUMN_PX);
        }
        self.buffer.hide_row(tab.id, 1);
        self.buffer.hide_row(tab.id, 2);
        self.flush()?;

        self.queue_summary_headers(tab.id, &layout);
        self.flush()?;

        for row in SUMMARY_FIRST_DATA_ROW..MAX_ROWS + SUMMARY_FIRST_DATA_ROW {
            self.queue_summary_row(tab.id, &layout, row);
            if row % 50 == 0 {
                self.flush()?;
            }
        }
        self.flush()?;

        self.add_installment_columns_to_registration_tab(&layout)
    }

    fn queue_summary_headers(&mut self, sheet_id: i64, layout: &SummaryLayout) {
        let header_row = SUMMARY_FIRST_DATA_ROW - 1;
        let totals_row = SUMMARY_FIRST_DATA_ROW - 2;

        let count_column = |engine: &mut Engine, col: u32, label: &str| {
            let sum = call(
                "SUM",
                vec![cell(col, SUMMARY_FIRST_DATA_ROW).to(col, None).into()],
            );
            engine.queue_formula(sheet_id, col, totals_row, &sum);
            engine.queue_text(sheet_id, col, header_row, &stack_letters(label));
            engine.buffer.set_column_width(sheet_id, col, COURSE_COLUMN_PX);
        };
        count_column(self, layout.sum_full_col, "Sum Full");
        if let Some(cheaper_col) = layout.sum_cheaper_col {
            count_column(self, cheaper_col, "Sum Cheaper");
        }

        for (col, label) in [
            (layout.email_col, "Email"),
            (layout.first_name_col, "First Name"),
            (layout.last_name_col, "Last Name"),
            (layout.phone_col, "Phone Number"),
            (layout.courses_col, "Courses"),
            (layout.partner_col, "Partner"),
            (layout.installment_col, "Installment"),
            (layout.discount_col, "Discount"),
            (layout.installment_sum_col, "Installment\nSum"),
            (layout.need_to_be_paid_col, "Need to\nbe Paid"),
        ] {
            self.queue_text(sheet_id, col, header_row, label);
        }

        // E1 keeps the letters of the installment-sum column so other tabs
        // and human operators can find the money block without re-deriving
        // the layout.
        self.queue_text(
            sheet_id,
            5,
            1,
            &column_letters(layout.installment_sum_col),
        );

        for slot in 0..INSTALLMENT_SLOTS {
            self.queue_text(
                sheet_id,
                layout.installment_amount_col(slot),
                header_row,
                &format!("Inst. {}\nAmount", slot + 1),
            );
            self.queue_text(
                sheet_id,
                layout.installment_date_col(slot),
                header_row,
                &format!("Inst. {}\nDate", slot + 1),
            );
        }

        for email_type in EmailType::CONCRETE {
            self.queue_text(
                sheet_id,
                layout.marker_col(email_type),
                header_row,
                email_type.column_header(),
            );
        }
    }

    fn queue_summary_row(&mut self, sheet_id: i64, layout: &SummaryLayout, row: u32) {
        let reg_tab = self.settings.registration_tab_name.clone();
        let reg = self.reg_cols().clone();
        let reg_login = column_index(&reg.login);
        let surcharge = self.settings.installment_surcharge;

        if layout.course_count > 0 {
            let last_course = layout.sum_full_col - 1;
            let count_of = |criterion: &str| {
                call(
                    "SUMIF",
                    vec![
                        cell(layout.first_course_col, 3).abs().to(last_course, 3).into(),
                        text(criterion),
                        cell(layout.first_course_col, row)
                            .abs_col()
                            .to(last_course, row)
                            .into(),
                    ],
                )
            };
            self.queue_formula(sheet_id, layout.sum_full_col, row, &count_of("=0"));
            if let Some(cheaper_col) = layout.sum_cheaper_col {
                self.queue_formula(sheet_id, cheaper_col, row, &count_of("=1"));
            }

            // Status letter per course, joined on (login, course name).
            let reg_acc = column_index(&reg.accepted);
            let reg_course = column_index(&reg.course);
            for course_col in layout.first_course_col..layout.sum_full_col {
                let status = call(
                    "IFERROR",
                    vec![
                        call(
                            "INDEX",
                            vec![
                                cell(reg_acc, 2).abs().in_tab(&reg_tab).to(reg_acc, MAX_ROWS).into(),
                                call(
                                    "MATCH",
                                    vec![
                                        Expr::Int(1),
                                        bin(
                                            paren(bin(
                                                cell(reg_login, 2)
                                                    .abs()
                                                    .in_tab(&reg_tab)
                                                    .to(reg_login, MAX_ROWS)
                                                    .into(),
                                                "=",
                                                cell(1, row).abs_col().into(),
                                            )),
                                            "*",
                                            paren(bin(
                                                cell(reg_course, 2)
                                                    .abs()
                                                    .in_tab(&reg_tab)
                                                    .to(reg_course, MAX_ROWS)
                                                    .into(),
                                                "=",
                                                cell(course_col, 2).abs_row().into(),
                                            )),
                                        ),
                                        Expr::Int(0),
                                    ],
                                ),
                            ],
                        ),
                        text(""),
                    ],
                );
                self.queue_formula(sheet_id, course_col, row, &status);
            }
        }

        // Money columns carry the currency format.
        for col in [
            layout.discount_col,
            layout.installment_sum_col,
            layout.need_to_be_paid_col,
        ] {
            self.buffer.add_cell_format(sheet_id, col, row, &currency_pln());
        }

        // Tiered amount due: first course at full price, second at the
        // second tier, every further one at the third, minus discount, plus
        // the surcharge when paying in installments.
        let full = || Expr::from(cell(layout.sum_full_col, row));
        let price = |col: u32| Expr::from(cell(col, 1).abs());
        let two_tier = bin(price(2), "+", price(3));
        let many_tier = bin(
            two_tier.clone(),
            "+",
            bin(price(4), "*", paren(bin(full(), "-", Expr::Int(2)))),
        );
        let tier = call(
            "IF",
            vec![
                bin(full(), "=", Expr::Int(1)),
                price(2),
                call(
                    "IF",
                    vec![
                        bin(full(), "=", Expr::Int(2)),
                        two_tier,
                        call(
                            "IF",
                            vec![
                                bin(full(), ">", Expr::Int(2)),
                                many_tier,
                                Expr::Int(0),
                            ],
                        ),
                    ],
                ),
            ],
        );
        let surcharge_if = call(
            "IF",
            vec![
                call(
                    "AND",
                    vec![
                        bin(full(), ">", Expr::Int(0)),
                        bin(
                            cell(layout.installment_col, row).into(),
                            "<>",
                            text(""),
                        ),
                    ],
                ),
                Expr::Int(surcharge),
                Expr::Int(0),
            ],
        );
        let due = bin(
            bin(tier, " - ", cell(layout.discount_col, row).into()),
            " + ",
            surcharge_if,
        );
        self.queue_formula(sheet_id, layout.installment_sum_col, row, &due);

        // Still owed: due minus the five installment amounts.
        let mut paid = Expr::from(cell(layout.installment_amount_col(0), row));
        for slot in 1..INSTALLMENT_SLOTS {
            paid = bin(
                paid,
                " + ",
                cell(layout.installment_amount_col(slot), row).into(),
            );
        }
        let owed = bin(
            cell(layout.installment_sum_col, row).into(),
            "-",
            paren(paid),
        );
        self.queue_formula(sheet_id, layout.need_to_be_paid_col, row, &owed);

        // Student columns: every value joined over the rows sharing this
        // row's Login key.
        let join_from = |source: &str| {
            let src = column_index(source);
            call(
                "ARRAYFORMULA",
                vec![call(
                    "TEXTJOIN",
                    vec![
                        text(", "),
                        Expr::Int(1),
                        call(
                            "UNIQUE",
                            vec![call(
                                "IF",
                                vec![
                                    bin(
                                        cell(1, row).abs_col().into(),
                                        "=",
                                        cell(reg_login, 2)
                                            .abs()
                                            .in_tab(&reg_tab)
                                            .to(reg_login, None)
                                            .into(),
                                    ),
                                    cell(src, 2).abs_row().in_tab(&reg_tab).to(src, None).into(),
                                    Expr::Empty,
                                ],
                            )],
                        ),
                    ],
                )],
            )
        };
        for (col, source) in [
            (layout.email_col, &reg.email),
            (layout.first_name_col, &reg.first_name),
            (layout.last_name_col, &reg.last_name),
            (layout.phone_col, &reg.phone_number),
            (layout.courses_col, &reg.course),
            (layout.partner_col, &reg.partner),
            (layout.installment_col, &reg.installment),
        ] {
            let expr = join_from(source);
            self.queue_formula(sheet_id, col, row, &expr);
        }
    }

    /// Five lookup columns on the registration tab mirroring the summary's
    /// installment amounts per student, placed right after the accepted
    /// column.
    fn add_installment_columns_to_registration_tab(
        &mut self,
        layout: &SummaryLayout,
    ) -> Result<(), SheetsError> {
        let reg_title = self.settings.registration_tab_name.clone();
        let summary_tab = self.settings.summary_tab_name.clone();
        let tab_id = self
            .tab_id(&reg_title)?
            .ok_or(SheetsError::MissingTab(reg_title))?;
        let reg_login = column_index(&self.reg_cols().login);
        let accepted = column_index(&self.reg_cols().accepted);

        for slot in 0..INSTALLMENT_SLOTS {
            let col = accepted + 1 + slot;
            self.queue_text(tab_id, col, 1, &format!("Installment {}", slot + 1));
            let amount_col = layout.installment_amount_col(slot);

            for row in 2..MAX_ROWS {
                let lookup = call(
                    "ARRAYFORMULA",
                    vec![call(
                        "TEXTJOIN",
                        vec![
                            text(", "),
                            Expr::Int(1),
                            call(
                                "UNIQUE",
                                vec![call(
                                    "IF",
                                    vec![
                                        bin(
                                            cell(reg_login, row).abs_col().into(),
                                            "=",
                                            cell(1, SUMMARY_FIRST_DATA_ROW)
                                                .abs()
                                                .in_tab(&summary_tab)
                                                .to(1, None)
                                                .into(),
                                        ),
                                        cell(amount_col, SUMMARY_FIRST_DATA_ROW)
                                            .abs_row()
                                            .in_tab(&summary_tab)
                                            .to(amount_col, None)
                                            .into(),
                                        Expr::Empty,
                                    ],
                                )],
                            ),
                        ],
                    )],
                );
                self.queue_formula(tab_id, col, row, &lookup);
            }
        }
        self.flush()
    }

    /// Per-course payment tab: weekly date columns plus a roster of the
    /// accepted students, filtered by course name.
    pub(crate) fn set_up_course_tab(&mut self, course: &Course) -> Result<(), SheetsError> {
        let tab = self.ensure_tab(&course.code, 26, 1000)?;
        if !tab.created {
            return Ok(());
        }
        let reg_tab = self.settings.registration_tab_name.clone();
        let reg = self.reg_cols().clone();

        self.queue_text(tab.id, 1, 2, "Payment");
        for week in 0..10u32 {
            let col = 2 + week;
            let date = course.start + Duration::days(i64::from(week) * 7);
            self.queue_text(tab.id, col, 1, &date.format("%d.%m").to_string());
            self.buffer.set_column_width(tab.id, col, PAYMENT_COLUMN_PX);
            self.queue_text(tab.id, col, 2, &(week + 1).to_string());
        }

        // The course name parks in a hidden cell so the roster query can
        // reference it.
        self.queue_text(tab.id, 12, 1, &course.name);
        self.buffer.hide_column(tab.id, 12);

        let accepted = column_index(&reg.accepted);
        let roster = call(
            "QUERY",
            vec![
                array(vec![cell(1, 1).in_tab(&reg_tab).to(accepted, None).into()]),
                call(
                    "CONCATENATE",
                    vec![
                        text(&format!(
                            "Select Col{}, Col{}, Col{}, Col{} where Col{} is not null and LOWER(Col{}) like '%",
                            column_index(&reg.first_name),
                            column_index(&reg.last_name),
                            column_index(&reg.phone_number),
                            column_index(&reg.partner),
                            column_index(&reg.first_name),
                            column_index(&reg.course),
                        )),
                        call("LOWER", vec![cell(12, 1).into()]),
                        text(&format!("%' and Col{accepted}=1")),
                    ],
                ),
                Expr::Int(1),
            ],
        );
        self.queue_formula(tab.id, 12, 2, &roster);
        self.flush()
    }

    /// Accounting extract: the five installment (amount, date) pairs
    /// stacked into one table, filtered to the month in B1.
    pub(crate) fn set_up_accounting_tab(&mut self) -> Result<(), SheetsError> {
        let tab = self.ensure_tab("Accounting", 26, 1000)?;
        if !tab.created {
            return Ok(());
        }
        let layout = self.summary_layout();
        let summary_tab = self.settings.summary_tab_name.clone();

        self.queue_text(tab.id, 1, 1, "Month:");
        self.queue_text(
            tab.id,
            2,
            1,
            &Local::now().date_naive().format("%Y-%m-%d").to_string(),
        );
        for (col, label) in [(1, "First Name"), (2, "Last Name"), (3, "Amount"), (4, "Date")] {
            self.queue_text(tab.id, col, 2, label);
        }

        let rel = |col: u32| col - layout.email_col + 1;
        let last_needed = layout.installment_date_col(INSTALLMENT_SLOTS - 1);
        let subqueries: Vec<Expr> = (0..INSTALLMENT_SLOTS)
            .map(|slot| {
                call(
                    "QUERY",
                    vec![
                        array(vec![cell(layout.email_col, SUMMARY_FIRST_DATA_ROW)
                            .in_tab(&summary_tab)
                            .to(last_needed, None)
                            .into()]),
                        text(&format!(
                            "Select Col{}, Col{}, Col{}, Col{}",
                            rel(layout.first_name_col),
                            rel(layout.last_name_col),
                            rel(layout.installment_amount_col(slot)),
                            rel(layout.installment_date_col(slot)),
                        )),
                    ],
                )
            })
            .collect();
        let month_cell = || Expr::from(cell(2, 1));
        let filter = bin(
            bin(
                bin(
                    text("SELECT * Where Col3 is not null And MONTH(Col4)+1 = "),
                    " & ",
                    call("MONTH", vec![month_cell()]),
                ),
                " & ",
                text(" And YEAR(Col4) = "),
            ),
            " & ",
            call("YEAR", vec![month_cell()]),
        );
        let extract = call("QUERY", vec![array(subqueries), filter]);
        self.queue_formula(tab.id, 1, 3, &extract);
        self.flush()
    }

    /// Overdue report: confirmed students with no recorded payment, with a
    /// dynamic "older than N days" check left to the spreadsheet.
    pub(crate) fn set_up_overdue_tab(&mut self) -> Result<(), SheetsError> {
        let tab = self.ensure_tab("NoPayments", 26, 1000)?;
        if !tab.created {
            return Ok(());
        }
        let layout = self.summary_layout();
        let summary_tab = self.settings.summary_tab_name.clone();

        self.queue_text(
            tab.id,
            1,
            1,
            "Shows people who got a confirmation email more than 7 days ago and did not pay yet.",
        );
        self.queue_text(tab.id, 5, 1, "Today");
        self.queue_formula(tab.id, 6, 1, &Expr::Int(7));
        for (col, label) in [
            (1, "Email"),
            (2, "First Name"),
            (3, "Last Name"),
            (4, "Confirmation Sent"),
            (5, "Confirmation Date"),
        ] {
            self.queue_text(tab.id, col, 2, label);
        }
        let older_header = bin(
            bin(text("Older than "), " & ", cell(6, 1).into()),
            " & ",
            text(" days"),
        );
        self.queue_formula(tab.id, 6, 2, &older_header);

        let rel = |col: u32| col - layout.email_col + 1;
        let confirmation_col = layout.marker_col(EmailType::Confirmation);
        let inner = call(
            "QUERY",
            vec![
                array(vec![cell(layout.email_col, SUMMARY_FIRST_DATA_ROW)
                    .in_tab(&summary_tab)
                    .to(confirmation_col, None)
                    .into()]),
                text(&format!(
                    "Select Col{}, Col{}, Col{}, Col{}, Col{}, Col{}, Col{}, Col{}",
                    rel(layout.email_col),
                    rel(layout.first_name_col),
                    rel(layout.last_name_col),
                    rel(layout.installment_date_col(0)),
                    rel(layout.installment_date_col(1)),
                    rel(layout.installment_date_col(2)),
                    rel(layout.installment_date_col(3)),
                    rel(confirmation_col),
                )),
            ],
        );
        let report = call(
            "QUERY",
            vec![
                array(vec![inner]),
                text(
                    "SELECT Col1, Col2, Col3, Col8 Where Col1 is not null And Col4 is null And Col5 is null And Col6 is null And Col7 is null And Col8 is not null",
                ),
            ],
        );
        self.queue_formula(tab.id, 1, 3, &report);

        for row in 3..MAX_ROWS {
            let date_part = call("LEFT", vec![cell(4, row).into(), Expr::Int(10)]);
            self.queue_formula(tab.id, 5, row, &date_part);
            let overdue = call(
                "IF",
                vec![
                    call(
                        "AND",
                        vec![
                            bin(cell(5, row).into(), "<>", text("")),
                            bin(
                                bin(call("TODAY", vec![]), " - ", cell(5, row).into()),
                                " > ",
                                cell(6, 1).abs().into(),
                            ),
                        ],
                    ),
                    Expr::Int(1),
                    text(" "),
                ],
            );
            self.queue_formula(tab.id, 6, row, &overdue);
        }
        self.flush()
    }

    /// Group balance: per-course/role counts over the registration tab,
    /// grouped into registration/accepted/paid blocks.
    pub(crate) fn set_up_group_balance_tab(&mut self) -> Result<(), SheetsError> {
        let title = self.settings.group_balance_tab_name.clone();
        let course_count = self.event.courses.len() as u32;
        let row_count = 5 + course_count;
        let tab = self.ensure_tab(&title, 20, row_count)?;
        if !tab.created {
            return Ok(());
        }
        let reg_tab = self.settings.registration_tab_name.clone();
        let reg = self.reg_cols().clone();
        let course_col = column_index(&reg.course);
        let role_col = column_index(&reg.role);
        let accepted_col = column_index(&reg.accepted);
        let first_installment_col = accepted_col + 1;

        self.queue_text(tab.id, 1, 4, "Groups");
        let groups = call(
            "SORT",
            vec![call(
                "UNIQUE",
                vec![cell(course_col, 2).in_tab(&reg_tab).to(course_col, None).into()],
            )],
        );
        self.queue_formula(tab.id, 1, 5, &groups);

        let leader = self.settings.leader_text.clone();
        let follower = self.settings.follower_text.clone();
        let solo = self.settings.solo_text.clone();
        self.queue_text(tab.id, 2, 1, &leader);
        self.queue_text(tab.id, 3, 1, &follower);
        self.queue_text(tab.id, 4, 1, &solo);

        for (col, label) in [
            (2, "ALL REGISTRATIONS"),
            (6, "ACCEPTED"),
            (10, "NOT PAID"),
            (14, "PAID"),
        ] {
            self.queue_text(tab.id, col, 2, label);
            self.queue_group_balance_block_header(tab.id, col);
        }
        self.queue_text(tab.id, 18, 2, "MISSING");
        for col in [18, 19] {
            let sum = call("SUM", vec![cell(col, 5).to(col, None).into()]);
            self.queue_formula(tab.id, col, 3, &sum);
        }
        self.flush()?;

        let count_over = |role_criterion_col: u32, row: u32, extra: Option<(u32, Expr)>| {
            let mut args = vec![
                Expr::from(cell(course_col, 2).abs().in_tab(&reg_tab).to(course_col, None)),
                cell(1, row).abs_col().into(),
                cell(role_col, 2).abs().in_tab(&reg_tab).to(role_col, None).into(),
                cell(role_criterion_col, 1).abs().into(),
            ];
            match extra {
                None => {
                    args.push(
                        cell(accepted_col, 2)
                            .abs()
                            .in_tab(&reg_tab)
                            .to(accepted_col, None)
                            .into(),
                    );
                    args.push(text("<>'X'"));
                }
                Some((criterion_col, criterion)) => {
                    args.push(
                        cell(accepted_col, 2)
                            .abs()
                            .in_tab(&reg_tab)
                            .to(accepted_col, None)
                            .into(),
                    );
                    args.push(Expr::Int(1));
                    if criterion_col > 0 {
                        args.push(
                            cell(criterion_col, 2)
                                .abs()
                                .in_tab(&reg_tab)
                                .to(criterion_col, None)
                                .into(),
                        );
                        args.push(criterion);
                    }
                }
            }
            call("COUNTIFS", args)
        };

        for group in 0..=course_count {
            let row = group + 5;
            // ALL REGISTRATIONS: everything not crossed out.
            for (offset, role_header) in [(0u32, 2u32), (1, 3), (2, 4)] {
                let expr = count_over(role_header, row, None);
                self.queue_formula(tab.id, 2 + offset, row, &expr);
            }
            let sum_all = call("SUM", vec![cell(2, row).to(4, row).into()]);
            self.queue_formula(tab.id, 5, row, &sum_all);

            // ACCEPTED
            for (offset, role_header) in [(0u32, 2u32), (1, 3), (2, 4)] {
                let expr = count_over(role_header, row, Some((0, Expr::Empty)));
                self.queue_formula(tab.id, 6 + offset, row, &expr);
            }
            let sum_accepted = call("SUM", vec![cell(6, row).to(8, row).into()]);
            self.queue_formula(tab.id, 9, row, &sum_accepted);

            // NOT PAID: accepted with an empty first installment.
            for (offset, role_header) in [(0u32, 2u32), (1, 3), (2, 4)] {
                let expr = count_over(role_header, row, Some((first_installment_col, text(""))));
                self.queue_formula(tab.id, 10 + offset, row, &expr);
            }
            let sum_unpaid = call("SUM", vec![cell(10, row).to(12, row).into()]);
            self.queue_formula(tab.id, 13, row, &sum_unpaid);

            // PAID = accepted - not paid
            for offset in 0..3u32 {
                let paid = bin(
                    cell(6 + offset, row).into(),
                    "-",
                    cell(10 + offset, row).into(),
                );
                self.queue_formula(tab.id, 14 + offset, row, &paid);
            }
            let sum_paid = call("SUM", vec![cell(14, row).to(16, row).into()]);
            self.queue_formula(tab.id, 17, row, &sum_paid);

            // MISSING: the leader/follower imbalance, whichever direction.
            let missing_leads = call(
                "IF",
                vec![
                    bin(cell(2, row).into(), "<", cell(3, row).into()),
                    bin(cell(3, row).into(), "-", cell(2, row).into()),
                    text(" "),
                ],
            );
            self.queue_formula(tab.id, 18, row, &missing_leads);
            let missing_follows = call(
                "IF",
                vec![
                    bin(cell(3, row).into(), "<", cell(2, row).into()),
                    bin(cell(2, row).into(), "-", cell(3, row).into()),
                    text(" "),
                ],
            );
            self.queue_formula(tab.id, 19, row, &missing_follows);
        }

        self.queue_group_balance_formatting(tab.id, row_count);
        self.flush()
    }

    fn queue_group_balance_block_header(&mut self, sheet_id: i64, start_col: u32) {
        for (offset, label) in ["Lead", "Follow", "Solo", "Sum"].iter().enumerate() {
            let col = start_col + offset as u32;
            let sum = call("SUM", vec![cell(col, 5).to(col, None).into()]);
            self.queue_formula(sheet_id, col, 3, &sum);
            self.queue_text(sheet_id, col, 4, label);
        }
    }

    fn queue_group_balance_formatting(&mut self, sheet_id: i64, row_count: u32) {
        use super::client::GridRange;
        use super::formats::bold_center_wrap_header;

        // Merge the category header blocks.
        for (from, to) in [(2, 5), (6, 9), (10, 13), (14, 17), (18, 19)] {
            self.buffer.merge_cells(sheet_id, 2, from, to);
        }

        // Bold + wrap + center the header rows.
        self.buffer.add_range_format(
            sheet_id,
            GridRange {
                sheet_id,
                start_row_index: Some(1),
                end_row_index: Some(4),
                ..Default::default()
            },
            &bold_center_wrap_header(),
        );

        // Rule under the category row and under the totals row.
        self.buffer.border_under_row(sheet_id, 2, 19);
        self.buffer.border_under_row(sheet_id, 4, 19);

        // Vertical separators between blocks.
        for col in [1, 5, 9, 13, 17] {
            self.buffer.border_right_of_column(sheet_id, col, 3, row_count);
        }

        self.buffer.set_column_span_width(sheet_id, 2, 19, NARROW_COLUMN_PX);
    }
}

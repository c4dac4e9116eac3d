//! Statement summary block extraction (opening/closing balances and totals)

use tally_core::{StatementSummary, amount::find_amounts, date::leading_date};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Opening,
    Closing,
    Deposits,
    Withdrawals,
}

/// Label phrases (lowercase) and the summary field they declare.
const LABELS: &[(&str, Field)] = &[
    ("opening balance", Field::Opening),
    ("beginning balance", Field::Opening),
    ("balance brought forward", Field::Opening),
    ("balance b/f", Field::Opening),
    ("previous balance", Field::Opening),
    ("closing balance", Field::Closing),
    ("ending balance", Field::Closing),
    ("balance carried forward", Field::Closing),
    ("balance c/f", Field::Closing),
    ("total deposits", Field::Deposits),
    ("total credits", Field::Deposits),
    ("payments in", Field::Deposits),
    ("total withdrawals", Field::Withdrawals),
    ("total debits", Field::Withdrawals),
    ("payments out", Field::Withdrawals),
];

fn label_in(lower: &str) -> Option<(usize, &'static str, Field)> {
    LABELS
        .iter()
        .find_map(|(label, field)| lower.find(label).map(|pos| (pos, *label, *field)))
}

/// True if `line` declares a summary figure rather than a transaction.
pub fn is_summary_line(line: &str) -> bool {
    label_in(&line.to_lowercase()).is_some()
}

/// First amount printed after the label, or on the following line when the
/// label stands alone.
fn labelled_amount(lines: &[&str], i: usize, after: usize) -> Option<f64> {
    let line = lines[i];
    if let Some(token) = find_amounts(line).into_iter().find(|t| t.start >= after) {
        return Some(token.value);
    }
    let next = lines.get(i + 1)?;
    if leading_date(next).is_some() || is_summary_line(next) {
        return None;
    }
    find_amounts(next).first().map(|t| t.value)
}

/// Scan every line for summary labels.
///
/// Opening figures keep their first occurrence and closing figures their
/// last, since multi-page statements repeat brought/carried-forward lines.
pub fn extract_summary(lines: &[&str]) -> StatementSummary {
    let mut summary = StatementSummary::default();
    for i in 0..lines.len() {
        let lower = lines[i].to_lowercase();
        let Some((pos, label, field)) = label_in(&lower) else {
            continue;
        };
        let Some(value) = labelled_amount(lines, i, pos + label.len()) else {
            continue;
        };
        match field {
            Field::Opening => {
                summary.opening_balance.get_or_insert(value);
            }
            Field::Closing => summary.closing_balance = Some(value),
            Field::Deposits => {
                summary.total_deposits.get_or_insert(value);
            }
            Field::Withdrawals => {
                summary.total_withdrawals.get_or_insert(value);
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_line_figures() {
        let lines = vec![
            "Opening balance 1,000.00",
            "Total deposits 200.00",
            "Total withdrawals 45.00",
            "Closing balance 1,155.00",
        ];
        let s = extract_summary(&lines);
        assert_eq!(s.opening_balance, Some(1000.0));
        assert_eq!(s.total_deposits, Some(200.0));
        assert_eq!(s.total_withdrawals, Some(45.0));
        assert_eq!(s.closing_balance, Some(1155.0));
    }

    #[test]
    fn test_next_line_figures() {
        let lines = vec!["Opening Balance", "£1,234.56", "Payments In", "300.00"];
        let s = extract_summary(&lines);
        assert_eq!(s.opening_balance, Some(1234.56));
        assert_eq!(s.total_deposits, Some(300.0));
    }

    #[test]
    fn test_brought_and_carried_forward_pages() {
        let lines = vec![
            "01 Jun BALANCE BROUGHT FORWARD 500.00",
            "03 Jun BP Uber 28.90 471.10",
            "BALANCE CARRIED FORWARD 471.10",
            "BALANCE BROUGHT FORWARD 471.10",
            "09 Jun BP Costa Coffee 7.00 464.10",
            "BALANCE CARRIED FORWARD 464.10",
        ];
        let s = extract_summary(&lines);
        assert_eq!(s.opening_balance, Some(500.0));
        assert_eq!(s.closing_balance, Some(464.10));
    }

    #[test]
    fn test_label_without_amount_does_not_steal_row() {
        let lines = vec!["Closing balance", "15 Jun Coffee 3.50 96.50"];
        let s = extract_summary(&lines);
        assert_eq!(s.closing_balance, None);
    }
}

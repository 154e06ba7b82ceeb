//! Property tests for pipeline invariants.
//!
//! Uses proptest to verify:
//! 1. Normalized output has unique (date, symbol) pairs, sorted, with finite closes
//! 2. Matrix then flatten reproduces the records
//! 3. Rebasing a rebased matrix changes nothing
//! 4. Levels rebuilt from daily returns and the first value match the series
//! 5. Cumulative returns agree with last / first - 1 on gap-free columns

use chrono::{Duration, NaiveDate};
use pricedash_core::data::{normalize, RawCell, RawFrame};
use pricedash_core::domain::{Cell, PriceField, PriceMatrix, Query};
use pricedash_core::transform::returns::{column_daily_returns, column_rebased};
use pricedash_core::transform::{cumulative_returns, rebase_to_100, to_matrix};
use proptest::prelude::*;

const SYMBOLS: [&str; 3] = ["AAPL", "MSFT", "SPY"];

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn close_enough(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (1.0..1000.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_cell() -> impl Strategy<Value = Cell> {
    prop_oneof![1 => Just(None), 4 => arb_price().prop_map(Some)]
}

fn arb_column() -> impl Strategy<Value = Vec<Cell>> {
    prop::collection::vec(arb_cell(), 1..40)
}

/// A paired raw frame over up to 3 symbols, with gaps and repeated dates.
fn arb_frame() -> impl Strategy<Value = RawFrame> {
    (1usize..25, 1usize..=3).prop_flat_map(|(rows, n_symbols)| {
        (
            prop::collection::vec(0i64..10, rows),
            prop::collection::vec(prop::collection::vec(arb_cell(), rows), n_symbols),
        )
            .prop_map(|(offsets, columns)| {
                let index = offsets
                    .iter()
                    .map(|o| (base_date() + Duration::days(*o)).format("%Y-%m-%d").to_string())
                    .collect();
                let mut frame = RawFrame::new(index);
                for (symbol, cells) in SYMBOLS.iter().zip(columns) {
                    let cells: Vec<RawCell> = cells.into_iter().map(RawCell::from).collect();
                    frame = frame.with_pair(symbol, "Close", cells);
                }
                frame
            })
    })
}

fn query_all() -> Query {
    Query::parse(&SYMBOLS.join(","), base_date(), base_date() + Duration::days(30)).unwrap()
}

// ── 1. Normalizer invariants ─────────────────────────────────────────

proptest! {
    #[test]
    fn normalized_records_are_unique_sorted_and_complete(frame in arb_frame()) {
        let out = normalize(&frame, &query_all()).unwrap();
        for pair in out.records.windows(2) {
            let a = (pair[0].date, &pair[0].symbol);
            let b = (pair[1].date, &pair[1].symbol);
            prop_assert!(a < b, "records not strictly ordered: {:?} then {:?}", a, b);
        }
        for record in &out.records {
            prop_assert!(record.close.is_finite());
        }
        for missing in &out.missing_symbols {
            prop_assert!(out.records.iter().all(|r| &r.symbol != missing));
        }
    }

    // ── 2. Matrix round-trip ─────────────────────────────────────────

    #[test]
    fn matrix_flattens_back_to_records(frame in arb_frame()) {
        let out = normalize(&frame, &query_all()).unwrap();
        let matrix = to_matrix(&out.records, "close").unwrap();
        let expected: Vec<_> = out
            .records
            .iter()
            .map(|r| (r.date, r.symbol.clone(), r.close))
            .collect();
        prop_assert_eq!(matrix.to_long(), expected);
    }

    // ── 3. Rebase idempotence ────────────────────────────────────────

    #[test]
    fn rebasing_twice_equals_rebasing_once(column in arb_column()) {
        let once = column_rebased(&column);
        let twice = column_rebased(&once);
        prop_assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(&twice) {
            match (a, b) {
                (Some(a), Some(b)) => prop_assert!(close_enough(*a, *b), "{} vs {}", a, b),
                (None, None) => {}
                _ => prop_assert!(false, "presence changed: {:?} vs {:?}", a, b),
            }
        }
    }

    // ── 4. Returns reconstruction ────────────────────────────────────

    #[test]
    fn levels_rebuild_from_daily_returns(column in prop::collection::vec(arb_price(), 1..60)) {
        let cells: Vec<Cell> = column.iter().copied().map(Some).collect();
        let returns = column_daily_returns(&cells);
        prop_assert!(returns[0].is_none());

        let mut level = column[0];
        for (t, r) in returns.iter().enumerate().skip(1) {
            level *= 1.0 + r.unwrap();
            prop_assert!(close_enough(level, column[t]), "t={}: {} vs {}", t, level, column[t]);
        }
    }

    // ── 5. Cumulative vs total ───────────────────────────────────────

    #[test]
    fn cumulative_return_ends_at_total_return(column in prop::collection::vec(arb_price(), 2..60)) {
        let dates: Vec<NaiveDate> = (0..column.len())
            .map(|i| base_date() + Duration::days(i as i64))
            .collect();
        let values = column.iter().map(|v| vec![Some(*v)]).collect();
        let matrix = PriceMatrix::from_parts(
            PriceField::Close,
            dates,
            vec![pricedash_core::Symbol::new("SPY").unwrap()],
            values,
        )
        .unwrap();

        let cum = cumulative_returns(&matrix);
        let last = cum.get(column.len() - 1, 0).unwrap();
        let total = column[column.len() - 1] / column[0] - 1.0;
        prop_assert!(close_enough(last, total), "{} vs {}", last, total);

        let rebased = rebase_to_100(&matrix);
        prop_assert!(close_enough(rebased.get(0, 0).unwrap(), 100.0));
    }
}

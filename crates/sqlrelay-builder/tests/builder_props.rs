//! Placeholder/argument invariants over randomly composed SELECT builders.
//!
//! For every builder and dialect the emitted SQL must contain exactly as
//! many placeholders as bound arguments, and for numbered dialects the
//! indices must read 1, 2, … in textual order.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sqlrelay_builder::{Builder, SelectBuilder};
use sqlrelay_core::Dialect;

const DIALECTS: [Dialect; 6] = [
    Dialect::MySQL,
    Dialect::PostgreSQL,
    Dialect::SQLite,
    Dialect::MsSQL,
    Dialect::ClickHouse,
    Dialect::Doris,
];

/// Count placeholders in `sql` for `dialect` and, for numbered styles,
/// assert the sequence is 1..=n in textual order.
fn count_placeholders(dialect: Dialect, sql: &str) -> usize {
    match dialect {
        Dialect::PostgreSQL => numbered(sql, "$"),
        Dialect::MsSQL => numbered(sql, "@p"),
        _ => sql.matches('?').count(),
    }
}

fn numbered(sql: &str, prefix: &str) -> usize {
    let mut indices = Vec::new();
    let mut rest = sql;
    while let Some(pos) = rest.find(prefix) {
        rest = &rest[pos + prefix.len()..];
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() {
            indices.push(digits.parse::<usize>().unwrap());
        }
    }
    let expected: Vec<usize> = (1..=indices.len()).collect();
    assert_eq!(indices, expected, "placeholder numbering out of order in {sql}");
    indices.len()
}

fn random_select(rng: &mut StdRng, dialect: Dialect) -> SelectBuilder {
    let mut sb = SelectBuilder::query("user");
    sb.set_dialect(dialect);

    for i in 0..rng.gen_range(0..4) {
        let field = format!("col{}", i);
        let expr = match rng.gen_range(0..5) {
            0 => sb.cond.eq(&field, rng.gen_range(0..100)),
            1 => sb.cond.ge(&field, rng.gen_range(0..100)),
            2 => sb.cond.is_in(&field, (0..rng.gen_range(1..4)).collect::<Vec<i64>>()),
            3 => sb.cond.between(&field, 1, rng.gen_range(2..50)),
            _ => sb.cond.like(&field, "x%"),
        };
        sb.and_where(expr);
    }

    if rng.gen_bool(0.4) {
        sb.group_by("col0");
        let having = sb.cond.ge("col0", 1);
        sb.having(having);
    }
    if rng.gen_bool(0.5) {
        sb.order_by(["id"]);
        if rng.gen_bool(0.5) {
            sb.desc();
        }
    }
    if rng.gen_bool(0.5) {
        sb.limit(rng.gen_range(1..50));
        if rng.gen_bool(0.5) {
            sb.offset(rng.gen_range(1..50));
        }
    }
    if rng.gen_bool(0.3) {
        sb.distinct();
    }
    sb
}

#[test]
fn placeholder_count_matches_argument_count() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for round in 0..250 {
        let dialect = DIALECTS[round % DIALECTS.len()];
        let sb = random_select(&mut rng, dialect);
        let (sql, values) = sb.build().expect("random select must build");
        assert_eq!(
            count_placeholders(dialect, &sql),
            values.len(),
            "dialect {dialect}: {sql}"
        );
    }
}

#[test]
fn nested_builders_keep_the_invariant() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..50 {
        let inner = random_select(&mut rng, Dialect::PostgreSQL);
        let mut outer = SelectBuilder::query("outer_table");
        outer.set_dialect(Dialect::PostgreSQL);
        let eq = outer.cond.eq("kind", 3);
        let in_expr = outer.cond.is_in("id", [inner]);
        outer.and_where(eq).and_where(in_expr);

        let (sql, values) = outer.build().expect("nested select must build");
        assert_eq!(count_placeholders(Dialect::PostgreSQL, &sql), values.len());
    }
}

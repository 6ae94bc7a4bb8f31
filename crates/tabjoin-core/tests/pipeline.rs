use pretty_assertions::assert_eq;

use tabjoin_core::{
    export, merge, parse, project, row, serialize, CellValue, Coercion, Format, Session,
    SessionState, Slot, Table, DEFAULT_JOIN_KEY,
};

fn base() -> Table {
    Table::from_rows(vec![
        row! { "chassin" => "A1", "color" => "red" },
        row! { "chassin" => "A2", "color" => "blue" },
    ])
}

fn enrich() -> Table {
    Table::from_rows(vec![
        row! { "chassin" => "A2", "owner" => "X" },
        row! { "chassin" => "A3", "owner" => "Y" },
    ])
}

#[test]
fn merge_example_adds_color_only_to_matched_rows() {
    let result = merge(&base(), &enrich(), DEFAULT_JOIN_KEY, &["color"]);

    assert_eq!(
        result,
        Table::from_rows(vec![
            row! { "chassin" => "A2", "owner" => "X", "color" => "blue" },
            row! { "chassin" => "A3", "owner" => "Y" },
        ])
    );
}

#[test]
fn hiding_owner_and_exporting_csv() {
    let combined = merge(&base(), &enrich(), DEFAULT_JOIN_KEY, &["color"]);
    let export = export(&combined, &["owner"], Format::Csv).expect("export succeeds");
    let text = String::from_utf8(export.bytes).expect("utf-8 output");
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines, vec!["chassin,color", "A2,blue", "A3,"]);
}

#[test]
fn csv_round_trip_is_text_typed() {
    let table = Table::from_rows(vec![
        row! { "chassin" => "A1", "km" => 1200i64, "sold" => true, "note" => "a,b" },
        row! { "chassin" => "A2", "km" => 3.5, "sold" => false, "note" => "" },
    ]);
    let bytes = serialize(&table, Format::Csv).expect("serialize");

    let as_text = parse(&bytes, "rt.csv", Coercion::Text).expect("parse");
    assert_eq!(
        as_text.rows[0],
        row! { "chassin" => "A1", "km" => "1200", "sold" => "true", "note" => "a,b" }
    );
    assert_eq!(as_text.rows[1].get("note"), Some(&CellValue::Empty));

    let inferred = parse(&bytes, "rt.csv", Coercion::Infer).expect("parse");
    assert_eq!(inferred, table);
}

#[test]
fn spreadsheet_round_trip_keeps_first_row_columns() {
    let table = Table::from_rows(vec![
        row! { "chassin" => "A1", "km" => 1200i64, "sold" => true },
        row! { "chassin" => "A2", "km" => 3.5, "sold" => false, "late" => "z" },
    ]);
    let bytes = serialize(&table, Format::Spreadsheet).expect("serialize");
    let parsed = parse(&bytes, "combined_data.xlsx", Coercion::Text).expect("parse");

    assert_eq!(parsed, table);
    assert_eq!(parsed.columns(), vec!["chassin", "km", "sold"]);
}

#[test]
fn join_cardinality_equals_enrich_rows() {
    let enrich = Table::from_rows(vec![
        row! { "chassin" => "A1" },
        row! { "chassin" => "A1" },
        row! { "owner" => "no key" },
        row! { "chassin" => "Q" },
    ]);
    for columns in [vec![], vec!["color"], vec!["color", "chassin"]] {
        let result = merge(&base(), &enrich, DEFAULT_JOIN_KEY, &columns);
        assert_eq!(result.row_count(), enrich.row_count());
    }
}

#[test]
fn idempotent_hiding() {
    let combined = merge(&base(), &enrich(), DEFAULT_JOIN_KEY, &["color"]);
    let stepwise = project(&project(&combined, &["owner"]), &["color", "owner"]);
    let union = project(&combined, &["owner", "color"]);

    assert_eq!(stepwise, union);
}

#[test]
fn session_end_to_end_with_spreadsheet_input() {
    let base_bytes = serialize(&base(), Format::Spreadsheet).expect("serialize base");
    let enrich_csv = b"chassin,owner\nA2,X\nA3,Y\n".to_vec();

    let mut session = Session::new();
    session.load_file(Slot::Base, "vehicles.xlsx", base_bytes);
    session.load_file(Slot::Enrich, "owners.csv", enrich_csv);
    session.process().expect("both files parse");

    assert_eq!(session.base_columns(), vec!["chassin", "color"]);
    session.select_column("color").expect("known column");
    session.combine().expect("combine");
    session.hide_column("owner").expect("known column");

    let export = session.export(Format::Spreadsheet).expect("export");
    assert_eq!(export.file_name, "combined_data.xlsx");
    assert_eq!(session.state(), SessionState::Exported);

    let reread = parse(&export.bytes, &export.file_name, Coercion::Text).expect("reparse");
    assert_eq!(
        reread,
        Table::from_rows(vec![
            row! { "chassin" => "A2", "color" => "blue" },
            row! { "chassin" => "A3" },
        ])
    );
}

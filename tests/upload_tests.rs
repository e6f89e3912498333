use std::io::Write;

use csv_table_loader::db::{Database, DuckDbDatabase, TableLoader};
use csv_table_loader::ingest::{quote_identifier, ColumnSchema, IngestError, StorageType};
use tempfile::NamedTempFile;

const SMALL: &str = ",id,text,int,float,bool,datetime\n\
    0,id1,hello,1,1.5,True,Jan 1 1970\n\
    1,id2,world,2,2.5,False,Jan 24 1984\n\
    2,id3,goodbye,3,3.5,True,Sep 14 2022\n";

fn write_csv(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(".csv").unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn loader() -> TableLoader<DuckDbDatabase> {
    TableLoader::new(DuckDbDatabase::open_in_memory().unwrap())
}

type SmallRow = (String, String, i64, f64, bool, String);

fn read_small(loader: &TableLoader<DuckDbDatabase>, table: &str) -> Vec<SmallRow> {
    let sql = format!(
        "SELECT \"id\", \"text\", \"int\", \"float\", \"bool\", CAST(\"datetime\" AS VARCHAR) \
         FROM {} ORDER BY \"id\"",
        quote_identifier(table)
    );
    let conn = loader.database().connection();
    let mut stmt = conn.prepare(&sql).unwrap();
    stmt.query_map([], |row| {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    })
    .unwrap()
    .collect::<Result<Vec<_>, _>>()
    .unwrap()
}

#[test]
fn test_upload_small_round_trips() {
    let file = write_csv(SMALL);
    let mut loader = loader();
    let summary = loader
        .upload(file.path(), "mock_table_small", Some("id"), &["datetime".to_string()])
        .unwrap();

    assert_eq!(
        summary.statement,
        "DROP TABLE IF EXISTS \"mock_table_small\"; CREATE TABLE \"mock_table_small\" (\
         \"id\" VARCHAR PRIMARY KEY, \"text\" VARCHAR, \"int\" BIGINT, \
         \"float\" DOUBLE PRECISION, \"bool\" BOOLEAN, \"datetime\" DATE);"
    );
    assert_eq!(summary.rows_loaded, 3);

    assert_eq!(
        read_small(&loader, "mock_table_small"),
        vec![
            ("id1".into(), "hello".into(), 1, 1.5, true, "1970-01-01".into()),
            ("id2".into(), "world".into(), 2, 2.5, false, "1984-01-24".into()),
            ("id3".into(), "goodbye".into(), 3, 3.5, true, "2022-09-14".into()),
        ]
    );
}

#[test]
fn test_upload_without_index_column_generates_one() {
    let file = write_csv(SMALL);
    let mut loader = loader();
    let summary = loader
        .upload(file.path(), "numbered", None, &["datetime".to_string()])
        .unwrap();
    assert_eq!(summary.columns[0], ColumnSchema::new("index", StorageType::BigInt));
    assert_eq!(summary.columns.len(), 7);

    let conn = loader.database().connection();
    let mut stmt = conn
        .prepare("SELECT \"index\", id FROM numbered ORDER BY \"index\"")
        .unwrap();
    let rows: Vec<(i64, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        rows,
        vec![(0, "id1".into()), (1, "id2".into()), (2, "id3".into())]
    );
}

#[test]
fn test_upload_replaces_existing_table() {
    let file = write_csv(SMALL);
    let mut loader = loader();
    loader
        .upload(file.path(), "again", Some("id"), &["datetime".to_string()])
        .unwrap();
    let summary = loader
        .upload(file.path(), "again", Some("id"), &["datetime".to_string()])
        .unwrap();
    assert_eq!(summary.rows_loaded, 3);
}

#[test]
fn test_identifiers_with_quotes_spaces_and_keywords() {
    let file = write_csv("select,my col,\"say \"\"hi\"\"\"\n1,a,b\n2,c,d\n");
    let mut loader = loader();
    let table = "weird \"table\" name";
    let summary = loader.upload(file.path(), table, Some("select"), &[]).unwrap();

    let names: Vec<&str> = summary.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["select", "my col", "say \"hi\""]);

    let sql = format!(
        "SELECT {}, {}, {} FROM {} ORDER BY 1",
        quote_identifier("select"),
        quote_identifier("my col"),
        quote_identifier("say \"hi\""),
        quote_identifier(table)
    );
    let conn = loader.database().connection();
    let mut stmt = conn.prepare(&sql).unwrap();
    let rows: Vec<(i64, String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        rows,
        vec![(1, "a".into(), "b".into()), (2, "c".into(), "d".into())]
    );
}

#[test]
fn test_quoted_fields_survive_the_load() {
    let file = write_csv(
        "id,note\n\
         a,\"comma, inside\"\n\
         b,\"two\nlines\"\n\
         c,\"quote \"\"here\"\"\"\n\
         d,\n",
    );
    let mut loader = loader();
    loader.upload(file.path(), "notes", Some("id"), &[]).unwrap();

    let conn = loader.database().connection();
    let mut stmt = conn.prepare("SELECT note FROM notes ORDER BY id").unwrap();
    let notes: Vec<Option<String>> = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        notes,
        vec![
            Some("comma, inside".to_string()),
            Some("two\nlines".to_string()),
            Some("quote \"here\"".to_string()),
            None,
        ]
    );
}

#[test]
fn test_large_field_round_trips() {
    let big = "helloworld".repeat(1000);
    let content = format!(",id,bigtext\n0,id1,{big}\n1,id2,{big}\n2,id3,{big}\n");
    let file = write_csv(&content);
    let mut loader = loader();
    let summary = loader
        .upload(file.path(), "mock_table_very_large", None, &[])
        .unwrap();
    assert_eq!(summary.rows_loaded, 3);

    let conn = loader.database().connection();
    let mut stmt = conn
        .prepare("SELECT bigtext FROM mock_table_very_large ORDER BY \"index\"")
        .unwrap();
    let values: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(values.len(), 3);
    assert!(values.iter().all(|v| *v == big));
}

#[test]
fn test_multi_megabyte_field_round_trips() {
    let big = "x".repeat(3 << 20);
    let file = write_csv(&format!("id,big\na,{big}\nb,small\n"));
    let mut loader = loader();
    let summary = loader
        .upload(file.path(), "wide_rows", Some("id"), &[])
        .unwrap();
    assert_eq!(summary.rows_loaded, 2);

    let stored: String = loader
        .database()
        .connection()
        .query_row("SELECT big FROM wide_rows WHERE id = 'a'", [], |row| row.get(0))
        .unwrap();
    assert_eq!(stored.len(), big.len());
    assert!(stored == big);
}

#[test]
fn test_duplicate_keys_fail_without_commit() {
    let file = write_csv("id,v\na,1\na,2\n");
    let mut loader = loader();
    let err = loader.upload(file.path(), "dupes", Some("id"), &[]).unwrap_err();
    assert!(matches!(err, IngestError::DatabaseError(_)));
    assert!(loader.database().in_transaction());

    loader.database_mut().rollback().unwrap();
    assert!(loader.verify_upload("dupes").is_err());
}

#[test]
fn test_upload_into_schema() {
    let file = write_csv("code,qty\nx,1\ny,2\n");
    let mut loader = loader().with_schema(Some("staging".to_string()));
    let summary = loader.upload(file.path(), "stock", Some("code"), &[]).unwrap();
    assert!(summary.statement.starts_with("CREATE SCHEMA IF NOT EXISTS \"staging\";"));
    assert_eq!(loader.verify_upload("stock").unwrap(), 2);

    let total: i64 = loader
        .database()
        .connection()
        .query_row("SELECT CAST(SUM(qty) AS BIGINT) FROM staging.stock", [], |row| row.get(0))
        .unwrap();
    assert_eq!(total, 3);
}

#[test]
fn test_missing_index_column_issues_nothing() {
    let file = write_csv("a,b\n1,2\n");
    let mut loader = loader();
    let err = loader.upload(file.path(), "t", Some("c"), &[]).unwrap_err();
    assert!(matches!(err, IngestError::MissingColumn(_)));
    assert!(!loader.database().in_transaction());
}

use std::fs::File;
use std::sync::Arc;

use serde::Deserialize;
use simplelog::{Config, LevelFilter, WriteLogger};
use tablekit::plugins::{FILTERED_ROWS, Filter, PAGE, Pagination, RowSelection, SELECTED, TOTAL_PAGES};
use tablekit::prelude::*;

const SAMPLE: &str = r#"[
    {"id": 1, "name": "Ada Lovelace", "language": "Analytical Engine", "year": 1843},
    {"id": 2, "name": "Grace Hopper", "language": "COBOL", "year": 1959},
    {"id": 3, "name": "John Backus", "language": "Fortran", "year": 1957},
    {"id": 4, "name": "Niklaus Wirth", "language": "Pascal", "year": 1970},
    {"id": 5, "name": "Barbara Liskov", "language": "CLU", "year": 1974},
    {"id": 6, "name": "Dennis Ritchie", "language": "C", "year": 1972},
    {"id": 7, "name": "Bjarne Stroustrup", "language": "C++", "year": 1985},
    {"id": 8, "name": "Graydon Hoare", "language": "Rust", "year": 2010}
]"#;

#[derive(Debug, Clone, Deserialize)]
struct Designer {
    id: u32,
    name: String,
    language: String,
    year: u32,
}

fn print_table(table: &Table<Designer>) {
    for row in table.head() {
        let labels: Vec<String> = row.cells.iter().map(|c| c.value.to_string()).collect();
        println!("   {}", labels.join(" | "));
    }
    for row in table.custom_body() {
        let mark = if row.get(SELECTED).unwrap_or(false) { "*" } else { " " };
        let values: Vec<String> = row.cells.iter().map(|c| c.value.to_string()).collect();
        println!("{mark}  {}", values.join(" | "));
    }
    let extensions = table.extensions();
    println!(
        "   page {}/{} ({} matching)\n",
        extensions.get_or_default(PAGE),
        extensions.get_or_default(TOTAL_PAGES),
        extensions.get_or_default(FILTERED_ROWS),
    );
}

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("invalid sample data: {0}")]
    Sample(#[from] serde_json::Error),
    #[error(transparent)]
    Table(#[from] TableError),
}

async fn run() -> Result<(), DemoError> {
    let data: Vec<Designer> = serde_json::from_str(SAMPLE)?;

    let selection = Arc::new(RowSelection::new());
    let since = Arc::new(Filter::new(0u32, |d: &Designer, year: &u32, _row: &Row| d.year >= *year));
    let pagination = Arc::new(Pagination::new(3));

    let table = Table::new(
        TableOptions::new()
            .label("designers")
            .data(data)
            .get_id(|d: &Designer| d.id.to_string())
            .column(Column::map(|d: &Designer| d.name.clone()).head_text("Name"))
            .column(Column::map(|d: &Designer| d.language.clone()).head_text("Language"))
            .column(Column::map(|d: &Designer| d.year).head_text("Year"))
            .plugin(selection.clone())
            .plugin(since.clone())
            .plugin(pagination.clone()),
    )?;
    table.subscribe(|revision| log::info!("designers: revision {revision}"));

    table.mount();
    table.wait_for_updates().await;
    print_table(&table);

    selection.toggle(&table.custom_body()[1], None);
    pagination.next_page();
    table.wait_for_updates().await;
    print_table(&table);

    since.filter(1960);
    table.wait_for_updates().await;
    print_table(&table);

    println!("selected: {:?}", selection.selected());
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let log_file = File::create("tablekit-demo.log").expect("Failed to create log file");
    WriteLogger::init(LevelFilter::Debug, Config::default(), log_file)
        .expect("Failed to initialize logger");

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
    }
}

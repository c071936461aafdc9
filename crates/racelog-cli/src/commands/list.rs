use std::path::Path;

use racelog_core::StoredResult;

use crate::commands::common::{
    format_result_lines, open_store, result_to_list_item, ResultListItem,
};
use crate::error::CliError;

pub async fn run_list(limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let results = store.list(limit, 0).await?;
    print_results(&results, as_json, "No results recorded.")
}

pub async fn run_pending(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let results = store.unsynced().await?;
    print_results(&results, as_json, "All results are synced.")
}

fn print_results(results: &[StoredResult], as_json: bool, empty: &str) -> Result<(), CliError> {
    if as_json {
        let json_items = results
            .iter()
            .map(result_to_list_item)
            .collect::<Vec<ResultListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("{empty}");
        return Ok(());
    }

    for line in format_result_lines(results) {
        println!("{line}");
    }
    Ok(())
}

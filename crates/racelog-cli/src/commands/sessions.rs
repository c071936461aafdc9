use std::path::Path;

use crate::commands::common::{
    format_session_lines, open_store, session_to_list_item, SessionListItem,
};
use crate::error::CliError;

pub async fn run_sessions(limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let sessions = store.list_sessions(limit).await?;

    if as_json {
        let json_items = sessions
            .iter()
            .map(session_to_list_item)
            .collect::<Vec<SessionListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No sessions recorded.");
        return Ok(());
    }

    for line in format_session_lines(&sessions) {
        println!("{line}");
    }
    Ok(())
}

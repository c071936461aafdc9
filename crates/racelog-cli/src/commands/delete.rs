use std::path::Path;

use crate::commands::common::open_store;
use crate::error::CliError;

pub async fn run_delete(id: i64, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    match store.delete(id).await {
        Ok(()) => {}
        Err(racelog_core::Error::NotFound(_)) => return Err(CliError::ResultNotFound(id)),
        Err(error) => return Err(error.into()),
    }

    println!("{id}");
    Ok(())
}

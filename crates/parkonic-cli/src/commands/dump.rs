use std::fs;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use chrono::Utc;
use parkonic_store::mysql_dump;

use super::Context;

/// Writes the MySQL dump and reports where it went.
pub fn run(ctx: &Context, output: Option<PathBuf>) -> Result<()> {
    let dump = &ctx.config.dump;
    let path = output.unwrap_or_else(|| PathBuf::from(&dump.file_name));

    let sql = mysql_dump(&dump.database_name, Utc::now().naive_utc());
    fs::write(&path, sql).with_context(|| format!("failed to write {}", path.display()))?;

    let path = fs::canonicalize(&path).unwrap_or(path);
    tracing::info!(database = %dump.database_name, path = %path.display(), "dump written");
    println!("[OK] SQL dump file generated: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkonic_service::Config;

    #[test]
    fn writes_dump_to_requested_path() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("tickets.sql");
        let mut config = Config::default();
        config.dump.database_name = "parkonic_staging".to_string();

        run(&Context::new(config), Some(target.clone())).unwrap();

        let sql = fs::read_to_string(target).unwrap();
        assert!(sql.contains("USE `parkonic_staging`;"));
        assert!(sql.contains("CREATE TABLE `omc_ticket`"));
        assert!(sql.contains("CREATE TABLE `ocr_ticket`"));
    }

    #[test]
    fn completion_stamp_is_utc() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("stamp.sql");
        let before = Utc::now().naive_utc() - chrono::Duration::seconds(1);

        run(&Context::new(Config::default()), Some(target.clone())).unwrap();

        let after = Utc::now().naive_utc() + chrono::Duration::seconds(1);
        let sql = fs::read_to_string(target).unwrap();
        let stamp = sql
            .lines()
            .find_map(|line| line.strip_prefix("-- Dump completed on "))
            .unwrap();
        let stamp = chrono::NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S").unwrap();
        assert!(stamp >= before && stamp <= after, "{stamp} not within [{before}, {after}]");
    }
}
